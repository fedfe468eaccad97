//! End-to-end run: uploaded ZIP in, `PDFs.zip` bytes and a report out.

use crate::archive::extract_archive;
use crate::batch::{BatchOptions, BatchProgress, BatchRunner, CancelToken};
use crate::classify::{classify, Classification};
use crate::convert::{ConvertOptions, SofficeConverter};
use crate::error::{Error, Result};
use crate::locate::{EngineLocator, FixedLocator, SystemLocator};
use crate::types::BatchReport;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    convert: ConvertOptions,
    batch: BatchOptions,
    engine_path: Option<PathBuf>,
    keep_scratch: bool,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_convert_options(mut self, options: ConvertOptions) -> Self {
        self.convert = options;
        self
    }

    pub fn with_batch_options(mut self, options: BatchOptions) -> Self {
        self.batch = options;
        self
    }

    /// Use this converter executable instead of searching for one.
    pub fn with_engine_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.engine_path = Some(path.into());
        self
    }

    /// Keep the scratch directory after the run instead of deleting it.
    pub fn with_keep_scratch(mut self, keep: bool) -> Self {
        self.keep_scratch = keep;
        self
    }
}

/// Something the pipeline reports while it runs.
#[derive(Debug)]
pub enum PipelineEvent<'a> {
    /// The upload was unpacked and sorted. Sent even when nothing was accepted.
    Classified(&'a Classification),

    /// One more document finished.
    Progress(&'a BatchProgress),
}

/// Everything a caller needs to show after a run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Which files were converted and which were skipped by extension.
    pub classification: Classification,

    /// Conversion outcomes and the packaged archive.
    pub batch: BatchReport,

    /// Scratch directory, if it was kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl RunReport {
    /// Write the packaged PDFs to `path`.
    pub fn write_package(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.batch.archive)?;
        Ok(())
    }
}

/// Converts every presentation in an uploaded ZIP.
pub struct Pipeline {
    config: PipelineConfig,
    locator: Box<dyn EngineLocator>,
    cancel: CancelToken,
}

impl Pipeline {
    /// Create a pipeline; the converter is found via the configured path or the system.
    pub fn new(config: PipelineConfig) -> Self {
        let locator: Box<dyn EngineLocator> = match &config.engine_path {
            Some(path) => Box::new(FixedLocator::new(path)),
            None => Box::new(SystemLocator::new()),
        };

        Self {
            config,
            locator,
            cancel: CancelToken::default(),
        }
    }

    /// Replace the converter lookup.
    pub fn with_locator(mut self, locator: impl EngineLocator + 'static) -> Self {
        self.locator = Box::new(locator);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run without progress reporting.
    pub fn run(&self, archive_path: &Path) -> Result<RunReport> {
        self.run_with_events(archive_path, |_| {})
    }

    /// Run the whole conversion, reporting events to `on_event`.
    ///
    /// Fails without converting anything if the archive is unreadable, holds
    /// no presentations, or no converter is installed.
    pub fn run_with_events<F>(&self, archive_path: &Path, mut on_event: F) -> Result<RunReport>
    where
        F: FnMut(PipelineEvent<'_>),
    {
        let scratch = tempfile::Builder::new().prefix("ppt2pdf-").tempdir()?;
        let unzipped = scratch.path().join("unzipped");
        let out_dir = scratch.path().join("pdfs");

        extract_archive(archive_path, &unzipped)?;

        let classification = classify(&unzipped);
        on_event(PipelineEvent::Classified(&classification));
        if classification.is_empty() {
            return Err(Error::NoEligibleFiles);
        }

        let converter =
            SofficeConverter::from_locator(self.locator.as_ref(), self.config.convert.clone())?;
        log::info!("Using converter {}", converter.engine().display());

        let batch = BatchRunner::new(&converter, scratch.path().join("work"), &out_dir)
            .with_options(self.config.batch.clone())
            .with_cancel_token(self.cancel.clone())
            .run(&classification.accepted, |progress| {
                on_event(PipelineEvent::Progress(progress))
            })?;

        let scratch_dir = if self.config.keep_scratch {
            let kept = scratch.keep();
            log::info!("Keeping scratch directory {}", kept.display());
            Some(kept)
        } else {
            None
        };

        Ok(RunReport {
            classification,
            batch,
            scratch_dir,
        })
    }
}
