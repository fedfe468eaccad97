//! Driving conversions over an ordered list of documents.
//!
//! Every document gets exactly one attempt. A failure is recorded against
//! that document and the batch moves on; only I/O problems with the shared
//! output or scratch directories stop the batch.

use crate::archive::{collect_pdfs, pack_pdfs};
use crate::convert::DocumentConverter;
use crate::error::{Error, Result};
use crate::naming::output_name;
use crate::types::{BatchReport, ConversionOutcome, SourceDocument};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

/// Options controlling how a batch is scheduled.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    workers: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversions run at once, each with its own converter process.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1); // At least 1 worker
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

/// Shared flag that stops a batch from starting further conversions.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress notification sent after each document finishes.
#[derive(Debug, Clone, Serialize)]
pub struct BatchProgress {
    /// Documents finished so far, including this one.
    pub completed: usize,

    /// Documents in the batch.
    pub total: usize,

    /// Name of the document that just finished.
    pub document: String,

    /// Whether it produced a validated PDF.
    pub succeeded: bool,
}

impl BatchProgress {
    /// Completed share of the batch, from 0.0 to 1.0.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Runs a converter over a batch of documents.
pub struct BatchRunner<'a> {
    converter: &'a dyn DocumentConverter,
    scratch_dir: PathBuf,
    out_dir: PathBuf,
    options: BatchOptions,
    cancel: CancelToken,
}

impl<'a> BatchRunner<'a> {
    /// Create a runner writing PDFs to `out_dir` and scratch files under `scratch_dir`.
    pub fn new(
        converter: &'a dyn DocumentConverter,
        scratch_dir: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            converter,
            scratch_dir: scratch_dir.into(),
            out_dir: out_dir.into(),
            options: BatchOptions::default(),
            cancel: CancelToken::default(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Convert `documents` in order and package the successes.
    ///
    /// `on_progress` is called on the calling thread after each document.
    /// Outcomes are reported in document order whatever the worker count.
    pub fn run<F>(&self, documents: &[SourceDocument], mut on_progress: F) -> Result<BatchReport>
    where
        F: FnMut(&BatchProgress),
    {
        let total = documents.len();
        let workers = self.options.workers.min(total).max(1);

        fs::create_dir_all(&self.out_dir)?;
        let work_dirs = (1..=workers)
            .map(|n| {
                let dir = self.scratch_dir.join(format!("worker-{}", n));
                fs::create_dir_all(&dir).map(|_| dir)
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        log::info!("Converting {} documents with {} worker(s)", total, workers);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|n| format!("ppt2pdf-worker-{}", n + 1))
            .build()
            .map_err(|e| Error::IoError(std::io::Error::other(e)))?;
        let (tx, rx) = mpsc::channel::<(String, bool)>();

        // The pool works on a helper thread so progress can be reported
        // from the calling thread while conversions run.
        let outcomes: Vec<ConversionOutcome> = std::thread::scope(|scope| {
            let handle = scope.spawn(|| {
                let tx = tx;
                pool.install(|| {
                    documents
                        .par_iter()
                        .enumerate()
                        .map(|(position, document)| {
                            // Each pool thread owns one work directory.
                            let worker = rayon::current_thread_index().unwrap_or(0);
                            let outcome =
                                self.convert_one(position + 1, document, &work_dirs[worker]);
                            let _ = tx.send((outcome.document().to_string(), outcome.is_success()));
                            outcome
                        })
                        .collect::<Vec<_>>()
                })
            });

            for (completed, (document, succeeded)) in rx.iter().enumerate() {
                on_progress(&BatchProgress {
                    completed: completed + 1,
                    total,
                    document,
                    succeeded,
                });
            }

            handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        });

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();

        let mut report = BatchReport {
            total,
            succeeded,
            outcomes,
            archive: Vec::new(),
        };
        let archive = pack_pdfs(&report.outputs())?;
        report.archive = archive;

        let on_disk = collect_pdfs(&self.out_dir)?.len();
        if on_disk != succeeded {
            log::warn!(
                "{} PDFs in {} but {} conversions succeeded",
                on_disk,
                self.out_dir.display(),
                succeeded
            );
        }

        log::info!("Batch finished: {} converted", report.tally());
        Ok(report)
    }

    /// Convert the document at 1-based `index`, downgrading any error to a failure.
    fn convert_one(
        &self,
        index: usize,
        document: &SourceDocument,
        work_dir: &Path,
    ) -> ConversionOutcome {
        if self.cancel.is_cancelled() {
            return failure(document, Error::Cancelled);
        }

        let name = output_name(index, &document.stem());
        match self.converter.convert(document, work_dir, &self.out_dir, &name) {
            Ok(output) => ConversionOutcome::Success {
                document: document.name.clone(),
                output,
            },
            Err(e) => failure(document, e),
        }
    }
}

fn failure(document: &SourceDocument, error: Error) -> ConversionOutcome {
    log::warn!("Failed to convert {}: {}", document.name, error);
    ConversionOutcome::Failure {
        document: document.name.clone(),
        reason: error.to_string(),
    }
}
