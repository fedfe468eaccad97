//! Domain types for a batch conversion run.

use crate::classify::SortKey;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// The format of a source presentation, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationFormat {
    /// Legacy PPT (OLE/CFB binary).
    Ppt,
    /// Modern PPTX (Office Open XML).
    Pptx,
    /// Macro-enabled PPTM (Office Open XML).
    Pptm,
}

impl PresentationFormat {
    /// Detect format from file extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ppt" => Some(Self::Ppt),
            "pptx" => Some(Self::Pptx),
            "pptm" => Some(Self::Pptm),
            _ => None,
        }
    }

    /// Detect format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical lowercase extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ppt => "ppt",
            Self::Pptx => "pptx",
            Self::Pptm => "pptm",
        }
    }
}

/// A presentation discovered in the extracted upload.
#[derive(Debug, Clone, Serialize)]
pub struct SourceDocument {
    /// Full path inside the extracted tree.
    pub path: PathBuf,

    /// Original filename (without directories).
    pub name: String,

    /// Format detected from the extension.
    pub format: PresentationFormat,

    /// Processing order key.
    #[serde(skip)]
    pub sort_key: SortKey,
}

impl SourceDocument {
    /// Build a document from a path, or `None` if the extension is not accepted.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let format = PresentationFormat::from_path(&path)?;
        let name = path.file_name()?.to_string_lossy().into_owned();
        let sort_key = SortKey::for_name(&name);

        Some(Self {
            path,
            name,
            format,
            sort_key,
        })
    }

    /// Filename without its extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// The result of converting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    /// A validated PDF was written to the output directory.
    Success { document: String, output: PathBuf },

    /// The document could not be converted.
    Failure { document: String, reason: String },
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Name of the source document this outcome belongs to.
    pub fn document(&self) -> &str {
        match self {
            Self::Success { document, .. } | Self::Failure { document, .. } => document,
        }
    }

    /// Human-readable failure line, or `None` for successes.
    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { document, reason } => {
                Some(format!("[conversion failed] {}: {}", document, reason))
            }
        }
    }
}

/// Aggregate result of one batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Number of documents in the batch.
    pub total: usize,

    /// Number of validated PDFs produced.
    pub succeeded: usize,

    /// Per-document outcomes in processing order.
    pub outcomes: Vec<ConversionOutcome>,

    /// ZIP archive holding exactly the successful PDFs.
    #[serde(skip)]
    pub archive: Vec<u8>,
}

impl BatchReport {
    /// Completion tally in `success/total` form.
    pub fn tally(&self) -> String {
        format!("{}/{}", self.succeeded, self.total)
    }

    /// Failure messages in processing order.
    pub fn failure_messages(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(ConversionOutcome::failure_message)
            .collect()
    }

    /// Output paths of the successful conversions, in processing order.
    pub fn outputs(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ConversionOutcome::Success { output, .. } => Some(output.as_path()),
                ConversionOutcome::Failure { .. } => None,
            })
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.succeeded < self.total
    }
}
