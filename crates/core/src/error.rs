//! Error types for the PowerPoint to PDF conversion pipeline.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting a batch of presentations.
///
/// Run-level variants abort the whole run. Per-file variants are caught by
/// the batch runner and recorded as a failure for that document only.
#[derive(Error, Debug)]
pub enum Error {
    /// No usable converter executable was found on this host.
    #[error("LibreOffice (soffice) was not found; install it or pass its path explicitly")]
    EngineUnavailable,

    /// The converter exited with a non-zero status.
    #[error("converter exited with {status}\n\nstderr:\n{stderr}\n\nstdout:\n{stdout}")]
    ConversionFailed {
        status: String,
        stderr: String,
        stdout: String,
    },

    /// The converter did not finish within the allowed time and was killed.
    #[error("converter timed out after {limit:?}")]
    Timeout { limit: Duration },

    /// The converter reported success but the expected PDF is absent.
    #[error("no PDF was produced (expected {})", .0.display())]
    OutputMissing(PathBuf),

    /// The produced PDF failed the size or signature check.
    #[error("produced PDF is invalid ({reason}): {}", .path.display())]
    CorruptOutput { path: PathBuf, reason: String },

    /// The uploaded archive could not be read or unpacked.
    #[error("failed to extract archive: {0}")]
    ArchiveExtraction(String),

    /// The uploaded archive holds no .ppt/.pptx/.pptm files.
    #[error("no PPT/PPTX/PPTM files were found in the archive")]
    NoEligibleFiles,

    /// The batch was cancelled before this document was started.
    #[error("cancelled before conversion started")]
    Cancelled,

    /// Filesystem error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error while writing the output archive.
    #[error("ZIP error: {0}")]
    ZipError(String),
}

impl Error {
    /// Whether this error aborts the entire run rather than a single file.
    pub fn is_run_level(&self) -> bool {
        matches!(
            self,
            Error::EngineUnavailable | Error::ArchiveExtraction(_) | Error::NoEligibleFiles
        )
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::ZipError(e.to_string())
    }
}
