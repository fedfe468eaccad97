//! Batch conversion of archived PowerPoint files to validated PDFs.
//!
//! The pipeline unpacks an uploaded ZIP, picks out `.ppt`/`.pptx`/`.pptm`
//! files in chapter order, converts each with LibreOffice under a timeout,
//! rejects outputs that are not real PDFs, and packages the rest.

pub mod archive;
pub mod batch;
pub mod classify;
pub mod convert;
pub mod error;
pub mod locate;
pub mod naming;
pub mod pipeline;
pub mod types;

pub use archive::{collect_pdfs, extract_archive, pack_pdfs, PACKAGE_NAME};
pub use batch::{BatchOptions, BatchProgress, BatchRunner, CancelToken};
pub use classify::{classify, Classification, SortKey};
pub use convert::{validate_pdf, ConvertOptions, DocumentConverter, SofficeConverter};
pub use error::{Error, Result};
pub use locate::{EngineLocator, FixedLocator, SystemLocator};
pub use naming::{output_name, sanitize_stem};
pub use pipeline::{Pipeline, PipelineConfig, PipelineEvent, RunReport};
pub use types::{BatchReport, ConversionOutcome, PresentationFormat, SourceDocument};
