//! Error types for songvault-ingest
//!
//! One structured error kind per failure class the pipeline can surface.
//! Missing required descriptor metadata is deliberately not here: it is a
//! soft per-descriptor skip (`ParseOutcome::Skip`), and duplicate content
//! is reported through `StoreOutcome::duplicate`, not as an error.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Ingestion pipeline errors
#[derive(Debug, Error)]
pub enum IngestError {
    /// File extension is not one of the supported formats
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Archive contains an absolute or parent-traversing entry path
    #[error("Unsafe archive entry: {0}")]
    UnsafeArchive(String),

    /// RAR archive requires a continuation volume
    #[error("Multi-part RAR archives are not supported: {0}")]
    MultiVolumeUnsupported(PathBuf),

    /// Archive could not be read or unpacked
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Durable store rejected or failed the operation
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Audio input shorter than the minimum analyzable duration
    #[error("Insufficient audio: {got:.2}s (minimum {min:.1}s)")]
    InsufficientAudio { got: f32, min: f32 },

    /// Audio decoding or signal analysis failed
    #[error("Analysis failure: {0}")]
    AnalysisFailure(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// songvault-common error
    #[error("Common error: {0}")]
    Common(#[from] songvault_common::Error),
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        IngestError::StorageFailure(err.to_string())
    }
}
