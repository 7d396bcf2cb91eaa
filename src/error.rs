//! Run-level error taxonomy
//!
//! Four failure classes end an ingest run; each maps to one user-visible
//! message. User upsert and line item failures are deliberately absent:
//! those are warnings handled where they occur, never run failures.

use crate::db::StoreError;
use crate::services::ExtractionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Why an ingest run stopped.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Attachment download or photo upload failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Extraction service unreachable, rejecting, or over quota.
    #[error("extraction failed: {0}")]
    ExtractionFailed(#[source] ExtractionError),

    /// Extraction answered, but not with a usable receipt payload.
    #[error("schema violation: {0}")]
    SchemaViolation(#[source] ExtractionError),

    /// Receipt header write failed or returned no id.
    #[error("persistence failed: {0}")]
    PersistenceFailed(#[from] StoreError),
}

/// Coarse class of a failure, for message selection and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Storage,
    Extraction,
    Schema,
    Persistence,
}

impl FailureClass {
    /// Stable name used in structured logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Storage => "storage_error",
            FailureClass::Extraction => "extraction_failed",
            FailureClass::Schema => "schema_violation",
            FailureClass::Persistence => "persistence_failed",
        }
    }
}

impl IngestError {
    pub fn class(&self) -> FailureClass {
        match self {
            IngestError::Storage(_) => FailureClass::Storage,
            IngestError::ExtractionFailed(_) => FailureClass::Extraction,
            IngestError::SchemaViolation(_) => FailureClass::Schema,
            IngestError::PersistenceFailed(_) => FailureClass::Persistence,
        }
    }
}

impl From<ExtractionError> for IngestError {
    /// Contract breaches and transport failures read differently to the
    /// user, so the split happens right at the conversion.
    fn from(e: ExtractionError) -> Self {
        if e.is_schema_violation() {
            IngestError::SchemaViolation(e)
        } else {
            IngestError::ExtractionFailed(e)
        }
    }
}
