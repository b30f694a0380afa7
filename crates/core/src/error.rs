use crate::types::{DbId, SessionId};

/// Phase-level failures of the contact import pipeline.
///
/// Any of these aborts the whole upload / preview / confirm call. Row-level
/// problems during confirm never surface here; they are collected into
/// [`crate::importer::ImportResult::errors`].
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Unreadable file: {0}")]
    UnreadableFile(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File is {size} bytes, exceeding the {limit} byte limit")]
    FileTooLarge { size: usize, limit: usize },

    #[error("File has more than {limit} rows")]
    RowLimitExceeded { rows: usize, limit: usize },

    #[error("Import session {0} not found")]
    SessionNotFound(SessionId),

    #[error("Import session {0} has expired")]
    SessionExpired(SessionId),

    #[error("No source field is mapped to a contact field")]
    NoFieldsMapped,

    #[error("Invalid field mapping: {0}")]
    InvalidMapping(String),

    #[error("Import session {0} has already been confirmed")]
    SessionAlreadyConsumed(SessionId),

    #[error("Import session {0} has no preview; run preview before confirming")]
    NoPreviewComputed(SessionId),

    #[error("Contact store error: {0}")]
    Store(#[from] StoreError),
}

/// A name that is not one of the known values of an enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} '{value}'")]
pub struct UnknownNameError {
    pub kind: &'static str,
    pub value: String,
}

/// Errors reported by a [`crate::contact_store::ContactStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Contact with id {id} not found")]
    NotFound { id: DbId },

    #[error("{0}")]
    Backend(String),
}
