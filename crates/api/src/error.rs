use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rapport_core::error::ImportError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`ImportError`] for pipeline errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A phase-level error from the import pipeline.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Import(err) => classify_import_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map an import pipeline error onto an HTTP status, error code and message.
fn classify_import_error(err: &ImportError) -> (StatusCode, &'static str, String) {
    let (status, code) = match err {
        ImportError::UnreadableFile(_) => (StatusCode::UNPROCESSABLE_ENTITY, "UNREADABLE_FILE"),
        ImportError::UnsupportedFileType(_) => {
            (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FILE_TYPE")
        }
        ImportError::FileTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE"),
        ImportError::RowLimitExceeded { .. } => {
            (StatusCode::PAYLOAD_TOO_LARGE, "ROW_LIMIT_EXCEEDED")
        }
        ImportError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
        ImportError::SessionExpired(_) => (StatusCode::GONE, "SESSION_EXPIRED"),
        ImportError::NoFieldsMapped => (StatusCode::UNPROCESSABLE_ENTITY, "NO_FIELDS_MAPPED"),
        ImportError::InvalidMapping(_) => (StatusCode::BAD_REQUEST, "INVALID_MAPPING"),
        ImportError::SessionAlreadyConsumed(_) => {
            (StatusCode::CONFLICT, "SESSION_ALREADY_CONSUMED")
        }
        ImportError::NoPreviewComputed(_) => (StatusCode::CONFLICT, "NO_PREVIEW_COMPUTED"),
        ImportError::Store(e) => {
            tracing::error!(error = %e, "Contact store unavailable");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
                "The contact store is unavailable".to_string(),
            );
        }
    };
    (status, code, err.to_string())
}
