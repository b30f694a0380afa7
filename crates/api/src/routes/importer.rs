//! Route definitions for the contact bulk importer.
//!
//! Mounted at `/contacts/import`.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::importer;
use crate::state::AppState;

/// Routes mounted at `/contacts/import`.
///
/// ```text
/// POST   /upload           -> upload_file     (multipart)
/// POST   /preview          -> preview_import
/// POST   /confirm          -> confirm_import
/// GET    /fields           -> list_fields
/// GET    /{session_id}     -> get_session
/// DELETE /{session_id}     -> cancel_session
/// ```
pub fn router(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(importer::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/preview", post(importer::preview_import))
        .route("/confirm", post(importer::confirm_import))
        .route("/fields", get(importer::list_fields))
        .route(
            "/{session_id}",
            get(importer::get_session).delete(importer::cancel_session),
        )
}
