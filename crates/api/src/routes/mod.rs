pub mod health;
pub mod importer;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /contacts/import/upload                          upload file (multipart)
/// /contacts/import/preview                         compute preview
/// /contacts/import/confirm                         apply row actions
/// /contacts/import/fields                          canonical field list
/// /contacts/import/{session_id}                    get, cancel
/// ```
///
/// `upload_limit` caps the request body of the upload route.
pub fn api_routes(upload_limit: usize) -> Router<AppState> {
    Router::new().nest("/contacts/import", importer::router(upload_limit))
}

/// Body limit for the upload route: the file cap plus room for multipart
/// framing, so an over-size file still reaches the pipeline's own size check.
pub fn upload_body_limit(max_file_bytes: usize) -> usize {
    max_file_bytes.saturating_add(256 * 1024)
}
