//! Handlers for the contact bulk importer.
//!
//! Thin adapters over [`rapport_core::importer::ContactImporter`]: decode the
//! request, call the phase, wrap the result in the `{ "data": ... }`
//! envelope.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use rapport_core::contact::{canonical_field_info, CanonicalFieldInfo};
use rapport_core::field_mapper::FieldMappingEntry;
use rapport_core::formats::SourceKind;
use rapport_core::import_session::SessionSnapshot;
use rapport_core::importer::{ImportResult, PreviewSummary, RowAction, UploadSummary};
use rapport_core::types::SessionId;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart part carrying the file.
const FILE_PART: &str = "file";

/// Optional multipart part naming the file kind explicitly.
const KIND_PART: &str = "kind";

// ── Upload ───────────────────────────────────────────────────────────

/// POST /api/v1/contacts/import/upload
///
/// Accept one file (multipart part `file`) and open an import session.
/// The kind is taken from the optional `kind` part, else the file name,
/// else the part's content type, else sniffed from the content.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadSummary>>)> {
    let mut file: Option<(Vec<u8>, Option<String>)> = None;
    let mut declared_kind: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_PART) => {
                let hint = file_hint(field.file_name(), field.content_type());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                file = Some((data.to_vec(), hint));
            }
            Some(KIND_PART) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                declared_kind = Some(text.trim().to_string()).filter(|k| !k.is_empty());
            }
            _ => continue,
        }
    }

    let Some((bytes, part_hint)) = file else {
        return Err(AppError::BadRequest(format!(
            "Multipart upload must contain a '{FILE_PART}' part"
        )));
    };
    let hint = declared_kind.or(part_hint);

    let summary = state.importer.upload(&bytes, hint.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: summary })))
}

/// Pick the kind hint carried by the file part itself.
///
/// A file name with an extension is authoritative. Otherwise a specific
/// content type is used; generic binary types are ignored so the content
/// gets sniffed instead.
fn file_hint(file_name: Option<&str>, content_type: Option<&str>) -> Option<String> {
    if let Some(name) = file_name.filter(|n| n.contains('.')) {
        return Some(name.to_string());
    }
    content_type
        .filter(|ct| SourceKind::from_hint(ct).is_some())
        .map(str::to_string)
}

// ── Preview ──────────────────────────────────────────────────────────

/// Request body for [`preview_import`].
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub session_id: SessionId,
    /// Required for delimited sessions, rejected for vCard sessions.
    #[serde(default)]
    pub field_mapping: Option<Vec<FieldMappingEntry>>,
}

/// POST /api/v1/contacts/import/preview
pub async fn preview_import(
    State(state): State<AppState>,
    Json(input): Json<PreviewRequest>,
) -> AppResult<Json<DataResponse<PreviewSummary>>> {
    let summary = state
        .importer
        .preview(input.session_id, input.field_mapping)
        .await?;
    Ok(Json(DataResponse { data: summary }))
}

// ── Confirm ──────────────────────────────────────────────────────────

/// Request body for [`confirm_import`].
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub session_id: SessionId,
    /// Rows not listed are skipped.
    #[serde(default)]
    pub row_actions: Vec<RowAction>,
}

/// POST /api/v1/contacts/import/confirm
pub async fn confirm_import(
    State(state): State<AppState>,
    Json(input): Json<ConfirmRequest>,
) -> AppResult<Json<DataResponse<ImportResult>>> {
    let result = state
        .importer
        .confirm(input.session_id, &input.row_actions)
        .await?;
    Ok(Json(DataResponse { data: result }))
}

// ── Fields / sessions ────────────────────────────────────────────────

/// GET /api/v1/contacts/import/fields
pub async fn list_fields() -> Json<DataResponse<Vec<CanonicalFieldInfo>>> {
    Json(DataResponse {
        data: canonical_field_info(),
    })
}

/// GET /api/v1/contacts/import/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> AppResult<Json<DataResponse<SessionSnapshot>>> {
    let snapshot = state.importer.session(session_id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// DELETE /api/v1/contacts/import/{session_id}
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> AppResult<StatusCode> {
    state.importer.cancel(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
