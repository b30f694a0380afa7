//! Contact import orchestrator: upload, preview, confirm.
//!
//! A session moves `Uploaded -> (Mapped) -> Previewed -> Confirmed`.
//! `Mapped` only occurs on the delimited path; vCard uploads are previewed
//! as part of the upload call. Phase errors abort the call; row problems
//! during confirm are collected into [`ImportResult::errors`] and the batch
//! carries on.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::contact::{ContactDraft, ContactFields};
use crate::contact_store::ContactStore;
use crate::duplicate_detection::{find_duplicate, suggest_action, DuplicateMatch, ImportAction};
use crate::error::ImportError;
use crate::field_mapper::{
    apply_mapping, canonical_record_fields, has_mapped_field, suggest_mapping,
    unknown_source_field, FieldMappingEntry,
};
use crate::formats::delimited::parse_delimited;
use crate::formats::vcard::{parse_vcards, MultiValuePolicy};
use crate::formats::{detect_source_kind, RawRecord, SourceKind};
use crate::import_session::{ImportSession, SessionSnapshot, SessionState, SessionStore};
use crate::row_validation::normalize_and_validate;
use crate::types::{SessionId, Timestamp};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default upload size cap: 5 MiB.
pub const DEFAULT_MAX_FILE_BYTES: usize = 5 * 1024 * 1024;

/// Default session lifetime: 30 minutes.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 60;

/// Default number of parsed rows echoed back by `upload`.
pub const DEFAULT_SAMPLE_ROWS: usize = 5;

/// Limits and policies of the import pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub max_file_bytes: usize,
    /// `None` means no row cap.
    pub max_rows: Option<usize>,
    pub session_ttl_secs: i64,
    pub sample_rows: usize,
    pub vcard_policy: MultiValuePolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_rows: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            vcard_policy: MultiValuePolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Phase inputs and outputs
// ---------------------------------------------------------------------------

/// Per-row evaluation produced by preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowPreview {
    pub row_index: usize,
    pub resolved_fields: ContactFields,
    pub validation_errors: Vec<String>,
    pub duplicate_match: Option<DuplicateMatch>,
    pub suggested_action: ImportAction,
}

/// Row-by-row preview plus aggregate counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewSummary {
    pub session_id: SessionId,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub duplicate_count: usize,
    pub error_count: usize,
    pub rows: Vec<RowPreview>,
}

impl PreviewSummary {
    fn new(session_id: SessionId, rows: Vec<RowPreview>) -> Self {
        let error_count = rows.iter().filter(|r| !r.validation_errors.is_empty()).count();
        Self {
            session_id,
            total_rows: rows.len(),
            valid_rows: rows.len() - error_count,
            duplicate_count: rows.iter().filter(|r| r.duplicate_match.is_some()).count(),
            error_count,
            rows,
        }
    }
}

/// What `upload` hands back to the operator.
#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub session_id: SessionId,
    pub source_kind: SourceKind,
    pub expires_at: Timestamp,
    pub total_rows: usize,
    /// Column names (delimited only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    /// Inferred mapping (delimited only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_mapping: Option<Vec<FieldMappingEntry>>,
    pub sample_rows: Vec<RawRecord>,
    /// vCard entries dropped as malformed.
    pub skipped_entries: usize,
    pub warnings: Vec<String>,
    /// Preview computed during upload (vCard only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewSummary>,
}

/// Operator decision for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowAction {
    pub row_index: usize,
    pub action: ImportAction,
}

/// Terminal summary of a confirm call.
///
/// `total_processed == created + updated + skipped + failed`, which is
/// always the session's row count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_processed: usize,
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs the three-phase import protocol against a contact store.
pub struct ContactImporter {
    store: Arc<dyn ContactStore>,
    sessions: SessionStore,
    config: ImportConfig,
}

impl ContactImporter {
    pub fn new(store: Arc<dyn ContactStore>, clock: Arc<dyn Clock>, config: ImportConfig) -> Self {
        Self {
            store,
            sessions: SessionStore::new(clock),
            config,
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Parse a file into a new session.
    ///
    /// `kind_hint` may be a file name, an extension, a MIME type or one of
    /// `delimited`/`vcard`. Without it the content is sniffed.
    pub async fn upload(
        &self,
        bytes: &[u8],
        kind_hint: Option<&str>,
    ) -> Result<UploadSummary, ImportError> {
        if bytes.len() > self.config.max_file_bytes {
            return Err(ImportError::FileTooLarge {
                size: bytes.len(),
                limit: self.config.max_file_bytes,
            });
        }

        let kind = detect_source_kind(kind_hint, bytes)?;
        let session_id = uuid::Uuid::new_v4();
        let ttl = chrono::Duration::seconds(self.config.session_ttl_secs);
        let now = self.sessions.now();

        let (mut session, suggested, skipped_entries, warnings) = match kind {
            SourceKind::Delimited => {
                let doc = parse_delimited(bytes, self.config.max_rows)?;
                let suggested = suggest_mapping(&doc.headers);
                let session =
                    ImportSession::new(session_id, now, ttl, kind, doc.headers, doc.rows);
                (session, Some(suggested), 0, Vec::new())
            }
            SourceKind::Vcard => {
                let doc = parse_vcards(bytes, self.config.vcard_policy, self.config.max_rows)?;
                let session =
                    ImportSession::new(session_id, now, ttl, kind, Vec::new(), doc.records);
                (session, None, doc.skipped_entries, doc.warnings)
            }
        };

        let preview = match kind {
            SourceKind::Vcard => {
                let rows = self.compute_preview(&session.raw_rows, None).await?;
                session.preview = Some(rows.clone());
                session.state = SessionState::Previewed;
                Some(PreviewSummary::new(session_id, rows))
            }
            SourceKind::Delimited => None,
        };

        let summary = UploadSummary {
            session_id,
            source_kind: kind,
            expires_at: session.expires_at,
            total_rows: session.raw_rows.len(),
            headers: (kind == SourceKind::Delimited).then(|| session.headers.clone()),
            suggested_mapping: suggested,
            sample_rows: session
                .raw_rows
                .iter()
                .take(self.config.sample_rows)
                .cloned()
                .collect(),
            skipped_entries,
            warnings,
            preview,
        };
        self.sessions.insert(session).await;

        tracing::info!(
            session_id = %session_id,
            kind = %kind,
            rows = summary.total_rows,
            skipped_entries,
            "Import file uploaded",
        );
        Ok(summary)
    }

    /// Resolve, validate and match every row of a session.
    ///
    /// Delimited sessions require `field_mapping`; vCard sessions reject one.
    /// Any earlier preview is discarded before the new one is computed.
    pub async fn preview(
        &self,
        session_id: SessionId,
        field_mapping: Option<Vec<FieldMappingEntry>>,
    ) -> Result<PreviewSummary, ImportError> {
        let mut session = self.sessions.checkout(session_id).await?;
        if session.is_consumed() {
            return Err(ImportError::SessionAlreadyConsumed(session_id));
        }

        let mapping = match (session.source_kind, field_mapping) {
            (SourceKind::Delimited, Some(mapping)) => {
                if let Some(source) = unknown_source_field(&mapping, &session.headers) {
                    return Err(ImportError::InvalidMapping(format!(
                        "source field '{source}' is not a column of the uploaded file"
                    )));
                }
                if !has_mapped_field(&mapping) {
                    return Err(ImportError::NoFieldsMapped);
                }
                Some(mapping)
            }
            (SourceKind::Delimited, None) => {
                return Err(ImportError::InvalidMapping(
                    "a field mapping is required for delimited files".to_string(),
                ));
            }
            (SourceKind::Vcard, Some(_)) => {
                return Err(ImportError::InvalidMapping(
                    "vCard sessions do not take a field mapping".to_string(),
                ));
            }
            (SourceKind::Vcard, None) => None,
        };

        session.preview = None;
        session.state = match mapping {
            Some(_) => SessionState::Mapped,
            None => SessionState::Uploaded,
        };
        session.field_mapping = mapping;

        let rows = self
            .compute_preview(&session.raw_rows, session.field_mapping.as_deref())
            .await?;
        session.preview = Some(rows.clone());
        session.state = SessionState::Previewed;

        let summary = PreviewSummary::new(session_id, rows);
        tracing::info!(
            session_id = %session_id,
            rows = summary.total_rows,
            valid = summary.valid_rows,
            duplicates = summary.duplicate_count,
            errors = summary.error_count,
            "Import preview computed",
        );
        Ok(summary)
    }

    /// Apply the operator's decisions row by row.
    ///
    /// Rows without an action are skipped. Rows whose requested action is
    /// not allowed by their preview are skipped and the reason recorded.
    /// Store failures are recorded per row and never abort the batch.
    pub async fn confirm(
        &self,
        session_id: SessionId,
        row_actions: &[RowAction],
    ) -> Result<ImportResult, ImportError> {
        let mut session = self.sessions.checkout(session_id).await?;
        if session.is_consumed() {
            return Err(ImportError::SessionAlreadyConsumed(session_id));
        }
        let preview = session
            .preview
            .clone()
            .ok_or(ImportError::NoPreviewComputed(session_id))?;

        let mut result = ImportResult::default();
        let mut requested: BTreeMap<usize, ImportAction> = BTreeMap::new();
        for ra in row_actions {
            if ra.row_index >= preview.len() {
                result.errors.push(format!(
                    "Row {}: no such row in this import; action ignored",
                    ra.row_index
                ));
            } else if requested.contains_key(&ra.row_index) {
                result.errors.push(format!(
                    "Row {}: more than one action given; only the first is used",
                    ra.row_index
                ));
            } else {
                requested.insert(ra.row_index, ra.action);
            }
        }

        for row in &preview {
            let action = requested
                .get(&row.row_index)
                .copied()
                .unwrap_or(ImportAction::Skip);
            self.apply_row(row, action, &mut result).await;
        }
        result.total_processed = preview.len();

        session.state = SessionState::Confirmed;
        session.result = Some(result.clone());

        tracing::info!(
            session_id = %session_id,
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            failed = result.failed,
            "Import confirmed",
        );
        Ok(result)
    }

    /// Snapshot of a live session.
    pub async fn session(&self, session_id: SessionId) -> Result<SessionSnapshot, ImportError> {
        let session = self.sessions.checkout(session_id).await?;
        Ok(session.snapshot())
    }

    /// Discard a live session.
    pub async fn cancel(&self, session_id: SessionId) -> Result<(), ImportError> {
        self.sessions.cancel(session_id).await?;
        tracing::info!(session_id = %session_id, "Import session cancelled");
        Ok(())
    }

    // -- internals --

    async fn compute_preview(
        &self,
        raw_rows: &[RawRecord],
        mapping: Option<&[FieldMappingEntry]>,
    ) -> Result<Vec<RowPreview>, ImportError> {
        let mut rows = Vec::with_capacity(raw_rows.len());
        for (row_index, raw) in raw_rows.iter().enumerate() {
            let mut fields = match mapping {
                Some(mapping) => apply_mapping(raw, mapping),
                None => canonical_record_fields(raw),
            };
            let validation_errors = normalize_and_validate(&mut fields);
            let duplicate_match = find_duplicate(self.store.as_ref(), &fields).await?;
            let suggested_action = suggest_action(&validation_errors, duplicate_match.as_ref());
            rows.push(RowPreview {
                row_index,
                resolved_fields: fields,
                validation_errors,
                duplicate_match,
                suggested_action,
            });
        }
        Ok(rows)
    }

    async fn apply_row(&self, row: &RowPreview, action: ImportAction, result: &mut ImportResult) {
        let i = row.row_index;

        if action != ImportAction::Skip && !row.validation_errors.is_empty() {
            result.skipped += 1;
            result.errors.push(format!(
                "Row {i}: '{action}' requested but the row has validation errors ({}); skipped",
                row.validation_errors.join("; ")
            ));
            return;
        }

        let draft = ContactDraft::from_fields(&row.resolved_fields);
        let outcome = match (action, &row.duplicate_match) {
            (ImportAction::Skip, _) => {
                result.skipped += 1;
                return;
            }
            (ImportAction::Update, None) => {
                result.skipped += 1;
                result.errors.push(format!(
                    "Row {i}: 'update' requested but no existing contact matched; skipped"
                ));
                return;
            }
            (ImportAction::Update, Some(m)) => self
                .store
                .update(m.existing_contact_id, &draft)
                .await
                .map(|_| result.updated += 1),
            (ImportAction::Add, _) => self.store.create(&draft).await.map(|_| result.created += 1),
        };

        if let Err(e) = outcome {
            tracing::warn!(row_index = i, action = %action, error = %e, "Import row failed");
            result.failed += 1;
            result.errors.push(format!("Row {i}: {action} failed: {e}"));
        }
    }
}

impl std::fmt::Debug for ContactImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactImporter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
