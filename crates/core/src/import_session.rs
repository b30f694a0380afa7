//! Server-held import sessions and the store that guards them.
//!
//! Each session sits behind its own async mutex. Every phase operation
//! checks a session out for its whole duration, so a confirm can never
//! observe a preview that is halfway through being recomputed. Sessions
//! are independent: the map lock is only held long enough to look up or
//! insert an entry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::clock::Clock;
use crate::error::ImportError;
use crate::field_mapper::FieldMappingEntry;
use crate::formats::{RawRecord, SourceKind};
use crate::importer::{ImportResult, RowPreview};
use crate::types::{SessionId, Timestamp};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Lifecycle position of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// File parsed, nothing else done yet.
    Uploaded,
    /// A mapping was accepted; no preview for it has completed.
    Mapped,
    /// A preview exists for the current mapping.
    Previewed,
    /// Confirm ran. Terminal.
    Confirmed,
}

/// Scratch state for one import attempt.
#[derive(Debug, Clone)]
pub struct ImportSession {
    pub session_id: SessionId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub source_kind: SourceKind,
    /// Column names; empty for vCard sessions.
    pub headers: Vec<String>,
    /// Parsed rows. `row_index` is the position in this vector.
    pub raw_rows: Vec<RawRecord>,
    /// Mapping the current preview was computed with (delimited only).
    pub field_mapping: Option<Vec<FieldMappingEntry>>,
    pub preview: Option<Vec<RowPreview>>,
    pub result: Option<ImportResult>,
    pub state: SessionState,
}

impl ImportSession {
    pub fn new(
        session_id: SessionId,
        created_at: Timestamp,
        ttl: chrono::Duration,
        source_kind: SourceKind,
        headers: Vec<String>,
        raw_rows: Vec<RawRecord>,
    ) -> Self {
        Self {
            session_id,
            created_at,
            expires_at: created_at + ttl,
            source_kind,
            headers,
            raw_rows,
            field_mapping: None,
            preview: None,
            result: None,
            state: SessionState::Uploaded,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    pub fn is_consumed(&self) -> bool {
        self.state == SessionState::Confirmed
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            state: self.state,
            source_kind: self.source_kind,
            total_rows: self.raw_rows.len(),
            headers: self.headers.clone(),
            field_mapping: self.field_mapping.clone(),
            has_preview: self.preview.is_some(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            result: self.result.clone(),
        }
    }
}

/// Read-only view of a session returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub state: SessionState,
    pub source_kind: SourceKind,
    pub total_rows: usize,
    pub headers: Vec<String>,
    pub field_mapping: Option<Vec<FieldMappingEntry>>,
    pub has_preview: bool,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ImportResult>,
}

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

/// Exclusive hold on one session for the length of a phase call.
pub type SessionGuard = OwnedMutexGuard<ImportSession>;

/// All live sessions, keyed by id.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<ImportSession>>>>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Register a new session and return its id.
    pub async fn insert(&self, session: ImportSession) -> SessionId {
        let id = session.session_id;
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        id
    }

    /// Lock a session for exclusive use.
    ///
    /// Waits for any other call on the same session to finish. An expired
    /// session is dropped from the store and reported as
    /// [`ImportError::SessionExpired`].
    pub async fn checkout(&self, id: SessionId) -> Result<SessionGuard, ImportError> {
        let entry = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ImportError::SessionNotFound(id))?;

        let guard = entry.clone().lock_owned().await;
        if guard.is_expired(self.clock.now()) {
            self.remove_entry(id, &entry).await;
            return Err(ImportError::SessionExpired(id));
        }
        Ok(guard)
    }

    /// Discard a live session.
    pub async fn cancel(&self, id: SessionId) -> Result<(), ImportError> {
        let guard = self.checkout(id).await?;
        self.sessions.write().await.remove(&id);
        drop(guard);
        Ok(())
    }

    /// Remove every expired session that no call currently holds. Returns
    /// the number removed.
    pub async fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            // Someone checked it out or is waiting to: leave it for the next sweep.
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            match entry.try_lock() {
                Ok(session) => !session.is_expired(now),
                Err(_) => true,
            }
        });
        before - sessions.len()
    }

    /// Number of sessions currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn remove_entry(&self, id: SessionId, entry: &Arc<Mutex<ImportSession>>) {
        let mut sessions = self.sessions.write().await;
        if sessions.get(&id).is_some_and(|current| Arc::ptr_eq(current, entry)) {
            sessions.remove(&id);
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use assert_matches::assert_matches;

    fn store() -> (Arc<ManualClock>, SessionStore) {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let store = SessionStore::new(clock.clone());
        (clock, store)
    }

    fn session(store: &SessionStore) -> ImportSession {
        ImportSession::new(
            uuid::Uuid::new_v4(),
            store.now(),
            chrono::Duration::minutes(30),
            SourceKind::Delimited,
            vec!["n".into()],
            vec![RawRecord::new()],
        )
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (_, store) = store();
        let id = uuid::Uuid::new_v4();
        assert_matches!(store.checkout(id).await, Err(ImportError::SessionNotFound(x)) if x == id);
    }

    #[tokio::test]
    async fn expired_session_is_rejected_then_gone() {
        let (clock, store) = store();
        let id = store.insert(session(&store)).await;
        assert!(store.checkout(id).await.is_ok());

        clock.advance(chrono::Duration::minutes(30));
        assert_matches!(store.checkout(id).await, Err(ImportError::SessionExpired(_)));
        assert_matches!(store.checkout(id).await, Err(ImportError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn eviction_skips_checked_out_sessions() {
        let (clock, store) = store();
        let held = store.insert(session(&store)).await;
        store.insert(session(&store)).await;

        let guard = store.checkout(held).await.unwrap();
        clock.advance(chrono::Duration::hours(1));

        assert_eq!(store.evict_expired().await, 1);
        assert_eq!(store.len().await, 1);

        drop(guard);
        assert_eq!(store.evict_expired().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn eviction_keeps_live_sessions() {
        let (clock, store) = store();
        store.insert(session(&store)).await;
        clock.advance(chrono::Duration::minutes(29));
        assert_eq!(store.evict_expired().await, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn cancel_removes_session() {
        let (_, store) = store();
        let id = store.insert(session(&store)).await;
        store.cancel(id).await.unwrap();
        assert_matches!(store.cancel(id).await, Err(ImportError::SessionNotFound(_)));
    }

    #[test]
    fn snapshot_reflects_session() {
        let (_, store) = store();
        let s = session(&store);
        let snap = s.snapshot();
        assert_eq!(snap.state, SessionState::Uploaded);
        assert_eq!(snap.total_rows, 1);
        assert!(!snap.has_preview);
        assert_eq!(snap.expires_at - snap.created_at, chrono::Duration::minutes(30));
    }
}
