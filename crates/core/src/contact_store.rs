//! The contact store seam consumed by the importer, plus an in-memory
//! implementation.
//!
//! The importer never touches storage except through [`ContactStore`]. The
//! store is assumed to be safe for concurrent use on its own; the importer
//! never holds it across more than one call.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::contact::{Contact, ContactDraft};
use crate::error::StoreError;
use crate::types::DbId;

/// Storage operations the import pipeline needs.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Case-insensitive exact match on the email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<Contact>, StoreError>;

    /// Contacts whose trimmed first and last names match case-insensitively,
    /// in stable store order (ascending id).
    async fn find_by_name(&self, firstname: &str, lastname: &str)
        -> Result<Vec<Contact>, StoreError>;

    /// Create a contact; unset draft fields take their canonical defaults.
    async fn create(&self, draft: &ContactDraft) -> Result<Contact, StoreError>;

    /// Merge the set draft fields onto an existing contact.
    ///
    /// Returns [`StoreError::NotFound`] if the contact no longer exists.
    async fn update(&self, id: DbId, draft: &ContactDraft) -> Result<Contact, StoreError>;

    /// Whether the backing storage is reachable.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Draft application
// ---------------------------------------------------------------------------

/// Build a brand-new contact from a draft.
pub fn contact_from_draft(id: DbId, draft: &ContactDraft) -> Contact {
    let now = chrono::Utc::now();
    let mut contact = Contact {
        id,
        firstname: String::new(),
        lastname: String::new(),
        nickname: String::new(),
        gender: String::new(),
        email: String::new(),
        phone: String::new(),
        birthday: None,
        address: String::new(),
        how_we_met: String::new(),
        food_preference: String::new(),
        work_information: String::new(),
        contact_information: String::new(),
        circles: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    apply_draft(&mut contact, draft);
    contact
}

/// Overwrite only the fields the draft sets.
pub fn apply_draft(contact: &mut Contact, draft: &ContactDraft) {
    fn set(target: &mut String, value: &Option<String>) {
        if let Some(v) = value {
            target.clone_from(v);
        }
    }

    set(&mut contact.firstname, &draft.firstname);
    set(&mut contact.lastname, &draft.lastname);
    set(&mut contact.nickname, &draft.nickname);
    set(&mut contact.gender, &draft.gender);
    set(&mut contact.email, &draft.email);
    set(&mut contact.phone, &draft.phone);
    if draft.birthday.is_some() {
        contact.birthday = draft.birthday;
    }
    set(&mut contact.address, &draft.address);
    set(&mut contact.how_we_met, &draft.how_we_met);
    set(&mut contact.food_preference, &draft.food_preference);
    set(&mut contact.work_information, &draft.work_information);
    set(&mut contact.contact_information, &draft.contact_information);
    if let Some(circles) = &draft.circles {
        contact.circles.clone_from(circles);
    }
    contact.updated_at = chrono::Utc::now();
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// A [`ContactStore`] kept in process memory, ordered by insertion.
///
/// Writes for drafts whose email is registered via
/// [`InMemoryContactStore::reject_writes_for`] fail with a backend error,
/// which lets callers exercise per-row commit failures.
#[derive(Debug)]
pub struct InMemoryContactStore {
    contacts: RwLock<Vec<Contact>>,
    next_id: AtomicI64,
    rejected_emails: RwLock<HashSet<String>>,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self {
            contacts: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            rejected_emails: RwLock::new(HashSet::new()),
        }
    }

    /// Fetch a contact by id.
    pub async fn get(&self, id: DbId) -> Option<Contact> {
        self.contacts.read().await.iter().find(|c| c.id == id).cloned()
    }

    /// Snapshot of every stored contact, in store order.
    pub async fn all(&self) -> Vec<Contact> {
        self.contacts.read().await.clone()
    }

    /// Delete a contact. Returns `true` if one was removed.
    pub async fn remove(&self, id: DbId) -> bool {
        let mut contacts = self.contacts.write().await;
        let before = contacts.len();
        contacts.retain(|c| c.id != id);
        contacts.len() != before
    }

    /// Make every subsequent write carrying this email fail.
    pub async fn reject_writes_for(&self, email: &str) {
        self.rejected_emails
            .write()
            .await
            .insert(email.to_lowercase());
    }

    async fn check_writable(&self, draft: &ContactDraft) -> Result<(), StoreError> {
        if let Some(email) = &draft.email {
            if self.rejected_emails.read().await.contains(&email.to_lowercase()) {
                return Err(StoreError::Backend(format!("write rejected for {email}")));
            }
        }
        Ok(())
    }
}

impl Default for InMemoryContactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Contact>, StoreError> {
        let email = email.trim().to_lowercase();
        Ok(self
            .contacts
            .read()
            .await
            .iter()
            .find(|c| !c.email.is_empty() && c.email.trim().to_lowercase() == email)
            .cloned())
    }

    async fn find_by_name(
        &self,
        firstname: &str,
        lastname: &str,
    ) -> Result<Vec<Contact>, StoreError> {
        let (first, last) = (firstname.trim().to_lowercase(), lastname.trim().to_lowercase());
        Ok(self
            .contacts
            .read()
            .await
            .iter()
            .filter(|c| {
                c.firstname.trim().to_lowercase() == first
                    && c.lastname.trim().to_lowercase() == last
            })
            .cloned()
            .collect())
    }

    async fn create(&self, draft: &ContactDraft) -> Result<Contact, StoreError> {
        self.check_writable(draft).await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let contact = contact_from_draft(id, draft);
        self.contacts.write().await.push(contact.clone());
        Ok(contact)
    }

    async fn update(&self, id: DbId, draft: &ContactDraft) -> Result<Contact, StoreError> {
        self.check_writable(draft).await?;
        let mut contacts = self.contacts.write().await;
        let contact = contacts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound { id })?;
        apply_draft(contact, draft);
        Ok(contact.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn draft(first: &str, last: &str, email: &str) -> ContactDraft {
        ContactDraft {
            firstname: Some(first.to_string()),
            lastname: Some(last.to_string()),
            email: (!email.is_empty()).then(|| email.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_fills_defaults() {
        let store = InMemoryContactStore::new();
        let contact = store.create(&draft("Ann", "Lee", "")).await.unwrap();
        assert_eq!(contact.id, 1);
        assert_eq!(contact.firstname, "Ann");
        assert_eq!(contact.phone, "");
        assert!(contact.circles.is_empty());
        assert!(contact.birthday.is_none());
    }

    #[tokio::test]
    async fn email_lookup_is_case_insensitive() {
        let store = InMemoryContactStore::new();
        store.create(&draft("Ann", "Lee", "Ann@Example.com")).await.unwrap();
        let found = store.find_by_email("ann@example.COM").await.unwrap();
        assert_eq!(found.map(|c| c.firstname), Some("Ann".to_string()));
    }

    #[tokio::test]
    async fn lookups_fold_non_ascii_case() {
        let store = InMemoryContactStore::new();
        store.create(&draft("Émile", "Öztürk", "émile@exämple.com")).await.unwrap();

        let by_email = store.find_by_email("ÉMILE@EXÄMPLE.COM").await.unwrap();
        assert_eq!(by_email.map(|c| c.lastname), Some("Öztürk".to_string()));

        let by_name = store.find_by_name("ÉMILE", " ÖZTÜRK ").await.unwrap();
        assert_eq!(by_name.len(), 1);
    }

    #[tokio::test]
    async fn name_lookup_trims_and_keeps_store_order() {
        let store = InMemoryContactStore::new();
        store.create(&draft(" Ann ", "Lee", "")).await.unwrap();
        store.create(&draft("ann", "LEE", "")).await.unwrap();
        store.create(&draft("Bob", "Lee", "")).await.unwrap();

        let found = store.find_by_name("ANN", " lee").await.unwrap();
        let ids: Vec<_> = found.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn update_merges_only_set_fields() {
        let store = InMemoryContactStore::new();
        let mut initial = draft("Ann", "Lee", "ann@example.com");
        initial.phone = Some("555-0100".into());
        let created = store.create(&initial).await.unwrap();

        let patch = ContactDraft {
            nickname: Some("Annie".into()),
            ..Default::default()
        };
        let updated = store.update(created.id, &patch).await.unwrap();
        assert_eq!(updated.nickname, "Annie");
        assert_eq!(updated.phone, "555-0100");
        assert_eq!(updated.email, "ann@example.com");
    }

    #[tokio::test]
    async fn update_missing_contact_is_not_found() {
        let store = InMemoryContactStore::new();
        let result = store.update(99, &ContactDraft::default()).await;
        assert_matches!(result, Err(StoreError::NotFound { id: 99 }));
    }

    #[tokio::test]
    async fn rejected_email_fails_writes() {
        let store = InMemoryContactStore::new();
        store.reject_writes_for("bad@example.com").await;
        let result = store.create(&draft("Bad", "Row", "BAD@example.com")).await;
        assert_matches!(result, Err(StoreError::Backend(_)));
        assert!(store.all().await.is_empty());
    }
}
