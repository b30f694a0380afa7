//! Duplicate matching of imported rows against existing contacts.
//!
//! Email beats name. Among several same-name contacts the first in store
//! order is returned; there is no ranking beyond that.

use serde::{Deserialize, Serialize};

use crate::contact::{CanonicalField, Contact, ContactFields};
use crate::contact_store::ContactStore;
use crate::error::StoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Why a row was matched to an existing contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    Name,
    Email,
}

/// Reference to the existing contact a row most likely describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub existing_contact_id: DbId,
    pub match_reason: MatchReason,
}

/// What to do with one row at confirm time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportAction {
    Add,
    Update,
    Skip,
}

impl ImportAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Skip => "skip",
        }
    }
}

impl std::fmt::Display for ImportAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Find the best existing-contact candidate for a resolved row.
pub async fn find_duplicate(
    store: &dyn ContactStore,
    fields: &ContactFields,
) -> Result<Option<DuplicateMatch>, StoreError> {
    if let Some(email) = non_empty(fields, CanonicalField::Email) {
        let found = store
            .find_by_email(email)
            .await?
            .filter(|c| c.email.trim().to_lowercase() == email.to_lowercase());
        if let Some(contact) = found {
            return Ok(Some(DuplicateMatch {
                existing_contact_id: contact.id,
                match_reason: MatchReason::Email,
            }));
        }
    }

    let first = non_empty(fields, CanonicalField::Firstname);
    let last = non_empty(fields, CanonicalField::Lastname);
    if let (Some(first), Some(last)) = (first, last) {
        let candidates = store.find_by_name(first, last).await?;
        return Ok(candidates
            .into_iter()
            .find(|c| same_name(c, first, last))
            .map(|c| DuplicateMatch {
                existing_contact_id: c.id,
                match_reason: MatchReason::Name,
            }));
    }

    Ok(None)
}

/// Default disposition for a previewed row.
pub fn suggest_action(
    validation_errors: &[String],
    duplicate: Option<&DuplicateMatch>,
) -> ImportAction {
    if !validation_errors.is_empty() {
        ImportAction::Skip
    } else if duplicate.is_some() {
        ImportAction::Update
    } else {
        ImportAction::Add
    }
}

fn non_empty(fields: &ContactFields, field: CanonicalField) -> Option<&str> {
    fields
        .get(&field)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn same_name(contact: &Contact, first: &str, last: &str) -> bool {
    contact.firstname.trim().to_lowercase() == first.to_lowercase()
        && contact.lastname.trim().to_lowercase() == last.to_lowercase()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::ContactDraft;
    use crate::contact_store::InMemoryContactStore;

    async fn seed(store: &InMemoryContactStore, first: &str, last: &str, email: &str) -> DbId {
        let draft = ContactDraft {
            firstname: Some(first.into()),
            lastname: Some(last.into()),
            email: (!email.is_empty()).then(|| email.to_string()),
            ..Default::default()
        };
        store.create(&draft).await.unwrap().id
    }

    fn row(pairs: &[(CanonicalField, &str)]) -> ContactFields {
        pairs.iter().map(|(f, v)| (*f, v.to_string())).collect()
    }

    #[tokio::test]
    async fn email_match_wins_over_name_match() {
        let store = InMemoryContactStore::new();
        let a = seed(&store, "Alice", "Smith", "shared@example.com").await;
        let _b = seed(&store, "Jane", "Doe", "").await;

        let fields = row(&[
            (CanonicalField::Firstname, "Jane"),
            (CanonicalField::Lastname, "Doe"),
            (CanonicalField::Email, "SHARED@example.com"),
        ]);
        let m = find_duplicate(&store, &fields).await.unwrap().unwrap();
        assert_eq!(m.existing_contact_id, a);
        assert_eq!(m.match_reason, MatchReason::Email);
    }

    #[tokio::test]
    async fn unknown_email_falls_back_to_name_match() {
        let store = InMemoryContactStore::new();
        let id = seed(&store, "Jane", "Doe", "old@example.com").await;

        let fields = row(&[
            (CanonicalField::Firstname, "Jane"),
            (CanonicalField::Lastname, "Doe"),
            (CanonicalField::Email, "new@example.com"),
        ]);
        let m = find_duplicate(&store, &fields).await.unwrap().unwrap();
        assert_eq!(m.existing_contact_id, id);
        assert_eq!(m.match_reason, MatchReason::Name);
    }

    #[tokio::test]
    async fn unknown_email_and_unknown_name_is_no_match() {
        let store = InMemoryContactStore::new();
        seed(&store, "Jane", "Doe", "old@example.com").await;

        let fields = row(&[
            (CanonicalField::Firstname, "John"),
            (CanonicalField::Lastname, "Roe"),
            (CanonicalField::Email, "new@example.com"),
        ]);
        assert!(find_duplicate(&store, &fields).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_ascii_matching_ignores_case() {
        let store = InMemoryContactStore::new();
        let id = seed(&store, "Émile", "Öztürk", "émile@exämple.com").await;

        let by_name = row(&[
            (CanonicalField::Firstname, "ÉMILE"),
            (CanonicalField::Lastname, "ÖZTÜRK"),
        ]);
        let m = find_duplicate(&store, &by_name).await.unwrap().unwrap();
        assert_eq!(m.existing_contact_id, id);
        assert_eq!(m.match_reason, MatchReason::Name);

        let by_email = row(&[(CanonicalField::Email, "ÉMILE@EXÄMPLE.COM")]);
        let m = find_duplicate(&store, &by_email).await.unwrap().unwrap();
        assert_eq!(m.existing_contact_id, id);
        assert_eq!(m.match_reason, MatchReason::Email);
    }

    #[tokio::test]
    async fn name_match_is_trimmed_and_case_insensitive() {
        let store = InMemoryContactStore::new();
        let id = seed(&store, "Jane", "Doe", "").await;

        let fields = row(&[
            (CanonicalField::Firstname, "  jane"),
            (CanonicalField::Lastname, "DOE "),
        ]);
        let m = find_duplicate(&store, &fields).await.unwrap().unwrap();
        assert_eq!(m.existing_contact_id, id);
        assert_eq!(m.match_reason, MatchReason::Name);
    }

    #[tokio::test]
    async fn several_name_matches_pick_store_order() {
        let store = InMemoryContactStore::new();
        let first = seed(&store, "Jane", "Doe", "").await;
        seed(&store, "Jane", "Doe", "").await;

        let fields = row(&[
            (CanonicalField::Firstname, "Jane"),
            (CanonicalField::Lastname, "Doe"),
        ]);
        let m = find_duplicate(&store, &fields).await.unwrap().unwrap();
        assert_eq!(m.existing_contact_id, first);
    }

    #[tokio::test]
    async fn first_name_alone_never_matches() {
        let store = InMemoryContactStore::new();
        seed(&store, "Jane", "Doe", "").await;
        let fields = row(&[(CanonicalField::Firstname, "Jane")]);
        assert!(find_duplicate(&store, &fields).await.unwrap().is_none());
    }

    #[test]
    fn suggestion_rules() {
        let dup = DuplicateMatch {
            existing_contact_id: 1,
            match_reason: MatchReason::Name,
        };
        let errors = vec!["Missing required field 'firstname'".to_string()];
        assert_eq!(suggest_action(&[], None), ImportAction::Add);
        assert_eq!(suggest_action(&[], Some(&dup)), ImportAction::Update);
        assert_eq!(suggest_action(&errors, Some(&dup)), ImportAction::Skip);
        assert_eq!(suggest_action(&errors, None), ImportAction::Skip);
    }

    #[test]
    fn action_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&ImportAction::Update).unwrap(), "\"update\"");
        let a: ImportAction = serde_json::from_str("\"add\"").unwrap();
        assert_eq!(a, ImportAction::Add);
    }
}
