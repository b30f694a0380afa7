//! [`ContactStore`] backed by the `contacts` table.

use async_trait::async_trait;
use rapport_core::contact::{Contact, ContactDraft};
use rapport_core::contact_store::ContactStore;
use rapport_core::error::StoreError;
use rapport_core::types::DbId;

use crate::repositories::ContactRepo;
use crate::DbPool;

/// PostgreSQL contact store. Each call is its own statement; nothing is
/// held across calls.
#[derive(Debug, Clone)]
pub struct PgContactStore {
    pool: DbPool,
}

impl PgContactStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl ContactStore for PgContactStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Contact>, StoreError> {
        let row = ContactRepo::find_by_email(&self.pool, email)
            .await
            .map_err(backend)?;
        Ok(row.map(Contact::from))
    }

    async fn find_by_name(
        &self,
        firstname: &str,
        lastname: &str,
    ) -> Result<Vec<Contact>, StoreError> {
        let rows = ContactRepo::find_by_name(&self.pool, firstname, lastname)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(Contact::from).collect())
    }

    async fn create(&self, draft: &ContactDraft) -> Result<Contact, StoreError> {
        let row = ContactRepo::create(&self.pool, draft)
            .await
            .map_err(backend)?;
        tracing::debug!(contact_id = row.id, "Contact created");
        Ok(row.into())
    }

    async fn update(&self, id: DbId, draft: &ContactDraft) -> Result<Contact, StoreError> {
        let row = ContactRepo::update(&self.pool, id, draft)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound { id })?;
        tracing::debug!(contact_id = id, "Contact updated");
        Ok(row.into())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await.map_err(backend)
    }
}
