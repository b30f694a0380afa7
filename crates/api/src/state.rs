use std::sync::Arc;

use rapport_core::contact_store::ContactStore;
use rapport_core::importer::ContactImporter;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Import orchestrator holding every live session.
    pub importer: Arc<ContactImporter>,
    /// The contact store the importer writes to (used for health reporting).
    pub store: Arc<dyn ContactStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
