//! Periodic removal of expired import sessions.
//!
//! Sessions that a request currently holds are left alone and picked up by
//! a later sweep.

use std::sync::Arc;
use std::time::Duration;

use rapport_core::importer::ContactImporter;
use tokio_util::sync::CancellationToken;

/// Run the eviction loop until `cancel` is triggered.
pub async fn run(importer: Arc<ContactImporter>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Import session eviction started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Import session eviction stopping");
                break;
            }
            _ = ticker.tick() => {
                let evicted = importer.sessions().evict_expired().await;
                if evicted > 0 {
                    let remaining = importer.sessions().len().await;
                    tracing::info!(evicted, remaining, "Evicted expired import sessions");
                } else {
                    tracing::debug!("No expired import sessions");
                }
            }
        }
    }
}
