// Idle-resource cleanup (spec.md §4.7): periodically scans an external,
// injected resource (e.g. real-time call rooms) and marks any that no
// longer have participants as ended. Runs once at process start, then on
// a fixed interval.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};
use uuid::Uuid;

use crate::config::IngestionConfig;

/// The resource being probed (call rooms, live channel sessions, ...) lives
/// outside this crate, same reasoning as `IngestionWorker`.
#[async_trait]
pub trait ActiveResourceProbe: Send + Sync {
    async fn active_resource_ids(&self) -> anyhow::Result<Vec<Uuid>>;
    async fn has_participants(&self, resource_id: Uuid) -> anyhow::Result<bool>;
    async fn mark_ended(&self, resource_id: Uuid) -> anyhow::Result<()>;
}

pub struct CleanupLoop<P: ActiveResourceProbe + 'static> {
    probe: Arc<P>,
    interval: std::time::Duration,
}

impl<P: ActiveResourceProbe + 'static> CleanupLoop<P> {
    pub fn new(probe: P, config: &IngestionConfig) -> Self {
        Self { probe: Arc::new(probe), interval: config.cleanup_interval }
    }

    /// Spawns the loop as a background task and returns its handle.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.sweep().await;
            let mut ticker = tokio::time::interval(self.interval);
            ticker.tick().await; // consume the immediate first tick, already swept above
            loop {
                ticker.tick().await;
                self.sweep().await;
            }
        })
    }

    async fn sweep(&self) {
        let ids = match self.probe.active_resource_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "failed to list active resources during cleanup sweep");
                return;
            }
        };

        for id in ids {
            match self.probe.has_participants(id).await {
                Ok(true) => {}
                Ok(false) => {
                    if let Err(e) = self.probe.mark_ended(id).await {
                        error!(resource_id = %id, error = %e, "failed to mark idle resource ended");
                    }
                }
                Err(e) => warn!(resource_id = %id, error = %e, "failed to check resource participants"),
            }
        }
    }
}
