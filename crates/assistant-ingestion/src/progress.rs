use assistant_contracts::{IngestionJobMetadata, WebsocketProgress};
use assistant_storage::Database;
use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;

/// Handed to an `IngestionWorker` implementation so it can persist progress
/// without knowing about the database directly. Per spec.md §5, writes to
/// `ingestionState` are linearized by the single owning worker — this type
/// doesn't enforce that itself, it's only ever constructed by the
/// orchestrator for the one task driving a given job.
pub struct ProgressReporter {
    db: Database,
    job_id: Uuid,
}

impl ProgressReporter {
    pub fn new(db: Database, job_id: Uuid) -> Self {
        Self { db, job_id }
    }

    /// Overwrites the full metadata document (websocket-facing progress and
    /// worker-private resume state together).
    pub async fn write_metadata(&self, metadata: &IngestionJobMetadata) -> Result<()> {
        self.db.update_ingestion_job_metadata(self.job_id, metadata).await?;
        Ok(())
    }

    /// Convenience for the common case of only the client-visible counters
    /// changing; preserves whatever resume state is already on the row.
    pub async fn write_websocket_progress(&self, progress: WebsocketProgress) -> Result<()> {
        let mut metadata = self.current_metadata().await?;
        metadata.websocket_data = progress;
        self.write_metadata(&metadata).await
    }

    async fn current_metadata(&self) -> Result<IngestionJobMetadata> {
        Ok(self
            .db
            .get_ingestion_job(self.job_id)
            .await?
            .map(|job| job.metadata)
            .unwrap_or_default())
    }

    /// Stamps the last transient error onto the resume state without
    /// touching the job's status — used between retries, before the status
    /// is finally flipped to `failed` once retries are exhausted.
    pub(crate) async fn record_last_error(&self, message: &str) -> Result<()> {
        let mut metadata = self.current_metadata().await?;
        metadata.ingestion_state.last_error = Some(message.to_string());
        metadata.ingestion_state.last_updated = Some(Utc::now());
        self.write_metadata(&metadata).await
    }
}
