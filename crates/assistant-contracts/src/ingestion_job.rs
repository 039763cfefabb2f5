// IngestionJob: a resumable unit of work bound to a (user, connector) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum IngestionJobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl IngestionJobStatus {
    /// Whether a job in this status counts against the at-most-one-active invariant.
    pub fn is_active(self) -> bool {
        matches!(self, IngestionJobStatus::Pending | IngestionJobStatus::Running)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            IngestionJobStatus::Succeeded | IngestionJobStatus::Failed | IngestionJobStatus::Cancelled
        )
    }
}

/// Progress totals safe to broadcast to clients over the websocket/SSE bus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WebsocketProgress {
    pub total_items: Option<u64>,
    pub processed_items: u64,
    pub current_phase: Option<String>,
}

/// Per-source cursors and resume bookkeeping, private to the owning worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IngestionResumeState {
    /// Cursor per logical source (e.g. "gmail" -> page token).
    #[serde(default)]
    pub cursors: HashMap<String, String>,
    pub date_start: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
    /// Index into an ordered work list (e.g. channel list) the worker was processing.
    pub current_index: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Full `metadata` document persisted on the job row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IngestionJobMetadata {
    pub websocket_data: WebsocketProgress,
    pub ingestion_state: IngestionResumeState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IngestionJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub connector_id: Uuid,
    pub status: IngestionJobStatus,
    pub metadata: IngestionJobMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Scope controls accepted on ingestion-creating endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IngestionScope {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub include_bot_messages: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestionScopeError {
    #[error("startDate must not be after endDate")]
    InvertedDateRange,
}

impl IngestionScope {
    /// Validates the start/end date ordering; empty bounds are "unbounded".
    pub fn validate(&self) -> Result<(), IngestionScopeError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(IngestionScopeError::InvertedDateRange);
            }
        }
        Ok(())
    }
}
