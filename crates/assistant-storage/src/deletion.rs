// C9 Admin Data-Deletion Coordinator (spec.md §4.9).
//
// The search-index deletion routine is an external collaborator (out of
// scope per spec.md §1's Non-goals) — callers provide one via
// `SearchIndexDeleter`. The coordinator's only job is sequencing: run the
// index deletion, then (if asked) clear queued sync jobs, and never abort
// mid-way — every service's outcome is recorded even if an earlier one
// failed.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::repositories::Database;

/// Filters a data-deletion request to a subset of services, plus whether
/// queued ingestion jobs for those services should also be cleared.
#[derive(Debug, Clone, Default)]
pub struct DeletionOptions {
    pub services_to_clear: Option<Vec<String>>,
    pub delete_sync_job: bool,
}

/// Per-service outcome of a deletion attempt. Idempotent: deleting data
/// that's already gone is a success, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDeletionOutcome {
    pub service: String,
    pub succeeded: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DataDeletionResult {
    pub email: String,
    pub services: Vec<ServiceDeletionOutcome>,
    pub sync_jobs_cleared: Option<u64>,
}

/// The external search-index deletion routine this coordinator invokes.
/// Implementations talk to whatever indexing backend the deployment uses;
/// this crate only defines the contract.
#[async_trait]
pub trait SearchIndexDeleter: Send + Sync {
    /// Deletes all indexed content for `email`, restricted to `services`
    /// when non-empty. Must be idempotent.
    async fn delete_for_email(&self, email: &str, services: &[String]) -> anyhow::Result<()>;
}

pub struct DeletionCoordinator<D: SearchIndexDeleter> {
    db: Database,
    deleter: D,
}

impl<D: SearchIndexDeleter> DeletionCoordinator<D> {
    pub fn new(db: Database, deleter: D) -> Self {
        Self { db, deleter }
    }

    /// Runs the deletion for `email`, scoped by `options`. Never
    /// short-circuits: a failed service is recorded and the remaining
    /// services still run.
    ///
    /// `user_id` is the caller-resolved identity behind `email` — mapping
    /// email to a user record is user/workspace CRUD, which this core
    /// treats as an external collaborator (spec.md §1's Non-goals). Pass
    /// `None` when the email has no matching user (the deletion is then
    /// index-only, and `sync_jobs_cleared` stays `None` even if requested).
    pub async fn delete_user_data(
        &self,
        email: &str,
        user_id: Option<Uuid>,
        options: DeletionOptions,
    ) -> DataDeletionResult {
        let services = options.services_to_clear.clone().unwrap_or_default();

        let index_outcome = self.deleter.delete_for_email(email, &services).await;

        let mut result = DataDeletionResult {
            email: email.to_string(),
            services: per_service_outcomes(&services, &index_outcome),
            sync_jobs_cleared: None,
        };

        if options.delete_sync_job {
            if let Some(user_id) = user_id {
                match self.clear_queued_sync_jobs(user_id, &services).await {
                    Ok(count) => result.sync_jobs_cleared = Some(count),
                    Err(e) => {
                        result.services.push(ServiceDeletionOutcome {
                            service: "sync_job_cleanup".to_string(),
                            succeeded: false,
                            error: Some(e.to_string()),
                        });
                    }
                }
            }
        }

        result
    }

    /// Cancels pending/running ingestion jobs owned by `user_id`,
    /// optionally scoped to `services` (matched against the connector's
    /// `app` tag).
    async fn clear_queued_sync_jobs(&self, user_id: Uuid, services: &[String]) -> anyhow::Result<u64> {
        let result = if services.is_empty() {
            sqlx::query(
                "UPDATE ingestion_jobs SET status = 'cancelled', updated_at = NOW() \
                 WHERE user_id = $1 AND status IN ('pending', 'running')",
            )
            .bind(user_id)
            .execute(self.db.pool())
            .await?
        } else {
            sqlx::query(
                "UPDATE ingestion_jobs j SET status = 'cancelled', updated_at = NOW() \
                 FROM connectors c \
                 WHERE j.connector_id = c.id AND j.user_id = $1 \
                   AND j.status IN ('pending', 'running') AND c.app = ANY($2)",
            )
            .bind(user_id)
            .bind(services)
            .execute(self.db.pool())
            .await?
        };

        Ok(result.rows_affected())
    }
}

/// Builds the per-service outcome list from one deletion attempt. When no
/// service subset was requested, the whole index deletion is reported
/// under a single synthetic `"search_index"` entry.
fn per_service_outcomes(
    services: &[String],
    outcome: &anyhow::Result<()>,
) -> Vec<ServiceDeletionOutcome> {
    let names: Vec<String> = if services.is_empty() {
        vec!["search_index".to_string()]
    } else {
        services.to_vec()
    };

    names
        .into_iter()
        .map(|service| match outcome {
            Ok(()) => ServiceDeletionOutcome { service, succeeded: true, error: None },
            Err(e) => ServiceDeletionOutcome { service, succeeded: false, error: Some(e.to_string()) },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscoped_deletion_reports_single_search_index_entry() {
        let outcomes = per_service_outcomes(&[], &Ok(()));
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].service, "search_index");
        assert!(outcomes[0].succeeded);
    }

    #[test]
    fn scoped_deletion_reports_one_entry_per_requested_service() {
        let services = vec!["mail".to_string(), "drive".to_string()];
        let outcomes = per_service_outcomes(&services, &Ok(()));
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.succeeded));
    }

    #[test]
    fn failed_deletion_marks_every_requested_service_failed_with_reason() {
        let services = vec!["mail".to_string()];
        let outcome: anyhow::Result<()> = Err(anyhow::anyhow!("index unreachable"));
        let outcomes = per_service_outcomes(&services, &outcome);
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].succeeded);
        assert_eq!(outcomes[0].error.as_deref(), Some("index unreachable"));
    }

    #[test]
    fn default_options_request_no_scoping_and_no_sync_job_clear() {
        let options = DeletionOptions::default();
        assert!(options.services_to_clear.is_none());
        assert!(!options.delete_sync_job);
    }
}
