// Background execution of ingestion jobs (spec.md §4.7). `start_ingestion`
// returns as soon as the job row exists — the actual work runs on a spawned
// task and never propagates its result back to the caller; any failure,
// including a worker panic, is captured and written onto the job row.

use std::collections::HashMap;
use std::sync::Arc;

use assistant_contracts::{IngestionJob, IngestionJobStatus, IngestionScope};
use assistant_storage::Database;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backoff::delay_for_attempt;
use crate::config::IngestionConfig;
use crate::error::Result;
use crate::progress::ProgressReporter;
use crate::worker::IngestionWorker;

pub struct IngestionOrchestrator<W: IngestionWorker + 'static> {
    db: Database,
    worker: Arc<W>,
    config: IngestionConfig,
    active_jobs: Arc<RwLock<HashMap<Uuid, JoinHandle<()>>>>,
}

impl<W: IngestionWorker + 'static> IngestionOrchestrator<W> {
    pub fn new(db: Database, worker: W, config: IngestionConfig) -> Self {
        Self { db, worker: Arc::new(worker), config, active_jobs: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Validates `scope`, creates the job row (rejecting a second active job
    /// for the same `(user_id, connector_id)` per the storage layer's
    /// at-most-one-active invariant), and schedules the worker to run in the
    /// background. Returns the freshly created job immediately — the caller
    /// never waits on ingestion to finish.
    pub async fn start_ingestion(
        &self,
        user_id: Uuid,
        connector_id: Uuid,
        scope: IngestionScope,
    ) -> Result<IngestionJob> {
        scope.validate()?;
        let job = self.db.create_ingestion_job_if_absent(user_id, connector_id).await?;
        self.spawn(job.clone(), scope).await;
        Ok(job)
    }

    pub async fn is_running(&self, job_id: Uuid) -> bool {
        self.active_jobs.read().await.contains_key(&job_id)
    }

    pub async fn active_count(&self) -> usize {
        self.active_jobs.read().await.len()
    }

    async fn spawn(&self, job: IngestionJob, scope: IngestionScope) {
        let db = self.db.clone();
        let worker = self.worker.clone();
        let config = self.config.clone();
        let active_jobs = self.active_jobs.clone();
        let job_id = job.id;

        let handle = tokio::spawn(async move {
            // `run_job` itself runs inside a nested `tokio::spawn` so a panic
            // in `worker.run` (or anywhere else in the retry loop) surfaces
            // as an `Err` on this `JoinHandle` instead of aborting this outer
            // task before the `Failed` status write and `active_jobs`
            // cleanup below ever run.
            let inner_db = db.clone();
            let inner = tokio::spawn(run_job(inner_db, worker, config, job_id, scope));

            if let Err(join_err) = inner.await {
                if join_err.is_panic() {
                    error!(job_id = %job_id, "ingestion worker panicked, marking job failed");
                    let reporter = ProgressReporter::new(db.clone(), job_id);
                    let _ = reporter.record_last_error("ingestion worker panicked").await;
                    if let Err(e) = db.update_ingestion_job_status(job_id, IngestionJobStatus::Failed).await {
                        error!(job_id = %job_id, error = %e, "failed to mark panicked ingestion job failed");
                    }
                }
            }

            active_jobs.write().await.remove(&job_id);
        });

        self.active_jobs.write().await.insert(job_id, handle);
    }
}

/// The retry loop: runs `worker.run` until it succeeds, the job is
/// cancelled out from under it (e.g. by connector deletion), or retries are
/// exhausted — in which case the job is marked `failed` with the last error
/// recorded in its metadata. Takes its collaborators by owned/`Arc` value
/// (rather than by reference) so the caller can run it inside its own
/// nested `tokio::spawn`, isolating a worker panic to a `JoinHandle` the
/// caller can inspect instead of aborting the outer supervising task.
async fn run_job<W: IngestionWorker>(
    db: Database,
    worker: Arc<W>,
    config: IngestionConfig,
    job_id: Uuid,
    scope: IngestionScope,
) {
    if let Err(e) = db.update_ingestion_job_status(job_id, IngestionJobStatus::Running).await {
        error!(job_id = %job_id, error = %e, "failed to mark ingestion job running");
        return;
    }

    let reporter = ProgressReporter::new(db.clone(), job_id);
    let mut attempt: u32 = 0;

    loop {
        if job_was_cancelled(&db, job_id).await {
            info!(job_id = %job_id, "ingestion job cancelled, stopping worker");
            return;
        }

        let outcome = worker.run(&scope, &reporter).await;

        match outcome {
            Ok(()) => {
                if let Err(e) = db.update_ingestion_job_status(job_id, IngestionJobStatus::Succeeded).await {
                    error!(job_id = %job_id, error = %e, "failed to mark ingestion job succeeded");
                }
                return;
            }
            Err(e) if attempt < config.max_retries => {
                attempt += 1;
                warn!(job_id = %job_id, attempt, error = %e, "ingestion worker failed, retrying");
                let _ = reporter.record_last_error(&e.to_string()).await;
                tokio::time::sleep(delay_for_attempt(
                    attempt,
                    config.retry_initial_interval,
                    config.retry_max_interval,
                ))
                .await;
            }
            Err(e) => {
                error!(job_id = %job_id, attempts = attempt + 1, error = %e, "ingestion job failed, retries exhausted");
                let _ = reporter.record_last_error(&e.to_string()).await;
                if let Err(e) = db.update_ingestion_job_status(job_id, IngestionJobStatus::Failed).await {
                    error!(job_id = %job_id, error = %e, "failed to mark ingestion job failed");
                }
                return;
            }
        }
    }
}

async fn job_was_cancelled(db: &Database, job_id: Uuid) -> bool {
    matches!(
        db.get_ingestion_job(job_id).await,
        Ok(Some(job)) if job.status == IngestionJobStatus::Cancelled
    )
}
