// Stand-ins for collaborators explicitly out of scope for the core (spec.md
// §1 Non-goals: no vector search engine, no media transport). These let the
// HTTP surface wire up the orchestration machinery end to end without
// pretending to implement systems this repository doesn't own.

use async_trait::async_trait;
use uuid::Uuid;

use assistant_contracts::IngestionScope;
use assistant_core::{ConverseParams, CoreError, Driver};
use assistant_ingestion::{ActiveResourceProbe, ProgressReporter};
use assistant_storage::SearchIndexDeleter;

/// Driver used when no backend env vars resolve at boot, so the process can
/// still start and serve every non-chat route; any `/chat/*` call then fails
/// with the same `NoProviderConfigured` a mid-run misconfiguration would.
pub struct NoopDriver;

#[async_trait]
impl Driver for NoopDriver {
    async fn converse_stream(
        &self,
        _messages: Vec<assistant_contracts::Message>,
        _params: &ConverseParams,
        _cancel: tokio_util::sync::CancellationToken,
    ) -> assistant_core::Result<assistant_core::ConverseStream> {
        Err(CoreError::NoProviderConfigured)
    }
}

/// Ingestion worker that reports immediate completion. A real worker would
/// page through the connector's source app and write resume cursors via
/// `reporter`; that per-source scraping logic lives outside the core.
pub struct NoopIngestionWorker;

#[async_trait]
impl assistant_ingestion::IngestionWorker for NoopIngestionWorker {
    async fn run(&self, scope: &IngestionScope, reporter: &ProgressReporter) -> anyhow::Result<()> {
        tracing::info!(?scope, "noop ingestion worker: nothing to do, marking complete");
        reporter
            .write_websocket_progress(assistant_contracts::WebsocketProgress {
                total_items: Some(0),
                processed_items: 0,
                current_phase: Some("complete".into()),
            })
            .await?;
        Ok(())
    }
}

/// Always reports no active call rooms, so the cleanup loop is a no-op.
pub struct NoopActiveResourceProbe;

#[async_trait]
impl ActiveResourceProbe for NoopActiveResourceProbe {
    async fn active_resource_ids(&self) -> anyhow::Result<Vec<Uuid>> {
        Ok(Vec::new())
    }

    async fn has_participants(&self, _resource_id: Uuid) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn mark_ended(&self, _resource_id: Uuid) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Logs the deletion request instead of clearing a real search index.
pub struct NoopSearchIndexDeleter;

#[async_trait]
impl SearchIndexDeleter for NoopSearchIndexDeleter {
    async fn delete_for_email(&self, email: &str, services: &[String]) -> anyhow::Result<()> {
        tracing::info!(email, ?services, "noop search index deleter: nothing to clear");
        Ok(())
    }
}
