use assistant_contracts::IngestionScope;
use async_trait::async_trait;

use crate::progress::ProgressReporter;

/// The actual per-source ingestion work (mail/drive/chat scraping, indexing
/// into the vector search engine) lives outside this crate — it's injected
/// here the same way `assistant-tools::McpTransport` and
/// `assistant-storage::deletion::SearchIndexDeleter` stand in for
/// collaborators this codebase doesn't implement.
///
/// `run` is expected to call `reporter.write_progress`/`write_resume_state`
/// after each atomic unit of work so a retry (or a future resumed run) can
/// pick up from the last committed cursor instead of starting over.
#[async_trait]
pub trait IngestionWorker: Send + Sync {
    async fn run(&self, scope: &IngestionScope, reporter: &ProgressReporter) -> anyhow::Result<()>;
}
