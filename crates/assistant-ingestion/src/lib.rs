// Background ingestion job orchestration (spec.md §4.7): schedules a
// worker in the background for an at-most-one-active-per-connector job,
// retries transient failures with backoff before escalating to `failed`,
// and runs the idle-resource cleanup sweep on a timer.

pub mod backoff;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod worker;

pub use cleanup::{ActiveResourceProbe, CleanupLoop};
pub use config::IngestionConfig;
pub use error::{IngestionError, Result};
pub use orchestrator::IngestionOrchestrator;
pub use progress::ProgressReporter;
pub use worker::IngestionWorker;
