use std::time::Duration;

/// Tunables for the background ingestion worker and the idle-room cleanup
/// loop (spec.md §4.7). Worker-local: none of this is persisted, so a
/// process restart resets retry counters but never the job row itself.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Transient failures retried before a job is marked `failed`.
    pub max_retries: u32,
    /// Base delay for the exponential backoff between retries.
    pub retry_initial_interval: Duration,
    /// Ceiling on the backoff delay.
    pub retry_max_interval: Duration,
    /// Interval on which the idle-resource cleanup loop re-scans.
    pub cleanup_interval: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_initial_interval: Duration::from_secs(1),
            retry_max_interval: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(120),
        }
    }
}

impl IngestionConfig {
    /// Reads overrides from the environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_u32("INGESTION_MAX_RETRIES", defaults.max_retries),
            retry_initial_interval: Duration::from_millis(env_u64(
                "INGESTION_RETRY_INITIAL_MS",
                defaults.retry_initial_interval.as_millis() as u64,
            )),
            retry_max_interval: Duration::from_millis(env_u64(
                "INGESTION_RETRY_MAX_MS",
                defaults.retry_max_interval.as_millis() as u64,
            )),
            cleanup_interval: Duration::from_secs(env_u64(
                "INGESTION_CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval.as_secs(),
            )),
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
