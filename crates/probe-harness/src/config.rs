use std::time::Duration;

use job_planner::MaintenanceWindow;
use serde::Deserialize;

/// Every field named in §6's "Configuration" external interface, loaded
/// environment-first via `dotenvy` and layered with the `config` crate for
/// typed deserialization (§4.7's ambient-stack note).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub deal_interval_seconds: i64,
    pub retrieval_interval_seconds: i64,
    pub retention_interval_seconds: i64,
    pub metrics_rollup_interval_seconds: i64,

    pub deal_start_offset_seconds: i64,
    pub retrieval_start_offset_seconds: i64,
    pub metrics_base_offset_seconds: i64,

    pub maintenance_windows_utc: Vec<String>,
    pub maintenance_window_minutes: i64,

    pub use_only_approved_providers: bool,
    pub enable_ipni_testing: bool,

    pub http2_request_timeout_ms: u64,
    pub http_request_timeout_ms: u64,
    pub connect_timeout_ms: u64,

    pub ipfs_block_fetch_concurrency: usize,

    pub pool_max: u32,

    pub database_url: String,
    pub log_filter: String,

    pub queue_name: String,
    pub max_attempts: i32,
    pub worker_concurrency: usize,

    pub wallet_address: String,
    pub metrics_addr: String,

    pub sp_refresh_interval_seconds: u64,
    pub planner_tick_interval_seconds: u64,
    pub sweep_interval_seconds: u64,

    pub size_classes_bytes: Vec<usize>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            deal_interval_seconds: 3600,
            retrieval_interval_seconds: 3600,
            retention_interval_seconds: 3600,
            metrics_rollup_interval_seconds: 900,

            deal_start_offset_seconds: 0,
            retrieval_start_offset_seconds: 600,
            metrics_base_offset_seconds: 900,

            maintenance_windows_utc: Vec::new(),
            maintenance_window_minutes: 30,

            use_only_approved_providers: false,
            enable_ipni_testing: true,

            http2_request_timeout_ms: 45_000,
            http_request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,

            ipfs_block_fetch_concurrency: 6,

            pool_max: 10,

            database_url: String::new(),
            log_filter: "probe_harness=info".to_string(),

            queue_name: "probes".to_string(),
            max_attempts: 5,
            worker_concurrency: 8,

            wallet_address: "0xharness".to_string(),
            metrics_addr: "0.0.0.0:9100".to_string(),

            sp_refresh_interval_seconds: 300,
            planner_tick_interval_seconds: 5,
            sweep_interval_seconds: 30,

            size_classes_bytes: vec![4 * 1024, 256 * 1024, 4 * 1024 * 1024],
        }
    }
}

impl HarnessConfig {
    /// Load `.env` (if present) then layer environment variables over the
    /// defaults, per §6 and §4.7.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // `#[serde(default)]` on the struct falls back to `Self::default()`
        // for any field the environment doesn't set.
        let built = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;
        built.try_deserialize()
    }

    pub fn maintenance_windows(&self) -> Vec<MaintenanceWindow> {
        self.maintenance_windows_utc
            .iter()
            .filter_map(|hhmm| MaintenanceWindow::parse(hhmm, self.maintenance_window_minutes))
            .collect()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn http_request_timeout(&self) -> Duration {
        Duration::from_millis(self.http_request_timeout_ms)
    }

    pub fn http2_request_timeout(&self) -> Duration {
        Duration::from_millis(self.http2_request_timeout_ms)
    }

    /// Whole-pipeline deadline for the upload probe, per §4.3: "a
    /// whole-pipeline deadline equal to `dealIntervalSeconds - buffer`."
    pub fn deal_deadline(&self) -> Duration {
        const BUFFER_SECONDS: i64 = 30;
        Duration::from_secs((self.deal_interval_seconds - BUFFER_SECONDS).max(1) as u64)
    }

    /// Deadline for one retrieval test, mirroring `deal_deadline`'s buffer
    /// convention against `retrievalIntervalSeconds`.
    pub fn retrieval_deadline(&self) -> Duration {
        const BUFFER_SECONDS: i64 = 10;
        Duration::from_secs((self.retrieval_interval_seconds - BUFFER_SECONDS).max(1) as u64)
    }
}
