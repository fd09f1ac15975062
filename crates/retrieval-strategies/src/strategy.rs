use async_trait::async_trait;
use probe_transport::{FetchOutcome, FetchRequest};
use probe_types::{Deal, StorageProvider};
use tokio_util::sync::CancellationToken;

use crate::error::StrategyError;

/// A strategy's retry policy, per §4.4: "Each strategy's execution runs in
/// a retry loop defined by its `getRetryConfig()` (default `{attempts:1,
/// delayMs:0}`)."
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 1,
            delay_ms: 0,
        }
    }
}

/// Bounds a strategy expects a healthy SP to meet, surfaced for
/// observability only — never used to fail a retrieval outright.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectedMetrics {
    pub max_latency_ms: Option<u64>,
    pub min_throughput_bps: Option<f64>,
}

/// Outcome of a strategy's `validate`, per §4.4 step 3:
/// `{isValid, method, details, comparison?, bytesRead?, ttfb?}`.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub method: &'static str,
    pub details: serde_json::Value,
    pub bytes_read: Option<u64>,
    pub ttfb_ms: Option<u64>,
}

/// The explicit capability set every retrieval strategy implements, per §9's
/// "duck-typed strategy interface -> an explicit capability trait" note.
/// Strategies are registered at startup into a priority-ordered list
/// ([`crate::registry::StrategyRegistry`]).
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Stable name persisted as `Retrieval.service_type`.
    fn name(&self) -> &'static str;

    /// Lower values run/sort first, per §4.4: "all applicable strategies,
    /// sorted by priority asc."
    fn priority(&self) -> u8;

    /// Whether this strategy can run against `deal` at all (e.g. IPFS-block
    /// requires a `root_cid`).
    fn can_handle(&self, deal: &Deal) -> bool;

    /// Build the request this strategy issues against `sp` for `deal`.
    fn construct_url(&self, sp: &StorageProvider, deal: &Deal) -> Result<FetchRequest, StrategyError>;

    fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
    }

    fn expected_metrics(&self) -> Option<ExpectedMetrics> {
        None
    }

    /// Optional transform applied to a successful fetch before validation,
    /// per §4.4 step 2. Identity by default.
    fn preprocess(&self, outcome: FetchOutcome) -> FetchOutcome {
        outcome
    }

    /// Optional validation of the (possibly preprocessed) fetch outcome,
    /// per §4.4 step 3. Strategies with no meaningful validation (none in
    /// this harness, but the seam exists per §9) return `None`, and the
    /// retrieval is SUCCESS on transport success alone.
    async fn validate(
        &self,
        sp: &StorageProvider,
        deal: &Deal,
        outcome: &FetchOutcome,
        token: &CancellationToken,
    ) -> Option<ValidationOutcome>;
}
