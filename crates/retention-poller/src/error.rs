/// §4.5/§7: index batch failures are isolated per batch; a whole-cycle
/// error suppresses that cycle's stale-baseline cleanup but never aborts
/// sibling batches already applied.
#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    #[error("index query failed: {0}")]
    Index(String),

    #[error("metric registration/removal failed: {0}")]
    Metrics(#[from] prometheus::Error),
}
