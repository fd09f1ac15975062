#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("strategy {strategy} cannot handle deal {deal_id}: {why}")]
    NotApplicable {
        strategy: &'static str,
        deal_id: uuid::Uuid,
        why: &'static str,
    },

    #[error("transport error: {0}")]
    Transport(#[from] probe_transport::TransportError),

    #[error("invalid url: {0}")]
    Url(String),
}
