/// Chain-kind errors, per §7: "SDK-reported failures during ingest or
/// approval. Deal transitions to FAILED with errorMessage. Wallet allowance
/// failures at startup are fatal."
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("chain SDK error: {0}")]
    Sdk(String),

    #[error("provider {0} not found on chain")]
    ProviderNotFound(i64),

    #[error("wallet {wallet} allowance deficient: needs {needed}, has {have}")]
    AllowanceDeficient {
        wallet: String,
        needed: u128,
        have: u128,
    },
}
