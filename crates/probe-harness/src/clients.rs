use async_trait::async_trait;
use chain_gateway::{AccountInfo, ChainClient, ChainError, ChainEventRecord, IngestReceipt, RawProvider};
use retention_poller::{IndexClient, ProviderRetentionSnapshot, RetentionError};

/// Placeholder [`ChainClient`]. The chain SDK's wire protocol is external to
/// this crate (§6, §4.6): "this component only defines a `ChainClient`
/// trait... No concrete SDK wiring ships in this crate." Swap this out for a
/// real adapter before pointing the harness at a live network; every method
/// here fails fast rather than silently no-op, so a misconfigured
/// deployment is loud about it.
pub struct UnconfiguredChainClient;

#[async_trait]
impl ChainClient for UnconfiguredChainClient {
    async fn block_number(&self) -> Result<i64, ChainError> {
        Err(ChainError::Sdk("chain SDK not configured".to_string()))
    }
    async fn provider_count(&self) -> Result<i64, ChainError> {
        Err(ChainError::Sdk("chain SDK not configured".to_string()))
    }
    async fn provider(&self, _id: i64) -> Result<Option<RawProvider>, ChainError> {
        Err(ChainError::Sdk("chain SDK not configured".to_string()))
    }
    async fn all_active_providers(&self) -> Result<Vec<RawProvider>, ChainError> {
        Err(ChainError::Sdk("chain SDK not configured".to_string()))
    }
    async fn account_info(&self, _wallet_address: &str) -> Result<AccountInfo, ChainError> {
        Err(ChainError::Sdk("chain SDK not configured".to_string()))
    }
    async fn deposit(&self, _wallet_address: &str, _amount: u128) -> Result<(), ChainError> {
        Err(ChainError::Sdk("chain SDK not configured".to_string()))
    }
    async fn approve_service(
        &self,
        _wallet_address: &str,
        _rate_allowance: u128,
        _lockup_allowance: u128,
    ) -> Result<(), ChainError> {
        Err(ChainError::Sdk("chain SDK not configured".to_string()))
    }
    async fn ingest(&self, _sp_address: &str, _payload: &[u8]) -> Result<IngestReceipt, ChainError> {
        Err(ChainError::Sdk("chain SDK not configured".to_string()))
    }
    async fn anchor(&self, _sp_address: &str, _piece_cid: &str) -> Result<Vec<ChainEventRecord>, ChainError> {
        Err(ChainError::Sdk("chain SDK not configured".to_string()))
    }
}

/// Placeholder [`IndexClient`]; see [`UnconfiguredChainClient`] for the
/// rationale. The external proof/retention index's query protocol is out
/// of scope here (§6).
pub struct UnconfiguredIndexClient;

#[async_trait]
impl IndexClient for UnconfiguredIndexClient {
    async fn block_number(&self) -> Result<i64, RetentionError> {
        Err(RetentionError::Index("retention index not configured".to_string()))
    }
    async fn query_providers(
        &self,
        _addresses: &[String],
    ) -> Result<Vec<ProviderRetentionSnapshot>, RetentionError> {
        Err(RetentionError::Index("retention index not configured".to_string()))
    }
}
