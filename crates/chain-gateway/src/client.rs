use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChainError;

/// A raw SP record as read off the chain registry, before §3's dedup rule
/// is applied and it becomes a [`probe_types::StorageProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawProvider {
    pub address: String,
    pub provider_id: i64,
    pub service_url: String,
    pub active: bool,
    pub approved: bool,
    pub metadata: serde_json::Value,
}

/// Wallet balance/allowance snapshot, per §4.6's `accountInfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountInfo {
    pub balance: u128,
    pub rate_allowance: u128,
    pub lockup_allowance: u128,
}

/// Receipt for one ingest call, per §4.3 step 3.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub piece_cid: String,
    pub received_at: DateTime<Utc>,
}

/// The distinct on-chain signals that advance a Deal past INGESTED, per
/// §4.3 step 4 and the Open Question resolved in `DESIGN.md`: each is a
/// separately observable event, emitted in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainEventKind {
    ChainConfirmed,
    PieceAdded,
    DealCreated,
}

#[derive(Debug, Clone)]
pub struct ChainEventRecord {
    pub kind: ChainEventKind,
    pub at: DateTime<Utc>,
}

/// Trait boundary over the opaque chain SDK, per §6. No concrete SDK wiring
/// ships in this crate — only this interface and the orchestration logic in
/// [`crate::provider_sync`] and [`crate::allowance`] that calls through it.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> Result<i64, ChainError>;
    async fn provider_count(&self) -> Result<i64, ChainError>;
    async fn provider(&self, id: i64) -> Result<Option<RawProvider>, ChainError>;
    async fn all_active_providers(&self) -> Result<Vec<RawProvider>, ChainError>;

    async fn account_info(&self, wallet_address: &str) -> Result<AccountInfo, ChainError>;
    async fn deposit(&self, wallet_address: &str, amount: u128) -> Result<(), ChainError>;
    async fn approve_service(
        &self,
        wallet_address: &str,
        rate_allowance: u128,
        lockup_allowance: u128,
    ) -> Result<(), ChainError>;

    /// §4.3 step 3: "invoking the chain gateway's upload primitive."
    async fn ingest(&self, sp_address: &str, payload: &[u8]) -> Result<IngestReceipt, ChainError>;

    /// §4.3 step 4: "submit the on-chain operation that makes the piece
    /// retrievable." Returns the ordered confirmation events observed while
    /// anchoring; the pipeline advances the Deal once per event, in order.
    async fn anchor(
        &self,
        sp_address: &str,
        piece_cid: &str,
    ) -> Result<Vec<ChainEventRecord>, ChainError>;
}
