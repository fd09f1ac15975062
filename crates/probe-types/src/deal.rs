use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProbeError;

/// Lifecycle state of a Deal (one upload probe), per §3.
///
/// Forward-only: a Deal's status is monotone along `Pending -> Ingested ->
/// ChainConfirmed -> PieceAdded -> DealCreated`, with `Failed` reachable from
/// any non-terminal state. [`DealStatus::can_advance_to`] is the single
/// source of truth for which edges are legal, so the pipeline and tests agree
/// on invariant 2 in §8 (the recorded status sequence is always a prefix of
/// some valid forward path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum DealStatus {
    Pending,
    Ingested,
    ChainConfirmed,
    PieceAdded,
    DealCreated,
    Failed,
}

impl DealStatus {
    /// Rank along the forward path; `Failed` has no rank since it is
    /// reachable from anywhere and is not itself part of the forward chain.
    fn rank(self) -> Option<u8> {
        match self {
            DealStatus::Pending => Some(0),
            DealStatus::Ingested => Some(1),
            DealStatus::ChainConfirmed => Some(2),
            DealStatus::PieceAdded => Some(3),
            DealStatus::DealCreated => Some(4),
            DealStatus::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DealStatus::DealCreated | DealStatus::Failed)
    }

    /// True if `self -> to` is a legal edge: any non-terminal state may fail,
    /// and the forward chain only ever moves to a strictly higher rank.
    pub fn can_advance_to(self, to: DealStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if to == DealStatus::Failed {
            return true;
        }
        match (self.rank(), to.rank()) {
            (Some(from_rank), Some(to_rank)) => to_rank > from_rank,
            _ => false,
        }
    }
}

/// One upload probe against one storage provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Deal {
    pub id: Uuid,
    pub sp_address: String,
    pub wallet_address: String,
    pub piece_cid: Option<String>,
    pub root_cid: Option<String>,
    pub file_size: i64,
    pub file_name: String,
    pub status: DealStatus,
    pub ingest_latency_ms: Option<i64>,
    pub chain_latency_ms: Option<i64>,
    pub deal_latency_ms: Option<i64>,
    pub ingest_throughput_bps: Option<f64>,
    pub service_types: Vec<String>,
    pub metadata: serde_json::Value,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    /// Start a new Deal in PENDING, per §4.3 step 1.
    pub fn start(sp_address: impl Into<String>, wallet_address: impl Into<String>, file_name: impl Into<String>, file_size: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sp_address: sp_address.into(),
            wallet_address: wallet_address.into(),
            piece_cid: None,
            root_cid: None,
            file_size,
            file_name: file_name.into(),
            status: DealStatus::Pending,
            ingest_latency_ms: None,
            chain_latency_ms: None,
            deal_latency_ms: None,
            ingest_throughput_bps: None,
            service_types: Vec::new(),
            metadata: serde_json::json!({}),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance to `to`, enforcing the forward-only invariant (§3 invariant 1).
    pub fn advance(&mut self, to: DealStatus) -> Result<(), ProbeError> {
        if !self.status.can_advance_to(to) {
            return Err(ProbeError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn fail(&mut self, err: &ProbeError) {
        crate::error::fail_deal(self, err);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_chain_is_monotone() {
        let mut deal = Deal::start("0xsp", "0xwallet", "payload.bin", 4096);
        assert!(deal.advance(DealStatus::Ingested).is_ok());
        assert!(deal.advance(DealStatus::ChainConfirmed).is_ok());
        assert!(deal.advance(DealStatus::PieceAdded).is_ok());
        assert!(deal.advance(DealStatus::DealCreated).is_ok());
        assert_eq!(deal.status, DealStatus::DealCreated);
    }

    #[test]
    fn cannot_skip_backwards() {
        let mut deal = Deal::start("0xsp", "0xwallet", "payload.bin", 4096);
        deal.advance(DealStatus::ChainConfirmed).unwrap();
        let err = deal.advance(DealStatus::Ingested).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidTransition { .. }));
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut deal = Deal::start("0xsp", "0xwallet", "payload.bin", 4096);
        deal.advance(DealStatus::Ingested).unwrap();
        deal.advance(DealStatus::ChainConfirmed).unwrap();
        deal.advance(DealStatus::PieceAdded).unwrap();
        deal.advance(DealStatus::DealCreated).unwrap();
        assert!(deal.advance(DealStatus::Failed).is_err());
    }

    #[test]
    fn any_non_terminal_state_can_fail() {
        let mut deal = Deal::start("0xsp", "0xwallet", "payload.bin", 4096);
        assert!(deal.advance(DealStatus::Failed).is_ok());
    }
}
