use async_trait::async_trait;
use probe_transport::{FetchOutcome, FetchRequest};
use probe_types::{Deal, StorageProvider};
use tokio_util::sync::CancellationToken;

use crate::error::StrategyError;
use crate::strategy::{RetrievalStrategy, ValidationOutcome};

/// Fetch the piece straight from the SP's own HTTP surface, per §6:
/// `GET <serviceURL>/piece/<pieceCid>`.
pub struct DirectSpStrategy;

#[async_trait]
impl RetrievalStrategy for DirectSpStrategy {
    fn name(&self) -> &'static str {
        "direct-sp"
    }

    fn priority(&self) -> u8 {
        0
    }

    fn can_handle(&self, deal: &Deal) -> bool {
        deal.piece_cid.is_some()
    }

    fn construct_url(&self, sp: &StorageProvider, deal: &Deal) -> Result<FetchRequest, StrategyError> {
        let piece_cid = deal.piece_cid.as_ref().ok_or(StrategyError::NotApplicable {
            strategy: self.name(),
            deal_id: deal.id,
            why: "missing piece_cid",
        })?;
        let base = sp.service_url.trim_end_matches('/');
        Ok(FetchRequest::new(format!("{base}/piece/{piece_cid}")))
    }

    /// Direct-SP has no declared DAG to re-verify; a 2xx transport result is
    /// sufficient, matching §4.4's "or no validation was configured" clause.
    async fn validate(
        &self,
        _sp: &StorageProvider,
        _deal: &Deal,
        _outcome: &FetchOutcome,
        _token: &CancellationToken,
    ) -> Option<ValidationOutcome> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sp() -> StorageProvider {
        StorageProvider::new("0xsp", 1, "https://sp1.example")
    }

    fn deal_with_piece() -> Deal {
        let mut d = Deal::start("0xsp", "0xwallet", "payload.bin", 4096);
        d.piece_cid = Some("bafy2bzacea".to_string());
        d
    }

    #[test]
    fn can_handle_requires_piece_cid() {
        let strategy = DirectSpStrategy;
        assert!(strategy.can_handle(&deal_with_piece()));
        assert!(!strategy.can_handle(&Deal::start("0xsp", "0xwallet", "f", 1)));
    }

    #[test]
    fn constructs_piece_url() {
        let strategy = DirectSpStrategy;
        let req = strategy.construct_url(&sp(), &deal_with_piece()).unwrap();
        assert_eq!(req.url, "https://sp1.example/piece/bafy2bzacea");
    }

    #[test]
    fn rejects_deal_without_piece_cid() {
        let strategy = DirectSpStrategy;
        let mut deal = deal_with_piece();
        deal.piece_cid = None;
        deal.id = Uuid::new_v4();
        assert!(strategy.construct_url(&sp(), &deal).is_err());
    }
}
