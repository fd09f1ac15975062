use std::sync::Arc;

use async_trait::async_trait;
use cid::Cid;
use probe_transport::{FetchOutcome, FetchRequest, ProbeHttpClient};
use probe_types::{Deal, StorageProvider};
use tokio_util::sync::CancellationToken;

use crate::dag_validate::validate_dag;
use crate::error::StrategyError;
use crate::strategy::{RetryConfig, RetrievalStrategy, ValidationOutcome};

/// Retrieve and validate the declared block-addressed DAG via the SP's IPFS
/// gateway surface, per §6: `GET <serviceURL>/ipfs/<cid>?format=raw` with
/// `Accept: application/vnd.ipld.raw`.
pub struct IpfsBlockStrategy {
    client: Arc<ProbeHttpClient>,
    concurrency: usize,
}

impl IpfsBlockStrategy {
    pub fn new(client: Arc<ProbeHttpClient>, concurrency: usize) -> Self {
        Self { client, concurrency }
    }
}

#[async_trait]
impl RetrievalStrategy for IpfsBlockStrategy {
    fn name(&self) -> &'static str {
        "ipfs-block"
    }

    fn priority(&self) -> u8 {
        10
    }

    fn can_handle(&self, deal: &Deal) -> bool {
        deal.piece_cid.is_some() && deal.root_cid.is_some()
    }

    fn construct_url(&self, sp: &StorageProvider, deal: &Deal) -> Result<FetchRequest, StrategyError> {
        let root_cid = deal.root_cid.as_ref().ok_or(StrategyError::NotApplicable {
            strategy: self.name(),
            deal_id: deal.id,
            why: "missing root_cid",
        })?;
        let base = sp.service_url.trim_end_matches('/');
        Ok(FetchRequest::new(format!("{base}/ipfs/{root_cid}?format=raw"))
            .with_accept("application/vnd.ipld.raw"))
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            attempts: 2,
            delay_ms: 500,
        }
    }

    /// Ignores the root-block `outcome` fetched by the attempt loop and
    /// re-walks the whole DAG from `deal.root_cid`, per §4.4's DAG-traversal
    /// validation (distinct from the CAR-stream validator in C3, which
    /// validates a single contiguous archive rather than a fan-out DAG).
    async fn validate(
        &self,
        sp: &StorageProvider,
        deal: &Deal,
        _outcome: &FetchOutcome,
        token: &CancellationToken,
    ) -> Option<ValidationOutcome> {
        let root_cid = deal.root_cid.as_ref()?;
        let root: Cid = match root_cid.parse() {
            Ok(c) => c,
            Err(e) => {
                return Some(ValidationOutcome {
                    is_valid: false,
                    method: "ipfs-dag-walk",
                    details: serde_json::json!({ "error": format!("bad root cid: {e}") }),
                    bytes_read: None,
                    ttfb_ms: None,
                })
            }
        };

        let result = validate_dag(&self.client, &sp.service_url, root, self.concurrency, token).await;
        Some(ValidationOutcome {
            is_valid: result.is_valid,
            method: "ipfs-dag-walk",
            details: serde_json::json!({
                "blocks_visited": result.blocks_visited,
                "errors": result.errors,
            }),
            bytes_read: Some(result.bytes_read),
            ttfb_ms: result.ttfb_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_transport::TransportConfig;

    fn sp() -> StorageProvider {
        StorageProvider::new("0xsp", 1, "https://sp1.example")
    }

    fn deal_with_root() -> Deal {
        let mut d = Deal::start("0xsp", "0xwallet", "payload.bin", 4096);
        d.piece_cid = Some("bafy2bzacea".to_string());
        d.root_cid = Some("bafy2bzacedroot".to_string());
        d
    }

    #[test]
    fn can_handle_requires_piece_and_root() {
        let strategy = IpfsBlockStrategy::new(
            Arc::new(ProbeHttpClient::new(TransportConfig::default()).unwrap()),
            6,
        );
        assert!(strategy.can_handle(&deal_with_root()));
        let mut missing_root = deal_with_root();
        missing_root.root_cid = None;
        assert!(!strategy.can_handle(&missing_root));
    }

    #[test]
    fn constructs_ipfs_raw_url() {
        let strategy = IpfsBlockStrategy::new(
            Arc::new(ProbeHttpClient::new(TransportConfig::default()).unwrap()),
            6,
        );
        let req = strategy.construct_url(&sp(), &deal_with_root()).unwrap();
        assert_eq!(req.url, "https://sp1.example/ipfs/bafy2bzacedroot?format=raw");
        assert_eq!(req.accept.as_deref(), Some("application/vnd.ipld.raw"));
    }
}
