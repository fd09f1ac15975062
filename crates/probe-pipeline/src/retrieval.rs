use probe_transport::ProbeHttpClient;
use probe_types::{Deal, Retrieval, RetrievalStatus};
use retrieval_strategies::{run_strategy, StrategyRegistry};
use tokio_util::sync::CancellationToken;

/// Run the full retrieval test for `deal` (§4.4): ask the registry for all
/// applicable strategies, execute them in parallel, and return one
/// [`Retrieval`] row per strategy.
///
/// Each row's status is SUCCESS iff the chosen attempt both succeeded and
/// (when configured) validated; see [`retrieval_strategies::run_strategy`].
pub async fn run_retrieval_probe(
    deal: &Deal,
    sp: &probe_types::StorageProvider,
    registry: &StrategyRegistry,
    client: &ProbeHttpClient,
    token: &CancellationToken,
) -> Vec<Retrieval> {
    let strategies = registry.applicable_for(deal);
    if strategies.is_empty() {
        return Vec::new();
    }

    let futures = strategies.iter().map(|strategy| {
        let strategy = strategy.clone();
        async move {
            let outcome = run_strategy(&strategy, client, sp, deal, token).await;
            let mut row = Retrieval::pending(deal.id, outcome.service_type, outcome.retrieval_endpoint.clone());
            row.latency_ms = outcome.latency_ms;
            row.ttfb_ms = outcome.ttfb_ms;
            row.throughput_bps = outcome.throughput_bps;
            row.bytes_retrieved = outcome.bytes_retrieved;
            row.response_code = outcome.response_code;
            row.error_message = outcome.error_message;
            row.retry_count = outcome.retry_count;
            row.validation_method = outcome.validation_method;
            row.validation_details = outcome.validation_details;
            row.finish(if outcome.success {
                RetrievalStatus::Success
            } else {
                RetrievalStatus::Failed
            });
            row
        }
    });

    futures::future::join_all(futures).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_transport::{ProbeHttpClient, TransportConfig};
    use probe_types::StorageProvider;
    use retrieval_strategies::{DirectSpStrategy, RetrievalStrategy};
    use std::sync::Arc;

    fn sp() -> StorageProvider {
        // Reserved, non-routable per RFC 5737; the request is expected to
        // fail fast rather than hang.
        StorageProvider::new("0xsp", 1, "http://192.0.2.1")
    }

    #[tokio::test]
    async fn no_applicable_strategies_yields_no_rows() {
        let deal = Deal::start("0xsp", "0xwallet", "payload.bin", 0);
        let registry = StrategyRegistry::new();
        let client = ProbeHttpClient::new(TransportConfig::default()).unwrap();
        let token = CancellationToken::new();

        let rows = run_retrieval_probe(&deal, &sp(), &registry, &client, &token).await;
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn records_one_row_per_applicable_strategy() {
        let mut deal = Deal::start("0xsp", "0xwallet", "payload.bin", 0);
        deal.piece_cid = Some("bafy-test".to_string());

        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(DirectSpStrategy));

        let client = ProbeHttpClient::new(TransportConfig::default()).unwrap();
        let token = CancellationToken::new();

        let rows = run_retrieval_probe(&deal, &sp(), &registry, &client, &token).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].service_type, DirectSpStrategy.name());
    }
}
