//! probe-harness — continuous storage-provider probe harness binary.
//!
//! Reads config from the environment (see `config::HarnessConfig`), then
//! wires C1-C9 into six long-running loops: SP-cache refresh, planner tick,
//! a dedicated retention-cycle loop, materialised-view rollup, queue sweep,
//! and a worker pool that drains `deal`/`retrieval` WorkItems through the
//! probe pipeline. A small axum server exposes `/metrics` for Prometheus
//! scraping.

mod clients;
mod config;
mod sp_cache;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use chain_gateway::{get_testing_providers, sync_providers, ChainClient, SelectionMode};
use clients::{UnconfiguredChainClient, UnconfiguredIndexClient};
use config::HarnessConfig;
use job_planner::{JobPlanner, PlannerConfig};
use observation_recorder::{
    provider_status_label, refresh_materialized_views, ObservationMetrics, ObservationRecorder,
};
use probe_pipeline::{run_retrieval_probe, run_upload_probe, UploadProbeConfig};
use probe_transport::{ProbeHttpClient, TransportConfig};
use prometheus::{Encoder, Registry, TextEncoder};
use retention_poller::{IndexClient, RetentionMetrics, RetentionPoller};
use retrieval_strategies::{DirectSpStrategy, IpfsBlockStrategy, StrategyRegistry};
use sp_cache::SpCache;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use work_queue::WorkQueue;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = HarnessConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .init();

    info!("starting probe harness");

    let pool = PgPoolOptions::new()
        .max_connections(config.pool_max)
        .connect(&config.database_url)
        .await?;

    let registry = Registry::new();
    let observation_metrics = ObservationMetrics::new(&registry)?;
    let retention_metrics = RetentionMetrics::new(&registry)?;

    let recorder = ObservationRecorder::new(pool.clone());
    let queue = WorkQueue::new(pool.clone());
    let sp_cache = SpCache::new();

    // The real chain/index SDK wiring is out of scope (§6); these placeholder
    // adapters fail loud so a deployment that forgets to supply real ones
    // notices immediately rather than silently probing nothing.
    let chain: Arc<dyn ChainClient> = Arc::new(UnconfiguredChainClient);
    let index: Arc<dyn IndexClient> = Arc::new(UnconfiguredIndexClient);

    let transport_config = TransportConfig {
        connect_timeout: config.connect_timeout(),
        http_request_timeout: config.http_request_timeout(),
        http2_request_timeout: config.http2_request_timeout(),
    };
    let http_client = Arc::new(ProbeHttpClient::new(transport_config)?);

    let mut strategies = StrategyRegistry::new();
    strategies.register(Arc::new(DirectSpStrategy));
    strategies.register(Arc::new(IpfsBlockStrategy::new(
        http_client.clone(),
        config.ipfs_block_fetch_concurrency,
    )));
    let strategies = Arc::new(strategies);

    let selection_mode = if config.use_only_approved_providers {
        SelectionMode::ApprovedOnly
    } else {
        SelectionMode::AllActive
    };

    let planner = Arc::new(JobPlanner::new(
        pool.clone(),
        queue.clone(),
        PlannerConfig {
            deal_interval_seconds: config.deal_interval_seconds,
            retrieval_interval_seconds: config.retrieval_interval_seconds,
            retention_interval_seconds: config.retention_interval_seconds,
            metrics_rollup_interval_seconds: config.metrics_rollup_interval_seconds,
            maintenance_windows: config.maintenance_windows(),
            queue_name: config.queue_name.clone(),
            max_attempts: config.max_attempts,
        },
    ));

    let shutdown = CancellationToken::new();

    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(sp_refresh_loop(
        chain.clone(),
        recorder.clone(),
        sp_cache.clone(),
        config.sp_refresh_interval_seconds,
        selection_mode,
        shutdown.clone(),
    )));

    tasks.push(tokio::spawn(planner_loop(
        planner.clone(),
        sp_cache.clone(),
        config.planner_tick_interval_seconds,
        shutdown.clone(),
    )));

    // Retention cycles own their baseline map exclusively (§5), so they run
    // on one dedicated task rather than being dispatched across the
    // generic worker pool.
    tasks.push(tokio::spawn(retention_loop(
        index.clone(),
        sp_cache.clone(),
        retention_metrics,
        config.retention_interval_seconds as u64,
        shutdown.clone(),
    )));

    tasks.push(tokio::spawn(sweep_loop(
        queue.clone(),
        config.sweep_interval_seconds,
        shutdown.clone(),
    )));

    // Materialised-view refresh has no per-SP parameter, so it runs off its
    // own interval timer rather than per-SP worker dispatch (DESIGN.md).
    tasks.push(tokio::spawn(rollup_loop(
        pool.clone(),
        config.metrics_rollup_interval_seconds.max(1) as u64,
        shutdown.clone(),
    )));

    for worker_id in 0..config.worker_concurrency {
        tasks.push(tokio::spawn(worker_loop(
            worker_id,
            queue.clone(),
            recorder.clone(),
            sp_cache.clone(),
            chain.clone(),
            strategies.clone(),
            http_client.clone(),
            observation_metrics.clone(),
            config.clone(),
            shutdown.clone(),
        )));
    }

    tasks.push(tokio::spawn(metrics_server(
        registry,
        config.metrics_addr.clone(),
        shutdown.clone(),
    )));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining tasks");
    shutdown.cancel();
    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}

async fn sp_refresh_loop(
    chain: Arc<dyn ChainClient>,
    recorder: ObservationRecorder,
    cache: SpCache,
    interval_seconds: u64,
    selection_mode: SelectionMode,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = interval.tick() => {}
        }

        match sync_providers(chain.as_ref()).await {
            Ok(providers) => {
                for sp in &providers {
                    if let Err(err) = recorder.upsert_storage_provider(sp).await {
                        error!(error = %err, address = %sp.address, "failed to persist storage provider");
                    }
                }
                let addresses: Vec<String> = providers.iter().map(|p| p.address.clone()).collect();
                if let Err(err) = recorder.deactivate_missing_providers(&addresses).await {
                    error!(error = %err, "failed to deactivate missing storage providers");
                }
                let testing = get_testing_providers(&providers, selection_mode);
                cache.reload(testing);
                info!(count = providers.len(), "refreshed storage provider cache");
            }
            Err(err) => warn!(error = %err, "storage provider sync failed, keeping stale cache"),
        }
    }
}

async fn planner_loop(
    planner: Arc<JobPlanner>,
    cache: SpCache,
    interval_seconds: u64,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = interval.tick() => {}
        }

        let active = cache.snapshot();
        match planner.tick(&active).await {
            Ok(Some(report)) => info!(?report, "planner tick"),
            Ok(None) => {}
            Err(err) => error!(error = %err, "planner tick failed"),
        }
    }
}

async fn retention_loop(
    index: Arc<dyn IndexClient>,
    cache: SpCache,
    metrics: RetentionMetrics,
    interval_seconds: u64,
    shutdown: CancellationToken,
) {
    let mut poller = RetentionPoller::new(metrics);
    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = interval.tick() => {}
        }

        let active = cache.snapshot();
        match poller.run_cycle(index.as_ref(), &active).await {
            Ok(report) => info!(?report, "retention cycle complete"),
            Err(err) => error!(error = %err, "retention cycle failed"),
        }
    }
}

async fn sweep_loop(queue: WorkQueue, interval_seconds: u64, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = interval.tick() => {}
        }

        if let Err(err) = queue.sweep().await {
            error!(error = %err, "queue sweep failed");
        }
    }
}

/// Refreshes `sp_performance_last_week`/`sp_performance_all_time` on its own
/// cadence (§4.7/§6), independent of the `metrics_rollup` WorkItem family
/// that `dispatch` treats as a no-op on the generic worker pool.
async fn rollup_loop(pool: sqlx::PgPool, interval_seconds: u64, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = interval.tick() => {}
        }

        if let Err(err) = refresh_materialized_views(&pool).await {
            error!(error = %err, "materialised view refresh failed");
        }
    }
}

/// Outcome of [`dispatch`], distinguishing a deadline/shutdown abort from an
/// ordinary failure. §5/§7: an aborted probe is "completed... as timed-out
/// (not retried by the queue; the planner will re-publish on the next
/// tick)," unlike an ordinary failure, which goes through the queue's
/// retry/backoff path.
enum DispatchError {
    Aborted,
    Failed(String),
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker_id: usize,
    queue: WorkQueue,
    recorder: ObservationRecorder,
    cache: SpCache,
    chain: Arc<dyn ChainClient>,
    strategies: Arc<StrategyRegistry>,
    http_client: Arc<ProbeHttpClient>,
    metrics: ObservationMetrics,
    config: HarnessConfig,
    shutdown: CancellationToken,
) {
    let poll_interval = Duration::from_secs(1);
    loop {
        if shutdown.is_cancelled() {
            return;
        }

        let fetched = queue
            .fetch(&config.queue_name, 1, Duration::from_secs(300))
            .await;
        let items = match fetched {
            Ok(items) => items,
            Err(err) => {
                error!(worker_id, error = %err, "work item fetch failed");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        if items.is_empty() {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(poll_interval) => {}
            }
            continue;
        }

        for item in items {
            let family = item.payload.get("family").and_then(|v| v.as_str()).unwrap_or_default();
            let sp_address = item
                .payload
                .get("sp_address")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            let result = dispatch(
                family,
                &sp_address,
                &recorder,
                &cache,
                chain.as_ref(),
                &strategies,
                &http_client,
                &metrics,
                &config,
                &shutdown,
            )
            .await;

            match result {
                Ok(()) => {
                    if let Err(err) = queue.complete(item.id).await {
                        error!(worker_id, id = item.id, error = %err, "failed to mark work item complete");
                    }
                }
                Err(DispatchError::Aborted) => {
                    // Timed out or cancelled: complete, don't retry, so the
                    // singleton frees up for the planner's next re-publish.
                    if let Err(err) = queue.complete(item.id).await {
                        error!(worker_id, id = item.id, error = %err, "failed to mark aborted work item complete");
                    }
                }
                Err(DispatchError::Failed(message)) => {
                    if let Err(err) = queue.fail(item.id, &message).await {
                        error!(worker_id, id = item.id, error = %err, "failed to mark work item failed");
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn dispatch(
    family: &str,
    sp_address: &str,
    recorder: &ObservationRecorder,
    cache: &SpCache,
    chain: &dyn ChainClient,
    strategies: &StrategyRegistry,
    http_client: &ProbeHttpClient,
    metrics: &ObservationMetrics,
    config: &HarnessConfig,
    shutdown: &CancellationToken,
) -> Result<(), DispatchError> {
    match family {
        "deal" => {
            let Some(sp) = cache.find(sp_address) else {
                return Err(DispatchError::Failed(format!(
                    "unknown storage provider {sp_address}"
                )));
            };
            let provider_status = provider_status_label(sp.approved);
            let mut deal = probe_types::Deal::start(
                sp.address.clone(),
                config.wallet_address.clone(),
                "probe-payload.bin",
                0,
            );
            metrics.record_status("deal", sp.provider_id, provider_status, "pending");

            let upload_config = UploadProbeConfig {
                size_classes: config.size_classes_bytes.clone(),
                enable_ipni: config.enable_ipni_testing,
            };
            let token = CancellationToken::new();
            let deadline = config.deal_deadline();

            let outcome = tokio::select! {
                result = run_upload_probe(&mut deal, chain, &upload_config, &token) => result,
                _ = tokio::time::sleep(deadline) => {
                    token.cancel();
                    Err(probe_pipeline::PipelineError::Aborted)
                }
                _ = shutdown.cancelled() => {
                    token.cancel();
                    Err(probe_pipeline::PipelineError::Aborted)
                }
            };

            if let Some(latency) = deal.deal_latency_ms {
                metrics.observe_check_duration("deal", sp.provider_id, provider_status, latency as f64);
            }

            let status_label = match &outcome {
                Ok(()) => "success".to_string(),
                Err(e) => e.status_label(),
            };
            metrics.record_status("deal", sp.provider_id, provider_status, &status_label);

            recorder
                .upsert_deal(&deal)
                .await
                .map_err(|e| DispatchError::Failed(e.to_string()))?;

            match outcome {
                Ok(()) => Ok(()),
                Err(probe_pipeline::PipelineError::Aborted) => Err(DispatchError::Aborted),
                Err(e) => Err(DispatchError::Failed(e.to_string())),
            }
        }
        "retrieval" => {
            let Some(sp) = cache.find(sp_address) else {
                return Err(DispatchError::Failed(format!(
                    "unknown storage provider {sp_address}"
                )));
            };
            let provider_status = provider_status_label(sp.approved);
            let deal = recorder
                .latest_deal_for_sp(sp_address)
                .await
                .map_err(|e| DispatchError::Failed(e.to_string()))?;
            let Some(deal) = deal else {
                // No DEAL_CREATED deal to retrieve against yet; logged and
                // skipped per §7's handling of missing prerequisites.
                warn!(sp_address, "no deal-created deal found, skipping retrieval probe");
                return Ok(());
            };

            metrics.record_status("retrieval", sp.provider_id, provider_status, "pending");
            let token = CancellationToken::new();
            let deadline = config.retrieval_deadline();
            let mut aborted = false;

            let rows = tokio::select! {
                rows = run_retrieval_probe(&deal, &sp, strategies, http_client, &token) => rows,
                _ = tokio::time::sleep(deadline) => {
                    token.cancel();
                    aborted = true;
                    Vec::new()
                }
                _ = shutdown.cancelled() => {
                    token.cancel();
                    aborted = true;
                    Vec::new()
                }
            };

            for row in &rows {
                let label = match row.status {
                    probe_types::RetrievalStatus::Success => "success".to_string(),
                    probe_types::RetrievalStatus::Failed => "failure.validation".to_string(),
                    probe_types::RetrievalStatus::Pending => "pending".to_string(),
                };
                metrics.record_status("retrieval", sp.provider_id, provider_status, &label);
                if let Some(code) = row.response_code {
                    metrics.record_http_response_code("retrieval", sp.provider_id, provider_status, code);
                }
                if let Some(ttfb) = row.ttfb_ms {
                    metrics.observe_first_byte_ms("retrieval", sp.provider_id, provider_status, ttfb as f64);
                }
                if let Some(latency) = row.latency_ms {
                    metrics.observe_last_byte_ms("retrieval", sp.provider_id, provider_status, latency as f64);
                }
                if let Some(throughput) = row.throughput_bps {
                    metrics.observe_throughput("retrieval", sp.provider_id, provider_status, throughput);
                }
            }

            if aborted {
                metrics.record_status("retrieval", sp.provider_id, provider_status, "failure.timedout");
            }

            recorder
                .record_retrievals(&rows)
                .await
                .map_err(|e| DispatchError::Failed(e.to_string()))?;

            if aborted {
                Err(DispatchError::Aborted)
            } else {
                Ok(())
            }
        }
        "retention" | "metrics_rollup" => {
            // These families are materialised by the planner for
            // `job_schedule_state` visibility, but the actual work runs on
            // its own dedicated loop (retention) or interval timer
            // (materialised-view refresh, see `rollup_loop`), never via the
            // generic worker pool. See DESIGN.md.
            Ok(())
        }
        other => Err(DispatchError::Failed(format!("unknown job family {other}"))),
    }
}

async fn metrics_server(registry: Registry, addr: String, shutdown: CancellationToken) {
    let app_registry = Arc::new(registry);
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let registry = app_registry.clone();
            async move { render_metrics(&registry) }
        }),
    );

    let addr: SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, addr, "invalid metrics bind address");
            return;
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, "failed to bind metrics listener");
            return;
        }
    };

    info!(%addr, "metrics endpoint listening");
    let serve = axum::serve(listener, app);
    tokio::select! {
        result = serve => {
            if let Err(err) = result {
                error!(error = %err, "metrics server exited");
            }
        }
        _ = shutdown.cancelled() => {}
    }
}

fn render_metrics(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let families = registry.gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut buffer) {
        error!(error = %err, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
