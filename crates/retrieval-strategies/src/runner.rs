use std::sync::Arc;
use std::time::Duration;

use probe_transport::ProbeHttpClient;
use probe_types::{Deal, StorageProvider};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::strategy::RetrievalStrategy;

/// One strategy's final outcome after its retry loop, per §4.4: "Record one
/// Retrieval row per strategy, with status = SUCCESS iff the attempt
/// succeeded and validation passed (or no validation was configured)."
#[derive(Debug, Clone)]
pub struct StrategyRunOutcome {
    pub service_type: &'static str,
    pub retrieval_endpoint: String,
    pub success: bool,
    pub aborted: bool,
    pub latency_ms: Option<i64>,
    pub ttfb_ms: Option<i64>,
    pub throughput_bps: Option<f64>,
    pub bytes_retrieved: Option<i64>,
    pub response_code: Option<i32>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub validation_method: Option<String>,
    pub validation_details: Option<serde_json::Value>,
}

struct Attempt {
    success: bool,
    latency_ms: i64,
    ttfb_ms: Option<i64>,
    throughput_bps: Option<f64>,
    bytes_retrieved: Option<i64>,
    response_code: Option<i32>,
    error_message: Option<String>,
    validation_method: Option<String>,
    validation_details: Option<serde_json::Value>,
}

/// Run one strategy's retry loop against `sp`/`deal` and return the chosen
/// attempt, per §4.4. Between attempts the token is checked; on cancel the
/// loop exits immediately with `aborted = true` (mapped to the distinguished
/// `ABORTED` error / `failure.timedout` label by the caller).
pub async fn run_strategy(
    strategy: &Arc<dyn RetrievalStrategy>,
    client: &ProbeHttpClient,
    sp: &StorageProvider,
    deal: &Deal,
    token: &CancellationToken,
) -> StrategyRunOutcome {
    let config = strategy.retry_config();
    let request = match strategy.construct_url(sp, deal) {
        Ok(r) => r,
        Err(e) => {
            return StrategyRunOutcome {
                service_type: strategy.name(),
                retrieval_endpoint: String::new(),
                success: false,
                aborted: false,
                latency_ms: None,
                ttfb_ms: None,
                throughput_bps: None,
                bytes_retrieved: None,
                response_code: None,
                error_message: Some(e.to_string()),
                retry_count: 0,
                validation_method: None,
                validation_details: None,
            }
        }
    };

    let mut attempts: Vec<Attempt> = Vec::new();
    let mut aborted = false;

    for attempt_index in 0..config.attempts.max(1) {
        if token.is_cancelled() {
            aborted = true;
            break;
        }
        if attempt_index > 0 && config.delay_ms > 0 {
            tokio::select! {
                biased;
                _ = token.cancelled() => { aborted = true; break; }
                _ = tokio::time::sleep(Duration::from_millis(config.delay_ms)) => {}
            }
        }
        if aborted {
            break;
        }

        let attempt = run_one_attempt(strategy, client, sp, deal, &request, token).await;
        let attempt_succeeded = attempt.success;
        attempts.push(attempt);
        if attempt_succeeded {
            debug!(strategy = strategy.name(), attempt_index, "attempt succeeded");
        }
    }

    // §4.4: "Pick the best successful attempt (lowest latency)".
    let best_index = attempts
        .iter()
        .enumerate()
        .filter(|(_, a)| a.success)
        .min_by_key(|(_, a)| a.latency_ms)
        .map(|(i, _)| i);

    let chosen_index = best_index.unwrap_or_else(|| attempts.len().saturating_sub(1));
    let retry_count = chosen_index as i32;

    match attempts.into_iter().nth(chosen_index) {
        Some(chosen) => StrategyRunOutcome {
            service_type: strategy.name(),
            retrieval_endpoint: request.url,
            success: chosen.success,
            aborted,
            latency_ms: Some(chosen.latency_ms),
            ttfb_ms: chosen.ttfb_ms,
            throughput_bps: chosen.throughput_bps,
            bytes_retrieved: chosen.bytes_retrieved,
            response_code: chosen.response_code,
            error_message: chosen.error_message,
            retry_count,
            validation_method: chosen.validation_method,
            validation_details: chosen.validation_details,
        },
        None => StrategyRunOutcome {
            service_type: strategy.name(),
            retrieval_endpoint: request.url,
            success: false,
            aborted,
            latency_ms: None,
            ttfb_ms: None,
            throughput_bps: None,
            bytes_retrieved: None,
            response_code: None,
            error_message: Some(if aborted {
                "probe aborted before completion".to_string()
            } else {
                "no attempts executed".to_string()
            }),
            retry_count: 0,
            validation_method: None,
            validation_details: None,
        },
    }
}

async fn run_one_attempt(
    strategy: &Arc<dyn RetrievalStrategy>,
    client: &ProbeHttpClient,
    sp: &StorageProvider,
    deal: &Deal,
    request: &probe_transport::FetchRequest,
    token: &CancellationToken,
) -> Attempt {
    let fetched = match client.fetch(request, token).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let (response_code, error_message) = match &e {
                probe_transport::TransportError::BadStatus { status, preview, .. } => {
                    (Some(*status as i32), Some(format!("{status}: {preview}")))
                }
                other => (None, Some(other.to_string())),
            };
            return Attempt {
                success: false,
                latency_ms: 0,
                ttfb_ms: None,
                throughput_bps: None,
                bytes_retrieved: None,
                response_code,
                error_message,
                validation_method: None,
                validation_details: None,
            };
        }
    };

    let preprocessed = strategy.preprocess(fetched);
    let validation = strategy.validate(sp, deal, &preprocessed, token).await;

    let (success, validation_method, validation_details, error_message) = match &validation {
        Some(v) if v.is_valid => (true, Some(v.method.to_string()), Some(v.details.clone()), None),
        Some(v) => (
            false,
            Some(v.method.to_string()),
            Some(v.details.clone()),
            Some(format!("validation failed: {}", v.method)),
        ),
        None => (true, None, None, None),
    };

    Attempt {
        success,
        latency_ms: preprocessed.latency_ms as i64,
        ttfb_ms: Some(preprocessed.ttfb_ms as i64),
        throughput_bps: Some(preprocessed.throughput_bps),
        bytes_retrieved: Some(preprocessed.body.len() as i64),
        response_code: Some(preprocessed.status as i32),
        error_message,
        validation_method,
        validation_details,
    }
}
