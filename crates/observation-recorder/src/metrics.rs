use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

use crate::error::RecorderError;

/// Histograms and counters labelled `(checkType, providerId, providerStatus)`
/// per §4.7. `recordStatus(pending)` is emitted before a probe starts; the
/// final status is a second, distinct increment under its own label value,
/// not a mutation of the first — so both `pending` and the terminal status
/// show up in the counter's time series for the same probe.
#[derive(Clone)]
pub struct ObservationMetrics {
    first_byte_ms: HistogramVec,
    last_byte_ms: HistogramVec,
    throughput: HistogramVec,
    check_duration_ms: HistogramVec,
    status: IntCounterVec,
    http_response_code: IntCounterVec,
}

const LABELS: &[&str] = &["check_type", "provider_id", "provider_status"];
const STATUS_LABELS: &[&str] = &["check_type", "provider_id", "provider_status", "status"];
const CODE_LABELS: &[&str] = &["check_type", "provider_id", "provider_status", "response_code"];

/// Normalises an SP's `approved` flag into the `providerStatus` label value
/// used across every metric in this module.
pub fn provider_status_label(approved: bool) -> &'static str {
    if approved {
        "approved"
    } else {
        "unapproved"
    }
}

impl ObservationMetrics {
    pub fn new(registry: &Registry) -> Result<Self, RecorderError> {
        let first_byte_ms = HistogramVec::new(
            HistogramOpts::new("probe_first_byte_ms", "Time to first byte, in milliseconds"),
            LABELS,
        )?;
        let last_byte_ms = HistogramVec::new(
            HistogramOpts::new("probe_last_byte_ms", "Time to last byte, in milliseconds"),
            LABELS,
        )?;
        let throughput = HistogramVec::new(
            HistogramOpts::new("probe_throughput_bps", "Observed throughput in bytes/second"),
            LABELS,
        )?;
        let check_duration_ms = HistogramVec::new(
            HistogramOpts::new("probe_check_duration_ms", "Total probe duration, in milliseconds"),
            LABELS,
        )?;
        let status = IntCounterVec::new(
            Opts::new("probe_status_total", "Count of probe outcomes by status label"),
            STATUS_LABELS,
        )?;
        let http_response_code = IntCounterVec::new(
            Opts::new("probe_http_response_code_total", "Count of HTTP response codes observed"),
            CODE_LABELS,
        )?;

        for collector in [
            Box::new(first_byte_ms.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(last_byte_ms.clone()),
            Box::new(throughput.clone()),
            Box::new(check_duration_ms.clone()),
            Box::new(status.clone()),
            Box::new(http_response_code.clone()),
        ] {
            registry.register(collector)?;
        }

        Ok(Self {
            first_byte_ms,
            last_byte_ms,
            throughput,
            check_duration_ms,
            status,
            http_response_code,
        })
    }

    pub fn observe_first_byte_ms(&self, check_type: &str, provider_id: i64, provider_status: &str, value: f64) {
        self.first_byte_ms
            .with_label_values(&[check_type, &provider_id.to_string(), provider_status])
            .observe(value);
    }

    pub fn observe_last_byte_ms(&self, check_type: &str, provider_id: i64, provider_status: &str, value: f64) {
        self.last_byte_ms
            .with_label_values(&[check_type, &provider_id.to_string(), provider_status])
            .observe(value);
    }

    pub fn observe_throughput(&self, check_type: &str, provider_id: i64, provider_status: &str, value: f64) {
        self.throughput
            .with_label_values(&[check_type, &provider_id.to_string(), provider_status])
            .observe(value);
    }

    pub fn observe_check_duration(&self, check_type: &str, provider_id: i64, provider_status: &str, value: f64) {
        self.check_duration_ms
            .with_label_values(&[check_type, &provider_id.to_string(), provider_status])
            .observe(value);
    }

    /// `status` is one of `pending`, `success`, `failure.timedout`,
    /// `failure.validation`, or `failure.<errorCode>` (see
    /// `probe_types::ProbeError::status_label`).
    pub fn record_status(&self, check_type: &str, provider_id: i64, provider_status: &str, status: &str) {
        self.status
            .with_label_values(&[check_type, &provider_id.to_string(), provider_status, status])
            .inc();
    }

    pub fn record_http_response_code(&self, check_type: &str, provider_id: i64, provider_status: &str, code: i32) {
        self.http_response_code
            .with_label_values(&[check_type, &provider_id.to_string(), provider_status, &code.to_string()])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_without_collision() {
        let registry = Registry::new();
        let metrics = ObservationMetrics::new(&registry).unwrap();
        metrics.record_status("upload", 1, "approved", "pending");
        metrics.record_status("upload", 1, "approved", "success");
        metrics.observe_check_duration("upload", 1, "approved", 120.0);
        let families = registry.gather();
        assert!(!families.is_empty());
    }
}
