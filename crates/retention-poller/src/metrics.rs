use prometheus::{IntCounterVec, Opts, Registry};

use crate::error::RetentionError;

/// Largest single increment applied to a Prometheus `f64` counter in one
/// call, per §4.5 step 5: "If the delta exceeds `MAX_SAFE_INTEGER`... apply
/// in chunks." `f64` carries an exact integer mantissa up to 2^53; this
/// keeps every chunk well inside that range.
const MAX_COUNTER_CHUNK: i64 = 1 << 52;

pub struct RetentionMetrics {
    faulted_total: IntCounterVec,
    success_total: IntCounterVec,
}

impl RetentionMetrics {
    pub fn new(registry: &Registry) -> Result<Self, RetentionError> {
        let faulted_total = IntCounterVec::new(
            Opts::new(
                "probe_retention_faulted_periods_total",
                "Cumulative estimated faulted proving periods per SP",
            ),
            &["provider_id", "approved"],
        )?;
        let success_total = IntCounterVec::new(
            Opts::new(
                "probe_retention_success_periods_total",
                "Cumulative estimated successful proving periods per SP",
            ),
            &["provider_id", "approved"],
        )?;
        registry.register(Box::new(faulted_total.clone()))?;
        registry.register(Box::new(success_total.clone()))?;
        Ok(Self {
            faulted_total,
            success_total,
        })
    }

    /// Increments both counters by `faulted_delta`/`success_delta`, chunked
    /// to stay within `f64`'s exact-integer range.
    pub fn increment(&self, provider_id: i64, approved: bool, faulted_delta: i64, success_delta: i64) {
        let labels = [provider_id.to_string(), approved.to_string()];
        let label_refs: [&str; 2] = [labels[0].as_str(), labels[1].as_str()];
        increment_in_chunks(&self.faulted_total.with_label_values(&label_refs), faulted_delta);
        increment_in_chunks(&self.success_total.with_label_values(&label_refs), success_delta);
    }

    /// §4.5 step 6: remove this SP's counters entirely. Caller deletes the
    /// baseline only if both removals succeed.
    pub fn remove(&self, provider_id: i64, approved: bool) -> Result<(), RetentionError> {
        let labels = [provider_id.to_string(), approved.to_string()];
        let label_refs: [&str; 2] = [labels[0].as_str(), labels[1].as_str()];
        self.faulted_total.remove_label_values(&label_refs)?;
        self.success_total.remove_label_values(&label_refs)?;
        Ok(())
    }
}

fn increment_in_chunks(counter: &prometheus::core::GenericCounter<prometheus::core::AtomicI64>, delta: i64) {
    if delta <= 0 {
        return;
    }
    let mut remaining = delta;
    while remaining > 0 {
        let chunk = remaining.min(MAX_COUNTER_CHUNK);
        counter.inc_by(chunk);
        remaining -= chunk;
    }
}
