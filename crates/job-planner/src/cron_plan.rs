use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use probe_types::JobFamily;

/// Fixed inter-family stagger, per §4.2 step 1(ii): "families are offset
/// from each other by fixed seconds (e.g. upload +0, retrieval +10 min,
/// metrics +15 min)". Retention sits between upload and retrieval so its
/// index reads don't compete with either for the same tick.
fn family_offset_seconds(family: JobFamily) -> i64 {
    match family {
        JobFamily::Deal => 0,
        JobFamily::Retention => 5 * 60,
        JobFamily::Retrieval => 10 * 60,
        JobFamily::MetricsRollup => 15 * 60,
    }
}

/// Deterministic per-SP offset in `[0, interval_secs)`, so SP-keyed jobs
/// within the same family fire staggered across the interval instead of
/// all at once.
fn sp_hash_offset(sp_address: &str, interval_secs: i64) -> i64 {
    if interval_secs <= 0 {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    sp_address.hash(&mut hasher);
    (hasher.finish() % interval_secs as u64) as i64
}

/// One materialised schedule entry for a `(family, spAddress)` pair.
#[derive(Debug, Clone)]
pub struct PlannedSchedule {
    pub family: JobFamily,
    pub sp_address: String,
    pub interval_secs: i64,
    pub cron_expr: String,
    pub anchor_offset_secs: i64,
}

impl PlannedSchedule {
    /// Compute the desired schedule for one `(family, sp)` pair from the
    /// configured base interval for that family.
    pub fn compute(family: JobFamily, sp_address: &str, interval_secs: i64) -> Self {
        let offset = (family_offset_seconds(family) + sp_hash_offset(sp_address, interval_secs))
            .rem_euclid(interval_secs.max(1));
        let cron_expr = describe_cron(interval_secs, offset);
        Self {
            family,
            sp_address: sp_address.to_string(),
            interval_secs,
            cron_expr,
            anchor_offset_secs: offset,
        }
    }

    /// The next fire time strictly after `after`, anchored to the Unix
    /// epoch so restarts don't drift the schedule. Materialisation math is
    /// computed directly rather than through cron field evaluation, which
    /// only has minute granularity; `cron_expr` remains a human-readable,
    /// parseable description of the same schedule for observability.
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let interval = self.interval_secs.max(1);
        let epoch_secs = after.timestamp();
        let phase = epoch_secs - self.anchor_offset_secs;
        let next_boundary = ((phase.div_euclid(interval)) + 1) * interval + self.anchor_offset_secs;
        DateTime::from_timestamp(next_boundary, 0).unwrap_or(after)
    }
}

/// Render a best-effort descriptive cron expression for `interval_secs`
/// staggered by `offset_secs`. Validated by parsing it back through
/// `cron::Schedule` — materialisation itself does not depend on this
/// parse succeeding.
fn describe_cron(interval_secs: i64, offset_secs: i64) -> String {
    let expr = if interval_secs % 60 == 0 && interval_secs >= 60 {
        let minutes = interval_secs / 60;
        let offset_min = (offset_secs / 60) % minutes.max(1);
        let offset_sec = offset_secs % 60;
        format!("{offset_sec} {offset_min}/{minutes} * * * *")
    } else {
        format!("*/{} * * * * *", interval_secs.max(1))
    };

    match cron::Schedule::from_str(&expr) {
        Ok(_) => expr,
        Err(_) => format!("every {interval_secs}s offset {offset_secs}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn offsets_are_staggered_across_families() {
        let deal = PlannedSchedule::compute(JobFamily::Deal, "0xabc", 600);
        let retrieval = PlannedSchedule::compute(JobFamily::Retrieval, "0xabc", 600);
        assert_ne!(deal.anchor_offset_secs, retrieval.anchor_offset_secs);
    }

    #[test]
    fn distinct_sps_get_distinct_offsets_with_high_probability() {
        let a = PlannedSchedule::compute(JobFamily::Deal, "0xabc", 600);
        let b = PlannedSchedule::compute(JobFamily::Deal, "0xdef", 600);
        assert_ne!(a.anchor_offset_secs, b.anchor_offset_secs);
    }

    #[test]
    fn next_after_is_deterministic_and_periodic() {
        let plan = PlannedSchedule::compute(JobFamily::Deal, "0xabc", 300);
        let t0 = Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap();
        let first = plan.next_after(t0);
        let second = plan.next_after(first);
        assert_eq!((second - first).num_seconds(), 300);
    }
}
