use std::collections::HashMap;

use tracing::warn;

/// Last observed cumulative `(faulted, success)` per SP, per §4.1's
/// `ProviderCounterBaseline`. Owned by a single-threaded loop (§5); no
/// locking is required.
#[derive(Debug, Default)]
pub struct ProviderCounterBaseline {
    by_address: HashMap<String, (i64, i64)>,
}

/// Outcome of comparing a fresh `(faulted, success)` estimate against the
/// stored baseline for one SP, per §4.5 step 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Both deltas were non-negative; counters should be incremented by
    /// these amounts and the baseline advanced.
    Increment { faulted_delta: i64, success_delta: i64 },
    /// A negative delta was observed (chain reorg or index correction);
    /// the baseline was reset to the new values with no counter increment.
    Reset,
}

impl ProviderCounterBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> Option<(i64, i64)> {
        self.by_address.get(address).copied()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &String> {
        self.by_address.keys()
    }

    pub fn remove(&mut self, address: &str) -> Option<(i64, i64)> {
        self.by_address.remove(address)
    }

    /// §4.5 step 5: compute deltas for `address` against the stored
    /// baseline (absent baseline treated as `(0, 0)`, i.e. a full first
    /// increment), then update the baseline to `(faulted, success)`
    /// unconditionally — either by the delta (increment path) or by
    /// direct reset (reset path).
    pub fn advance(&mut self, address: &str, faulted: i64, success: i64) -> DeltaOutcome {
        let (prev_faulted, prev_success) = self.get(address).unwrap_or((0, 0));
        let faulted_delta = faulted - prev_faulted;
        let success_delta = success - prev_success;

        self.by_address
            .insert(address.to_string(), (faulted, success));

        if faulted_delta < 0 || success_delta < 0 {
            warn!(
                address,
                prev_faulted,
                prev_success,
                new_faulted = faulted,
                new_success = success,
                "negative retention delta, resetting baseline"
            );
            DeltaOutcome::Reset
        } else {
            DeltaOutcome::Increment {
                faulted_delta,
                success_delta,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_is_a_full_increment() {
        let mut baseline = ProviderCounterBaseline::new();
        let outcome = baseline.advance("0xabc", 10, 90);
        assert_eq!(
            outcome,
            DeltaOutcome::Increment {
                faulted_delta: 10,
                success_delta: 90
            }
        );
        assert_eq!(baseline.get("0xabc"), Some((10, 90)));
    }

    #[test]
    fn positive_delta_increments_and_advances() {
        let mut baseline = ProviderCounterBaseline::new();
        baseline.advance("0xabc", 10, 90);
        let outcome = baseline.advance("0xabc", 12, 95);
        assert_eq!(
            outcome,
            DeltaOutcome::Increment {
                faulted_delta: 2,
                success_delta: 5
            }
        );
        assert_eq!(baseline.get("0xabc"), Some((12, 95)));
    }

    #[test]
    fn negative_delta_resets_without_increment() {
        // S5: baseline {10, 90} -> new snapshot {9, 89}.
        let mut baseline = ProviderCounterBaseline::new();
        baseline.advance("0xabc", 10, 90);
        let outcome = baseline.advance("0xabc", 9, 89);
        assert_eq!(outcome, DeltaOutcome::Reset);
        assert_eq!(baseline.get("0xabc"), Some((9, 89)));
    }
}
