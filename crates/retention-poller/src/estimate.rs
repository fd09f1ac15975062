use crate::index_client::ProviderRetentionSnapshot;

/// §4.5 step 3: `estimatedOverdue = Σ proofSets (maxProvingPeriod > 0)
/// ⌊(blockNumber − (nextDeadline+1)) / maxProvingPeriod⌋`.
///
/// Proof sets with a non-positive `maxProvingPeriod` are excluded (division
/// by a non-positive period is meaningless) and a deadline not yet in the
/// past contributes zero rather than a negative count.
fn estimated_overdue(block_number: i64, snapshot: &ProviderRetentionSnapshot) -> i64 {
    snapshot
        .proof_sets
        .iter()
        .filter(|ps| ps.max_proving_period > 0)
        .map(|ps| {
            let elapsed = block_number - (ps.next_deadline + 1);
            if elapsed < 0 {
                0
            } else {
                elapsed / ps.max_proving_period
            }
        })
        .sum()
}

/// `(estimatedFaulted, estimatedSuccess)` per §4.5 step 4.
pub fn estimate_counts(block_number: i64, snapshot: &ProviderRetentionSnapshot) -> (i64, i64) {
    let overdue = estimated_overdue(block_number, snapshot);
    let estimated_faulted = snapshot.total_faulted_periods + overdue;
    let estimated_success =
        snapshot.total_proving_periods + overdue - estimated_faulted;
    (estimated_faulted, estimated_success)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(faulted: i64, proving: i64, proof_sets: Vec<(i64, i64)>) -> ProviderRetentionSnapshot {
        ProviderRetentionSnapshot {
            address: "0xabc".to_string(),
            total_faulted_periods: faulted,
            total_proving_periods: proving,
            proof_sets: proof_sets
                .into_iter()
                .map(|(max_proving_period, next_deadline)| crate::index_client::ProofSet {
                    max_proving_period,
                    next_deadline,
                })
                .collect(),
        }
    }

    #[test]
    fn no_overdue_when_deadline_in_future() {
        let snap = snapshot(10, 90, vec![(100, 5_000)]);
        let (faulted, success) = estimate_counts(1_000, &snap);
        assert_eq!(faulted, 10);
        assert_eq!(success, 90);
    }

    #[test]
    fn accumulates_overdue_across_proof_sets() {
        // blockNumber=1000, nextDeadline=700, period=100 -> (1000-701)/100 = 2
        // blockNumber=1000, nextDeadline=400, period=50  -> (1000-401)/50  = 11
        let snap = snapshot(10, 90, vec![(100, 700), (50, 400)]);
        let (faulted, success) = estimate_counts(1_000, &snap);
        assert_eq!(faulted, 10 + 13);
        assert_eq!(success, 90 + 13 - faulted);
    }

    #[test]
    fn ignores_non_positive_periods() {
        let snap = snapshot(1, 1, vec![(0, 1)]);
        let (faulted, _) = estimate_counts(1_000, &snap);
        assert_eq!(faulted, 1);
    }
}
