use probe_types::StorageProvider;
use tracing::{error, warn};

use crate::baseline::{DeltaOutcome, ProviderCounterBaseline};
use crate::error::RetentionError;
use crate::estimate::estimate_counts;
use crate::index_client::IndexClient;
use crate::metrics::RetentionMetrics;

/// §4.5 step 2: "in batches of <= 50."
const PROVIDER_BATCH_SIZE: usize = 50;

#[derive(Debug, Default)]
pub struct CycleReport {
    pub providers_processed: usize,
    pub providers_reset: usize,
    pub batch_errors: usize,
    pub stale_baselines_removed: usize,
    pub stale_baselines_retained: usize,
}

pub struct RetentionPoller {
    metrics: RetentionMetrics,
    baseline: ProviderCounterBaseline,
    /// Last known `(provider_id, approved)` per address, carried alongside
    /// the baseline so stale-cleanup can still address the right counter
    /// series after the SP has dropped out of the active set.
    labels: std::collections::HashMap<String, (i64, bool)>,
}

impl RetentionPoller {
    pub fn new(metrics: RetentionMetrics) -> Self {
        Self {
            metrics,
            baseline: ProviderCounterBaseline::new(),
            labels: std::collections::HashMap::new(),
        }
    }

    /// Runs one full retention cycle per §4.5. `providers` is the active-SP
    /// snapshot taken before the batch (§5's "shared resources" rule).
    ///
    /// Stale-baseline cleanup (step 6) only runs if every batch in this
    /// cycle processed without error — invariant 5 in §8: "no baseline is
    /// deleted on a cycle with a processing error."
    pub async fn run_cycle(
        &mut self,
        index: &dyn IndexClient,
        providers: &[StorageProvider],
    ) -> Result<CycleReport, RetentionError> {
        let block_number = index.block_number().await?;
        let mut report = CycleReport::default();
        let mut cycle_had_error = false;

        for batch in providers.chunks(PROVIDER_BATCH_SIZE) {
            let addresses: Vec<String> = batch.iter().map(|p| p.address.clone()).collect();
            let snapshots = match index.query_providers(&addresses).await {
                Ok(snapshots) => snapshots,
                Err(err) => {
                    warn!(error = %err, "retention index batch failed, continuing with other batches");
                    report.batch_errors += 1;
                    cycle_had_error = true;
                    continue;
                }
            };

            for snapshot in &snapshots {
                let Some(sp) = batch.iter().find(|p| p.address == snapshot.address) else {
                    continue;
                };
                let (faulted, success) = estimate_counts(block_number, snapshot);
                self.labels
                    .insert(snapshot.address.clone(), (sp.provider_id, sp.approved));
                match self.baseline.advance(&snapshot.address, faulted, success) {
                    DeltaOutcome::Increment {
                        faulted_delta,
                        success_delta,
                    } => {
                        self.metrics.increment(
                            sp.provider_id,
                            sp.approved,
                            faulted_delta,
                            success_delta,
                        );
                    }
                    DeltaOutcome::Reset => {
                        report.providers_reset += 1;
                    }
                }
                report.providers_processed += 1;
            }
        }

        if cycle_had_error {
            return Ok(report);
        }

        let active_addresses: std::collections::HashSet<&str> =
            providers.iter().map(|p| p.address.as_str()).collect();
        let stale: Vec<String> = self
            .baseline
            .addresses()
            .filter(|addr| !active_addresses.contains(addr.as_str()))
            .cloned()
            .collect();

        for address in stale {
            let Some(&(provider_id, approved)) = self.labels.get(&address) else {
                report.stale_baselines_retained += 1;
                continue;
            };
            match self.metrics.remove(provider_id, approved) {
                Ok(()) => {
                    self.baseline.remove(&address);
                    self.labels.remove(&address);
                    report.stale_baselines_removed += 1;
                }
                Err(err) => {
                    error!(address = %address, error = %err, "failed to remove stale retention counters, retaining baseline");
                    report.stale_baselines_retained += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_client::ProofSet;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeIndex {
        block_number: i64,
        snapshots: Mutex<Vec<crate::index_client::ProviderRetentionSnapshot>>,
        fail: bool,
    }

    #[async_trait]
    impl IndexClient for FakeIndex {
        async fn block_number(&self) -> Result<i64, RetentionError> {
            Ok(self.block_number)
        }
        async fn query_providers(
            &self,
            addresses: &[String],
        ) -> Result<Vec<crate::index_client::ProviderRetentionSnapshot>, RetentionError> {
            if self.fail {
                return Err(RetentionError::Index("boom".to_string()));
            }
            let snapshots = self.snapshots.lock().unwrap();
            Ok(snapshots
                .iter()
                .filter(|s| addresses.contains(&s.address))
                .cloned()
                .collect())
        }
    }

    fn sp(address: &str, provider_id: i64) -> StorageProvider {
        let now = chrono::Utc::now();
        StorageProvider {
            address: address.to_string(),
            provider_id,
            service_url: format!("https://{address}.example"),
            active: true,
            approved: true,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    fn snapshot(address: &str, faulted: i64, proving: i64) -> crate::index_client::ProviderRetentionSnapshot {
        crate::index_client::ProviderRetentionSnapshot {
            address: address.to_string(),
            total_faulted_periods: faulted,
            total_proving_periods: proving,
            proof_sets: vec![ProofSet {
                max_proving_period: 100,
                next_deadline: 10_000,
            }],
        }
    }

    #[tokio::test]
    async fn negative_delta_resets_without_counter_increment() {
        let registry = prometheus::Registry::new();
        let metrics = RetentionMetrics::new(&registry).unwrap();
        let mut poller = RetentionPoller::new(metrics);
        let providers = vec![sp("0xabc", 1)];

        let index = FakeIndex {
            block_number: 1,
            snapshots: Mutex::new(vec![snapshot("0xabc", 10, 90)]),
            fail: false,
        };
        poller.run_cycle(&index, &providers).await.unwrap();

        let index2 = FakeIndex {
            block_number: 1,
            snapshots: Mutex::new(vec![snapshot("0xabc", 9, 89)]),
            fail: false,
        };
        let report = poller.run_cycle(&index2, &providers).await.unwrap();
        assert_eq!(report.providers_reset, 1);
        assert_eq!(poller.baseline.get("0xabc"), Some((9, 89)));
    }

    #[tokio::test]
    async fn cycle_error_suppresses_stale_cleanup() {
        let registry = prometheus::Registry::new();
        let metrics = RetentionMetrics::new(&registry).unwrap();
        let mut poller = RetentionPoller::new(metrics);

        let index = FakeIndex {
            block_number: 1,
            snapshots: Mutex::new(vec![snapshot("0xabc", 1, 1)]),
            fail: false,
        };
        poller.run_cycle(&index, &[sp("0xabc", 1)]).await.unwrap();

        // Next cycle: 0xabc drops out of the active set, and the batch for
        // the (now sole) active SP errors outright.
        let failing_index = FakeIndex {
            block_number: 1,
            snapshots: Mutex::new(vec![]),
            fail: true,
        };
        let report = poller
            .run_cycle(&failing_index, &[sp("0xdef", 2)])
            .await
            .unwrap();
        assert_eq!(report.batch_errors, 1);
        assert_eq!(report.stale_baselines_removed, 0);
        assert_eq!(poller.baseline.get("0xabc"), Some((1, 1)));
    }
}
