use async_trait::async_trait;

use crate::error::RetentionError;

/// §6: "GraphQL-ish query returning
/// `providers[{address, totalFaultedPeriods, totalProvingPeriods,
/// proofSets[{maxProvingPeriod, nextDeadline}]}]` plus a `_meta.block.number`
/// snapshot marker."
#[derive(Debug, Clone, Copy)]
pub struct ProofSet {
    pub max_proving_period: i64,
    pub next_deadline: i64,
}

#[derive(Debug, Clone)]
pub struct ProviderRetentionSnapshot {
    pub address: String,
    pub total_faulted_periods: i64,
    pub total_proving_periods: i64,
    pub proof_sets: Vec<ProofSet>,
}

/// Trait boundary over the external proof/retention index. No concrete
/// wiring ships in this crate, per §6.
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// The index's own block/snapshot marker, used as `blockNumber` in the
    /// overdue-period computation.
    async fn block_number(&self) -> Result<i64, RetentionError>;

    /// Batched query, addresses limited to <= 50 per §4.5 step 2.
    async fn query_providers(
        &self,
        addresses: &[String],
    ) -> Result<Vec<ProviderRetentionSnapshot>, RetentionError>;
}
