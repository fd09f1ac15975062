mod baseline;
mod error;
mod estimate;
mod index_client;
mod metrics;
mod poller;

pub use baseline::{DeltaOutcome, ProviderCounterBaseline};
pub use error::RetentionError;
pub use estimate::estimate_counts;
pub use index_client::{IndexClient, ProofSet, ProviderRetentionSnapshot};
pub use metrics::RetentionMetrics;
pub use poller::{CycleReport, RetentionPoller};
