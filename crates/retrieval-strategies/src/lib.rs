//! Retrieval strategy registry: Direct-SP and IPFS-block, each with an
//! applicability predicate, URL builder, optional preprocessing/validation,
//! retry policy, and expected-metric bounds (C4). See `SPEC_FULL.md` §4.4.

mod dag_validate;
mod direct_sp;
mod error;
mod ipfs_block;
mod registry;
mod runner;
mod strategy;

pub use dag_validate::{validate_dag, DagValidationOutcome};
pub use direct_sp::DirectSpStrategy;
pub use error::StrategyError;
pub use ipfs_block::IpfsBlockStrategy;
pub use registry::StrategyRegistry;
pub use runner::{run_strategy, StrategyRunOutcome};
pub use strategy::{ExpectedMetrics, RetrievalStrategy, RetryConfig, ValidationOutcome};
