//! Relational work queue (C6).
//!
//! A Postgres-backed queue providing per-key singleton enforcement,
//! visibility timeouts, exponential retry/backoff, and per-key fairness
//! across workers. See `SPEC_FULL.md` §4.1.

mod backoff;
mod error;
mod queue;

pub use backoff::BackoffPolicy;
pub use error::QueueError;
pub use queue::{PublishOptions, PublishOutcome, Published, WorkQueue};
