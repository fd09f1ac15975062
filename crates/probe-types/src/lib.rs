//! Shared domain types for the storage-provider probe harness.
//!
//! These types are the vocabulary every other crate in the workspace speaks:
//! storage providers, deals (upload probes), retrievals, queue rows and
//! planner schedule state. Nothing here talks to a database or the network —
//! that belongs to `work-queue`, `observation-recorder` and friends.

mod deal;
mod error;
mod provider;
mod retrieval;
mod schedule;
mod work_item;

pub use deal::{Deal, DealStatus};
pub use error::ProbeError;
pub use provider::StorageProvider;
pub use retrieval::{Retrieval, RetrievalStatus};
pub use schedule::{JobFamily, JobScheduleState};
pub use work_item::{WorkItem, WorkItemState};
