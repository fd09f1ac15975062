use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of a [`WorkItem`] row, per §3 and §4.1.
///
/// Invariant 3 in §8: for a given `(queue, singleton_key)` exactly one row
/// may be non-terminal, i.e. in `Queued | Active | Retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum WorkItemState {
    Queued,
    Active,
    Completed,
    Failed,
    Retry,
}

impl WorkItemState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkItemState::Completed | WorkItemState::Failed)
    }

    pub fn is_non_terminal(self) -> bool {
        !self.is_terminal()
    }
}

/// A row in the relational work queue (C6), per §3 and §4.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct WorkItem {
    pub id: i64,
    pub queue: String,
    pub key: String,
    pub singleton_key: String,
    pub state: WorkItemState,
    pub available_at: DateTime<Utc>,
    pub visibility_expires_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub payload: serde_json::Value,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
