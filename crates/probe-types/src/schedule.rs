use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The job families the planner (C7) materialises per SP, per §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobFamily {
    Deal,
    Retrieval,
    Retention,
    MetricsRollup,
}

impl JobFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            JobFamily::Deal => "deal",
            JobFamily::Retrieval => "retrieval",
            JobFamily::Retention => "retention",
            JobFamily::MetricsRollup => "metrics_rollup",
        }
    }

    pub const ALL: [JobFamily; 4] = [
        JobFamily::Deal,
        JobFamily::Retrieval,
        JobFamily::Retention,
        JobFamily::MetricsRollup,
    ];
}

/// Per `(name, key)` schedule row the planner reconciles against, per §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct JobScheduleState {
    pub name: String,
    pub key: String,
    pub cron: String,
    pub next_run_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}
