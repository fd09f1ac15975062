use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one retrieval strategy run against one Deal, per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(feature = "database", sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RetrievalStatus {
    Pending,
    Success,
    Failed,
}

/// One retrieval probe result: a single strategy's attempt outcome for one
/// Deal, per §3 and §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Retrieval {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub service_type: String,
    pub retrieval_endpoint: String,
    pub status: RetrievalStatus,
    pub latency_ms: Option<i64>,
    pub ttfb_ms: Option<i64>,
    pub throughput_bps: Option<f64>,
    pub bytes_retrieved: Option<i64>,
    pub response_code: Option<i32>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub validation_method: Option<String>,
    pub validation_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Retrieval {
    /// Create a PENDING row for a strategy run, per §4.4: "created PENDING
    /// when a strategy run begins".
    pub fn pending(deal_id: Uuid, service_type: impl Into<String>, retrieval_endpoint: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            deal_id,
            service_type: service_type.into(),
            retrieval_endpoint: retrieval_endpoint.into(),
            status: RetrievalStatus::Pending,
            latency_ms: None,
            ttfb_ms: None,
            throughput_bps: None,
            bytes_retrieved: None,
            response_code: None,
            error_message: None,
            retry_count: 0,
            validation_method: None,
            validation_details: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn finish(&mut self, status: RetrievalStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
