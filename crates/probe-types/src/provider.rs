use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered storage provider, as synced from the chain registry by the
/// chain gateway (C1) and consumed by the planner, pipeline and retention
/// poller.
///
/// Identity is `(address, provider_id)`; uniqueness within the store is on
/// `address` alone — §3 dedup rule: an active record wins a duplicate sync
/// over an inactive one, otherwise the highest `provider_id` wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct StorageProvider {
    pub address: String,
    pub provider_id: i64,
    pub service_url: String,
    pub active: bool,
    pub approved: bool,
    #[cfg_attr(feature = "database", sqlx(default))]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StorageProvider {
    pub fn new(address: impl Into<String>, provider_id: i64, service_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            address: address.into(),
            provider_id,
            service_url: service_url.into(),
            active: true,
            approved: false,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    /// §3 dedup rule applied to a pair of records sharing the same address:
    /// an active record beats an inactive one; otherwise the higher
    /// `provider_id` wins. Returns the winner; the caller is expected to log
    /// a structured warning when this actually discriminates between two
    /// differing records.
    pub fn resolve_duplicate<'a>(a: &'a StorageProvider, b: &'a StorageProvider) -> &'a StorageProvider {
        match (a.active, b.active) {
            (true, false) => a,
            (false, true) => b,
            _ => {
                if a.provider_id >= b.provider_id {
                    a
                } else {
                    b
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_wins_over_inactive() {
        let mut active = StorageProvider::new("0xabc", 1, "https://sp1.example");
        active.active = true;
        let mut inactive = StorageProvider::new("0xabc", 2, "https://sp1.example");
        inactive.active = false;

        let winner = StorageProvider::resolve_duplicate(&active, &inactive);
        assert_eq!(winner.provider_id, 1);
    }

    #[test]
    fn highest_provider_id_wins_when_both_active() {
        let a = StorageProvider::new("0xabc", 3, "https://sp1.example");
        let b = StorageProvider::new("0xabc", 7, "https://sp1.example");

        let winner = StorageProvider::resolve_duplicate(&a, &b);
        assert_eq!(winner.provider_id, 7);
    }
}
