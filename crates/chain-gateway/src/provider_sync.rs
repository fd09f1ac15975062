use std::collections::HashMap;

use probe_types::StorageProvider;
use tracing::warn;

use crate::client::{ChainClient, RawProvider};
use crate::error::ChainError;

/// Batch size for paging through the inactive-provider id space, per §4.6:
/// "inactive IDs in batches <= 50."
const PROVIDER_BATCH_SIZE: i64 = 50;

fn to_storage_provider(raw: RawProvider) -> StorageProvider {
    let now = chrono::Utc::now();
    StorageProvider {
        address: raw.address,
        provider_id: raw.provider_id,
        service_url: raw.service_url,
        active: raw.active,
        approved: raw.approved,
        metadata: raw.metadata,
        created_at: now,
        updated_at: now,
    }
}

/// Load the full registered SP set (active, plus inactive ids paged in
/// batches of <= 50) and deduplicate by address per §3: an active record
/// wins a duplicate over an inactive one, otherwise the highest
/// `provider_id` wins, with a structured warning when that discriminates.
pub async fn sync_providers(
    client: &dyn ChainClient,
) -> Result<Vec<StorageProvider>, ChainError> {
    let active = client.all_active_providers().await?;
    let active_ids: std::collections::HashSet<i64> = active.iter().map(|p| p.provider_id).collect();

    let total = client.provider_count().await?;
    let mut all_raw: Vec<RawProvider> = active;

    let mut start = 0i64;
    while start < total {
        let end = (start + PROVIDER_BATCH_SIZE).min(total);
        for id in start..end {
            if active_ids.contains(&id) {
                continue;
            }
            if let Some(provider) = client.provider(id).await? {
                all_raw.push(provider);
            }
        }
        start = end;
    }

    let mut by_address: HashMap<String, RawProvider> = HashMap::new();
    for raw in all_raw {
        match by_address.remove(&raw.address) {
            None => {
                by_address.insert(raw.address.clone(), raw);
            }
            Some(existing) => {
                let existing_sp = to_storage_provider(existing.clone());
                let raw_sp = to_storage_provider(raw.clone());
                let winner = StorageProvider::resolve_duplicate(&existing_sp, &raw_sp);
                warn!(
                    address = %raw.address,
                    existing_provider_id = existing.provider_id,
                    incoming_provider_id = raw.provider_id,
                    winner_provider_id = winner.provider_id,
                    "duplicate SP address in chain sync, resolved per dedup rule"
                );
                let winner_raw = if winner.provider_id == existing.provider_id {
                    existing
                } else {
                    raw
                };
                by_address.insert(winner_raw.address.clone(), winner_raw);
            }
        }
    }

    Ok(by_address.into_values().map(to_storage_provider).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeChain {
        active: Vec<RawProvider>,
        all: Vec<RawProvider>,
        calls: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn block_number(&self) -> Result<i64, ChainError> {
            Ok(100)
        }
        async fn provider_count(&self) -> Result<i64, ChainError> {
            Ok(self.all.len() as i64)
        }
        async fn provider(&self, id: i64) -> Result<Option<RawProvider>, ChainError> {
            self.calls.lock().unwrap().push(id);
            Ok(self.all.iter().find(|p| p.provider_id == id).cloned())
        }
        async fn all_active_providers(&self) -> Result<Vec<RawProvider>, ChainError> {
            Ok(self.active.clone())
        }
        async fn account_info(
            &self,
            _wallet_address: &str,
        ) -> Result<crate::client::AccountInfo, ChainError> {
            unimplemented!()
        }
        async fn deposit(&self, _wallet_address: &str, _amount: u128) -> Result<(), ChainError> {
            unimplemented!()
        }
        async fn approve_service(
            &self,
            _wallet_address: &str,
            _rate_allowance: u128,
            _lockup_allowance: u128,
        ) -> Result<(), ChainError> {
            unimplemented!()
        }
        async fn ingest(
            &self,
            _sp_address: &str,
            _payload: &[u8],
        ) -> Result<crate::client::IngestReceipt, ChainError> {
            unimplemented!()
        }
        async fn anchor(
            &self,
            _sp_address: &str,
            _piece_cid: &str,
        ) -> Result<Vec<crate::client::ChainEventRecord>, ChainError> {
            unimplemented!()
        }
    }

    fn raw(address: &str, provider_id: i64, active: bool) -> RawProvider {
        RawProvider {
            address: address.to_string(),
            provider_id,
            service_url: format!("https://{address}.example"),
            active,
            approved: true,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn dedups_active_over_inactive() {
        let chain = FakeChain {
            active: vec![raw("0xabc", 1, true)],
            all: vec![raw("0xabc", 1, true), raw("0xabc", 2, false)],
            calls: Mutex::new(Vec::new()),
        };
        let providers = sync_providers(&chain).await.unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].provider_id, 1);
    }

    #[tokio::test]
    async fn pages_through_inactive_ids_not_in_active_set() {
        let chain = FakeChain {
            active: vec![raw("0xactive", 0, true)],
            all: vec![raw("0xactive", 0, true), raw("0xinactive", 1, false)],
            calls: Mutex::new(Vec::new()),
        };
        let providers = sync_providers(&chain).await.unwrap();
        assert_eq!(providers.len(), 2);
        // id 0 already in active set, should not be re-fetched by `provider`.
        assert!(!chain.calls.lock().unwrap().contains(&0));
        assert!(chain.calls.lock().unwrap().contains(&1));
    }
}
