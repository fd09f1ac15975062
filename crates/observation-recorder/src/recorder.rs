use probe_types::{Deal, DealStatus, Retrieval, StorageProvider};
use sqlx::PgPool;

use crate::error::RecorderError;

/// Writes Deals and Retrievals, per §4.7: "Writes Deals and Retrievals
/// transactionally." Runtime-checked queries only (see `work-queue`'s
/// `WorkQueue` for the same rationale): `deals`/`retrievals` are created by
/// migration wiring out of scope for this crate.
#[derive(Clone)]
pub struct ObservationRecorder {
    pool: PgPool,
}

impl ObservationRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert a Deal snapshot. `ON CONFLICT (id) DO UPDATE` makes this safe
    /// to call at any point in the lifecycle; the harness binary currently
    /// calls it once, after the upload probe returns, so only the final
    /// `deal.status` is durable — an intermediate INGESTED/CHAIN_CONFIRMED
    /// state is never visible to readers unless a caller persists per stage.
    pub async fn upsert_deal(&self, deal: &Deal) -> Result<(), RecorderError> {
        sqlx::query(
            r#"
            INSERT INTO deals (
                id, sp_address, wallet_address, piece_cid, root_cid, file_size,
                file_name, status, ingest_latency_ms, chain_latency_ms,
                deal_latency_ms, ingest_throughput_bps, service_types, metadata,
                error_message, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (id) DO UPDATE SET
                piece_cid = EXCLUDED.piece_cid,
                root_cid = EXCLUDED.root_cid,
                status = EXCLUDED.status,
                ingest_latency_ms = EXCLUDED.ingest_latency_ms,
                chain_latency_ms = EXCLUDED.chain_latency_ms,
                deal_latency_ms = EXCLUDED.deal_latency_ms,
                ingest_throughput_bps = EXCLUDED.ingest_throughput_bps,
                service_types = EXCLUDED.service_types,
                metadata = EXCLUDED.metadata,
                error_message = EXCLUDED.error_message,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(deal.id)
        .bind(&deal.sp_address)
        .bind(&deal.wallet_address)
        .bind(&deal.piece_cid)
        .bind(&deal.root_cid)
        .bind(deal.file_size)
        .bind(&deal.file_name)
        .bind(deal.status)
        .bind(deal.ingest_latency_ms)
        .bind(deal.chain_latency_ms)
        .bind(deal.deal_latency_ms)
        .bind(deal.ingest_throughput_bps)
        .bind(&deal.service_types)
        .bind(&deal.metadata)
        .bind(&deal.error_message)
        .bind(deal.created_at)
        .bind(deal.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert every Retrieval row produced by one retrieval test in a
    /// single transaction, per §4.7.
    pub async fn record_retrievals(&self, retrievals: &[Retrieval]) -> Result<(), RecorderError> {
        if retrievals.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for retrieval in retrievals {
            sqlx::query(
                r#"
                INSERT INTO retrievals (
                    id, deal_id, service_type, retrieval_endpoint, status,
                    latency_ms, ttfb_ms, throughput_bps, bytes_retrieved,
                    response_code, error_message, retry_count,
                    validation_method, validation_details, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                ON CONFLICT (id) DO UPDATE SET
                    status = EXCLUDED.status,
                    latency_ms = EXCLUDED.latency_ms,
                    ttfb_ms = EXCLUDED.ttfb_ms,
                    throughput_bps = EXCLUDED.throughput_bps,
                    bytes_retrieved = EXCLUDED.bytes_retrieved,
                    response_code = EXCLUDED.response_code,
                    error_message = EXCLUDED.error_message,
                    retry_count = EXCLUDED.retry_count,
                    validation_method = EXCLUDED.validation_method,
                    validation_details = EXCLUDED.validation_details,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(retrieval.id)
            .bind(retrieval.deal_id)
            .bind(&retrieval.service_type)
            .bind(&retrieval.retrieval_endpoint)
            .bind(retrieval.status)
            .bind(retrieval.latency_ms)
            .bind(retrieval.ttfb_ms)
            .bind(retrieval.throughput_bps)
            .bind(retrieval.bytes_retrieved)
            .bind(retrieval.response_code)
            .bind(&retrieval.error_message)
            .bind(retrieval.retry_count)
            .bind(&retrieval.validation_method)
            .bind(&retrieval.validation_details)
            .bind(retrieval.created_at)
            .bind(retrieval.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Upsert one SP row, per §6's "the recorder writes tables deals,
    /// retrievals, storage_providers, job_schedule_state" and §3's dedup
    /// rule (applied by the caller before this is reached; this method is
    /// pure persistence).
    pub async fn upsert_storage_provider(&self, sp: &StorageProvider) -> Result<(), RecorderError> {
        sqlx::query(
            r#"
            INSERT INTO storage_providers (
                address, provider_id, service_url, active, approved, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (address) DO UPDATE SET
                provider_id = EXCLUDED.provider_id,
                service_url = EXCLUDED.service_url,
                active = EXCLUDED.active,
                approved = EXCLUDED.approved,
                metadata = EXCLUDED.metadata,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&sp.address)
        .bind(sp.provider_id)
        .bind(&sp.service_url)
        .bind(sp.active)
        .bind(sp.approved)
        .bind(&sp.metadata)
        .bind(sp.created_at)
        .bind(sp.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Soft-deactivate every SP row whose address isn't in `present_addresses`,
    /// per §3: "soft-deactivated when absent from a chain read."
    pub async fn deactivate_missing_providers(
        &self,
        present_addresses: &[String],
    ) -> Result<u64, RecorderError> {
        let result = sqlx::query(
            r#"UPDATE storage_providers SET active = false, updated_at = now()
               WHERE active = true AND NOT (address = ANY($1))"#,
        )
        .bind(present_addresses)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Every row currently marked `active`, for the SP cache's reload, per
    /// §5: "The SP cache in C1 is read-mostly, written only by the loader."
    pub async fn load_active_storage_providers(&self) -> Result<Vec<StorageProvider>, RecorderError> {
        let rows = sqlx::query_as::<_, StorageProvider>(
            r#"SELECT address, provider_id, service_url, active, approved, metadata, created_at, updated_at
               FROM storage_providers WHERE active = true"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Most recent `DEAL_CREATED` Deal for `sp_address`, used to pick which
    /// Deal a "retrieval" WorkItem runs its retrieval test against.
    pub async fn latest_deal_for_sp(&self, sp_address: &str) -> Result<Option<Deal>, RecorderError> {
        let deal = sqlx::query_as::<_, Deal>(
            r#"SELECT * FROM deals WHERE sp_address = $1 AND status = $2
               ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(sp_address)
        .bind(DealStatus::DealCreated)
        .fetch_optional(&self.pool)
        .await?;
        Ok(deal)
    }
}
