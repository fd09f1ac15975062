use sqlx::PgPool;
use tracing::info;

use crate::error::RecorderError;

/// Materialised views refreshed by the `metricsRollup` job family (C7),
/// per §4.7 and §6: "aggregate success rates, latencies, throughputs, and
/// data volumes over time windows."
const MATERIALIZED_VIEWS: &[&str] = &["sp_performance_last_week", "sp_performance_all_time"];

/// Refresh every materialised view this crate owns. Uses `CONCURRENTLY` so
/// readers are never blocked mid-refresh; that requires a unique index on
/// each view, which migration wiring is expected to provide.
pub async fn refresh_materialized_views(pool: &PgPool) -> Result<(), RecorderError> {
    for view in MATERIALIZED_VIEWS {
        let statement = format!("REFRESH MATERIALIZED VIEW CONCURRENTLY {view}");
        sqlx::query(&statement).execute(pool).await?;
        info!(view, "refreshed materialised view");
    }
    Ok(())
}
