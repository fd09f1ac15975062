#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("work item {0} not found")]
    NotFound(i64),

    #[error("work item {0} is not ACTIVE and cannot be completed/failed/cancelled")]
    NotActive(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
