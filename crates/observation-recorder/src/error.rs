#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("metric registration error: {0}")]
    Metrics(#[from] prometheus::Error),
}
