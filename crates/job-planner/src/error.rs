#[derive(Debug, thiserror::Error)]
pub enum JobPlannerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("queue error: {0}")]
    Queue(#[from] work_queue::QueueError),
}
