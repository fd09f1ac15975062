mod error;
mod metrics;
mod recorder;
mod rollup;

pub use error::RecorderError;
pub use metrics::{provider_status_label, ObservationMetrics};
pub use recorder::ObservationRecorder;
pub use rollup::refresh_materialized_views;
