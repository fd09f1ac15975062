mod error;
mod retrieval;
mod upload;

pub use error::PipelineError;
pub use retrieval::run_retrieval_probe;
pub use upload::{run_upload_probe, UploadProbeConfig};
