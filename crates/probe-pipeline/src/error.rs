/// §4.3: "Any failure transitions Deal to FAILED with the first error
/// observed; no further stages execute."
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("probe aborted before completion")]
    Aborted,

    #[error("archive build failed: {0}")]
    Archive(#[from] content_codec::ArchiveBuildError),

    #[error("chain gateway error: {0}")]
    Chain(#[from] chain_gateway::ChainError),

    #[error("deal state error: {0}")]
    Deal(#[from] probe_types::ProbeError),
}

impl PipelineError {
    /// The `recordStatus` label this failure maps to, per §4.7/§7. Mirrors
    /// `probe_types::ProbeError::status_label` for the error kinds this
    /// crate doesn't wrap directly in a `ProbeError`.
    pub fn status_label(&self) -> String {
        match self {
            PipelineError::Aborted => "failure.timedout".to_string(),
            PipelineError::Archive(_) => "failure.archive".to_string(),
            PipelineError::Chain(_) => "failure.chain".to_string(),
            PipelineError::Deal(e) => e.status_label(),
        }
    }
}
