use crate::{Deal, DealStatus};

/// Error kinds shared across the probe pipeline.
///
/// Individual components (transport, codec, chain gateway) define their own
/// narrower error enums and convert into this one at the pipeline boundary,
/// mirroring how `ob-workflow`'s `WorkflowError` wraps guard and repository
/// failures without re-exposing their internals.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("transport error contacting {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("non-2xx response {status} from {url}: {preview}")]
    BadStatus {
        url: String,
        status: u16,
        preview: String,
    },

    #[error("validation failed ({method}): {detail}")]
    Validation { method: String, detail: String },

    #[error("deal {deal_id} missing prerequisite: {what}")]
    MissingPrerequisite {
        deal_id: uuid::Uuid,
        what: &'static str,
    },

    #[error("invalid deal status transition {from:?} -> {to:?}")]
    InvalidTransition { from: DealStatus, to: DealStatus },

    #[error("chain gateway error: {0}")]
    Chain(String),

    #[error("external index error: {0}")]
    Index(String),

    #[error("probe aborted before completion")]
    Aborted,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ProbeError {
    /// The label `observeStatus`/`recordStatus` would use for this error,
    /// per §4.7 and §7 of the spec (`failure.<errorCode>` family).
    pub fn status_label(&self) -> String {
        match self {
            ProbeError::Aborted => "failure.timedout".to_string(),
            ProbeError::Validation { .. } => "failure.validation".to_string(),
            ProbeError::Transport { .. } => "failure.transport".to_string(),
            ProbeError::BadStatus { .. } => "failure.bad_status".to_string(),
            ProbeError::MissingPrerequisite { .. } => "failure.missing_prerequisite".to_string(),
            ProbeError::InvalidTransition { .. } => "failure.invalid_transition".to_string(),
            ProbeError::Chain(_) => "failure.chain".to_string(),
            ProbeError::Index(_) => "failure.index".to_string(),
            ProbeError::Database(_) => "failure.database".to_string(),
        }
    }
}

/// Helper for stamping a [`Deal`] as FAILED with the first error observed,
/// per §4.3: "Any failure transitions Deal to FAILED with the first error
/// observed; no further stages execute."
pub fn fail_deal(deal: &mut Deal, err: &ProbeError) {
    if deal.status != DealStatus::Failed {
        deal.status = DealStatus::Failed;
        deal.error_message = Some(err.to_string());
    }
}
