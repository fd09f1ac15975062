/// Validation failure tags, per §4.4: "errors tagged root-cid-mismatch,
/// cid-verify-error, or car-read-error."
#[derive(Debug, Clone, thiserror::Error)]
pub enum ArchiveValidationError {
    #[error("root-cid-mismatch: expected {expected}, got {actual}")]
    RootCidMismatch { expected: String, actual: String },

    #[error("cid-verify-error: block {cid} failed hash recomputation")]
    CidVerifyError { cid: String },

    #[error("car-read-error: {0}")]
    CarReadError(String),
}

impl ArchiveValidationError {
    pub fn tag(&self) -> &'static str {
        match self {
            ArchiveValidationError::RootCidMismatch { .. } => "root-cid-mismatch",
            ArchiveValidationError::CidVerifyError { .. } => "cid-verify-error",
            ArchiveValidationError::CarReadError(_) => "car-read-error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveBuildError {
    #[error("cid encode error: {0}")]
    Cid(#[from] cid::Error),
}
