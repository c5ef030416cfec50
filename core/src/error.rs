use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid ZIP: {0}")]
    InvalidArchive(String),

    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("decode failure: {0}")]
    DecodeFailure(String),

    #[error("probe step failed: {0}")]
    ProbeStepFailure(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Probe-step errors degrade a single metric instead of failing the run.
    pub fn is_step_degradation(&self) -> bool {
        matches!(
            self,
            CoreError::ProbeStepFailure(_) | CoreError::Timeout(_) | CoreError::DecodeFailure(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
