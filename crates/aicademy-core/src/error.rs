use thiserror::Error;

/// Failures talking to the generation backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode backend payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("stream interrupted: {0}")]
    Stream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by stage orchestration and input validation.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Brief instruction not found for brief {ordinal}")]
    MissingInstruction { ordinal: u32 },

    #[error("{0}")]
    InvalidUpload(String),

    #[error("{0}")]
    InvalidConfiguration(String),
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;
