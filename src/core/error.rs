//! Error taxonomy shared by the orchestrator and the workflow.

use thiserror::Error;

pub type GenResult<T> = Result<T, GenError>;

#[derive(Debug, Error)]
pub enum GenError {
    /// Missing credential or unusable configuration. Not retryable.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// The service answered, but not in the shape we asked for.
    #[error("Unexpected response format: {0}")]
    Format(String),

    /// Action rejected before any request was made.
    #[error("Workflow error: {0}")]
    Workflow(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("video job failed: {0}")]
    JobFailed(String),

    #[error("video job still running after {attempts} polls")]
    PollTimeout { attempts: u32 },

    #[error("video job polling cancelled")]
    Cancelled,

    #[error("video download failed: {0}")]
    Download(String),
}

impl GenError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn workflow(msg: impl Into<String>) -> Self {
        Self::Workflow(msg.into())
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Short text suitable for showing to the user. Details go to the log.
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(msg) => format!("Setup problem: {}", msg),
            Self::Service(ServiceError::PollTimeout { .. }) => {
                "The video is taking too long to render. Please try again later.".to_string()
            }
            Self::Service(ServiceError::Cancelled) => "Video generation was cancelled.".to_string(),
            Self::Service(_) => {
                "The generation service could not complete the request. Please try again.".to_string()
            }
            Self::Format(_) => {
                "The generation service returned an unexpected response. Please try again.".to_string()
            }
            Self::Workflow(msg) => msg.clone(),
        }
    }
}

impl From<reqwest::Error> for GenError {
    fn from(err: reqwest::Error) -> Self {
        Self::Service(ServiceError::Transport(err.to_string()))
    }
}
