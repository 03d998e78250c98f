use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM provider HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM provider returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),
    #[error("LLM response did not match the requested schema: {0}")]
    InvalidResponse(String),
    #[error("LLM request exhausted all retry attempts")]
    RetriesExhausted,
}

impl LlmError {
    pub fn status(status: StatusCode, body: String) -> Self {
        LlmError::Status { status, body }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Status { status, .. }
                if status.as_u16() == 429 || status.is_server_error()
        )
    }
}
