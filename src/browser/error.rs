use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser worker HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("browser worker returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("browser worker is unavailable: {0}")]
    Unavailable(String),
}

impl BrowserError {
    pub fn status(status: StatusCode, body: String) -> Self {
        BrowserError::Status { status, body }
    }
}
