use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by the mail gateway. Mirrors the shape of
/// `search/error.rs`'s `SearchError`: one variant per failure mode the
/// caller needs to distinguish, not a single catch-all string.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail provider HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail provider returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
    /// The refresh token was rejected; the user must re-authorize.
    #[error("mail authorization expired: {0}")]
    AuthExpired(String),
    #[error("could not parse provider message: {0}")]
    InvalidMessage(String),
}

impl MailError {
    pub fn status(status: StatusCode, body: String) -> Self {
        MailError::Status { status, body }
    }
}
