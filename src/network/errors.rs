//! Error types for API requests

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Request rejected ({code}): {msg}")]
    Rejected { code: i64, msg: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

pub type NetworkResult<T> = Result<T, NetworkError>;
