//! Error types for ringcache

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Protocol Errors ===
    #[error("empty key or value")]
    EmptyParameter,

    #[error("no node available to own the key")]
    PickNodeFailed,

    // === Peer Errors ===
    #[error("peer request failed: {0}")]
    RequestFormationFailed(String),

    #[error("failed to read peer response body: {0}")]
    ReadBodyFailed(String),

    #[error("retry limit exceeded after {attempts} attempts")]
    RetryLimitExceeded { attempts: usize },

    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration source error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> StatusCode {
        match self {
            Error::EmptyParameter | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.to_http_status(), self.to_string()).into_response()
    }
}
