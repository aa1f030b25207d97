//! Error types for the scoreboard auth service

use hyper::StatusCode;

use crate::auth::{GateError, TokenError};

/// Main error type for service operations
#[derive(Debug, thiserror::Error)]
pub enum ScoreboardError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

impl ScoreboardError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Http(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

impl From<std::io::Error> for ScoreboardError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ScoreboardError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<TokenError> for ScoreboardError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidSecret { .. } => Self::Config(err.to_string()),
            TokenError::Internal(msg) => Self::Internal(msg),
            other => Self::Auth(other.to_string()),
        }
    }
}

impl From<GateError> for ScoreboardError {
    fn from(err: GateError) -> Self {
        Self::Unauthorized(err.to_string())
    }
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ScoreboardError>;
