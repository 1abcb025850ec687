//! Error types for swarmgate

use axum::http::StatusCode;
use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Route table error: {0}")]
    Route(String),

    #[error("invalid URL escape {0:?}")]
    InvalidEscape(String),

    #[error("invalid semicolon separator in query")]
    InvalidSemicolon,

    #[error("Node error: {0}")]
    Node(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node already registered: {0}")]
    NodeExists(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Daemon error: {0}")]
    Daemon(String),
}

impl GatewayError {
    /// HTTP status used when this error is surfaced to an API client.
    ///
    /// Malformed form data maps to 500, not 400: the emulated engine API
    /// answers that way and clients may depend on it.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NodeNotFound(_) => StatusCode::NOT_FOUND,
            Self::NodeExists(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_yaml::Error> for GatewayError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml(e.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Engine(e.to_string())
    }
}
