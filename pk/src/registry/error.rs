//! Registry error types

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching prompt definitions
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Prompt not found at {url}")]
    NotFound { url: String },

    #[error("Unauthorized (HTTP {status}), check the registry API key")]
    Unauthorized { status: u16 },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid registry configuration: {0}")]
    Config(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RegistryError {
    /// Check if this is a missing prompt or version
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RegistryError::ApiError { status, .. } => *status >= 500 || *status == 429,
            RegistryError::Network(_) => true,
            RegistryError::Timeout(_) => true,
            RegistryError::NotFound { .. } => false,
            RegistryError::Unauthorized { .. } => false,
            RegistryError::InvalidResponse(_) => false,
            RegistryError::Config(_) => false,
            RegistryError::Json(_) => false,
            RegistryError::Io { .. } => false,
        }
    }
}
