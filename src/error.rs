//! Error types and handling for the `Beachcast` collector

use thiserror::Error;

/// Main error type for the `Beachcast` application
#[derive(Error, Debug)]
pub enum BeachcastError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Upstream API communication errors
    #[error("API error: {message}")]
    Api { message: String },

    /// Upstream fatal status: retrying cannot help (bad key, bad params, ...)
    #[error("Upstream fatal status {code}: {message}")]
    UpstreamFatal { code: String, message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Forecast store operation errors
    #[error("Store error: {message}")]
    Store { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

impl BeachcastError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new upstream-fatal error
    pub fn upstream_fatal<S: Into<String>, M: Into<String>>(code: S, message: M) -> Self {
        Self::UpstreamFatal {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            BeachcastError::Config { .. } => {
                "Configuration error. Please check your config file and service key.".to_string()
            }
            BeachcastError::Api { .. } => {
                "Unable to reach the upstream forecast services. Please check your internet connection."
                    .to_string()
            }
            BeachcastError::UpstreamFatal { code, message } => {
                format!("The weather service rejected the request ({code}): {message}")
            }
            BeachcastError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            BeachcastError::Store { .. } => {
                "Forecast store operation failed. The database may be locked or corrupted."
                    .to_string()
            }
            BeachcastError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            BeachcastError::General { message } => message.clone(),
        }
    }
}
