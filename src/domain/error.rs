use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppError {
    Internal(String),
    /// Local file could not be read as delimited text.
    ParseError(String),
    /// Missing or non-numeric required fields, caught before any network call.
    ValidationError(String),
    /// Prediction server answered with a non-success status.
    RemoteError(String),
    /// The network call could not complete.
    TransportError(String),
    ConfigError(String),
    IoError(String),
    /// A submission is already pending or the session is not ready for one.
    Busy(String),
}

impl AppError {
    /// The bare message shown to the user, without the category prefix.
    pub fn user_message(&self) -> &str {
        match self {
            AppError::Internal(msg)
            | AppError::ParseError(msg)
            | AppError::ValidationError(msg)
            | AppError::RemoteError(msg)
            | AppError::TransportError(msg)
            | AppError::ConfigError(msg)
            | AppError::IoError(msg)
            | AppError::Busy(msg) => msg,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::RemoteError(msg) => write!(f, "Remote error: {}", msg),
            AppError::TransportError(msg) => write!(f, "Transport error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
            AppError::Busy(msg) => write!(f, "Busy: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::TransportError(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::ParseError(err.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
