use std::fmt;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<&'static str>,
    },

    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    #[error("External service error (GitHub): {message}")]
    UpstreamUnavailable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Database error: {0}")]
    Persistence(#[from] tokio_rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Discriminant callers switch on instead of matching variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    UpstreamUnavailable,
    Persistence,
    Config,
    Io,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::UpstreamUnavailable => "EXTERNAL_SERVICE_ERROR",
            ErrorKind::Persistence => "DATABASE_ERROR",
            ErrorKind::Config => "CONFIG_ERROR",
            ErrorKind::Io => "IO_ERROR",
        }
    }

    /// Client faults are never worth retrying.
    pub fn is_client_fault(self) -> bool {
        matches!(self, ErrorKind::Validation | ErrorKind::NotFound)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        AppError::NotFound { resource }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        AppError::UpstreamUnavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn upstream_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        AppError::UpstreamUnavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation { .. } => ErrorKind::Validation,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            AppError::Persistence(_) => ErrorKind::Persistence,
            AppError::Config(_) => ErrorKind::Config,
            AppError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::UpstreamUnavailable
    }

    /// Message safe to show a caller. Storage faults are reduced to a
    /// generic line; the detail has already been logged by the gateway.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Persistence(_) => "A database error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for AppError {
    fn from(e: toml::de::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(e: toml::ser::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::upstream_with("Malformed response", e)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
