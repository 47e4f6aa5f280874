//! Error types for the Scaleway provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors that can occur while handling a resource lifecycle call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found (HTTP 404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A local validation error, raised before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An unclassified error returned by the Scaleway API.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request could not be sent or its body could not be read.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Resource already exists (HTTP 409).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (HTTP 401/403).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded (HTTP 429).
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable (HTTP 502/503/504).
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A waiter gave up before the resource reached a terminal status.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The resource reached a terminal status other than the one required.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation not supported by the resource.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request (HTTP 400).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider was stopped while the operation was in flight.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl ProviderError {
    /// Get the error message as a string.
    ///
    /// Returns a reference to the error message for any variant.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Sdk(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
            Self::AlreadyExists(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::ResourceExhausted(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::Unimplemented(msg) => msg,
            Self::InvalidRequest(msg) => msg,
            Self::Cancelled(msg) => msg,
        }
    }

    /// Classify a non-success HTTP status returned by the Scaleway API.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => Self::InvalidRequest(message),
            401 | 403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            429 => Self::ResourceExhausted(message),
            502..=504 => Self::Unavailable(message),
            _ => Self::Sdk(format!("HTTP {}: {}", status, message)),
        }
    }

    /// Prefix the message with the operation that failed, keeping the variant.
    pub fn context(self, what: impl std::fmt::Display) -> Self {
        match self {
            Self::NotFound(msg) => Self::NotFound(format!("{}: {}", what, msg)),
            Self::Validation(msg) => Self::Validation(format!("{}: {}", what, msg)),
            Self::Sdk(msg) => Self::Sdk(format!("{}: {}", what, msg)),
            Self::AlreadyExists(msg) => Self::AlreadyExists(format!("{}: {}", what, msg)),
            Self::PermissionDenied(msg) => Self::PermissionDenied(format!("{}: {}", what, msg)),
            Self::InvalidRequest(msg) => Self::InvalidRequest(format!("{}: {}", what, msg)),
            Self::Unavailable(msg) => Self::Unavailable(format!("{}: {}", what, msg)),
            other => other,
        }
    }

    /// Whether the API reported the resource as missing (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the API refused access to the resource (HTTP 401/403).
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// Whether the API reported a conflict with an existing resource (HTTP 409).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// Render this error as an error diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.to_string());
        match self {
            Self::Serialization(err) => diagnostic.with_detail(err.to_string()),
            Self::Transport(err) => diagnostic.with_detail(err.to_string()),
            _ => diagnostic,
        }
    }
}
