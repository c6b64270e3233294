//! # Error Handling
//!
//! Error taxonomy shared by every credential backend.
//!
//! Each [`CredentialError`] maps onto one [`ErrorKind`]. The kind decides the
//! return contract of a retrieval: authentication and configuration problems
//! are propagated to the caller, everything else is reported and turned into an
//! empty result by the [`crate::secrets::classifier`].

use std::fmt;

/// Result type for credential operations.
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Errors that can occur while resolving a credential.
#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    /// Bad credentials, failed login/unlock or a client that could not be built.
    #[error("Authentication failed for {backend}: {message}")]
    Authentication { backend: String, message: String },

    /// Required parameters are missing or invalid.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The secret, item or field does not exist.
    #[error("Secret not found: {reference}")]
    NotFound { reference: String },

    /// The backend refused access to an existing reference.
    #[error("Permission denied for '{reference}': {message}")]
    PermissionDenied { reference: String, message: String },

    /// The backend throttled the request.
    #[error("Rate limit exceeded on {backend}: {message}")]
    RateLimited { backend: String, message: String },

    /// Network or service failure during a fetch.
    #[error("Backend error on {backend}: {message}")]
    Transient { backend: String, message: String },

    /// The backend answered with a payload that could not be understood.
    #[error("Invalid response from {backend}: {message}")]
    InvalidResponse { backend: String, message: String },

    /// A blocking step exceeded its deadline.
    #[error("Operation timed out: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },
}

/// Failure class of a [`CredentialError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Configuration,
    NotFound,
    PermissionDenied,
    RateLimited,
    Transient,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Configuration => "configuration",
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
        }
    }

    /// Whether a failure of this class may be swallowed at call time.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Authentication | Self::Configuration)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CredentialError {
    /// Create an authentication error
    pub fn authentication(backend: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::Authentication { backend: backend.to_string(), message: message.into() }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a not found error
    pub fn not_found(reference: impl Into<String>) -> Self {
        Self::NotFound { reference: reference.into() }
    }

    /// Create a permission denied error
    pub fn permission_denied(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PermissionDenied { reference: reference.into(), message: message.into() }
    }

    /// Create a rate limit error
    pub fn rate_limited(backend: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::RateLimited { backend: backend.to_string(), message: message.into() }
    }

    /// Create a transient backend error
    pub fn transient(backend: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::Transient { backend: backend.to_string(), message: message.into() }
    }

    /// Create an invalid response error
    pub fn invalid_response(backend: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::InvalidResponse { backend: backend.to_string(), message: message.into() }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration_ms: duration.as_millis() as u64 }
    }

    /// Failure class of this error.
    ///
    /// Timeouts and malformed payloads are transient here; callers that hit
    /// them while establishing a session convert them with
    /// [`CredentialError::into_authentication`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Transient { .. } | Self::InvalidResponse { .. } | Self::Timeout { .. } => {
                ErrorKind::Transient
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }

    /// Reclassify a failure that happened during authentication.
    ///
    /// Configuration and authentication errors keep their class.
    pub fn into_authentication(self, backend: impl fmt::Display) -> Self {
        match self {
            Self::Authentication { .. } | Self::Configuration { .. } => self,
            other => Self::authentication(backend, other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for CredentialError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::configuration(format!("Invalid settings: {}", errors))
    }
}
