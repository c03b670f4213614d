use std::fmt;

/// Errors that can occur while building or running the security pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request was rejected by the pipeline or a guard
    #[error("request rejected: {0}")]
    Rejected(#[from] Rejection),
    /// Configuration could not be loaded or is inconsistent
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A rejection of a single request, with an internal detail message.
///
/// The `detail` is meant for logs only. Anything that leaves the process
/// goes through [`ResponseMapper`](crate::ResponseMapper), which looks at
/// the `reason` alone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}: {detail}")]
pub struct Rejection {
    /// Why the request was rejected
    pub reason: RejectReason,
    /// Internal explanation, never exposed to clients
    pub detail: String,
}

impl Rejection {
    /// Creates a new rejection.
    pub fn new(reason: RejectReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    /// No recognized credential was present on the request.
    pub fn missing(detail: impl Into<String>) -> Self {
        Self::new(RejectReason::MissingCredential, detail)
    }

    /// The credential could not be parsed.
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(RejectReason::MalformedCredential, detail)
    }

    /// The credential was well-formed but not authentic.
    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::new(RejectReason::InvalidCredential, detail)
    }

    /// The credential was authentic but past its expiry.
    pub fn expired(detail: impl Into<String>) -> Self {
        Self::new(RejectReason::ExpiredCredential, detail)
    }

    /// The principal lacks what the resource requires.
    pub fn insufficient_scope(detail: impl Into<String>) -> Self {
        Self::new(RejectReason::InsufficientScope, detail)
    }

    /// Something went wrong inside the pipeline itself.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(RejectReason::InternalError, detail)
    }
}

/// The reason code of a rejection.
///
/// Every variant is recoverable at the request boundary: it ends processing
/// of one request and maps to a fixed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// No credential was found on the request
    MissingCredential,
    /// A credential was found but could not be parsed
    MalformedCredential,
    /// The credential failed verification
    InvalidCredential,
    /// The credential verified but has expired
    ExpiredCredential,
    /// The principal is authenticated but not allowed
    InsufficientScope,
    /// Unexpected fault inside the pipeline
    InternalError,
}

impl RejectReason {
    /// Returns `true` for reasons produced while authenticating the caller.
    pub fn is_authentication_failure(self) -> bool {
        matches!(
            self,
            RejectReason::MissingCredential
                | RejectReason::MalformedCredential
                | RejectReason::InvalidCredential
                | RejectReason::ExpiredCredential
        )
    }

    /// Stable snake_case code, suitable for log fields and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::MissingCredential => "missing_credential",
            RejectReason::MalformedCredential => "malformed_credential",
            RejectReason::InvalidCredential => "invalid_credential",
            RejectReason::ExpiredCredential => "expired_credential",
            RejectReason::InsufficientScope => "insufficient_scope",
            RejectReason::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while loading configuration or composing the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration document is not valid JSON for the schema
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// Signing or verification key material is unusable
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    /// A policy resource pattern could not be parsed
    #[error("invalid resource pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// What is wrong with it
        message: String,
    },
    /// A required secret was not provided by file or environment
    #[error("missing secret: {0}")]
    MissingSecret(&'static str),
    /// Any other inconsistency in the configuration
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
