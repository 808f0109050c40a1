//! Error taxonomy shared across the runtime
//!
//! Every failure surfaced by the core carries one of these classifications.
//! The request handler is the only place that maps them onto API status
//! codes; lower layers never invent their own error types.

use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Classified runtime error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or conflicting configuration, detected at setup time
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Protocol session not established or transport failure
    #[error("connection error: {0}")]
    Connection(String),

    /// Unsupported or lossy value/datatype mapping
    #[error("cannot convert value '{value}' to {target}: {reason}")]
    Conversion {
        value: String,
        target: String,
        reason: String,
    },

    /// The addressed element does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed or incomplete request, rejected before any side effect
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No provider of the given capability is bound to the reference
    #[error("no {capability} provider registered for reference {reference}")]
    ProviderNotRegistered {
        capability: &'static str,
        reference: String,
    },

    /// Catch-all for unclassified failures
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a conversion error naming the offending value and target type
    pub fn conversion(
        value: impl fmt::Display,
        target: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conversion {
            value: value.to_string(),
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    /// Map this error onto the fixed API status taxonomy
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::ProviderNotRegistered { .. } => {
                StatusCode::ClientErrorNotFound
            }
            Self::Conversion { .. } | Self::InvalidRequest(_) => {
                StatusCode::ClientErrorBadRequest
            }
            Self::Configuration(_) | Self::Connection(_) | Self::Internal(_) => {
                StatusCode::ServerInternalError
            }
        }
    }
}

/// Fixed status taxonomy exposed at the API boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StatusCode {
    Success,
    ClientErrorNotFound,
    ClientErrorBadRequest,
    ServerInternalError,
}

impl StatusCode {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "Success",
            Self::ClientErrorNotFound => "ClientErrorNotFound",
            Self::ClientErrorBadRequest => "ClientErrorBadRequest",
            Self::ServerInternalError => "ServerInternalError",
        };
        write!(f, "{name}")
    }
}
