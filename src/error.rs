//! Unified error types for statekeeper.
//!
//! Internal crates each have their own error enum; this module folds them
//! into one type with a stable, caller-facing set of variants.

use crate::lifecycle::LifecycleState;
use statekeeper_coordination::CoordinationError;
use statekeeper_core::ConfigError;
use statekeeper_session::SessionError;
use thiserror::Error;

/// All statekeeper errors.
///
/// A failed compare-and-swap is not an error: `replace` returns `Ok(false)`.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration; fatal at `initialize`, never retried
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// No session within the retry budget, or the operation's session was lost
    ///
    /// Whether a mutating operation took effect is unknown; re-fetch before
    /// retrying.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// The encoded state exceeds a field or node ceiling; nothing was written
    #[error("state for component '{component_id}' is too large: {detail}")]
    StateTooLarge {
        /// Component whose state was rejected
        component_id: String,
        /// Which ceiling was exceeded
        detail: String,
    },

    /// A stored payload could not be decoded
    #[error("stored state for component '{component_id}' is corrupt: {detail}")]
    CorruptState {
        /// Component whose node is corrupt
        component_id: String,
        /// Decoder diagnosis
        detail: String,
    },

    /// Operation not allowed in the provider's current lifecycle state
    #[error("cannot {operation} while the provider is {state}")]
    IllegalState {
        /// Operation that was attempted
        operation: &'static str,
        /// State the provider was in
        state: LifecycleState,
    },

    /// Component identifier cannot be mapped to a node
    #[error("invalid component id: {0}")]
    InvalidComponentId(String),

    /// The service rejected the session's identity
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Unexpected failure reported by the coordination service
    #[error("coordination error: {0}")]
    Coordination(String),
}

/// Result type for statekeeper operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Only connectivity failures may succeed when the whole call is retried.
    pub fn is_retryable(&self) -> bool {
        self.is_connectivity()
    }

    /// Check if this is a connectivity error.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Connectivity(_))
    }

    /// Check if this is a lifecycle violation.
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Error::IllegalState { .. })
    }
}

// Convert from coordination service errors
impl From<CoordinationError> for Error {
    fn from(e: CoordinationError) -> Self {
        if e.is_connectivity() {
            Error::Connectivity(e.to_string())
        } else if matches!(
            e,
            CoordinationError::NoAuth(_)
                | CoordinationError::InvalidAcl(_)
                | CoordinationError::AuthFailed(_)
        ) {
            Error::AccessDenied(e.to_string())
        } else {
            Error::Coordination(e.to_string())
        }
    }
}

// Convert from session manager errors
impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Config(c) => Error::Configuration(c),
            SessionError::Coordination(c) => c.into(),
            SessionError::ConnectFailed { .. }
            | SessionError::ConnectTimeout(_)
            | SessionError::Closed => Error::Connectivity(e.to_string()),
        }
    }
}
