//! Session manager error types

use statekeeper_coordination::CoordinationError;
use statekeeper_core::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// Failures of the session manager
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Settings could not be turned into a connect request
    #[error("invalid session settings: {0}")]
    Config(#[from] ConfigError),

    /// Every connection attempt failed
    #[error("could not connect to {servers} after {attempts} attempt(s): {source}")]
    ConnectFailed {
        /// Connect string that was tried
        servers: String,
        /// Attempts made
        attempts: u32,
        /// Failure of the last attempt
        source: CoordinationError,
    },

    /// No usable session within the wait budget
    #[error("no session established within {0:?}")]
    ConnectTimeout(Duration),

    /// The manager was closed
    #[error("session manager is closed")]
    Closed,

    /// Operation failed at the service
    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}

impl SessionError {
    /// Failure to reach or keep a session, as opposed to a rejected request
    pub fn is_connectivity(&self) -> bool {
        match self {
            SessionError::ConnectFailed { .. } | SessionError::ConnectTimeout(_) => true,
            SessionError::Coordination(e) => e.is_connectivity(),
            SessionError::Config(_) | SessionError::Closed => false,
        }
    }
}

/// Result type for session manager operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;
