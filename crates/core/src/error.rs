//! Configuration error types

use thiserror::Error;

/// Errors raised while building or validating a provider configuration
///
/// All of these are fatal at initialization and never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required property has no value
    #[error("missing required property '{0}'")]
    MissingProperty(String),

    /// Root node path is not an absolute, canonical node path
    #[error("invalid root node '{path}': {reason}")]
    InvalidRootNode {
        /// The rejected path
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// Connect string is not a list of `host:port` pairs
    #[error("invalid connect string '{input}': {reason}")]
    InvalidConnectString {
        /// The rejected connect string
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Access control policy name is not recognized
    #[error("unrecognized access control policy '{0}' (expected 'Open' or 'CreatorOnly')")]
    UnknownAccessControl(String),

    /// Time period could not be parsed
    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration {
        /// The rejected value
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Timeout is zero or otherwise unusable
    #[error("invalid {name}: {reason}")]
    InvalidTimeout {
        /// Which timeout
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Creator-only nodes need an authenticated identity
    #[error("access control 'CreatorOnly' requires credentials")]
    MissingCredentials,

    /// Retry policy has unusable values
    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    /// Payload ceiling override is unusable
    #[error("invalid payload limit: {0}")]
    InvalidPayloadLimit(String),

    /// Config file could not be read or parsed
    #[error("failed to load configuration: {0}")]
    Load(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
