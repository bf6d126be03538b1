//! Coordination service error types

use thiserror::Error;

/// Failures reported by a coordination session
///
/// The variants split into two families:
/// - connectivity: [`ConnectionLoss`](Self::ConnectionLoss),
///   [`SessionExpired`](Self::SessionExpired), [`Closed`](Self::Closed).
///   The request may or may not have reached the service.
/// - logical: everything else. The service received and rejected the request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    /// Node does not exist
    #[error("no node at {0}")]
    NoNode(String),

    /// Node already exists
    #[error("node already exists at {0}")]
    NodeExists(String),

    /// Conditional write or delete saw a different version
    #[error("version mismatch at {path}: expected {expected}, found {actual}")]
    BadVersion {
        /// Node path
        path: String,
        /// Version the caller expected
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// Node still has children
    #[error("node {0} has children")]
    NotEmpty(String),

    /// Session identity is not permitted by the node's ACL
    #[error("not authorized for {0}")]
    NoAuth(String),

    /// Creator-only ACL requested by an unauthenticated session
    #[error("invalid ACL for {0}: creator-only nodes need an authenticated session")]
    InvalidAcl(String),

    /// Payload exceeds the node ceiling
    #[error("payload of {size} bytes for {path} exceeds the {limit} byte node limit")]
    PayloadTooLarge {
        /// Node path
        path: String,
        /// Payload size
        size: usize,
        /// Node ceiling
        limit: usize,
    },

    /// Path is malformed
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The rejected path
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// Credentials were rejected
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The client cannot honour the request (e.g. a transport it lacks)
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Connection to the service was lost or could not be made
    #[error("connection loss: {0}")]
    ConnectionLoss(String),

    /// The session expired; operations issued under it are void
    #[error("session 0x{0:x} expired")]
    SessionExpired(u64),

    /// The session was closed by its owner
    #[error("session 0x{0:x} closed")]
    Closed(u64),
}

impl CoordinationError {
    /// Connection-level failure rather than a rejection by the service
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            CoordinationError::ConnectionLoss(_)
                | CoordinationError::SessionExpired(_)
                | CoordinationError::Closed(_)
        )
    }

    /// The session can no longer be used and must be replaced
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            CoordinationError::SessionExpired(_) | CoordinationError::Closed(_)
        )
    }
}

/// Result type for coordination operations
pub type CoordResult<T> = std::result::Result<T, CoordinationError>;
