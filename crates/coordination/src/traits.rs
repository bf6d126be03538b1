//! Coordination service client seam
//!
//! A [`CoordinationService`] opens sessions; a [`CoordinationSession`]
//! exposes the node primitives the state provider needs. Session state
//! changes are pushed to a [`SessionWatcher`] supplied at connect time.
//!
//! All calls block until the service answers or the transport gives up.

use crate::error::CoordResult;
use crate::node::{NodeAcl, Stat};
use statekeeper_core::{ConnectString, Credentials, TlsContext};
use std::sync::Arc;
use std::time::Duration;

/// Session state change pushed by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session is usable
    Connected {
        /// Session the event belongs to
        session_id: u64,
    },
    /// Transport dropped; the session may still come back
    Disconnected {
        /// Session the event belongs to
        session_id: u64,
    },
    /// The service expired the session; it will never come back
    Expired {
        /// Session the event belongs to
        session_id: u64,
    },
    /// The session was closed by its owner
    Closed {
        /// Session the event belongs to
        session_id: u64,
    },
}

impl SessionEvent {
    /// Session the event belongs to
    pub fn session_id(&self) -> u64 {
        match self {
            SessionEvent::Connected { session_id }
            | SessionEvent::Disconnected { session_id }
            | SessionEvent::Expired { session_id }
            | SessionEvent::Closed { session_id } => *session_id,
        }
    }
}

/// Receiver of session events
///
/// Called from the client's own threads; implementations must not block.
pub trait SessionWatcher: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: SessionEvent);
}

impl<F> SessionWatcher for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: SessionEvent) {
        self(event)
    }
}

/// Parameters for opening a session
#[derive(Clone)]
pub struct ConnectRequest {
    /// Endpoints to try
    pub servers: ConnectString,
    /// Requested session timeout
    pub session_timeout: Duration,
    /// Identity to authenticate as
    pub credentials: Option<Credentials>,
    /// Secure transport context, if any
    pub tls: Option<TlsContext>,
    /// Receiver of this session's events
    pub watcher: Arc<dyn SessionWatcher>,
}

impl std::fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("servers", &self.servers)
            .field("session_timeout", &self.session_timeout)
            .field("credentials", &self.credentials)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

/// Factory for sessions against one coordination service
pub trait CoordinationService: Send + Sync {
    /// Open a new session
    ///
    /// Blocks until the handshake completes or fails.
    fn connect(&self, request: ConnectRequest) -> CoordResult<Arc<dyn CoordinationSession>>;
}

/// One session with the coordination service
///
/// Every operation fails with a connectivity error once the session has
/// expired or been closed. Operations never outlive their session.
pub trait CoordinationSession: Send + Sync {
    /// Identifier assigned by the service
    fn session_id(&self) -> u64;

    /// Identity the session authenticated as
    fn identity(&self) -> Option<String>;

    /// Largest payload the service accepts for one node, if known
    fn max_payload_bytes(&self) -> Option<usize>;

    /// Create a node; its parent must exist
    fn create(&self, path: &str, data: &[u8], acl: &NodeAcl) -> CoordResult<Stat>;

    /// Read a node's payload and metadata
    fn get_data(&self, path: &str) -> CoordResult<(Vec<u8>, Stat)>;

    /// Overwrite a node's payload
    ///
    /// With `expected_version = Some(v)` the write is applied only if the
    /// stored version is `v`; otherwise it fails with `BadVersion`.
    fn set_data(&self, path: &str, data: &[u8], expected_version: Option<u64>)
        -> CoordResult<Stat>;

    /// Delete a childless node, optionally conditional on its version
    fn delete(&self, path: &str, expected_version: Option<u64>) -> CoordResult<()>;

    /// Names of a node's direct children, sorted
    fn get_children(&self, path: &str) -> CoordResult<Vec<String>>;

    /// Metadata of a node, `None` if absent
    fn exists(&self, path: &str) -> CoordResult<Option<Stat>>;

    /// Close the session; later operations fail
    fn close(&self);
}
