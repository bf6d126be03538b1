//! In-process coordination ensemble
//!
//! [`InMemoryEnsemble`] implements [`CoordinationService`] over a shared
//! node tree. Every handle cloned from one ensemble sees the same tree, so
//! several providers in one process behave like cluster members talking to
//! the same service.
//!
//! The ensemble also exposes fault injection: taking the service offline,
//! expiring sessions, and deleting nodes behind a client's back. Session
//! events are delivered synchronously on the thread that caused them, never
//! while an ensemble lock is held.

mod tree;

use crate::error::{CoordResult, CoordinationError};
use crate::node::{NodeAcl, Stat};
use crate::traits::{
    ConnectRequest, CoordinationService, CoordinationSession, SessionEvent, SessionWatcher,
};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use statekeeper_core::limits::DEFAULT_MAX_PAYLOAD_BYTES;
use statekeeper_core::ServerAddress;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use tree::NodeTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    Live,
    Disconnected,
    Expired,
    Closed,
}

struct SessionRecord {
    id: u64,
    identity: Option<String>,
    phase: Mutex<SessionPhase>,
    watcher: Arc<dyn SessionWatcher>,
}

impl SessionRecord {
    /// Move to `to` if currently in one of `from`; returns whether it moved
    fn transition(&self, from: &[SessionPhase], to: SessionPhase) -> bool {
        let mut phase = self.phase.lock();
        if from.contains(&*phase) {
            *phase = to;
            true
        } else {
            false
        }
    }
}

struct EnsembleInner {
    /// Endpoints that accept connections; empty accepts any
    servers: Vec<ServerAddress>,
    tree: RwLock<NodeTree>,
    sessions: DashMap<u64, Arc<SessionRecord>>,
    next_session_id: AtomicU64,
    available: AtomicBool,
    require_tls: AtomicBool,
    connect_attempts: AtomicU64,
}

/// Shared in-memory coordination service
///
/// # Example
///
/// ```
/// use statekeeper_coordination::InMemoryEnsemble;
///
/// let ensemble = InMemoryEnsemble::new();
/// let peer = ensemble.clone();
/// assert_eq!(peer.node_count(), 1); // just the root
/// ```
#[derive(Clone)]
pub struct InMemoryEnsemble {
    inner: Arc<EnsembleInner>,
}

impl InMemoryEnsemble {
    /// Ensemble accepting any endpoint, with the default node ceiling
    pub fn new() -> Self {
        Self::build(Vec::new(), DEFAULT_MAX_PAYLOAD_BYTES)
    }

    /// Ensemble accepting only the given endpoints
    pub fn with_servers(servers: impl IntoIterator<Item = ServerAddress>) -> Self {
        Self::build(servers.into_iter().collect(), DEFAULT_MAX_PAYLOAD_BYTES)
    }

    /// Ensemble with a custom node ceiling
    pub fn with_max_payload_bytes(max_payload_bytes: usize) -> Self {
        Self::build(Vec::new(), max_payload_bytes)
    }

    fn build(servers: Vec<ServerAddress>, max_payload_bytes: usize) -> Self {
        Self {
            inner: Arc::new(EnsembleInner {
                servers,
                tree: RwLock::new(NodeTree::new(max_payload_bytes)),
                sessions: DashMap::new(),
                next_session_id: AtomicU64::new(1),
                available: AtomicBool::new(true),
                require_tls: AtomicBool::new(false),
                connect_attempts: AtomicU64::new(0),
            }),
        }
    }

    /// Node ceiling enforced on every write
    pub fn max_payload_bytes(&self) -> usize {
        self.inner.tree.read().max_payload_bytes()
    }

    /// Reject connections that carry no TLS context
    pub fn require_tls(&self, required: bool) {
        self.inner.require_tls.store(required, Ordering::SeqCst);
    }

    /// Whether the service is reachable
    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// Take the service offline or bring it back
    ///
    /// Going offline disconnects every live session; coming back reconnects
    /// them. Sessions expired in between stay expired.
    pub fn set_available(&self, available: bool) {
        let was = self.inner.available.swap(available, Ordering::SeqCst);
        if was == available {
            return;
        }
        info!(available, "In-memory ensemble availability changed");

        let (from, to) = if available {
            (SessionPhase::Disconnected, SessionPhase::Live)
        } else {
            (SessionPhase::Live, SessionPhase::Disconnected)
        };
        let mut notify = Vec::new();
        for entry in self.inner.sessions.iter() {
            let record = entry.value();
            if record.transition(&[from], to) {
                notify.push(Arc::clone(record));
            }
        }
        for record in notify {
            let event = if available {
                SessionEvent::Connected {
                    session_id: record.id,
                }
            } else {
                SessionEvent::Disconnected {
                    session_id: record.id,
                }
            };
            record.watcher.on_event(event);
        }
    }

    /// Expire one session as the service would after a missed timeout
    ///
    /// Returns false if no such session is open.
    pub fn expire_session(&self, session_id: u64) -> bool {
        let Some((_, record)) = self.inner.sessions.remove(&session_id) else {
            return false;
        };
        let moved = record.transition(
            &[SessionPhase::Live, SessionPhase::Disconnected],
            SessionPhase::Expired,
        );
        if moved {
            debug!(session_id, "Session expired");
            record.watcher.on_event(SessionEvent::Expired { session_id });
        }
        moved
    }

    /// Expire every open session; returns how many were expired
    pub fn expire_all_sessions(&self) -> usize {
        self.session_ids()
            .into_iter()
            .filter(|id| self.expire_session(*id))
            .count()
    }

    /// Ids of the open sessions, ascending
    pub fn session_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.inner.sessions.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of open sessions
    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Number of connect calls received, successful or not
    pub fn connect_attempts(&self) -> u64 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// Number of nodes, including the root
    pub fn node_count(&self) -> usize {
        self.inner.tree.read().len()
    }

    /// ACL of a node, `None` if absent
    pub fn node_acl(&self, path: &str) -> Option<NodeAcl> {
        self.inner.tree.read().acl(path)
    }

    /// Metadata of a node, bypassing sessions and ACLs
    pub fn stat(&self, path: &str) -> Option<Stat> {
        self.inner.tree.read().exists(path).ok().flatten()
    }

    /// Delete a node and its descendants out of band
    ///
    /// Stands in for an operator removing nodes with an admin tool.
    pub fn remove_subtree(&self, path: &str) -> usize {
        self.inner.tree.write().remove_subtree(path)
    }

    fn accepts(&self, servers: &[ServerAddress]) -> bool {
        self.inner.servers.is_empty() || servers.iter().any(|s| self.inner.servers.contains(s))
    }
}

impl Default for InMemoryEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryEnsemble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEnsemble")
            .field("servers", &self.inner.servers)
            .field("available", &self.is_available())
            .field("sessions", &self.session_count())
            .finish()
    }
}

impl CoordinationService for InMemoryEnsemble {
    fn connect(&self, request: ConnectRequest) -> CoordResult<Arc<dyn CoordinationSession>> {
        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);

        if !self.is_available() {
            return Err(CoordinationError::ConnectionLoss(format!(
                "no server in {} is reachable",
                request.servers
            )));
        }
        if !self.accepts(request.servers.servers()) {
            return Err(CoordinationError::ConnectionLoss(format!(
                "no server listening at {}",
                request.servers
            )));
        }
        if self.inner.require_tls.load(Ordering::SeqCst) && request.tls.is_none() {
            return Err(CoordinationError::ConnectionLoss(
                "server requires a secure transport".to_string(),
            ));
        }
        let identity = match &request.credentials {
            Some(c) if c.principal().is_empty() => {
                return Err(CoordinationError::AuthFailed(format!(
                    "empty principal for scheme '{}'",
                    c.scheme()
                )))
            }
            Some(c) => Some(c.identity()),
            None => None,
        };

        let id = self.inner.next_session_id.fetch_add(1, Ordering::SeqCst);
        let record = Arc::new(SessionRecord {
            id,
            identity,
            phase: Mutex::new(SessionPhase::Live),
            watcher: request.watcher,
        });
        self.inner.sessions.insert(id, Arc::clone(&record));
        debug!(
            session_id = id,
            servers = %request.servers,
            timeout_ms = request.session_timeout.as_millis() as u64,
            "Session established"
        );
        record
            .watcher
            .on_event(SessionEvent::Connected { session_id: id });

        Ok(Arc::new(MemorySession {
            record,
            ensemble: Arc::clone(&self.inner),
        }))
    }
}

/// Session handle returned by [`InMemoryEnsemble`]
pub struct MemorySession {
    record: Arc<SessionRecord>,
    ensemble: Arc<EnsembleInner>,
}

impl MemorySession {
    fn check(&self) -> CoordResult<()> {
        if !self.ensemble.available.load(Ordering::SeqCst) {
            return Err(CoordinationError::ConnectionLoss(
                "service unavailable".to_string(),
            ));
        }
        match *self.record.phase.lock() {
            SessionPhase::Live => Ok(()),
            SessionPhase::Disconnected => Err(CoordinationError::ConnectionLoss(
                "session disconnected".to_string(),
            )),
            SessionPhase::Expired => Err(CoordinationError::SessionExpired(self.record.id)),
            SessionPhase::Closed => Err(CoordinationError::Closed(self.record.id)),
        }
    }

    fn identity_ref(&self) -> Option<&str> {
        self.record.identity.as_deref()
    }
}

impl CoordinationSession for MemorySession {
    fn session_id(&self) -> u64 {
        self.record.id
    }

    fn identity(&self) -> Option<String> {
        self.record.identity.clone()
    }

    fn max_payload_bytes(&self) -> Option<usize> {
        Some(self.ensemble.tree.read().max_payload_bytes())
    }

    fn create(&self, path: &str, data: &[u8], acl: &NodeAcl) -> CoordResult<Stat> {
        self.check()?;
        self.ensemble
            .tree
            .write()
            .create(path, data, acl, self.identity_ref())
    }

    fn get_data(&self, path: &str) -> CoordResult<(Vec<u8>, Stat)> {
        self.check()?;
        self.ensemble.tree.read().get_data(path, self.identity_ref())
    }

    fn set_data(
        &self,
        path: &str,
        data: &[u8],
        expected_version: Option<u64>,
    ) -> CoordResult<Stat> {
        self.check()?;
        self.ensemble
            .tree
            .write()
            .set_data(path, data, expected_version, self.identity_ref())
    }

    fn delete(&self, path: &str, expected_version: Option<u64>) -> CoordResult<()> {
        self.check()?;
        self.ensemble
            .tree
            .write()
            .delete(path, expected_version, self.identity_ref())
    }

    fn get_children(&self, path: &str) -> CoordResult<Vec<String>> {
        self.check()?;
        self.ensemble
            .tree
            .read()
            .get_children(path, self.identity_ref())
    }

    fn exists(&self, path: &str) -> CoordResult<Option<Stat>> {
        self.check()?;
        self.ensemble.tree.read().exists(path)
    }

    fn close(&self) {
        let moved = self.record.transition(
            &[SessionPhase::Live, SessionPhase::Disconnected],
            SessionPhase::Closed,
        );
        if moved {
            self.ensemble.sessions.remove(&self.record.id);
            self.record.watcher.on_event(SessionEvent::Closed {
                session_id: self.record.id,
            });
        }
    }
}

impl std::fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySession")
            .field("id", &format_args!("0x{:x}", self.record.id))
            .field("identity", &self.record.identity)
            .field("phase", &*self.record.phase.lock())
            .finish()
    }
}
