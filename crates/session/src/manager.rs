//! Session manager
//!
//! Owns the one logical session a provider holds with the coordination
//! service. The session is opened lazily and replaced after expiry; callers
//! run node operations through [`SessionManager::with_session`], which
//! applies the retry rules:
//!
//! - connection loss is retried with jittered exponential backoff, but only
//!   for [`OpKind::Idempotent`] operations
//! - session expiry is never retried; the operation fails and the next call
//!   opens a fresh session
//! - logical failures (missing node, version mismatch, ACL) are returned as-is
//!
//! ## Locking
//!
//! Session operations and session events never run under the manager's own
//! locks: the current session is cloned out, the lock is released, and only
//! then is the service called. Events can therefore arrive from inside any
//! service call without deadlocking.

use crate::backoff::jittered;
use crate::error::{SessionError, SessionResult};
use crate::state::ConnectionState;
use parking_lot::{Condvar, Mutex};
use statekeeper_coordination::{
    ConnectRequest, CoordResult, CoordinationError, CoordinationService, CoordinationSession,
    NodeAcl, SessionEvent, SessionWatcher,
};
use statekeeper_core::{ConfigError, ConnectString, Credentials, ProviderConfig, RetryPolicy, TlsContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Whether an operation may be re-issued after a connection loss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Re-issuing has the same effect as issuing once (reads, unconditional
    /// writes, parent creation, deletes)
    Idempotent,
    /// The outcome of a lost request is unknown (conditional writes)
    Conditional,
}

type SessionHandle = Arc<dyn CoordinationSession>;

/// State shared with the session watcher
struct Shared {
    label: String,
    current: Mutex<Option<SessionHandle>>,
    state: Mutex<ConnectionState>,
    changed: Condvar,
    closed: AtomicBool,
}

impl Shared {
    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock();
        if *state != next {
            info!(provider = %self.label, from = %*state, to = %next, "Connection state changed");
            *state = next;
        }
        self.changed.notify_all();
    }

    fn current_id(&self) -> Option<u64> {
        self.current.lock().as_ref().map(|s| s.session_id())
    }

    fn handle_event(&self, event: SessionEvent) {
        let session_id = event.session_id();
        let applied = match event {
            SessionEvent::Connected { .. } => {
                self.update_if_current(session_id, false, ConnectionState::Connected)
            }
            SessionEvent::Disconnected { .. } => {
                self.update_if_current(session_id, false, ConnectionState::Disconnected)
            }
            SessionEvent::Expired { .. } => {
                self.update_if_current(session_id, true, ConnectionState::SessionExpired)
            }
            SessionEvent::Closed { .. } => {
                self.update_if_current(session_id, true, ConnectionState::Disconnected)
            }
        };
        if !applied {
            debug!(provider = %self.label, ?event, "Ignoring event for a session that is not current");
            return;
        }
        match event {
            SessionEvent::Disconnected { .. } => {
                warn!(provider = %self.label, session_id, "Lost connection to the coordination service");
            }
            SessionEvent::Expired { .. } => {
                warn!(provider = %self.label, session_id, "Session expired");
            }
            SessionEvent::Connected { .. } | SessionEvent::Closed { .. } => {}
        }
    }

    /// Apply `next` (and drop the session if `drop_session`) only while
    /// `session_id` is still the current session
    ///
    /// Runs under the `current` lock so a newer session installed by another
    /// thread can never be overwritten by a late transition of an old one.
    fn update_if_current(&self, session_id: u64, drop_session: bool, next: ConnectionState) -> bool {
        let mut current = self.current.lock();
        if current.as_ref().map(|s| s.session_id()) != Some(session_id) {
            return false;
        }
        if drop_session {
            *current = None;
        }
        self.set_state(next);
        true
    }

    /// Make `session` current and mark the manager connected in one step
    fn install(&self, session: SessionHandle) {
        let mut current = self.current.lock();
        *current = Some(session);
        self.set_state(ConnectionState::Connected);
    }
}

/// Forwards events to the manager without keeping it alive
struct Watcher(Weak<Shared>);

impl SessionWatcher for Watcher {
    fn on_event(&self, event: SessionEvent) {
        if let Some(shared) = self.0.upgrade() {
            shared.handle_event(event);
        }
    }
}

/// One provider's session with the coordination service
pub struct SessionManager {
    service: Arc<dyn CoordinationService>,
    servers: ConnectString,
    session_timeout: Duration,
    connection_timeout: Duration,
    credentials: Option<Credentials>,
    tls: Option<TlsContext>,
    retry: RetryPolicy,
    acl: NodeAcl,
    /// Serializes connection attempts so concurrent callers share one session
    connect_lock: Mutex<()>,
    shared: Arc<Shared>,
}

impl SessionManager {
    /// Create a manager for a validated configuration; does not connect
    pub fn new(service: Arc<dyn CoordinationService>, config: &ProviderConfig) -> SessionResult<Self> {
        let servers = ConnectString::parse(&config.connect_string)?;
        let acl = NodeAcl::for_policy(config.access_control, config.credentials.as_ref())
            .ok_or(ConfigError::MissingCredentials)?;

        Ok(Self {
            service,
            servers,
            session_timeout: config.session_timeout,
            connection_timeout: config.connection_timeout,
            credentials: config.credentials.clone(),
            tls: config.tls.clone(),
            retry: config.retry.clone(),
            acl,
            connect_lock: Mutex::new(()),
            shared: Arc::new(Shared {
                label: config.identifier.clone(),
                current: Mutex::new(None),
                state: Mutex::new(ConnectionState::Disconnected),
                changed: Condvar::new(),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Open the first session, waiting at most the connection timeout
    pub fn start(&self) -> SessionResult<()> {
        self.await_connection(self.connection_timeout)
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    /// Whether a usable session exists right now
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Id of the current session, if any
    pub fn session_id(&self) -> Option<u64> {
        self.shared.current_id()
    }

    /// ACL applied to every node this manager creates
    pub fn acl(&self) -> &NodeAcl {
        &self.acl
    }

    /// Node ceiling reported by the current session
    pub fn max_payload_bytes(&self) -> Option<usize> {
        let session = self.shared.current.lock().clone();
        session.and_then(|s| s.max_payload_bytes())
    }

    /// Block until a session is usable or `timeout` elapses
    ///
    /// Opens a new session when there is none (first use, or after expiry);
    /// otherwise waits for the current one to reconnect.
    pub fn await_connection(&self, timeout: Duration) -> SessionResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.shared.closed.load(Ordering::SeqCst) {
                return Err(SessionError::Closed);
            }
            if self.shared.current.lock().is_none() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                return self.establish(remaining).map(|_| ());
            }

            let mut state = self.shared.state.lock();
            if *state == ConnectionState::Connected {
                return Ok(());
            }
            if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                return if *state == ConnectionState::Connected {
                    Ok(())
                } else {
                    Err(SessionError::ConnectTimeout(timeout))
                };
            }
        }
    }

    /// Run `op` against the current session under the retry rules
    ///
    /// `op` may be invoked several times for [`OpKind::Idempotent`].
    pub fn with_session<T, F>(&self, operation: &'static str, kind: OpKind, op: F) -> SessionResult<T>
    where
        F: Fn(&dyn CoordinationSession) -> CoordResult<T>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let session = self.session()?;
            match op(session.as_ref()) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_session_fatal() => {
                    warn!(
                        provider = %self.shared.label,
                        operation,
                        session_id = session.session_id(),
                        error = %e,
                        "Operation failed with its session; a new session will be opened on next use"
                    );
                    self.shared.update_if_current(
                        session.session_id(),
                        true,
                        ConnectionState::SessionExpired,
                    );
                    return Err(e.into());
                }
                Err(CoordinationError::ConnectionLoss(reason))
                    if kind == OpKind::Idempotent && attempt < self.retry.max_attempts =>
                {
                    let delay = jittered(&self.retry, attempt);
                    warn!(
                        provider = %self.shared.label,
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Connection loss, retrying"
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Close the session; the manager cannot be used afterwards
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let session = {
            let mut current = self.shared.current.lock();
            let session = current.take();
            self.shared.set_state(ConnectionState::Disconnected);
            session
        };
        if let Some(session) = session {
            info!(provider = %self.shared.label, session_id = session.session_id(), "Closing session");
            session.close();
        }
    }

    /// Current session, opening one within the connection timeout if needed
    fn session(&self) -> SessionResult<SessionHandle> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        if let Some(session) = self.shared.current.lock().clone() {
            return Ok(session);
        }
        self.establish(self.connection_timeout)
    }

    fn establish(&self, budget: Duration) -> SessionResult<SessionHandle> {
        let _guard = self.connect_lock.lock();
        if let Some(session) = self.shared.current.lock().clone() {
            return Ok(session);
        }

        let deadline = Instant::now() + budget;
        self.shared.set_state(ConnectionState::Connecting);
        let mut attempt = 0u32;
        loop {
            if self.shared.closed.load(Ordering::SeqCst) {
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(SessionError::Closed);
            }
            attempt += 1;

            let error = match self.service.connect(self.request()) {
                Ok(session) => {
                    self.shared.install(Arc::clone(&session));
                    info!(
                        provider = %self.shared.label,
                        session_id = session.session_id(),
                        servers = %self.servers,
                        attempt,
                        "Session established"
                    );
                    return Ok(session);
                }
                Err(e) => e,
            };

            if !error.is_connectivity() {
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(error.into());
            }
            let delay = jittered(&self.retry, attempt);
            if attempt >= self.retry.max_attempts || Instant::now() + delay >= deadline {
                warn!(
                    provider = %self.shared.label,
                    servers = %self.servers,
                    attempts = attempt,
                    error = %error,
                    "Giving up connecting to the coordination service"
                );
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(SessionError::ConnectFailed {
                    servers: self.servers.to_string(),
                    attempts: attempt,
                    source: error,
                });
            }
            warn!(
                provider = %self.shared.label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Connection attempt failed, retrying"
            );
            std::thread::sleep(delay);
        }
    }

    fn request(&self) -> ConnectRequest {
        ConnectRequest {
            servers: self.servers.clone(),
            session_timeout: self.session_timeout,
            credentials: self.credentials.clone(),
            tls: self.tls.clone(),
            watcher: Arc::new(Watcher(Arc::downgrade(&self.shared))),
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("servers", &self.servers)
            .field("state", &self.state())
            .field("session_id", &self.session_id())
            .field("acl", &self.acl)
            .finish()
    }
}
