//! ZooKeeper-backed coordination service
//!
//! [`ZooKeeperService`] opens real sessions against a ZooKeeper ensemble
//! with the blocking `zookeeper` client. The connect string and session
//! timeout go straight to the client; credentials are registered with
//! `add_auth` before the session is handed out, and node ACLs map onto
//! ZooKeeper's `world:anyone` and `auth` schemes.
//!
//! ZooKeeper numbers data versions from 0; this module shifts them so that
//! [`Stat::version`] is 1 on creation like every other backend.

use crate::error::{CoordResult, CoordinationError};
use crate::node::{NodeAcl, Stat};
use crate::traits::{
    ConnectRequest, CoordinationService, CoordinationSession, SessionEvent, SessionWatcher,
};
use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use statekeeper_core::limits::DEFAULT_MAX_PAYLOAD_BYTES;
use statekeeper_core::Credentials;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use zookeeper::{Acl, CreateMode, KeeperState, WatchedEvent, ZkError, ZkState, ZooKeeper};

/// Local handle ids; the client does not expose the server's session id
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Opens sessions against a ZooKeeper ensemble
///
/// # Examples
///
/// ```no_run
/// use statekeeper_coordination::ZooKeeperService;
/// use std::sync::Arc;
///
/// let service = Arc::new(ZooKeeperService::new());
/// # let _ = service;
/// ```
#[derive(Debug, Clone)]
pub struct ZooKeeperService {
    max_payload_bytes: usize,
}

impl ZooKeeperService {
    /// Service assuming the server default `jute.maxbuffer` of 1 MiB
    pub fn new() -> Self {
        Self::with_max_payload_bytes(DEFAULT_MAX_PAYLOAD_BYTES)
    }

    /// Service for an ensemble configured with a different `jute.maxbuffer`
    pub fn with_max_payload_bytes(limit: usize) -> Self {
        Self {
            max_payload_bytes: limit,
        }
    }
}

impl Default for ZooKeeperService {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinationService for ZooKeeperService {
    fn connect(&self, request: ConnectRequest) -> CoordResult<Arc<dyn CoordinationSession>> {
        if request.tls.is_some() {
            return Err(CoordinationError::Unsupported(
                "the ZooKeeper client has no TLS transport".to_string(),
            ));
        }

        let id = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        let servers = request.servers.to_string();
        let link = Arc::new(LinkState {
            id,
            link: Mutex::new(Link::Pending),
            changed: Condvar::new(),
            closing: AtomicBool::new(false),
            watcher: request.watcher,
        });

        let from_watcher = Arc::clone(&link);
        let zk = ZooKeeper::connect(&servers, request.session_timeout, move |event: WatchedEvent| {
            from_watcher.on_watched(event)
        })
        .map_err(|e| CoordinationError::ConnectionLoss(format!("cannot reach {}: {:?}", servers, e)))?;
        let from_listener = Arc::clone(&link);
        zk.add_listener(move |state: ZkState| from_listener.on_state(state));

        let deadline = Instant::now() + request.session_timeout;
        if link.await_settled(deadline) != Link::Up {
            abandon(zk, &link);
            return Err(CoordinationError::ConnectionLoss(format!(
                "no server in {} answered within {:?}",
                servers, request.session_timeout
            )));
        }

        if let Some(credentials) = &request.credentials {
            if let Err(e) = zk.add_auth(credentials.scheme(), auth_bytes(credentials)) {
                abandon(zk, &link);
                return Err(CoordinationError::AuthFailed(format!(
                    "{} credentials for '{}' rejected: {:?}",
                    credentials.scheme(),
                    credentials.principal(),
                    e
                )));
            }
        }

        info!(handle = id, servers = %servers, timeout_ms = request.session_timeout.as_millis() as u64, "ZooKeeper session open");
        Ok(Arc::new(ZooKeeperSession {
            zk,
            link,
            identity: request.credentials.as_ref().map(Credentials::identity),
            max_payload_bytes: self.max_payload_bytes,
        }))
    }
}

/// Close a session the caller will never see
///
/// Closing waits for the server, which may never answer; do it off the
/// caller's thread.
fn abandon(zk: ZooKeeper, link: &LinkState) {
    link.closing.store(true, Ordering::SeqCst);
    let id = link.id;
    std::thread::spawn(move || {
        if let Err(e) = zk.close() {
            debug!(handle = id, error = ?e, "Abandoned session did not close cleanly");
        }
    });
}

fn auth_bytes(credentials: &Credentials) -> Vec<u8> {
    format!("{}:{}", credentials.principal(), credentials.secret()).into_bytes()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Pending,
    Up,
    Down,
    Lost,
}

/// Connection progress, fed by both the client's watcher and its listener
struct LinkState {
    id: u64,
    link: Mutex<Link>,
    changed: Condvar,
    closing: AtomicBool,
    watcher: Arc<dyn SessionWatcher>,
}

impl LinkState {
    fn on_watched(&self, event: WatchedEvent) {
        if event.path.is_some() {
            return;
        }
        match event.keeper_state {
            KeeperState::SyncConnected | KeeperState::ConnectedReadOnly => self.advance(Link::Up),
            KeeperState::Disconnected => self.advance(Link::Down),
            KeeperState::Expired | KeeperState::AuthFailed => self.advance(Link::Lost),
            _ => {}
        }
    }

    fn on_state(&self, state: ZkState) {
        match state {
            ZkState::Connected | ZkState::ConnectedReadOnly => self.advance(Link::Up),
            ZkState::Closed | ZkState::AuthFailed => self.advance(Link::Lost),
            _ => self.advance(Link::Down),
        }
    }

    /// Record a transition and forward it; `Lost` is final
    fn advance(&self, next: Link) {
        let event = {
            let mut link = self.link.lock();
            if *link == next || *link == Link::Lost {
                return;
            }
            *link = next;
            self.changed.notify_all();
            match next {
                Link::Up => SessionEvent::Connected { session_id: self.id },
                Link::Down => SessionEvent::Disconnected { session_id: self.id },
                Link::Lost if self.closing.load(Ordering::SeqCst) => {
                    SessionEvent::Closed { session_id: self.id }
                }
                Link::Lost => SessionEvent::Expired { session_id: self.id },
                Link::Pending => return,
            }
        };
        self.watcher.on_event(event);
    }

    /// Wait until the handshake succeeds, the session is lost, or `deadline`
    fn await_settled(&self, deadline: Instant) -> Link {
        let mut link = self.link.lock();
        while matches!(*link, Link::Pending | Link::Down) {
            if self.changed.wait_until(&mut link, deadline).timed_out() {
                break;
            }
        }
        *link
    }

    fn current(&self) -> Link {
        *self.link.lock()
    }
}

/// One ZooKeeper session
pub struct ZooKeeperSession {
    zk: ZooKeeper,
    link: Arc<LinkState>,
    identity: Option<String>,
    max_payload_bytes: usize,
}

impl ZooKeeperSession {
    fn check(&self) -> CoordResult<()> {
        if self.link.closing.load(Ordering::SeqCst) {
            return Err(CoordinationError::Closed(self.link.id));
        }
        if self.link.current() == Link::Lost {
            return Err(CoordinationError::SessionExpired(self.link.id));
        }
        Ok(())
    }

    fn check_payload(&self, path: &str, data: &[u8]) -> CoordResult<()> {
        if data.len() > self.max_payload_bytes {
            return Err(CoordinationError::PayloadTooLarge {
                path: path.to_string(),
                size: data.len(),
                limit: self.max_payload_bytes,
            });
        }
        Ok(())
    }

    fn error(&self, err: ZkError, path: &str) -> CoordinationError {
        map_error(err, path, self.link.id)
    }

    /// Client-side version for a conditional call, or the mismatch it must
    /// produce
    fn expected(&self, path: &str, expected: Option<u64>) -> CoordResult<Option<i32>> {
        match expected {
            None => Ok(None),
            Some(v) => wire_version(v).map(Some).ok_or_else(|| self.bad_version(path, v)),
        }
    }

    fn bad_version(&self, path: &str, expected: u64) -> CoordinationError {
        let actual = match self.zk.exists(path, false) {
            Ok(Some(stat)) => convert_version(stat.version),
            _ => 0,
        };
        CoordinationError::BadVersion {
            path: path.to_string(),
            expected,
            actual,
        }
    }
}

impl CoordinationSession for ZooKeeperSession {
    fn session_id(&self) -> u64 {
        self.link.id
    }

    fn identity(&self) -> Option<String> {
        self.identity.clone()
    }

    fn max_payload_bytes(&self) -> Option<usize> {
        Some(self.max_payload_bytes)
    }

    fn create(&self, path: &str, data: &[u8], acl: &NodeAcl) -> CoordResult<Stat> {
        self.check()?;
        self.check_payload(path, data)?;
        self.zk
            .create(path, data.to_vec(), zk_acl(acl), CreateMode::Persistent)
            .map_err(|e| self.error(e, path))?;
        // create only answers with the path; fetch the metadata separately
        match self.zk.exists(path, false) {
            Ok(Some(stat)) => Ok(convert_stat(&stat)),
            Ok(None) => Err(CoordinationError::NoNode(path.to_string())),
            Err(e) => Err(self.error(e, path)),
        }
    }

    fn get_data(&self, path: &str) -> CoordResult<(Vec<u8>, Stat)> {
        self.check()?;
        let (data, stat) = self
            .zk
            .get_data(path, false)
            .map_err(|e| self.error(e, path))?;
        Ok((data, convert_stat(&stat)))
    }

    fn set_data(
        &self,
        path: &str,
        data: &[u8],
        expected_version: Option<u64>,
    ) -> CoordResult<Stat> {
        self.check()?;
        self.check_payload(path, data)?;
        let version = self.expected(path, expected_version)?;
        match self.zk.set_data(path, data.to_vec(), version) {
            Ok(stat) => Ok(convert_stat(&stat)),
            Err(ZkError::BadVersion) => Err(self.bad_version(path, expected_version.unwrap_or(0))),
            Err(e) => Err(self.error(e, path)),
        }
    }

    fn delete(&self, path: &str, expected_version: Option<u64>) -> CoordResult<()> {
        self.check()?;
        let version = self.expected(path, expected_version)?;
        match self.zk.delete(path, version) {
            Ok(()) => Ok(()),
            Err(ZkError::BadVersion) => Err(self.bad_version(path, expected_version.unwrap_or(0))),
            Err(e) => Err(self.error(e, path)),
        }
    }

    fn get_children(&self, path: &str) -> CoordResult<Vec<String>> {
        self.check()?;
        let mut children = self
            .zk
            .get_children(path, false)
            .map_err(|e| self.error(e, path))?;
        children.sort();
        Ok(children)
    }

    fn exists(&self, path: &str) -> CoordResult<Option<Stat>> {
        self.check()?;
        self.zk
            .exists(path, false)
            .map(|stat| stat.as_ref().map(convert_stat))
            .map_err(|e| self.error(e, path))
    }

    fn close(&self) {
        if self.link.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(handle = self.link.id, "Closing ZooKeeper session");
        if let Err(e) = self.zk.close() {
            warn!(handle = self.link.id, error = ?e, "ZooKeeper session did not close cleanly");
        }
        self.link.advance(Link::Lost);
    }
}

impl Drop for ZooKeeperSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ZooKeeperSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZooKeeperSession")
            .field("handle", &self.link.id)
            .field("link", &self.link.current())
            .field("identity", &self.identity)
            .finish()
    }
}

fn zk_acl(acl: &NodeAcl) -> Vec<Acl> {
    match acl {
        NodeAcl::Open => Acl::open_unsafe().clone(),
        // The server substitutes the identities the session authenticated as
        NodeAcl::CreatorOnly { .. } => Acl::creator_all().clone(),
    }
}

/// ZooKeeper data version for a 1-based version, `None` if no node can
/// carry it
fn wire_version(version: u64) -> Option<i32> {
    i32::try_from(version).ok()?.checked_sub(1).filter(|v| *v >= 0)
}

fn convert_version(version: i32) -> u64 {
    u64::try_from(version).unwrap_or(0) + 1
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
}

fn convert_stat(stat: &zookeeper::Stat) -> Stat {
    Stat {
        version: convert_version(stat.version),
        czxid: u64::try_from(stat.czxid).unwrap_or(0),
        mzxid: u64::try_from(stat.mzxid).unwrap_or(0),
        ctime: timestamp(stat.ctime),
        mtime: timestamp(stat.mtime),
        data_length: usize::try_from(stat.data_length).unwrap_or(0),
        num_children: usize::try_from(stat.num_children).unwrap_or(0),
    }
}

fn map_error(err: ZkError, path: &str, session_id: u64) -> CoordinationError {
    let path = path.to_string();
    match err {
        ZkError::NoNode => CoordinationError::NoNode(path),
        ZkError::NodeExists => CoordinationError::NodeExists(path),
        ZkError::NotEmpty => CoordinationError::NotEmpty(path),
        ZkError::NoAuth => CoordinationError::NoAuth(path),
        ZkError::InvalidACL => CoordinationError::InvalidAcl(path),
        ZkError::AuthFailed => CoordinationError::AuthFailed(format!("server rejected the session's credentials at {}", path)),
        ZkError::SessionExpired => CoordinationError::SessionExpired(session_id),
        ZkError::BadArguments => CoordinationError::InvalidPath {
            path,
            reason: "rejected by the server".to_string(),
        },
        ZkError::BadVersion => CoordinationError::BadVersion {
            path,
            expected: 0,
            actual: 0,
        },
        other => CoordinationError::ConnectionLoss(format!("{:?} at {}", other, path)),
    }
}
