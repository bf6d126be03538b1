//! Versioned state provider.
//!
//! Stores each component's state map as one node in the coordination
//! service and exposes compare-and-swap on top of the node's version.
//!
//! # Example
//!
//! ```
//! use statekeeper::prelude::*;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let provider = VersionedStateProvider::new(Arc::new(InMemoryEnsemble::new()));
//! provider.initialize(ProviderConfig::builder("localhost:2181")
//!     .root_node("/app/team1/testing")
//!     .build())?;
//! provider.enable()?;
//!
//! let values = HashMap::from([("a".to_string(), "1".to_string())]);
//! provider.set_state(&values, "comp-1")?;
//!
//! let snapshot = provider.get_state("comp-1")?;
//! let next = HashMap::from([("a".to_string(), "2".to_string())]);
//! assert!(provider.replace(&snapshot, &next, "comp-1")?);
//! assert!(!provider.replace(&snapshot, &next, "comp-1")?);
//! # Ok::<(), statekeeper::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::lifecycle::LifecycleState;
use crate::path::PathResolver;
use parking_lot::RwLock;
use statekeeper_coordination::{CoordinationError, CoordinationService, ZooKeeperService};
use statekeeper_core::{
    effective_payload_limit, ComponentId, ProviderConfig, Scope, StateSnapshot, Version,
};
use statekeeper_session::{ConnectionState, OpKind, SessionError, SessionManager};
use statekeeper_wire::{decode_state, encode_state, EncodeError, PayloadLimits};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Scopes served by this provider
const SUPPORTED_SCOPES: &[Scope] = &[Scope::Cluster];

/// Resources that exist while the provider is enabled or disabled
struct Runtime {
    paths: PathResolver,
    session: SessionManager,
    limits: PayloadLimits,
}

struct Inner {
    state: LifecycleState,
    config: Option<ProviderConfig>,
    runtime: Option<Runtime>,
}

impl Inner {
    fn transition(&mut self, operation: &'static str, to: LifecycleState) -> Result<()> {
        if to.predecessor() != Some(self.state) {
            return Err(Error::IllegalState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn enabled(&self, operation: &'static str) -> Result<&Runtime> {
        match (&self.state, &self.runtime) {
            (LifecycleState::Enabled, Some(runtime)) => Ok(runtime),
            _ => Err(Error::IllegalState {
                operation,
                state: self.state,
            }),
        }
    }
}

/// Component-scoped, cluster-consistent state store
///
/// Thread-safe; share it behind an `Arc`. Calls for different components
/// are independent round trips. Calls for the same component race at the
/// coordination service, whose version check is the only arbiter.
///
/// Lifecycle transitions take the write lock; data operations hold a read
/// guard for their whole duration, so `shutdown` waits for in-flight calls
/// without serializing them against each other.
pub struct VersionedStateProvider {
    service: Arc<dyn CoordinationService>,
    inner: RwLock<Inner>,
}

impl VersionedStateProvider {
    /// Create an uninitialized provider backed by `service`
    pub fn new(service: Arc<dyn CoordinationService>) -> Self {
        Self {
            service,
            inner: RwLock::new(Inner {
                state: LifecycleState::Uninitialized,
                config: None,
                runtime: None,
            }),
        }
    }

    /// Create an uninitialized provider backed by a ZooKeeper ensemble
    ///
    /// The ensemble is the one named by the connect string passed to
    /// [`initialize`](Self::initialize).
    pub fn zookeeper() -> Self {
        Self::new(Arc::new(ZooKeeperService::new()))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Validate and store the configuration
    ///
    /// On error the provider stays uninitialized.
    pub fn initialize(&self, config: ProviderConfig) -> Result<()> {
        let mut inner = self.inner.write();
        inner.transition("initialize", LifecycleState::Initialized)?;
        config.validate()?;

        info!(
            provider = %config.identifier,
            root = %config.root_node,
            servers = %config.connect_string,
            access_control = %config.access_control,
            "State provider initialized"
        );
        inner.config = Some(config);
        inner.state = LifecycleState::Initialized;
        Ok(())
    }

    /// Open the coordination session, waiting up to the connection timeout
    ///
    /// On error the provider stays initialized and `enable` may be retried.
    pub fn enable(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.transition("enable", LifecycleState::Enabled)?;
        let config = inner.config.clone().ok_or(Error::IllegalState {
            operation: "enable",
            state: inner.state,
        })?;

        let session = SessionManager::new(Arc::clone(&self.service), &config)?;
        session.start()?;
        let limit = effective_payload_limit(session.max_payload_bytes(), config.max_payload_bytes);

        info!(
            provider = %config.identifier,
            session_id = ?session.session_id(),
            max_payload_bytes = limit,
            "State provider enabled"
        );
        inner.runtime = Some(Runtime {
            paths: PathResolver::new(config.root_node.clone()),
            session,
            limits: PayloadLimits::new(limit),
        });
        inner.state = LifecycleState::Enabled;
        Ok(())
    }

    /// Stop accepting data operations; the session stays open
    pub fn disable(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.transition("disable", LifecycleState::Disabled)?;
        inner.state = LifecycleState::Disabled;
        info!(provider = %identifier(&inner), "State provider disabled");
        Ok(())
    }

    /// Close the session and release resources; terminal
    pub fn shutdown(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.transition("shutdown", LifecycleState::ShutDown)?;
        if let Some(runtime) = inner.runtime.take() {
            runtime.session.close();
        }
        inner.state = LifecycleState::ShutDown;
        info!(provider = %identifier(&inner), "State provider shut down");
        Ok(())
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> LifecycleState {
        self.inner.read().state
    }

    /// State of the coordination session; `Disconnected` when there is none
    pub fn connection_state(&self) -> ConnectionState {
        self.inner
            .read()
            .runtime
            .as_ref()
            .map(|r| r.session.state())
            .unwrap_or_default()
    }

    /// Scopes this provider serves
    pub fn supported_scopes(&self) -> &'static [Scope] {
        SUPPORTED_SCOPES
    }

    // =========================================================================
    // Data operations
    // =========================================================================

    /// Current state of a component
    ///
    /// A component with no stored state yields an empty snapshot without a
    /// version.
    pub fn get_state(&self, component_id: impl Into<ComponentId>) -> Result<StateSnapshot> {
        let component_id = component_id.into();
        let inner = self.inner.read();
        let runtime = inner.enabled("get_state")?;
        let path = runtime.paths.resolve(&component_id)?;

        let stored = runtime
            .session
            .with_session("get_state", OpKind::Idempotent, |s| {
                match s.get_data(&path) {
                    Ok(found) => Ok(Some(found)),
                    Err(CoordinationError::NoNode(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            })?;

        let Some((data, stat)) = stored else {
            debug!(component_id = %component_id, "No stored state");
            return Ok(StateSnapshot::empty(component_id));
        };
        let values = decode_state(&data).map_err(|e| {
            error!(component_id = %component_id, path = %path, error = %e, "Stored state is corrupt");
            Error::CorruptState {
                component_id: component_id.to_string(),
                detail: e.to_string(),
            }
        })?;
        let version = Version::new(stat.czxid, stat.version);
        debug!(component_id = %component_id, version = version.get(), entries = values.len(), "Read state");
        Ok(StateSnapshot::new(component_id, values, Some(version)))
    }

    /// Overwrite a component's state unconditionally
    ///
    /// Creates the node (and its parents) on first use. Returns the version
    /// now stored.
    pub fn set_state(
        &self,
        values: &HashMap<String, String>,
        component_id: impl Into<ComponentId>,
    ) -> Result<Version> {
        let component_id = component_id.into();
        let inner = self.inner.read();
        let runtime = inner.enabled("set_state")?;
        let path = runtime.paths.resolve(&component_id)?;
        let payload = encode(runtime, values, &component_id)?;
        let acl = runtime.session.acl();

        let stat = runtime
            .session
            .with_session("set_state", OpKind::Idempotent, |s| {
                match s.set_data(&path, &payload, None) {
                    Err(CoordinationError::NoNode(_)) => {}
                    other => return other,
                }
                runtime.paths.ensure_parents(s, &path, acl)?;
                match s.create(&path, &payload, acl) {
                    Err(CoordinationError::NodeExists(_)) => s.set_data(&path, &payload, None),
                    other => other,
                }
            })
            .map_err(|e| write_error(e, &component_id))?;

        let version = Version::new(stat.czxid, stat.version);
        debug!(component_id = %component_id, version = version.get(), bytes = payload.len(), "Stored state");
        Ok(version)
    }

    /// Write `new_values` only if the stored version still equals
    /// `old.version()`
    ///
    /// Returns `Ok(false)` when another writer got there first, or when the
    /// component was removed (and possibly recreated) since `old` was read;
    /// re-fetch and retry. A snapshot without a version expects no node and
    /// creates it.
    pub fn replace(
        &self,
        old: &StateSnapshot,
        new_values: &HashMap<String, String>,
        component_id: impl Into<ComponentId>,
    ) -> Result<bool> {
        let component_id = component_id.into();
        let inner = self.inner.read();
        let runtime = inner.enabled("replace")?;
        let path = runtime.paths.resolve(&component_id)?;
        let payload = encode(runtime, new_values, &component_id)?;
        let acl = runtime.session.acl();

        let outcome = match old.version() {
            Some(expected) => runtime.session.with_session("replace", OpKind::Conditional, |s| {
                // A node recreated since the snapshot restarts its data
                // version; only the generation tells the two apart
                match s.exists(&path)? {
                    Some(stat) if stat.czxid == expected.generation() => {}
                    _ => return Ok(None),
                }
                match s.set_data(&path, &payload, Some(expected.get())) {
                    Ok(stat) => Ok(Some(stat)),
                    Err(CoordinationError::BadVersion { .. }) | Err(CoordinationError::NoNode(_)) => {
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }),
            None => {
                runtime
                    .session
                    .with_session("replace", OpKind::Idempotent, |s| {
                        runtime.paths.ensure_parents(s, &path, acl)
                    })
                    .map_err(|e| write_error(e, &component_id))?;
                runtime.session.with_session("replace", OpKind::Conditional, |s| {
                    match s.create(&path, &payload, acl) {
                        Ok(stat) => Ok(Some(stat)),
                        Err(CoordinationError::NodeExists(_)) => Ok(None),
                        Err(e) => Err(e),
                    }
                })
            }
        }
        .map_err(|e| write_error(e, &component_id))?;

        match outcome {
            Some(stat) => {
                debug!(component_id = %component_id, version = stat.version, "Replaced state");
                Ok(true)
            }
            None => {
                debug!(
                    component_id = %component_id,
                    expected = ?old.version().map(Version::get),
                    "Replace lost the race"
                );
                Ok(false)
            }
        }
    }

    /// Delete a component's state; a missing node is success
    pub fn on_component_removed(&self, component_id: impl Into<ComponentId>) -> Result<()> {
        let component_id = component_id.into();
        let inner = self.inner.read();
        let runtime = inner.enabled("on_component_removed")?;
        let path = runtime.paths.resolve(&component_id)?;

        runtime
            .session
            .with_session("on_component_removed", OpKind::Idempotent, |s| {
                match s.delete(&path, None) {
                    Ok(()) | Err(CoordinationError::NoNode(_)) => Ok(()),
                    Err(e) => Err(e),
                }
            })?;
        debug!(component_id = %component_id, "Removed state");
        Ok(())
    }

    /// Store an empty map for a component; the node and its version history
    /// are kept
    pub fn clear(&self, component_id: impl Into<ComponentId>) -> Result<Version> {
        self.set_state(&HashMap::new(), component_id)
    }

    /// Components that have a state node, sorted
    pub fn stored_component_ids(&self) -> Result<Vec<ComponentId>> {
        let inner = self.inner.read();
        let runtime = inner.enabled("stored_component_ids")?;
        let root = runtime.paths.components_root();

        let children = runtime
            .session
            .with_session("stored_component_ids", OpKind::Idempotent, |s| {
                match s.get_children(root) {
                    Ok(children) => Ok(children),
                    Err(CoordinationError::NoNode(_)) => Ok(Vec::new()),
                    Err(e) => Err(e),
                }
            })?;
        let mut ids: Vec<ComponentId> = children
            .iter()
            .filter_map(|segment| runtime.paths.component_id_of(segment))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl std::fmt::Debug for VersionedStateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("VersionedStateProvider")
            .field("state", &inner.state)
            .field("root", &inner.runtime.as_ref().map(|r| r.paths.root()))
            .finish()
    }
}

fn identifier(inner: &Inner) -> &str {
    inner
        .config
        .as_ref()
        .map(|c| c.identifier.as_str())
        .unwrap_or("statekeeper")
}

fn encode(
    runtime: &Runtime,
    values: &HashMap<String, String>,
    component_id: &ComponentId,
) -> Result<Vec<u8>> {
    encode_state(values, &runtime.limits).map_err(|e: EncodeError| Error::StateTooLarge {
        component_id: component_id.to_string(),
        detail: e.to_string(),
    })
}

/// Report a backend size rejection as `StateTooLarge`, pass anything else
/// through
fn write_error(err: SessionError, component_id: &ComponentId) -> Error {
    match err {
        SessionError::Coordination(e @ CoordinationError::PayloadTooLarge { .. }) => {
            Error::StateTooLarge {
                component_id: component_id.to_string(),
                detail: e.to_string(),
            }
        }
        other => other.into(),
    }
}
