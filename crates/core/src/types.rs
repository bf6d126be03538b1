//! Core types for component-scoped state
//!
//! This module defines the fundamental types used throughout the system:
//! - [`ComponentId`]: Stable identifier of the component owning a state map
//! - [`Version`]: Version stamp assigned by the coordination service
//! - [`StateSnapshot`]: A component's state map at a given version
//! - [`Scope`]: Where a provider keeps its state

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of the component that owns a state map
///
/// The engine's component framework supplies the same identifier across
/// restarts so that state is recoverable. The identifier is opaque; the path
/// resolver escapes whatever characters it contains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(String);

impl ComponentId {
    /// Create a component identifier
    ///
    /// # Examples
    ///
    /// ```
    /// use statekeeper_core::ComponentId;
    ///
    /// let id = ComponentId::new("list-files-1");
    /// assert_eq!(id.as_str(), "list-files-1");
    /// ```
    pub fn new(id: impl Into<String>) -> Self {
        ComponentId(id.into())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the identifier is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(s: &str) -> Self {
        ComponentId::new(s)
    }
}

impl From<String> for ComponentId {
    fn from(s: String) -> Self {
        ComponentId(s)
    }
}

impl From<&ComponentId> for ComponentId {
    fn from(id: &ComponentId) -> Self {
        id.clone()
    }
}

/// Version stamp of a state node
///
/// Pairs the node's generation (the transaction that created it) with its
/// data version (1 on creation, +1 per write). A node that is removed and
/// recreated starts a new, higher generation, so a stamp taken before the
/// removal never matches the recreated node even when the data versions
/// coincide. Stamps of a single component are strictly increasing;
/// comparing stamps of different components carries no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    generation: u64,
    revision: u64,
}

impl Version {
    /// Data version assigned when a node is created
    pub const INITIAL_REVISION: u64 = 1;

    /// Stamp for data version `revision` of the node created in `generation`
    pub const fn new(generation: u64, revision: u64) -> Self {
        Version {
            generation,
            revision,
        }
    }

    /// Data version within the generation
    pub const fn get(self) -> u64 {
        self.revision
    }

    /// Transaction that created the node
    pub const fn generation(self) -> u64 {
        self.generation
    }

    /// The stamp following this one within the same generation
    pub const fn next(self) -> Self {
        Version {
            generation: self.generation,
            revision: self.revision + 1,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.revision)
    }
}

/// A component's state map together with the version it was read at
///
/// A snapshot of a component that was never written (or was removed) has an
/// empty map and no version. Pass a previously fetched snapshot to
/// `replace` to make a write conditional on nothing having changed since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    component_id: ComponentId,
    values: HashMap<String, String>,
    version: Option<Version>,
}

impl StateSnapshot {
    /// Create a snapshot
    pub fn new(
        component_id: impl Into<ComponentId>,
        values: HashMap<String, String>,
        version: Option<Version>,
    ) -> Self {
        Self {
            component_id: component_id.into(),
            values,
            version,
        }
    }

    /// Snapshot of a component with no stored state
    pub fn empty(component_id: impl Into<ComponentId>) -> Self {
        Self::new(component_id, HashMap::new(), None)
    }

    /// Component this snapshot belongs to
    pub fn component_id(&self) -> &ComponentId {
        &self.component_id
    }

    /// Stored key/value pairs
    pub fn values(&self) -> &HashMap<String, String> {
        &self.values
    }

    /// Look up a single value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Version the snapshot was read at, `None` if nothing is stored
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    /// Check if the snapshot holds no entries
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume the snapshot, returning its map
    pub fn into_values(self) -> HashMap<String, String> {
        self.values
    }
}

/// Where a provider keeps state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Visible only to the local engine instance
    Local,
    /// Shared by every engine instance in the cluster
    Cluster,
}
