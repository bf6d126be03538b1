//! Coordination service seam for statekeeper
//!
//! This crate defines what the state provider needs from a ZooKeeper-style
//! coordination service, and nothing more:
//!
//! - `traits`: [`CoordinationService`] opens sessions, [`CoordinationSession`]
//!   exposes create / read / conditional write / delete / list on nodes
//! - `node`: node metadata ([`Stat`]) and access control ([`NodeAcl`])
//! - `error`: [`CoordinationError`], split into connectivity and logical failures
//! - `zk`: [`ZooKeeperService`], sessions against a real ZooKeeper ensemble
//! - `memory`: [`InMemoryEnsemble`], a shared in-process service with fault
//!   injection, used as the test double

#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod node;
pub mod traits;
pub mod zk;

pub use error::{CoordResult, CoordinationError};
pub use memory::{InMemoryEnsemble, MemorySession};
pub use node::{child_path, parent_path, NodeAcl, Stat};
pub use traits::{
    ConnectRequest, CoordinationService, CoordinationSession, SessionEvent, SessionWatcher,
};
pub use zk::{ZooKeeperService, ZooKeeperSession};
