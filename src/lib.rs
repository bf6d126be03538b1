//! # statekeeper
//!
//! Component-scoped, cluster-consistent state storage on top of a
//! ZooKeeper-style coordination service.
//!
//! Each component of a dataflow engine keeps a small string map (a file
//! offset, a last-polled timestamp) that must survive restarts and stay
//! consistent when several engine instances share the component. The
//! coordination service provides durability and ordering; this crate adds:
//!
//! - a versioned compare-and-swap contract ([`VersionedStateProvider::replace`])
//! - a compact payload encoding with size discipline matching the service's
//!   node limits
//! - one managed session per provider that survives disconnects and expiry
//!
//! ## Quick Start
//!
//! ```
//! use statekeeper::prelude::*;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let provider = VersionedStateProvider::new(Arc::new(InMemoryEnsemble::new()));
//! provider.initialize(ProviderConfig::builder("localhost:2181").build())?;
//! provider.enable()?;
//!
//! let offsets = HashMap::from([("offset".to_string(), "1024".to_string())]);
//! let version = provider.set_state(&offsets, "list-files-1")?;
//! assert_eq!(provider.get_state("list-files-1")?.version(), Some(version));
//!
//! provider.disable()?;
//! provider.shutdown()?;
//! # Ok::<(), statekeeper::Error>(())
//! ```
//!
//! Against a real ensemble, hand the provider a [`ZooKeeperService`]:
//!
//! ```no_run
//! use statekeeper::prelude::*;
//!
//! let provider = VersionedStateProvider::zookeeper();
//! provider.initialize(
//!     ProviderConfig::builder("zk1:2181,zk2:2181,zk3:2181")
//!         .root_node("/app/team1/testing")
//!         .build(),
//! )?;
//! provider.enable()?;
//! # Ok::<(), statekeeper::Error>(())
//! ```
//!
//! ## Layers
//!
//! - [`statekeeper_core`]: ids, versions, snapshots, configuration
//! - [`statekeeper_wire`]: the node payload codec
//! - [`statekeeper_coordination`]: the coordination service seam, the
//!   ZooKeeper client and an in-memory ensemble
//! - [`statekeeper_session`]: session ownership, reconnect, retry rules

#![warn(missing_docs)]

mod error;
mod lifecycle;
mod path;
mod provider;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use lifecycle::LifecycleState;
pub use path::{escape_segment, unescape_segment, PathResolver};
pub use provider::VersionedStateProvider;
pub use statekeeper_coordination::ZooKeeperService;
pub use statekeeper_session::ConnectionState;
