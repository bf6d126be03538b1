//! Provider Integration Tests
//!
//! End-to-end tests of `VersionedStateProvider` against the in-memory
//! ensemble, plus the ZooKeeper backend.
//!
//! ## Modules
//!
//! - `basic_ops`: get, set, remove, clear, enumeration
//! - `cas_ops`: conditional replace and version semantics
//! - `size_limits`: field and payload ceilings
//! - `lifecycle`: state machine and illegal transitions
//! - `sessions`: outage, expiry and reconnect
//! - `cluster`: several providers sharing one ensemble
//! - `acl`: creator-only nodes
//! - `concurrency`: contention on one component
//! - `config_loading`: properties and TOML files
//! - `zookeeper`: the ZooKeeper backend (server tests are `#[ignore]`d)

#[path = "../common/mod.rs"]
mod common;

mod acl;
mod basic_ops;
mod cas_ops;
mod cluster;
mod config_loading;
mod lifecycle;
mod zookeeper;
