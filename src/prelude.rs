//! Convenient imports for statekeeper.
//!
//! ```
//! use statekeeper::prelude::*;
//! use std::sync::Arc;
//!
//! let provider = VersionedStateProvider::new(Arc::new(InMemoryEnsemble::new()));
//! assert_eq!(provider.lifecycle(), LifecycleState::Uninitialized);
//! ```

// Main entry point
pub use crate::provider::VersionedStateProvider;

// Error handling
pub use crate::error::{Error, Result};

// Lifecycle and connection
pub use crate::lifecycle::LifecycleState;
pub use statekeeper_session::ConnectionState;

// Core types
pub use statekeeper_core::{
    AccessControl, ComponentId, Credentials, ProviderConfig, RetryPolicy, Scope, StateSnapshot,
    TlsContext, Version,
};

// Backends
pub use statekeeper_coordination::{CoordinationService, InMemoryEnsemble, ZooKeeperService};
