//! Session management for statekeeper
//!
//! A provider holds exactly one logical session with the coordination
//! service. [`SessionManager`] opens it (with bounded, jittered backoff),
//! tracks its [`ConnectionState`] from the service's event stream, replaces
//! it after expiry, and runs node operations under the retry rules described
//! in [`manager`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod backoff;
pub mod error;
pub mod manager;
pub mod state;

pub use error::{SessionError, SessionResult};
pub use manager::{OpKind, SessionManager};
pub use state::ConnectionState;
