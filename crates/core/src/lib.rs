//! Core types for statekeeper
//!
//! This crate defines the types shared by every layer:
//! - [`ComponentId`], [`Version`], [`StateSnapshot`]: the data model
//! - [`ProviderConfig`] and its parts: validated configuration
//! - [`parse_duration`]: time period parsing for config values
//! - [`limits`]: size ceilings and defaults

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod duration;
pub mod error;
pub mod limits;
pub mod types;

pub use config::{
    effective_payload_limit, validate_node_path, AccessControl, ConnectString, Credentials,
    ProviderConfig, ProviderConfigBuilder, RetryPolicy, ServerAddress, TlsContext,
};
pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
pub use types::{ComponentId, Scope, StateSnapshot, Version};
