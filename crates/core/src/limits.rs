//! Limits and defaults
//!
//! The payload ceiling belongs to the coordination backend; the value here is
//! only the default used when a backend does not report its own.

use std::time::Duration;

/// Largest key or value the codec accepts, bounded by its 16-bit length prefix
pub const MAX_FIELD_BYTES: usize = u16::MAX as usize;

/// Default ceiling for a single node payload (1 MiB)
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Default session timeout
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time `enable` waits for the first session
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default root node
pub const DEFAULT_ROOT_NODE: &str = "/statekeeper";

/// Child of the root node under which component nodes live
pub const COMPONENTS_NODE: &str = "components";

/// Port assumed when a connect string entry has none
pub const DEFAULT_PORT: u16 = 2181;

/// Top-level node reserved by the coordination service
pub const RESERVED_ROOT: &str = "/zookeeper";
