//! Node payload codec for component state
//!
//! A state map is stored as a single node payload. Keys and values are
//! length-prefixed UTF-8 with a 16-bit prefix, so each is capped at
//! [`MAX_FIELD_BYTES`]; the whole payload is capped at the backend's node
//! ceiling. Encoding checks both before producing any bytes.
//!
//! ## Invariant
//!
//! For every map within the limits, `decode_state(&encode_state(m)?)? == m`.

pub mod decode;
pub mod encode;
pub mod error;

pub use decode::decode_state;
pub use encode::{encode_state, encoded_len};
pub use error::{DecodeError, EncodeError, Field};

use statekeeper_core::limits::{DEFAULT_MAX_PAYLOAD_BYTES, MAX_FIELD_BYTES};

/// Current payload format version
pub const FORMAT_VERSION: u8 = 1;

/// Format version byte plus entry count
pub(crate) const HEADER_LEN: usize = 1 + 4;

/// Two 16-bit length prefixes per entry
pub(crate) const ENTRY_OVERHEAD: usize = 2 + 2;

/// Size ceilings enforced by [`encode_state`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLimits {
    /// Largest key or value in bytes
    pub max_field_bytes: usize,
    /// Largest encoded payload in bytes
    pub max_payload_bytes: usize,
}

impl PayloadLimits {
    /// Limits for a backend with the given node ceiling
    ///
    /// The field limit is always the length prefix's maximum.
    pub fn new(max_payload_bytes: usize) -> Self {
        Self {
            max_field_bytes: MAX_FIELD_BYTES,
            max_payload_bytes,
        }
    }
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_BYTES)
    }
}
