//! Wire encoding for statekeeper
//!
//! This crate implements the node payload format for component state maps:
//!
//! - Deterministic, length-prefixed UTF-8 encoding (entries sorted by key)
//! - Per-field ceiling from the 16-bit length prefix
//! - Per-payload ceiling matching the coordination backend's node limit
//! - Strict decoding that rejects any malformed payload
//!
//! ## Examples
//!
//! ```
//! use statekeeper_wire::{decode_state, encode_state, PayloadLimits};
//! use std::collections::HashMap;
//!
//! let mut values = HashMap::new();
//! values.insert("offset".to_string(), "1024".to_string());
//!
//! let bytes = encode_state(&values, &PayloadLimits::default()).unwrap();
//! assert_eq!(decode_state(&bytes).unwrap(), values);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod payload;

// Re-export main types
pub use payload::{
    decode_state, encode_state, encoded_len, DecodeError, EncodeError, Field, PayloadLimits,
    FORMAT_VERSION,
};
