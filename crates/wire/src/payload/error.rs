//! Payload codec errors

use thiserror::Error;

/// Which half of an entry a size violation refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The entry's key
    Key,
    /// The entry's value
    Value,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Key => f.write_str("key"),
            Field::Value => f.write_str("value"),
        }
    }
}

/// Encode error types
///
/// Both variants mean the state map cannot be stored as a single node; no
/// bytes are produced and nothing is written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A key or value does not fit its 16-bit length prefix
    #[error("{field} of entry '{key}' is {len} bytes, the maximum is {limit}")]
    FieldTooLong {
        /// Key of the offending entry, truncated for display
        key: String,
        /// Whether the key or the value is too long
        field: Field,
        /// Encoded length in bytes
        len: usize,
        /// Largest accepted length
        limit: usize,
    },

    /// The whole payload exceeds the node ceiling
    #[error("{entries} entries serialize to {size} bytes, the maximum node payload is {limit} bytes")]
    PayloadTooLarge {
        /// Number of entries in the map
        entries: usize,
        /// Encoded payload size
        size: usize,
        /// Node payload ceiling
        limit: usize,
    },
}

/// Decode error types
///
/// Any of these means a stored payload is not a well-formed encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Format version byte is not one this codec writes
    #[error("unsupported payload format version {0}")]
    UnsupportedFormat(u8),

    /// Payload ended before an announced field
    #[error("payload truncated at byte {offset}: needed {needed} more bytes")]
    Truncated {
        /// Offset where reading stopped
        offset: usize,
        /// Bytes that were still required
        needed: usize,
    },

    /// Bytes remain after the announced entries
    #[error("{0} trailing bytes after the last entry")]
    TrailingBytes(usize),

    /// A key or value is not valid UTF-8
    #[error("entry {index} has a {field} that is not valid UTF-8")]
    InvalidUtf8 {
        /// Zero-based entry index
        index: usize,
        /// Which half of the entry
        field: Field,
    },

    /// The same key appears twice
    #[error("duplicate key '{0}'")]
    DuplicateKey(String),

    /// Entry count cannot fit in the remaining bytes
    #[error("entry count {count} exceeds what {remaining} bytes can hold")]
    ImpossibleCount {
        /// Announced entry count
        count: u32,
        /// Bytes left after the header
        remaining: usize,
    },
}
