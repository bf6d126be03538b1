//! Payload encoding
//!
//! Layout (all integers big endian):
//!
//! ```text
//! u8   format version
//! u32  entry count
//! per entry, sorted by key:
//!   u16  key length    | key bytes (UTF-8)
//!   u16  value length  | value bytes (UTF-8)
//! ```

use super::error::{EncodeError, Field};
use super::{PayloadLimits, ENTRY_OVERHEAD, FORMAT_VERSION, HEADER_LEN};
use byteorder::{BigEndian, ByteOrder};
use std::collections::HashMap;

/// Size in bytes `values` would encode to
///
/// Does not check field limits.
pub fn encoded_len(values: &HashMap<String, String>) -> usize {
    HEADER_LEN
        + values
            .iter()
            .map(|(k, v)| ENTRY_OVERHEAD + k.len() + v.len())
            .sum::<usize>()
}

/// Encode a state map into a node payload
///
/// Fails without producing bytes if any key or value exceeds
/// `limits.max_field_bytes` or the whole payload exceeds
/// `limits.max_payload_bytes`. Output is deterministic: the same map always
/// encodes to the same bytes.
pub fn encode_state(
    values: &HashMap<String, String>,
    limits: &PayloadLimits,
) -> Result<Vec<u8>, EncodeError> {
    let mut entries: Vec<(&String, &String)> = values.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

    for (key, value) in &entries {
        check_field(key, key, Field::Key, limits)?;
        check_field(key, value, Field::Value, limits)?;
    }

    let size = encoded_len(values);
    if size > limits.max_payload_bytes || entries.len() > u32::MAX as usize {
        return Err(EncodeError::PayloadTooLarge {
            entries: entries.len(),
            size,
            limit: limits.max_payload_bytes,
        });
    }

    let mut buf = vec![0u8; size];
    buf[0] = FORMAT_VERSION;
    BigEndian::write_u32(&mut buf[1..HEADER_LEN], entries.len() as u32);

    let mut pos = HEADER_LEN;
    for (key, value) in entries {
        pos = put_field(&mut buf, pos, key.as_bytes());
        pos = put_field(&mut buf, pos, value.as_bytes());
    }
    debug_assert_eq!(pos, size);

    Ok(buf)
}

fn check_field(
    key: &str,
    field_value: &str,
    field: Field,
    limits: &PayloadLimits,
) -> Result<(), EncodeError> {
    let len = field_value.len();
    if len > limits.max_field_bytes {
        return Err(EncodeError::FieldTooLong {
            key: display_key(key),
            field,
            len,
            limit: limits.max_field_bytes,
        });
    }
    Ok(())
}

/// Write a length-prefixed field, returning the next write position
fn put_field(buf: &mut [u8], pos: usize, bytes: &[u8]) -> usize {
    BigEndian::write_u16(&mut buf[pos..pos + 2], bytes.len() as u16);
    let start = pos + 2;
    buf[start..start + bytes.len()].copy_from_slice(bytes);
    start + bytes.len()
}

fn display_key(key: &str) -> String {
    const MAX_DISPLAY: usize = 64;
    if key.len() <= MAX_DISPLAY {
        return key.to_string();
    }
    let mut end = MAX_DISPLAY;
    while !key.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &key[..end])
}
