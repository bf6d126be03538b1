//! Payload decoding
//!
//! Exact inverse of [`encode_state`](super::encode_state). Every structural
//! problem is reported; nothing is skipped or repaired.

use super::error::{DecodeError, Field};
use super::{ENTRY_OVERHEAD, FORMAT_VERSION, HEADER_LEN};
use byteorder::{BigEndian, ByteOrder};
use std::collections::HashMap;

/// Decode a node payload into a state map
///
/// An empty payload decodes to an empty map: intermediate nodes and nodes
/// created out-of-band carry no data.
pub fn decode_state(bytes: &[u8]) -> Result<HashMap<String, String>, DecodeError> {
    if bytes.is_empty() {
        return Ok(HashMap::new());
    }

    let mut reader = Reader::new(bytes);
    let version = reader.take(1)?[0];
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedFormat(version));
    }

    let count = BigEndian::read_u32(reader.take(HEADER_LEN - 1)?);
    let remaining = reader.remaining();
    if (count as usize).saturating_mul(ENTRY_OVERHEAD) > remaining {
        return Err(DecodeError::ImpossibleCount { count, remaining });
    }

    let mut values = HashMap::with_capacity(count as usize);
    for index in 0..count as usize {
        let key = reader.string(index, Field::Key)?;
        let value = reader.string(index, Field::Value)?;
        if values.contains_key(&key) {
            return Err(DecodeError::DuplicateKey(key));
        }
        values.insert(key, value);
    }

    match reader.remaining() {
        0 => Ok(values),
        n => Err(DecodeError::TrailingBytes(n)),
    }
}

/// Bounds-checked cursor over a payload
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn string(&mut self, index: usize, field: Field) -> Result<String, DecodeError> {
        let len = BigEndian::read_u16(self.take(2)?) as usize;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { index, field })
    }
}
