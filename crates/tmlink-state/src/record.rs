//! Item framing inside a binary state record.
//!
//! ```text
//! [u16 name_len][name][u16 data_len][data] ...
//! ```
//!
//! Lengths are little-endian.

use bytes::{BufMut, BytesMut};

use crate::error::{Result, StateError};

/// One `(name, value)` item borrowed from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item<'a> {
    /// Raw item name.
    pub name: &'a [u8],
    /// Value bytes, exactly as long as the declared length.
    pub data: &'a [u8],
}

impl Item<'_> {
    /// The name as (lossy) UTF-8, for logs.
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(self.name).into_owned()
    }
}

/// Split up to `max_items` items from the front of `record`.
///
/// Returns the items and the number of bytes they span. Fails without
/// partial output if any length prefix or value runs past the end.
pub fn split_items(record: &[u8], max_items: usize) -> Result<(Vec<Item<'_>>, usize)> {
    let mut items = Vec::new();
    let mut offset = 0;
    while offset < record.len() && items.len() < max_items {
        let name = read_prefixed(record, &mut offset)?;
        let data = read_prefixed(record, &mut offset)?;
        items.push(Item { name, data });
    }
    Ok((items, offset))
}

fn read_prefixed<'a>(record: &'a [u8], offset: &mut usize) -> Result<&'a [u8]> {
    let start = *offset;
    let truncated = |needed| StateError::Truncated {
        offset: start,
        needed,
        available: record.len().saturating_sub(start),
    };

    let prefix = record.get(start..start + 2).ok_or_else(|| truncated(2))?;
    let len = usize::from(u16::from_le_bytes([prefix[0], prefix[1]]));
    let value = record
        .get(start + 2..start + 2 + len)
        .ok_or_else(|| truncated(2 + len))?;
    *offset = start + 2 + len;
    Ok(value)
}

/// Build a record from `(name, value)` pairs.
///
/// Names and values longer than `u16::MAX` bytes are truncated.
pub fn encode_record<N, D>(items: &[(N, D)]) -> Vec<u8>
where
    N: AsRef<[u8]>,
    D: AsRef<[u8]>,
{
    let mut buf = BytesMut::new();
    for (name, data) in items {
        put_prefixed(&mut buf, name.as_ref());
        put_prefixed(&mut buf, data.as_ref());
    }
    buf.to_vec()
}

fn put_prefixed(buf: &mut BytesMut, bytes: &[u8]) {
    let len = bytes.len().min(usize::from(u16::MAX));
    // len is clamped to u16::MAX above.
    buf.put_u16_le(len as u16);
    buf.put_slice(&bytes[..len]);
}
