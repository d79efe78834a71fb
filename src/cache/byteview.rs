//! Immutable value bytes

use bytes::Bytes;
use std::fmt;

/// Immutable snapshot of a cached value
///
/// Clones share the same buffer; nothing can write through a `ByteView`, and
/// `to_vec` hands out an owned copy.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    bytes: Bytes,
}

impl ByteView {
    /// Snapshot of `data`, copied out of the caller's buffer
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            bytes: Bytes::copy_from_slice(data),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Owned copy of the data
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle for response bodies
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(v: Vec<u8>) -> Self {
        Self { bytes: Bytes::from(v) }
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self::copy_from_slice(s.as_bytes())
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ByteView").field(&self.bytes).finish()
    }
}
