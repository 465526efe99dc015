//! The 4-character resource identifier.
//!
//! Every section in a DAT container is tagged with four ASCII bytes. The same
//! tag doubles as the id a decoded resource is filed under inside its
//! directory, and zone data refers to meshes, effects and lights by it.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// A 4-byte section/resource identifier.
///
/// Equality is byte-exact. The all-zero value is reserved for "absent".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct ResourceId([u8; 4]);

impl ResourceId {
    /// The reserved "absent" id (all zeros).
    pub const NONE: Self = Self([0; 4]);

    /// Create an id from raw bytes.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Create an id from a u32 whose big-endian bytes spell the tag.
    #[inline]
    pub const fn from_be_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    /// Create an id from a string, padding with spaces and truncating to 4 bytes.
    pub fn from_tag(tag: &str) -> Self {
        let mut bytes = [b' '; 4];
        for (slot, b) in bytes.iter_mut().zip(tag.bytes()) {
            *slot = b;
        }
        Self(bytes)
    }

    /// Get the raw bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Check whether this is the reserved absent id.
    #[inline]
    pub fn is_none(&self) -> bool {
        self.0 == [0; 4]
    }

    /// `None` for the reserved absent id, otherwise `Some(self)`.
    #[inline]
    pub fn non_zero(self) -> Option<Self> {
        (!self.is_none()).then_some(self)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId(\"{self}\")")
    }
}

impl From<[u8; 4]> for ResourceId {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}
