//! Destructive byte transforms used to undo section obfuscation.
//!
//! Zone sections are stored with their body XOR-masked, bit-rotated and
//! byte-shuffled. The key schedule lives outside this crate; it drives a
//! [`ByteScrambler`] over the mutable section body before any decoder runs.

use crate::{Error, Result};

/// A position-tracked cursor that rewrites bytes in place.
///
/// Every transform applies to the byte at the current position and then
/// advances by one.
#[derive(Debug)]
pub struct ByteScrambler<'a> {
    data: &'a mut [u8],
    position: usize,
}

impl<'a> ByteScrambler<'a> {
    /// Create a scrambler over a mutable byte slice.
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Get the current position.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Get the length of the underlying slice.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the position has reached the end.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Seek to an absolute position.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// XOR the current byte with `mask`.
    pub fn xor_byte(&mut self, mask: u8) {
        if let Some(b) = self.data.get_mut(self.position) {
            *b ^= mask;
        }
        self.position += 1;
    }

    /// Rotate the bits of the current byte right by `amount`.
    pub fn rotate_right(&mut self, amount: u32) {
        if let Some(b) = self.data.get_mut(self.position) {
            *b = b.rotate_right(amount);
        }
        self.position += 1;
    }

    /// Rotate the bits of the current byte left by `amount`.
    pub fn rotate_left(&mut self, amount: u32) {
        if let Some(b) = self.data.get_mut(self.position) {
            *b = b.rotate_left(amount);
        }
        self.position += 1;
    }

    /// Swap the current byte with the byte `delta` positions away.
    pub fn swap_with_offset(&mut self, delta: isize) -> Result<()> {
        let other = self
            .position
            .checked_add_signed(delta)
            .filter(|&o| o < self.data.len() && self.position < self.data.len())
            .ok_or(Error::OffsetOutOfRange {
                offset: self.position as i64 + delta as i64,
                len: self.data.len(),
            })?;
        self.data.swap(self.position, other);
        self.position += 1;
        Ok(())
    }
}
