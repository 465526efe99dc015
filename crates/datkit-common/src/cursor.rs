//! Byte cursor for lenient parsing of byte slices.
//!
//! This module provides [`ByteCursor`], a cursor-like type that reads
//! primitives, vectors and colours from a byte slice. Unlike a strict
//! reader, every fixed-size read past the end of the buffer yields zero:
//! DAT files in the wild carry truncated trailing data and the decoders are
//! expected to keep going.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use glam::{Quat, Vec2, Vec3};
use zerocopy::FromBytes;

use crate::{Error, ResourceId, Result, Rgba};

/// A position-tracked, read-only view over a byte buffer.
///
/// # Example
///
/// ```
/// use datkit_common::ByteCursor;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut cursor = ByteCursor::new(&data);
///
/// assert_eq!(cursor.read_u32(), 0x04030201);
/// assert_eq!(cursor.read_u32(), 0x08070605);
/// assert!(cursor.is_empty());
///
/// // Past the end reads return zero rather than failing.
/// assert_eq!(cursor.read_u32(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a new cursor from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a new cursor starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Get the current position in the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// The whole underlying buffer.
    #[inline]
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Seek to an absolute position.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Advance the position by a number of bytes.
    #[inline]
    pub fn advance(&mut self, count: usize) {
        self.position = self.position.saturating_add(count);
    }

    /// Round the position up to the next 4-byte boundary.
    #[inline]
    pub fn align4(&mut self) {
        self.position = (self.position + 3) & !3;
    }

    /// Round the position up to the next 16-byte boundary.
    #[inline]
    pub fn align16(&mut self) {
        self.position = (self.position + 15) & !15;
    }

    /// Run `f` with the cursor at `offset`, then restore the current position.
    ///
    /// This is how the decoders follow offset fields into other parts of a
    /// section without losing their place in a table.
    pub fn peek<T>(&mut self, offset: usize, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.position;
        self.position = offset;
        let value = f(self);
        self.position = saved;
        value
    }

    /// Take `N` bytes, or zeros if fewer than `N` remain. Always advances.
    #[inline]
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        if let Some(bytes) = self.position.checked_add(N).and_then(|end| self.data.get(self.position..end)) {
            out.copy_from_slice(bytes);
        }
        self.position = self.position.saturating_add(N);
        out
    }

    /// Read bytes that must be fully present.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEof {
                needed: count,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    /// Read up to `count` bytes, clamped to what remains in the buffer.
    pub fn read_bytes_clamped(&mut self, count: usize) -> &'a [u8] {
        let start = self.position.min(self.data.len());
        let end = start.saturating_add(count).min(self.data.len());
        self.position = self.position.saturating_add(count);
        &self.data[start..end]
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    /// Read a signed byte.
    #[inline]
    pub fn read_i8(&mut self) -> i8 {
        self.read_u8() as i8
    }

    /// Read a little-endian u16.
    #[inline]
    pub fn read_u16(&mut self) -> u16 {
        LittleEndian::read_u16(&self.take::<2>())
    }

    /// Read a little-endian i16.
    #[inline]
    pub fn read_i16(&mut self) -> i16 {
        LittleEndian::read_i16(&self.take::<2>())
    }

    /// Read a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> u32 {
        LittleEndian::read_u32(&self.take::<4>())
    }

    /// Read a little-endian i32.
    #[inline]
    pub fn read_i32(&mut self) -> i32 {
        LittleEndian::read_i32(&self.take::<4>())
    }

    /// Read a big-endian u16.
    #[inline]
    pub fn read_u16_be(&mut self) -> u16 {
        BigEndian::read_u16(&self.take::<2>())
    }

    /// Read a big-endian u32.
    #[inline]
    pub fn read_u32_be(&mut self) -> u32 {
        BigEndian::read_u32(&self.take::<4>())
    }

    /// Read a little-endian f32.
    #[inline]
    pub fn read_f32(&mut self) -> f32 {
        LittleEndian::read_f32(&self.take::<4>())
    }

    /// Read an f32, mapping the all-ones bit pattern to `None`.
    pub fn read_optional_f32(&mut self) -> Option<f32> {
        let bits = self.read_u32();
        (bits != u32::MAX).then(|| f32::from_bits(bits))
    }

    /// Read a 4-byte resource id in stored byte order.
    #[inline]
    pub fn read_id(&mut self) -> ResourceId {
        ResourceId::from_bytes(self.take::<4>())
    }

    /// Read a resource id stored as a big-endian u32.
    #[inline]
    pub fn read_id_be(&mut self) -> ResourceId {
        ResourceId::from_be_u32(self.read_u32_be())
    }

    /// Read two f32 values.
    #[inline]
    pub fn read_vec2(&mut self) -> Vec2 {
        Vec2::new(self.read_f32(), self.read_f32())
    }

    /// Read three f32 values.
    #[inline]
    pub fn read_vec3(&mut self) -> Vec3 {
        Vec3::new(self.read_f32(), self.read_f32(), self.read_f32())
    }

    /// Read a quaternion stored as x, y, z, w.
    #[inline]
    pub fn read_quat(&mut self) -> Quat {
        let [x, y, z, w] = [self.read_f32(), self.read_f32(), self.read_f32(), self.read_f32()];
        Quat::from_xyzw(x, y, z, w)
    }

    /// Read a normal packed as three i16 components scaled by 32767.
    pub fn read_packed_normal(&mut self) -> Vec3 {
        let x = f32::from(self.read_i16()) / 32767.0;
        let y = f32::from(self.read_i16()) / 32767.0;
        let z = f32::from(self.read_i16()) / 32767.0;
        Vec3::new(x, y, z)
    }

    /// Read an RGBA colour packed as four bytes, dividing each channel by `scale`.
    pub fn read_rgba8(&mut self, scale: f32) -> Rgba {
        Rgba::from_bytes(self.take::<4>(), scale)
    }

    /// Read a string from a fixed-size buffer, stopping at the first null.
    ///
    /// Non-UTF-8 bytes are replaced rather than rejected.
    pub fn read_fixed_string(&mut self, buffer_size: usize) -> String {
        let bytes = self.read_bytes_clamped(buffer_size);
        let end = memchr::memchr(0, bytes).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }

    /// Read a null-terminated string, stopping at `limit` if no terminator is found.
    pub fn read_cstring(&mut self, limit: usize) -> String {
        let start = self.position.min(self.data.len());
        let end = limit.min(self.data.len()).max(start);
        let window = &self.data[start..end];
        let len = memchr::memchr(0, window).unwrap_or(window.len());
        self.position = start + len + 1;
        String::from_utf8_lossy(&window[..len]).into_owned()
    }

    /// Read a fixed-layout struct using zerocopy.
    ///
    /// A struct that does not fit in the remaining bytes reads as all zeros.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> T {
        let size = std::mem::size_of::<T>();
        let start = self.position;
        self.position = self.position.saturating_add(size);
        start
            .checked_add(size)
            .and_then(|end| self.data.get(start..end))
            .and_then(|bytes| T::read_from_bytes(bytes).ok())
            .unwrap_or_else(T::new_zeroed)
    }

    /// Read a little-endian u32 that must equal zero.
    pub fn expect_zero_u32(&mut self, field: &'static str) -> Result<()> {
        let position = self.position;
        let actual = self.read_u32();
        if actual != 0 {
            return Err(Error::ExpectedValue {
                field,
                expected: "0".to_string(),
                actual: format!("{actual:#x}"),
                position,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [
            0x01u8, 0x02, 0x03, 0x04, // u32: 0x04030201
            0xFF, 0xFF, 0xFF, 0xFF, // u32: 0xFFFFFFFF
        ];
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_u32(), 0x04030201);
        assert_eq!(cursor.read_u32(), 0xFFFFFFFF);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_big_endian_id() {
        let data = *b"TSEB";
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u32_be(), u32::from_be_bytes(*b"TSEB"));

        cursor.seek(0);
        assert_eq!(cursor.read_id_be(), ResourceId::from_bytes(*b"TSEB"));
    }

    #[test]
    fn test_out_of_bounds_reads_zero() {
        let data = [0x01, 0x02];
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_u32(), 0);
        assert_eq!(cursor.position(), 4);
        assert_eq!(cursor.read_f32(), 0.0);
        assert!(cursor.read_bytes(1).is_err());
    }

    #[test]
    fn test_peek_restores_position() {
        let data = [0x01, 0x00, 0x00, 0x00, 0x2A, 0x00, 0x00, 0x00];
        let mut cursor = ByteCursor::new(&data);
        cursor.advance(2);

        let value = cursor.peek(4, ByteCursor::read_u32);
        assert_eq!(value, 42);
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_alignment() {
        let data = [0u8; 64];
        let mut cursor = ByteCursor::new(&data);
        cursor.advance(5);
        cursor.align4();
        assert_eq!(cursor.position(), 8);
        cursor.align16();
        assert_eq!(cursor.position(), 16);
        cursor.align16();
        assert_eq!(cursor.position(), 16);
    }

    #[test]
    fn test_fixed_string_stops_at_null() {
        let mut data = [0u8; 16];
        data[..5].copy_from_slice(b"grass");
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_fixed_string(16), "grass");
        assert_eq!(cursor.position(), 16);
    }

    #[test]
    fn test_clamped_read() {
        let data = [1u8, 2, 3];
        let mut cursor = ByteCursor::new_at(&data, 1);
        assert_eq!(cursor.read_bytes_clamped(10), &[2, 3]);
    }

    #[test]
    fn test_optional_float_sentinel() {
        let mut data = Vec::new();
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(&1.5f32.to_le_bytes());
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_optional_f32(), None);
        assert_eq!(cursor.read_optional_f32(), Some(1.5));
    }

    #[test]
    fn test_expect_zero() {
        let data = [0, 0, 0, 0, 1, 0, 0, 0];
        let mut cursor = ByteCursor::new(&data);
        assert!(cursor.expect_zero_u32("padding").is_ok());
        assert!(cursor.expect_zero_u32("padding").is_err());
    }
}
