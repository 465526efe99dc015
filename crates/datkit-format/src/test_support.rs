//! Byte-buffer builders for unit tests.

#![allow(dead_code)]

use datkit_common::ResourceId;

use crate::section::{RawFrameHeader, SectionHeader, FRAME_ALIGNMENT, FRAME_HEADER_SIZE};

/// Little-endian byte buffer assembled field by field.
#[derive(Debug, Default, Clone)]
pub(crate) struct ByteBuilder {
    data: Vec<u8>,
}

impl ByteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.data.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.data.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.data.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.data.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32_be(&mut self, v: u32) -> &mut Self {
        self.data.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.data.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn vec3(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.f32(x).f32(y).f32(z)
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.data.extend_from_slice(v);
        self
    }

    pub fn tag(&mut self, tag: &str) -> &mut Self {
        self.bytes(ResourceId::from_tag(tag).as_bytes())
    }

    /// A string in a null-padded fixed-size field.
    pub fn name(&mut self, s: &str, size: usize) -> &mut Self {
        let mut field = vec![0u8; size];
        let n = s.len().min(size);
        field[..n].copy_from_slice(&s.as_bytes()[..n]);
        self.bytes(&field)
    }

    pub fn zeros(&mut self, n: usize) -> &mut Self {
        self.data.resize(self.data.len() + n, 0);
        self
    }

    /// Zero-fill up to an absolute length.
    pub fn pad_to(&mut self, len: usize) -> &mut Self {
        if self.data.len() < len {
            self.data.resize(len, 0);
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// One frame: header plus body, zero-padded to 16 bytes.
pub(crate) fn frame(tag: &str, type_code: u8, body: &[u8]) -> Vec<u8> {
    let size = (FRAME_HEADER_SIZE + body.len()).div_ceil(FRAME_ALIGNMENT) * FRAME_ALIGNMENT;
    let mut b = ByteBuilder::new();
    b.tag(tag)
        .u32(RawFrameHeader::pack(type_code, size))
        .zeros(8)
        .bytes(body)
        .pad_to(size);
    b.build()
}

/// A header describing `frame(tag, type_code, body)` placed at offset 0.
pub(crate) fn header_for(tag: &str, type_code: u8, body: &[u8]) -> SectionHeader {
    SectionHeader::new(
        0,
        ResourceId::from_tag(tag),
        type_code,
        FRAME_HEADER_SIZE + body.len(),
    )
}

/// Concatenate frames into a blob.
pub(crate) fn blob(frames: &[Vec<u8>]) -> Vec<u8> {
    frames.concat()
}
