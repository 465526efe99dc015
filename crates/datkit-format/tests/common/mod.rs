//! Blob assembly helpers shared by the integration tests.

#![allow(dead_code)]

use datkit_format::section::{RawFrameHeader, FRAME_ALIGNMENT, FRAME_HEADER_SIZE};

pub const END: u8 = 0x00;
pub const DIRECTORY: u8 = 0x01;
pub const TEXTURE: u8 = 0x02;
pub const SKELETON: u8 = 0x03;
pub const ZONE: u8 = 0x07;
pub const INFO: u8 = 0x0A;

#[derive(Default)]
pub struct Body(Vec<u8>);

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.0.push(v);
        self
    }

    pub fn u16(mut self, v: u16) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(mut self, v: f32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32s(mut self, values: &[f32]) -> Self {
        for v in values {
            self.0.extend_from_slice(&v.to_le_bytes());
        }
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        let mut bytes = [b' '; 4];
        for (slot, b) in bytes.iter_mut().zip(tag.bytes()) {
            *slot = b;
        }
        self.0.extend_from_slice(&bytes);
        self
    }

    pub fn name(mut self, s: &str, size: usize) -> Self {
        let mut field = vec![0u8; size];
        field[..s.len()].copy_from_slice(s.as_bytes());
        self.0.extend_from_slice(&field);
        self
    }

    pub fn zeros(mut self, n: usize) -> Self {
        self.0.resize(self.0.len() + n, 0);
        self
    }

    pub fn bytes(mut self, v: &[u8]) -> Self {
        self.0.extend_from_slice(v);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn build(self) -> Vec<u8> {
        self.0
    }
}

/// Builds a blob frame by frame.
#[derive(Default)]
pub struct Blob(Vec<u8>);

impl Blob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(mut self, tag: &str, type_code: u8, body: &[u8]) -> Self {
        let size = (FRAME_HEADER_SIZE + body.len()).div_ceil(FRAME_ALIGNMENT) * FRAME_ALIGNMENT;
        let start = self.0.len();
        let header = Body::new()
            .tag(tag)
            .u32(RawFrameHeader::pack(type_code, size))
            .zeros(8)
            .build();
        self.0.extend_from_slice(&header);
        self.0.extend_from_slice(body);
        self.0.resize(start + size, 0);
        self
    }

    pub fn dir(self, tag: &str, name: &str) -> Self {
        let mut body = name.as_bytes().to_vec();
        body.push(0);
        self.frame(tag, DIRECTORY, &body)
    }

    pub fn end(self) -> Self {
        self.frame("END", END, &[])
    }

    pub fn build(self) -> Vec<u8> {
        self.0
    }
}

/// A 4x4 uncompressed 32-bit texture.
pub fn texture(name: &str, fill: u8) -> Vec<u8> {
    Body::new()
        .u8(1)
        .u8(32)
        .u16(4)
        .u16(4)
        .u16(0)
        .zeros(4)
        .u32(48)
        .name(name, 32)
        .bytes(&[fill; 64])
        .build()
}

/// A skeleton whose joints are `(parent, translation)` with identity
/// rotations, plus named references at `(joint, offset)`.
pub fn skeleton(joints: &[(u8, [f32; 3])], references: &[(&str, u16, [f32; 3])]) -> Vec<u8> {
    let joint_offset = 20u32;
    let ref_offset = joint_offset + 32 * joints.len() as u32;

    let mut b = Body::new()
        .u32(joints.len() as u32)
        .u32(joint_offset)
        .u32(references.len() as u32)
        .u32(ref_offset)
        .u32(0);
    for (parent, t) in joints {
        b = b.f32s(&[0.0, 0.0, 0.0, 1.0]).f32s(t).u8(*parent).zeros(3);
    }
    for (id, joint, offset) in references {
        b = b.tag(id).u16(*joint).u16(0).f32s(offset);
    }
    b.build()
}
