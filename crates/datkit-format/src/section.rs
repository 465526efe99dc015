//! Section frame headers and the section-type table.
//!
//! A DAT blob is a flat run of frames:
//!
//! ```text
//! +0   [u8; 4]  tag (section/resource id)
//! +4   u32      packed: bits 0-6 type code, bits 7-26 size in 16-byte units
//! +8   [u8; 8]  reserved
//! +16  body, padded so the whole frame is a multiple of 16 bytes
//! ```

use datkit_common::{ByteCursor, ResourceId};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result};

/// Size of the fixed frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 16;

/// Frame alignment in bytes.
pub const FRAME_ALIGNMENT: usize = 16;

const TYPE_CODE_MASK: u32 = 0x7F;
const SIZE_SHIFT: u32 = 7;
const SIZE_MASK: u32 = 0xF_FFFF;

/// On-disk frame header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RawFrameHeader {
    /// Section tag.
    pub tag: [u8; 4],
    /// Packed type code and size.
    pub packed: u32,
    /// Reserved.
    pub reserved: [u8; 8],
}

impl RawFrameHeader {
    /// Pack a type code and a byte size into the header's packed field.
    pub const fn pack(type_code: u8, section_size: usize) -> u32 {
        let units = (section_size / FRAME_ALIGNMENT) as u32;
        (type_code as u32 & TYPE_CODE_MASK) | ((units & SIZE_MASK) << SIZE_SHIFT)
    }
}

/// One decoded container frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    start: usize,
    tag: ResourceId,
    type_code: u8,
    section_size: usize,
}

impl SectionHeader {
    /// Create a header from its parts.
    ///
    /// The size is rounded up to a multiple of 16 and never smaller than
    /// the frame header itself.
    pub fn new(start: usize, tag: ResourceId, type_code: u8, section_size: usize) -> Self {
        let aligned = section_size.div_ceil(FRAME_ALIGNMENT) * FRAME_ALIGNMENT;
        Self {
            start,
            tag,
            type_code: type_code & TYPE_CODE_MASK as u8,
            section_size: aligned.max(FRAME_HEADER_SIZE),
        }
    }

    /// Read the next frame header.
    ///
    /// Returns `None` when fewer than 16 bytes remain or when the frame is
    /// all zeros (trailing padding).
    pub fn read(cursor: &mut ByteCursor<'_>) -> Option<Self> {
        if cursor.remaining() < FRAME_HEADER_SIZE {
            return None;
        }

        let start = cursor.position();
        let raw: RawFrameHeader = cursor.read_struct();
        let tag = ResourceId::from_bytes(raw.tag);
        let packed = raw.packed;

        if tag.is_none() && packed == 0 {
            return None;
        }

        let type_code = (packed & TYPE_CODE_MASK) as u8;
        let units = ((packed >> SIZE_SHIFT) & SIZE_MASK) as usize;
        Some(Self::new(start, tag, type_code, units * FRAME_ALIGNMENT))
    }

    /// Position of the frame header.
    #[inline]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// The section tag.
    #[inline]
    pub const fn tag(&self) -> ResourceId {
        self.tag
    }

    /// The raw 7-bit type code.
    #[inline]
    pub const fn type_code(&self) -> u8 {
        self.type_code
    }

    /// The decoded section type.
    #[inline]
    pub fn section_type(&self) -> SectionType {
        SectionType::from_code(self.type_code)
    }

    /// Total frame size in bytes, including the header. Always a multiple of 16.
    #[inline]
    pub const fn section_size(&self) -> usize {
        self.section_size
    }

    /// Position of the first body byte.
    #[inline]
    pub const fn data_start(&self) -> usize {
        self.start + FRAME_HEADER_SIZE
    }

    /// Position one past the last byte of the frame.
    #[inline]
    pub const fn end(&self) -> usize {
        self.start + self.section_size
    }

    /// Body length in bytes.
    #[inline]
    pub const fn data_len(&self) -> usize {
        self.section_size - FRAME_HEADER_SIZE
    }

    /// Resolve a body-relative offset to a buffer position.
    #[inline]
    pub const fn at(&self, offset: u32) -> usize {
        self.data_start() + offset as usize
    }

    /// Resolve a table of `count` records of `stride` bytes at body offset
    /// `offset`, failing if it would run past `limit`.
    ///
    /// Returns the buffer position of the first record.
    pub(crate) fn table(
        &self,
        limit: usize,
        field: &'static str,
        offset: u32,
        count: usize,
        stride: usize,
    ) -> Result<usize> {
        let start = self.at(offset);
        let end = count
            .checked_mul(stride)
            .and_then(|len| start.checked_add(len));
        match end {
            Some(end) if end <= limit => Ok(start),
            _ => Err(Error::unexpected(
                field,
                format!("{count} x {stride} bytes at offset {offset:#x} exceeds section"),
                start,
            )),
        }
    }
}

/// What framing does with a section after its decoder runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionAction {
    /// Open a nested directory scope.
    Push,
    /// Close the innermost open scope.
    Pop,
    /// Attach the decoded resource, if any, to the current directory.
    Attach,
}

/// The closed set of section types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionType {
    End,
    Directory,
    Texture,
    Skeleton,
    SkeletonMesh,
    SkeletonAnimation,
    WeightedMesh,
    ZoneDefinition,
    ZoneMesh,
    Environment,
    Info,
    Unknown(u8),
}

impl SectionType {
    /// Map a 7-bit type code to a section type.
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::End,
            0x01 => Self::Directory,
            0x02 => Self::Texture,
            0x03 => Self::Skeleton,
            0x04 => Self::SkeletonMesh,
            0x05 => Self::SkeletonAnimation,
            0x06 => Self::WeightedMesh,
            0x07 => Self::ZoneDefinition,
            0x08 => Self::ZoneMesh,
            0x09 => Self::Environment,
            0x0A => Self::Info,
            other => Self::Unknown(other),
        }
    }

    /// The type code this section type is stored as.
    pub const fn code(&self) -> u8 {
        match self {
            Self::End => 0x00,
            Self::Directory => 0x01,
            Self::Texture => 0x02,
            Self::Skeleton => 0x03,
            Self::SkeletonMesh => 0x04,
            Self::SkeletonAnimation => 0x05,
            Self::WeightedMesh => 0x06,
            Self::ZoneDefinition => 0x07,
            Self::ZoneMesh => 0x08,
            Self::Environment => 0x09,
            Self::Info => 0x0A,
            Self::Unknown(code) => *code,
        }
    }

    /// What framing does with this section.
    pub const fn action(&self) -> SectionAction {
        match self {
            Self::Directory => SectionAction::Push,
            Self::End => SectionAction::Pop,
            _ => SectionAction::Attach,
        }
    }

    /// Whether the section body is obfuscated on disk.
    pub const fn is_obfuscated(&self) -> bool {
        matches!(self, Self::ZoneDefinition | Self::ZoneMesh)
    }

    /// Get the name of this section type.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::End => "End",
            Self::Directory => "Directory",
            Self::Texture => "Texture",
            Self::Skeleton => "Skeleton",
            Self::SkeletonMesh => "SkeletonMesh",
            Self::SkeletonAnimation => "SkeletonAnimation",
            Self::WeightedMesh => "WeightedMesh",
            Self::ZoneDefinition => "ZoneDefinition",
            Self::ZoneMesh => "ZoneMesh",
            Self::Environment => "Environment",
            Self::Info => "Info",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl std::fmt::Display for SectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown({code:#04x})"),
            other => write!(f, "{}", other.name()),
        }
    }
}
