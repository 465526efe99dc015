//! Texture sections (type 0x02).
//!
//! ```text
//! +0   u8       kind (1 = 2D, 2 = 2D with alpha, 6 = cube face)
//! +1   u8       bit depth
//! +2   u16      width
//! +4   u16      height
//! +6   u16      flags (bit 0: compression tag present)
//! +8   [u8; 4]  compression tag ("DXT1" or "DXT3")
//! +12  u32      pixel data offset
//! +16  [u8; 32] name
//! ```

use datkit_common::{ByteCursor, ResourceId};

use crate::options::ParseOptions;
use crate::resource::Resource;
use crate::section::SectionHeader;
use crate::{Error, Result};

const FLAG_COMPRESSED: u16 = 0x0001;

/// Block compression applied to the pixel payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Dxt1,
    Dxt3,
}

impl Compression {
    fn from_tag(tag: ResourceId) -> Option<Self> {
        match tag.as_bytes() {
            b"DXT1" => Some(Self::Dxt1),
            b"DXT3" => Some(Self::Dxt3),
            _ => None,
        }
    }

    /// Bytes per 4x4 block, or `None` for uncompressed data.
    pub const fn block_size(&self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::Dxt1 => Some(8),
            Self::Dxt3 => Some(16),
        }
    }

    /// Payload size in bytes for a `width` x `height` image.
    pub fn payload_size(&self, width: u16, height: u16, bit_depth: u8) -> usize {
        let (w, h) = (usize::from(width), usize::from(height));
        match self.block_size() {
            Some(block) => w.div_ceil(4) * h.div_ceil(4) * block,
            None => w * h * usize::from(bit_depth) / 8,
        }
    }
}

/// What a texture is used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    Texture2D,
    Alpha2D,
    CubeFace,
}

impl TextureKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Texture2D),
            2 => Some(Self::Alpha2D),
            6 => Some(Self::CubeFace),
            _ => None,
        }
    }
}

/// A decoded bitmap.
#[derive(Debug, Clone)]
pub struct TextureResource {
    pub id: ResourceId,
    pub name: String,
    pub kind: TextureKind,
    pub width: u16,
    pub height: u16,
    pub bit_depth: u8,
    pub compression: Compression,
    /// Raw pixel bytes, possibly shorter than the declared size if the
    /// section was truncated.
    pub data: Vec<u8>,
}

impl TextureResource {
    /// Size the payload should have according to the header fields.
    pub fn expected_size(&self) -> usize {
        self.compression
            .payload_size(self.width, self.height, self.bit_depth)
    }

    /// Whether the full payload is present.
    pub fn is_complete(&self) -> bool {
        self.data.len() == self.expected_size()
    }
}

/// Decode a texture section. Unsupported kinds yield no resource.
pub(crate) fn decode(
    cursor: &mut ByteCursor<'_>,
    header: &SectionHeader,
    _options: &ParseOptions,
) -> Result<Option<Resource>> {
    let kind_byte = cursor.read_u8();
    let Some(kind) = TextureKind::from_u8(kind_byte) else {
        tracing::debug!(tag = %header.tag(), kind = kind_byte, "unsupported texture kind, skipped");
        return Ok(None);
    };

    let bit_depth = cursor.read_u8();
    let width = cursor.read_u16();
    let height = cursor.read_u16();
    let flags = cursor.read_u16();
    let tag = cursor.read_id();

    let compression = if flags & FLAG_COMPRESSED != 0 {
        Compression::from_tag(tag).ok_or(Error::UnknownCompression(tag))?
    } else {
        Compression::None
    };

    let pixel_offset = cursor.read_u32();
    let name = cursor.read_fixed_string(32);

    let size = compression.payload_size(width, height, bit_depth);
    let start = header.at(pixel_offset);
    let available = cursor.len().saturating_sub(start);
    if size > available {
        tracing::warn!(
            texture = %name,
            declared = size,
            available,
            "texture payload runs past the section, clamped"
        );
    }

    cursor.seek(start);
    let data = cursor.read_bytes_clamped(size).to_vec();

    Ok(Some(Resource::Texture(TextureResource {
        id: header.tag(),
        name,
        kind,
        width,
        height,
        bit_depth,
        compression,
        data,
    })))
}
