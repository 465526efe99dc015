//! Writing decoded textures as DDS files.

use std::io::Write;

use datkit_format::TextureResource;
use zerocopy::IntoBytes;

use crate::header::DdsHeader;
use crate::{Error, Result, DDS_MAGIC};

/// Encode `texture` as a complete single-level DDS file.
///
/// DXT1, DXT3 and uncompressed 24/32-bit textures are supported. A texture
/// whose payload was clamped during decoding is rejected.
pub fn write_dds<W: Write>(mut out: W, texture: &TextureResource) -> Result<()> {
    let expected = texture.expected_size();
    if texture.data.len() < expected {
        return Err(Error::Incomplete {
            name: texture.name.clone(),
            expected,
            actual: texture.data.len(),
        });
    }

    let header = DdsHeader::new(
        u32::from(texture.width),
        u32::from(texture.height),
        texture.compression,
        texture.bit_depth,
    )
    .map_err(|e| Error::Unsupported {
        name: texture.name.clone(),
        reason: e.to_string(),
    })?;

    out.write_all(DDS_MAGIC)?;
    out.write_all(header.as_bytes())?;
    out.write_all(&texture.data[..expected])?;
    Ok(())
}

/// Encode `texture` into a new buffer.
pub fn to_dds_bytes(texture: &TextureResource) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4 + DdsHeader::SIZE as usize + texture.data.len());
    write_dds(&mut out, texture)?;
    Ok(out)
}
