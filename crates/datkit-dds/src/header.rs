//! DDS header structures.

use datkit_format::Compression;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result, DDS_MAGIC};

const DDSD_CAPS: u32 = 0x1;
const DDSD_HEIGHT: u32 = 0x2;
const DDSD_WIDTH: u32 = 0x4;
const DDSD_PITCH: u32 = 0x8;
const DDSD_PIXELFORMAT: u32 = 0x1000;
const DDSD_LINEARSIZE: u32 = 0x8_0000;

const DDPF_ALPHAPIXELS: u32 = 0x1;
const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;

const DDSCAPS_TEXTURE: u32 = 0x1000;

/// DDS file header, following the magic.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DdsHeader {
    /// Header size (always 124).
    pub size: u32,
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    /// Row pitch for uncompressed data, top-level size for compressed data.
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mipmap_count: u32,
    pub reserved1: [u32; 11],
    pub pixel_format: DdsPixelFormat,
    pub caps: u32,
    pub caps2: u32,
    pub caps3: u32,
    pub caps4: u32,
    pub reserved2: u32,
}

impl DdsHeader {
    /// Expected header size.
    pub const SIZE: u32 = 124;

    /// Header for a single-level surface of the given layout.
    pub fn new(width: u32, height: u32, compression: Compression, bit_depth: u8) -> Result<Self> {
        let (pixel_format, pitch_flag, pitch) = match compression {
            Compression::Dxt1 | Compression::Dxt3 => {
                let four_cc = if compression == Compression::Dxt1 {
                    FourCC::DXT1
                } else {
                    FourCC::DXT3
                };
                let block = compression.block_size().unwrap_or(16);
                let linear = (width as usize).div_ceil(4) * (height as usize).div_ceil(4) * block;
                (DdsPixelFormat::compressed(four_cc), DDSD_LINEARSIZE, linear as u32)
            }
            Compression::None => {
                let format = DdsPixelFormat::uncompressed(bit_depth).ok_or_else(|| {
                    Error::InvalidHeader(format!("no pixel format for {bit_depth}-bit data"))
                })?;
                let pitch = (width * u32::from(bit_depth)).div_ceil(8);
                (format, DDSD_PITCH, pitch)
            }
        };

        Ok(Self {
            size: Self::SIZE,
            flags: DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT | pitch_flag,
            height,
            width,
            pitch_or_linear_size: pitch,
            depth: 0,
            mipmap_count: 1,
            reserved1: [0; 11],
            pixel_format,
            caps: DDSCAPS_TEXTURE,
            caps2: 0,
            caps3: 0,
            caps4: 0,
            reserved2: 0,
        })
    }

    /// Parse the magic and header at the start of a DDS file.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let magic: [u8; 4] = data
            .get(..4)
            .and_then(|m| m.try_into().ok())
            .ok_or_else(|| Error::InvalidHeader("file too small".into()))?;
        if &magic != DDS_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let (header, _) = Self::read_from_prefix(&data[4..])
            .map_err(|_| Error::InvalidHeader("truncated header".into()))?;
        let size = header.size;
        if size != Self::SIZE {
            return Err(Error::InvalidHeader(format!("header size {size}")));
        }
        Ok(header)
    }

    /// The block compression this header describes, if any.
    pub fn compression(&self) -> Option<Compression> {
        let format = self.pixel_format;
        if format.flags & DDPF_FOURCC == 0 {
            return Some(Compression::None);
        }
        match format.four_cc {
            FourCC::DXT1 => Some(Compression::Dxt1),
            FourCC::DXT3 => Some(Compression::Dxt3),
            _ => None,
        }
    }
}

/// DDS pixel format.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DdsPixelFormat {
    /// Structure size (always 32).
    pub size: u32,
    pub flags: u32,
    pub four_cc: FourCC,
    pub rgb_bit_count: u32,
    pub r_bit_mask: u32,
    pub g_bit_mask: u32,
    pub b_bit_mask: u32,
    pub a_bit_mask: u32,
}

impl DdsPixelFormat {
    pub const SIZE: u32 = 32;

    fn compressed(four_cc: FourCC) -> Self {
        Self {
            size: Self::SIZE,
            flags: DDPF_FOURCC,
            four_cc,
            rgb_bit_count: 0,
            r_bit_mask: 0,
            g_bit_mask: 0,
            b_bit_mask: 0,
            a_bit_mask: 0,
        }
    }

    /// Byte-ordered R, G, B(, A) layouts for 24 and 32-bit data.
    fn uncompressed(bit_depth: u8) -> Option<Self> {
        let (flags, a_bit_mask) = match bit_depth {
            32 => (DDPF_RGB | DDPF_ALPHAPIXELS, 0xFF00_0000),
            24 => (DDPF_RGB, 0),
            _ => return None,
        };
        Some(Self {
            size: Self::SIZE,
            flags,
            four_cc: FourCC([0; 4]),
            rgb_bit_count: u32::from(bit_depth),
            r_bit_mask: 0x0000_00FF,
            g_bit_mask: 0x0000_FF00,
            b_bit_mask: 0x00FF_0000,
            a_bit_mask,
        })
    }
}

/// Four-character code for compression type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const DXT1: Self = Self(*b"DXT1");
    pub const DXT3: Self = Self(*b"DXT3");
}
