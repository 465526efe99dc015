//! DDS export for textures decoded from DAT containers.
//!
//! Texture sections carry a bare pixel payload. This crate wraps it in a
//! DDS header so ordinary image tools can open it.
//!
//! # Example
//!
//! ```no_run
//! use datkit_dds::to_dds_bytes;
//! use datkit_format::{ParseOptions, ResourceGraph, TextureResource};
//!
//! let data = std::fs::read("textures.dat")?;
//! let graph = ResourceGraph::load(&data, &ParseOptions::new("textures.dat"))?;
//! if let Some(root) = graph.root() {
//!     for texture in graph.collect::<TextureResource>(root) {
//!         std::fs::write(format!("{}.dds", texture.id), to_dds_bytes(texture)?)?;
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod header;
mod writer;

pub use error::{Error, Result};
pub use header::{DdsHeader, DdsPixelFormat, FourCC};
pub use writer::{to_dds_bytes, write_dds};

/// DDS file magic bytes ("DDS ").
pub const DDS_MAGIC: &[u8; 4] = b"DDS ";
