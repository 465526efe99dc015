//! DAT asset container decoder.
//!
//! A DAT blob is a flat run of 16-byte aligned frames. Directory frames open
//! nested scopes, end frames close them, and every other frame is decoded
//! into a typed resource filed under the innermost open directory.
//!
//! # Format
//!
//! ```text
//! +0   [u8; 4]  tag
//! +4   u32      bits 0-6 type code, bits 7-26 size in 16-byte units
//! +8   [u8; 8]  reserved
//! +16  body
//! ```
//!
//! Zone definition and zone mesh bodies are stored obfuscated; a
//! [`Deobfuscate`] implementation supplied through [`ParseOptions`] removes
//! that before decoding.
//!
//! # Example
//!
//! ```no_run
//! use datkit_format::{ParseOptions, ResourceGraph, ZoneResource};
//!
//! let data = std::fs::read("zone.dat")?;
//! let graph = ResourceGraph::load(&data, &ParseOptions::new("zone.dat"))?;
//!
//! let root = graph.root().expect("empty blob");
//! for zone in graph.collect::<ZoneResource>(root) {
//!     if let Some(y) = zone.ground_height(120.0, -40.0) {
//!         println!("ground at {y}");
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod animation;
pub mod bounds;
mod container;
pub mod environment;
mod error;
mod graph;
pub mod info;
mod options;
mod resource;
pub mod section;
pub mod skeleton;
pub mod skeleton_mesh;
pub mod texture;
mod texture_link;
pub mod weighted_mesh;
pub mod zone;

#[cfg(test)]
mod test_support;

pub use animation::SkeletonAnimationResource;
pub use bounds::BoundingBox;
pub use environment::EnvironmentResource;
pub use error::{Error, Result};
pub use graph::{texture_key, Child, DirId, Directory, ResourceGraph};
pub use info::InfoResource;
pub use options::{Deobfuscate, KeyedScramble, ParseOptions, Plaintext};
pub use resource::{DirectoryHeader, Resource, ResourceKind, TypedResource};
pub use section::{SectionHeader, SectionType};
pub use skeleton::SkeletonResource;
pub use skeleton_mesh::SkeletonMeshResource;
pub use texture::{Compression, TextureResource};
pub use texture_link::TextureLink;
pub use weighted_mesh::WeightedMeshResource;
pub use zone::{ZoneMeshResource, ZoneResource};

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;

pub(crate) type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;
