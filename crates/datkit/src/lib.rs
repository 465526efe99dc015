//! Datkit - DAT asset container toolkit.
//!
//! This crate provides a unified interface to the datkit crates.
//!
//! # Crates
//!
//! - [`datkit_common`] - Byte cursor, resource ids, colours, scrambling
//! - [`datkit_format`] - Container framing, resource graph, section decoders, zone collision
//! - [`datkit_dds`] - DDS export of decoded textures
//!
//! # Example
//!
//! ```no_run
//! use datkit::prelude::*;
//!
//! let data = std::fs::read("world.dat")?;
//! let graph = ResourceGraph::load(&data, &ParseOptions::new("world.dat"))?;
//!
//! if let Some(root) = graph.root() {
//!     for skeleton in graph.collect::<SkeletonResource>(root) {
//!         println!("{}: {} joints", skeleton.id, skeleton.joints.len());
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use datkit_common as common;
pub use datkit_dds as dds;
pub use datkit_format as format;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use datkit_common::{ByteCursor, ResourceId, Rgba};
    pub use datkit_dds::{to_dds_bytes, write_dds};
    pub use datkit_format::zone::{Ray, RayHit, ZoneCollider};
    pub use datkit_format::{
        Child, Compression, DirId, Directory, EnvironmentResource, InfoResource, KeyedScramble,
        ParseOptions, Plaintext, Resource, ResourceGraph, ResourceKind, SkeletonAnimationResource,
        SkeletonMeshResource, SkeletonResource, TextureResource, TypedResource,
        WeightedMeshResource, ZoneMeshResource, ZoneResource,
    };
}

pub use datkit_format::ResourceGraph;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
