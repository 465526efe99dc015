//! Common utilities for datkit.
//!
//! This crate provides foundational types used across all datkit crates:
//!
//! - [`ByteCursor`] - Lenient, position-tracked reading from byte slices
//! - [`ByteScrambler`] - Destructive in-place byte transforms for obfuscated sections
//! - [`ResourceId`] - The 4-character section/resource identifier
//! - [`Rgba`] - Floating point colour decoded from packed bytes

mod color;
mod cursor;
mod error;
mod id;
mod scramble;

pub use color::Rgba;
pub use cursor::ByteCursor;
pub use error::{Error, Result};
pub use id::ResourceId;
pub use scramble::ByteScrambler;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Re-export glam, whose vector types appear throughout the public API.
pub use glam;
