//! Parse configuration and the deobfuscation seam.

use std::fmt;
use std::sync::Arc;

use datkit_common::ByteScrambler;

use crate::section::SectionHeader;
use crate::Result;

/// Removes the on-disk obfuscation from a section body.
///
/// Zone definition and zone mesh bodies are stored scrambled. Deriving the
/// key for a section is the caller's business; the container parser hands
/// every affected body to this trait exactly once, before any decoder reads
/// it, and otherwise treats bytes as plaintext.
pub trait Deobfuscate: Send + Sync {
    /// Rewrite `body` (the bytes from `header.data_start()` to `header.end()`) in place.
    fn deobfuscate(&self, header: &SectionHeader, body: &mut ByteScrambler<'_>) -> Result<()>;

    /// Whether this implementation never changes any bytes.
    ///
    /// Lets the parser skip copying the input buffer.
    fn is_identity(&self) -> bool {
        false
    }
}

/// Treats every section as already plaintext.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plaintext;

impl Deobfuscate for Plaintext {
    fn deobfuscate(&self, _header: &SectionHeader, _body: &mut ByteScrambler<'_>) -> Result<()> {
        Ok(())
    }

    fn is_identity(&self) -> bool {
        true
    }
}

/// Applies a caller-supplied key: each byte is rotated right by `rotation`
/// bits and then XORed with the key byte at the same body position
/// (cycling), after which adjacent byte pairs are swapped when
/// `swap_pairs` is set.
#[derive(Debug, Clone)]
pub struct KeyedScramble {
    key: Vec<u8>,
    rotation: u32,
    swap_pairs: bool,
}

impl KeyedScramble {
    /// Create a scramble key. An empty key disables the XOR pass.
    pub fn new(key: Vec<u8>, rotation: u32, swap_pairs: bool) -> Self {
        Self {
            key,
            rotation: rotation % 8,
            swap_pairs,
        }
    }
}

impl Deobfuscate for KeyedScramble {
    fn deobfuscate(&self, _header: &SectionHeader, body: &mut ByteScrambler<'_>) -> Result<()> {
        let len = body.len();

        if self.rotation != 0 {
            body.seek(0);
            while !body.is_empty() {
                body.rotate_right(self.rotation);
            }
        }

        if !self.key.is_empty() {
            body.seek(0);
            for i in 0..len {
                body.xor_byte(self.key[i % self.key.len()]);
            }
        }

        if self.swap_pairs {
            let mut pos = 0;
            while pos + 1 < len {
                body.seek(pos);
                body.swap_with_offset(1)?;
                pos += 2;
            }
        }

        Ok(())
    }
}

/// Options controlling a single [`load`](crate::ResourceGraph::load) call.
#[derive(Clone)]
pub struct ParseOptions {
    /// Human-readable name of the blob, used in error messages.
    pub resource_name: String,
    /// Decode zone vertex colours with the overbright scale.
    pub zone_color_scale: bool,
    /// Collaborator that removes zone-section obfuscation.
    pub deobfuscator: Arc<dyn Deobfuscate>,
}

impl ParseOptions {
    /// Options for a named blob with plaintext sections.
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            zone_color_scale: false,
            deobfuscator: Arc::new(Plaintext),
        }
    }

    /// Enable or disable the zone colour scale.
    pub fn with_zone_color_scale(mut self, enabled: bool) -> Self {
        self.zone_color_scale = enabled;
        self
    }

    /// Use a different deobfuscation collaborator.
    pub fn with_deobfuscator(mut self, deobfuscator: Arc<dyn Deobfuscate>) -> Self {
        self.deobfuscator = deobfuscator;
        self
    }

    /// Divisor applied to packed vertex colours in zone meshes.
    pub(crate) fn zone_color_divisor(&self) -> f32 {
        if self.zone_color_scale {
            128.0
        } else {
            255.0
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::new("<memory>")
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("resource_name", &self.resource_name)
            .field("zone_color_scale", &self.zone_color_scale)
            .field("identity_deobfuscator", &self.deobfuscator.is_identity())
            .finish()
    }
}
