//! Colour type shared by the environment, mesh and zone decoders.

use glam::Vec4;

/// An RGBA colour with floating point channels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Create a new colour.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Decode packed bytes in R, G, B, A order, dividing each by `scale`.
    ///
    /// Most colours use a scale of 255. Zone vertex colours are overbright
    /// and use 128, so a stored 0xFF decodes to roughly 2.0.
    pub fn from_bytes(bytes: [u8; 4], scale: f32) -> Self {
        Self {
            r: f32::from(bytes[0]) / scale,
            g: f32::from(bytes[1]) / scale,
            b: f32::from(bytes[2]) / scale,
            a: f32::from(bytes[3]) / scale,
        }
    }

    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.r, self.g, self.b, self.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes() {
        let c = Rgba::from_bytes([255, 0, 51, 255], 255.0);
        assert_eq!(c, Rgba::new(1.0, 0.0, 0.2, 1.0));

        let overbright = Rgba::from_bytes([255, 128, 0, 128], 128.0);
        assert!(overbright.r > 1.9);
        assert_eq!(overbright.g, 1.0);
    }
}
