//! Three-channel 8-bit color.

/// An RGB color with 8 bits per channel.
///
/// There is no alpha channel: the destination framebuffer is opaque, and the
/// only transparency the renderer knows is the per-pixel skip flag carried by
/// 4-byte RLE images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    /// Red intensity.
    pub r: u8,
    /// Green intensity.
    pub g: u8,
    /// Blue intensity.
    pub b: u8,
}

impl Color {
    /// Pure black.
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// Pure white.
    pub const WHITE: Self = Self::new(0xff, 0xff, 0xff);

    /// Creates a color from its three channel intensities.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Creates a color from a packed `0x00RRGGBB` value.
    pub const fn from_rgb32(value: u32) -> Self {
        Self {
            r: (value >> 16) as u8,
            g: (value >> 8) as u8,
            b: value as u8,
        }
    }

    /// Packs the color into `0x00RRGGBB`.
    pub const fn to_rgb32(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | (self.b as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb32_packing_places_red_highest() {
        let color = Color::from_rgb32(0x00EC_ECE1);
        assert_eq!(color, Color::new(0xec, 0xec, 0xe1));
        assert_eq!(color.to_rgb32(), 0x00EC_ECE1);
    }

    #[test]
    fn rgb32_ignores_top_byte() {
        assert_eq!(Color::from_rgb32(0xFF12_3456), Color::new(0x12, 0x34, 0x56));
    }
}
