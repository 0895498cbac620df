//! Pixel format resolution and color packing.
//!
//! Display hardware reports a depth and, for each color channel, a bit offset
//! and length inside the pixel word. [`PixelFormat::resolve`] classifies that
//! description once into one of the named [`RgbMode`]s or [`RgbMode::Generic`],
//! and precomputes the packing used by every later [`PixelFormat::pack`].
//!
//! Depths below 16 bits cannot be drawn. For those, [`negotiate`] walks a
//! priority-ordered list of [`FormatCandidate`]s and stops at the first one
//! the device accepts.

use core::fmt;

use crate::color::Color;

// ---------------------------------------------------------------------------
// Channel layout
// ---------------------------------------------------------------------------

/// Position of one color channel inside a pixel word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Channel {
    /// Bit position of the channel's least significant bit.
    pub offset: u32,
    /// Number of bits in the channel.
    pub length: u32,
}

impl Channel {
    /// Creates a channel descriptor.
    pub const fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    /// Scales an 8-bit intensity to this channel and shifts it into place.
    ///
    /// Truncates low bits when the channel is narrower than 8 bits. Bits that
    /// would land above bit 31 are lost.
    #[inline]
    pub const fn pack(self, intensity: u8) -> u32 {
        let value = intensity as u32;
        let scaled = match self.length {
            0 => return 0,
            len @ 1..=8 => value >> (8 - len),
            len => match value.checked_shl(len - 8) {
                Some(widened) => widened,
                None => return 0,
            },
        };
        match scaled.checked_shl(self.offset) {
            Some(placed) => placed,
            None => 0,
        }
    }

    /// Extracts this channel from a pixel word and widens it back to 8 bits.
    ///
    /// Narrow channels replicate their high bits into the vacated low bits, so
    /// a full-scale channel value reads back as `0xff`.
    pub const fn unpack(self, raw: u32) -> u8 {
        if self.length == 0 || self.offset >= 32 {
            return 0;
        }
        let mask = if self.length >= 32 {
            u32::MAX
        } else {
            (1u32 << self.length) - 1
        };
        let value = (raw >> self.offset) & mask;
        if self.length >= 8 {
            return (value >> (self.length - 8)) as u8;
        }

        let mut out = value << (8 - self.length);
        let mut filled = self.length;
        while filled < 8 {
            out |= out >> filled;
            filled *= 2;
        }
        out as u8
    }
}

/// Offsets and lengths of the red, green and blue channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelLayout {
    /// Red channel.
    pub red: Channel,
    /// Green channel.
    pub green: Channel,
    /// Blue channel.
    pub blue: Channel,
}

impl ChannelLayout {
    /// 5:6:5 with red in the high bits.
    pub const RGB565: Self = Self::new(Channel::new(11, 5), Channel::new(5, 6), Channel::new(0, 5));
    /// 5:6:5 with blue in the high bits.
    pub const BGR565: Self = Self::new(Channel::new(0, 5), Channel::new(5, 6), Channel::new(11, 5));
    /// 8:8:8 with red at bit 16.
    pub const RGB888: Self = Self::new(Channel::new(16, 8), Channel::new(8, 8), Channel::new(0, 8));
    /// 8:8:8 with blue at bit 16.
    pub const BGR888: Self = Self::new(Channel::new(0, 8), Channel::new(8, 8), Channel::new(16, 8));

    /// Creates a layout from its three channels.
    pub const fn new(red: Channel, green: Channel, blue: Channel) -> Self {
        Self { red, green, blue }
    }

    /// Packs a color into a pixel word using this layout.
    #[inline]
    pub const fn pack(&self, color: Color) -> u32 {
        self.red.pack(color.r) | self.green.pack(color.g) | self.blue.pack(color.b)
    }

    /// Reads a color back out of a pixel word.
    pub const fn unpack(&self, raw: u32) -> Color {
        Color::new(
            self.red.unpack(raw),
            self.green.unpack(raw),
            self.blue.unpack(raw),
        )
    }
}

// ---------------------------------------------------------------------------
// Named modes
// ---------------------------------------------------------------------------

/// Classification of a hardware channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RgbMode {
    /// Red at bits 11..16, green 5..11, blue 0..5.
    Rgb565,
    /// Blue at bits 11..16, green 5..11, red 0..5.
    Bgr565,
    /// Red at bits 16..24, green 8..16, blue 0..8.
    Rgb888,
    /// Blue at bits 16..24, green 8..16, red 0..8.
    Bgr888,
    /// Anything else; packed from the reported offsets and lengths.
    Generic,
}

impl RgbMode {
    /// Classifies a layout by exact match against the four named modes.
    pub fn classify(layout: &ChannelLayout) -> Self {
        match *layout {
            ChannelLayout::RGB565 => Self::Rgb565,
            ChannelLayout::BGR565 => Self::Bgr565,
            ChannelLayout::RGB888 => Self::Rgb888,
            ChannelLayout::BGR888 => Self::Bgr888,
            _ => Self::Generic,
        }
    }

    /// Whether red sits in the high bits; `None` for [`RgbMode::Generic`].
    const fn red_high(self) -> Option<bool> {
        match self {
            Self::Rgb565 | Self::Rgb888 => Some(true),
            Self::Bgr565 | Self::Bgr888 => Some(false),
            Self::Generic => None,
        }
    }
}

impl fmt::Display for RgbMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rgb565 => "RGB565",
            Self::Bgr565 => "BGR565",
            Self::Rgb888 => "RGB888",
            Self::Bgr888 => "BGR888",
            Self::Generic => "generic",
        })
    }
}

// ---------------------------------------------------------------------------
// Resolved format
// ---------------------------------------------------------------------------

/// A pixel value ready to be stored at a framebuffer offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packed {
    /// One native-endian 16-bit store.
    U16(u16),
    /// Three byte stores, already in memory order.
    U24([u8; 3]),
    /// One native-endian 32-bit store.
    U32(u32),
    /// The depth/mode combination cannot be drawn; the pixel is dropped.
    Unsupported,
}

/// A depth plus channel layout, classified once at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    bits_per_pixel: u32,
    layout: ChannelLayout,
    mode: RgbMode,
    /// Effective layout used by [`pack`](Self::pack); `None` when unsupported.
    packing: Option<ChannelLayout>,
}

impl PixelFormat {
    /// Classifies the reported depth and layout.
    ///
    /// Named modes pack with their fixed formula at the reported depth: 5:6:5
    /// at 16 bpp and 8:8:8 at 24 and 32 bpp, whichever named mode was matched.
    /// [`RgbMode::Generic`] packs from the reported offsets at 16 and 32 bpp and
    /// is unsupported at any other depth.
    pub fn resolve(bits_per_pixel: u32, layout: ChannelLayout) -> Self {
        let mode = RgbMode::classify(&layout);
        let packing = match (mode.red_high(), bits_per_pixel) {
            (Some(true), 16) => Some(ChannelLayout::RGB565),
            (Some(false), 16) => Some(ChannelLayout::BGR565),
            (Some(true), 24 | 32) => Some(ChannelLayout::RGB888),
            (Some(false), 24 | 32) => Some(ChannelLayout::BGR888),
            (None, 16 | 32) => Some(layout),
            _ => None,
        };
        Self {
            bits_per_pixel,
            layout,
            mode,
            packing,
        }
    }

    /// Bits per pixel as reported by the device.
    pub const fn bits_per_pixel(&self) -> u32 {
        self.bits_per_pixel
    }

    /// Bytes per pixel (`bits_per_pixel / 8`).
    pub const fn bytes_per_pixel(&self) -> u32 {
        self.bits_per_pixel >> 3
    }

    /// Channel layout as reported by the device.
    pub const fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// The classified mode.
    pub const fn mode(&self) -> RgbMode {
        self.mode
    }

    /// Returns `true` if [`pack`](Self::pack) can produce pixels at all.
    pub const fn is_drawable(&self) -> bool {
        self.packing.is_some()
    }

    /// Packs a color for storage. Never allocates.
    #[inline]
    pub fn pack(&self, color: Color) -> Packed {
        let Some(packing) = self.packing else {
            return Packed::Unsupported;
        };
        let value = packing.pack(color);
        match self.bits_per_pixel {
            16 => Packed::U16(value as u16),
            24 => Packed::U24(word_to_bytes24(value)),
            32 => Packed::U32(value),
            _ => Packed::Unsupported,
        }
    }

    /// Decodes a stored pixel word (as assembled by [`bytes24_to_word`] for
    /// 24 bpp) back into a color.
    pub fn unpack(&self, raw: u32) -> Option<Color> {
        self.packing.map(|packing| packing.unpack(raw))
    }
}

/// Splits a 24-bit pixel word into bytes in framebuffer memory order.
///
/// Little-endian hosts store the low channel byte first; big-endian hosts
/// store it last.
#[inline]
pub const fn word_to_bytes24(value: u32) -> [u8; 3] {
    let [b0, b1, b2, _] = value.to_le_bytes();
    if cfg!(target_endian = "big") {
        [b2, b1, b0]
    } else {
        [b0, b1, b2]
    }
}

/// Inverse of [`word_to_bytes24`].
pub const fn bytes24_to_word(bytes: [u8; 3]) -> u32 {
    let [b0, b1, b2] = if cfg!(target_endian = "big") {
        [bytes[2], bytes[1], bytes[0]]
    } else {
        bytes
    };
    u32::from_le_bytes([b0, b1, b2, 0])
}

// ---------------------------------------------------------------------------
// Depth negotiation
// ---------------------------------------------------------------------------

/// Shallowest depth the packer can draw into.
pub const MIN_DRAWABLE_BPP: u32 = 16;

/// A pixel format to request from a device whose reported depth is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCandidate {
    /// Human-readable name for diagnostics.
    pub name: &'static str,
    /// Requested depth.
    pub bits_per_pixel: u32,
    /// Requested channel layout (no transparency channel).
    pub layout: ChannelLayout,
}

/// Fallback formats, most preferred first.
///
/// 32 bpp 8:8:8 needs no conversion while drawing; 16 bpp 5:6:5 is the
/// smallest format most drivers will accept.
pub const FALLBACK_CANDIDATES: [FormatCandidate; 2] = [
    FormatCandidate {
        name: "32 bpp 8,8,8",
        bits_per_pixel: 32,
        layout: ChannelLayout::BGR888,
    },
    FormatCandidate {
        name: "16 bpp 5,6,5",
        bits_per_pixel: 16,
        layout: ChannelLayout::RGB565,
    },
];

/// Returns `true` if a device reporting `bits_per_pixel` must switch format
/// before it can be drawn into.
pub const fn needs_negotiation(bits_per_pixel: u32) -> bool {
    bits_per_pixel < MIN_DRAWABLE_BPP
}

/// Errors from pixel format negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// The device rejected every candidate format.
    NoUsableDepth,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUsableDepth => f.write_str("device rejected every fallback pixel format"),
        }
    }
}

impl core::error::Error for FormatError {}

/// Tries each candidate in order until `apply` accepts one.
///
/// `apply` asks the device to switch to the candidate and returns whether it
/// succeeded. Candidates after the first accepted one are not tried.
///
/// # Errors
///
/// Returns [`FormatError::NoUsableDepth`] if every candidate is rejected.
pub fn negotiate<'c, F>(
    candidates: &'c [FormatCandidate],
    mut apply: F,
) -> Result<&'c FormatCandidate, FormatError>
where
    F: FnMut(&FormatCandidate) -> bool,
{
    candidates
        .iter()
        .find(|candidate| apply(candidate))
        .ok_or(FormatError::NoUsableDepth)
}
