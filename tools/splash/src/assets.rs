//! Built-in font, progress bar frame and the theme logo.
//!
//! The font and frame are generated at start-up: the font from the `font8x8`
//! tables, the frame from the theme colors and size. The logo is a raw RGBA
//! file named by the theme, compressed once when it is loaded.

use anyhow::{Context, Result, bail};
use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use splash_fb::rle::{BytesPerPixel, EncodeError, RleImage, encode};
use splash_fb::{FontBuilder, OwnedFont};

use crate::config::{LogoConfig, Theme};
use crate::scene::BAR_BORDER;

// ---------------------------------------------------------------------------
// Font
// ---------------------------------------------------------------------------

/// Each source pixel becomes a `SCALE x SCALE` block.
const SCALE: u32 = 2;

/// Height of the built-in font in pixels.
pub const FONT_HEIGHT: u32 = 8 * SCALE;

/// Advance of blank glyphs such as space.
const BLANK_WIDTH: u32 = 4 * SCALE;

/// Space after each inked glyph.
const GLYPH_GAP: u32 = SCALE;

const INDEX_BITS: u32 = 7;

/// Builds the default proportional font from the ASCII and Latin-1 tables.
pub fn default_font() -> OwnedFont {
    let mut builder = FontBuilder::new("font8x8", FONT_HEIGHT, INDEX_BITS);
    for ch in (' '..='~').chain('\u{a0}'..='\u{ff}') {
        if let Some(bitmap) = BASIC_FONTS.get(ch).or_else(|| LATIN_FONTS.get(ch)) {
            let (width, rows) = scale_glyph(&bitmap);
            builder.glyph(ch, width, &rows);
        }
    }
    builder.build()
}

/// Scales an 8x8 bitmap (least significant bit leftmost) and trims its empty
/// columns. Returns the advance width and the packed rows.
fn scale_glyph(bitmap: &[u8; 8]) -> (u32, Vec<u32>) {
    let inked = bitmap.iter().fold(0u8, |acc, &row| acc | row);
    if inked == 0 {
        return (BLANK_WIDTH, vec![0; FONT_HEIGHT as usize]);
    }
    let left = inked.trailing_zeros();
    let right = 7 - inked.leading_zeros();

    let mut rows = Vec::with_capacity(FONT_HEIGHT as usize);
    for &row in bitmap {
        let mut bits = 0u32;
        for col in (left..=right).filter(|&col| row & (1 << col) != 0) {
            let x = (col - left) * SCALE;
            for dx in 0..SCALE {
                bits |= 0x8000_0000 >> (x + dx);
            }
        }
        rows.extend(std::iter::repeat_n(bits, SCALE as usize));
    }
    ((right - left + 1) * SCALE + GLYPH_GAP, rows)
}

// ---------------------------------------------------------------------------
// Progress bar frame
// ---------------------------------------------------------------------------

/// Width of the outer ring of the frame.
const FRAME_RING: u32 = BAR_BORDER / 2;

/// Radius of the rounded frame corners.
const CORNER_RADIUS: u32 = 4;

/// A run-length encoded 4-byte-per-pixel image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    width: u32,
    height: u32,
    rowstride: u32,
    data: Vec<u8>,
}

impl EncodedImage {
    /// Compresses tightly packed RGBA pixels; alpha 0 is transparent.
    ///
    /// Images that do not compress below their raw size get transparent
    /// padding columns, which widen the decoder's byte budget without
    /// changing what is drawn.
    pub fn from_rgba(width: u32, height: u32, pixels: &[u8]) -> Result<Self, EncodeError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(EncodeError::PixelCount {
                expected,
                actual: pixels.len(),
            });
        }

        let mut padding = 0;
        loop {
            let padded = pad_rows(width, padding, pixels);
            match encode(width + padding, height, BytesPerPixel::Rgba, &padded) {
                Ok(data) => {
                    return Ok(Self {
                        width,
                        height,
                        rowstride: (width + padding) * 4,
                        data,
                    });
                }
                Err(EncodeError::Incompressible { .. }) if padding < width => {
                    padding = (padding * 2).max(1);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The encoded image.
    pub fn image(&self) -> RleImage<'_> {
        RleImage::new(
            self.width,
            self.height,
            self.rowstride,
            BytesPerPixel::Rgba,
            &self.data,
        )
    }
}

/// Appends `padding` transparent pixels to every row and clears the color of
/// transparent pixels so they join the padding runs.
fn pad_rows(width: u32, padding: u32, pixels: &[u8]) -> Vec<u8> {
    let row_len = (width as usize * 4).max(1);
    let rows = pixels.len() / row_len;
    let mut out = Vec::with_capacity(pixels.len() + rows * padding as usize * 4);
    for row in pixels.chunks_exact(row_len) {
        for pixel in row.chunks_exact(4) {
            if pixel[3] == 0 {
                out.extend_from_slice(&[0; 4]);
            } else {
                out.extend_from_slice(pixel);
            }
        }
        out.resize(out.len() + padding as usize * 4, 0);
    }
    out
}

/// Draws the frame: a ring in the bar color, the bar background inside, and
/// transparent rounded corners.
pub fn bar_frame(theme: &Theme) -> Result<EncodedImage, EncodeError> {
    let (width, height) = (theme.bar_width, theme.bar_height);
    let ring = theme.bar;
    let fill = theme.bar_background;

    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let on_ring = x < FRAME_RING
                || y < FRAME_RING
                || x >= width - FRAME_RING
                || y >= height - FRAME_RING;
            let rgba = if outside_corner(x, y, width, height) {
                [0; 4]
            } else if on_ring {
                [ring.r, ring.g, ring.b, 0xff]
            } else {
                [fill.r, fill.g, fill.b, 0xff]
            };
            pixels.extend_from_slice(&rgba);
        }
    }

    EncodedImage::from_rgba(width, height, &pixels)
}

// ---------------------------------------------------------------------------
// Logo
// ---------------------------------------------------------------------------

/// Reads and compresses the logo named by `config`.
///
/// The file holds `width * height` pixels of red, green, blue and alpha
/// bytes, row by row, with no header.
pub fn load_logo(config: &LogoConfig) -> Result<EncodedImage> {
    let pixels = std::fs::read(&config.path)
        .with_context(|| format!("Failed to read logo {}", config.path.display()))?;
    logo_from_rgba(config, &pixels)
        .with_context(|| format!("Invalid logo {}", config.path.display()))
}

fn logo_from_rgba(config: &LogoConfig, pixels: &[u8]) -> Result<EncodedImage> {
    let expected = u64::from(config.width) * u64::from(config.height) * 4;
    if pixels.len() as u64 != expected {
        bail!(
            "{} bytes do not make a {}x{} RGBA image ({expected} bytes)",
            pixels.len(),
            config.width,
            config.height
        );
    }
    Ok(EncodedImage::from_rgba(config.width, config.height, pixels)?)
}

/// Returns `true` for pixels cut away by the rounded corners.
fn outside_corner(x: u32, y: u32, width: u32, height: u32) -> bool {
    let r = CORNER_RADIUS;
    let dx = if x < r {
        r - 1 - x
    } else if x >= width - r {
        x - (width - r)
    } else {
        return false;
    };
    let dy = if y < r {
        r - 1 - y
    } else if y >= height - r {
        y - (height - r)
    } else {
        return false;
    };
    dx * dx + dy * dy > (r - 1) * (r - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use splash_fb::Color;

    #[test]
    fn font_covers_ascii_and_latin() {
        let owned = default_font();
        let font = owned.as_font();
        assert_eq!(font.name(), "font8x8");
        assert_eq!(font.height(), FONT_HEIGHT);
        for ch in (' '..='~').chain(['é', 'ß', 'Ü']) {
            let glyph = font.glyph(ch).unwrap_or_else(|| panic!("no glyph for {ch:?}"));
            assert_eq!(glyph.rows.len(), FONT_HEIGHT as usize);
            assert!(glyph.width > 0 && glyph.width <= 8 * SCALE + GLYPH_GAP);
        }
        assert_eq!(font.glyph('\u{2603}'), None);
    }

    #[test]
    fn font_is_proportional() {
        let owned = default_font();
        let font = owned.as_font();
        assert_eq!(font.advance(' '), BLANK_WIDTH);
        assert!(font.advance('i') < font.advance('W'));
        let (w, h) = font.text_size("AB\nA");
        assert_eq!(w, font.advance('A') + font.advance('B'));
        assert_eq!(h, 2 * FONT_HEIGHT);
    }

    #[test]
    fn scaled_glyph_is_trimmed_and_doubled() {
        // A 2-pixel-wide vertical bar in columns 3 and 4 of rows 0 and 7.
        let bitmap = [0b0001_1000, 0, 0, 0, 0, 0, 0, 0b0001_1000];
        let (width, rows) = scale_glyph(&bitmap);
        assert_eq!(width, 2 * SCALE + GLYPH_GAP);
        assert_eq!(rows.len(), 16);
        assert_eq!(rows[0], 0xf000_0000);
        assert_eq!(rows[1], 0xf000_0000);
        assert_eq!(rows[2], 0);
        assert_eq!(rows[15], 0xf000_0000);
    }

    #[test]
    fn frame_has_ring_fill_and_clear_corners() {
        let theme = Theme {
            bar: Color::new(0x10, 0x20, 0x30),
            bar_background: Color::new(0xe0, 0xe0, 0xe0),
            ..Theme::default()
        };
        let frame = bar_frame(&theme).unwrap();
        let (w, h) = (frame.width(), frame.height());

        let pixels: Vec<_> = frame.image().pixels().collect();
        assert_eq!(pixels.len(), (w * h) as usize);
        let at = |x: u32, y: u32| pixels[(y * w + x) as usize].color;

        for (x, y) in [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)] {
            assert_eq!(at(x, y), None);
        }
        assert_eq!(at(w / 2, 0), Some(theme.bar));
        assert_eq!(at(0, h / 2), Some(theme.bar));
        assert_eq!(at(w / 2, FRAME_RING), Some(theme.bar_background));
        assert_eq!(at(1, 1), Some(theme.bar));
    }

    fn logo_config(width: u32, height: u32) -> LogoConfig {
        LogoConfig {
            path: "logo.rgba".into(),
            width,
            height,
            fullscreen: false,
        }
    }

    #[test]
    fn logo_keeps_pixels_and_transparency() {
        // 2x2: opaque red, transparent, opaque green, opaque blue.
        let rgba = [
            0xff, 0, 0, 0xff, 9, 9, 9, 0, //
            0, 0xff, 0, 0xff, 0, 0, 0xff, 0x80,
        ];
        let logo = logo_from_rgba(&logo_config(2, 2), &rgba).unwrap();
        let colors: Vec<_> = logo.image().pixels().map(|p| p.color).collect();
        assert_eq!(
            colors,
            [
                Some(Color::new(0xff, 0, 0)),
                None,
                Some(Color::new(0, 0xff, 0)),
                Some(Color::new(0, 0, 0xff)),
            ]
        );
    }

    #[test]
    fn noisy_logo_is_padded_to_fit() {
        let (width, height) = (200u32, 3u32);
        let rgba: Vec<u8> = (0..width * height)
            .flat_map(|i| [i as u8, (i >> 8) as u8, 7, 0xff])
            .collect();
        let logo = logo_from_rgba(&logo_config(width, height), &rgba).unwrap();
        assert!(logo.image().rowstride > width * 4);

        let pixels: Vec<_> = logo.image().pixels().collect();
        assert_eq!(pixels.len(), (width * height) as usize);
        for (i, pixel) in (0u32..).zip(&pixels) {
            assert_eq!((pixel.dx, pixel.dy), (i % width, i / width));
            assert_eq!(pixel.color, Some(Color::new(i as u8, (i >> 8) as u8, 7)));
        }
    }

    #[test]
    fn logo_size_must_match_file() {
        let err = logo_from_rgba(&logo_config(3, 2), &[0; 20]).unwrap_err();
        assert!(format!("{err:#}").contains("3x2"), "{err:#}");
        assert!(load_logo(&LogoConfig {
            path: "/nonexistent/logo.rgba".into(),
            ..logo_config(1, 1)
        })
        .is_err());
    }
}
