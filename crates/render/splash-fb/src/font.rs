//! Bitmap fonts with hashed glyph lookup.
//!
//! A [`Font`] is three flat tables:
//!
//! - `offset`: one entry per hash bucket (`code_point & index_mask`), giving
//!   the start of that bucket's chain in `index`.
//! - `index`: chains of `(key, content_offset)` pairs, each chain ended by a
//!   zero key. A key holds the code point's high bits (`cp & !index_mask`)
//!   OR'd with the glyph width.
//! - `content`: glyph bitmaps, `height` rows per glyph, one `u32` per row,
//!   most significant bit leftmost.
//!
//! Lookups are bounded: a missing glyph, a corrupt chain or an offset past
//! the table all resolve to "no glyph".

use crate::buffer::PixelBuffer;
use crate::canvas::Canvas;
use crate::color::Color;

/// Widest glyph a row word can hold.
const MAX_GLYPH_WIDTH: u32 = u32::BITS;

/// Leftmost pixel of a glyph row.
const ROW_MSB: u32 = 0x8000_0000;

/// A glyph's width and bitmap rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph<'a> {
    /// Advance width in pixels.
    pub width: u32,
    /// `height` packed rows, most significant bit first.
    pub rows: &'a [u32],
}

/// Borrowed font tables.
#[derive(Debug, Clone, Copy)]
pub struct Font<'a> {
    name: &'a str,
    height: u32,
    index_mask: u32,
    offset: &'a [u32],
    index: &'a [u32],
    content: &'a [u32],
}

impl<'a> Font<'a> {
    /// Wraps prebuilt tables.
    pub const fn new(
        name: &'a str,
        height: u32,
        index_mask: u32,
        offset: &'a [u32],
        index: &'a [u32],
        content: &'a [u32],
    ) -> Self {
        Self {
            name,
            height,
            index_mask,
            offset,
            index,
            content,
        }
    }

    /// Font name.
    pub const fn name(&self) -> &'a str {
        self.name
    }

    /// Height of every glyph in pixels.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Looks up the glyph for `ch`.
    pub fn glyph(&self, ch: char) -> Option<Glyph<'a>> {
        let cp = u32::from(ch);
        let mask = self.index_mask;
        let mut i = *self.offset.get((cp & mask) as usize)? as usize;

        for _ in 0..self.index.len() / 2 {
            let key = *self.index.get(i)?;
            if key == 0 {
                return None;
            }
            if key & !mask == cp & !mask {
                let start = *self.index.get(i + 1)? as usize;
                let rows = self.content.get(start..start + self.height as usize)?;
                return Some(Glyph {
                    width: key & mask,
                    rows,
                });
            }
            i += 2;
        }
        None
    }

    /// Advance width of `ch`; zero when the font has no glyph for it.
    pub fn advance(&self, ch: char) -> u32 {
        self.glyph(ch).map_or(0, |glyph| glyph.width)
    }

    /// Size of the box `text` occupies when drawn.
    ///
    /// Width is that of the widest line. Height is one line height per line,
    /// where every `'\n'` starts a new line.
    pub fn text_size(&self, text: &str) -> (u32, u32) {
        let mut widest = 0u32;
        let mut width = 0u32;
        let mut lines = 1u32;
        for ch in text.chars() {
            if ch == '\n' {
                widest = widest.max(width);
                width = 0;
                lines += 1;
            } else {
                width = width.saturating_add(self.advance(ch));
            }
        }
        (widest.max(width), lines.saturating_mul(self.height))
    }
}

impl<B: PixelBuffer> Canvas<B> {
    /// Draws `text` with its top-left corner at `(x, y)`.
    ///
    /// Set glyph bits are plotted in `color`; clear bits are left alone.
    /// Characters without a glyph are skipped without advancing.
    pub fn draw_text(&mut self, x: i32, y: i32, color: Color, font: &Font<'_>, text: &str) {
        let line_height = i32::try_from(font.height()).unwrap_or(i32::MAX);
        let mut cx = x;
        let mut cy = y;

        for ch in text.chars() {
            if ch == '\n' {
                cx = x;
                cy = cy.saturating_add(line_height);
                continue;
            }
            let Some(glyph) = font.glyph(ch) else {
                continue;
            };

            let width = glyph.width.min(MAX_GLYPH_WIDTH);
            for (row, &bits) in (0i32..).zip(glyph.rows) {
                let py = cy.saturating_add(row);
                for col in 0..width {
                    if bits & (ROW_MSB >> col) != 0 {
                        self.plot(cx.saturating_add_unsigned(col), py, color);
                    }
                }
            }
            cx = cx.saturating_add_unsigned(glyph.width);
        }
    }
}

// ---------------------------------------------------------------------------
// Building tables at run time
// ---------------------------------------------------------------------------

#[cfg(feature = "alloc")]
pub use builder::{FontBuilder, OwnedFont};

#[cfg(feature = "alloc")]
mod builder {
    use alloc::collections::BTreeMap;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;

    use super::{Font, MAX_GLYPH_WIDTH};

    /// Widest hash index a builder will produce.
    const MAX_INDEX_BITS: u32 = 16;

    /// Font tables owned on the heap.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct OwnedFont {
        name: String,
        height: u32,
        index_mask: u32,
        offset: Vec<u32>,
        index: Vec<u32>,
        content: Vec<u32>,
    }

    impl OwnedFont {
        /// Borrows the tables as a [`Font`].
        pub fn as_font(&self) -> Font<'_> {
            Font::new(
                &self.name,
                self.height,
                self.index_mask,
                &self.offset,
                &self.index,
                &self.content,
            )
        }
    }

    /// Collects glyphs and lays out the lookup tables.
    #[derive(Debug, Clone)]
    pub struct FontBuilder {
        name: String,
        height: u32,
        index_mask: u32,
        glyphs: BTreeMap<u32, (u32, Vec<u32>)>,
    }

    impl FontBuilder {
        /// Starts a font with `height`-row glyphs and `2^index_bits` hash
        /// buckets. Glyph widths are limited to the bucket mask.
        pub fn new(name: &str, height: u32, index_bits: u32) -> Self {
            let bits = index_bits.clamp(1, MAX_INDEX_BITS);
            Self {
                name: String::from(name),
                height,
                index_mask: (1 << bits) - 1,
                glyphs: BTreeMap::new(),
            }
        }

        /// Adds or replaces the glyph for `ch`.
        ///
        /// `rows` is padded with blank rows or cut to the font height.
        /// Zero-width glyphs are ignored.
        pub fn glyph(&mut self, ch: char, width: u32, rows: &[u32]) -> &mut Self {
            let width = width.min(self.index_mask).min(MAX_GLYPH_WIDTH);
            if width == 0 {
                return self;
            }
            let mut bitmap = vec![0; self.height as usize];
            for (dst, &src) in bitmap.iter_mut().zip(rows) {
                *dst = src;
            }
            self.glyphs.insert(u32::from(ch), (width, bitmap));
            self
        }

        /// Number of glyphs collected so far.
        pub fn len(&self) -> usize {
            self.glyphs.len()
        }

        /// Returns `true` if no glyph has been added.
        pub fn is_empty(&self) -> bool {
            self.glyphs.is_empty()
        }

        /// Lays out the tables.
        ///
        /// `index[0..2]` is an empty chain that unused buckets point at.
        #[allow(clippy::cast_possible_truncation)]
        pub fn build(&self) -> OwnedFont {
            let mask = self.index_mask;
            let mut buckets: Vec<Vec<(u32, u32)>> = vec![Vec::new(); mask as usize + 1];
            let mut content = Vec::with_capacity(self.glyphs.len() * self.height as usize);

            for (&cp, (width, rows)) in &self.glyphs {
                buckets[(cp & mask) as usize].push(((cp & !mask) | width, content.len() as u32));
                content.extend_from_slice(rows);
            }

            let mut offset = vec![0; buckets.len()];
            let mut index = vec![0, 0];
            for (slot, chain) in offset.iter_mut().zip(&buckets) {
                if chain.is_empty() {
                    continue;
                }
                *slot = index.len() as u32;
                for &(key, at) in chain {
                    index.extend_from_slice(&[key, at]);
                }
                index.extend_from_slice(&[0, 0]);
            }

            OwnedFont {
                name: self.name.clone(),
                height: self.height,
                index_mask: mask,
                offset,
                index,
                content,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ChannelLayout, PixelFormat};
    use crate::geometry::{Geometry, Rotation};

    const INK: Color = Color::new(0x6d, 0x6d, 0x70);

    /// Left-aligns `pattern`, a `width`-bit row, in a row word.
    fn row(pattern: u32, width: u32) -> u32 {
        pattern << (32 - width)
    }

    /// Three glyphs in bucket 1 of a 16-bucket table, plus a space.
    fn font() -> OwnedFont {
        let mut builder = FontBuilder::new("test", 2, 4);
        builder
            .glyph('A', 3, &[row(0b101, 3), row(0b010, 3)])
            .glyph('Q', 5, &[row(0b11111, 5)])
            .glyph('a', 7, &[])
            .glyph(' ', 2, &[])
            .glyph('z', 0, &[u32::MAX]);
        builder.build()
    }

    #[test]
    fn chained_bucket_finds_each_glyph() {
        let owned = font();
        let font = owned.as_font();
        assert_eq!(u32::from('A') & 15, u32::from('Q') & 15);
        assert_eq!(u32::from('A') & 15, u32::from('a') & 15);

        let a = font.glyph('A').unwrap();
        assert_eq!(a.width, 3);
        assert_eq!(a.rows, &[row(0b101, 3), row(0b010, 3)]);
        assert_eq!(font.glyph('Q').unwrap().rows, &[row(0b11111, 5), 0]);
        assert_eq!(font.advance('a'), 7);
        assert_eq!(font.advance(' '), 2);
    }

    #[test]
    fn missing_glyphs_are_not_found() {
        let owned = font();
        let font = owned.as_font();
        // Same bucket as 'A', not in the chain.
        assert_eq!(font.glyph('1'), None);
        // Empty bucket.
        assert_eq!(font.glyph('B'), None);
        // Zero-width glyphs are never stored.
        assert_eq!(font.glyph('z'), None);
        assert_eq!(font.glyph('\u{1f600}'), None);
    }

    #[test]
    fn unterminated_chain_is_bounded() {
        let offset = [0, 0];
        let index = [0x40 | 3, 0, 0x40 | 3, 0];
        let content = [0u32; 2];
        let font = Font::new("broken", 2, 1, &offset, &index, &content);
        assert_eq!(font.glyph('A'), None);

        let offset = [100, 100];
        let font = Font::new("broken", 2, 1, &offset, &index, &content);
        assert_eq!(font.glyph('A'), None);
    }

    #[test]
    fn text_size_counts_lines() {
        let owned = font();
        let font = owned.as_font();
        let (wa, wq) = (font.advance('A'), font.advance('Q'));

        assert_eq!(font.text_size("AQ\nA"), ((wa + wq).max(wa), 2 * font.height()));
        assert_eq!(font.text_size("A\nAQa"), (wa + wq + 7, 4));
        assert_eq!(font.text_size(""), (0, 2));
        assert_eq!(font.text_size("A?A"), (2 * wa, 2));
    }

    #[test]
    fn draw_text_plots_set_bits() {
        let geometry = Geometry::new(16, 8, 16 * 4, 32, Rotation::Deg0);
        let format = PixelFormat::resolve(32, ChannelLayout::RGB888);
        let mut canvas = Canvas::new(vec![0u8; geometry.byte_len()], geometry, format);
        let owned = font();

        canvas.draw_text(1, 1, INK, &owned.as_font(), "A A\nA");

        let lit: Vec<(i32, i32)> = (0..8)
            .flat_map(|y| (0..16).map(move |x| (x, y)))
            .filter(|&(x, y)| canvas.pixel(x, y) == Some(INK))
            .collect();
        assert_eq!(
            lit,
            [
                (1, 1),
                (3, 1),
                (6, 1),
                (8, 1),
                (2, 2),
                (7, 2),
                (1, 3),
                (3, 3),
                (2, 4),
            ]
        );
    }
}
