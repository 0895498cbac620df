//! Drawing surface: a [`PixelBuffer`] plus the geometry and pixel format that
//! give its bytes meaning.
//!
//! All draw calls take logical (post-rotation) coordinates. Anything outside
//! the logical screen is silently skipped.

use crate::buffer::PixelBuffer;
use crate::color::Color;
use crate::format::{Packed, PixelFormat, bytes24_to_word};
use crate::geometry::Geometry;

/// A pixel buffer together with its geometry and resolved pixel format.
#[derive(Debug)]
pub struct Canvas<B> {
    buffer: B,
    geometry: Geometry,
    format: PixelFormat,
}

impl<B: PixelBuffer> Canvas<B> {
    /// Creates a canvas over `buffer`.
    ///
    /// The buffer should be at least [`Geometry::byte_len`] bytes; stores
    /// beyond its end are dropped.
    pub const fn new(buffer: B, geometry: Geometry, format: PixelFormat) -> Self {
        Self {
            buffer,
            geometry,
            format,
        }
    }

    /// Logical width in pixels.
    pub const fn width(&self) -> u32 {
        self.geometry.width()
    }

    /// Logical height in pixels.
    pub const fn height(&self) -> u32 {
        self.geometry.height()
    }

    /// Returns the geometry.
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Returns the pixel format.
    pub const fn format(&self) -> &PixelFormat {
        &self.format
    }

    /// Returns the underlying buffer.
    pub const fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Consumes the canvas and returns the underlying buffer.
    pub fn into_buffer(self) -> B {
        self.buffer
    }

    /// Plots a single pixel. Out-of-range coordinates are a no-op.
    #[inline]
    pub fn plot(&mut self, x: i32, y: i32, color: Color) {
        let Some(offset) = self.geometry.offset(x, y) else {
            return;
        };
        match self.format.pack(color) {
            Packed::U16(value) => self.buffer.write_u16(offset, value),
            Packed::U24(bytes) => {
                for (i, byte) in bytes.into_iter().enumerate() {
                    self.buffer.write_u8(offset + i, byte);
                }
            }
            Packed::U32(value) => self.buffer.write_u32(offset, value),
            Packed::Unsupported => {}
        }
    }

    /// Reads a pixel back as a color.
    ///
    /// Returns `None` outside the logical screen or when the format cannot be
    /// decoded.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        let offset = self.geometry.offset(x, y)?;
        let raw = match self.format.bits_per_pixel() {
            16 => u32::from(self.buffer.read_u16(offset)),
            24 => bytes24_to_word([
                self.buffer.read_u8(offset),
                self.buffer.read_u8(offset + 1),
                self.buffer.read_u8(offset + 2),
            ]),
            32 => self.buffer.read_u32(offset),
            _ => return None,
        };
        self.format.unpack(raw)
    }

    /// Fills the rectangle `[x, x + w) x [y, y + h)`.
    ///
    /// The rectangle is clipped to the logical screen first; clipped cells
    /// are never visited.
    pub fn draw_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Color) {
        let x0 = i64::from(x).max(0);
        let y0 = i64::from(y).max(0);
        let x1 = (i64::from(x) + i64::from(w)).min(i64::from(self.width()));
        let y1 = (i64::from(y) + i64::from(h)).min(i64::from(self.height()));

        // Clipped bounds lie in `0..=width`, which fits an `i32` coordinate.
        #[allow(clippy::cast_possible_truncation)]
        for py in y0..y1 {
            for px in x0..x1 {
                self.plot(px as i32, py as i32, color);
            }
        }
    }

    /// Fills the whole logical screen.
    pub fn clear(&mut self, color: Color) {
        self.draw_rect(0, 0, self.width(), self.height(), color);
    }
}
