//! `splash-fb` --- a small, `no_std` framebuffer renderer for boot splash screens.
//!
//! The crate draws three primitives onto a linear pixel buffer: filled
//! rectangles, run-length encoded images and bitmap text. Everything is
//! parameterised by a [`PixelFormat`] resolved once from the channel layout the
//! display hardware reports, and a [`Geometry`] describing stride, depth and
//! display rotation.
//!
//! Draw calls never fail. Coordinates outside the logical screen, pixel
//! formats the packer cannot express, truncated image streams and unknown
//! glyphs all degrade to "nothing drawn".
//!
//! # Usage
//!
//! ```
//! use splash_fb::{Canvas, ChannelLayout, Color, Geometry, PixelFormat, Rotation};
//!
//! let format = PixelFormat::resolve(32, ChannelLayout::RGB888);
//! let geometry = Geometry::new(64, 48, 64 * 4, 32, Rotation::Deg0);
//! let mut canvas = Canvas::new(vec![0u8; geometry.byte_len()], geometry, format);
//!
//! canvas.draw_rect(8, 8, 16, 4, Color::new(0xec, 0xec, 0xe1));
//! assert_eq!(canvas.pixel(8, 8), Some(Color::new(0xec, 0xec, 0xe1)));
//! ```

#![cfg_attr(not(test), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod buffer;
pub mod canvas;
pub mod color;
pub mod font;
pub mod format;
pub mod geometry;
pub mod rle;

pub use buffer::{PixelBuffer, VolatileBuffer};
pub use canvas::Canvas;
pub use color::Color;
pub use font::{Font, Glyph};
#[cfg(feature = "alloc")]
pub use font::{FontBuilder, OwnedFont};
pub use format::{
    Channel, ChannelLayout, FALLBACK_CANDIDATES, FormatCandidate, FormatError, Packed,
    PixelFormat, RgbMode, negotiate, needs_negotiation,
};
pub use geometry::{Geometry, Rotation};
pub use rle::{BytesPerPixel, RleDecoder, RleImage, RlePixel};
#[cfg(feature = "alloc")]
pub use rle::{EncodeError, encode};
