//! Run-length encoded images.
//!
//! A stream is a sequence of runs, each introduced by a length byte `L`:
//!
//! - `L & 0x80 != 0`: a repeat run. One pixel follows and is replicated
//!   `L & 0x7f` times.
//! - otherwise: a literal run of `L` pixels stored back to back.
//!
//! A count of zero in either form ends the stream. Pixels are 3 bytes (RGB)
//! or 4 bytes (RGB plus an opacity flag; `0` means transparent).
//!
//! The raster cursor walks the image left to right and wraps whenever
//! `dx * bytes_per_pixel` reaches the row stride, so padding columns in the
//! stride are decoded but never drawn. Decoding stops once the consumed byte
//! count reaches `rowstride * height`, and a stream that ends early simply
//! stops; neither case is an error.

use crate::buffer::PixelBuffer;
use crate::canvas::Canvas;
use crate::color::Color;

/// High bit of a run length byte: set for repeat runs.
const REPEAT_FLAG: u8 = 0x80;
/// Longest run a single length byte can describe.
const MAX_RUN: u8 = 0x7f;

/// Size of one encoded pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BytesPerPixel {
    /// Red, green, blue.
    Rgb = 3,
    /// Red, green, blue, opacity flag.
    Rgba = 4,
}

impl BytesPerPixel {
    /// Maps a byte count to a pixel size. Only 3 and 4 are valid.
    pub const fn from_count(count: u32) -> Option<Self> {
        match count {
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    /// Number of bytes per encoded pixel.
    pub const fn get(self) -> usize {
        self as usize
    }
}

/// A compressed image: the stream plus its declared dimensions.
#[derive(Debug, Clone, Copy)]
pub struct RleImage<'a> {
    /// Visible width in pixels.
    pub width: u32,
    /// Height in rows.
    pub height: u32,
    /// Bytes per decoded row, including any padding.
    pub rowstride: u32,
    /// Encoded pixel size.
    pub bytes_per_pixel: BytesPerPixel,
    /// The run-length encoded stream.
    pub data: &'a [u8],
}

impl<'a> RleImage<'a> {
    /// Describes an encoded image.
    pub const fn new(
        width: u32,
        height: u32,
        rowstride: u32,
        bytes_per_pixel: BytesPerPixel,
        data: &'a [u8],
    ) -> Self {
        Self {
            width,
            height,
            rowstride,
            bytes_per_pixel,
            data,
        }
    }

    /// Returns a decoder over the image's visible pixels.
    pub fn pixels(&self) -> RleDecoder<'a> {
        RleDecoder::new(self)
    }
}

/// One decoded, visible pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RlePixel {
    /// Column inside the image.
    pub dx: u32,
    /// Row inside the image.
    pub dy: u32,
    /// The pixel color, or `None` when the opacity flag is clear.
    pub color: Option<Color>,
}

#[derive(Debug, Clone, Copy)]
enum State {
    /// Between runs; the next byte is a length.
    Idle,
    Repeat {
        remaining: u8,
        pixel: Option<Color>,
    },
    Literal {
        remaining: u8,
    },
    Done,
}

/// Streaming decoder. Yields pixels in raster order without buffering the
/// image.
#[derive(Debug, Clone)]
pub struct RleDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    budget: usize,
    width: u32,
    rowstride: usize,
    bpp: usize,
    dx: u32,
    dy: u32,
    state: State,
}

impl<'a> RleDecoder<'a> {
    /// Starts decoding `image` from its first run.
    pub fn new(image: &RleImage<'a>) -> Self {
        let rowstride = image.rowstride as usize;
        Self {
            data: image.data,
            pos: 0,
            budget: rowstride.saturating_mul(image.height as usize),
            width: image.width,
            rowstride,
            bpp: image.bytes_per_pixel.get(),
            dx: 0,
            dy: 0,
            state: State::Idle,
        }
    }

    /// Reads the pixel at the current position.
    ///
    /// The outer `None` means the stream is truncated; the inner one marks a
    /// transparent pixel.
    fn read_pixel(&self) -> Option<Option<Color>> {
        let end = self.pos.checked_add(self.bpp)?;
        let bytes = self.data.get(self.pos..end)?;
        let opaque = bytes.get(3).is_none_or(|&alpha| alpha != 0);
        Some(opaque.then(|| Color::new(bytes[0], bytes[1], bytes[2])))
    }

    /// Returns the cursor position and steps it, wrapping at the row stride.
    fn advance(&mut self) -> (u32, u32) {
        let at = (self.dx, self.dy);
        self.dx += 1;
        if self.dx as usize * self.bpp >= self.rowstride {
            self.dx = 0;
            self.dy += 1;
        }
        at
    }

    fn emit(&self, (dx, dy): (u32, u32), color: Option<Color>) -> Option<RlePixel> {
        (dx < self.width).then_some(RlePixel { dx, dy, color })
    }
}

impl Iterator for RleDecoder<'_> {
    type Item = RlePixel;

    fn next(&mut self) -> Option<RlePixel> {
        loop {
            match self.state {
                State::Done => return None,
                State::Idle => {
                    if self.pos >= self.budget {
                        self.state = State::Done;
                        continue;
                    }
                    let Some(&len) = self.data.get(self.pos) else {
                        self.state = State::Done;
                        continue;
                    };
                    self.pos += 1;

                    let count = len & MAX_RUN;
                    self.state = if count == 0 {
                        State::Done
                    } else if len & REPEAT_FLAG != 0 {
                        match self.read_pixel() {
                            Some(pixel) => {
                                self.pos += self.bpp;
                                State::Repeat {
                                    remaining: count,
                                    pixel,
                                }
                            }
                            None => State::Done,
                        }
                    } else {
                        State::Literal { remaining: count }
                    };
                }
                // Repeat runs are never cut by the byte budget.
                State::Repeat { remaining, pixel } => {
                    let at = self.advance();
                    self.state = if remaining > 1 {
                        State::Repeat {
                            remaining: remaining - 1,
                            pixel,
                        }
                    } else {
                        State::Idle
                    };
                    if let Some(out) = self.emit(at, pixel) {
                        return Some(out);
                    }
                }
                State::Literal { remaining } => {
                    let Some(pixel) = self.read_pixel() else {
                        self.state = State::Done;
                        continue;
                    };
                    self.pos += self.bpp;
                    let at = self.advance();
                    self.state = if remaining > 1 && self.pos < self.budget {
                        State::Literal {
                            remaining: remaining - 1,
                        }
                    } else {
                        State::Idle
                    };
                    if let Some(out) = self.emit(at, pixel) {
                        return Some(out);
                    }
                }
            }
        }
    }
}

impl<B: PixelBuffer> Canvas<B> {
    /// Decodes `image` straight onto the canvas with its top-left corner at
    /// `(x, y)`. Transparent pixels leave the destination untouched.
    pub fn draw_image(&mut self, x: i32, y: i32, image: &RleImage<'_>) {
        for pixel in image.pixels() {
            if let Some(color) = pixel.color {
                self.plot(
                    x.saturating_add_unsigned(pixel.dx),
                    y.saturating_add_unsigned(pixel.dy),
                    color,
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Errors from [`encode`].
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The pixel slice is not `width * height * bytes_per_pixel` bytes.
    PixelCount {
        /// Required length in bytes.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },
    /// The encoded stream is longer than the decoder's byte budget.
    Incompressible {
        /// Length of the encoded stream.
        encoded: usize,
        /// `rowstride * height`.
        budget: usize,
    },
}

#[cfg(feature = "alloc")]
impl core::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PixelCount { expected, actual } => {
                write!(f, "expected {expected} bytes of pixel data, got {actual}")
            }
            Self::Incompressible { encoded, budget } => write!(
                f,
                "encoded stream is {encoded} bytes, exceeding the {budget}-byte budget"
            ),
        }
    }
}

#[cfg(feature = "alloc")]
impl core::error::Error for EncodeError {}

/// Encodes tightly packed pixels (`rowstride = width * bytes_per_pixel`).
///
/// Two or more equal neighbours become a repeat run; everything else is
/// gathered into literal runs. Runs may cross row boundaries. A zero
/// terminator is appended when the stream is shorter than the byte budget.
///
/// # Errors
///
/// [`EncodeError::PixelCount`] if `pixels` has the wrong length, and
/// [`EncodeError::Incompressible`] if the stream would not fit in the budget
/// the decoder enforces.
#[cfg(feature = "alloc")]
pub fn encode(
    width: u32,
    height: u32,
    bytes_per_pixel: BytesPerPixel,
    pixels: &[u8],
) -> Result<alloc::vec::Vec<u8>, EncodeError> {
    let bpp = bytes_per_pixel.get();
    let budget = width as usize * bpp * height as usize;
    if pixels.len() != budget {
        return Err(EncodeError::PixelCount {
            expected: budget,
            actual: pixels.len(),
        });
    }

    let px: alloc::vec::Vec<&[u8]> = pixels.chunks_exact(bpp).collect();
    let mut out = alloc::vec::Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    let flush = |out: &mut alloc::vec::Vec<u8>, from: usize, to: usize| {
        for chunk in px[from..to].chunks(usize::from(MAX_RUN)) {
            // `chunks` caps the length at MAX_RUN.
            #[allow(clippy::cast_possible_truncation)]
            out.push(chunk.len() as u8);
            for pixel in chunk {
                out.extend_from_slice(pixel);
            }
        }
    };

    while i < px.len() {
        let run = px[i..]
            .iter()
            .take(usize::from(MAX_RUN))
            .take_while(|&&p| p == px[i])
            .count();
        if run >= 2 {
            flush(&mut out, literal_start, i);
            // `run` is at most MAX_RUN.
            #[allow(clippy::cast_possible_truncation)]
            out.push(REPEAT_FLAG | run as u8);
            out.extend_from_slice(px[i]);
            i += run;
            literal_start = i;
        } else {
            i += 1;
        }
    }
    flush(&mut out, literal_start, px.len());

    if out.len() > budget {
        return Err(EncodeError::Incompressible {
            encoded: out.len(),
            budget,
        });
    }
    if out.len() < budget {
        out.push(0);
    }
    Ok(out)
}
