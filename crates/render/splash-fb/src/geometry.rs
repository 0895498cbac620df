//! Logical-to-physical coordinate mapping.
//!
//! Callers draw in logical coordinates: the screen as the viewer sees it after
//! rotation. [`Geometry::offset`] bounds-checks a logical point and maps it to
//! a byte offset in the physical (unrotated) buffer.

/// Display rotation, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    /// No rotation.
    #[default]
    Deg0,
    /// Rotated a quarter turn; logical width and height are swapped.
    Deg90,
    /// Upside down.
    Deg180,
    /// Rotated three quarter turns; logical width and height are swapped.
    Deg270,
}

impl Rotation {
    /// Maps an angle in degrees to a rotation.
    ///
    /// Angles other than 90, 180 and 270 are treated as no rotation.
    pub const fn from_degrees(angle: i32) -> Self {
        match angle {
            90 => Self::Deg90,
            180 => Self::Deg180,
            270 => Self::Deg270,
            _ => Self::Deg0,
        }
    }

    /// Returns the angle in degrees.
    pub const fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Returns `true` if logical width and height are swapped.
    pub const fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// Framebuffer geometry, fixed when the device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Logical width after rotation.
    width: u32,
    /// Logical height after rotation.
    height: u32,
    /// Physical width in pixels.
    real_width: u32,
    /// Physical height in pixels.
    real_height: u32,
    /// Bytes from one physical row to the next.
    stride: u32,
    bytes_per_pixel: u32,
    rotation: Rotation,
}

impl Geometry {
    /// Creates a geometry from the physical mode and a rotation.
    pub const fn new(
        real_width: u32,
        real_height: u32,
        stride: u32,
        bits_per_pixel: u32,
        rotation: Rotation,
    ) -> Self {
        let (width, height) = if rotation.swaps_axes() {
            (real_height, real_width)
        } else {
            (real_width, real_height)
        };
        Self {
            width,
            height,
            real_width,
            real_height,
            stride,
            bytes_per_pixel: bits_per_pixel >> 3,
            rotation,
        }
    }

    /// Logical width.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Logical height.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Physical width.
    pub const fn real_width(&self) -> u32 {
        self.real_width
    }

    /// Physical height.
    pub const fn real_height(&self) -> u32 {
        self.real_height
    }

    /// Bytes per physical row.
    pub const fn stride(&self) -> u32 {
        self.stride
    }

    /// Bytes per pixel.
    pub const fn bytes_per_pixel(&self) -> u32 {
        self.bytes_per_pixel
    }

    /// Display rotation.
    pub const fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Size in bytes of the visible physical buffer (`stride * real_height`).
    pub const fn byte_len(&self) -> usize {
        self.stride as usize * self.real_height as usize
    }

    /// Maps a logical point to physical pixel coordinates.
    ///
    /// Returns `None` if the point lies outside the logical screen.
    #[inline]
    pub fn physical(&self, x: i32, y: i32) -> Option<(u32, u32)> {
        let x = u32::try_from(x).ok().filter(|&x| x < self.width)?;
        let y = u32::try_from(y).ok().filter(|&y| y < self.height)?;
        Some(match self.rotation {
            Rotation::Deg0 => (x, y),
            Rotation::Deg90 => (y, self.width - x - 1),
            Rotation::Deg180 => (self.width - x - 1, self.height - y - 1),
            Rotation::Deg270 => (self.height - y - 1, x),
        })
    }

    /// Maps a logical point to a byte offset in the physical buffer.
    ///
    /// Returns `None` if the point lies outside the logical screen.
    #[inline]
    pub fn offset(&self, x: i32, y: i32) -> Option<usize> {
        let (px, py) = self.physical(x, y)?;
        Some(py as usize * self.stride as usize + px as usize * self.bytes_per_pixel as usize)
    }
}
