//! Linux framebuffer device access.
//!
//! [`Framebuffer::open`] queries the device mode, negotiates a drawable depth
//! when the current one is below 16 bpp, resolves the pixel format and maps
//! the visible buffer. The mapping is wrapped in a [`VolatileBuffer`] so every
//! pixel store reaches the device.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use log::{debug, info, warn};
use splash_fb::{
    Canvas, Channel, ChannelLayout, FALLBACK_CANDIDATES, FormatCandidate, Geometry, PixelFormat,
    Rotation, VolatileBuffer, needs_negotiation, negotiate,
};

use crate::sys;

// ---------------------------------------------------------------------------
// Kernel structures (linux/fb.h)
// ---------------------------------------------------------------------------

/// `struct fb_bitfield`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FbBitfield {
    /// Bit offset of the field.
    pub offset: u32,
    /// Field length in bits.
    pub length: u32,
    /// Non-zero if the most significant bit is on the right.
    pub msb_right: u32,
}

impl From<FbBitfield> for Channel {
    fn from(field: FbBitfield) -> Self {
        Channel::new(field.offset, field.length)
    }
}

impl From<Channel> for FbBitfield {
    fn from(channel: Channel) -> Self {
        Self {
            offset: channel.offset,
            length: channel.length,
            msb_right: 0,
        }
    }
}

/// `struct fb_var_screeninfo`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
#[allow(missing_docs)]
pub struct FbVarScreenInfo {
    pub xres: u32,
    pub yres: u32,
    pub xres_virtual: u32,
    pub yres_virtual: u32,
    pub xoffset: u32,
    pub yoffset: u32,
    pub bits_per_pixel: u32,
    pub grayscale: u32,
    pub red: FbBitfield,
    pub green: FbBitfield,
    pub blue: FbBitfield,
    pub transp: FbBitfield,
    pub nonstd: u32,
    pub activate: u32,
    pub height: u32,
    pub width: u32,
    pub accel_flags: u32,
    pub pixclock: u32,
    pub left_margin: u32,
    pub right_margin: u32,
    pub upper_margin: u32,
    pub lower_margin: u32,
    pub hsync_len: u32,
    pub vsync_len: u32,
    pub sync: u32,
    pub vmode: u32,
    pub rotate: u32,
    pub colorspace: u32,
    pub reserved: [u32; 4],
}

const _: () = assert!(size_of::<FbVarScreenInfo>() == 160);

impl FbVarScreenInfo {
    /// The reported red, green and blue fields.
    pub fn layout(&self) -> ChannelLayout {
        ChannelLayout::new(self.red.into(), self.green.into(), self.blue.into())
    }

    /// Requests `candidate`'s depth and layout, with no transparency channel.
    pub fn request(&mut self, candidate: &FormatCandidate) {
        self.bits_per_pixel = candidate.bits_per_pixel;
        self.red = candidate.layout.red.into();
        self.green = candidate.layout.green.into();
        self.blue = candidate.layout.blue.into();
        self.transp = FbBitfield::default();
    }
}

/// `struct fb_fix_screeninfo`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
#[allow(missing_docs)]
pub struct FbFixScreenInfo {
    pub id: [u8; 16],
    pub smem_start: libc::c_ulong,
    pub smem_len: u32,
    pub type_: u32,
    pub type_aux: u32,
    pub visual: u32,
    pub xpanstep: u16,
    pub ypanstep: u16,
    pub ywrapstep: u16,
    pub line_length: u32,
    pub mmio_start: libc::c_ulong,
    pub mmio_len: u32,
    pub accel: u32,
    pub capabilities: u16,
    pub reserved: [u16; 2],
}

#[cfg(target_pointer_width = "64")]
const _: () = assert!(size_of::<FbFixScreenInfo>() == 80);
#[cfg(target_pointer_width = "32")]
const _: () = assert!(size_of::<FbFixScreenInfo>() == 68);

fn get_var(fd: RawFd) -> io::Result<FbVarScreenInfo> {
    let mut var = FbVarScreenInfo::default();
    // SAFETY: FBIOGET_VSCREENINFO fills one `fb_var_screeninfo`.
    unsafe { sys::ioctl_ptr(fd, sys::FBIOGET_VSCREENINFO, &raw mut var)? };
    Ok(var)
}

fn put_var(fd: RawFd, var: &mut FbVarScreenInfo) -> io::Result<()> {
    // SAFETY: FBIOPUT_VSCREENINFO reads and updates one `fb_var_screeninfo`.
    unsafe { sys::ioctl_ptr(fd, sys::FBIOPUT_VSCREENINFO, ptr::from_mut(var))? };
    Ok(())
}

fn get_fix(fd: RawFd) -> io::Result<FbFixScreenInfo> {
    let mut fix = FbFixScreenInfo::default();
    // SAFETY: FBIOGET_FSCREENINFO fills one `fb_fix_screeninfo`.
    unsafe { sys::ioctl_ptr(fd, sys::FBIOGET_FSCREENINFO, &raw mut fix)? };
    Ok(fix)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors opening the framebuffer. All of them are fatal.
#[derive(Debug)]
pub enum OpenError {
    /// The device node could not be opened.
    Open {
        /// Device path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// `FBIOGET_VSCREENINFO` failed.
    GetVarInfo(io::Error),
    /// `FBIOGET_FSCREENINFO` failed.
    GetFixInfo(io::Error),
    /// The depth is not drawable and the device refused every fallback.
    NoUsableDepth {
        /// Depth the device reported.
        bits_per_pixel: u32,
    },
    /// Mapping the buffer failed.
    Map(io::Error),
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, .. } => write!(f, "cannot open {}", path.display()),
            Self::GetVarInfo(_) => f.write_str("cannot read variable screen info"),
            Self::GetFixInfo(_) => f.write_str("cannot read fixed screen info"),
            Self::NoUsableDepth { bits_per_pixel } => write!(
                f,
                "{bits_per_pixel} bpp is not supported and no fallback depth was accepted"
            ),
            Self::Map(_) => f.write_str("cannot map framebuffer"),
        }
    }
}

impl std::error::Error for OpenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::GetVarInfo(e) | Self::GetFixInfo(e) | Self::Map(e) => Some(e),
            Self::NoUsableDepth { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// A shared read-write mapping of the device, unmapped on drop.
#[derive(Debug)]
struct Mapping {
    base: NonNull<libc::c_void>,
    len: usize,
}

impl Mapping {
    fn new(fd: RawFd, len: usize) -> io::Result<Self> {
        // SAFETY: a fresh shared mapping of `fd`; no existing memory is
        // affected.
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(base)
            .map(|base| Self { base, len })
            .ok_or_else(|| io::Error::other("mmap returned a null mapping"))
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: `base..base + len` is the mapping created in `new`, and the
        // canvas borrowing it is dropped first.
        if unsafe { libc::munmap(self.base.as_ptr(), self.len) } != 0 {
            warn!("munmap failed: {}", io::Error::last_os_error());
        }
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    usize::try_from(size).ok().filter(|&s| s > 0).unwrap_or(4096)
}

// ---------------------------------------------------------------------------
// Framebuffer
// ---------------------------------------------------------------------------

/// An open, mapped framebuffer device.
///
/// Field order is drop order: the canvas goes first, then the mapping, then
/// the device descriptor.
#[derive(Debug)]
pub struct Framebuffer {
    canvas: Canvas<VolatileBuffer>,
    mapping: Mapping,
    _device: File,
}

impl Framebuffer {
    /// Opens and maps the device at `path`.
    ///
    /// # Errors
    ///
    /// Any failure is returned as an [`OpenError`]; nothing is retried.
    pub fn open(path: &Path, rotation: Rotation) -> Result<Self, OpenError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| OpenError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let fd = file.as_raw_fd();

        let mut var = get_var(fd).map_err(OpenError::GetVarInfo)?;
        if needs_negotiation(var.bits_per_pixel) {
            let reported = var.bits_per_pixel;
            warn!("{reported} bpp framebuffers are not supported, trying to change pixel format");
            // Drop any oversized virtual resolution so the driver can fit a
            // deeper mode.
            var.yres_virtual = var.yres;
            let chosen = negotiate(&FALLBACK_CANDIDATES, |candidate| {
                var.request(candidate);
                match put_var(fd, &mut var) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("failed to switch to {}: {e}", candidate.name);
                        false
                    }
                }
            })
            .map_err(|_| OpenError::NoUsableDepth {
                bits_per_pixel: reported,
            })?;
            info!("switched to {}", chosen.name);
        }

        // The line length may change with the pixel format, so both are read
        // after negotiation.
        let var = get_var(fd).map_err(OpenError::GetVarInfo)?;
        let fix = get_fix(fd).map_err(OpenError::GetFixInfo)?;

        let format = PixelFormat::resolve(var.bits_per_pixel, var.layout());
        if !format.is_drawable() {
            warn!(
                "{} bpp {} layout cannot be drawn; output stays blank",
                format.bits_per_pixel(),
                format.mode()
            );
        }
        let geometry = Geometry::new(
            var.xres,
            var.yres,
            fix.line_length,
            var.bits_per_pixel,
            rotation,
        );
        debug!(
            "{}: {}x{} (logical {}x{}), {} bpp {}, stride {}, rotation {}",
            path.display(),
            geometry.real_width(),
            geometry.real_height(),
            geometry.width(),
            geometry.height(),
            format.bits_per_pixel(),
            format.mode(),
            geometry.stride(),
            rotation.degrees()
        );

        // The visible buffer starts `smem_start % page_size` bytes into the
        // first mapped page.
        #[allow(clippy::cast_possible_truncation)]
        let start = fix.smem_start as usize % page_size();
        let len = geometry.byte_len();
        let mapping = Mapping::new(fd, start + len).map_err(OpenError::Map)?;

        // SAFETY: `start + len` bytes are mapped and stay mapped until
        // `mapping` drops, which happens after the canvas (field order). The
        // range is only reached through this buffer.
        let buffer = unsafe {
            let data = mapping.base.cast::<u8>().add(start);
            VolatileBuffer::from_raw_parts(data, len)
        };

        Ok(Self {
            canvas: Canvas::new(buffer, geometry, format),
            mapping,
            _device: file,
        })
    }

    /// The drawing surface, mutably.
    pub fn canvas_mut(&mut self) -> &mut Canvas<VolatileBuffer> {
        &mut self.canvas
    }

    /// Size of the mapping in bytes, including the leading page offset.
    pub fn mapped_len(&self) -> usize {
        self.mapping.len
    }
}
