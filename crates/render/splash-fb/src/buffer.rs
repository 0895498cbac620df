//! Byte-addressed pixel storage.
//!
//! [`PixelBuffer`] is the only way the renderer touches memory. Two kinds of
//! storage implement it:
//!
//! - [`VolatileBuffer`] wraps a raw, hardware-backed address range (a mapped
//!   framebuffer). Every access is a volatile load or store, so each logical
//!   write reaches the device exactly once and in program order.
//! - Plain byte slices (and `Vec<u8>` with the `alloc` feature), used for
//!   off-screen canvases and tests.
//!
//! Multi-byte stores use native byte order, matching how display hardware
//! interprets a 16- or 32-bit pixel word. Accesses that would reach past the
//! end of the buffer are dropped (reads return zero).

use core::ops::Range;
use core::ptr::{self, NonNull};

/// Random-access byte storage that pixels are written into.
pub trait PixelBuffer {
    /// Length of the buffer in bytes.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores one byte.
    fn write_u8(&mut self, offset: usize, value: u8);

    /// Stores a native-endian 16-bit word.
    fn write_u16(&mut self, offset: usize, value: u16);

    /// Stores a native-endian 32-bit word.
    fn write_u32(&mut self, offset: usize, value: u32);

    /// Loads one byte.
    fn read_u8(&self, offset: usize) -> u8;

    /// Loads a native-endian 16-bit word.
    fn read_u16(&self, offset: usize) -> u16;

    /// Loads a native-endian 32-bit word.
    fn read_u32(&self, offset: usize) -> u32;
}

// ---------------------------------------------------------------------------
// Memory-backed storage
// ---------------------------------------------------------------------------

/// Byte range of a `size`-byte access at `offset`, if it does not overflow.
fn span(offset: usize, size: usize) -> Option<Range<usize>> {
    Some(offset..offset.checked_add(size)?)
}

impl PixelBuffer for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn write_u8(&mut self, offset: usize, value: u8) {
        if let Some(byte) = self.get_mut(offset) {
            *byte = value;
        }
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        if let Some(bytes) = span(offset, 2).and_then(|range| self.get_mut(range)) {
            bytes.copy_from_slice(&value.to_ne_bytes());
        }
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        if let Some(bytes) = span(offset, 4).and_then(|range| self.get_mut(range)) {
            bytes.copy_from_slice(&value.to_ne_bytes());
        }
    }

    fn read_u8(&self, offset: usize) -> u8 {
        self.get(offset).copied().unwrap_or(0)
    }

    fn read_u16(&self, offset: usize) -> u16 {
        span(offset, 2)
            .and_then(|range| self.get(range))
            .and_then(|bytes| bytes.try_into().ok())
            .map_or(0, u16::from_ne_bytes)
    }

    fn read_u32(&self, offset: usize) -> u32 {
        span(offset, 4)
            .and_then(|range| self.get(range))
            .and_then(|bytes| bytes.try_into().ok())
            .map_or(0, u32::from_ne_bytes)
    }
}

#[cfg(feature = "alloc")]
impl PixelBuffer for alloc::vec::Vec<u8> {
    fn len(&self) -> usize {
        alloc::vec::Vec::len(self)
    }

    fn write_u8(&mut self, offset: usize, value: u8) {
        self.as_mut_slice().write_u8(offset, value);
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        self.as_mut_slice().write_u16(offset, value);
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.as_mut_slice().write_u32(offset, value);
    }

    fn read_u8(&self, offset: usize) -> u8 {
        self.as_slice().read_u8(offset)
    }

    fn read_u16(&self, offset: usize) -> u16 {
        self.as_slice().read_u16(offset)
    }

    fn read_u32(&self, offset: usize) -> u32 {
        self.as_slice().read_u32(offset)
    }
}

impl<B: PixelBuffer + ?Sized> PixelBuffer for &mut B {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn write_u8(&mut self, offset: usize, value: u8) {
        (**self).write_u8(offset, value);
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        (**self).write_u16(offset, value);
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        (**self).write_u32(offset, value);
    }

    fn read_u8(&self, offset: usize) -> u8 {
        (**self).read_u8(offset)
    }

    fn read_u16(&self, offset: usize) -> u16 {
        (**self).read_u16(offset)
    }

    fn read_u32(&self, offset: usize) -> u32 {
        (**self).read_u32(offset)
    }
}

// ---------------------------------------------------------------------------
// Hardware-backed storage
// ---------------------------------------------------------------------------

/// A raw, hardware-backed address range accessed only through volatile
/// loads and stores.
///
/// The buffer does not own the memory. Whoever created the mapping keeps it
/// alive for as long as the `VolatileBuffer` exists and releases it
/// afterwards.
#[derive(Debug)]
pub struct VolatileBuffer {
    base: NonNull<u8>,
    len: usize,
}

impl VolatileBuffer {
    /// Wraps `len` bytes starting at `base`.
    ///
    /// # Safety
    ///
    /// `base..base + len` must be valid for volatile reads and writes for the
    /// whole lifetime of the returned value, and must not be accessed through
    /// any other Rust reference while it exists.
    pub const unsafe fn from_raw_parts(base: NonNull<u8>, len: usize) -> Self {
        Self { base, len }
    }

    /// Returns a pointer to `offset` if `size` bytes fit there.
    #[inline]
    fn at(&self, offset: usize, size: usize) -> Option<*mut u8> {
        let end = offset.checked_add(size)?;
        if end > self.len {
            return None;
        }
        // SAFETY: `offset + size <= len`, so the pointer stays inside the range
        // promised by `from_raw_parts`.
        Some(unsafe { self.base.as_ptr().add(offset) })
    }

    /// Volatile store of `bytes` at `ptr`, byte by byte.
    ///
    /// # Safety
    ///
    /// `ptr..ptr + bytes.len()` must lie inside the buffer.
    #[inline]
    unsafe fn write_bytes(ptr: *mut u8, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            // SAFETY: guaranteed by the caller.
            unsafe { ptr::write_volatile(ptr.add(i), byte) };
        }
    }

    /// Volatile load of `N` bytes at `ptr`, byte by byte.
    ///
    /// # Safety
    ///
    /// `ptr..ptr + N` must lie inside the buffer.
    #[inline]
    unsafe fn read_bytes<const N: usize>(ptr: *const u8) -> [u8; N] {
        let mut out = [0u8; N];
        for (i, byte) in out.iter_mut().enumerate() {
            // SAFETY: guaranteed by the caller.
            *byte = unsafe { ptr::read_volatile(ptr.add(i)) };
        }
        out
    }
}

impl PixelBuffer for VolatileBuffer {
    fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn write_u8(&mut self, offset: usize, value: u8) {
        if let Some(ptr) = self.at(offset, 1) {
            // SAFETY: `at` checked the bounds.
            unsafe { ptr::write_volatile(ptr, value) };
        }
    }

    #[inline]
    fn write_u16(&mut self, offset: usize, value: u16) {
        let Some(ptr) = self.at(offset, 2) else {
            return;
        };
        let word = ptr.cast::<u16>();
        // SAFETY: `at` checked the bounds; the word store is only used when
        // the address is suitably aligned.
        unsafe {
            if word.is_aligned() {
                ptr::write_volatile(word, value);
            } else {
                Self::write_bytes(ptr, &value.to_ne_bytes());
            }
        }
    }

    #[inline]
    fn write_u32(&mut self, offset: usize, value: u32) {
        let Some(ptr) = self.at(offset, 4) else {
            return;
        };
        let word = ptr.cast::<u32>();
        // SAFETY: as in `write_u16`.
        unsafe {
            if word.is_aligned() {
                ptr::write_volatile(word, value);
            } else {
                Self::write_bytes(ptr, &value.to_ne_bytes());
            }
        }
    }

    fn read_u8(&self, offset: usize) -> u8 {
        // SAFETY: `at` checked the bounds.
        self.at(offset, 1)
            .map_or(0, |ptr| unsafe { ptr::read_volatile(ptr) })
    }

    fn read_u16(&self, offset: usize) -> u16 {
        let Some(ptr) = self.at(offset, 2) else {
            return 0;
        };
        let word = ptr.cast::<u16>();
        // SAFETY: `at` checked the bounds; alignment as in `write_u16`.
        unsafe {
            if word.is_aligned() {
                ptr::read_volatile(word)
            } else {
                u16::from_ne_bytes(Self::read_bytes(ptr))
            }
        }
    }

    fn read_u32(&self, offset: usize) -> u32 {
        let Some(ptr) = self.at(offset, 4) else {
            return 0;
        };
        let word = ptr.cast::<u32>();
        // SAFETY: `at` checked the bounds; alignment as in `write_u16`.
        unsafe {
            if word.is_aligned() {
                ptr::read_volatile(word)
            } else {
                u32::from_ne_bytes(Self::read_bytes(ptr))
            }
        }
    }
}
