//! Thin wrappers over the raw `ioctl` calls the daemon issues.

use std::io;
use std::os::fd::RawFd;

use libc::{c_int, c_ulong};

// Framebuffer (linux/fb.h).
pub const FBIOGET_VSCREENINFO: c_ulong = 0x4600;
pub const FBIOPUT_VSCREENINFO: c_ulong = 0x4601;
pub const FBIOGET_FSCREENINFO: c_ulong = 0x4602;

// Virtual terminals (linux/vt.h).
pub const VT_OPENQRY: c_ulong = 0x5600;
pub const VT_GETMODE: c_ulong = 0x5601;
pub const VT_SETMODE: c_ulong = 0x5602;
pub const VT_GETSTATE: c_ulong = 0x5603;
pub const VT_RELDISP: c_ulong = 0x5605;
pub const VT_ACTIVATE: c_ulong = 0x5606;
pub const VT_WAITACTIVE: c_ulong = 0x5607;
pub const VT_DISALLOCATE: c_ulong = 0x5608;

pub const VT_AUTO: libc::c_char = 0;
pub const VT_PROCESS: libc::c_char = 1;
pub const VT_ACKACQ: c_ulong = 2;

// Console display mode (linux/kd.h).
pub const KDSETMODE: c_ulong = 0x4B3A;
pub const KD_TEXT: c_ulong = 0;
pub const KD_GRAPHICS: c_ulong = 1;

fn check(ret: c_int) -> io::Result<c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// `ioctl` whose argument points at a `T`.
///
/// # Safety
///
/// `request` must read or write exactly one `T` through its argument.
pub unsafe fn ioctl_ptr<T>(fd: RawFd, request: c_ulong, arg: *mut T) -> io::Result<c_int> {
    // SAFETY: guaranteed by the caller.
    check(unsafe { libc::ioctl(fd, request as _, arg) })
}

/// `ioctl` whose argument is passed by value.
pub fn ioctl_val(fd: RawFd, request: c_ulong, arg: c_ulong) -> io::Result<c_int> {
    // SAFETY: value-argument requests do not dereference `arg`; an invalid
    // `fd` only produces `EBADF`.
    check(unsafe { libc::ioctl(fd, request as _, arg) })
}
