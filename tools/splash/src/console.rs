//! Virtual terminal ownership.
//!
//! [`Console::switch`] moves the display to a free virtual terminal, puts it
//! in graphics mode and asks the kernel to deliver `SIGUSR1` whenever someone
//! wants to switch away or back. Those requests are answered through
//! [`Console::handle_release_request`]. Dropping the console restores text
//! mode, switches back to the terminal that was active before and frees the
//! one we took.
//!
//! Only opening a terminal can fail; every later step logs and carries on.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use libc::{c_char, c_short, c_ulong, c_ushort};
use log::{debug, info, warn};

use crate::sys;

/// `struct vt_mode`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
#[allow(dead_code)] // Round-tripped through VT_GETMODE/VT_SETMODE.
struct VtMode {
    mode: c_char,
    waitv: c_char,
    relsig: c_short,
    acqsig: c_short,
    frsig: c_short,
}

/// `struct vt_stat`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
#[allow(dead_code)] // Filled by the kernel.
struct VtStat {
    v_active: c_ushort,
    v_signal: c_ushort,
    v_state: c_ushort,
}

/// Outcome of a display switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// The display was handed to another terminal; stop drawing.
    Released,
    /// The display is ours again; everything must be redrawn.
    Acquired,
}

/// A virtual terminal owned by the daemon.
#[derive(Debug)]
pub struct Console {
    tty: Option<File>,
    vt: u32,
    initial_vt: Option<c_ushort>,
    visible: bool,
}

impl Console {
    /// Takes over the next free virtual terminal.
    ///
    /// # Errors
    ///
    /// Fails if `/dev/tty0` cannot be opened, no terminal is free or the free
    /// terminal cannot be opened. Nothing has been changed in that case.
    pub fn switch() -> io::Result<Self> {
        let vt = {
            let tty0 = OpenOptions::new().write(true).open("/dev/tty0")?;
            let mut vt: libc::c_int = -1;
            // SAFETY: VT_OPENQRY stores one `int`.
            unsafe { sys::ioctl_ptr(tty0.as_raw_fd(), sys::VT_OPENQRY, &raw mut vt)? };
            u32::try_from(vt).map_err(|_| io::Error::other("no free virtual terminal"))?
        };

        let path = format!("/dev/tty{vt}");
        let tty = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NDELAY)
            .open(&path)?;
        let fd = tty.as_raw_fd();

        let initial_vt = get_state(fd).ok().map(|state| state.v_active);
        debug!("switching from vt {initial_vt:?} to {path}");

        // Switch without interference, then take over switch handling.
        set_mode(fd, sys::VT_AUTO, 0);
        if let Err(e) = sys::ioctl_val(fd, sys::VT_ACTIVATE, c_ulong::from(vt)) {
            warn!("VT_ACTIVATE failed: {e}");
        }
        if let Err(e) = sys::ioctl_val(fd, sys::VT_WAITACTIVE, c_ulong::from(vt)) {
            warn!("VT_WAITACTIVE failed: {e}");
        }
        #[allow(clippy::cast_possible_truncation)]
        set_mode(fd, sys::VT_PROCESS, libc::SIGUSR1 as c_short);

        if let Err(e) = sys::ioctl_val(fd, sys::KDSETMODE, sys::KD_GRAPHICS) {
            warn!("KDSETMODE KD_GRAPHICS failed: {e}");
        }
        info!("using {path}");

        Ok(Self {
            tty: Some(tty),
            vt,
            initial_vt,
            visible: true,
        })
    }

    /// The terminal number in use.
    pub fn vt(&self) -> u32 {
        self.vt
    }

    /// Returns `true` while our terminal is on screen.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Acknowledges a pending switch request, signalled by `SIGUSR1`.
    ///
    /// Requests alternate: while visible the display is released, otherwise
    /// it is acquired again.
    pub fn handle_release_request(&mut self) -> Visibility {
        let Some(fd) = self.fd() else {
            return Visibility::Acquired;
        };
        if self.visible {
            if let Err(e) = sys::ioctl_val(fd, sys::VT_RELDISP, 1) {
                warn!("cannot switch away from console: {e}");
            }
            self.visible = false;
            Visibility::Released
        } else {
            if let Err(e) = sys::ioctl_val(fd, sys::VT_RELDISP, sys::VT_ACKACQ) {
                warn!("cannot acknowledge console switch: {e}");
            }
            self.visible = true;
            Visibility::Acquired
        }
    }

    fn fd(&self) -> Option<RawFd> {
        self.tty.as_ref().map(AsRawFd::as_raw_fd)
    }

    fn reset(&mut self) {
        let Some(tty) = self.tty.take() else {
            return;
        };
        let fd = tty.as_raw_fd();

        if let Err(e) = sys::ioctl_val(fd, sys::KDSETMODE, sys::KD_TEXT) {
            debug!("KDSETMODE KD_TEXT failed: {e}");
        }
        set_mode(fd, sys::VT_AUTO, 0);

        // Only switch back if nobody else has switched away from us.
        let active = get_state(fd).ok().map(|state| u32::from(state.v_active));
        if active == Some(self.vt) {
            if let Some(initial) = self.initial_vt.take() {
                let _ = sys::ioctl_val(fd, sys::VT_ACTIVATE, c_ulong::from(initial));
                let _ = sys::ioctl_val(fd, sys::VT_WAITACTIVE, c_ulong::from(initial));
            }
        }

        // The terminal must be closed before it can be deallocated.
        drop(tty);
        match OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NDELAY)
            .open("/dev/tty0")
        {
            Ok(tty0) => {
                if let Err(e) =
                    sys::ioctl_val(tty0.as_raw_fd(), sys::VT_DISALLOCATE, c_ulong::from(self.vt))
                {
                    debug!("VT_DISALLOCATE {} failed: {e}", self.vt);
                }
            }
            Err(e) => debug!("cannot reopen /dev/tty0: {e}"),
        }
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.reset();
    }
}

fn get_state(fd: RawFd) -> io::Result<VtStat> {
    let mut state = VtStat::default();
    // SAFETY: VT_GETSTATE fills one `vt_stat`.
    unsafe { sys::ioctl_ptr(fd, sys::VT_GETSTATE, &raw mut state)? };
    Ok(state)
}

/// Sets the switching mode and its release/acquire signal.
fn set_mode(fd: RawFd, mode: c_char, signal: c_short) {
    let mut vt_mode = VtMode::default();
    // SAFETY: VT_GETMODE fills one `vt_mode`.
    if let Err(e) = unsafe { sys::ioctl_ptr(fd, sys::VT_GETMODE, &raw mut vt_mode) } {
        warn!("VT_GETMODE failed: {e}");
        return;
    }
    vt_mode.mode = mode;
    vt_mode.relsig = signal;
    vt_mode.acqsig = signal;
    // SAFETY: VT_SETMODE reads one `vt_mode`.
    if let Err(e) = unsafe { sys::ioctl_ptr(fd, sys::VT_SETMODE, &raw mut vt_mode) } {
        warn!("VT_SETMODE failed: {e}");
    }
}
