//! Synchronous signal delivery through `signalfd`.
//!
//! The handled signals are blocked for the calling thread and read from a
//! descriptor that the command loop polls next to the FIFO, so no code runs
//! in signal context and no global state is needed.

use std::io;
use std::mem::{self, MaybeUninit};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;

use libc::{c_int, sigset_t};

/// Signals the daemon handles: termination requests plus `SIGUSR1` for
/// console switch requests.
pub const HANDLED: [c_int; 5] = [
    libc::SIGHUP,
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGTERM,
    libc::SIGUSR1,
];

/// Returns `true` if `signal` asks the daemon to exit.
pub fn is_termination(signal: c_int) -> bool {
    matches!(
        signal,
        libc::SIGHUP | libc::SIGINT | libc::SIGQUIT | libc::SIGTERM
    )
}

/// A non-blocking `signalfd` for a set of blocked signals.
///
/// Dropping it restores the previous signal mask.
pub struct SignalFd {
    fd: OwnedFd,
    previous: sigset_t,
}

impl SignalFd {
    /// Blocks `signals` and opens a descriptor that reports them.
    pub fn new(signals: &[c_int]) -> io::Result<Self> {
        let set = signal_set(signals)?;
        let mut previous = MaybeUninit::<sigset_t>::uninit();

        // SAFETY: both sets are valid for the duration of the call.
        let ret = unsafe {
            libc::pthread_sigmask(libc::SIG_BLOCK, &raw const set, previous.as_mut_ptr())
        };
        if ret != 0 {
            return Err(io::Error::from_raw_os_error(ret));
        }
        // SAFETY: pthread_sigmask succeeded and wrote the old mask.
        let previous = unsafe { previous.assume_init() };

        // SAFETY: `set` is initialised; -1 asks for a new descriptor.
        let fd =
            unsafe { libc::signalfd(-1, &raw const set, libc::SFD_NONBLOCK | libc::SFD_CLOEXEC) };
        if fd < 0 {
            let err = io::Error::last_os_error();
            restore(&previous);
            return Err(err);
        }

        Ok(Self {
            // SAFETY: `fd` was just returned by signalfd and is owned by nobody
            // else.
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
            previous,
        })
    }

    /// Reads the next pending signal, or `None` if none is pending.
    pub fn read(&self) -> io::Result<Option<c_int>> {
        // SAFETY: an all-zero `signalfd_siginfo` is a valid value.
        let mut info: libc::signalfd_siginfo = unsafe { mem::zeroed() };
        let size = mem::size_of::<libc::signalfd_siginfo>();
        // SAFETY: `info` is valid for writes of `size` bytes.
        let n = unsafe { libc::read(self.fd.as_raw_fd(), (&raw mut info).cast(), size) };
        if n < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::WouldBlock => Ok(None),
                _ => Err(err),
            };
        }
        if usize::try_from(n).ok() != Some(size) {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short signalfd read"));
        }
        c_int::try_from(info.ssi_signo)
            .map(Some)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "signal number out of range"))
    }
}

impl AsRawFd for SignalFd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl Drop for SignalFd {
    fn drop(&mut self) {
        restore(&self.previous);
    }
}

fn signal_set(signals: &[c_int]) -> io::Result<sigset_t> {
    let mut set = MaybeUninit::<sigset_t>::uninit();
    // SAFETY: sigemptyset initialises the set.
    unsafe { libc::sigemptyset(set.as_mut_ptr()) };
    // SAFETY: initialised above.
    let mut set = unsafe { set.assume_init() };
    for &signal in signals {
        // SAFETY: `set` is a valid, initialised set.
        if unsafe { libc::sigaddset(&raw mut set, signal) } != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(set)
}

fn restore(mask: &sigset_t) {
    // SAFETY: `mask` is a valid set; the old mask is not requested.
    unsafe { libc::pthread_sigmask(libc::SIG_SETMASK, mask, ptr::null_mut()) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_signals() {
        for signal in [libc::SIGHUP, libc::SIGINT, libc::SIGQUIT, libc::SIGTERM] {
            assert!(is_termination(signal));
            assert!(HANDLED.contains(&signal));
        }
        assert!(!is_termination(libc::SIGUSR1));
    }

    #[test]
    fn raised_signal_is_read_back() {
        let signals = SignalFd::new(&[libc::SIGUSR2]).unwrap();
        assert_eq!(signals.read().unwrap(), None);

        // SAFETY: SIGUSR2 is blocked for this thread, so it stays pending
        // instead of being delivered.
        assert_eq!(unsafe { libc::pthread_kill(libc::pthread_self(), libc::SIGUSR2) }, 0);

        assert_eq!(signals.read().unwrap(), Some(libc::SIGUSR2));
        assert_eq!(signals.read().unwrap(), None);
    }

    fn blocked(signal: c_int) -> bool {
        let mut current = MaybeUninit::<sigset_t>::uninit();
        // SAFETY: only the current mask is requested, into valid storage.
        let ret =
            unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, ptr::null(), current.as_mut_ptr()) };
        assert_eq!(ret, 0);
        // SAFETY: pthread_sigmask wrote the current mask.
        let current = unsafe { current.assume_init() };
        // SAFETY: `current` is initialised.
        unsafe { libc::sigismember(&raw const current, signal) == 1 }
    }

    #[test]
    fn handled_signals_stay_blocked_while_open() {
        // Test threads start with nothing blocked.
        assert!(HANDLED.iter().all(|&signal| !blocked(signal)));

        let signals = SignalFd::new(&HANDLED).unwrap();
        assert!(HANDLED.iter().all(|&signal| blocked(signal)));

        // The console's switch signal queues up rather than killing us.
        // SAFETY: SIGUSR1 is blocked for this thread and consumed below.
        assert_eq!(unsafe { libc::pthread_kill(libc::pthread_self(), libc::SIGUSR1) }, 0);
        assert_eq!(signals.read().unwrap(), Some(libc::SIGUSR1));

        drop(signals);
        assert!(HANDLED.iter().all(|&signal| !blocked(signal)));
    }

    #[test]
    fn invalid_signal_is_rejected() {
        assert!(SignalFd::new(&[0x4000]).is_err());
    }
}
