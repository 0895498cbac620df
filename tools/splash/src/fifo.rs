//! The named pipe commands arrive on.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::FIFO_NAME;

/// Permissions of a newly created FIFO: owner and group may read and write.
const FIFO_MODE: libc::mode_t = 0o660;

/// The daemon's end of the command FIFO.
///
/// The FIFO is opened non-blocking for reading. When the last writer goes
/// away reads return end-of-file until the FIFO is reopened. The FIFO is
/// removed from the file system on drop.
#[derive(Debug)]
pub struct CommandFifo {
    path: PathBuf,
    file: File,
}

impl CommandFifo {
    /// Creates (or reuses) the FIFO in `dir` and opens it for reading.
    pub fn create(dir: &Path) -> io::Result<Self> {
        let path = dir.join(FIFO_NAME);
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: `c_path` is a valid NUL-terminated string.
        if unsafe { libc::mkfifo(c_path.as_ptr(), FIFO_MODE) } != 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::AlreadyExists {
                return Err(err);
            }
            debug!("reusing existing {}", path.display());
        }

        let file = open_reader(&path)?;
        Ok(Self { path, file })
    }

    /// Location of the FIFO.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reopens the read end after the last writer closed it.
    pub fn reopen(&mut self) -> io::Result<()> {
        self.file = open_reader(&self.path)?;
        Ok(())
    }

    /// Reads whatever is available. `Ok(0)` means end-of-file.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl AsRawFd for CommandFifo {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl Drop for CommandFifo {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("cannot remove {}: {e}", self.path.display());
        }
    }
}

fn open_reader(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

/// Writes `command` plus a NUL terminator to the FIFO at `path`.
///
/// The FIFO is opened non-blocking, so this fails immediately when no daemon
/// is reading.
pub fn send(path: &Path, command: &str) -> io::Result<()> {
    let mut fifo = OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)?;
    let mut message = Vec::with_capacity(command.len() + 1);
    message.extend_from_slice(command.as_bytes());
    message.push(0);
    fifo.write_all(&message)
}
