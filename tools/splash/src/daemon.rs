//! The command loop.
//!
//! One `poll` waits on the command FIFO and the signal descriptor. Commands
//! are applied in the order they arrive; while the console is switched away
//! they only update the scene, which is repainted in full once the display
//! comes back.

use std::io;
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use libc::{c_int, nfds_t, pollfd};
use log::{debug, info, trace};
use splash_fb::{Canvas, PixelBuffer};

use crate::command::{COMMAND_BUFFER_SIZE, Command, CommandBuffer};
use crate::console::{Console, Visibility};
use crate::fifo::CommandFifo;
use crate::scene::Scene;
use crate::signals::{SignalFd, is_termination};

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// A `QUIT` command arrived.
    Quit,
    /// A termination signal arrived.
    Signal(c_int),
    /// Nothing asked us to stop before the timeout.
    Timeout,
}

/// Runs until `QUIT`, a termination signal or `timeout`.
///
/// The caller draws the initial screen. `console` is `None` when the
/// daemon runs on the current terminal; drawing is then never suspended.
///
/// # Errors
///
/// Fails when polling, reading a signal or reopening the FIFO fails.
pub fn run<B: PixelBuffer>(
    canvas: &mut Canvas<B>,
    scene: &mut Scene,
    fifo: &mut CommandFifo,
    signals: &SignalFd,
    mut console: Option<&mut Console>,
    timeout: Option<Duration>,
) -> Result<Exit> {
    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    let mut commands = CommandBuffer::new();
    let mut buf = [0u8; COMMAND_BUFFER_SIZE];

    loop {
        let wait = match deadline {
            None => -1,
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    info!("timed out");
                    return Ok(Exit::Timeout);
                }
                c_int::try_from(left.as_micros().div_ceil(1000)).unwrap_or(c_int::MAX)
            }
        };

        let mut fds = [
            pollfd {
                fd: fifo.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
            pollfd {
                fd: signals.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];
        // SAFETY: `fds` is a valid array of `fds.len()` entries.
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as nfds_t, wait) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err).context("Failed to poll for commands");
        }
        if ready == 0 {
            continue;
        }

        if fds[1].revents & libc::POLLIN != 0 {
            while let Some(signal) = signals.read().context("Failed to read signal")? {
                if is_termination(signal) {
                    info!("exiting on signal {signal}");
                    return Ok(Exit::Signal(signal));
                }
                if signal == libc::SIGUSR1 {
                    if let Some(console) = console.as_deref_mut() {
                        match console.handle_release_request() {
                            Visibility::Released => debug!("console released"),
                            Visibility::Acquired => {
                                debug!("console acquired, repainting");
                                scene.draw(canvas);
                            }
                        }
                    }
                }
            }
        }

        if fds[0].revents & (libc::POLLIN | libc::POLLHUP) != 0 {
            let n = match fifo.read(&mut buf) {
                Ok(n) => n,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => return Err(e).context("Failed to read command FIFO"),
            };
            if n == 0 {
                trace!("last writer closed {}", fifo.path().display());
                fifo.reopen()
                    .with_context(|| format!("Failed to reopen {}", fifo.path().display()))?;
                continue;
            }

            let visible = console.as_deref().is_none_or(Console::is_visible);
            for command in commands.extend(&buf[..n]) {
                if command == Command::Quit {
                    info!("quit requested");
                    return Ok(Exit::Quit);
                }
                if visible {
                    scene.apply(canvas, &command);
                } else {
                    scene.update(&command);
                }
            }
        }
    }
}
