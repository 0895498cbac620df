//! Boot splash daemon.
//!
//! The daemon takes over a free virtual terminal, maps the framebuffer, draws
//! a background and a progress bar, then listens on a named pipe for
//! `PROGRESS`, `MSG` and `QUIT` commands until it is told to stop, receives a
//! termination signal or times out. Rendering itself lives in [`splash_fb`];
//! this crate owns the operating system side.
//!
//! The `splash-write` binary in this package is the matching client.

pub mod assets;
pub mod command;
pub mod config;
pub mod console;
pub mod daemon;
pub mod fbdev;
pub mod fifo;
pub mod logger;
pub mod scene;
pub mod signals;

mod sys;
