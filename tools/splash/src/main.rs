//! `splash` boot splash daemon.
//!
//! Start-up order: logging, theme, signals, console, framebuffer, FIFO, then
//! the first frame. Teardown runs through `Drop` in reverse.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use splash_fb::Rotation;

use splash::assets::{bar_frame, default_font, load_logo};
use splash::config::{self, MAX_FBDEV, Theme};
use splash::console::Console;
use splash::daemon::{self, Exit};
use splash::fbdev::Framebuffer;
use splash::fifo::CommandFifo;
use splash::logger;
use splash::scene::Scene;
use splash::signals::{self, SignalFd};

/// Boot splash screen for the Linux framebuffer.
#[derive(Parser)]
#[command(name = "splash", version, about)]
struct Cli {
    /// Draw on the current virtual terminal instead of switching to a free one.
    #[arg(long, short = 'n')]
    no_console_switch: bool,

    /// Display rotation in degrees: 0, 90, 180 or 270.
    #[arg(long, short = 'a', default_value_t = 0, allow_negative_numbers = true)]
    angle: i32,

    /// Framebuffer index: /dev/fb<N>.
    #[arg(
        long,
        short = 'f',
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_FBDEV))
    )]
    fbdev: u8,

    /// Exit after this many seconds; 0 waits forever.
    #[arg(long, short = 't', default_value_t = 0)]
    timeout: u64,

    /// Directory for the command FIFO.
    #[arg(long)]
    fifo_dir: Option<PathBuf>,

    /// TOML theme file overriding the built-in colors and layout.
    #[arg(long)]
    theme: Option<PathBuf>,

    /// Log more; repeat for debug and trace output.
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    match run(&cli) {
        Ok(exit) => {
            info!("done: {exit:?}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<Exit> {
    let theme = match &cli.theme {
        Some(path) => Theme::load(path)?,
        None => Theme::default(),
    };
    let frame = bar_frame(&theme).context("Failed to build progress bar frame")?;
    let logo = theme.logo.as_ref().map(load_logo).transpose()?;
    let font = default_font();
    debug!("using built-in font {}", font.as_font().name());
    let mut scene = Scene::new(theme, font, frame).with_logo(logo);

    let rotation = Rotation::from_degrees(cli.angle);
    if rotation.degrees() != cli.angle.unsigned_abs() {
        warn!("unsupported angle {}, using 0", cli.angle);
    }

    // Signals are blocked before the console hands us SIGUSR1 as its switch
    // signal, and before anything that a termination signal could interrupt
    // without running `Drop`. Dropped last: FIFO, framebuffer, console, then
    // the signal mask.
    let signals = SignalFd::new(&signals::HANDLED).context("Failed to set up signal handling")?;

    let mut console = if cli.no_console_switch {
        None
    } else {
        match Console::switch() {
            Ok(console) => Some(console),
            Err(e) => {
                warn!("cannot switch console: {e}");
                None
            }
        }
    };

    let device = config::device_path(cli.fbdev);
    let mut fb = Framebuffer::open(&device, rotation)
        .with_context(|| format!("Failed to open framebuffer {}", device.display()))?;
    debug!("mapped {} bytes of {}", fb.mapped_len(), device.display());

    let fifo_dir = config::fifo_dir(cli.fifo_dir.clone(), |key| std::env::var_os(key));
    let mut fifo = CommandFifo::create(&fifo_dir)
        .with_context(|| format!("Failed to create command FIFO in {}", fifo_dir.display()))?;
    info!("listening on {}", fifo.path().display());

    let canvas = fb.canvas_mut();
    scene.draw(canvas);

    let timeout = (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout));
    daemon::run(
        canvas,
        &mut scene,
        &mut fifo,
        &signals,
        console.as_mut(),
        timeout,
    )
}
