//! Runtime configuration: the theme, the command FIFO location and the
//! framebuffer device path.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer};
use splash_fb::Color;

use crate::scene::BAR_BORDER;

/// File name of the command FIFO.
pub const FIFO_NAME: &str = "psplash_fifo";

/// Environment variable naming the FIFO directory.
pub const FIFO_DIR_ENV: &str = "PSPLASH_FIFO_DIR";

/// FIFO directory used when nothing else is configured.
pub const DEFAULT_FIFO_DIR: &str = "/run";

/// Highest framebuffer index accepted on the command line.
pub const MAX_FBDEV: u8 = 9;

// ---------------------------------------------------------------------------
// Theme
// ---------------------------------------------------------------------------

/// Colors and layout of the splash screen.
///
/// Every field is optional in a theme file; missing ones keep their default.
///
/// ```toml
/// background = "#ecece1"
/// text = "#6d6d70"
/// split-numerator = 5
/// split-denominator = 6
/// startup-message = "Booting"
///
/// [logo]
/// path = "logo.rgba"
/// width = 300
/// height = 120
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Theme {
    /// Screen background.
    #[serde(deserialize_with = "hex_color")]
    pub background: Color,
    /// Message text.
    #[serde(deserialize_with = "hex_color")]
    pub text: Color,
    /// Filled part of the progress bar, and its frame.
    #[serde(deserialize_with = "hex_color")]
    pub bar: Color,
    /// Empty part of the progress bar.
    #[serde(deserialize_with = "hex_color")]
    pub bar_background: Color,
    /// The split line sits at `numerator / denominator` of the screen height.
    pub split_numerator: u32,
    /// See [`split_numerator`](Self::split_numerator).
    pub split_denominator: u32,
    /// Outer width of the progress bar frame.
    pub bar_width: u32,
    /// Outer height of the progress bar frame.
    pub bar_height: u32,
    /// Image centred in the area above the split line.
    pub logo: Option<LogoConfig>,
    /// Text centred in the area above the split line, below the logo if
    /// there is one.
    pub title: Option<String>,
    /// Message shown before the first `MSG` command.
    pub startup_message: Option<String>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::from_rgb32(0x00ec_ece1),
            text: Color::from_rgb32(0x006d_6d70),
            bar: Color::from_rgb32(0x006d_6d70),
            bar_background: Color::from_rgb32(0x00ec_ece1),
            split_numerator: 5,
            split_denominator: 6,
            bar_width: 400,
            bar_height: 26,
            logo: None,
            title: None,
            startup_message: None,
        }
    }
}

/// Where the logo comes from and how it is placed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct LogoConfig {
    /// Raw RGBA file, row by row. Relative paths are resolved against the
    /// theme file's directory.
    pub path: PathBuf,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Centre on the whole screen instead of the area above the split line.
    #[serde(default)]
    pub fullscreen: bool,
}

impl Theme {
    /// Loads and validates a theme file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut theme = Self::from_toml(&content)
            .with_context(|| format!("Invalid theme {}", path.display()))?;
        if let (Some(logo), Some(dir)) = (theme.logo.as_mut(), path.parent()) {
            logo.path = dir.join(&logo.path);
        }
        Ok(theme)
    }

    /// Parses and validates a theme from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let theme: Self = toml::from_str(content).context("Failed to parse theme")?;
        theme.validate()?;
        Ok(theme)
    }

    /// Checks the layout values.
    pub fn validate(&self) -> Result<()> {
        if self.split_denominator == 0 {
            bail!("split-denominator must not be zero");
        }
        if self.split_numerator > self.split_denominator {
            bail!(
                "split-numerator ({}) exceeds split-denominator ({})",
                self.split_numerator,
                self.split_denominator
            );
        }
        if let Some(logo) = &self.logo {
            if logo.width == 0 || logo.height == 0 {
                bail!("logo size {}x{} is empty", logo.width, logo.height);
            }
        }
        let min = 2 * BAR_BORDER + 1;
        if self.bar_width < min || self.bar_height < min {
            bail!(
                "bar frame {}x{} is smaller than {min}x{min}",
                self.bar_width,
                self.bar_height
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

/// A malformed color string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid color {:?}: expected #rrggbb", self.0)
    }
}

impl std::error::Error for ParseColorError {}

/// Parses `#rrggbb`, `0xrrggbb` or bare `rrggbb`.
pub fn parse_color(s: &str) -> Result<Color, ParseColorError> {
    let digits = s
        .strip_prefix('#')
        .or_else(|| s.strip_prefix("0x"))
        .unwrap_or(s);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseColorError(s.to_string()));
    }
    u32::from_str_radix(digits, 16)
        .map(Color::from_rgb32)
        .map_err(|_| ParseColorError(s.to_string()))
}

fn hex_color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Color, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse_color(&s).map_err(serde::de::Error::custom)
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Resolves the FIFO directory.
///
/// An explicit directory wins, then `$PSPLASH_FIFO_DIR`, then `$TMPDIR`, then
/// [`DEFAULT_FIFO_DIR`]. Empty variables are ignored.
pub fn fifo_dir(explicit: Option<PathBuf>, env: impl Fn(&str) -> Option<OsString>) -> PathBuf {
    explicit
        .or_else(|| {
            [FIFO_DIR_ENV, "TMPDIR"]
                .into_iter()
                .filter_map(&env)
                .find(|value| !value.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FIFO_DIR))
}

/// Path of framebuffer `index`; anything outside `1..=9` means `/dev/fb0`.
pub fn device_path(index: u8) -> PathBuf {
    match index {
        1..=MAX_FBDEV => PathBuf::from(format!("/dev/fb{index}")),
        _ => PathBuf::from("/dev/fb0"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<OsString> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| OsString::from(*v))
        }
    }

    #[test]
    fn default_theme_is_valid() {
        let theme = Theme::default();
        theme.validate().unwrap();
        assert_eq!(theme.background, Color::new(0xec, 0xec, 0xe1));
        assert_eq!(theme.text, Color::new(0x6d, 0x6d, 0x70));
        assert_eq!((theme.bar_width, theme.bar_height), (400, 26));
    }

    #[test]
    fn theme_file_overrides_fields() {
        let theme = Theme::from_toml(
            r##"
            background = "#000000"
            bar = "0xff8000"
            split-numerator = 1
            split-denominator = 2
            startup-message = "Booting"
            "##,
        )
        .unwrap();
        assert_eq!(theme.background, Color::BLACK);
        assert_eq!(theme.bar, Color::new(0xff, 0x80, 0x00));
        assert_eq!(theme.text, Theme::default().text);
        assert_eq!((theme.split_numerator, theme.split_denominator), (1, 2));
        assert_eq!(theme.startup_message.as_deref(), Some("Booting"));
    }

    #[test]
    fn logo_table_is_optional_and_relative_to_theme() {
        let theme = Theme::from_toml(
            r#"
            [logo]
            path = "art/logo.rgba"
            width = 64
            height = 32
            "#,
        )
        .unwrap();
        let logo = theme.logo.unwrap();
        assert_eq!((logo.width, logo.height, logo.fullscreen), (64, 32, false));
        assert!(Theme::from_toml("[logo]\npath = \"x\"").is_err());
        assert!(Theme::from_toml("[logo]\npath = \"x\"\nwidth = 0\nheight = 4").is_err());

        let dir = std::env::temp_dir().join(format!("splash-{}-theme", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("theme.toml");
        std::fs::write(
            &file,
            "[logo]\npath = \"logo.rgba\"\nwidth = 1\nheight = 1\nfullscreen = true\n",
        )
        .unwrap();
        let logo = Theme::load(&file).unwrap().logo.unwrap();
        assert_eq!(logo.path, dir.join("logo.rgba"));
        assert!(logo.fullscreen);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn theme_rejects_bad_values() {
        assert!(Theme::from_toml("background = \"#12345\"").is_err());
        assert!(Theme::from_toml("colour = \"#123456\"").is_err());
        assert!(Theme::from_toml("split-denominator = 0").is_err());
        assert!(Theme::from_toml("split-numerator = 7").is_err());
        assert!(Theme::from_toml("bar-height = 8").is_err());
    }

    #[test]
    fn colors_parse_with_and_without_prefix() {
        assert_eq!(parse_color("#0a0b0c"), Ok(Color::new(0x0a, 0x0b, 0x0c)));
        assert_eq!(parse_color("0xECECE1"), Ok(Color::new(0xec, 0xec, 0xe1)));
        assert_eq!(parse_color("ffffff"), Ok(Color::WHITE));
        assert!(parse_color("#+12345").is_err());
        assert!(parse_color("").is_err());
    }

    #[test]
    fn fifo_dir_precedence() {
        let all = [(FIFO_DIR_ENV, "/run/splash"), ("TMPDIR", "/tmp")];
        assert_eq!(
            fifo_dir(Some(PathBuf::from("/x")), env(&all)),
            PathBuf::from("/x")
        );
        assert_eq!(fifo_dir(None, env(&all)), PathBuf::from("/run/splash"));
        assert_eq!(fifo_dir(None, env(&[("TMPDIR", "/tmp")])), PathBuf::from("/tmp"));
        assert_eq!(
            fifo_dir(None, env(&[(FIFO_DIR_ENV, ""), ("TMPDIR", "/var/tmp")])),
            PathBuf::from("/var/tmp")
        );
        assert_eq!(fifo_dir(None, env(&[])), PathBuf::from(DEFAULT_FIFO_DIR));
    }

    #[test]
    fn device_index_selects_node() {
        assert_eq!(device_path(0), PathBuf::from("/dev/fb0"));
        assert_eq!(device_path(3), PathBuf::from("/dev/fb3"));
        assert_eq!(device_path(9), PathBuf::from("/dev/fb9"));
        assert_eq!(device_path(10), PathBuf::from("/dev/fb0"));
    }
}
