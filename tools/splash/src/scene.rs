//! Screen layout: background, logo, title, progress bar and message line.
//!
//! The screen is divided by a horizontal split line. The message sits just
//! above it and the progress bar frame hangs just below it, both centred
//! horizontally. The optional logo is centred in the area above the line, or
//! on the whole screen when the theme asks for it. The optional title goes
//! under the logo, or in the middle of the upper area without one.
//!
//! [`Scene`] keeps the last progress value and message so the whole screen
//! can be repainted, for example after the console comes back.

use splash_fb::{Canvas, OwnedFont, PixelBuffer};

use crate::assets::EncodedImage;
use crate::command::{Command, PROGRESS_MAX};
use crate::config::Theme;

/// Gap between the frame's outer edge and the bar inside it.
pub const BAR_BORDER: u32 = 4;

/// What is on screen.
#[derive(Debug)]
pub struct Scene {
    theme: Theme,
    font: OwnedFont,
    frame: EncodedImage,
    logo: Option<EncodedImage>,
    progress: i32,
    message: Option<String>,
    /// Height of the strip the last message occupied.
    message_height: u32,
}

impl Scene {
    /// Creates a scene showing no progress and the theme's startup message.
    pub fn new(theme: Theme, font: OwnedFont, frame: EncodedImage) -> Self {
        let message = theme.startup_message.clone();
        Self {
            theme,
            font,
            frame,
            logo: None,
            progress: 0,
            message,
            message_height: 0,
        }
    }

    /// Sets the image drawn above the split line.
    #[must_use]
    pub fn with_logo(mut self, logo: Option<EncodedImage>) -> Self {
        self.logo = logo;
        self
    }

    /// The theme in use.
    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Last progress value, in percent.
    pub fn progress(&self) -> i32 {
        self.progress
    }

    /// Last message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The y coordinate of the split line on a screen `height` pixels tall.
    pub fn split_line(&self, height: u32) -> i32 {
        let height = i64::from(height);
        let num = i64::from(self.theme.split_numerator);
        let den = i64::from(self.theme.split_denominator).max(1);
        coord(height - (den - num) * height / den)
    }

    /// Records the effect of `command` without drawing.
    ///
    /// `QUIT` changes nothing.
    pub fn update(&mut self, command: &Command) {
        match command {
            Command::Progress(value) => {
                self.progress = (*value).clamp(-PROGRESS_MAX, PROGRESS_MAX);
            }
            Command::Msg(text) => self.message = Some(text.clone()),
            Command::Quit => {}
        }
    }

    /// Records `command` and draws the part of the screen it changes.
    pub fn apply<B: PixelBuffer>(&mut self, canvas: &mut Canvas<B>, command: &Command) {
        self.update(command);
        match command {
            Command::Progress(_) => self.draw_progress(canvas),
            Command::Msg(_) => self.draw_message(canvas),
            Command::Quit => {}
        }
    }

    /// Paints the whole screen from the recorded state.
    pub fn draw<B: PixelBuffer>(&mut self, canvas: &mut Canvas<B>) {
        canvas.clear(self.theme.background);
        self.message_height = 0;
        let logo_bottom = self.draw_logo(canvas);
        self.draw_title(canvas, logo_bottom);

        let x = centred(canvas.width(), self.frame.width());
        canvas.draw_image(x, self.split_line(canvas.height()), &self.frame.image());

        self.draw_progress(canvas);
        self.draw_message(canvas);
    }

    /// Top-left corner of the logo on `canvas`.
    pub fn logo_origin<B: PixelBuffer>(&self, canvas: &Canvas<B>) -> Option<(i32, i32)> {
        let logo = self.logo.as_ref()?;
        let area = if self.theme.logo.as_ref().is_some_and(|config| config.fullscreen) {
            i64::from(canvas.height())
        } else {
            i64::from(canvas.height()) * i64::from(self.theme.split_numerator)
                / i64::from(self.theme.split_denominator).max(1)
        };
        Some((
            centred(canvas.width(), logo.width()),
            coord((area - i64::from(logo.height())) / 2),
        ))
    }

    /// Draws the logo and returns the row below it.
    fn draw_logo<B: PixelBuffer>(&self, canvas: &mut Canvas<B>) -> Option<i32> {
        let logo = self.logo.as_ref()?;
        let (x, y) = self.logo_origin(canvas)?;
        canvas.draw_image(x, y, &logo.image());
        Some(y + coord(i64::from(logo.height())))
    }

    fn draw_title<B: PixelBuffer>(&self, canvas: &mut Canvas<B>, logo_bottom: Option<i32>) {
        let Some(title) = &self.theme.title else {
            return;
        };
        let font = self.font.as_font();
        let (w, h) = font.text_size(title);
        let x = centred(canvas.width(), w);
        let y = if let Some(bottom) = logo_bottom {
            bottom + coord(i64::from(font.height() / 2))
        } else {
            // Leave one text line above the split for the message.
            let top = self.split_line(canvas.height()) - coord(i64::from(font.height()));
            (top - coord(i64::from(h))) / 2
        };
        canvas.draw_text(x, y, self.theme.text, &font, title);
    }

    fn draw_progress<B: PixelBuffer>(&self, canvas: &mut Canvas<B>) {
        let x = centred(canvas.width(), self.theme.bar_width) + coord(i64::from(BAR_BORDER));
        let y = self.split_line(canvas.height()) + coord(i64::from(BAR_BORDER));
        let width = self.theme.bar_width - 2 * BAR_BORDER;
        let height = self.theme.bar_height - 2 * BAR_BORDER;

        let filled = u32::try_from(
            i64::from(self.progress.unsigned_abs()) * i64::from(width) / i64::from(PROGRESS_MAX),
        )
        .unwrap_or(width)
        .min(width);
        let empty = width - filled;
        let (bar, background) = (self.theme.bar, self.theme.bar_background);

        if self.progress > 0 {
            canvas.draw_rect(x + coord(i64::from(filled)), y, empty, height, background);
            canvas.draw_rect(x, y, filled, height, bar);
        } else {
            canvas.draw_rect(x, y, empty, height, background);
            canvas.draw_rect(x + coord(i64::from(empty)), y, filled, height, bar);
        }
    }

    fn draw_message<B: PixelBuffer>(&mut self, canvas: &mut Canvas<B>) {
        let font = self.font.as_font();
        let text = self.message.as_deref().unwrap_or("");
        let (w, h) = font.text_size(text);
        let split = self.split_line(canvas.height());

        // A shorter message must also wipe the rows of the previous one.
        let strip = h.max(self.message_height);
        canvas.draw_rect(
            0,
            split - coord(i64::from(strip)),
            canvas.width(),
            strip,
            self.theme.background,
        );
        if !text.is_empty() {
            canvas.draw_text(
                centred(canvas.width(), w),
                split - coord(i64::from(h)),
                self.theme.text,
                &font,
                text,
            );
        }
        self.message_height = h;
    }
}

/// Left edge of an extent of `inner` pixels centred in `outer`.
fn centred(outer: u32, inner: u32) -> i32 {
    coord((i64::from(outer) - i64::from(inner)) / 2)
}

fn coord(value: i64) -> i32 {
    #[allow(clippy::cast_possible_truncation)]
    let value = value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{EncodedImage, bar_frame, default_font};
    use crate::config::LogoConfig;
    use splash_fb::{ChannelLayout, Color, Geometry, PixelFormat, Rotation};

    const W: u32 = 640;
    const H: u32 = 480;

    fn theme() -> Theme {
        Theme {
            background: Color::new(0xf0, 0xf0, 0xf0),
            text: Color::new(0x20, 0x20, 0x80),
            bar: Color::new(0x80, 0x20, 0x20),
            bar_background: Color::new(0xc0, 0xc0, 0xc0),
            ..Theme::default()
        }
    }

    fn scene(theme: Theme) -> Scene {
        let frame = bar_frame(&theme).unwrap();
        Scene::new(theme, default_font(), frame)
    }

    fn canvas(rotation: Rotation) -> Canvas<Vec<u8>> {
        let format = PixelFormat::resolve(32, ChannelLayout::RGB888);
        let geometry = Geometry::new(W, H, W * 4, 32, rotation);
        Canvas::new(vec![0; geometry.byte_len()], geometry, format)
    }

    /// Left edge and top of the bar inside the frame for the default layout.
    const BAR_X: i32 = (640 - 400) / 2 + 4;
    const BAR_Y: i32 = 400 + 4;
    const BAR_W: i32 = 400 - 8;

    fn count(canvas: &Canvas<Vec<u8>>, color: Color, rows: std::ops::Range<i32>) -> usize {
        rows.flat_map(|y| (0..W as i32).map(move |x| (x, y)))
            .filter(|&(x, y)| canvas.pixel(x, y) == Some(color))
            .count()
    }

    #[test]
    fn split_line_follows_ratio() {
        let mut theme = theme();
        assert_eq!(scene(theme.clone()).split_line(480), 400);
        theme.split_numerator = 1;
        theme.split_denominator = 2;
        assert_eq!(scene(theme.clone()).split_line(481), 241);
        theme.split_numerator = 2;
        assert_eq!(scene(theme).split_line(480), 480);
    }

    #[test]
    fn initial_screen() {
        let theme = theme();
        let mut scene = scene(theme.clone());
        let mut canvas = canvas(Rotation::Deg0);
        scene.draw(&mut canvas);

        assert_eq!(canvas.pixel(0, 0), Some(theme.background));
        assert_eq!(canvas.pixel(W as i32 - 1, H as i32 - 1), Some(theme.background));
        // Frame ring, then the empty bar.
        assert_eq!(canvas.pixel(320, 400), Some(theme.bar));
        assert_eq!(canvas.pixel(BAR_X, BAR_Y), Some(theme.bar_background));
        assert_eq!(canvas.pixel(BAR_X + BAR_W - 1, BAR_Y), Some(theme.bar_background));
        assert_eq!(count(&canvas, theme.text, 0..H as i32), 0);
    }

    #[test]
    fn positive_progress_fills_from_the_left() {
        let theme = theme();
        let mut scene = scene(theme.clone());
        let mut canvas = canvas(Rotation::Deg0);
        scene.draw(&mut canvas);
        scene.apply(&mut canvas, &Command::Progress(50));

        assert_eq!(scene.progress(), 50);
        assert_eq!(canvas.pixel(BAR_X, BAR_Y), Some(theme.bar));
        assert_eq!(canvas.pixel(BAR_X + 195, BAR_Y + 17), Some(theme.bar));
        assert_eq!(canvas.pixel(BAR_X + 196, BAR_Y), Some(theme.bar_background));
        // The frame ring adds two pixels on each side of every row.
        assert_eq!(count(&canvas, theme.bar, BAR_Y..BAR_Y + 18), (196 + 4) * 18);

        // Going back down empties the right part again.
        scene.apply(&mut canvas, &Command::Progress(25));
        assert_eq!(canvas.pixel(BAR_X + 98, BAR_Y), Some(theme.bar_background));
        assert_eq!(count(&canvas, theme.bar, BAR_Y..BAR_Y + 18), (98 + 4) * 18);
    }

    #[test]
    fn negative_progress_fills_from_the_right() {
        let theme = theme();
        let mut scene = scene(theme.clone());
        let mut canvas = canvas(Rotation::Deg0);
        scene.draw(&mut canvas);
        scene.apply(&mut canvas, &Command::Progress(-25));

        assert_eq!(canvas.pixel(BAR_X + BAR_W - 1, BAR_Y), Some(theme.bar));
        assert_eq!(canvas.pixel(BAR_X + BAR_W - 98, BAR_Y), Some(theme.bar));
        assert_eq!(canvas.pixel(BAR_X + BAR_W - 99, BAR_Y), Some(theme.bar_background));
        assert_eq!(canvas.pixel(BAR_X, BAR_Y), Some(theme.bar_background));
    }

    #[test]
    fn full_and_out_of_range_progress_stay_inside_the_frame() {
        let theme = theme();
        let mut scene = scene(theme.clone());
        let mut canvas = canvas(Rotation::Deg0);
        scene.draw(&mut canvas);
        scene.apply(&mut canvas, &Command::Progress(100_000));

        assert_eq!(scene.progress(), 100);
        assert_eq!(count(&canvas, theme.bar, BAR_Y..BAR_Y + 1), BAR_W as usize + 2 * 2);
        assert_eq!(canvas.pixel(BAR_X - 1, BAR_Y), Some(theme.bar_background));
    }

    #[test]
    fn message_sits_above_split_line() {
        let theme = theme();
        let mut scene = scene(theme.clone());
        let mut canvas = canvas(Rotation::Deg0);
        scene.draw(&mut canvas);
        scene.apply(&mut canvas, &Command::Msg("Starting".into()));

        assert_eq!(scene.message(), Some("Starting"));
        assert!(count(&canvas, theme.text, 384..400) > 0);
        assert_eq!(count(&canvas, theme.text, 0..384), 0);
        assert_eq!(count(&canvas, theme.text, 400..H as i32), 0);

        // Inked pixels are centred within a couple of pixels.
        let xs: Vec<i32> = (384..400)
            .flat_map(|y| (0..W as i32).map(move |x| (x, y)))
            .filter(|&(x, y)| canvas.pixel(x, y) == Some(theme.text))
            .map(|(x, _)| x)
            .collect();
        let (min, max) = (xs.iter().min().unwrap(), xs.iter().max().unwrap());
        assert!((min + max - (W as i32 - 1)).abs() <= 4, "{min}..{max}");
    }

    #[test]
    fn shorter_message_clears_previous_one() {
        let theme = theme();
        let mut scene = scene(theme.clone());
        let mut canvas = canvas(Rotation::Deg0);
        scene.draw(&mut canvas);
        scene.apply(&mut canvas, &Command::Msg("first\nsecond".into()));
        assert!(count(&canvas, theme.text, 368..384) > 0);

        scene.apply(&mut canvas, &Command::Msg("ok".into()));
        assert_eq!(count(&canvas, theme.text, 0..384), 0);
        scene.apply(&mut canvas, &Command::Msg(String::new()));
        assert_eq!(count(&canvas, theme.text, 0..H as i32), 0);
    }

    #[test]
    fn update_records_without_drawing_and_draw_repaints() {
        let theme = Theme {
            startup_message: Some("Booting".into()),
            title: Some("Linux".into()),
            ..theme()
        };
        let mut scene = scene(theme.clone());
        let mut canvas = canvas(Rotation::Deg0);
        assert_eq!(scene.message(), Some("Booting"));

        scene.update(&Command::Progress(80));
        scene.update(&Command::Msg("Mounting".into()));
        scene.update(&Command::Quit);
        assert!(canvas.buffer().iter().all(|&b| b == 0));

        scene.draw(&mut canvas);
        assert_eq!(scene.message(), Some("Mounting"));
        assert_eq!(canvas.pixel(BAR_X + 312, BAR_Y), Some(theme.bar));
        assert_eq!(canvas.pixel(BAR_X + 314, BAR_Y), Some(theme.bar_background));
        assert!(count(&canvas, theme.text, 384..400) > 0);
        // Title in the upper area.
        assert!(count(&canvas, theme.text, 0..368) > 0);
    }

    #[test]
    fn rotated_screen_keeps_layout_in_bounds() {
        let theme = theme();
        let mut scene = scene(theme.clone());
        let mut canvas = canvas(Rotation::Deg90);
        assert_eq!((canvas.width(), canvas.height()), (H, W));
        scene.draw(&mut canvas);
        scene.apply(&mut canvas, &Command::Progress(100));

        let split = scene.split_line(canvas.height());
        assert_eq!(split, 640 - 640 / 6);
        let x = (H as i32 - 400) / 2 + 4;
        assert_eq!(canvas.pixel(x, split + 4), Some(theme.bar));
        assert_eq!(canvas.pixel(x + 391, split + 4), Some(theme.bar));
    }

    const LOGO: Color = Color::new(0x10, 0x90, 0x30);

    /// A 40x20 solid logo whose four corner pixels are transparent.
    fn logo_scene(fullscreen: bool) -> Scene {
        let (w, h) = (40, 20);
        let mut pixels = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let corner = (x == 0 || x == w - 1) && (y == 0 || y == h - 1);
                let alpha = if corner { 0 } else { 0xff };
                pixels.extend_from_slice(&[LOGO.r, LOGO.g, LOGO.b, alpha]);
            }
        }
        let mut theme = theme();
        theme.logo = Some(LogoConfig {
            path: "logo.rgba".into(),
            width: w,
            height: h,
            fullscreen,
        });
        theme.title = Some("Booting".into());
        let logo = EncodedImage::from_rgba(w, h, &pixels).unwrap();
        scene(theme).with_logo(Some(logo))
    }

    fn assert_logo_at(canvas: &Canvas<Vec<u8>>, background: Color, x: i32, y: i32) {
        for (cx, cy) in [(x, y), (x + 39, y), (x, y + 19), (x + 39, y + 19)] {
            assert_eq!(canvas.pixel(cx, cy), Some(background), "corner {cx},{cy}");
        }
        assert_eq!(canvas.pixel(x + 1, y), Some(LOGO));
        assert_eq!(canvas.pixel(x, y + 1), Some(LOGO));
        assert_eq!(canvas.pixel(x + 38, y + 19), Some(LOGO));
        assert_eq!(canvas.pixel(x - 1, y + 10), Some(background));
        assert_eq!(canvas.pixel(x + 40, y + 10), Some(background));
        assert_eq!(count(canvas, LOGO, 0..H as i32), 40 * 20 - 4);
    }

    #[test]
    fn logo_is_centred_above_split() {
        let mut scene = logo_scene(false);
        let mut canvas = canvas(Rotation::Deg0);
        scene.draw(&mut canvas);

        // x = (640 - 40) / 2, y = (480 * 5 / 6 - 20) / 2
        assert_eq!(scene.logo_origin(&canvas), Some((300, 190)));
        assert_logo_at(&canvas, scene.theme().background, 300, 190);

        // The title goes under the logo, clear of the message line.
        let text = scene.theme().text;
        assert_eq!(count(&canvas, text, 0..210), 0);
        assert!(count(&canvas, text, 210..368) > 0);
    }

    #[test]
    fn fullscreen_logo_is_centred_on_screen() {
        let mut scene = logo_scene(true);
        let mut canvas = canvas(Rotation::Deg0);
        scene.draw(&mut canvas);

        // y = (480 - 20) / 2
        assert_eq!(scene.logo_origin(&canvas), Some((300, 230)));
        assert_logo_at(&canvas, scene.theme().background, 300, 230);
    }

    #[test]
    fn no_logo_has_no_origin() {
        let scene = scene(theme());
        assert_eq!(scene.logo_origin(&canvas(Rotation::Deg0)), None);
    }

}
