//! Widget theme colors.
//!
//! Two configured colors (widget chrome and send affordance) plus two shades
//! derived from the widget color. The record is immutable; updates build a
//! fresh `Theme` so derived shades can never drift out of sync.

use std::str::FromStr;

use thiserror::Error;

/// Default for both configurable colors.
pub const DEFAULT_COLOR: Rgb = Rgb::new(74, 227, 247);

/// Stand-in for color strings in a form we do not recognize.
pub const FALLBACK_TINT: Rgb = Rgb::new(200, 240, 255);

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("Unrecognized color form: {0}")]
    UnknownColorForm(String),
}

/// A 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a color string, substituting the fallback tint for any form
    /// `FromStr` rejects.
    pub fn parse_or_tint(s: &str) -> Self {
        s.parse().unwrap_or(FALLBACK_TINT)
    }

    /// Move every channel toward white by `factor` (0.0 keeps the color,
    /// 1.0 reaches pure white), flooring to the nearest integer.
    pub fn lighten(self, factor: f64) -> Self {
        let channel = |c: u8| (f64::from(c) + (255.0 - f64::from(c)) * factor).floor() as u8;
        Self::new(channel(self.r), channel(self.g), channel(self.b))
    }
}

impl FromStr for Rgb {
    type Err = ThemeError;

    /// Accepts `#rrggbb` (extra trailing characters ignored) and
    /// `rgb(r, g, b)` (an `rgba(...)` alpha component is ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ThemeError::UnknownColorForm(s.to_string());

        if let Some(hex) = s.strip_prefix('#') {
            let pair = |range| {
                hex.get(range)
                    .and_then(|digits| u8::from_str_radix(digits, 16).ok())
            };
            return match (pair(0..2), pair(2..4), pair(4..6)) {
                (Some(r), Some(g), Some(b)) => Ok(Self::new(r, g, b)),
                _ => Err(unknown()),
            };
        }

        if s.starts_with("rgb") {
            let mut runs = s
                .split(|ch: char| !ch.is_ascii_digit())
                .filter(|run| !run.is_empty());
            let mut channel = || runs.next().and_then(|run| run.parse().ok());
            return match (channel(), channel(), channel()) {
                (Some(r), Some(g), Some(b)) => Ok(Self::new(r, g, b)),
                _ => Err(unknown()),
            };
        }

        Err(unknown())
    }
}

impl From<Rgb> for ratatui::style::Color {
    fn from(rgb: Rgb) -> Self {
        ratatui::style::Color::Rgb(rgb.r, rgb.g, rgb.b)
    }
}

/// The full color set the widget draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    /// Widget chrome: launcher, header, user bubbles.
    pub chat: Rgb,
    /// The send affordance.
    pub send: Rgb,
    /// Focused quick-reply chip, derived from `chat`.
    pub chip_focus: Rgb,
    /// Bot bubble background, derived from `chat`.
    pub bot_bubble: Rgb,
}

impl Theme {
    /// Factor for the focused-chip shade.
    const CHIP_FOCUS_LIGHTEN: f64 = 0.2;
    /// Factor for the bot-bubble shade.
    const BOT_BUBBLE_LIGHTEN: f64 = 0.85;

    pub fn new(chat: Rgb, send: Rgb) -> Self {
        Self {
            chat,
            send,
            chip_focus: chat.lighten(Self::CHIP_FOCUS_LIGHTEN),
            bot_bubble: chat.lighten(Self::BOT_BUBBLE_LIGHTEN),
        }
    }

    /// Build a theme from raw color strings, tinting unrecognized forms.
    pub fn from_strings(chat: &str, send: &str) -> Self {
        Self::new(Rgb::parse_or_tint(chat), Rgb::parse_or_tint(send))
    }

    /// The runtime recolor hook. Either color may be left as-is; derived
    /// shades are always recomputed from the result.
    pub fn updated(&self, chat: Option<&str>, send: Option<&str>) -> Self {
        let chat = chat.map_or(self.chat, Rgb::parse_or_tint);
        let send = send.map_or(self.send, Rgb::parse_or_tint);
        Self::new(chat, send)
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::new(DEFAULT_COLOR, DEFAULT_COLOR)
    }
}
