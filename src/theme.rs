//! Board themes and background resolution
//!
//! Themes are a static, ordered table. The capture step needs a concrete
//! color for the canvas fill, so lookups always yield an [`Rgb`] and an
//! unknown id falls back to a neutral color instead of failing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// An opaque 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from a packed `0xRRGGBB` value
    pub const fn hex(v: u32) -> Self {
        Self::new((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }

    /// Opaque RGBA tuple as used by paint commands
    pub fn rgba(self) -> (u8, u8, u8, u8) {
        (self.r, self.g, self.b, 0xff)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = Error;

    /// Accepts `#rgb` and `#rrggbb` (leading `#` optional)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let digits = raw.strip_prefix('#').unwrap_or(raw);
        let bad = || Error::ConfigError(format!("invalid color '{}'", s));
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(bad());
        }
        match digits.len() {
            6 => u32::from_str_radix(digits, 16).map(Rgb::hex).map_err(|_| bad()),
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in digits.chars().enumerate() {
                    let v = c.to_digit(16).ok_or_else(bad)? as u8;
                    out[i] = v * 17;
                }
                Ok(Rgb::new(out[0], out[1], out[2]))
            }
            _ => Err(bad()),
        }
    }
}

impl TryFrom<String> for Rgb {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_string()
    }
}

/// A named bundle of color tokens applied to a rendered post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeDefinition {
    /// Stable key used in filenames and lookups
    pub id: &'static str,
    /// Human readable name for pickers
    pub name: &'static str,
    pub post_background: Rgb,
    pub header_background: Rgb,
    pub border: Rgb,
    pub text_primary: Rgb,
    pub text_secondary: Rgb,
    /// Override for emphasized (`>`) lines
    pub quote: Option<Rgb>,
}

impl ThemeDefinition {
    /// Color used for emphasized lines
    pub fn quote_color(&self) -> Rgb {
        self.quote.unwrap_or(DEFAULT_QUOTE)
    }
}

/// Accent for emphasized lines when a theme has no override
pub const DEFAULT_QUOTE: Rgb = Rgb::hex(0x789922);

/// Background used for ids not present in the registry
pub const FALLBACK_BACKGROUND: Rgb = Rgb::WHITE;

static THEMES: &[ThemeDefinition] = &[
    ThemeDefinition {
        id: "default",
        name: "Default",
        post_background: Rgb::hex(0xf3f4f6),
        header_background: Rgb::hex(0xe5e7eb),
        border: Rgb::hex(0xd1d5db),
        text_primary: Rgb::hex(0x111827),
        text_secondary: Rgb::hex(0x4b5563),
        quote: Some(Rgb::hex(0x22c55e)),
    },
    ThemeDefinition {
        id: "classic",
        name: "Yotsuba",
        post_background: Rgb::hex(0xf0e0d6),
        header_background: Rgb::hex(0xffffee),
        border: Rgb::hex(0xd9bfb7),
        text_primary: Rgb::hex(0x800000),
        text_secondary: Rgb::hex(0x117743),
        quote: None,
    },
    ThemeDefinition {
        id: "serious",
        name: "Yotsuba B",
        post_background: Rgb::hex(0xd6daf0),
        header_background: Rgb::hex(0xeef2ff),
        border: Rgb::hex(0xb7c5d9),
        text_primary: Rgb::hex(0x000000),
        text_secondary: Rgb::hex(0x117743),
        quote: None,
    },
    ThemeDefinition {
        id: "tomorrow",
        name: "Tomorrow",
        post_background: Rgb::hex(0x282a2e),
        header_background: Rgb::hex(0x1d1f21),
        border: Rgb::hex(0x111111),
        text_primary: Rgb::hex(0xc5c8c6),
        text_secondary: Rgb::hex(0x81a2be),
        quote: Some(Rgb::hex(0xb5bd68)),
    },
    ThemeDefinition {
        id: "photon",
        name: "Photon",
        post_background: Rgb::hex(0xdddddd),
        header_background: Rgb::hex(0xeeeeee),
        border: Rgb::hex(0xcccccc),
        text_primary: Rgb::hex(0x333333),
        text_secondary: Rgb::hex(0x004a99),
        quote: None,
    },
];

/// Lookup table over the built-in themes
#[derive(Debug, Clone)]
pub struct ThemeRegistry {
    themes: &'static [ThemeDefinition],
    fallback: Rgb,
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThemeRegistry {
    pub fn new() -> Self {
        Self::with_fallback(FALLBACK_BACKGROUND)
    }

    /// Registry whose unknown-id background is `fallback`
    pub fn with_fallback(fallback: Rgb) -> Self {
        Self { themes: THEMES, fallback }
    }

    /// All themes in picker order
    pub fn list_themes(&self) -> &[ThemeDefinition] {
        self.themes
    }

    pub fn get(&self, theme_id: &str) -> Option<&ThemeDefinition> {
        self.themes.iter().find(|t| t.id == theme_id)
    }

    pub fn contains(&self, theme_id: &str) -> bool {
        self.get(theme_id).is_some()
    }

    /// Concrete background for `theme_id`, or the fallback for unknown ids
    pub fn resolve_background(&self, theme_id: &str) -> Rgb {
        match self.get(theme_id) {
            Some(theme) => theme.post_background,
            None => {
                log::warn!("unknown theme '{}', using fallback background {}", theme_id, self.fallback);
                self.fallback
            }
        }
    }

    pub fn fallback_background(&self) -> Rgb {
        self.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_theme_resolves_its_own_background() {
        let reg = ThemeRegistry::new();
        for theme in reg.list_themes() {
            let bg = reg.resolve_background(theme.id);
            assert_eq!(bg, theme.post_background);
            assert_eq!(bg.to_string().len(), 7);
            assert_eq!(bg.to_string().parse::<Rgb>().unwrap(), bg);
        }
    }

    #[test]
    fn unknown_theme_uses_fallback() {
        let reg = ThemeRegistry::new();
        assert_eq!(reg.resolve_background("no-such-board"), FALLBACK_BACKGROUND);
        assert_eq!(reg.resolve_background(""), FALLBACK_BACKGROUND);

        let custom = ThemeRegistry::with_fallback(Rgb::hex(0x808080));
        assert_eq!(custom.resolve_background("nope"), Rgb::new(0x80, 0x80, 0x80));
    }

    #[test]
    fn theme_ids_are_unique_and_ordered() {
        let reg = ThemeRegistry::new();
        let ids: Vec<_> = reg.list_themes().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["default", "classic", "serious", "tomorrow", "photon"]);
    }

    #[test]
    fn parse_colors() {
        assert_eq!("#f0e0d6".parse::<Rgb>().unwrap(), Rgb::hex(0xf0e0d6));
        assert_eq!("FFF".parse::<Rgb>().unwrap(), Rgb::WHITE);
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#gggggg".parse::<Rgb>().is_err());
    }

    #[test]
    fn quote_color_defaults_to_green() {
        let reg = ThemeRegistry::new();
        assert_eq!(reg.get("classic").unwrap().quote_color(), Rgb::hex(0x789922));
        assert_eq!(reg.get("tomorrow").unwrap().quote_color(), Rgb::hex(0xb5bd68));
    }
}
