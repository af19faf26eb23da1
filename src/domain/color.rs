//! Hex colour parsing and the brightness heuristics used for legibility fixes.

use std::{fmt, str::FromStr};

use super::error::DomainError;

/// Perceived brightness below which a colour counts as dark.
const DARK_THRESHOLD: u32 = 128;
/// Perceived brightness at or above which a colour counts as light.
const LIGHT_THRESHOLD: u32 = 160;

/// An sRGB colour written as `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl HexColor {
    pub const WHITE: HexColor = HexColor::opaque(0xff, 0xff, 0xff);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    /// Parse a hex literal. Returns `None` for anything that is not a bare hex
    /// colour, including named colours and functional notations.
    pub fn parse(value: &str) -> Option<Self> {
        let digits = value.trim().strip_prefix('#')?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let nibble = |idx: usize| u8::from_str_radix(&digits[idx..=idx], 16).ok();
        let byte = |idx: usize| u8::from_str_radix(&digits[idx..idx + 2], 16).ok();

        match digits.len() {
            3 | 4 => {
                let expand = |n: u8| n * 17;
                let a = if digits.len() == 4 { expand(nibble(3)?) } else { 0xff };
                Some(Self {
                    r: expand(nibble(0)?),
                    g: expand(nibble(1)?),
                    b: expand(nibble(2)?),
                    a,
                })
            }
            6 | 8 => {
                let a = if digits.len() == 8 { byte(6)? } else { 0xff };
                Some(Self {
                    r: byte(0)?,
                    g: byte(2)?,
                    b: byte(4)?,
                    a,
                })
            }
            _ => None,
        }
    }

    /// ITU-R BT.601 luma, 0..=255.
    pub fn brightness(&self) -> u32 {
        (u32::from(self.r) * 299 + u32::from(self.g) * 587 + u32::from(self.b) * 114) / 1000
    }

    pub fn is_dark(&self) -> bool {
        self.brightness() < DARK_THRESHOLD
    }

    pub fn is_light(&self) -> bool {
        self.brightness() >= LIGHT_THRESHOLD
    }

    pub fn to_rgba(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 0xff {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}

impl FromStr for HexColor {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        HexColor::parse(value).ok_or_else(|| {
            DomainError::validation(
                "backgroundColor",
                format!("`{value}` is not a hex colour or `transparent`"),
            )
        })
    }
}

/// Colour value used for text in CSS declarations: a hex literal or one of the
/// two named extremes templates actually use.
pub(crate) fn parse_text_color(value: &str) -> Option<HexColor> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("white") {
        return Some(HexColor::WHITE);
    }
    if trimmed.eq_ignore_ascii_case("black") {
        return Some(HexColor::opaque(0, 0, 0));
    }
    HexColor::parse(trimmed)
}
