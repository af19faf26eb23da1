//! Per-conversion presentation settings.

use std::fmt;

use super::{color::HexColor, error::DomainError};

pub const DEFAULT_FONT_SIZE_PX: u32 = 16;
pub const DEFAULT_MARGIN_PX: u32 = 24;
pub const MAX_FONT_SIZE_PX: u32 = 96;
pub const MAX_MARGIN_PX: u32 = 400;

const TRANSPARENT: &str = "transparent";

/// Page background: a solid colour or the transparent sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Transparent,
    Color(HexColor),
}

impl Background {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case(TRANSPARENT) {
            return Ok(Background::Transparent);
        }
        trimmed.parse::<HexColor>().map(Background::Color)
    }

    pub fn is_transparent(&self) -> bool {
        matches!(self, Background::Transparent)
    }

    /// Colour used when pixels must be opaque. Transparent renders as white.
    pub fn raster_fill(&self) -> HexColor {
        match self {
            Background::Transparent => HexColor::WHITE,
            Background::Color(color) => *color,
        }
    }
}

impl Default for Background {
    fn default() -> Self {
        Background::Color(HexColor::WHITE)
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Background::Transparent => f.write_str(TRANSPARENT),
            Background::Color(color) => color.fmt(f),
        }
    }
}

/// `{font size, margin, background}` applied to one conversion. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleSettings {
    pub font_size: u32,
    pub margin: u32,
    pub background: Background,
}

impl Default for StyleSettings {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE_PX,
            margin: DEFAULT_MARGIN_PX,
            background: Background::default(),
        }
    }
}

impl StyleSettings {
    /// Build settings from optional request fields, substituting `defaults`
    /// for anything omitted.
    pub fn resolve(
        defaults: StyleSettings,
        font_size: Option<u32>,
        margin: Option<u32>,
        background: Option<&str>,
    ) -> Result<Self, DomainError> {
        let font_size = font_size.unwrap_or(defaults.font_size);
        if font_size == 0 || font_size > MAX_FONT_SIZE_PX {
            return Err(DomainError::validation(
                "fontSize",
                format!("must be between 1 and {MAX_FONT_SIZE_PX}"),
            ));
        }

        let margin = margin.unwrap_or(defaults.margin);
        if margin > MAX_MARGIN_PX {
            return Err(DomainError::validation(
                "margin",
                format!("must not exceed {MAX_MARGIN_PX}"),
            ));
        }

        let background = match background.map(str::trim).filter(|v| !v.is_empty()) {
            Some(value) => Background::parse(value)?,
            None => defaults.background,
        };

        Ok(Self {
            font_size,
            margin,
            background,
        })
    }

    pub fn with_font_size(mut self, font_size: u32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }
}
