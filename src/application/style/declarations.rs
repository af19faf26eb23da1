//! Ordered CSS declaration lists and the transparent-background palette fix.

use std::fmt;

use crate::domain::{
    color::{HexColor, parse_text_color},
    template::StyleTag,
};

const LIGHT_NEUTRAL: &str = "#f5f5f5";
const DARK_NEUTRAL: &str = "#333333";

/// `property: value` pairs in source order. Setting an existing property
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    entries: Vec<(String, String)>,
}

impl Declarations {
    pub fn parse(source: &str) -> Self {
        let mut declarations = Self::default();
        for chunk in split_top_level(source) {
            let Some((property, value)) = chunk.split_once(':') else {
                continue;
            };
            let property = property.trim();
            let value = value.trim();
            if !property.is_empty() && !value.is_empty() {
                declarations.set(property, value);
            }
        }
        declarations
    }

    pub fn set(&mut self, property: &str, value: impl Into<String>) {
        let property = property.to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == property) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((property, value)),
        }
    }

    pub fn remove(&mut self, property: &str) {
        self.entries.retain(|(name, _)| name != property);
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value.as_str())
    }

    /// Later declarations win.
    pub fn merge(&mut self, other: &Declarations) {
        for (property, value) in &other.entries {
            self.set(property, value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Declarations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (property, value)) in self.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{property}: {value};")?;
        }
        Ok(())
    }
}

/// Split on `;` outside parentheses and quotes.
fn split_top_level(source: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (idx, ch) in source.char_indices() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                chunks.push(&source[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    chunks.push(&source[start..]);
    chunks
}

/// Keep a declaration legible when the page behind it is transparent.
///
/// Only solid hex backgrounds are considered: a dark one becomes a light
/// neutral, and a light text colour on that element becomes a dark neutral.
/// Header cells always get dark text in place of light text. Gradients,
/// functional colours and custom properties are left as written.
pub(crate) fn remap_for_transparent(tag: StyleTag, declaration: &str) -> String {
    let mut declarations = Declarations::parse(declaration);
    let mut background_remapped = false;
    let mut changed = false;

    for property in ["background", "background-color"] {
        let is_dark = declarations
            .get(property)
            .and_then(HexColor::parse)
            .is_some_and(|color| color.is_dark());
        if is_dark {
            declarations.set(property, LIGHT_NEUTRAL);
            background_remapped = true;
            changed = true;
        }
    }

    let light_text = declarations
        .get("color")
        .and_then(parse_text_color)
        .is_some_and(|color| color.is_light());
    if light_text && (background_remapped || tag == StyleTag::Th) {
        declarations.set("color", DARK_NEUTRAL);
        changed = true;
    }

    if changed {
        declarations.to_string()
    } else {
        declaration.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_malformed_chunks_and_keeps_order() {
        let declarations = Declarations::parse("color: red; junk; margin:0 ; ;padding: 1px 2px");
        assert_eq!(
            declarations.to_string(),
            "color: red; margin: 0; padding: 1px 2px;"
        );
    }

    #[test]
    fn set_replaces_in_place() {
        let mut declarations = Declarations::parse("a: 1; b: 2;");
        declarations.set("A", "3");
        assert_eq!(declarations.to_string(), "a: 3; b: 2;");
    }

    #[test]
    fn values_with_colons_and_semicolons_survive() {
        let declarations =
            Declarations::parse("background: url(data:image/png;base64,AA); color: red");
        assert_eq!(
            declarations.get("background"),
            Some("url(data:image/png;base64,AA)")
        );
        assert_eq!(declarations.get("color"), Some("red"));
    }

    #[test]
    fn dark_pre_background_is_lightened_with_its_text() {
        let out = remap_for_transparent(
            StyleTag::Pre,
            "background-color: #282c34; color: #abb2bf; padding: 16px;",
        );
        assert_eq!(
            out,
            "background-color: #f5f5f5; color: #333333; padding: 16px;"
        );
    }

    #[test]
    fn header_cell_white_text_is_darkened() {
        let out = remap_for_transparent(StyleTag::Th, "background: #60a5fa; color: white;");
        assert!(out.contains("color: #333333;"));
        assert!(out.contains("background: #60a5fa;"));
    }

    #[test]
    fn gradients_and_functional_colours_are_untouched() {
        let gradient = "background: linear-gradient(135deg, #1e293b, #0f172a); color: #fff;";
        assert_eq!(
            remap_for_transparent(StyleTag::H1, gradient),
            "background: linear-gradient(135deg, #1e293b, #0f172a); color: #fff;"
        );
        let rgba = "background-color: rgba(0,0,0,0.8); color: #fff;";
        assert_eq!(remap_for_transparent(StyleTag::Code, rgba), rgba);
    }

    #[test]
    fn light_background_is_kept() {
        let declaration = "background-color: #f6f8fa; color: #24292e;";
        assert_eq!(remap_for_transparent(StyleTag::Pre, declaration), declaration);
    }
}
