//! Style resolution: turns rendered HTML plus a template into client-ready markup.
//!
//! Stylesheet mode emits a full document with a `<style>` block. Inline mode
//! writes a `style` attribute onto every semantic element for clients that
//! strip stylesheets, and is idempotent: feeding its output back in returns
//! the same bytes.

mod cleanup;
mod declarations;
mod email;
mod inline;
mod stylesheet;

use thiserror::Error;

use crate::domain::{settings::StyleSettings, template::Template};

use inline::InlineVariant;

pub use declarations::Declarations;
pub use email::preview_text;

#[derive(Debug, Clone, Error)]
pub enum StyleError {
    #[error("failed to rewrite HTML: {message}")]
    Rewrite { message: String },
    #[error("failed to build code theme stylesheet: {message}")]
    Theme { message: String },
}

/// Full HTML document styled through a stylesheet.
pub fn to_styled_document(
    html: &str,
    template: &Template,
    settings: &StyleSettings,
) -> Result<String, StyleError> {
    stylesheet::to_styled_document(html, template, settings)
}

/// Fragment with every semantic element styled inline, wrapped in one
/// `<section>` container.
pub fn to_inlined_html(
    html: &str,
    template: &Template,
    settings: &StyleSettings,
) -> Result<String, StyleError> {
    inline_fragment(html, template, settings, InlineVariant::Standard)
}

/// Inline mode for strict renderers: tables carry zeroed spacing attributes
/// and tables that already have a style are left untouched as a whole.
pub fn to_table_safe_html(
    html: &str,
    template: &Template,
    settings: &StyleSettings,
) -> Result<String, StyleError> {
    inline_fragment(html, template, settings, InlineVariant::TableSafe)
}

/// Parser output with no styling at all.
pub fn to_plain_html(html: &str) -> String {
    html.to_string()
}

/// Table-safe fragment inside a 600px email document shell. `markdown`
/// feeds the hidden preview line.
pub fn to_email_document(
    html: &str,
    markdown: &str,
    template: &Template,
    settings: &StyleSettings,
) -> Result<String, StyleError> {
    let fragment = to_table_safe_html(html, template, settings)?;
    Ok(email::email_document(&fragment, markdown, template, settings))
}

fn inline_fragment(
    html: &str,
    template: &Template,
    settings: &StyleSettings,
    variant: InlineVariant,
) -> Result<String, StyleError> {
    let cleaned = cleanup::strip_empty_table_scaffolding(html);
    let styled = inline::inline_tag_styles(&cleaned, template, settings, variant)?;
    if inline::is_wrapped(&styled) {
        return Ok(styled);
    }
    Ok(inline::wrap_in_container(&styled, template, settings))
}
