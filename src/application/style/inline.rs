use std::{cell::RefCell, collections::HashMap, rc::Rc};

use lol_html::{
    RewriteStrSettings, element,
    html_content::{Element, EndTag},
    rewrite_str,
};

use crate::{
    application::markup::escape_attribute,
    domain::{
        settings::{Background, StyleSettings},
        template::{StyleTag, Template},
    },
};

use super::{
    StyleError,
    declarations::{Declarations, remap_for_transparent},
};

/// Declaration given to `code` nested in `pre` so it inherits the block styling.
pub(crate) const CODE_IN_PRE: &str = "background: transparent; padding: 0; margin: 0; border: none; color: inherit; font-size: inherit; font-family: inherit;";

const INLINE_SUBHEADINGS: [(&str, &str); 3] = [
    (
        "h4",
        "font-size: 1.1em; font-weight: bold; margin: 16px 0 8px 0; color: #374151;",
    ),
    (
        "h5",
        "font-size: 1em; font-weight: bold; margin: 14px 0 6px 0; color: #374151;",
    ),
    (
        "h6",
        "font-size: 0.9em; font-weight: bold; margin: 12px 0 4px 0; color: #6b7280;",
    ),
];

const BASE_CONTAINER: &str = "line-height: 1.75; font-family: -apple-system-font, BlinkMacSystemFont, Helvetica Neue, PingFang SC, Hiragino Sans GB, Microsoft YaHei UI, Microsoft YaHei, Arial, sans-serif; color: #333; word-wrap: break-word; letter-spacing: 1px;";

pub(crate) const CONTAINER_CLASS: &str = "md-container";

const PRESENTATION_TABLE_ATTRIBUTES: [(&str, &str); 4] = [
    ("role", "presentation"),
    ("cellspacing", "0"),
    ("cellpadding", "0"),
    ("border", "0"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InlineVariant {
    Standard,
    /// Adds legacy table attributes and leaves pre-styled tables alone as a whole.
    TableSafe,
}

#[derive(Debug, Default)]
struct InlineState {
    pre_depth: usize,
    svg_depth: usize,
    styled_table_depth: usize,
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Pre,
    Svg,
    StyledTable,
}

impl InlineState {
    fn depth_mut(&mut self, scope: Scope) -> &mut usize {
        match scope {
            Scope::Pre => &mut self.pre_depth,
            Scope::Svg => &mut self.svg_depth,
            Scope::StyledTable => &mut self.styled_table_depth,
        }
    }
}

/// Per-element declarations for one conversion, keyed by lower-case tag name.
fn tag_declarations(template: &Template, settings: &StyleSettings) -> HashMap<&'static str, String> {
    let transparent = settings.background.is_transparent();
    let mut declarations: HashMap<&'static str, String> = StyleTag::ALL
        .into_iter()
        .filter(|tag| *tag != StyleTag::Container)
        .map(|tag| {
            let declaration = template.declaration(tag);
            let declaration = if transparent {
                remap_for_transparent(tag, declaration)
            } else {
                declaration.to_string()
            };
            (tag.as_str(), declaration)
        })
        .collect();

    for (name, declaration) in INLINE_SUBHEADINGS {
        declarations.insert(name, declaration.to_string());
    }
    declarations.retain(|_, declaration| !declaration.trim().is_empty());
    declarations
}

/// Write a `style` attribute onto every semantic element that lacks one.
pub(crate) fn inline_tag_styles(
    html: &str,
    template: &Template,
    settings: &StyleSettings,
    variant: InlineVariant,
) -> Result<String, StyleError> {
    let declarations = tag_declarations(template, settings);
    let state = Rc::new(RefCell::new(InlineState::default()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", move |el| {
                let name = el.tag_name();

                if name == "svg" {
                    track_until_end(el, &state, Scope::Svg);
                    return Ok(());
                }
                if state.borrow().svg_depth > 0 {
                    return Ok(());
                }

                if variant == InlineVariant::TableSafe {
                    if state.borrow().styled_table_depth > 0 {
                        if name == "table" {
                            track_until_end(el, &state, Scope::StyledTable);
                        }
                        return Ok(());
                    }
                    if name == "table" {
                        if el.has_attribute("style") {
                            track_until_end(el, &state, Scope::StyledTable);
                            return Ok(());
                        }
                        for (attribute, value) in PRESENTATION_TABLE_ATTRIBUTES {
                            if !el.has_attribute(attribute) {
                                el.set_attribute(attribute, value)?;
                            }
                        }
                    }
                }

                let in_pre = state.borrow().pre_depth > 0;
                if name == "pre" {
                    track_until_end(el, &state, Scope::Pre);
                }

                if el.has_attribute("style") {
                    return Ok(());
                }

                let declaration = if name == "code" && in_pre {
                    Some(CODE_IN_PRE)
                } else {
                    declarations.get(name.as_str()).map(String::as_str)
                };
                if let Some(declaration) = declaration {
                    el.set_attribute("style", declaration)?;
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| StyleError::Rewrite {
        message: err.to_string(),
    })
}

/// Increment the scope depth now and decrement it when the element closes.
/// Elements without an end tag never enter the scope.
fn track_until_end(el: &mut Element<'_, '_>, state: &Rc<RefCell<InlineState>>, scope: Scope) {
    let Some(handlers) = el.end_tag_handlers() else {
        return;
    };
    *state.borrow_mut().depth_mut(scope) += 1;
    let state = Rc::clone(state);
    handlers.push(Box::new(move |_end: &mut EndTag<'_>| {
        let mut state = state.borrow_mut();
        let depth = state.depth_mut(scope);
        *depth = depth.saturating_sub(1);
        Ok(())
    }));
}

/// Combined container declaration: base typography, the template's container
/// rule, then the per-conversion font size, padding and background.
pub(crate) fn container_declarations(template: &Template, settings: &StyleSettings) -> Declarations {
    let mut declarations = Declarations::parse(BASE_CONTAINER);
    declarations.merge(&Declarations::parse(
        template.declaration(StyleTag::Container),
    ));
    declarations.set("font-size", format!("{}px", settings.font_size));
    declarations.set("padding", format!("{}px", settings.margin));
    declarations.remove("background");
    match settings.background {
        Background::Transparent => declarations.remove("background-color"),
        Background::Color(color) => declarations.set("background-color", color.to_string()),
    }
    declarations
}

pub(crate) fn is_wrapped(html: &str) -> bool {
    let trimmed = html.trim();
    trimmed.starts_with(&format!("<section class=\"{CONTAINER_CLASS}\""))
        && trimmed.ends_with("</section>")
}

pub(crate) fn wrap_in_container(html: &str, template: &Template, settings: &StyleSettings) -> String {
    let declarations = container_declarations(template, settings);
    format!(
        "<section class=\"{CONTAINER_CLASS}\" style=\"{}\">{html}</section>",
        escape_attribute(&declarations.to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{color::HexColor, template::TemplateFormat};

    fn template() -> Template {
        Template::new("t", "T", TemplateFormat::General)
            .with_style(StyleTag::H1, "color: red;")
            .with_style(StyleTag::Pre, "background: #282c34; color: #abb2bf;")
            .with_style(StyleTag::Code, "color: #d73a49;")
            .with_style(StyleTag::Table, "width: 100%;")
            .with_style(StyleTag::Td, "padding: 4px;")
    }

    fn inline(html: &str, variant: InlineVariant) -> String {
        inline_tag_styles(html, &template(), &StyleSettings::default(), variant).expect("rewrites")
    }

    #[test]
    fn styles_semantic_tags_and_skips_styled_ones() {
        let out = inline(
            "<h1>a</h1><h1 style=\"color: blue\">b</h1><div>c</div>",
            InlineVariant::Standard,
        );
        assert_eq!(
            out,
            "<h1 style=\"color: red;\">a</h1><h1 style=\"color: blue\">b</h1><div>c</div>"
        );
    }

    #[test]
    fn code_in_pre_inherits() {
        let out = inline(
            "<pre><code class=\"x\">a</code></pre><p><code>b</code></p>",
            InlineVariant::Standard,
        );
        assert!(out.contains(&format!("<code class=\"x\" style=\"{CODE_IN_PRE}\">a</code>")));
        assert!(out.contains("<code style=\"color: #d73a49;\">b</code>"));
    }

    #[test]
    fn missing_declaration_uses_builtin_fallback() {
        let out = inline("<h2>x</h2>", InlineVariant::Standard);
        assert_eq!(
            out,
            format!("<h2 style=\"{}\">x</h2>", StyleTag::H2.builtin_default())
        );
    }

    #[test]
    fn svg_content_is_left_alone() {
        let html = "<div><svg><foreignObject><p>label</p></foreignObject></svg></div><p>x</p>";
        let out = inline(html, InlineVariant::Standard);
        assert!(out.contains("<p>label</p>"));
        assert!(out.ends_with("<p style=\"margin: 0.8em 0; color: #333; text-align: justify;\">x</p>"));
    }

    #[test]
    fn table_safe_adds_presentation_attributes() {
        let out = inline("<table><tr><td>1</td></tr></table>", InlineVariant::TableSafe);
        assert!(out.starts_with(
            "<table role=\"presentation\" cellspacing=\"0\" cellpadding=\"0\" border=\"0\" style=\"width: 100%;\">"
        ));
        assert!(out.contains("<td style=\"padding: 4px;\">1</td>"));
    }

    #[test]
    fn table_safe_skips_styled_tables_entirely() {
        let html = "<table style=\"x\"><tr><td>1</td></tr></table><table><tr><td>2</td></tr></table>";
        let out = inline(html, InlineVariant::TableSafe);
        assert!(out.starts_with("<table style=\"x\"><tr><td>1</td></tr></table>"));
        assert!(out.contains("<td style=\"padding: 4px;\">2</td>"));

        let standard = inline(html, InlineVariant::Standard);
        assert!(standard.contains("<td style=\"padding: 4px;\">1</td>"));
    }

    #[test]
    fn transparent_background_remaps_dark_blocks() {
        let settings = StyleSettings::default().with_background(Background::Transparent);
        let out = inline_tag_styles("<pre>x</pre>", &template(), &settings, InlineVariant::Standard)
            .expect("rewrites");
        assert_eq!(
            out,
            "<pre style=\"background: #f5f5f5; color: #333333;\">x</pre>"
        );
    }

    #[test]
    fn container_combines_settings() {
        let settings = StyleSettings::default()
            .with_font_size(15)
            .with_background(Background::Color(HexColor::opaque(0xfa, 0xfa, 0xfa)));
        let template = template().with_style(StyleTag::Container, "padding: 8px; color: #111;");
        let declarations = container_declarations(&template, &settings).to_string();
        assert!(declarations.contains("font-size: 15px;"));
        assert!(declarations.contains("padding: 24px;"));
        assert!(declarations.contains("color: #111;"));
        assert!(declarations.contains("background-color: #fafafa;"));

        let transparent = container_declarations(
            &template,
            &settings.with_background(Background::Transparent),
        )
        .to_string();
        assert!(!transparent.contains("background"));
    }
}
