use std::fmt::Write as _;

use once_cell::sync::Lazy;
use syntect::{
    highlighting::ThemeSet,
    html::{ClassStyle, css_for_theme_with_class_style},
};

use crate::domain::{
    color::HexColor,
    settings::StyleSettings,
    template::{StyleTag, Template},
};

use super::{StyleError, declarations::Declarations, inline::CONTAINER_CLASS};

static THEMES: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

const LIGHT_CODE_THEME: &str = "InspiredGitHub";
const DARK_CODE_THEME: &str = "base16-ocean.dark";

const STYLESHEET_SUBHEADINGS: [(&str, &str); 3] = [
    ("h4", "font-size: 1.1em; font-weight: bold; margin: 16px 0 8px 0;"),
    ("h5", "font-size: 1em; font-weight: bold; margin: 14px 0 6px 0;"),
    (
        "h6",
        "font-size: 0.9em; font-weight: bold; margin: 12px 0 4px 0; color: #6b7280;",
    ),
];

const IMG_RULE: &str = "max-width: 100%; height: auto;";
const PRE_CODE_RULE: &str = "pre code { background: none; padding: 0; }";

/// Complete HTML document with one stylesheet rule per semantic tag.
pub(crate) fn to_styled_document(
    html: &str,
    template: &Template,
    settings: &StyleSettings,
) -> Result<String, StyleError> {
    let css = stylesheet(template, settings)?;
    Ok(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
<title>Markdown Export</title>\n<style>\n{css}</style>\n</head>\n<body>\n\
<div class=\"{CONTAINER_CLASS}\">\n{html}</div>\n</body>\n</html>\n"
    ))
}

pub(crate) fn stylesheet(template: &Template, settings: &StyleSettings) -> Result<String, StyleError> {
    let font_size = format!("font-size: {}px;", settings.font_size);
    let mut css = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(css, "* {{ box-sizing: border-box; }}");
    let _ = writeln!(
        css,
        "body {{ margin: 0; background-color: {}; {font_size} }}",
        settings.background
    );

    let mut container = Declarations::parse(template.declaration(StyleTag::Container));
    container.set("font-size", format!("{}px", settings.font_size));
    container.set("padding", format!("{}px", settings.margin));
    container.set("background-color", settings.background.to_string());
    let _ = writeln!(css, ".{CONTAINER_CLASS} {{ {container} }}");

    for tag in StyleTag::ALL {
        if matches!(tag, StyleTag::Container | StyleTag::Img) {
            continue;
        }
        let declaration = template.declaration(tag).trim();
        let _ = writeln!(
            css,
            ".{CONTAINER_CLASS} {tag} {{ {font_size} {declaration} }}"
        );
        if tag == StyleTag::H3 {
            for (name, declaration) in STYLESHEET_SUBHEADINGS {
                let _ = writeln!(css, ".{CONTAINER_CLASS} {name} {{ {declaration} }}");
            }
        }
    }

    let _ = writeln!(css, ".{CONTAINER_CLASS} img {{ {IMG_RULE} }}");
    let _ = writeln!(css, "{PRE_CODE_RULE}");
    css.push_str(&code_theme_css(template)?);

    Ok(css)
}

/// Token colours for the highlighter's class names, chosen to contrast with
/// the template's code block background.
fn code_theme_css(template: &Template) -> Result<String, StyleError> {
    let pre = Declarations::parse(template.declaration(StyleTag::Pre));
    let dark = ["background-color", "background"]
        .into_iter()
        .filter_map(|property| pre.get(property))
        .find_map(HexColor::parse)
        .is_some_and(|color| color.is_dark());

    let name = if dark { DARK_CODE_THEME } else { LIGHT_CODE_THEME };
    let Some(theme) = THEMES.themes.get(name) else {
        return Ok(String::new());
    };

    css_for_theme_with_class_style(theme, ClassStyle::SpacedPrefixed { prefix: "syntax-" })
        .map_err(|err| StyleError::Theme {
            message: err.to_string(),
        })
}
