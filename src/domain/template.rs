//! Templates map a closed set of semantic tags to CSS declaration strings.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Semantic tags a template may style. `Container` is the outer wrapper and
/// never corresponds to a parser-emitted element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleTag {
    Container,
    H1,
    H2,
    H3,
    P,
    Blockquote,
    Code,
    Pre,
    Ul,
    Ol,
    Li,
    A,
    Table,
    Th,
    Td,
    Hr,
    Img,
}

impl StyleTag {
    pub const ALL: [StyleTag; 17] = [
        StyleTag::Container,
        StyleTag::H1,
        StyleTag::H2,
        StyleTag::H3,
        StyleTag::P,
        StyleTag::Blockquote,
        StyleTag::Code,
        StyleTag::Pre,
        StyleTag::Ul,
        StyleTag::Ol,
        StyleTag::Li,
        StyleTag::A,
        StyleTag::Table,
        StyleTag::Th,
        StyleTag::Td,
        StyleTag::Hr,
        StyleTag::Img,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StyleTag::Container => "container",
            StyleTag::H1 => "h1",
            StyleTag::H2 => "h2",
            StyleTag::H3 => "h3",
            StyleTag::P => "p",
            StyleTag::Blockquote => "blockquote",
            StyleTag::Code => "code",
            StyleTag::Pre => "pre",
            StyleTag::Ul => "ul",
            StyleTag::Ol => "ol",
            StyleTag::Li => "li",
            StyleTag::A => "a",
            StyleTag::Table => "table",
            StyleTag::Th => "th",
            StyleTag::Td => "td",
            StyleTag::Hr => "hr",
            StyleTag::Img => "img",
        }
    }

    /// Map an HTML element name onto its semantic tag. The container has no
    /// element of its own and is never returned.
    pub fn for_element(name: &str) -> Option<Self> {
        match name.parse::<StyleTag>() {
            Ok(StyleTag::Container) | Err(_) => None,
            Ok(tag) => Some(tag),
        }
    }

    /// Declaration used when a template does not style the tag.
    pub fn builtin_default(self) -> &'static str {
        match self {
            StyleTag::Container => "",
            StyleTag::H1 => {
                "margin-top: 1.2em; margin-bottom: 0.8em; font-weight: bold; font-size: 1.6em; color: #333;"
            }
            StyleTag::H2 => {
                "margin-top: 1em; margin-bottom: 0.6em; font-weight: bold; font-size: 1.4em; color: #333;"
            }
            StyleTag::H3 => {
                "margin-top: 0.8em; margin-bottom: 0.5em; font-weight: bold; font-size: 1.2em; color: #333;"
            }
            StyleTag::P => "margin: 0.8em 0; color: #333; text-align: justify;",
            StyleTag::Blockquote => {
                "margin: 1em 0; padding: 10px 15px; border-left: 4px solid #ddd; background-color: #f8f8f8; color: #666;"
            }
            StyleTag::Code => {
                "background-color: rgba(0,0,0,0.05); padding: 2px 5px; border-radius: 3px; font-family: Menlo, Monaco, Consolas, monospace; font-size: 0.9em; color: #c7254e;"
            }
            StyleTag::Pre => {
                "margin: 1em 0; padding: 15px; background-color: #282c34; border-radius: 5px; overflow-x: auto; white-space: pre-wrap; word-wrap: break-word;"
            }
            StyleTag::Ul => "margin: 0.8em 0; padding-left: 1.5em; list-style-type: disc;",
            StyleTag::Ol => "margin: 0.8em 0; padding-left: 1.5em; list-style-type: decimal;",
            StyleTag::Li => "margin: 0.3em 0; color: #333;",
            StyleTag::A => "color: #576b95; text-decoration: none;",
            StyleTag::Table => {
                "width: 100%; border-collapse: collapse; margin: 1em 0; background-color: #fff;"
            }
            StyleTag::Th => {
                "padding: 10px; border: 1px solid #ddd; background-color: #f5f5f5; font-weight: bold; text-align: left; color: #333;"
            }
            StyleTag::Td => "padding: 10px; border: 1px solid #ddd; color: #333;",
            StyleTag::Hr => "border: none; height: 1px; background-color: #eee; margin: 1.5em 0;",
            StyleTag::Img => "max-width: 100%; height: auto; display: block; margin: 0.8em auto;",
        }
    }
}

impl fmt::Display for StyleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StyleTag {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        StyleTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == lowered)
            .ok_or_else(|| DomainError::validation("styles", format!("unknown style tag `{value}`")))
    }
}

/// Client family a template was designed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    General,
    Wechat,
    Xiaohongshu,
    Email,
    Resume,
}

impl TemplateFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateFormat::General => "general",
            TemplateFormat::Wechat => "wechat",
            TemplateFormat::Xiaohongshu => "xiaohongshu",
            TemplateFormat::Email => "email",
            TemplateFormat::Resume => "resume",
        }
    }
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable styling template supplied whole to each conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub format: TemplateFormat,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub theme_colors: Vec<String>,
    #[serde(default)]
    pub styles: BTreeMap<StyleTag, String>,
}

impl Template {
    pub fn new(id: impl Into<String>, name: impl Into<String>, format: TemplateFormat) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            format,
            description: String::new(),
            theme_colors: Vec::new(),
            styles: BTreeMap::new(),
        }
    }

    pub fn with_style(mut self, tag: StyleTag, declaration: impl Into<String>) -> Self {
        self.styles.insert(tag, declaration.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Effective declaration for `tag`: the template's own value when it is
    /// non-blank, otherwise the built-in default, otherwise empty.
    pub fn declaration(&self, tag: StyleTag) -> &str {
        self.styles
            .get(&tag)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| tag.builtin_default())
    }
}
