//! Built-in template catalog, loaded from an embedded TOML document.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use super::{
    error::DomainError,
    template::{StyleTag, Template, TemplateFormat},
};

const BUILTIN_TEMPLATES: &str = include_str!("templates.toml");

#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
}

impl TemplateCatalog {
    /// Catalog of templates shipped with the crate.
    pub fn builtin() -> Result<Self, DomainError> {
        Self::from_toml(BUILTIN_TEMPLATES)
    }

    pub fn from_toml(source: &str) -> Result<Self, DomainError> {
        let raw: RawCatalog = toml::from_str(source)
            .map_err(|err| DomainError::catalog(format!("failed to parse templates: {err}")))?;

        let mut catalog = Self {
            templates: Vec::with_capacity(raw.templates.len()),
        };
        for entry in raw.templates {
            catalog.insert(entry.into_template()?)?;
        }
        Ok(catalog)
    }

    /// Append templates from another TOML document. Ids must stay unique.
    pub fn extend_from_toml(&mut self, source: &str) -> Result<(), DomainError> {
        let other = Self::from_toml(source)?;
        for template in other.templates {
            self.insert(template)?;
        }
        Ok(())
    }

    fn insert(&mut self, template: Template) -> Result<(), DomainError> {
        if template.id.trim().is_empty() {
            return Err(DomainError::catalog("template id must not be empty"));
        }
        if self.get(&template.id).is_some() {
            return Err(DomainError::catalog(format!(
                "duplicate template id `{}`",
                template.id
            )));
        }
        self.templates.push(template);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|template| template.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&Template, DomainError> {
        self.get(id)
            .ok_or_else(|| DomainError::unknown_template(id))
    }

    pub fn by_format(&self, format: TemplateFormat) -> impl Iterator<Item = &Template> {
        self.templates
            .iter()
            .filter(move |template| template.format == format)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    templates: Vec<RawTemplate>,
}

#[derive(Debug, Deserialize)]
struct RawTemplate {
    id: String,
    name: String,
    format: TemplateFormat,
    #[serde(default)]
    description: String,
    #[serde(default)]
    theme_colors: Vec<String>,
    #[serde(default)]
    styles: BTreeMap<String, String>,
}

impl RawTemplate {
    fn into_template(self) -> Result<Template, DomainError> {
        let mut seen = HashSet::new();
        let mut styles = BTreeMap::new();
        for (key, declaration) in self.styles {
            let tag: StyleTag = key.parse().map_err(|_| {
                DomainError::catalog(format!(
                    "template `{}` styles unknown tag `{key}`",
                    self.id
                ))
            })?;
            if !seen.insert(tag) {
                return Err(DomainError::catalog(format!(
                    "template `{}` styles `{tag}` twice",
                    self.id
                )));
            }
            styles.insert(tag, declaration);
        }

        Ok(Template {
            id: self.id,
            name: self.name,
            format: self.format,
            description: self.description,
            theme_colors: self.theme_colors,
            styles,
        })
    }
}
