//! One-shot Markdown conversions shared by the HTTP API and the CLI.

use std::{fmt, str::FromStr, sync::Arc, time::Instant};

use metrics::counter;
use mdpress_api_types::{ConvertRequest, TemplateRef, TemplateSummary};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    application::{
        render::{MarkdownRenderer, RenderError},
        style::{self, StyleError},
    },
    domain::{
        catalog::TemplateCatalog, error::DomainError, settings::StyleSettings, template::Template,
    },
};

const LOG_TARGET: &str = "application::convert";
pub(crate) const METRIC_CONVERT_TOTAL: &str = "mdpress_convert_total";

const WECHAT_FONT_SIZE_PX: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertTarget {
    /// Standalone document with a stylesheet.
    Html,
    /// Table-based email document with inlined styles.
    Email,
    /// Inlined fragment for editors that drop stylesheets.
    Wechat,
    /// Parser output, unstyled.
    Plain,
}

impl ConvertTarget {
    pub const ALL: [ConvertTarget; 4] = [
        ConvertTarget::Html,
        ConvertTarget::Email,
        ConvertTarget::Wechat,
        ConvertTarget::Plain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConvertTarget::Html => "html",
            ConvertTarget::Email => "email",
            ConvertTarget::Wechat => "wechat",
            ConvertTarget::Plain => "plain",
        }
    }

    pub fn default_template_id(&self) -> Option<&'static str> {
        match self {
            ConvertTarget::Html => Some("general-modern"),
            ConvertTarget::Email => Some("email-business"),
            ConvertTarget::Wechat => Some("wechat-tech"),
            ConvertTarget::Plain => None,
        }
    }

    pub fn default_settings(&self) -> StyleSettings {
        match self {
            ConvertTarget::Wechat => StyleSettings::default().with_font_size(WECHAT_FONT_SIZE_PX),
            _ => StyleSettings::default(),
        }
    }
}

impl fmt::Display for ConvertTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConvertTarget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ConvertTarget::ALL
            .into_iter()
            .find(|target| target.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown conversion target `{value}`"))
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Style(#[from] StyleError),
}

impl ConvertError {
    /// Rejected before any pipeline stage ran.
    pub fn is_input_error(&self) -> bool {
        matches!(self, ConvertError::Domain(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub html: String,
    pub template: Option<TemplateRef>,
    /// Formulas or diagrams replaced by error markers.
    pub degraded: usize,
}

#[derive(Clone)]
pub struct ConvertService {
    renderer: Arc<dyn MarkdownRenderer>,
    catalog: Arc<TemplateCatalog>,
}

impl ConvertService {
    pub fn new(renderer: Arc<dyn MarkdownRenderer>, catalog: Arc<TemplateCatalog>) -> Self {
        Self { renderer, catalog }
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn convert(
        &self,
        target: ConvertTarget,
        request: &ConvertRequest,
    ) -> Result<Conversion, ConvertError> {
        let started = Instant::now();
        let result = self.convert_inner(target, request);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(conversion) => {
                counter!(METRIC_CONVERT_TOTAL, "target" => target.as_str(), "result" => "ok")
                    .increment(1);
                info!(
                    target = LOG_TARGET,
                    op = "convert",
                    result = "ok",
                    conversion = target.as_str(),
                    template = conversion.template.as_ref().map(|t| t.id.as_str()),
                    degraded = conversion.degraded,
                    bytes = conversion.html.len(),
                    elapsed_ms,
                    "Converted markdown"
                );
            }
            Err(err) => {
                let outcome = if err.is_input_error() { "rejected" } else { "error" };
                counter!(METRIC_CONVERT_TOTAL, "target" => target.as_str(), "result" => outcome)
                    .increment(1);
                warn!(
                    target = LOG_TARGET,
                    op = "convert",
                    result = outcome,
                    conversion = target.as_str(),
                    error = %err,
                    elapsed_ms,
                    "Conversion failed"
                );
            }
        }
        result
    }

    fn convert_inner(
        &self,
        target: ConvertTarget,
        request: &ConvertRequest,
    ) -> Result<Conversion, ConvertError> {
        let markdown = request
            .markdown
            .as_deref()
            .filter(|markdown| !markdown.trim().is_empty())
            .ok_or(DomainError::MissingMarkdown)?;

        let Some(default_template) = target.default_template_id() else {
            let html = self.renderer.render_plain(markdown)?;
            return Ok(Conversion {
                html: style::to_plain_html(&html),
                template: None,
                degraded: 0,
            });
        };

        let template_id = request
            .template_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(default_template);
        let template = self.catalog.require(template_id)?;
        let settings = StyleSettings::resolve(
            target.default_settings(),
            request.font_size,
            request.margin,
            request.background_color.as_deref(),
        )?;

        let rendered = self.renderer.render(markdown)?;
        let html = match target {
            ConvertTarget::Html => style::to_styled_document(&rendered.html, template, &settings)?,
            ConvertTarget::Email => {
                style::to_email_document(&rendered.html, markdown, template, &settings)?
            }
            ConvertTarget::Wechat => style::to_inlined_html(&rendered.html, template, &settings)?,
            ConvertTarget::Plain => style::to_plain_html(&rendered.html),
        };

        Ok(Conversion {
            html,
            template: Some(template_ref(template)),
            degraded: rendered.degraded,
        })
    }
}

/// Catalog entry as listed by `GET /api/convert/templates` and `mdpress templates`.
pub fn template_summary(template: &Template) -> TemplateSummary {
    TemplateSummary {
        id: template.id.clone(),
        name: template.name.clone(),
        format: template.format.as_str().to_string(),
        description: template.description.clone(),
        theme_colors: template.theme_colors.clone(),
    }
}

fn template_ref(template: &Template) -> TemplateRef {
    TemplateRef {
        id: template.id.clone(),
        name: template.name.clone(),
    }
}
