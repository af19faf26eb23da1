mod config;
mod highlight;
mod math;
mod mermaid;
mod placeholder;

use std::{path::PathBuf, sync::Arc, time::Instant};

use comrak::{Arena, format_html, nodes::AstNode, parse_document};
use metrics::counter;
use once_cell::sync::{Lazy, OnceCell};
use syntect::{html::ClassStyle, parsing::SyntaxSet};
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::render::types::{
    DiagramRenderer, MarkdownRenderer, RenderError, RenderOutput,
};
use crate::config::{DEFAULT_MERMAID_CACHE_DIR, DEFAULT_MERMAID_CLI_PATH};

pub use self::mermaid::MermaidCli;

use config::default_options;
use placeholder::{PlaceholderEntry, PlaceholderKind, PlaceholderTable};

const LOG_TARGET: &str = "application::render";
pub(crate) const METRIC_RENDER_DEGRADED: &str = "mdpress_render_degraded_total";

/// Markdown pipeline built on Comrak, Syntect class-based highlighting,
/// KaTeX and an optional diagram renderer.
pub struct ComrakRenderService {
    options: comrak::Options<'static>,
    syntax_set: SyntaxSet,
    class_style: ClassStyle,
    diagrams: Option<Arc<dyn DiagramRenderer>>,
}

impl ComrakRenderService {
    /// Construct a renderer using the process-wide pipeline configuration.
    fn new() -> Self {
        let config = active_render_config();
        let diagrams = match MermaidCli::new(
            config.mermaid_cli_path.clone(),
            config.mermaid_cache_dir.clone(),
        ) {
            Ok(cli) => Some(Arc::new(cli) as Arc<dyn DiagramRenderer>),
            Err(err) => {
                log_diagram_init_error(&err, &config);
                None
            }
        };
        Self::with_diagram_renderer(diagrams)
    }

    /// Construct a renderer with an explicit diagram backend. `None` leaves
    /// diagram sources in the output for client-side rendering.
    pub fn with_diagram_renderer(diagrams: Option<Arc<dyn DiagramRenderer>>) -> Self {
        Self {
            options: default_options(),
            syntax_set: SyntaxSet::load_defaults_newlines(),
            class_style: ClassStyle::SpacedPrefixed { prefix: "syntax-" },
            diagrams,
        }
    }

    pub fn syntax_set(&self) -> &SyntaxSet {
        &self.syntax_set
    }

    fn render_diagram(&self, source: &str, degraded: &mut usize) -> String {
        let Some(renderer) = self.diagrams.as_ref() else {
            return mermaid::deferred_markup(source);
        };

        match renderer.render_svg(source) {
            Ok(svg) => mermaid::diagram_markup(source, &svg),
            Err(err) => {
                *degraded += 1;
                counter!(METRIC_RENDER_DEGRADED, "kind" => "diagram").increment(1);
                warn!(
                    target = LOG_TARGET,
                    op = "render::diagram",
                    result = "degraded",
                    error = %err,
                    "Diagram replaced by error marker"
                );
                mermaid::error_markup(source, &err.to_string())
            }
        }
    }

    fn render_entry(&self, entry: &PlaceholderEntry, degraded: &mut usize) -> String {
        match entry.kind {
            PlaceholderKind::Diagram => self.render_diagram(&entry.source, degraded),
            PlaceholderKind::MathBlock | PlaceholderKind::MathInline => {
                let is_block = entry.kind == PlaceholderKind::MathBlock;
                match math::render_math_html(&entry.source, is_block) {
                    Ok(rendered) if is_block => math::wrap_block(&rendered),
                    Ok(rendered) => math::wrap_inline(&rendered),
                    Err(err) => {
                        *degraded += 1;
                        counter!(METRIC_RENDER_DEGRADED, "kind" => "math").increment(1);
                        warn!(
                            target = LOG_TARGET,
                            op = "render::math",
                            result = "degraded",
                            display_mode = is_block,
                            error = %err,
                            "Formula replaced by error marker"
                        );
                        math::error_marker(&entry.source, is_block)
                    }
                }
            }
        }
    }
}

static RENDER_SERVICE: Lazy<Arc<ComrakRenderService>> =
    Lazy::new(|| Arc::new(ComrakRenderService::new()));

/// Access the shared render service instance, initialised on first use.
pub fn render_service() -> Arc<ComrakRenderService> {
    Arc::clone(&RENDER_SERVICE)
}

impl Default for ComrakRenderService {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer for ComrakRenderService {
    fn render(&self, markdown: &str) -> Result<RenderOutput, RenderError> {
        let started_at = Instant::now();
        let extraction = placeholder::extract(markdown);

        let parsed = parse_stage(&extraction.processed, &self.options)?;

        let mut degraded = 0;
        let mut fenced_diagrams = 0;
        let annotated = highlight::annotate(&parsed, &self.syntax_set, &self.class_style, |source| {
            fenced_diagrams += 1;
            self.render_diagram(source, &mut degraded)
        })?;

        let html = restore_stage(&annotated.html, &extraction.table, |entry| {
            self.render_entry(entry, &mut degraded)
        })?;

        let entries = extraction.table.entries();
        let output = RenderOutput {
            html,
            contains_code: annotated.code_blocks > 0,
            contains_math: entries.iter().any(|e| e.kind != PlaceholderKind::Diagram),
            contains_diagram: fenced_diagrams > 0
                || entries.iter().any(|e| e.kind == PlaceholderKind::Diagram),
            degraded,
        };

        debug!(
            target = LOG_TARGET,
            op = "render::markdown",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            placeholders = entries.len(),
            code_blocks = annotated.code_blocks,
            degraded = output.degraded,
            "Markdown rendered"
        );

        Ok(output)
    }

    fn render_plain(&self, markdown: &str) -> Result<String, RenderError> {
        parse_stage(markdown, &self.options)
    }
}

#[derive(Debug, Clone)]
pub struct RenderPipelineConfig {
    pub mermaid_cli_path: PathBuf,
    pub mermaid_cache_dir: PathBuf,
}

impl Default for RenderPipelineConfig {
    fn default() -> Self {
        Self {
            mermaid_cli_path: PathBuf::from(DEFAULT_MERMAID_CLI_PATH),
            mermaid_cache_dir: PathBuf::from(DEFAULT_MERMAID_CACHE_DIR),
        }
    }
}

impl From<&crate::config::RenderSettings> for RenderPipelineConfig {
    fn from(settings: &crate::config::RenderSettings) -> Self {
        Self {
            mermaid_cli_path: settings.mermaid_cli_path.clone(),
            mermaid_cache_dir: settings.mermaid_cache_dir.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderConfigError {
    #[error("render service already configured")]
    AlreadyConfigured,
}

static RENDER_PIPELINE_CONFIG: OnceCell<RenderPipelineConfig> = OnceCell::new();

pub fn configure_render_service(config: RenderPipelineConfig) -> Result<(), RenderConfigError> {
    RENDER_PIPELINE_CONFIG
        .set(config)
        .map_err(|_| RenderConfigError::AlreadyConfigured)
}

fn active_render_config() -> RenderPipelineConfig {
    RENDER_PIPELINE_CONFIG.get().cloned().unwrap_or_default()
}

fn log_diagram_init_error(error: &RenderError, config: &RenderPipelineConfig) {
    warn!(
        target = "application::render::diagram",
        cli_path = %config.mermaid_cli_path.display(),
        cache_dir = %config.mermaid_cache_dir.display(),
        error = %error,
        "Diagram renderer disabled"
    );
}

fn parse_stage(markdown: &str, options: &comrak::Options<'static>) -> Result<String, RenderError> {
    let arena = Arena::new();
    let root = parse_document(&arena, markdown, options);
    render_html_stage(root, options)
}

fn render_html_stage<'a>(
    root: &'a AstNode<'a>,
    options: &comrak::Options<'static>,
) -> Result<String, RenderError> {
    let mut html = String::new();
    format_html(root, options, &mut html).map_err(|err| RenderError::Markdown {
        message: err.to_string(),
    })?;
    Ok(html)
}

fn restore_stage<F>(
    html: &str,
    table: &PlaceholderTable,
    render: F,
) -> Result<String, RenderError>
where
    F: FnMut(&PlaceholderEntry) -> String,
{
    placeholder::restore(html, table, render)
}
