use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of running Markdown through the full pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutput {
    /// HTML fragment with math, diagrams and code blocks restored and annotated.
    pub html: String,
    /// Indicates whether any fenced code block was highlighted.
    pub contains_code: bool,
    /// Indicates whether any math span or block was rendered.
    pub contains_math: bool,
    /// Indicates whether any diagram block was emitted.
    pub contains_diagram: bool,
    /// Number of formulas or diagrams replaced by a visible error marker.
    #[serde(default)]
    pub degraded: usize,
}

/// Structured errors surfaced by the rendering pipeline. Renderer failures for
/// individual formulas or diagrams never appear here; they degrade in place.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("markdown parsing failed: {message}")]
    Markdown { message: String },
    #[error("syntax highlighting failed: {language}: {message}")]
    Highlighting { language: String, message: String },
    #[error("placeholder restoration failed: {message}")]
    Placeholder { message: String },
    #[error("math rendering failed: {message}")]
    Math { message: String },
    #[error("diagram rendering failed: {message}")]
    Diagram { message: String },
    #[error("document processing failed: {message}")]
    Document { message: String },
}

/// Markdown to HTML pipeline. Implementations must be deterministic for a
/// given input and renderer configuration.
pub trait MarkdownRenderer: Send + Sync {
    /// Full pipeline: placeholder extraction, parsing, highlighting, restoration.
    fn render(&self, markdown: &str) -> Result<RenderOutput, RenderError>;

    /// Parser output only, with no math, diagram or highlighting passes.
    fn render_plain(&self, markdown: &str) -> Result<String, RenderError>;
}

/// Turns diagram source into SVG markup.
pub trait DiagramRenderer: Send + Sync {
    fn render_svg(&self, source: &str) -> Result<String, RenderError>;
}
