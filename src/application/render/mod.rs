//! Markdown rendering pipeline.
//!
//! Rendering is pure: it accepts Markdown, produces deterministic HTML and
//! surfaces structured errors. Individual formulas or diagrams that fail to
//! render degrade to visible markers instead of failing the document.

mod service;
mod types;

pub(crate) use service::METRIC_RENDER_DEGRADED;
pub use service::{
    ComrakRenderService, MermaidCli, RenderConfigError, RenderPipelineConfig,
    configure_render_service, render_service,
};
pub use types::{DiagramRenderer, MarkdownRenderer, RenderError, RenderOutput};
