//! Raster and paginated exports of a rendered document.
//!
//! The live tree is owned by the presentation surface; everything here
//! borrows it exclusively for the length of one capture, so overlapping
//! captures of the same node cannot be expressed.

pub mod paginate;
pub mod raster;
pub mod sections;
mod service;
mod sink;
pub mod visual;

use serde::Serialize;
use thiserror::Error;

pub use paginate::{PageImage, PageLayout, PaginatedDocument, paginate};
pub use raster::{FixedSize, RasterOptions, RasterRequest, Rasterizer, capture, compose_fixed};
pub use sections::{MAX_SECTIONS, Section, SizePreset, SplitMode, artifact_name, split_sections};
pub use service::{DEFAULT_SECTION_DELAY, ExportService, SectionOptions, encode_png};
pub(crate) use service::METRIC_EXPORT_ARTIFACTS;
pub use sink::{ArtifactSink, FsArtifactSink};
pub use visual::{Attached, Layout, LiveDocument, OffscreenStage, StyleGuard, VisualNode};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("rasterizer failed: {message}")]
    Rasterizer { message: String },
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to assemble PDF: {message}")]
    Pdf { message: String },
    #[error("nothing to export: {reason}")]
    Empty { reason: String },
    #[error("failed to write `{name}`: {source}")]
    Sink {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Document,
    HtmlString,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Document => "document",
            ArtifactKind::HtmlString => "html",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "png",
            ArtifactKind::Document => "pdf",
            ArtifactKind::HtmlString => "html",
        }
    }
}

/// One output unit. `index` is 1-based; artifacts of one export are
/// returned in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub kind: ArtifactKind,
    pub index: usize,
    pub total: usize,
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// `name` is derived from `base` and the position, see [`artifact_name`].
    pub fn new(kind: ArtifactKind, base: &str, index: usize, total: usize, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            index,
            total,
            name: artifact_name(base, index, total),
            bytes,
        }
    }

    pub fn html(base: &str, html: String) -> Self {
        Self::new(ArtifactKind::HtmlString, base, 1, 1, html.into_bytes())
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.kind.extension())
    }
}
