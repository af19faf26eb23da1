use std::{
    fs,
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::Instant,
};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::{
    markup::{encode_uri_component, escape_html},
    render::types::{DiagramRenderer, RenderError},
};

const LOG_TARGET: &str = "application::render::diagram";

#[derive(Debug, Error)]
pub(crate) enum MermaidCliError {
    #[error("failed to prepare cache directory: {0}")]
    CacheInit(io::Error),
    #[error("failed to stage diagram source: {0}")]
    Io(io::Error),
    #[error("mermaid CLI exited with {exit_code:?}: {stderr}")]
    Cli {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("mermaid CLI not found: {0}")]
    NotFound(io::Error),
    #[error("failed to read rendered SVG: {0}")]
    Read(io::Error),
}

impl From<MermaidCliError> for RenderError {
    fn from(err: MermaidCliError) -> Self {
        RenderError::Diagram {
            message: err.to_string(),
        }
    }
}

/// Renders Mermaid sources by invoking `mmdc`, caching SVG output by content hash.
#[derive(Debug, Clone)]
pub struct MermaidCli {
    cli_path: PathBuf,
    cache_dir: PathBuf,
}

impl MermaidCli {
    pub fn new(cli_path: PathBuf, cache_dir: PathBuf) -> Result<Self, RenderError> {
        Self::prepare(cli_path, cache_dir).map_err(RenderError::from)
    }

    pub(crate) fn prepare(cli_path: PathBuf, cache_dir: PathBuf) -> Result<Self, MermaidCliError> {
        fs::create_dir_all(&cache_dir).map_err(MermaidCliError::CacheInit)?;
        Ok(Self {
            cli_path,
            cache_dir,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cached(&self, cache_path: &Path, started_at: Instant) -> Option<String> {
        match fs::read_to_string(cache_path) {
            Ok(svg) => {
                info!(
                    target = LOG_TARGET,
                    op = "mermaid::render_svg",
                    result = "cache_hit",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    svg_bytes = svg.len(),
                    "Diagram served from cache"
                );
                Some(svg)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                warn!(
                    target = LOG_TARGET,
                    op = "mermaid::render_svg",
                    result = "cache_read_error",
                    cache_path = %cache_path.display(),
                    error = %err,
                    "Cached diagram unreadable; re-rendering"
                );
                None
            }
        }
    }

    fn invoke(&self, source: &str) -> Result<String, MermaidCliError> {
        let started_at = Instant::now();
        let cache_path = self.cache_dir.join(format!("{}.svg", hash_source(source)));
        if let Some(svg) = self.cached(&cache_path, started_at) {
            return Ok(svg);
        }

        let mut input = NamedTempFile::new().map_err(MermaidCliError::Io)?;
        input
            .write_all(source.as_bytes())
            .map_err(MermaidCliError::Io)?;
        input.flush().map_err(MermaidCliError::Io)?;

        // mmdc picks the output format from the file suffix.
        let staged = tempfile::Builder::new()
            .suffix(".svg")
            .tempfile_in(&self.cache_dir)
            .map_err(MermaidCliError::Io)?;

        let output = Command::new(&self.cli_path)
            .arg("--input")
            .arg(input.path())
            .arg("--output")
            .arg(staged.path())
            .arg("--outputFormat")
            .arg("svg")
            .arg("--quiet")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    MermaidCliError::NotFound(err)
                } else {
                    MermaidCliError::Io(err)
                }
            })?;

        if !output.status.success() {
            return Err(MermaidCliError::Cli {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match staged.persist(&cache_path) {
            Ok(_) => {}
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {}
            Err(err) => return Err(MermaidCliError::Io(err.error)),
        }

        let svg = fs::read_to_string(&cache_path).map_err(MermaidCliError::Read)?;
        info!(
            target = LOG_TARGET,
            op = "mermaid::render_svg",
            result = "cache_miss",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            svg_bytes = svg.len(),
            "Diagram rendered via CLI"
        );
        Ok(svg)
    }
}

impl DiagramRenderer for MermaidCli {
    fn render_svg(&self, source: &str) -> Result<String, RenderError> {
        self.invoke(source).map_err(|err| {
            warn!(
                target = LOG_TARGET,
                op = "mermaid::render_svg",
                result = "error",
                cli_path = %self.cli_path.display(),
                error = %err,
                "Diagram rendering failed"
            );
            RenderError::from(err)
        })
    }
}

fn hash_source(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

fn open_container(source: &str) -> String {
    format!(
        "<div class=\"mermaid-diagram\" data-mermaid=\"{}\">",
        encode_uri_component(source)
    )
}

pub(crate) fn diagram_markup(source: &str, svg: &str) -> String {
    format!("{}{svg}</div>", open_container(source))
}

/// Source kept verbatim for a client-side renderer.
pub(crate) fn deferred_markup(source: &str) -> String {
    format!(
        "{}<pre class=\"mermaid\">{}</pre></div>",
        open_container(source),
        escape_html(source)
    )
}

pub(crate) fn error_markup(source: &str, message: &str) -> String {
    format!(
        "<div class=\"mermaid-diagram render-error\" data-mermaid=\"{}\">\
<p style=\"color: red;\">[diagram error: {}]</p><pre class=\"mermaid\">{}</pre></div>",
        encode_uri_component(source),
        escape_html(message),
        escape_html(source)
    )
}
