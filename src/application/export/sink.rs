use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::{ExportArtifact, ExportError};

const LOG_TARGET: &str = "application::export::sink";

/// Receives artifacts in export order.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn write(&self, artifact: &ExportArtifact) -> Result<(), ExportError>;
}

/// Writes each artifact as `<name>.<ext>` under a directory, creating it on demand.
#[derive(Debug, Clone)]
pub struct FsArtifactSink {
    root: PathBuf,
}

impl FsArtifactSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, artifact: &ExportArtifact) -> PathBuf {
        self.root.join(artifact.file_name())
    }
}

#[async_trait]
impl ArtifactSink for FsArtifactSink {
    async fn write(&self, artifact: &ExportArtifact) -> Result<(), ExportError> {
        let path = self.path_for(artifact);
        let sink_error = |source| ExportError::Sink {
            name: artifact.file_name(),
            source,
        };

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(sink_error)?;
        tokio::fs::write(&path, &artifact.bytes)
            .await
            .map_err(sink_error)?;

        info!(
            target = LOG_TARGET,
            op = "write",
            path = %path.display(),
            index = artifact.index,
            total = artifact.total,
            bytes = artifact.bytes.len(),
            "Wrote export artifact"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::export::ArtifactKind;

    #[tokio::test]
    async fn writes_named_files_under_root() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let sink = FsArtifactSink::new(dir.path().join("out"));
        let artifact = ExportArtifact::new(ArtifactKind::Image, "post", 2, 3, vec![1, 2, 3]);

        sink.write(&artifact).await.expect("write");

        let written = std::fs::read(dir.path().join("out").join("post_2.png")).expect("read");
        assert_eq!(written, vec![1, 2, 3]);
    }
}
