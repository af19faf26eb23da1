use std::{
    io::Cursor,
    sync::Arc,
    time::{Duration, Instant},
};

use image::{ExtendedColorType, ImageEncoder, RgbaImage, codecs::png::PngEncoder};
use metrics::counter;
use tracing::{error, info};

use super::{
    ArtifactKind, ExportArtifact, ExportError,
    paginate::{PageLayout, paginate},
    raster::{RasterOptions, Rasterizer, capture},
    sections::{Section, SizePreset, SplitMode, split_sections},
    sink::ArtifactSink,
    visual::{LiveDocument, StyleGuard, VisualNode},
};

const LOG_TARGET: &str = "application::export";
pub(crate) const METRIC_EXPORT_ARTIFACTS: &str = "mdpress_export_artifacts_total";

pub const DEFAULT_SECTION_DELAY: Duration = Duration::from_millis(300);

/// Options for a sectioned social-image export.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SectionOptions {
    pub raster: RasterOptions,
    pub preset: SizePreset,
    pub split: SplitMode,
}

/// Runs captures against one presentation surface and hands the encoded
/// artifacts to a sink, strictly one capture at a time.
#[derive(Clone)]
pub struct ExportService {
    rasterizer: Arc<dyn Rasterizer>,
    sink: Arc<dyn ArtifactSink>,
    section_delay: Duration,
}

impl ExportService {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, sink: Arc<dyn ArtifactSink>) -> Self {
        Self {
            rasterizer,
            sink,
            section_delay: DEFAULT_SECTION_DELAY,
        }
    }

    /// Pause between consecutive section artifacts.
    pub fn with_section_delay(mut self, delay: Duration) -> Self {
        self.section_delay = delay;
        self
    }

    /// One PNG of the whole node.
    pub async fn export_image(
        &self,
        node: &mut VisualNode,
        base_name: &str,
        options: &RasterOptions,
    ) -> Result<ExportArtifact, ExportError> {
        let started = Instant::now();
        let result = async {
            let image = capture(self.rasterizer.as_ref(), node, options).await?;
            let artifact =
                ExportArtifact::new(ArtifactKind::Image, base_name, 1, 1, encode_png(&image)?);
            self.deliver(&artifact).await?;
            Ok::<_, ExportError>(artifact)
        }
        .await;
        log_outcome("export_image", base_name, started, &result.as_ref().map(|_| 1));
        result
    }

    /// Split the content into sections and export each as its own PNG on a
    /// fixed-size canvas, in order.
    pub async fn export_sections(
        &self,
        document: &mut LiveDocument,
        base_name: &str,
        options: &SectionOptions,
    ) -> Result<Vec<ExportArtifact>, ExportError> {
        let started = Instant::now();
        let result = self.export_sections_inner(document, base_name, options).await;
        log_outcome(
            "export_sections",
            base_name,
            started,
            &result.as_ref().map(Vec::len),
        );
        result
    }

    async fn export_sections_inner(
        &self,
        document: &mut LiveDocument,
        base_name: &str,
        options: &SectionOptions,
    ) -> Result<Vec<ExportArtifact>, ExportError> {
        let fixed = options.preset.fixed_size();
        let raster = RasterOptions {
            fixed_size: Some(fixed),
            ..options.raster
        };

        let (content, stage) = document.split_mut();
        let mut guard = StyleGuard::new(content);
        guard.set("width", format!("{}px", fixed.width));
        guard.set("max-width", format!("{}px", fixed.width));
        guard.set("padding", format!("{}px", raster.margin));

        let sections = split_sections(guard.node(), options.split, fixed.height, raster.margin);
        let total = sections.len();
        let mut artifacts = Vec::with_capacity(total);

        for (position, section) in sections.into_iter().enumerate() {
            let image = match section {
                Section::Whole => capture(self.rasterizer.as_ref(), guard.node_mut(), &raster).await?,
                Section::Slice(node) => {
                    let mut attached = stage.attach(node);
                    capture(self.rasterizer.as_ref(), attached.node_mut(), &raster).await?
                }
            };

            let artifact = ExportArtifact::new(
                ArtifactKind::Image,
                base_name,
                position + 1,
                total,
                encode_png(&image)?,
            );
            self.deliver(&artifact).await?;
            artifacts.push(artifact);

            if position + 1 < total && !self.section_delay.is_zero() {
                tokio::time::sleep(self.section_delay).await;
            }
        }

        Ok(artifacts)
    }

    /// Capture the node once at its intrinsic height and paginate it into a PDF.
    pub async fn export_pdf(
        &self,
        node: &mut VisualNode,
        base_name: &str,
        options: &RasterOptions,
        layout: PageLayout,
    ) -> Result<ExportArtifact, ExportError> {
        let started = Instant::now();
        let result = async {
            let raster = RasterOptions {
                fixed_size: None,
                ..*options
            };
            let image = capture(self.rasterizer.as_ref(), node, &raster).await?;
            let document = paginate(&image, layout, options.background.raster_fill())?;
            let artifact =
                ExportArtifact::new(ArtifactKind::Document, base_name, 1, 1, document.to_pdf());
            self.deliver(&artifact).await?;
            Ok::<_, ExportError>((artifact, document.page_count()))
        }
        .await;
        log_outcome(
            "export_pdf",
            base_name,
            started,
            &result.as_ref().map(|(_, pages)| *pages),
        );
        result.map(|(artifact, _)| artifact)
    }

    async fn deliver(&self, artifact: &ExportArtifact) -> Result<(), ExportError> {
        self.sink.write(artifact).await?;
        counter!(METRIC_EXPORT_ARTIFACTS, "kind" => artifact.kind.as_str()).increment(1);
        Ok(())
    }
}

fn log_outcome(
    op: &'static str,
    base_name: &str,
    started: Instant,
    outcome: &Result<usize, &ExportError>,
) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(count) => info!(
            target = LOG_TARGET,
            op,
            result = "ok",
            name = base_name,
            count,
            elapsed_ms,
            "Export finished"
        ),
        Err(err) => error!(
            target = LOG_TARGET,
            op,
            result = "error",
            name = base_name,
            error = %err,
            elapsed_ms,
            "Export failed"
        ),
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Cursor::new(Vec::new());
    PngEncoder::new(&mut bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(bytes.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::Rgba;
    use std::sync::Mutex;

    use crate::application::export::raster::RasterRequest;

    struct FakeRasterizer {
        offscreen_seen: Mutex<Vec<Option<String>>>,
        fail_on: Option<usize>,
        calls: Mutex<usize>,
    }

    impl FakeRasterizer {
        fn new() -> Self {
            Self {
                offscreen_seen: Mutex::new(Vec::new()),
                fail_on: None,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Rasterizer for FakeRasterizer {
        async fn rasterize(
            &self,
            node: &VisualNode,
            request: &RasterRequest,
        ) -> Result<RgbaImage, ExportError> {
            let call = {
                let mut calls = self.calls.lock().expect("lock");
                *calls += 1;
                *calls
            };
            self.offscreen_seen
                .lock()
                .expect("lock")
                .push(node.style.get("left").map(str::to_string));
            if self.fail_on == Some(call) {
                return Err(ExportError::Rasterizer {
                    message: "surface lost".into(),
                });
            }
            let width = request.width.map_or(node.layout.width, |w| w as f32).max(1.0);
            let height = node.layout.height.max(1.0);
            Ok(RgbaImage::from_pixel(
                (width * request.scale) as u32,
                (height * request.scale) as u32,
                Rgba([0, 0, 0, 255]),
            ))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        written: Mutex<Vec<(String, usize, usize)>>,
    }

    #[async_trait]
    impl ArtifactSink for MemorySink {
        async fn write(&self, artifact: &ExportArtifact) -> Result<(), ExportError> {
            self.written
                .lock()
                .expect("lock")
                .push((artifact.file_name(), artifact.index, artifact.total));
            Ok(())
        }
    }

    fn document(children: Vec<VisualNode>) -> LiveDocument {
        LiveDocument::new(
            VisualNode::new("div")
                .with_class("md-container")
                .with_style("padding: 8px;")
                .with_layout(720.0, 1200.0)
                .with_children(children),
        )
    }

    fn service(rasterizer: Arc<FakeRasterizer>, sink: Arc<MemorySink>) -> ExportService {
        ExportService::new(rasterizer, sink).with_section_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn sections_are_numbered_in_order_and_detached() {
        let rasterizer = Arc::new(FakeRasterizer::new());
        let sink = Arc::new(MemorySink::default());
        let mut doc = document(vec![
            VisualNode::new("p").with_layout(360.0, 40.0),
            VisualNode::new("hr"),
            VisualNode::new("p").with_layout(360.0, 40.0),
        ]);

        let artifacts = service(rasterizer.clone(), sink.clone())
            .export_sections(&mut doc, "post", &SectionOptions::default())
            .await
            .expect("export");

        assert_eq!(artifacts.len(), 2);
        assert_eq!(
            sink.written.lock().expect("lock").as_slice(),
            &[("post_1.png".to_string(), 1, 2), ("post_2.png".to_string(), 2, 2)]
        );
        let seen = rasterizer.offscreen_seen.lock().expect("lock").clone();
        assert_eq!(seen, vec![Some("-9999px".to_string()); 2]);
        assert!(doc.offscreen().is_empty());
        assert_eq!(doc.content().style.get("padding"), Some("8px"));
        assert_eq!(doc.content().style.get("width"), None);
    }

    #[tokio::test]
    async fn fixed_preset_artifacts_have_exact_dimensions() {
        let rasterizer = Arc::new(FakeRasterizer::new());
        let sink = Arc::new(MemorySink::default());
        let mut doc = document(vec![VisualNode::new("p").with_layout(360.0, 900.0)]);

        let artifacts = service(rasterizer, sink)
            .export_sections(&mut doc, "card", &SectionOptions::default())
            .await
            .expect("export");

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "card");
        let decoded = image::load_from_memory(&artifacts[0].bytes).expect("png");
        assert_eq!((decoded.width(), decoded.height()), (1080, 1440));
    }

    #[tokio::test]
    async fn failure_mid_export_restores_document() {
        let rasterizer = Arc::new(FakeRasterizer {
            fail_on: Some(2),
            ..FakeRasterizer::new()
        });
        let sink = Arc::new(MemorySink::default());
        let mut doc = document(vec![
            VisualNode::new("p").with_layout(360.0, 40.0),
            VisualNode::new("hr"),
            VisualNode::new("p").with_layout(360.0, 40.0),
        ]);
        let original = doc.content().clone();

        let err = service(rasterizer, sink.clone())
            .export_sections(&mut doc, "post", &SectionOptions::default())
            .await
            .expect_err("second capture fails");

        assert!(matches!(err, ExportError::Rasterizer { .. }));
        assert_eq!(doc.content(), &original);
        assert!(doc.offscreen().is_empty());
        assert_eq!(sink.written.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn pdf_export_paginates_tall_content() {
        let rasterizer = Arc::new(FakeRasterizer::new());
        let sink = Arc::new(MemorySink::default());
        let mut node = VisualNode::new("div").with_layout(190.0, 700.0);

        let artifact = service(rasterizer, sink.clone())
            .export_pdf(&mut node, "doc", &RasterOptions::default(), PageLayout::A4)
            .await
            .expect("pdf");

        assert_eq!(artifact.kind, ArtifactKind::Document);
        assert!(artifact.bytes.starts_with(b"%PDF-"));
        assert_eq!(sink.written.lock().expect("lock")[0].0, "doc.pdf");
    }

    #[test]
    fn png_encoding_round_trips_dimensions() {
        let image = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        let bytes = encode_png(&image).expect("encode");
        let decoded = image::load_from_memory(&bytes).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
    }
}
