use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use mdpress::application::export::{
    ExportError, ExportService, FixedSize, FsArtifactSink, LiveDocument, PageLayout,
    RasterOptions, RasterRequest, Rasterizer, SectionOptions, SizePreset, SplitMode, VisualNode,
    capture,
};
use tempfile::TempDir;

/// Paints the requested background over the node's laid-out box.
struct SolidRasterizer;

#[async_trait]
impl Rasterizer for SolidRasterizer {
    async fn rasterize(
        &self,
        node: &VisualNode,
        request: &RasterRequest,
    ) -> Result<RgbaImage, ExportError> {
        let width = request.width.map_or(node.layout.width, |w| w as f32).max(1.0);
        let height = node.layout.height.max(1.0);
        Ok(RgbaImage::from_pixel(
            (width * request.scale).round() as u32,
            (height * request.scale).round() as u32,
            Rgba(request.background.to_rgba()),
        ))
    }
}

fn paragraph(height: f32) -> VisualNode {
    VisualNode::new("p").with_layout(360.0, height)
}

fn article() -> LiveDocument {
    LiveDocument::new(
        VisualNode::new("div")
            .with_class("md-container")
            .with_layout(720.0, 600.0)
            .with_children(vec![
                paragraph(120.0),
                VisualNode::new("hr"),
                paragraph(80.0),
                VisualNode::new("hr"),
                paragraph(200.0),
            ]),
    )
}

fn service(root: &TempDir) -> ExportService {
    ExportService::new(
        Arc::new(SolidRasterizer),
        Arc::new(FsArtifactSink::new(root.path())),
    )
    .with_section_delay(Duration::ZERO)
}

#[tokio::test]
async fn square_sections_land_on_disk_in_order() {
    let dir = TempDir::new().expect("temp dir");
    let mut doc = article();
    let original = doc.content().clone();

    let options = SectionOptions {
        preset: SizePreset::Square,
        split: SplitMode::Separator,
        ..SectionOptions::default()
    };
    let artifacts = service(&dir)
        .export_sections(&mut doc, "thread", &options)
        .await
        .expect("export succeeds");

    let names: Vec<String> = artifacts.iter().map(|a| a.file_name()).collect();
    assert_eq!(names, ["thread_1.png", "thread_2.png", "thread_3.png"]);
    for name in &names {
        let bytes = std::fs::read(dir.path().join(name)).expect("artifact written");
        let decoded = image::load_from_memory(&bytes).expect("valid png");
        assert_eq!((decoded.width(), decoded.height()), (1080, 1080));
    }

    assert_eq!(doc.content(), &original);
    assert!(doc.offscreen().is_empty());
}

#[tokio::test]
async fn long_preset_keeps_whole_document_without_separators() {
    let dir = TempDir::new().expect("temp dir");
    let mut doc = LiveDocument::new(
        VisualNode::new("div")
            .with_layout(720.0, 500.0)
            .with_children(vec![paragraph(300.0), paragraph(200.0)]),
    );

    let options = SectionOptions {
        preset: SizePreset::Long,
        ..SectionOptions::default()
    };
    let artifacts = service(&dir)
        .export_sections(&mut doc, "long", &options)
        .await
        .expect("export succeeds");

    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].file_name(), "long.png");
    assert!(dir.path().join("long.png").exists());
}

#[tokio::test]
async fn pdf_export_writes_multi_page_document() {
    let dir = TempDir::new().expect("temp dir");
    let mut node = VisualNode::new("div").with_layout(190.0, 900.0);

    let artifact = service(&dir)
        .export_pdf(
            &mut node,
            "report",
            &RasterOptions {
                scale: 1.0,
                ..RasterOptions::default()
            },
            PageLayout::A4,
        )
        .await
        .expect("pdf export succeeds");

    let bytes = std::fs::read(dir.path().join("report.pdf")).expect("pdf written");
    assert_eq!(bytes, artifact.bytes);
    assert!(bytes.starts_with(b"%PDF-"));

    let text = String::from_utf8_lossy(&bytes);
    let pages = text.matches("/Type /Page").count() - text.matches("/Type /Pages").count();
    assert!(pages >= 2, "tall content spans several pages, got {pages}");
}

#[tokio::test]
async fn single_image_export_uses_base_name() {
    let dir = TempDir::new().expect("temp dir");
    let mut node = VisualNode::new("div").with_layout(300.0, 200.0);

    let artifact = service(&dir)
        .export_image(&mut node, "card", &RasterOptions::default())
        .await
        .expect("image export succeeds");

    assert_eq!(artifact.file_name(), "card.png");
    let decoded = image::load_from_memory(&artifact.bytes).expect("valid png");
    assert_eq!(decoded.width(), (300.0_f32 * 3.0) as u32);
    assert_eq!(node.style.get("padding"), None);
}

#[tokio::test]
async fn fixed_size_capture_keeps_target_dimensions_for_tall_content() {
    let mut node = VisualNode::new("div").with_layout(360.0, 6000.0);
    let options = RasterOptions {
        fixed_size: Some(FixedSize {
            width: 360,
            height: Some(480),
        }),
        ..RasterOptions::default()
    };

    let image = capture(&SolidRasterizer, &mut node, &options)
        .await
        .expect("capture succeeds");
    assert_eq!(image.dimensions(), (1080, 1440));
}
