//! Capturing a visual subtree to a pixel buffer.

use async_trait::async_trait;
use image::{
    Rgba, RgbaImage,
    imageops::{self, FilterType},
};
use tracing::debug;

use crate::domain::{color::HexColor, settings::Background};

use super::{
    ExportError,
    visual::{StyleGuard, VisualNode},
};

const LOG_TARGET: &str = "application::export::raster";

pub const DEFAULT_SCALE: f32 = 3.0;
pub const MIN_SCALE: f32 = 1.0;
pub const MAX_SCALE: f32 = 4.0;
/// Largest width or height of any captured buffer.
pub const MAX_DIMENSION_PX: u32 = 16_384;

/// Target box in CSS pixels. Without a height the capture keeps its intrinsic height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSize {
    pub width: u32,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    pub scale: f32,
    pub background: Background,
    pub fixed_size: Option<FixedSize>,
    /// Padding applied around the content while it is captured, in CSS pixels.
    pub margin: u32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            background: Background::default(),
            fixed_size: None,
            margin: crate::domain::settings::DEFAULT_MARGIN_PX,
        }
    }
}

/// Parameters handed to a [`Rasterizer`] for one capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterRequest {
    pub scale: f32,
    /// Always opaque: a transparent page is drawn on white.
    pub background: HexColor,
    /// Layout width forced on the node, in CSS pixels.
    pub width: Option<u32>,
}

/// Draws a laid-out node into pixels. Implementations are bound to the
/// presentation surface that owns the live tree.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(
        &self,
        node: &VisualNode,
        request: &RasterRequest,
    ) -> Result<RgbaImage, ExportError>;
}

pub fn clamp_scale(requested: f32) -> f32 {
    if requested.is_finite() {
        requested.clamp(MIN_SCALE, MAX_SCALE)
    } else {
        DEFAULT_SCALE
    }
}

/// Clamped scale, further reduced until neither side of a
/// `width × height` capture exceeds [`MAX_DIMENSION_PX`].
pub fn effective_scale(requested: f32, width: f32, height: f32) -> f32 {
    let scale = clamp_scale(requested);
    let largest = width.max(height);
    if largest > 0.0 && largest * scale > MAX_DIMENSION_PX as f32 {
        MAX_DIMENSION_PX as f32 / largest
    } else {
        scale
    }
}

pub(crate) fn scaled(px: u32, scale: f32) -> u32 {
    (px as f32 * scale).round() as u32
}

/// Capture `node`. Its padding, overflow and (for fixed sizes) width are
/// overridden for the duration of the capture and restored afterwards,
/// whether or not the rasterizer succeeds.
pub async fn capture<R>(
    rasterizer: &R,
    node: &mut VisualNode,
    options: &RasterOptions,
) -> Result<RgbaImage, ExportError>
where
    R: Rasterizer + ?Sized,
{
    let fill = options.background.raster_fill();
    let fixed_width = options.fixed_size.map(|size| size.width);
    let fixed_height = options.fixed_size.and_then(|size| size.height);

    let width = fixed_width.map_or(node.layout.width, |width| width as f32);
    let height = fixed_height.map_or(node.layout.height, |height| {
        node.layout.height.max(height as f32)
    });
    let scale = effective_scale(options.scale, width, height);
    // A fixed box is sized from its own dimensions; taller content only
    // lowers the capture scale and is shrunk to fit.
    let target = options.fixed_size.and_then(|size| {
        size.height.map(|height| {
            let target_scale = effective_scale(options.scale, size.width as f32, height as f32);
            (scaled(size.width, target_scale), scaled(height, target_scale))
        })
    });

    let raw = {
        let mut guard = StyleGuard::new(node);
        guard.set("padding", format!("{}px", options.margin));
        guard.set("overflow", "visible");
        if let Some(width) = fixed_width {
            guard.set("width", format!("{width}px"));
            guard.set("max-width", format!("{width}px"));
        }

        let request = RasterRequest {
            scale,
            background: fill,
            width: fixed_width,
        };
        rasterizer.rasterize(guard.node(), &request).await?
    };

    debug!(
        target = LOG_TARGET,
        op = "capture",
        scale,
        width = raw.width(),
        height = raw.height(),
        "Captured node"
    );

    match target {
        Some((width, height)) => Ok(compose_fixed(&raw, width, height, fill)),
        None => Ok(raw),
    }
}

/// Place `source` on a `width × height` canvas filled with `background`:
/// scaled down uniformly to fit (never up) and centered.
pub fn compose_fixed(source: &RgbaImage, width: u32, height: u32, background: HexColor) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba(background.to_rgba()));
    if width == 0 || height == 0 || source.width() == 0 || source.height() == 0 {
        return canvas;
    }

    let fit = (width as f32 / source.width() as f32)
        .min(height as f32 / source.height() as f32)
        .min(1.0);
    let placed_width = ((source.width() as f32 * fit).round() as u32).clamp(1, width);
    let placed_height = ((source.height() as f32 * fit).round() as u32).clamp(1, height);
    let x = i64::from((width - placed_width) / 2);
    let y = i64::from((height - placed_height) / 2);

    if placed_width == source.width() && placed_height == source.height() {
        imageops::overlay(&mut canvas, source, x, y);
    } else {
        let resized = imageops::resize(source, placed_width, placed_height, FilterType::Lanczos3);
        imageops::overlay(&mut canvas, &resized, x, y);
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Paints the node's layout box in a solid colour, like a real surface would.
    struct SolidRasterizer {
        seen: Mutex<Vec<(Option<String>, Option<String>)>>,
        fail: bool,
    }

    impl SolidRasterizer {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Rasterizer for SolidRasterizer {
        async fn rasterize(
            &self,
            node: &VisualNode,
            request: &RasterRequest,
        ) -> Result<RgbaImage, ExportError> {
            self.seen.lock().expect("lock").push((
                node.style.get("padding").map(str::to_string),
                node.style.get("width").map(str::to_string),
            ));
            if self.fail {
                return Err(ExportError::Rasterizer {
                    message: "surface lost".into(),
                });
            }
            let width = request.width.map_or(node.layout.width, |w| w as f32);
            Ok(RgbaImage::from_pixel(
                (width * request.scale).round() as u32,
                (node.layout.height * request.scale).round() as u32,
                Rgba([10, 20, 30, 255]),
            ))
        }
    }

    #[test]
    fn scale_is_clamped_and_bounded() {
        assert_eq!(clamp_scale(0.5), 1.0);
        assert_eq!(clamp_scale(9.0), 4.0);
        assert_eq!(clamp_scale(f32::NAN), DEFAULT_SCALE);
        assert_eq!(effective_scale(3.0, 360.0, 480.0), 3.0);
        let reduced = effective_scale(4.0, 800.0, 8192.0);
        assert_eq!(reduced, 2.0);
    }

    #[tokio::test]
    async fn fixed_size_output_matches_scaled_target_exactly() {
        let rasterizer = SolidRasterizer::new();
        for content_height in [100.0, 480.0, 2000.0, 6000.0] {
            let mut node = VisualNode::new("div").with_layout(600.0, content_height);
            let options = RasterOptions {
                fixed_size: Some(FixedSize {
                    width: 360,
                    height: Some(480),
                }),
                ..RasterOptions::default()
            };
            let image = capture(&rasterizer, &mut node, &options).await.expect("capture");
            assert_eq!(image.dimensions(), (1080, 1440));
        }
    }

    #[tokio::test]
    async fn styles_are_overridden_during_capture_and_restored_after() {
        let rasterizer = SolidRasterizer::new();
        let mut node = VisualNode::new("div")
            .with_style("padding: 4px;")
            .with_layout(360.0, 100.0);
        let options = RasterOptions {
            margin: 32,
            fixed_size: Some(FixedSize {
                width: 360,
                height: None,
            }),
            ..RasterOptions::default()
        };

        let image = capture(&rasterizer, &mut node, &options).await.expect("capture");
        assert_eq!(image.dimensions(), (1080, 300));
        assert_eq!(
            rasterizer.seen.lock().expect("lock").as_slice(),
            &[(Some("32px".to_string()), Some("360px".to_string()))]
        );
        assert_eq!(node.style.get("padding"), Some("4px"));
        assert_eq!(node.style.get("width"), None);
        assert_eq!(node.style.get("overflow"), None);
    }

    #[tokio::test]
    async fn styles_are_restored_when_rasterizer_fails() {
        let rasterizer = SolidRasterizer {
            fail: true,
            ..SolidRasterizer::new()
        };
        let mut node = VisualNode::new("div").with_style("overflow: hidden;");
        let original = node.style.clone();
        let err = capture(&rasterizer, &mut node, &RasterOptions::default())
            .await
            .expect_err("fails");
        assert!(matches!(err, ExportError::Rasterizer { .. }));
        assert_eq!(node.style, original);
    }

    #[test]
    fn compose_letterboxes_without_upscaling() {
        let source = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let canvas = compose_fixed(&source, 30, 20, HexColor::WHITE);
        assert_eq!(canvas.dimensions(), (30, 20));
        assert_eq!(canvas.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(canvas.get_pixel(15, 10).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(9, 10).0, [255, 255, 255, 255]);
        assert_eq!(canvas.get_pixel(10, 5).0, [0, 0, 0, 255]);
    }

    #[test]
    fn compose_shrinks_tall_sources_to_fit() {
        let source = RgbaImage::from_pixel(40, 200, Rgba([0, 0, 0, 255]));
        let canvas = compose_fixed(&source, 40, 100, HexColor::WHITE);
        assert_eq!(canvas.dimensions(), (40, 100));
        assert_eq!(canvas.get_pixel(0, 50).0, [255, 255, 255, 255]);
        assert!(canvas.get_pixel(20, 50).0[0] < 16);
    }
}
