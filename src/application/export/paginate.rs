//! Slicing one tall capture into fixed-height page bands and writing them
//! out as a PDF.

use image::{Rgb, RgbImage, RgbaImage, imageops};
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref};

use crate::domain::color::HexColor;

use super::ExportError;

const POINTS_PER_MM: f32 = 72.0 / 25.4;
const IMAGE_NAME: &[u8] = b"Im1";

/// Page geometry in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
}

impl PageLayout {
    pub const A4: PageLayout = PageLayout {
        width_mm: 210.0,
        height_mm: 297.0,
        margin_mm: 10.0,
    };

    pub fn content_width_mm(&self) -> f32 {
        self.width_mm - 2.0 * self.margin_mm
    }

    pub fn content_height_mm(&self) -> f32 {
        self.height_mm - 2.0 * self.margin_mm
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::A4
    }
}

/// One page: an opaque band of the source placed at the top-left margin.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub image: RgbImage,
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedDocument {
    pub layout: PageLayout,
    pub pages: Vec<PageImage>,
}

/// Break `buffer` into pages at full content width. Page 0 is the top of the
/// content and every break sits at a fixed pixel offset; the last band is
/// padded with `background`.
pub fn paginate(
    buffer: &RgbaImage,
    layout: PageLayout,
    background: HexColor,
) -> Result<PaginatedDocument, ExportError> {
    let (width, height) = buffer.dimensions();
    if width == 0 || height == 0 {
        return Err(ExportError::Empty {
            reason: "capture has no pixels".into(),
        });
    }
    let content_width = layout.content_width_mm();
    let content_height = layout.content_height_mm();
    if content_width <= 0.0 || content_height <= 0.0 {
        return Err(ExportError::Pdf {
            message: format!("margins leave no room on a {}x{} mm page", layout.width_mm, layout.height_mm),
        });
    }

    let opaque = flatten(buffer, background);
    let mm_per_px = f64::from(content_width) / f64::from(width);
    let total_mm = f64::from(height) * mm_per_px;
    let page_count = page_count(total_mm, f64::from(content_height));

    if page_count == 1 {
        return Ok(PaginatedDocument {
            layout,
            pages: vec![PageImage {
                image: opaque,
                x_mm: layout.margin_mm,
                y_mm: layout.margin_mm,
                width_mm: content_width,
                height_mm: total_mm as f32,
            }],
        });
    }

    let band_px = f64::from(content_height) / mm_per_px;
    let band_height = band_px.ceil() as u32;
    let fill = Rgb(rgb(background));
    let pages = (0..page_count)
        .map(|page| {
            let top = ((page as f64) * band_px).round() as u32;
            let rows = band_height.min(height.saturating_sub(top));
            let mut band = RgbImage::from_pixel(width, band_height, fill);
            let slice = imageops::crop_imm(&opaque, 0, top, width, rows).to_image();
            imageops::replace(&mut band, &slice, 0, 0);
            PageImage {
                image: band,
                x_mm: layout.margin_mm,
                y_mm: layout.margin_mm,
                width_mm: content_width,
                height_mm: content_height,
            }
        })
        .collect();

    Ok(PaginatedDocument { layout, pages })
}

fn page_count(total_mm: f64, page_mm: f64) -> usize {
    // Absorb float noise so an exact multiple does not spill onto an empty page.
    ((total_mm / page_mm) - 1e-9).ceil().max(1.0) as usize
}

fn rgb(color: HexColor) -> [u8; 3] {
    [color.r, color.g, color.b]
}

/// Composite every pixel over `background`; PDF image XObjects carry no alpha here.
fn flatten(buffer: &RgbaImage, background: HexColor) -> RgbImage {
    let [back_r, back_g, back_b] = rgb(background);
    RgbImage::from_fn(buffer.width(), buffer.height(), |x, y| {
        let [r, g, b, a] = buffer.get_pixel(x, y).0;
        let alpha = u32::from(a);
        let over = |fore: u8, back: u8| -> u8 {
            ((u32::from(fore) * alpha + u32::from(back) * (255 - alpha) + 127) / 255) as u8
        };
        Rgb([over(r, back_r), over(g, back_g), over(b, back_b)])
    })
}

impl PaginatedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Serialize as PDF: one Flate-compressed RGB image per page.
    pub fn to_pdf(&self) -> Vec<u8> {
        let mut pdf = Pdf::new();
        let mut next_id = 1i32;
        let mut alloc = || {
            let r = Ref::new(next_id);
            next_id += 1;
            r
        };

        let catalog_id = alloc();
        let pages_id = alloc();
        let page_ids: Vec<(Ref, Ref, Ref)> = self
            .pages
            .iter()
            .map(|_| (alloc(), alloc(), alloc()))
            .collect();

        pdf.catalog(catalog_id).pages(pages_id);
        pdf.pages(pages_id)
            .kids(page_ids.iter().map(|(page, _, _)| *page))
            .count(page_ids.len() as i32);

        let page_width = self.layout.width_mm * POINTS_PER_MM;
        let page_height = self.layout.height_mm * POINTS_PER_MM;

        for (page, (page_id, image_id, content_id)) in self.pages.iter().zip(&page_ids) {
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(page.image.as_raw(), 6);
            {
                let mut image = pdf.image_xobject(*image_id, &compressed);
                image.filter(Filter::FlateDecode);
                image.width(page.image.width() as i32);
                image.height(page.image.height() as i32);
                image.color_space().device_rgb();
                image.bits_per_component(8);
            }

            let width = page.width_mm * POINTS_PER_MM;
            let height = page.height_mm * POINTS_PER_MM;
            let x = page.x_mm * POINTS_PER_MM;
            // PDF space grows upwards from the bottom-left corner.
            let y = page_height - page.y_mm * POINTS_PER_MM - height;

            let mut content = Content::new();
            content.save_state();
            content.transform([width, 0.0, 0.0, height, x, y]);
            content.x_object(Name(IMAGE_NAME));
            content.restore_state();
            let raw = content.finish();
            let stream = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
            pdf.stream(*content_id, &stream).filter(Filter::FlateDecode);

            let mut pdf_page = pdf.page(*page_id);
            pdf_page
                .media_box(Rect::new(0.0, 0.0, page_width, page_height))
                .parent(pages_id)
                .contents(*content_id);
            let mut resources = pdf_page.resources();
            resources.x_objects().pair(Name(IMAGE_NAME), *image_id);
        }

        pdf.finish()
    }
}
