pub mod font;
mod overlay;
pub(crate) mod raster;
mod reflow;

pub use font::{fit_font_size, resolve_font, wrapped_text_height, FontMetrics, ResolvedFont};
pub use overlay::render_overlay_page;
pub use raster::render_svg_to_png;
pub use reflow::{plan_reflow, render_reflow_pages, ReflowConfig};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

use crate::compose;
use crate::error::{Error, Result};
use crate::ocr::geometry::Rect;
use crate::ocr::TextFragment;
use crate::settings::Settings;
use crate::source::PageRaster;
use crate::style::{LayoutMode, StyleSpec};

/// One rendered output page, encoded as PNG.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Index of the source page this output page came from. Reflow
    /// continuation pages share their origin's index.
    pub source_page: usize,
}

/// The output of one apply pass: rendered pages in order, bound to the
/// style that produced them. Created fresh on every apply and never
/// mutated; the next apply supersedes it wholesale.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub pages: Vec<RenderedPage>,
    pub style: StyleSpec,
}

impl RenderedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Serializes all pages into one PDF.
    pub fn to_pdf_bytes(&self) -> Result<Vec<u8>> {
        compose::compose_pdf(&self.pages)
    }

    /// Single-raster export mode: the page image itself, available when
    /// the render produced exactly one page.
    pub fn into_single_image(mut self) -> Option<Vec<u8>> {
        if self.pages.len() == 1 {
            Some(self.pages.remove(0).png)
        } else {
            None
        }
    }

    /// Stages the serialized PDF in the temp directory for export/sharing
    /// and returns its path.
    pub fn write_pdf_to_temp(&self) -> Result<PathBuf> {
        let bytes = self.to_pdf_bytes()?;
        let mut file = tempfile::Builder::new()
            .prefix("refont-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(&bytes)?;
        let (_, path) = file.keep().map_err(|err| Error::Io(err.error))?;
        Ok(path)
    }
}

/// Renders one source page with the requested strategy. Overlay yields
/// exactly one output page; reflow may yield continuation pages.
pub(crate) fn render_source_page(
    page: &PageRaster,
    fragments: &[TextFragment],
    style: &StyleSpec,
    font: &ResolvedFont,
    settings: &Settings,
) -> Result<Vec<RenderedPage>> {
    let (width, height) = page.size();
    let font_data = font.metrics.as_ref().map(|metrics| metrics.data());
    match style.layout {
        LayoutMode::Overlay => {
            let svg = render_overlay_page(page, fragments, style, font)?;
            let png = raster::render_svg_to_png(&svg, font_data, settings.font_dir.as_deref())?;
            Ok(vec![RenderedPage {
                png,
                width,
                height,
                source_page: page.page_index,
            }])
        }
        LayoutMode::Reflow => {
            let config = ReflowConfig::from_settings(settings);
            let svgs = render_reflow_pages(
                fragments,
                (width as f32, height as f32),
                style,
                font,
                &config,
            );
            let mut pages = Vec::with_capacity(svgs.len());
            for svg in svgs {
                let png = raster::render_svg_to_png(&svg, font_data, settings.font_dir.as_deref())?;
                pages.push(RenderedPage {
                    png,
                    width,
                    height,
                    source_page: page.page_index,
                });
            }
            Ok(pages)
        }
    }
}

/// Renders a raw-text source. Raw text has no page geometry, so it always
/// reflows onto pages of the configured raw-text size, as a single
/// fragment with no bounding frame.
pub(crate) fn render_raw_text(
    text: &str,
    style: &StyleSpec,
    font: &ResolvedFont,
    settings: &Settings,
) -> Result<Vec<RenderedPage>> {
    if style.layout == LayoutMode::Overlay {
        warn!("overlay layout is undefined for raw text; reflowing instead");
    }
    let (page_w, page_h) = settings.raw_text_page_size;
    let fragment = TextFragment {
        text: text.to_string(),
        frame: Rect::new(0.0, 0.0, 0.0, 0.0),
        page_index: 0,
    };
    let config = ReflowConfig::from_settings(settings);
    let font_data = font.metrics.as_ref().map(|metrics| metrics.data());
    let svgs = render_reflow_pages(
        std::slice::from_ref(&fragment),
        (page_w, page_h),
        style,
        font,
        &config,
    );
    let mut pages = Vec::with_capacity(svgs.len());
    for svg in svgs {
        let png = raster::render_svg_to_png(&svg, font_data, settings.font_dir.as_deref())?;
        pages.push(RenderedPage {
            png,
            width: page_w.round() as u32,
            height: page_h.round() as u32,
            source_page: 0,
        });
    }
    Ok(pages)
}

pub(crate) fn image_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

pub(crate) fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn escape_xml_covers_markup_characters() {
        assert_eq!(escape_xml("a<b>&\"'"), "a&lt;b&gt;&amp;&quot;&apos;");
    }

    #[test]
    fn export_staging_writes_a_pdf_to_temp() {
        let image = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            72,
            72,
            image::Rgba([255, 255, 255, 255]),
        ));
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("encode png");
        let document = RenderedDocument {
            pages: vec![RenderedPage {
                png,
                width: 72,
                height: 72,
                source_page: 0,
            }],
            style: StyleSpec {
                font: crate::style::FontFamily::Helvetica,
                color: crate::style::TextColor::Red,
                layout: LayoutMode::Reflow,
            },
        };
        let path = document.write_pdf_to_temp().expect("stage pdf");
        let bytes = std::fs::read(&path).expect("read staged pdf");
        assert!(bytes.starts_with(b"%PDF"));
        std::fs::remove_file(&path).expect("cleanup");
    }

    #[test]
    fn single_image_export_requires_exactly_one_page() {
        let style = StyleSpec {
            font: crate::style::FontFamily::Arial,
            color: crate::style::TextColor::Black,
            layout: LayoutMode::Overlay,
        };
        let page = RenderedPage {
            png: vec![1, 2, 3],
            width: 10,
            height: 10,
            source_page: 0,
        };
        let one = RenderedDocument {
            pages: vec![page.clone()],
            style: style.clone(),
        };
        assert_eq!(one.into_single_image(), Some(vec![1, 2, 3]));

        let two = RenderedDocument {
            pages: vec![page.clone(), page],
            style,
        };
        assert!(two.into_single_image().is_none());
    }
}
