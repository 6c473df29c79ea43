mod pdf;

use image::DynamicImage;

use crate::error::{Error, Result};
use crate::settings::Settings;

/// One uploaded/scanned input. Exactly one variant is active per session;
/// replacing the source invalidates everything derived from it.
#[derive(Debug, Clone)]
pub enum SourceDocument {
    /// A native paginated document (PDF bytes).
    Native(Vec<u8>),
    /// A single photographed image.
    SingleImage(Vec<u8>),
    /// An ordered multi-shot scan, first page first.
    ImageSequence(Vec<Vec<u8>>),
    /// Text captured directly, skipping rasterization and OCR.
    RawText(String),
}

impl SourceDocument {
    /// Classifies an opaque upload by its magic bytes.
    pub fn sniff(bytes: Vec<u8>) -> Result<SourceDocument> {
        let kind = infer::get(&bytes)
            .ok_or_else(|| Error::SourceUnreadable("unrecognized file type".to_string()))?;
        let mime = kind.mime_type();
        if mime == "application/pdf" {
            Ok(SourceDocument::Native(bytes))
        } else if mime.starts_with("image/") {
            Ok(SourceDocument::SingleImage(bytes))
        } else {
            Err(Error::SourceUnreadable(format!(
                "unsupported input type: {}",
                mime
            )))
        }
    }
}

/// One page of the source, rasterized. Ephemeral: produced per
/// `normalize` call, consumed by extraction or rendering, never retained.
#[derive(Debug)]
pub struct PageRaster {
    pub image: DynamicImage,
    pub page_index: usize,
}

impl PageRaster {
    pub fn size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

pub enum NormalizedSource {
    Pages(Vec<PageRaster>),
    Text(String),
}

/// Converts any source variant into an ordered page-raster sequence, or
/// passes raw text through untouched. Pure apart from the external PDF
/// rasterizer; any decode failure is `SourceUnreadable`.
pub fn normalize(source: &SourceDocument, settings: &Settings) -> Result<NormalizedSource> {
    match source {
        SourceDocument::Native(bytes) => {
            let pages = pdf::rasterize_pdf_pages(bytes, settings.raster_dpi)?;
            let mut rasters = Vec::with_capacity(pages.len());
            for (page_index, png) in pages.into_iter().enumerate() {
                let image = image::load_from_memory(&png).map_err(|err| {
                    Error::SourceUnreadable(format!(
                        "failed to decode rendered page {}: {}",
                        page_index, err
                    ))
                })?;
                rasters.push(PageRaster { image, page_index });
            }
            Ok(NormalizedSource::Pages(rasters))
        }
        SourceDocument::SingleImage(bytes) => {
            let image = image::load_from_memory(bytes)
                .map_err(|err| Error::SourceUnreadable(format!("failed to decode image: {}", err)))?;
            Ok(NormalizedSource::Pages(vec![PageRaster {
                image,
                page_index: 0,
            }]))
        }
        SourceDocument::ImageSequence(images) => {
            let mut rasters = Vec::with_capacity(images.len());
            for (page_index, bytes) in images.iter().enumerate() {
                let image = image::load_from_memory(bytes).map_err(|err| {
                    Error::SourceUnreadable(format!(
                        "failed to decode scanned page {}: {}",
                        page_index, err
                    ))
                })?;
                rasters.push(PageRaster { image, page_index });
            }
            Ok(NormalizedSource::Pages(rasters))
        }
        SourceDocument::RawText(text) => Ok(NormalizedSource::Text(text.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([255, 255, 255, 255]),
        ));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn sniff_classifies_pdf_and_image() {
        let pdf = b"%PDF-1.4\n%%EOF".to_vec();
        assert!(matches!(
            SourceDocument::sniff(pdf),
            Ok(SourceDocument::Native(_))
        ));

        let png = png_bytes(4, 4);
        assert!(matches!(
            SourceDocument::sniff(png),
            Ok(SourceDocument::SingleImage(_))
        ));
    }

    #[test]
    fn sniff_rejects_unknown_bytes() {
        let garbage = vec![0u8; 16];
        assert!(matches!(
            SourceDocument::sniff(garbage),
            Err(Error::SourceUnreadable(_))
        ));
    }

    #[test]
    fn image_sequence_keeps_scan_order() {
        let images = vec![png_bytes(10, 10), png_bytes(20, 20), png_bytes(30, 30)];
        let source = SourceDocument::ImageSequence(images);
        let normalized = normalize(&source, &Settings::default()).expect("normalize");
        match normalized {
            NormalizedSource::Pages(pages) => {
                assert_eq!(pages.len(), 3);
                for (idx, page) in pages.iter().enumerate() {
                    assert_eq!(page.page_index, idx);
                }
                assert_eq!(pages[1].size(), (20, 20));
            }
            NormalizedSource::Text(_) => panic!("expected pages"),
        }
    }

    #[test]
    fn undecodable_image_fails_the_session() {
        let source = SourceDocument::SingleImage(vec![1, 2, 3, 4]);
        assert!(matches!(
            normalize(&source, &Settings::default()),
            Err(Error::SourceUnreadable(_))
        ));
    }

    #[test]
    fn raw_text_bypasses_rasterization() {
        let source = SourceDocument::RawText("hello".to_string());
        match normalize(&source, &Settings::default()).expect("normalize") {
            NormalizedSource::Text(text) => assert_eq!(text, "hello"),
            NormalizedSource::Pages(_) => panic!("expected text"),
        }
    }
}
