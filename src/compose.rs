use printpdf::{Image, ImageTransform, Mm, PdfDocument};
use tracing::warn;

use crate::error::{Error, Result};
use crate::render::RenderedPage;

/// Assembles rendered page rasters into one PDF and serializes it.
/// Page order is preserved exactly. A page whose intermediate raster
/// cannot be decoded is dropped with a warning and composition continues;
/// ending up with no pages at all is an error.
pub fn compose_pdf(pages: &[RenderedPage]) -> Result<Vec<u8>> {
    let mut doc = None;
    let mut layers = Vec::new();

    for page in pages {
        let image = match printpdf::image_crate::load_from_memory(&page.png) {
            Ok(image) => image,
            Err(err) => {
                warn!(
                    "{}",
                    Error::PageRenderFailed {
                        page: page.source_page,
                        reason: format!("corrupt page raster: {}", err),
                    }
                );
                continue;
            }
        };
        let width_mm = px_to_mm(image.width());
        let height_mm = px_to_mm(image.height());

        if doc.is_none() {
            let (doc_handle, page_idx, layer_idx) =
                PdfDocument::new("refont", Mm(width_mm), Mm(height_mm), "Layer 1");
            doc = Some(doc_handle);
            layers.push((page_idx, layer_idx, image));
        } else if let Some(doc_handle) = doc.as_mut() {
            let (page_idx, layer_idx) = doc_handle.add_page(
                Mm(width_mm),
                Mm(height_mm),
                format!("Layer {}", layers.len() + 1),
            );
            layers.push((page_idx, layer_idx, image));
        }
    }

    let doc = doc.ok_or_else(|| Error::Compose("no pages to compose".to_string()))?;
    for (page_idx, layer_idx, image) in layers.into_iter() {
        let current_layer = doc.get_page(page_idx).get_layer(layer_idx);
        let pdf_image = Image::from_dynamic_image(&image);
        let transform = ImageTransform {
            translate_x: Some(Mm(0.0)),
            translate_y: Some(Mm(0.0)),
            rotate: None,
            scale_x: Some(1.0),
            scale_y: Some(1.0),
            dpi: Some(72.0),
        };
        pdf_image.add_to_layer(current_layer, transform);
    }

    let mut buffer = Vec::new();
    {
        let mut writer = std::io::BufWriter::new(&mut buffer);
        doc.save(&mut writer)
            .map_err(|err| Error::Compose(err.to_string()))?;
    }
    Ok(buffer)
}

// Page rasters are produced at 72 dpi, one pixel per point.
fn px_to_mm(px: u32) -> f32 {
    let inches = px as f32 / 72.0;
    inches * 25.4
}
