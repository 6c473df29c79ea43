use crate::error::Result;
use crate::ocr::TextFragment;
use crate::source::PageRaster;
use crate::style::StyleSpec;

use super::font::{self, ResolvedFont};
use super::{escape_xml, image_data_uri, raster};

/// Builds the overlay SVG for one page: the original page raster as the
/// base layer, then per fragment an opaque white rectangle erasing the
/// source text followed by the restyled text, wrapped and fitted to the
/// fragment's original frame. Fragments draw in list order; overlaps are
/// not arbitrated, so the last one wins.
pub fn render_overlay_page(
    page: &PageRaster,
    fragments: &[TextFragment],
    style: &StyleSpec,
    font: &ResolvedFont,
) -> Result<String> {
    let (width, height) = page.size();
    let png = raster::encode_png(&page.image)?;
    let data_uri = image_data_uri(&png);
    let color = style.color.hex();
    let metrics = font.metrics.as_ref();

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    for (idx, fragment) in fragments.iter().enumerate() {
        let frame = fragment.frame;
        let initial = (frame.h * 0.8).max(10.0);
        let font_size = font::fit_font_size(&fragment.text, metrics, frame.w, frame.h, initial);
        let lines = font::wrap_text_px(&fragment.text, font_size, frame.w, metrics);
        let line_height = font::line_height_px(font_size, metrics);
        let ascent = font::ascent_px(font_size, metrics);

        svg.push_str(&format!(
            r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="#ffffff"/>"##,
            x = frame.x,
            y = frame.y,
            w = frame.w,
            h = frame.h
        ));
        let clip_id = format!("clip-{}", idx);
        svg.push_str(&format!(
            r#"<clipPath id="{id}"><rect x="{x}" y="{y}" width="{w}" height="{h}"/></clipPath>"#,
            id = clip_id,
            x = frame.x,
            y = frame.y,
            w = frame.w,
            h = frame.h
        ));

        let mut text_block = String::new();
        text_block.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}" font-family="{family}" clip-path="url(#{clip})">"#,
            x = frame.x,
            y = frame.y + ascent,
            size = font_size,
            color = color,
            family = escape_xml(&font.family),
            clip = clip_id
        ));
        for (line_idx, line) in lines.iter().enumerate() {
            let escaped = escape_xml(line);
            if line_idx == 0 {
                text_block.push_str(&escaped);
            } else {
                text_block.push_str(&format!(
                    r#"<tspan x="{x}" dy="{dy}">{text}</tspan>"#,
                    x = frame.x,
                    dy = line_height,
                    text = escaped
                ));
            }
        }
        text_block.push_str("</text>");
        svg.push_str(&text_block);
    }

    svg.push_str("</svg>");
    Ok(svg)
}
