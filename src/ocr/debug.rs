use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::error::{Error, Result};
use crate::ocr::TextFragment;
use crate::render;
use crate::source::PageRaster;

/// Writes per-page recognition dumps next to each other: the page with
/// every fragment frame stroked in green, plus the fragment list as JSON.
#[derive(Debug, Clone)]
pub struct DebugDump {
    output_dir: PathBuf,
    base_name: String,
}

impl DebugDump {
    pub fn new(output_dir: impl Into<PathBuf>, base_name: &str) -> Result<DebugDump> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(DebugDump {
            output_dir,
            base_name: base_name.to_string(),
        })
    }

    pub fn write_page(&self, page: &PageRaster, fragments: &[TextFragment]) -> Result<()> {
        let label = format!("{}_page{:02}", self.base_name, page.page_index + 1);

        let svg = bbox_svg(page, fragments)?;
        let png = render::render_svg_to_png(&svg, None, None)?;
        let image_path = self.output_dir.join(format!("{}_bbox.png", label));
        fs::write(&image_path, png)?;

        let json = serde_json::to_vec_pretty(fragments)
            .map_err(|err| Error::Other(format!("failed to serialize fragments: {}", err)))?;
        let json_path = self.output_dir.join(format!("{}_fragments.json", label));
        fs::write(&json_path, json)?;

        info!("wrote recognition dump: {}", image_path.display());
        Ok(())
    }
}

fn bbox_svg(page: &PageRaster, fragments: &[TextFragment]) -> Result<String> {
    let (width, height) = page.size();
    let png = crate::render::raster::encode_png(&page.image)?;
    let data_uri = crate::render::image_data_uri(&png);

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
    for fragment in fragments {
        let frame = fragment.frame;
        svg.push_str(&format!(
            r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="#00c853" stroke-width="2"/>"##,
            x = frame.x,
            y = frame.y,
            w = frame.w,
            h = frame.h
        ));
    }
    svg.push_str("</svg>");
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::geometry::Rect;
    use image::DynamicImage;

    #[test]
    fn dump_writes_overlay_and_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dump = DebugDump::new(dir.path(), "scan").expect("dump");
        let page = PageRaster {
            image: DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
                64,
                64,
                image::Rgba([255, 255, 255, 255]),
            )),
            page_index: 0,
        };
        let fragments = vec![TextFragment {
            text: "hello".to_string(),
            frame: Rect::new(4.0, 4.0, 32.0, 10.0),
            page_index: 0,
        }];
        dump.write_page(&page, &fragments).expect("write");
        assert!(dir.path().join("scan_page01_bbox.png").exists());
        let json = fs::read_to_string(dir.path().join("scan_page01_fragments.json"))
            .expect("read json");
        assert!(json.contains("hello"));
    }
}
