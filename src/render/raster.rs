use resvg::render;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{fontdb, Options, Tree};

use crate::error::{Error, Result};

pub(crate) fn encode_png(image: &image::DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(Error::Image)?;
    Ok(bytes)
}

/// Rasterizes a composed SVG page to PNG bytes. Extra font data (the
/// resolved overlay font) and an optional sideloaded font directory are
/// made visible so text runs resolve to the same face that was measured.
pub fn render_svg_to_png(
    svg: &str,
    font_data: Option<&[u8]>,
    font_dir: Option<&Path>,
) -> Result<Vec<u8>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(dir) = font_dir {
        db.load_fonts_dir(dir);
    }
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).map_err(|err| Error::Svg(err.to_string()))?;
    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| Error::Svg("empty svg size".to_string()))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| Error::Svg("failed to build image buffer from svg".to_string()))?;
    encode_png(&image::DynamicImage::ImageRgba8(image))
}
