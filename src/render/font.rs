use std::path::Path;
use std::sync::Arc;
use tracing::warn;
use ttf_parser::name_id;
use ttf_parser::Face;
use usvg::fontdb;

use crate::error::Error;
use crate::style::FontFamily;

/// Parsed metrics for one font face, shared cheaply across render tasks.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    line_gap: i16,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }
}

/// A style font resolved against the installed fonts. When the requested
/// family is missing the resolver degrades to a default sans face (or, on
/// systems with no usable fonts at all, to estimated metrics); it never
/// fails.
#[derive(Clone)]
pub struct ResolvedFont {
    pub requested: FontFamily,
    pub family: String,
    pub metrics: Option<FontMetrics>,
}

pub fn resolve_font(requested: FontFamily, font_dir: Option<&Path>) -> ResolvedFont {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(dir) = font_dir {
        db.load_fonts_dir(dir);
    }

    if let Some(metrics) = load_metrics_from_family(&db, requested.family_name()) {
        let family = metrics
            .family()
            .map(|name| name.to_string())
            .unwrap_or_else(|| requested.family_name().to_string());
        return ResolvedFont {
            requested,
            family,
            metrics: Some(metrics),
        };
    }

    warn!(
        "{}; falling back to a system sans-serif face",
        Error::FontUnavailable(requested.family_name().to_string())
    );
    let fallback = db
        .query(&fontdb::Query {
            families: &[fontdb::Family::SansSerif],
            ..Default::default()
        })
        .and_then(|id| db.with_face_data(id, |data, index| load_metrics_from_data(data, index)))
        .flatten();
    let family = fallback
        .as_ref()
        .and_then(|metrics| metrics.family())
        .unwrap_or("sans-serif")
        .to_string();
    ResolvedFont {
        requested,
        family,
        metrics: fallback,
    }
}

fn load_metrics_from_family(db: &fontdb::Database, family: &str) -> Option<FontMetrics> {
    let families = [fontdb::Family::Name(family)];
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db.query(&query)?;
    db.with_face_data(id, |data, index| load_metrics_from_data(data, index))
        .flatten()
}

fn load_metrics_from_data(data: &[u8], face_index: u32) -> Option<FontMetrics> {
    let face = Face::parse(data, face_index).ok()?;
    let units_per_em = face.units_per_em().max(1);
    let space_advance = face
        .glyph_index(' ')
        .and_then(|id| face.glyph_hor_advance(id))
        .unwrap_or(units_per_em / 2);
    Some(FontMetrics {
        data: Arc::new(data.to_vec()),
        units_per_em,
        space_advance,
        ascender: face.ascender(),
        descender: face.descender(),
        line_gap: face.line_gap(),
        family: extract_family_name(&face),
        face_index,
    })
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

pub(crate) fn measure_text_width_px(text: &str, font_size: f32, font: Option<&FontMetrics>) -> f32 {
    if let Some(font) = font {
        if let Ok(face) = Face::parse(&font.data, font.face_index) {
            let mut advance = 0u32;
            for ch in text.chars() {
                if ch == '\n' {
                    continue;
                }
                if ch == ' ' {
                    advance = advance.saturating_add(font.space_advance as u32);
                    continue;
                }
                if let Some(glyph) = face.glyph_index(ch) {
                    let glyph_advance = face.glyph_hor_advance(glyph).unwrap_or(font.space_advance);
                    advance = advance.saturating_add(glyph_advance as u32);
                } else {
                    advance = advance.saturating_add(font.space_advance as u32);
                }
            }
            let units = font.units_per_em.max(1) as f32;
            return advance as f32 * (font_size / units);
        }
    }
    estimate_text_width_units(text) * font_size
}

pub(crate) fn line_height_px(font_size: f32, font: Option<&FontMetrics>) -> f32 {
    if let Some(font) = font {
        let units = font.units_per_em.max(1) as f32;
        let height = font.ascender as f32 - font.descender as f32 + font.line_gap as f32;
        if height > 0.0 {
            return height * (font_size / units);
        }
    }
    font_size * 1.2
}

pub(crate) fn ascent_px(font_size: f32, font: Option<&FontMetrics>) -> f32 {
    if let Some(font) = font {
        let units = font.units_per_em.max(1) as f32;
        if font.ascender > 0 {
            return font.ascender as f32 * (font_size / units);
        }
    }
    font_size * 0.8
}

/// Greedy word wrap against measured advance widths. A single token wider
/// than the box is kept whole on its own line rather than broken.
pub(crate) fn wrap_text_px(
    text: &str,
    font_size: f32,
    max_width: f32,
    font: Option<&FontMetrics>,
) -> Vec<String> {
    let tokens = tokenize_text(text);
    let mut result = Vec::new();
    let mut current = String::new();

    for token in tokens {
        if token == "\n" {
            if !current.trim().is_empty() {
                result.push(current.trim_end().to_string());
            }
            current.clear();
            continue;
        }
        if token == " " {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
            }
            continue;
        }
        let mut candidate = current.clone();
        candidate.push_str(&token);
        if !current.trim().is_empty()
            && measure_text_width_px(candidate.trim_end(), font_size, font) > max_width
        {
            result.push(current.trim_end().to_string());
            current = token;
        } else {
            current = candidate;
        }
    }

    if !current.trim().is_empty() {
        result.push(current.trim_end().to_string());
    }
    if result.is_empty() {
        result.push(text.trim().to_string());
    }
    result
}

/// Height of `text` wrapped into `max_width`, set at `font_size`.
pub fn wrapped_text_height(
    text: &str,
    font_size: f32,
    max_width: f32,
    font: Option<&FontMetrics>,
) -> f32 {
    let lines = wrap_text_px(text, font_size, max_width, font);
    lines.len() as f32 * line_height_px(font_size, font)
}

/// Binary-searches the largest font size in `[10, initial]`, at half-point
/// granularity, whose wrapped height fits `box_h` when constrained to
/// `box_w`. Returns the last accepted candidate, or the initial size when
/// nothing was ever accepted; never below 10.
pub fn fit_font_size(
    text: &str,
    font: Option<&FontMetrics>,
    box_w: f32,
    box_h: f32,
    initial: f32,
) -> f32 {
    let floor = 10.0f32;
    let mut lo = floor;
    let mut hi = initial.max(floor);
    let mut best = initial.max(floor);

    while lo <= hi {
        let mid = (lo + hi) / 2.0;
        if wrapped_text_height(text, mid, box_w, font) > box_h {
            hi = mid - 0.5;
        } else {
            best = mid;
            lo = mid + 0.5;
        }
    }

    best
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0xAC00..=0xD7AF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units).sum()
}

fn tokenize_text(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch == '\n' {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push("\n".to_string());
            continue;
        }
        if ch.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(" ".to_string());
            continue;
        }
        let is_cjk = matches!(
            ch as u32,
            0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
        );
        if is_cjk {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(ch.to_string());
            continue;
        }
        current.push(ch);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "The quick brown fox jumps over the lazy dog";

    #[test]
    fn wrap_splits_on_word_boundaries() {
        let lines = wrap_text_px("alpha beta gamma", 10.0, 40.0, None);
        assert!(lines.len() > 1);
        let joined = lines.join(" ");
        assert_eq!(joined, "alpha beta gamma");
    }

    #[test]
    fn fit_never_leaves_the_allowed_range() {
        for box_h in [12.0, 30.0, 60.0, 200.0] {
            let initial = (box_h * 0.8f32).max(10.0);
            let size = fit_font_size(TEXT, None, 200.0, box_h, initial);
            assert!(size >= 10.0, "size {} below floor for box_h {}", size, box_h);
            assert!(
                size <= initial,
                "size {} above initial {} for box_h {}",
                size,
                initial,
                box_h
            );
        }
    }

    #[test]
    fn fit_is_monotone_in_box_height() {
        let mut previous = f32::INFINITY;
        for box_h in [400.0, 200.0, 100.0, 50.0, 25.0] {
            let initial = (box_h * 0.8f32).max(10.0);
            let size = fit_font_size(TEXT, None, 200.0, box_h, initial);
            assert!(
                size <= previous,
                "size grew from {} to {} when box shrank to {}",
                previous,
                size,
                box_h
            );
            previous = size;
        }
    }

    #[test]
    fn fitted_text_does_not_overflow_the_box() {
        for box_h in [40.0, 80.0, 160.0] {
            let initial = (box_h * 0.8f32).max(10.0);
            let size = fit_font_size(TEXT, None, 200.0, box_h, initial);
            let height = wrapped_text_height(TEXT, size, 200.0, None);
            assert!(
                height <= box_h,
                "wrapped height {} exceeds box {} at size {}",
                height,
                box_h,
                size
            );
        }
    }

    #[test]
    fn generous_boxes_stay_near_the_initial_size() {
        let size = fit_font_size("hi", None, 1000.0, 1000.0, 48.0);
        assert!(size > 47.0 && size <= 48.0, "got {}", size);
    }

    #[test]
    fn impossible_boxes_fall_back_to_the_floor() {
        // Nothing fits a 1pt-tall box, and the caller convention makes the
        // initial size 10 for boxes that small.
        let size = fit_font_size(TEXT, None, 50.0, 1.0, 10.0);
        assert_eq!(size, 10.0);
    }
}
