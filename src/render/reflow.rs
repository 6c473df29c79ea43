use crate::ocr::TextFragment;
use crate::style::StyleSpec;

use super::font::{self, ResolvedFont};
use super::escape_xml;

/// Fixed typography for the reflowed paragraph stream.
#[derive(Debug, Clone)]
pub struct ReflowConfig {
    pub font_size: f32,
    pub line_height: f32,
    pub margin_x: f32,
    pub margin_y: f32,
}

impl ReflowConfig {
    pub fn from_settings(settings: &crate::settings::Settings) -> ReflowConfig {
        ReflowConfig {
            font_size: settings.reflow_font_size,
            line_height: settings.reflow_line_height,
            margin_x: settings.page_margin_x,
            margin_y: settings.page_margin_y,
        }
    }
}

/// Streams fragments as fixed-height lines, one fragment per line, from
/// the top margin down; a line that would cross the bottom margin starts a
/// continuation page. A page with no fragments still yields one blank
/// page. Original frames are ignored entirely.
pub fn plan_reflow(
    fragments: &[TextFragment],
    page_height: f32,
    config: &ReflowConfig,
) -> Vec<Vec<String>> {
    let top = config.margin_y;
    let bottom = page_height - config.margin_y;

    let mut pages: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut y = top;

    for fragment in fragments {
        if y + config.line_height > bottom && !current.is_empty() {
            pages.push(std::mem::take(&mut current));
            y = top;
        }
        current.push(collapse_whitespace(&fragment.text));
        y += config.line_height;
    }

    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    pages
}

/// Renders the reflow plan as white SVG pages with left-aligned text at
/// the configured fixed size.
pub fn render_reflow_pages(
    fragments: &[TextFragment],
    page_size: (f32, f32),
    style: &StyleSpec,
    font: &ResolvedFont,
    config: &ReflowConfig,
) -> Vec<String> {
    let (page_w, page_h) = page_size;
    let plan = plan_reflow(fragments, page_h, config);
    let color = style.color.hex();
    let metrics = font.metrics.as_ref();
    let ascent = font::ascent_px(config.font_size, metrics);

    plan.iter()
        .map(|lines| {
            let mut svg = String::new();
            svg.push_str(&format!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
                w = page_w,
                h = page_h
            ));
            svg.push_str(&format!(
                r##"<rect x="0" y="0" width="{w}" height="{h}" fill="#ffffff"/>"##,
                w = page_w,
                h = page_h
            ));
            svg.push_str(&format!(
                r#"<clipPath id="content"><rect x="{x}" y="0" width="{w}" height="{h}"/></clipPath>"#,
                x = config.margin_x,
                w = (page_w - config.margin_x * 2.0).max(0.0),
                h = page_h
            ));
            let mut y = config.margin_y;
            for line in lines {
                svg.push_str(&format!(
                    r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}" font-family="{family}" clip-path="url(#content)">{text}</text>"#,
                    x = config.margin_x,
                    y = y + ascent,
                    size = config.font_size,
                    color = color,
                    family = escape_xml(&font.family),
                    text = escape_xml(line)
                ));
                y += config.line_height;
            }
            svg.push_str("</svg>");
            svg
        })
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::geometry::Rect;

    fn fragment(text: &str) -> TextFragment {
        TextFragment {
            text: text.to_string(),
            frame: Rect::new(0.0, 0.0, 0.0, 0.0),
            page_index: 0,
        }
    }

    fn config() -> ReflowConfig {
        ReflowConfig {
            font_size: 16.0,
            line_height: 20.0,
            margin_x: 20.0,
            margin_y: 50.0,
        }
    }

    #[test]
    fn page_count_matches_line_capacity() {
        // Content height 900 holds exactly 45 lines of 20.
        let fragments: Vec<TextFragment> =
            (0..100).map(|i| fragment(&format!("line {}", i))).collect();
        let plan = plan_reflow(&fragments, 1000.0, &config());
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].len(), 45);
        assert_eq!(plan[1].len(), 45);
        assert_eq!(plan[2].len(), 10);
    }

    #[test]
    fn concatenated_pages_preserve_fragment_order() {
        let fragments: Vec<TextFragment> =
            (0..100).map(|i| fragment(&format!("line {}", i))).collect();
        let plan = plan_reflow(&fragments, 1000.0, &config());
        let flattened: Vec<&String> = plan.iter().flatten().collect();
        assert_eq!(flattened.len(), 100);
        for (i, line) in flattened.iter().enumerate() {
            assert_eq!(**line, format!("line {}", i));
        }
    }

    #[test]
    fn exact_fit_does_not_spill_onto_an_extra_page() {
        let fragments: Vec<TextFragment> =
            (0..45).map(|i| fragment(&format!("line {}", i))).collect();
        let plan = plan_reflow(&fragments, 1000.0, &config());
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn no_fragments_still_produce_one_blank_page() {
        let plan = plan_reflow(&[], 1000.0, &config());
        assert_eq!(plan.len(), 1);
        assert!(plan[0].is_empty());
    }

    #[test]
    fn embedded_newlines_collapse_into_one_line() {
        let plan = plan_reflow(&[fragment("a\nb\tc")], 1000.0, &config());
        assert_eq!(plan[0], vec!["a b c".to_string()]);
    }
}
