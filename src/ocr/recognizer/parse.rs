use std::collections::BTreeMap;

/// Pixel-space line box straight out of the engine, top-left origin.
#[derive(Debug, Clone)]
pub(super) struct PixelBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone)]
pub(super) struct RecognizedLine {
    pub text: String,
    pub bbox: PixelBox,
    pub conf: f32,
}

#[derive(Clone)]
struct WordToken {
    text: String,
    bbox: PixelBox,
    conf: f32,
    len: usize,
}

/// Parses tesseract TSV output: level-5 rows are words, grouped by
/// (page, block, paragraph, line) and joined left to right. Group keys are
/// ordered so emission order is deterministic for a given raster.
pub(super) fn parse_tsv_lines(tsv: &str) -> Vec<RecognizedLine> {
    let mut word_map: BTreeMap<(i32, i32, i32, i32), Vec<WordToken>> = BTreeMap::new();

    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 {
            continue;
        }
        let level: i32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let page_num: i32 = cols[1].parse().unwrap_or(0);
        let block_num: i32 = cols[2].parse().unwrap_or(0);
        let par_num: i32 = cols[3].parse().unwrap_or(0);
        let line_num: i32 = cols[4].parse().unwrap_or(0);
        let left: u32 = cols[6].parse().unwrap_or(0);
        let top: u32 = cols[7].parse().unwrap_or(0);
        let width: u32 = cols[8].parse().unwrap_or(0);
        let height: u32 = cols[9].parse().unwrap_or(0);
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (page_num, block_num, par_num, line_num);
        word_map.entry(key).or_default().push(WordToken {
            text: text.to_string(),
            bbox: PixelBox {
                x: left,
                y: top,
                w: width,
                h: height,
            },
            conf,
            len: text.chars().count().max(1),
        });
    }

    let mut lines = Vec::new();
    for (_, mut words) in word_map {
        words.sort_by_key(|word| word.bbox.x);
        if let Some(line) = build_line(&words) {
            lines.push(line);
        }
    }
    lines
}

/// Parses tesseract hOCR output, one recognized line per `ocr_line` span,
/// in document order.
pub(super) fn parse_hocr_lines(hocr: &str) -> Vec<RecognizedLine> {
    let mut lines = Vec::new();
    let bytes = hocr.as_bytes();
    let mut i = 0usize;
    while let Some(start) = find_subslice(bytes, b"<span", i) {
        let tag_end = match find_byte(bytes, b'>', start) {
            Some(end) => end,
            None => break,
        };
        let tag = &hocr[start..tag_end];
        if !tag.contains("ocr_line") {
            i = tag_end + 1;
            continue;
        }
        let (inner_start, inner_end) = match find_span_inner(bytes, tag_end + 1) {
            Some(value) => value,
            None => break,
        };
        let inner = &hocr[inner_start..inner_end];
        let mut words = parse_hocr_words(inner);
        if !words.is_empty() {
            words.sort_by_key(|word| word.bbox.x);
            if let Some(line) = build_line(&words) {
                lines.push(line);
            }
        }
        i = inner_end + "</span>".len();
    }
    lines
}

fn parse_hocr_words(inner: &str) -> Vec<WordToken> {
    let mut words = Vec::new();
    let bytes = inner.as_bytes();
    let mut i = 0usize;
    while let Some(start) = find_subslice(bytes, b"<span", i) {
        let tag_end = match find_byte(bytes, b'>', start) {
            Some(end) => end,
            None => break,
        };
        let tag = &inner[start..tag_end];
        if !tag.contains("ocrx_word") {
            i = tag_end + 1;
            continue;
        }
        let (word_start, word_end) = match find_span_inner(bytes, tag_end + 1) {
            Some(value) => value,
            None => break,
        };
        let text = strip_tags(&inner[word_start..word_end]);
        let text = text.trim();
        if let (Some(title), false) = (extract_attr(tag, "title"), text.is_empty()) {
            if let Some(bbox) = parse_title_bbox(&title) {
                let conf = parse_title_conf(&title).unwrap_or(0.0);
                words.push(WordToken {
                    text: text.to_string(),
                    bbox,
                    conf,
                    len: text.chars().count().max(1),
                });
            }
        }
        i = word_end + "</span>".len();
    }
    words
}

fn build_line(words: &[WordToken]) -> Option<RecognizedLine> {
    if words.is_empty() {
        return None;
    }

    let mut text = String::new();
    let mut last_token = String::new();
    for word in words {
        if !text.is_empty() && needs_space(&last_token, &word.text) {
            text.push(' ');
        }
        text.push_str(&word.text);
        last_token = word.text.clone();
    }
    let final_text = text.trim();
    if final_text.is_empty() {
        return None;
    }

    let mut bbox_opt: Option<PixelBox> = None;
    let mut conf_sum = 0.0;
    let mut len_sum = 0.0;
    for word in words {
        bbox_opt = Some(match bbox_opt.take() {
            Some(bbox) => union_box(&bbox, &word.bbox),
            None => word.bbox.clone(),
        });
        let weight = word.len.max(1) as f32;
        conf_sum += word.conf * weight;
        len_sum += weight;
    }
    let bbox = bbox_opt?;
    let conf = if len_sum > 0.0 {
        conf_sum / len_sum
    } else {
        0.0
    };

    Some(RecognizedLine {
        text: final_text.to_string(),
        bbox,
        conf,
    })
}

fn needs_space(left: &str, right: &str) -> bool {
    let last = left.chars().rev().find(|ch| !ch.is_whitespace());
    let first = right.chars().find(|ch| !ch.is_whitespace());
    match (last, first) {
        (Some(a), Some(b)) => {
            (a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric())
                || (a.is_alphabetic() && b.is_alphabetic())
        }
        _ => false,
    }
}

fn union_box(a: &PixelBox, b: &PixelBox) -> PixelBox {
    let x1 = a.x.min(b.x);
    let y1 = a.y.min(b.y);
    let x2 = (a.x + a.w).max(b.x + b.w);
    let y2 = (a.y + a.h).max(b.y + b.h);
    PixelBox {
        x: x1,
        y: y1,
        w: x2 - x1,
        h: y2 - y1,
    }
}

// title='bbox 100 200 250 230; x_wconf 95'
fn parse_title_bbox(title: &str) -> Option<PixelBox> {
    let idx = title.find("bbox")?;
    let rest = &title[idx + "bbox".len()..];
    let rest = rest.split(';').next()?;
    let mut nums = rest.split_whitespace().filter_map(|tok| tok.parse::<i64>().ok());
    let x1 = nums.next()?;
    let y1 = nums.next()?;
    let x2 = nums.next()?;
    let y2 = nums.next()?;
    if x2 <= x1 || y2 <= y1 || x1 < 0 || y1 < 0 {
        return None;
    }
    Some(PixelBox {
        x: x1 as u32,
        y: y1 as u32,
        w: (x2 - x1) as u32,
        h: (y2 - y1) as u32,
    })
}

fn parse_title_conf(title: &str) -> Option<f32> {
    let idx = title.find("x_wconf")?;
    let rest = &title[idx + "x_wconf".len()..];
    let rest = rest.split(';').next()?;
    rest.trim().parse::<f32>().ok()
}

fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack[from..]
        .windows(needle.len())
        .position(|win| win == needle)
        .map(|pos| from + pos)
}

fn find_byte(haystack: &[u8], needle: u8, from: usize) -> Option<usize> {
    haystack[from..]
        .iter()
        .position(|b| *b == needle)
        .map(|pos| from + pos)
}

fn find_span_inner(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut depth = 1i32;
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            if bytes[i..].starts_with(b"<span") {
                depth += 1;
            } else if bytes[i..].starts_with(b"</span") {
                depth -= 1;
                if depth == 0 {
                    return Some((start, i));
                }
            }
        }
        i += 1;
    }
    None
}

fn extract_attr(tag: &str, name: &str) -> Option<String> {
    let needle = format!("{}=", name);
    let idx = tag.find(&needle)?;
    let mut rest = &tag[idx + needle.len()..];
    if rest.starts_with('"') || rest.starts_with('\'') {
        let quote = rest.chars().next()?;
        rest = &rest[1..];
        let end = rest.find(quote)?;
        return Some(rest[..end].to_string());
    }
    None
}

fn strip_tags(value: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for ch in value.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ => {
                if !in_tag {
                    out.push(ch);
                }
            }
        }
    }
    out
}
