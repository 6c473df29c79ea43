use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::warn;

use crate::error::{Error, Result};
use crate::ocr::geometry::{NormalizedBox, Rect};
use crate::source::PageRaster;

use super::parse::{parse_hocr_lines, parse_tsv_lines, RecognizedLine};
use super::{Candidate, Observation, RecognizerConfig, TextRecognizer};

/// Recognition backend that shells out to the tesseract CLI. Boxes come
/// back in pixel space and are converted to the recognizer-space contract
/// (unit square, origin bottom-left) before they leave this module.
#[derive(Debug, Default)]
pub struct TesseractRecognizer;

impl TesseractRecognizer {
    pub fn new() -> TesseractRecognizer {
        TesseractRecognizer
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(
        &self,
        raster: &PageRaster,
        config: &RecognizerConfig,
    ) -> Result<Vec<Observation>> {
        let languages = normalize_languages(&config.languages)?;

        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile()?;
        raster
            .image
            .write_to(&mut tmp, image::ImageFormat::Png)
            .map_err(Error::Image)?;
        tmp.flush().ok();

        let hocr = run_tesseract(tmp.path(), &languages, config, "hocr")?;
        let mut lines = parse_hocr_lines(&hocr);
        if lines.is_empty() {
            let tsv = run_tesseract(tmp.path(), &languages, config, "tsv")?;
            lines = parse_tsv_lines(&tsv);
        }

        let (width, height) = raster.size();
        Ok(lines
            .into_iter()
            .map(|line| to_observation(line, width as f32, height as f32))
            .collect())
    }
}

fn to_observation(line: RecognizedLine, raster_w: f32, raster_h: f32) -> Observation {
    let rect = Rect::new(
        line.bbox.x as f32,
        line.bbox.y as f32,
        line.bbox.w as f32,
        line.bbox.h as f32,
    );
    Observation {
        candidates: vec![Candidate {
            text: line.text,
            confidence: line.conf,
        }],
        bbox: NormalizedBox::from_rect(&rect, raster_w, raster_h),
    }
}

fn run_tesseract(
    path: &Path,
    languages: &str,
    config: &RecognizerConfig,
    format: &str,
) -> Result<String> {
    let mut command = Command::new("tesseract");
    command
        .arg(path)
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .arg("--oem")
        .arg(if config.accurate { "1" } else { "0" })
        .arg("--psm")
        .arg("6")
        .arg("--dpi")
        .arg("300");
    if !config.language_correction {
        command
            .arg("-c")
            .arg("load_system_dawg=0")
            .arg("-c")
            .arg("load_freq_dawg=0");
    }
    let output = command
        .arg(format)
        .output()
        .map_err(|err| Error::Other(format!("failed to run tesseract (is it installed?): {}", err)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Other(format!("tesseract failed: {}", stderr.trim())));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

pub fn list_tesseract_languages() -> Result<Vec<String>> {
    let output = Command::new("tesseract")
        .arg("--list-langs")
        .output()
        .map_err(|err| Error::Other(format!("failed to run tesseract --list-langs: {}", err)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Other(format!(
            "tesseract --list-langs failed: {}",
            stderr.trim()
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut langs = Vec::new();
    for (idx, line) in stdout.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let value = line.trim();
        if !value.is_empty() {
            langs.push(value.to_string());
        }
    }
    Ok(langs)
}

/// Filters the requested languages against what the engine has installed.
/// Missing packs are warned about and skipped; none available at all is an
/// error. When the engine cannot even be asked, the request passes through
/// untouched.
fn normalize_languages(requested: &[String]) -> Result<String> {
    if requested.is_empty() {
        return Err(Error::Other("ocr languages is empty".to_string()));
    }

    let available = match list_tesseract_languages() {
        Ok(list) => list,
        Err(_) => return Ok(requested.join("+")),
    };

    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for lang in requested {
        let lang = lang.trim();
        if lang.is_empty() {
            continue;
        }
        if available.iter().any(|value| value == lang) {
            chosen.push(lang.to_string());
        } else {
            missing.push(lang.to_string());
        }
    }

    if chosen.is_empty() {
        return Err(Error::Other(format!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        )));
    }
    if !missing.is_empty() {
        warn!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        );
    }

    Ok(chosen.join("+"))
}
