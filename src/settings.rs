use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Pipeline tuning knobs. Everything user-facing (font, color, layout)
/// travels in a `StyleSpec` instead; these settings only shape how the
/// pipeline works.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Recognition languages, best effort (tesseract codes).
    pub ocr_languages: Vec<String>,
    /// DPI used when rasterizing native PDF pages. 72 keeps one pixel per
    /// point so mapped fragment frames line up with the page exactly.
    pub raster_dpi: u32,
    pub reflow_font_size: f32,
    pub reflow_line_height: f32,
    pub page_margin_x: f32,
    pub page_margin_y: f32,
    /// Page size used when rendering a raw-text source (points).
    pub raw_text_page_size: (f32, f32),
    /// Extra directory of font files made visible to rendering.
    pub font_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ocr_languages: vec!["kor".to_string(), "eng".to_string()],
            raster_dpi: 72,
            reflow_font_size: 16.0,
            reflow_line_height: 20.0,
            page_margin_x: 20.0,
            page_margin_y: 50.0,
            raw_text_page_size: (612.0, 792.0),
            font_dir: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrSettings>,
    render: Option<RenderSettings>,
    page: Option<PageSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    languages: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    raster_dpi: Option<u32>,
    reflow_font_size: Option<f32>,
    reflow_line_height: Option<f32>,
    font_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PageSettings {
    margin_x: Option<f32>,
    margin_y: Option<f32>,
    raw_text_width: Option<f32>,
    raw_text_height: Option<f32>,
}

/// Loads settings from `refont.toml` / `refont.local.toml` in the working
/// directory, then an optional explicit file, each layer overriding the
/// previous one. Missing files are skipped; a missing explicit file is an
/// error.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("refont.toml"));
    ordered_paths.push(PathBuf::from("refont.local.toml"));

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(Error::Settings(format!(
                "settings file not found: {}",
                extra.display()
            )));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let parsed: SettingsFile = toml::from_str(&content).map_err(|err| {
                Error::Settings(format!("failed to parse {}: {}", path.display(), err))
            })?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(ocr) = incoming.ocr {
            if let Some(languages) = ocr.languages {
                if !languages.is_empty() {
                    self.ocr_languages = languages;
                }
            }
        }
        if let Some(render) = incoming.render {
            if let Some(dpi) = render.raster_dpi {
                if dpi > 0 {
                    self.raster_dpi = dpi;
                }
            }
            if let Some(size) = render.reflow_font_size {
                if size > 0.0 {
                    self.reflow_font_size = size;
                }
            }
            if let Some(height) = render.reflow_line_height {
                if height > 0.0 {
                    self.reflow_line_height = height;
                }
            }
            if let Some(dir) = render.font_dir {
                self.font_dir = Some(PathBuf::from(dir));
            }
        }
        if let Some(page) = incoming.page {
            if let Some(margin) = page.margin_x {
                self.page_margin_x = margin;
            }
            if let Some(margin) = page.margin_y {
                self.page_margin_y = margin;
            }
            if let Some(width) = page.raw_text_width {
                if width > 0.0 {
                    self.raw_text_page_size.0 = width;
                }
            }
            if let Some(height) = page.raw_text_height {
                if height > 0.0 {
                    self.raw_text_page_size.1 = height;
                }
            }
        }
    }
}
