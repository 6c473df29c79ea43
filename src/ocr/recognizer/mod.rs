mod parse;
mod tesseract;

pub use tesseract::{list_tesseract_languages, TesseractRecognizer};

use crate::error::Result;
use crate::ocr::geometry::NormalizedBox;
use crate::source::PageRaster;

/// How recognition is invoked for every page of a pass.
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Recognition languages, in engine codes.
    pub languages: Vec<String>,
    /// Prefer accuracy over speed.
    pub accurate: bool,
    /// Let the engine correct words against its language model.
    pub language_correction: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            languages: vec!["kor".to_string(), "eng".to_string()],
            accurate: true,
            language_correction: true,
        }
    }
}

/// One candidate transcription for an observation.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub text: String,
    pub confidence: f32,
}

/// One recognized region of a page: ranked candidates plus a bounding box
/// in recognizer space (unit square, origin bottom-left, y up).
#[derive(Debug, Clone)]
pub struct Observation {
    /// Best candidate first.
    pub candidates: Vec<Candidate>,
    pub bbox: NormalizedBox,
}

impl Observation {
    pub fn top_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }
}

/// The external recognition capability. Implementations must emit
/// observations in a deterministic order for a given raster.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, raster: &PageRaster, config: &RecognizerConfig)
        -> Result<Vec<Observation>>;
}
