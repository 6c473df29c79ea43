pub mod debug;
pub mod geometry;
pub mod recognizer;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::source::PageRaster;

use self::geometry::Rect;
use self::recognizer::{RecognizerConfig, TextRecognizer};

/// One recognized piece of text with its position on a page, in document
/// pixel space. Immutable once created for a given extraction pass.
#[derive(Debug, Clone, Serialize)]
pub struct TextFragment {
    pub text: String,
    pub frame: Rect,
    pub page_index: usize,
}

/// Extracted fragments keyed by page index. Ordering within a page is
/// recognizer emission order, not guaranteed reading order.
pub type FragmentMap = BTreeMap<usize, Vec<TextFragment>>;

/// Runs recognition on one page raster and maps every observation's box
/// into document space. Only the top-ranked candidate of each observation
/// is kept; lower-ranked candidates are discarded.
pub fn extract_page<R>(
    recognizer: &R,
    raster: &PageRaster,
    config: &RecognizerConfig,
) -> Result<Vec<TextFragment>>
where
    R: TextRecognizer + ?Sized,
{
    let (width, height) = raster.size();
    let observations = recognizer.recognize(raster, config)?;
    let mut fragments = Vec::with_capacity(observations.len());
    for observation in observations {
        let Some(candidate) = observation.top_candidate() else {
            continue;
        };
        fragments.push(TextFragment {
            text: candidate.text.clone(),
            frame: observation.bbox.to_rect(width as f32, height as f32),
            page_index: raster.page_index,
        });
    }
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::geometry::NormalizedBox;
    use crate::ocr::recognizer::{Candidate, Observation};
    use crate::source::PageRaster;
    use image::DynamicImage;

    struct FixedRecognizer {
        observations: Vec<Observation>,
    }

    impl TextRecognizer for FixedRecognizer {
        fn recognize(
            &self,
            _raster: &PageRaster,
            _config: &RecognizerConfig,
        ) -> Result<Vec<Observation>> {
            Ok(self.observations.clone())
        }
    }

    fn raster(width: u32, height: u32, page_index: usize) -> PageRaster {
        PageRaster {
            image: DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
                width,
                height,
                image::Rgba([255, 255, 255, 255]),
            )),
            page_index,
        }
    }

    #[test]
    fn only_the_top_candidate_survives() {
        let recognizer = FixedRecognizer {
            observations: vec![Observation {
                candidates: vec![
                    Candidate {
                        text: "best".to_string(),
                        confidence: 0.9,
                    },
                    Candidate {
                        text: "worse".to_string(),
                        confidence: 0.4,
                    },
                ],
                bbox: NormalizedBox {
                    origin_x: 0.25,
                    origin_y: 0.5,
                    width: 0.5,
                    height: 0.25,
                },
            }],
        };
        let fragments =
            extract_page(&recognizer, &raster(200, 100, 3), &RecognizerConfig::default())
                .expect("extract");
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, "best");
        assert_eq!(fragments[0].page_index, 3);
        assert!((fragments[0].frame.x - 50.0).abs() < 1e-4);
        assert!((fragments[0].frame.y - 25.0).abs() < 1e-4);
    }

    #[test]
    fn fragments_keep_emission_order() {
        let make_observation = |text: &str, oy: f32| Observation {
            candidates: vec![Candidate {
                text: text.to_string(),
                confidence: 1.0,
            }],
            bbox: NormalizedBox {
                origin_x: 0.0,
                origin_y: oy,
                width: 0.5,
                height: 0.1,
            },
        };
        // Emission order deliberately differs from top-to-bottom order.
        let recognizer = FixedRecognizer {
            observations: vec![
                make_observation("second-from-bottom", 0.2),
                make_observation("near-top", 0.8),
            ],
        };
        let fragments =
            extract_page(&recognizer, &raster(100, 100, 0), &RecognizerConfig::default())
                .expect("extract");
        assert_eq!(fragments[0].text, "second-from-bottom");
        assert_eq!(fragments[1].text, "near-top");
    }
}
