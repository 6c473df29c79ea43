//! Re-render scanned documents with the recognized text in a new font.
//!
//! The pipeline takes a source document (native PDF, a photo, a multi-shot
//! scan, or raw text), extracts positioned text fragments per page through
//! an external recognition capability, and re-renders the document with
//! the text restyled: either overlaid at its original position or reflowed
//! as a paragraph stream. The GUI shell around it supplies input bytes and
//! a [`StyleSpec`] and consumes the resulting [`RenderedDocument`].

pub mod compose;
pub mod error;
pub mod logging;
pub mod ocr;
pub mod render;
pub mod session;
pub mod settings;
pub mod source;
pub mod style;

pub use error::{Error, Result};
pub use ocr::debug::DebugDump;
pub use ocr::geometry::{NormalizedBox, Rect};
pub use ocr::recognizer::{
    Candidate, Observation, RecognizerConfig, TesseractRecognizer, TextRecognizer,
};
pub use ocr::{FragmentMap, TextFragment};
pub use render::{RenderedDocument, RenderedPage};
pub use session::{ExtractOutcome, Session};
pub use settings::{load_settings, Settings};
pub use source::{NormalizedSource, PageRaster, SourceDocument};
pub use style::{FontFamily, LayoutMode, StyleSpec, TextColor};

/// One-shot convenience for shells that do not keep a session around:
/// load, extract, and apply in sequence against a fresh session.
pub async fn restyle<R: TextRecognizer + 'static>(
    source: SourceDocument,
    style: &StyleSpec,
    settings: Settings,
    recognizer: R,
) -> Result<RenderedDocument> {
    let session = Session::new(recognizer, settings);
    session.load(source);
    session.extract().await?;
    session.apply(style).await
}
