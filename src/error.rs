use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the restyling pipeline.
///
/// `SourceUnreadable` is fatal to the session. `PageRecognitionFailed` and
/// `PageRenderFailed` are per-page: the pipeline logs them and continues
/// with the remaining pages. `FontUnavailable` always degrades to a
/// fallback face and is only surfaced for reporting.
#[derive(Error, Debug)]
pub enum Error {
    /// The input bytes could not be opened or decoded.
    #[error("source could not be read: {0}")]
    SourceUnreadable(String),

    /// Recognition failed for one page; the page contributes no fragments.
    #[error("recognition failed on page {page}: {reason}")]
    PageRecognitionFailed { page: usize, reason: String },

    /// One page could not be re-rendered; it is dropped from the output.
    #[error("page {page} could not be rendered: {reason}")]
    PageRenderFailed { page: usize, reason: String },

    /// The requested font family is not installed.
    #[error("font family not available: {0}")]
    FontUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("svg error: {0}")]
    Svg(String),

    #[error("composition error: {0}")]
    Compose(String),

    #[error("settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}
