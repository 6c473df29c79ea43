use futures_util::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::ocr::debug::DebugDump;
use crate::ocr::recognizer::{RecognizerConfig, TextRecognizer};
use crate::ocr::{self, FragmentMap};
use crate::render::{self, RenderedDocument, RenderedPage, ResolvedFont};
use crate::settings::Settings;
use crate::source::{self, NormalizedSource, SourceDocument};
use crate::style::StyleSpec;

/// Summary of one extraction pass.
#[derive(Debug, Clone)]
pub struct ExtractOutcome {
    /// Pages the pass processed.
    pub pages: usize,
    /// Fragments the pass produced across all pages.
    pub fragments: usize,
    /// Pages whose recognition failed; they contribute no fragments.
    pub failed_pages: Vec<usize>,
    /// True when the pass was superseded by a newer load and its results
    /// were discarded instead of merged.
    pub stale: bool,
}

#[derive(Default)]
struct SessionState {
    source: Option<Arc<SourceDocument>>,
    fragments: FragmentMap,
}

/// One upload-through-export flow. The session owns the current source
/// and the fragments derived from it; loading a new source atomically
/// replaces both, and extraction passes started against a superseded
/// source discard their results instead of merging them.
pub struct Session<R: TextRecognizer + 'static> {
    recognizer: Arc<R>,
    settings: Settings,
    state: Mutex<SessionState>,
    generation: AtomicU64,
    limiter: Arc<Semaphore>,
    debug: Option<Arc<DebugDump>>,
}

impl<R: TextRecognizer + 'static> Session<R> {
    pub fn new(recognizer: R, settings: Settings) -> Session<R> {
        let workers = num_cpus::get().max(1);
        Session {
            recognizer: Arc::new(recognizer),
            settings,
            state: Mutex::new(SessionState::default()),
            generation: AtomicU64::new(0),
            limiter: Arc::new(Semaphore::new(workers)),
            debug: None,
        }
    }

    /// Enables per-page recognition dumps for this session.
    pub fn with_debug_dump(mut self, debug: DebugDump) -> Session<R> {
        self.debug = Some(Arc::new(debug));
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replaces the current source. Previously extracted fragments are
    /// cleared in the same step so a slow in-flight extraction can never
    /// write stale fragments into the new session state.
    pub fn load(&self, source: SourceDocument) {
        let mut state = self.state();
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.source = Some(Arc::new(source));
        state.fragments.clear();
    }

    /// Current fragments, keyed by page index.
    pub fn fragments(&self) -> FragmentMap {
        self.state().fragments.clone()
    }

    /// Runs recognition over every page of the current source, pages in
    /// parallel, and replaces the session's fragment map with the result.
    /// A page whose recognition fails contributes zero fragments; only an
    /// unreadable source is fatal.
    pub async fn extract(&self) -> Result<ExtractOutcome> {
        let (source, generation) = {
            let state = self.state();
            let source = state
                .source
                .clone()
                .ok_or_else(|| Error::SourceUnreadable("no source loaded".to_string()))?;
            (source, self.generation.load(Ordering::SeqCst))
        };

        let normalized = self.normalize_in_worker(source).await?;
        let rasters = match normalized {
            NormalizedSource::Text(_) => {
                // Raw text bypasses rasterization and OCR entirely.
                let mut state = self.state();
                let stale = self.generation.load(Ordering::SeqCst) != generation;
                if !stale {
                    state.fragments.clear();
                }
                return Ok(ExtractOutcome {
                    pages: 0,
                    fragments: 0,
                    failed_pages: Vec::new(),
                    stale,
                });
            }
            NormalizedSource::Pages(rasters) => rasters,
        };

        let page_count = rasters.len();
        let mut tasks = Vec::with_capacity(page_count);
        for raster in rasters {
            let recognizer = self.recognizer.clone();
            let config = RecognizerConfig {
                languages: self.settings.ocr_languages.clone(),
                ..RecognizerConfig::default()
            };
            let limiter = self.limiter.clone();
            let debug = self.debug.clone();
            tasks.push(async move {
                let page_index = raster.page_index;
                let permit = match limiter.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            page_index,
                            Err(Error::Other("worker pool closed".to_string())),
                        )
                    }
                };
                let joined = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let fragments = ocr::extract_page(recognizer.as_ref(), &raster, &config)?;
                    if let Some(debug) = debug.as_ref() {
                        if let Err(err) = debug.write_page(&raster, &fragments) {
                            warn!("failed to write recognition dump for page {}: {}", page_index, err);
                        }
                    }
                    Ok(fragments)
                })
                .await;
                match joined {
                    Ok(result) => (page_index, result),
                    Err(err) => (
                        page_index,
                        Err(Error::Other(format!("recognition worker failed: {}", err))),
                    ),
                }
            });
        }

        let results = join_all(tasks).await;
        let mut map = FragmentMap::new();
        let mut failed_pages = Vec::new();
        for (page_index, result) in results {
            match result {
                Ok(fragments) => {
                    map.insert(page_index, fragments);
                }
                Err(err) => {
                    let err = Error::PageRecognitionFailed {
                        page: page_index,
                        reason: err.to_string(),
                    };
                    warn!("{}; continuing with remaining pages", err);
                    failed_pages.push(page_index);
                    map.insert(page_index, Vec::new());
                }
            }
        }
        failed_pages.sort_unstable();
        let fragment_count = map.values().map(|fragments| fragments.len()).sum();

        let mut state = self.state();
        if self.generation.load(Ordering::SeqCst) != generation {
            warn!("discarding extraction results for a superseded source");
            return Ok(ExtractOutcome {
                pages: page_count,
                fragments: fragment_count,
                failed_pages,
                stale: true,
            });
        }
        state.fragments = map;
        info!(
            "extracted {} fragments across {} pages",
            fragment_count, page_count
        );
        Ok(ExtractOutcome {
            pages: page_count,
            fragments: fragment_count,
            failed_pages,
            stale: false,
        })
    }

    /// Renders the current source with the given style into a fresh
    /// document. Pages render in parallel; a page that fails to render is
    /// dropped from the output and the rest continue. The result
    /// supersedes any previous apply.
    pub async fn apply(&self, style: &StyleSpec) -> Result<RenderedDocument> {
        let (source, fragments) = {
            let state = self.state();
            let source = state
                .source
                .clone()
                .ok_or_else(|| Error::SourceUnreadable("no source loaded".to_string()))?;
            (source, state.fragments.clone())
        };

        let font = self.resolve_font_in_worker(style).await?;
        let normalized = self.normalize_in_worker(source).await?;

        let pages = match normalized {
            NormalizedSource::Text(text) => {
                let settings = self.settings.clone();
                let style = style.clone();
                let font = font.clone();
                tokio::task::spawn_blocking(move || {
                    render::render_raw_text(&text, &style, &font, &settings)
                })
                .await
                .map_err(|err| Error::Other(format!("render worker failed: {}", err)))??
            }
            NormalizedSource::Pages(rasters) => {
                let mut tasks = Vec::with_capacity(rasters.len());
                for raster in rasters {
                    let page_index = raster.page_index;
                    let page_fragments = fragments.get(&page_index).cloned().unwrap_or_default();
                    let style = style.clone();
                    let font = font.clone();
                    let settings = self.settings.clone();
                    let limiter = self.limiter.clone();
                    tasks.push(async move {
                        let permit = match limiter.acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => {
                                return (
                                    page_index,
                                    Err(Error::Other("worker pool closed".to_string())),
                                )
                            }
                        };
                        let joined = tokio::task::spawn_blocking(move || {
                            let _permit = permit;
                            render::render_source_page(
                                &raster,
                                &page_fragments,
                                &style,
                                &font,
                                &settings,
                            )
                        })
                        .await;
                        match joined {
                            Ok(result) => (page_index, result),
                            Err(err) => (
                                page_index,
                                Err(Error::Other(format!("render worker failed: {}", err))),
                            ),
                        }
                    });
                }

                let mut results = join_all(tasks).await;
                results.sort_by_key(|(page_index, _)| *page_index);
                let mut pages: Vec<RenderedPage> = Vec::new();
                for (page_index, result) in results {
                    match result {
                        Ok(rendered) => pages.extend(rendered),
                        Err(err) => {
                            let err = Error::PageRenderFailed {
                                page: page_index,
                                reason: err.to_string(),
                            };
                            warn!("{}; dropping page from output", err);
                        }
                    }
                }
                pages
            }
        };

        info!("rendered {} output pages", pages.len());
        Ok(RenderedDocument {
            pages,
            style: style.clone(),
        })
    }

    async fn normalize_in_worker(&self, source: Arc<SourceDocument>) -> Result<NormalizedSource> {
        let settings = self.settings.clone();
        tokio::task::spawn_blocking(move || source::normalize(&source, &settings))
            .await
            .map_err(|err| Error::Other(format!("normalize worker failed: {}", err)))?
    }

    async fn resolve_font_in_worker(&self, style: &StyleSpec) -> Result<ResolvedFont> {
        let family = style.font;
        let font_dir = self.settings.font_dir.clone();
        tokio::task::spawn_blocking(move || render::resolve_font(family, font_dir.as_deref()))
            .await
            .map_err(|err| Error::Other(format!("font worker failed: {}", err)))
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::geometry::NormalizedBox;
    use crate::ocr::recognizer::{Candidate, Observation};
    use crate::source::PageRaster;
    use std::io::Cursor;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([255, 255, 255, 255]),
        ));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    fn image_sequence(pages: usize) -> SourceDocument {
        SourceDocument::ImageSequence((0..pages).map(|_| png_bytes(100, 100)).collect())
    }

    fn observation(text: &str) -> Observation {
        Observation {
            candidates: vec![Candidate {
                text: text.to_string(),
                confidence: 1.0,
            }],
            bbox: NormalizedBox {
                origin_x: 0.1,
                origin_y: 0.8,
                width: 0.5,
                height: 0.1,
            },
        }
    }

    struct StubRecognizer;

    impl TextRecognizer for StubRecognizer {
        fn recognize(
            &self,
            raster: &PageRaster,
            _config: &RecognizerConfig,
        ) -> Result<Vec<Observation>> {
            Ok(vec![observation(&format!("page {}", raster.page_index))])
        }
    }

    struct FailingRecognizer {
        fail_on: usize,
    }

    impl TextRecognizer for FailingRecognizer {
        fn recognize(
            &self,
            raster: &PageRaster,
            _config: &RecognizerConfig,
        ) -> Result<Vec<Observation>> {
            if raster.page_index == self.fail_on {
                return Err(Error::Other("simulated engine failure".to_string()));
            }
            Ok(vec![observation(&format!("page {}", raster.page_index))])
        }
    }

    struct GatedRecognizer {
        entered: Arc<AtomicBool>,
        release: Arc<AtomicBool>,
    }

    impl TextRecognizer for GatedRecognizer {
        fn recognize(
            &self,
            raster: &PageRaster,
            _config: &RecognizerConfig,
        ) -> Result<Vec<Observation>> {
            self.entered.store(true, Ordering::SeqCst);
            while !self.release.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(vec![observation(&format!("page {}", raster.page_index))])
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn extract_merges_fragments_by_page() {
        let session = Session::new(StubRecognizer, Settings::default());
        session.load(image_sequence(3));
        let outcome = session.extract().await.expect("extract");
        assert!(!outcome.stale);
        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.fragments, 3);
        let fragments = session.fragments();
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[&1][0].text, "page 1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn page_failure_is_isolated() {
        let session = Session::new(FailingRecognizer { fail_on: 1 }, Settings::default());
        session.load(image_sequence(3));
        let outcome = session.extract().await.expect("extract");
        assert_eq!(outcome.failed_pages, vec![1]);
        let fragments = session.fragments();
        assert!(!fragments[&0].is_empty());
        assert!(fragments[&1].is_empty());
        assert!(!fragments[&2].is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn extract_without_a_source_is_unreadable() {
        let session = Session::new(StubRecognizer, Settings::default());
        let result = session.extract().await;
        assert!(matches!(result, Err(Error::SourceUnreadable(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_clears_previous_fragments() {
        let session = Session::new(StubRecognizer, Settings::default());
        session.load(image_sequence(1));
        session.extract().await.expect("extract");
        assert!(!session.fragments().is_empty());
        session.load(image_sequence(2));
        assert!(session.fragments().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn superseded_extraction_pass_is_discarded() {
        let entered = Arc::new(AtomicBool::new(false));
        let release = Arc::new(AtomicBool::new(false));
        let recognizer = GatedRecognizer {
            entered: entered.clone(),
            release: release.clone(),
        };
        let session = Arc::new(Session::new(recognizer, Settings::default()));
        session.load(image_sequence(1));

        let worker = {
            let session = session.clone();
            tokio::spawn(async move { session.extract().await })
        };

        while !entered.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // A new upload arrives while recognition is still running.
        session.load(image_sequence(1));
        release.store(true, Ordering::SeqCst);

        let outcome = worker.await.expect("join").expect("extract");
        assert!(outcome.stale);
        assert!(session.fragments().is_empty());
    }
}
