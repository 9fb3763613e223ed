//! Eager (whole-document) extraction entry points.
//!
//! ## Why eager vs. streaming?
//!
//! This module provides the simpler API: wait for all pages, then return one
//! sorted [`ResultBundle`] with run-level [`Diagnostics`]. Use
//! [`crate::stream::process_stream`] when you want pages as they complete.
//!
//! ## Per-page flow
//!
//! ```text
//! page ─▶ [LayoutModel] ─▶ join!(TextModel stream, TableModel stream) ─▶ aggregate
//!            │ fails                 │ fails
//!            ▼                       ▼
//!      full-page fallback     stream omitted for this page
//! ```
//!
//! Pages run concurrently (`buffer_unordered(concurrency)`) and are sorted
//! by page number afterwards. Within a stream, region calls run through
//! `buffered(concurrency)` so their results keep region order. Every model
//! call also takes a slot from a run-wide semaphore of `concurrency`
//! permits, so at most `concurrency` calls are in flight per run.

use crate::aggregate::aggregate;
use crate::config::ProcessingConfig;
use crate::document::{Document, Page};
use crate::error::{ModelError, PageError, ProcessingError};
use crate::model::{
    crop_padded, registry, BoundingBox, Detection, ImageRegion, LayoutKind, LayoutRegion,
    ModelSet, PageDetections, Stream, TableDetection, TableModel, TextDetection, TextModel,
};
use crate::output::{Diagnostics, PageResult, ProcessingOutput, ProcessingStats, ResultBundle};
use crate::pipeline::postprocess;
use crate::storage::{self, ArtifactStore, RunId};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// One page's contribution plus the non-fatal errors met on the way.
#[derive(Debug, Clone)]
pub struct PageReport {
    pub result: PageResult,
    pub errors: Vec<PageError>,
}

impl PageReport {
    pub fn page_number(&self) -> usize {
        self.result.page_number
    }

    /// True when neither the text nor the table stream failed.
    pub fn is_success(&self) -> bool {
        !self
            .errors
            .iter()
            .any(|e| matches!(e, PageError::ModelFailed { .. }))
    }
}

/// Shared, read-only state for the page tasks of one run.
pub(crate) struct RunContext {
    pub run_id: RunId,
    pub config: ProcessingConfig,
    pub models: Arc<ModelSet>,
    pub store: Arc<dyn ArtifactStore>,
    pub total_pages: usize,
    /// Caps in-flight model calls across all pages of the run.
    pub model_slots: Semaphore,
}

impl RunContext {
    pub fn new(
        document: &Document,
        config: &ProcessingConfig,
        models: Arc<ModelSet>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            run_id: RunId::new(),
            config: config.clone(),
            models,
            store,
            total_pages: document.page_count(),
            model_slots: Semaphore::new(config.concurrency.max(1)),
        }
    }
}

/// Extract text, tables and figures from a loaded document.
///
/// This is the core entry point; [`process`] wraps it with document loading,
/// the registry and the configured artifact store.
///
/// # Returns
/// `Ok(ProcessingOutput)` even when some pages or artifacts failed; check
/// `output.diagnostics`.
///
/// # Errors
/// - [`ProcessingError::InvalidDocument`] when the document has no pages
/// - [`ProcessingError::ModelUnavailable`] when a requested model is not in
///   `models`, or when the text or table stream failed on every page
pub async fn run(
    document: &Document,
    config: &ProcessingConfig,
    models: Arc<ModelSet>,
    store: Arc<dyn ArtifactStore>,
) -> Result<ProcessingOutput, ProcessingError> {
    let total_start = Instant::now();
    document.ensure_not_empty()?;
    check_concurrency(config)?;
    let total_pages = document.page_count();

    if config.is_noop() {
        info!("Text and table extraction both disabled; nothing to do");
        return Ok(ProcessingOutput {
            stats: ProcessingStats {
                total_pages,
                total_duration_ms: total_start.elapsed().as_millis() as u64,
                ..Default::default()
            },
            ..Default::default()
        });
    }

    check_models(config, &models)?;

    let ctx = Arc::new(RunContext::new(document, config, models, store));
    let run_id = ctx.run_id;
    info!(
        "Processing {} page(s) from {} (run={}, text={}, table={}, layout={}, store={})",
        total_pages,
        document.source,
        run_id,
        config.process_text,
        config.process_table,
        config.layout,
        ctx.store.backend()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total_pages);
    }

    // ── Model + aggregation stage ────────────────────────────────────────
    let model_start = Instant::now();
    let mut reports: Vec<PageReport> = stream::iter(document.pages.clone())
        .map(move |page| process_page(page, Arc::clone(&ctx)))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    let model_duration_ms = model_start.elapsed().as_millis() as u64;

    reports.sort_by_key(PageReport::page_number);

    // ── Assemble ─────────────────────────────────────────────────────────
    let mut diagnostics = Diagnostics::default();
    let mut pages = Vec::with_capacity(reports.len());
    let mut processed = 0;
    for report in reports {
        if report.is_success() {
            processed += 1;
        }
        for error in report.errors {
            diagnostics.record(error);
        }
        pages.push(report.result);
    }
    let (result, artifact_failures) = ResultBundle::from_pages(pages);
    diagnostics.artifact_failures = artifact_failures;
    diagnostics.sort();

    if config.process_text {
        ensure_stream_survived(Stream::Text, &diagnostics.text_failures, total_pages)?;
    }
    if config.process_table {
        ensure_stream_survived(Stream::Table, &diagnostics.table_failures, total_pages)?;
    }

    let stats = ProcessingStats {
        total_pages,
        processed_pages: processed,
        failed_pages: total_pages - processed,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        model_duration_ms,
        run_id: run_id.to_string(),
    };

    info!(
        "Extraction complete: {}/{} pages, {} text, {} table, {} image item(s), {} artifact failure(s), {}ms",
        processed,
        total_pages,
        result.text.len(),
        result.table.len(),
        result.image.len(),
        diagnostics.artifact_failure_count(),
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total_pages, processed);
    }

    Ok(ProcessingOutput {
        result,
        diagnostics,
        stats,
    })
}

/// Load `input_str` (path or URL) and run it with the registry's models and
/// the artifact store selected by `config.storage`.
///
/// # Errors
/// As [`run`], plus [`ProcessingError::InvalidDocument`] for unloadable input
/// and [`ProcessingError::RegistryNotInitialized`] when a model is needed but
/// the registry is empty.
pub async fn process(
    input_str: impl AsRef<str>,
    is_image: bool,
    config: &ProcessingConfig,
) -> Result<ProcessingOutput, ProcessingError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    let document = Document::load(input_str, is_image, config).await?;
    let models = if config.is_noop() {
        Arc::new(ModelSet::new())
    } else {
        registry::current()?
    };
    let store = storage::store_from_config(&config.storage).await?;

    run(&document, config, models, store).await
}

/// Run [`process`] and write the [`ResultBundle`] JSON to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn process_to_file(
    input_str: impl AsRef<str>,
    is_image: bool,
    output_path: impl AsRef<Path>,
    config: &ProcessingConfig,
) -> Result<ProcessingOutput, ProcessingError> {
    let output = process(input_str, is_image, config).await?;
    write_json_atomic(&output.result, output_path.as_ref()).await?;
    Ok(output)
}

/// Synchronous wrapper around [`process`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(
    input_str: impl AsRef<str>,
    is_image: bool,
    config: &ProcessingConfig,
) -> Result<ProcessingOutput, ProcessingError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ProcessingError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process(input_str, is_image, config))
}

/// Process an in-memory document.
///
/// The bytes are written to a managed temp file that is removed on return.
pub async fn process_from_bytes(
    bytes: &[u8],
    is_image: bool,
    config: &ProcessingConfig,
) -> Result<ProcessingOutput, ProcessingError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| ProcessingError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| ProcessingError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    process(&path, is_image, config).await
}

/// Serialise `bundle` to `path` via a sibling temp file and a rename.
pub async fn write_json_atomic(bundle: &ResultBundle, path: &Path) -> Result<(), ProcessingError> {
    let write_err = |source: std::io::Error| ProcessingError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let json = bundle
        .to_json_pretty()
        .map_err(|e| ProcessingError::Internal(format!("serialise result: {e}")))?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Reject `concurrency == 0`, which would stall `buffer_unordered` forever.
pub(crate) fn check_concurrency(config: &ProcessingConfig) -> Result<(), ProcessingError> {
    if config.concurrency == 0 {
        return Err(ProcessingError::InvalidConfig(
            "Concurrency must be ≥ 1".into(),
        ));
    }
    Ok(())
}

/// A requested stream needs its model in the set. Layout only guides the
/// other two, so a missing layout model degrades to full-page recognition.
pub(crate) fn check_models(config: &ProcessingConfig, models: &ModelSet) -> Result<(), ProcessingError> {
    if config.process_text && models.text.is_none() {
        return Err(ProcessingError::ModelUnavailable {
            stream: Stream::Text,
            reason: "no text model registered".into(),
        });
    }
    if config.process_table && models.table.is_none() {
        return Err(ProcessingError::ModelUnavailable {
            stream: Stream::Table,
            reason: "no table model registered".into(),
        });
    }
    if config.layout && models.layout.is_none() {
        warn!("Layout requested but no layout model registered; using full pages");
    }
    Ok(())
}

fn ensure_stream_survived(
    stream: Stream,
    failures: &[PageError],
    total_pages: usize,
) -> Result<(), ProcessingError> {
    let mut pages: Vec<usize> = failures.iter().map(PageError::page).collect();
    pages.dedup();
    if total_pages > 0 && pages.len() >= total_pages {
        let first = failures
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(ProcessingError::ModelUnavailable {
            stream,
            reason: format!("failed on all {} page(s); first error: {}", total_pages, first),
        });
    }
    Ok(())
}

/// Run the model stage and the aggregator for one page.
pub(crate) async fn process_page(page: Arc<Page>, ctx: Arc<RunContext>) -> PageReport {
    let page_number = page.page_number;
    let total = ctx.total_pages;
    let config = &ctx.config;
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page_number, total);
    }

    let mut errors = Vec::new();
    let slots = &ctx.model_slots;
    let regions = detect_layout(&page, &ctx.models, config, slots, &mut errors).await;

    let text_fut = async {
        match ctx.models.text.as_deref() {
            Some(model) if config.process_text => {
                recognize_text(model, &page, regions.as_deref(), config.concurrency, slots).await
            }
            _ => Ok(Vec::new()),
        }
    };
    let table_fut = async {
        match ctx.models.table.as_deref() {
            Some(model) if config.process_table => {
                recognize_tables(model, &page, regions.as_deref(), config.concurrency, slots)
                    .await
            }
            _ => Ok(Vec::new()),
        }
    };
    let (text, tables) = futures::join!(text_fut, table_fut);

    let mut detections = PageDetections::new(page_number);
    for (stream, outcome) in [(Stream::Text, text), (Stream::Table, tables)] {
        match outcome {
            Ok(found) => found.into_iter().for_each(|d| detections.push(d)),
            Err(e) => {
                warn!("Page {}: {} model failed: {}", page_number, stream, e);
                errors.push(PageError::ModelFailed {
                    page: page_number,
                    stream,
                    detail: e.to_string(),
                });
            }
        }
    }

    if let Some(ref regions) = regions {
        for r in regions.iter().filter(|r| r.kind == LayoutKind::Figure) {
            let (image, _) = crop_padded(&page.image, &r.region);
            detections.push(Detection::Image(ImageRegion {
                page_number,
                region: r.region,
                image,
            }));
        }
    }

    if detections.is_empty() {
        debug!("Page {}: nothing detected", page_number);
    } else {
        debug!("Page {}: {} detection(s)", page_number, detections.len());
    }
    let result = aggregate(detections, ctx.run_id, ctx.store.as_ref()).await;

    if let Some(ref cb) = config.progress_callback {
        for e in &errors {
            cb.on_page_error(page_number, total, e.to_string());
        }
        cb.on_page_complete(page_number, total, result.item_count());
    }

    PageReport { result, errors }
}

/// Await one model call once a run-wide slot is free.
async fn limited<F: Future>(slots: &Semaphore, call: F) -> F::Output {
    let _permit = slots.acquire().await;
    call.await
}

/// Layout regions to use as hints, or `None` for full-page recognition.
async fn detect_layout(
    page: &Page,
    models: &ModelSet,
    config: &ProcessingConfig,
    slots: &Semaphore,
    errors: &mut Vec<PageError>,
) -> Option<Vec<LayoutRegion>> {
    if !config.layout {
        return None;
    }
    let model = models.layout.as_deref()?;

    match limited(slots, model.detect(&page.image)).await {
        Ok(regions) if regions.is_empty() => {
            debug!("Page {}: layout found no regions, using full page", page.page_number);
            None
        }
        Ok(regions) => {
            debug!("Page {}: {} layout region(s)", page.page_number, regions.len());
            Some(regions)
        }
        Err(e) => {
            warn!("Page {}: layout failed, using full page: {}", page.page_number, e);
            errors.push(PageError::LayoutFailed {
                page: page.page_number,
                detail: e.to_string(),
            });
            None
        }
    }
}

async fn recognize_text(
    model: &dyn TextModel,
    page: &Page,
    regions: Option<&[LayoutRegion]>,
    concurrency: usize,
    slots: &Semaphore,
) -> Result<Vec<Detection>, ModelError> {
    let page_number = page.page_number;

    let Some(regions) = regions else {
        let spans = limited(slots, model.recognize(&page.image)).await?;
        return Ok(spans
            .into_iter()
            .filter(|s| !s.text.trim().is_empty())
            .map(|s| {
                Detection::Text(TextDetection {
                    page_number,
                    region: s.region,
                    content: s.text,
                })
            })
            .collect());
    };

    let boxes: Vec<BoundingBox> = regions
        .iter()
        .filter(|r| r.kind.is_text_like())
        .map(|r| r.region)
        .collect();

    let blocks: Vec<Option<Detection>> = stream::iter(boxes.into_iter().map(|region| async move {
        let (crop, _) = crop_padded(&page.image, &region);
        let mut spans = limited(slots, model.recognize(&crop)).await?;
        spans.sort_by(|a, b| a.region.reading_cmp(&b.region));
        let content = postprocess::join_lines(spans.iter().map(|s| s.text.as_str()));
        Ok::<_, ModelError>((!content.is_empty()).then(|| {
            Detection::Text(TextDetection {
                page_number,
                region,
                content,
            })
        }))
    }))
    .buffered(concurrency)
    .try_collect()
    .await?;

    Ok(blocks.into_iter().flatten().collect())
}

async fn recognize_tables(
    model: &dyn TableModel,
    page: &Page,
    regions: Option<&[LayoutRegion]>,
    concurrency: usize,
    slots: &Semaphore,
) -> Result<Vec<Detection>, ModelError> {
    let page_number = page.page_number;

    let Some(regions) = regions else {
        let tables = limited(slots, model.recognize(&page.image)).await?;
        return Ok(tables
            .into_iter()
            .map(|t| {
                let (rendering, _) = crop_padded(&page.image, &t.region);
                Detection::Table(TableDetection {
                    page_number,
                    region: t.region,
                    html: t.html,
                    rendering,
                })
            })
            .collect());
    };

    let boxes: Vec<BoundingBox> = regions
        .iter()
        .filter(|r| r.kind == LayoutKind::Table)
        .map(|r| r.region)
        .collect();

    let found: Vec<Option<Detection>> = stream::iter(boxes.into_iter().map(|region| async move {
        let (crop, _) = crop_padded(&page.image, &region);
        let tables = limited(slots, model.recognize(&crop)).await?;
        Ok::<_, ModelError>(tables.into_iter().next().map(|t| {
            Detection::Table(TableDetection {
                page_number,
                region,
                html: t.html,
                rendering: crop,
            })
        }))
    }))
    .buffered(concurrency)
    .try_collect()
    .await?;

    Ok(found.into_iter().flatten().collect())
}
