//! Streaming extraction API: emit pages as they complete.
//!
//! ## Why stream?
//!
//! Large documents take minutes. A stream lets callers display partial
//! results immediately or persist pages incrementally instead of waiting
//! for the whole document.
//!
//! Unlike the eager [`crate::process::run`], pages are emitted in completion
//! order (sort by [`PageReport::page_number`] if order matters), and there is
//! no all-pages-failed check: each [`PageReport`] carries its own errors.
//! The progress callback's `on_run_complete` fires once the last page has
//! been yielded; a stream dropped early never reports completion.

use crate::config::ProcessingConfig;
use crate::document::Document;
use crate::error::ProcessingError;
use crate::model::{registry, ModelSet};
use crate::process::{check_concurrency, check_models, process_page, PageReport, RunContext};
use crate::storage::{self, ArtifactStore};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page reports.
pub type PageStream = Pin<Box<dyn Stream<Item = PageReport> + Send>>;

/// Stream the pages of an already-loaded document.
///
/// # Errors
/// Fails before any page runs when the document is empty, `concurrency` is
/// zero or a requested model is missing from `models`.
pub fn stream_document(
    document: Document,
    config: &ProcessingConfig,
    models: Arc<ModelSet>,
    store: Arc<dyn ArtifactStore>,
) -> Result<PageStream, ProcessingError> {
    document.ensure_not_empty()?;
    check_concurrency(config)?;

    if config.is_noop() {
        info!("Text and table extraction both disabled; empty stream");
        return Ok(Box::pin(stream::empty::<PageReport>()));
    }
    check_models(config, &models)?;

    let total_pages = document.page_count();
    let callback = config.progress_callback.clone();
    if let Some(ref cb) = callback {
        cb.on_run_start(total_pages);
    }

    let ctx = Arc::new(RunContext::new(&document, config, models, store));
    info!("Streaming {} page(s) (run={})", total_pages, ctx.run_id);

    let succeeded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&succeeded);
    let pages = stream::iter(document.pages)
        .map(move |page| process_page(page, Arc::clone(&ctx)))
        .buffer_unordered(config.concurrency)
        .inspect(move |report| {
            if report.is_success() {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

    let finish = stream::once(async move {
        if let Some(cb) = callback {
            cb.on_run_complete(total_pages, succeeded.load(Ordering::Relaxed));
        }
        None::<PageReport>
    });

    Ok(Box::pin(pages.map(Some).chain(finish).filter_map(|report| async move { report })))
}

/// Load `input_str` and stream its pages using the registry's models and
/// the configured artifact store.
///
/// # Returns
/// - `Ok(PageStream)`: one [`PageReport`] per page
/// - `Err(ProcessingError)`: fatal error (unloadable input, missing model, ...)
pub async fn process_stream(
    input_str: impl AsRef<str>,
    is_image: bool,
    config: &ProcessingConfig,
) -> Result<PageStream, ProcessingError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming extraction: {}", input_str);

    let document = Document::load(input_str, is_image, config).await?;
    let models = if config.is_noop() {
        Arc::new(ModelSet::new())
    } else {
        registry::current()?
    };
    let store = storage::store_from_config(&config.storage).await?;

    stream_document(document, config, models, store)
}
