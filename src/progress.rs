//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ProcessingProgressCallback>`] via
//! [`crate::config::ProcessingConfigBuilder::progress_callback`] to receive
//! events as the pipeline processes each page.
//!
//! # Why callbacks instead of channels?
//!
//! A callback is the least-invasive integration point: callers can forward
//! events to a channel, a database record or a terminal progress bar without
//! the library knowing how the host application communicates. The trait is
//! `Send + Sync` because pages are processed concurrently.
//!
//! # Example
//!
//! ```rust
//! use ocr_extractor::{ProcessingConfig, ProcessingProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ProcessingProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_number: usize, total_pages: usize, items: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} items)", page_number, total_pages, items);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ProcessingConfig::builder()
//!     .progress_callback(counter as Arc<dyn ProcessingProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Page numbers are 0-based.
///
/// # Thread safety
///
/// `on_page_start`, `on_page_complete` and `on_page_error` may be called
/// concurrently from different tasks. Protect shared mutable state with
/// `Mutex`, `AtomicUsize` or similar.
pub trait ProcessingProgressCallback: Send + Sync {
    /// Called once after the document is loaded, before any model runs.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before the first model call for a page.
    fn on_page_start(&self, page_number: usize, total_pages: usize) {
        let _ = (page_number, total_pages);
    }

    /// Called when a page finished and was aggregated.
    ///
    /// `items` counts the text, table and image items the page contributed.
    fn on_page_complete(&self, page_number: usize, total_pages: usize, items: usize) {
        let _ = (page_number, total_pages, items);
    }

    /// Called once per non-fatal model failure on a page.
    fn on_page_error(&self, page_number: usize, total_pages: usize, error: String) {
        let _ = (page_number, total_pages, error);
    }

    /// Called once after all pages have been attempted.
    ///
    /// `success_count` is the number of pages with no model failure.
    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl ProcessingProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::ProcessingConfig`].
pub type ProgressCallback = Arc<dyn ProcessingProgressCallback>;
