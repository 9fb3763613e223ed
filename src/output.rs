//! Output types: the ordered result bundle plus run diagnostics.
//!
//! The serialised [`ResultBundle`] is the public contract:
//!
//! ```json
//! {
//!   "text":  [{"page_number": 0, "order": 0, "content": "..."}],
//!   "image": [{"page_number": 0, "images": ["..."]}],
//!   "table": [{"page_number": 0, "order": 0, "content_link": "...", "image_link": "..."}]
//! }
//! ```
//!
//! [`Diagnostics`] and [`ProcessingStats`] travel next to it in
//! [`ProcessingOutput`] but are never part of the bundle itself.

use crate::error::PageError;
use crate::model::Stream;
use serde::{Deserialize, Serialize};

/// A recognised block of text in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextItem {
    pub page_number: usize,
    pub order: usize,
    pub content: String,
}

/// A table with links to its HTML export and its rendering.
///
/// A link is the empty string when storing that artifact failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableItem {
    pub page_number: usize,
    pub order: usize,
    pub content_link: String,
    pub image_link: String,
}

/// All stored figure crops of one page, in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageItem {
    pub page_number: usize,
    pub images: Vec<String>,
}

/// Items contributed by one page, as produced by [`crate::aggregate::aggregate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    pub page_number: usize,
    pub text: Vec<TextItem>,
    pub table: Vec<TableItem>,
    /// `None` when the page has no figure regions.
    pub image: Option<ImageItem>,
    pub artifact_failures: Vec<ArtifactFailure>,
}

impl PageResult {
    pub fn new(page_number: usize) -> Self {
        Self {
            page_number,
            ..Default::default()
        }
    }

    /// Number of items across all streams.
    pub fn item_count(&self) -> usize {
        self.text.len() + self.table.len() + usize::from(self.image.is_some())
    }
}

/// The final structured result.
///
/// Each stream is sorted by `(page_number, order)`; `image` by `page_number`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBundle {
    pub text: Vec<TextItem>,
    pub image: Vec<ImageItem>,
    pub table: Vec<TableItem>,
}

impl ResultBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a sequence of page results and sort every stream.
    ///
    /// Artifact failures are returned separately so they can be recorded in
    /// [`Diagnostics`].
    pub fn from_pages(pages: impl IntoIterator<Item = PageResult>) -> (Self, Vec<ArtifactFailure>) {
        let mut bundle = Self::new();
        let mut failures = Vec::new();
        for page in pages {
            bundle.text.extend(page.text);
            bundle.table.extend(page.table);
            bundle.image.extend(page.image);
            failures.extend(page.artifact_failures);
        }
        bundle.sort();
        (bundle, failures)
    }

    /// Restore `(page_number, order)` ordering in every stream.
    pub fn sort(&mut self) {
        self.text.sort_by_key(|t| (t.page_number, t.order));
        self.table.sort_by_key(|t| (t.page_number, t.order));
        self.image.sort_by_key(|i| i.page_number);
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.image.is_empty() && self.table.is_empty()
    }

    /// Pretty-printed JSON in the public schema.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// An artifact that could not be stored; the item was still emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFailure {
    pub page_number: usize,
    /// Result stream the artifact belongs to (`table` or `image`).
    pub stream: Stream,
    /// Artifact object name, e.g. `{run}/page0_table1_image.png`.
    pub key: String,
    pub detail: String,
}

/// Non-fatal failures observed during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub text_failures: Vec<PageError>,
    pub table_failures: Vec<PageError>,
    pub layout_failures: Vec<PageError>,
    pub artifact_failures: Vec<ArtifactFailure>,
}

impl Diagnostics {
    /// File a page error under the list it belongs to.
    pub fn record(&mut self, error: PageError) {
        match &error {
            PageError::LayoutFailed { .. } => self.layout_failures.push(error),
            PageError::ModelFailed {
                stream: Stream::Table,
                ..
            } => self.table_failures.push(error),
            PageError::ModelFailed { .. } => self.text_failures.push(error),
        }
    }

    pub fn text_failure_count(&self) -> usize {
        self.text_failures.len()
    }

    pub fn table_failure_count(&self) -> usize {
        self.table_failures.len()
    }

    pub fn layout_failure_count(&self) -> usize {
        self.layout_failures.len()
    }

    pub fn artifact_failure_count(&self) -> usize {
        self.artifact_failures.len()
    }

    /// Model failures of every kind (text, table and layout).
    pub fn model_failure_count(&self) -> usize {
        self.text_failures.len() + self.table_failures.len() + self.layout_failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.model_failure_count() == 0 && self.artifact_failures.is_empty()
    }

    /// Pages with at least one text or table failure, ascending.
    pub fn failed_pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = self
            .text_failures
            .iter()
            .chain(&self.table_failures)
            .map(PageError::page)
            .collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    /// Order every list by page number, for stable output.
    pub fn sort(&mut self) {
        self.text_failures.sort_by_key(PageError::page);
        self.table_failures.sort_by_key(PageError::page);
        self.layout_failures.sort_by_key(PageError::page);
        self.artifact_failures
            .sort_by(|a, b| (a.page_number, &a.key).cmp(&(b.page_number, &b.key)));
    }
}

/// Timing and page statistics for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages with no text or table model failure.
    pub processed_pages: usize,
    /// Pages with at least one text or table model failure.
    pub failed_pages: usize,
    pub total_duration_ms: u64,
    /// Time spent in the model and aggregation stage.
    pub model_duration_ms: u64,
    /// Namespace of this run's artifacts; empty when no model ran.
    #[serde(default)]
    pub run_id: String,
}

/// Everything a run returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingOutput {
    pub result: ResultBundle,
    pub diagnostics: Diagnostics,
    pub stats: ProcessingStats,
}
