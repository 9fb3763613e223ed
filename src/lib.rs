//! # ocr-extractor
//!
//! Turn an image or PDF into ordered text blocks, tables and figure crops
//! using pluggable recognition models.
//!
//! ## Why this crate?
//!
//! Detection and recognition models emit unordered boxes per page. Callers
//! want something else: a page-scoped, reading-ordered list of text, tables
//! exported as HTML with an image of the table, and figures stored somewhere
//! they can fetch them. This crate owns that step. Models sit behind async
//! traits ([`TextModel`], [`TableModel`], [`LayoutModel`]); artifacts go to
//! an [`ArtifactStore`] (local directory or S3 with presigned links).
//!
//! ## Pipeline Overview
//!
//! ```text
//! image / PDF
//!  │
//!  ├─ 1. Load       resolve path or URL, rasterise pages (pdfium, spawn_blocking)
//!  ├─ 2. Layout     optional region hints (Text/Title/List/Table/Figure)
//!  ├─ 3. Recognise  text and table models per page, concurrently
//!  ├─ 4. Aggregate  reading order, artifact upload, link rewriting
//!  └─ 5. Output     {text, image, table} bundle + diagnostics
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_extractor::{process, registry, ProcessingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // VLM provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / ...
//!     let config = ProcessingConfig::default();
//!     registry::initialize_from_config(&config)?;
//!
//!     let output = process("invoice.pdf", false, &config).await?;
//!     println!("{}", output.result.to_json_pretty()?);
//!     eprintln!("{} table failure(s)", output.diagnostics.table_failure_count());
//!
//!     registry::shutdown();
//!     Ok(())
//! }
//! ```
//!
//! `process` and `run` are `async fn`s: nothing happens until the returned
//! future is awaited, and dropping it cancels the run.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr-extract` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod aggregate;
pub mod config;
pub mod document;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod storage;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionType, Precision, ProcessingConfig, ProcessingConfigBuilder, StorageConfig};
pub use document::{Document, Page};
pub use error::{ArtifactStoreError, DocumentError, ModelError, PageError, ProcessingError};
pub use model::{
    registry, BoundingBox, LayoutKind, LayoutModel, LayoutRegion, ModelSet, Stream, TableModel,
    TableRecognition, TextModel, TextSpan,
};
pub use output::{
    ArtifactFailure, Diagnostics, ImageItem, PageResult, ProcessingOutput, ProcessingStats,
    ResultBundle, TableItem, TextItem,
};
pub use process::{process, process_from_bytes, process_sync, process_to_file, run, PageReport};
pub use progress::{NoopProgressCallback, ProcessingProgressCallback, ProgressCallback};
pub use storage::{
    Artifact, ArtifactKey, ArtifactKind, ArtifactStore, LocalArtifactStore, MemoryArtifactStore, RunId,
    S3ArtifactStore,
};
pub use stream::{process_stream, stream_document, PageStream};
