//! Error types for the ocr-extractor library.
//!
//! Two tiers mirror two failure modes:
//!
//! * [`ProcessingError`]: **Fatal**: the run cannot produce a result at all
//!   (unreadable document, a requested model stream failed on every page,
//!   invalid configuration). Returned as `Err(ProcessingError)` from
//!   [`crate::process::run`] and its wrappers.
//!
//! * [`PageError`] and [`crate::output::ArtifactFailure`]: **Non-fatal**: one
//!   page's model call or one artifact upload failed. They are collected in
//!   [`crate::output::Diagnostics`] and the result is degraded instead of
//!   aborted.
//!
//! [`ModelError`] and [`ArtifactStoreError`] are the collaborator-level errors
//! raised by model adapters and artifact stores; the orchestrator converts
//! them into one of the two tiers above.

use crate::model::Stream;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocr-extractor library.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The input could not be loaded as an image or PDF.
    #[error("Invalid document: {0}")]
    InvalidDocument(#[from] DocumentError),

    /// A requested model stream produced nothing usable on any page, or the
    /// model needed for it is not registered.
    #[error("{stream} model unavailable: {reason}")]
    ModelUnavailable { stream: Stream, reason: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// [`crate::model::registry::current`] was called before initialisation.
    #[error("Model registry is not initialised.\nCall registry::initialize() before processing.")]
    RegistryNotInitialized,

    /// [`crate::model::registry::initialize`] was called twice without a shutdown.
    #[error("Model registry is already initialised; call registry::shutdown() first")]
    RegistryAlreadyInitialized,

    /// The configured VLM provider could not be created (missing API key etc.).
    #[error("Model provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium-directory or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// Could not create or write the JSON output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a document could not be loaded.
///
/// Always surfaced wrapped in [`ProcessingError::InvalidDocument`], before any
/// model is invoked.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    #[error("permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    #[error("'{input}' is not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    #[error("failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    #[error("'{path}' is not a PDF (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    #[error("PDF '{path}' is corrupt or encrypted: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    #[error("'{path}' is not a supported image: {detail}")]
    UnsupportedImage { path: PathBuf, detail: String },

    #[error("rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    #[error("'{path}' contains no pages")]
    EmptyDocument { path: PathBuf },
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::output::Diagnostics`]. The page's contribution to the
/// affected stream is omitted; every other page and stream is unaffected.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// A text or table model call failed for this page.
    #[error("Page {page}: {stream} model failed: {detail}")]
    ModelFailed {
        page: usize,
        stream: Stream,
        detail: String,
    },

    /// The layout pass failed; the page fell back to full-page recognition.
    #[error("Page {page}: layout model failed, used full page: {detail}")]
    LayoutFailed { page: usize, detail: String },
}

impl PageError {
    /// 0-based page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::ModelFailed { page, .. } | PageError::LayoutFailed { page, .. } => *page,
        }
    }
}

/// Error raised by a model adapter.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The backend call failed after all retries.
    #[error("inference failed after {retries} retries: {detail}")]
    InferenceFailed { retries: u32, detail: String },

    /// The backend answered but the payload could not be interpreted.
    #[error("unexpected model response: {0}")]
    InvalidResponse(String),

    /// The page image could not be prepared for the backend.
    #[error("could not encode page image: {0}")]
    Encode(String),
}

/// Error raised by an [`crate::storage::ArtifactStore`].
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    #[error("I/O error writing '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("S3 upload of '{key}' failed: {detail}")]
    S3 { key: String, detail: String },

    #[error("could not presign '{key}': {detail}")]
    Presign { key: String, detail: String },

    #[error("could not encode artifact '{key}': {detail}")]
    Encode { key: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_document_display() {
        let e = ProcessingError::from(DocumentError::FileNotFound {
            path: PathBuf::from("/tmp/missing.pdf"),
        });
        let msg = e.to_string();
        assert!(msg.starts_with("Invalid document"), "got: {msg}");
        assert!(msg.contains("missing.pdf"), "got: {msg}");
    }

    #[test]
    fn model_unavailable_display() {
        let e = ProcessingError::ModelUnavailable {
            stream: Stream::Table,
            reason: "all 3 pages failed".into(),
        };
        assert_eq!(e.to_string(), "table model unavailable: all 3 pages failed");
    }

    #[test]
    fn page_error_reports_page() {
        let e = PageError::ModelFailed {
            page: 2,
            stream: Stream::Text,
            detail: "timeout".into(),
        };
        assert_eq!(e.page(), 2);
        assert!(e.to_string().contains("Page 2"));
        assert!(e.to_string().contains("text"));
    }

    #[test]
    fn page_error_serialises() {
        let e = PageError::LayoutFailed {
            page: 0,
            detail: "bad json".into(),
        };
        let json = serde_json::to_string(&e).expect("serialise");
        let back: PageError = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back, e);
    }
}
