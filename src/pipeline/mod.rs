//! Pipeline stages shared by the document loader and the model adapters.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable and a stage can be swapped (e.g. a different
//! rendering backend) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ [pages] ──▶ encode ──▶ model call ──▶ postprocess
//! (URL/path)  (pdfium/             (PNG/       (crate::model)  (cleanup)
//!              image)               base64)
//! ```
//!
//! 1. [`input`]  resolves the user-supplied path or URL to a local file
//! 2. [`render`] rasterises PDF pages or decodes an image; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`encode`] PNG-encodes images for artifact storage and base64-wraps
//!    them for multimodal requests
//! 4. [`postprocess`] applies deterministic cleanup rules to raw model
//!    responses before they are parsed

pub mod encode;
pub mod input;
pub mod postprocess;
pub mod render;
