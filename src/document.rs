//! Page source: a loaded document as an ordered list of page images.

use crate::config::ProcessingConfig;
use crate::error::{DocumentError, ProcessingError};
use crate::pipeline::input::{self, InputKind};
use crate::pipeline::render;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// One rasterised page. `page_number` is 0-based.
#[derive(Debug)]
pub struct Page {
    pub page_number: usize,
    pub image: DynamicImage,
}

impl Page {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// An input document, immutable after load.
///
/// Pages are shared read-only with the per-page tasks, hence `Arc<Page>`.
#[derive(Debug, Clone)]
pub struct Document {
    pub pages: Vec<Arc<Page>>,
    pub is_image: bool,
    /// Where the document came from, for logging.
    pub source: String,
}

impl Document {
    /// Load `input` (local path or HTTP(S) URL) as a single image
    /// (`is_image`) or as a PDF.
    ///
    /// # Errors
    /// [`ProcessingError::InvalidDocument`] when the input cannot be resolved,
    /// decoded or rasterised, or has no pages. Pdfium binding failures surface
    /// as [`ProcessingError::PdfiumBindingFailed`].
    pub async fn load(
        input_str: &str,
        is_image: bool,
        config: &ProcessingConfig,
    ) -> Result<Self, ProcessingError> {
        let kind = InputKind::from_is_image(is_image);
        let resolved =
            input::resolve_input(input_str, kind, config.download_timeout_secs).await?;
        let path = resolved.path().to_path_buf();

        let images = match kind {
            InputKind::Image => vec![render::decode_image(&path).await?],
            InputKind::Pdf => render::render_pdf(&path, config).await?,
        };

        if images.is_empty() {
            return Err(DocumentError::EmptyDocument { path }.into());
        }
        info!("Loaded {} page(s) from {}", images.len(), input_str);

        Ok(Self::from_images(images, is_image, input_str))
    }

    /// Build a document from already-rasterised pages, numbered in order.
    pub fn from_images(
        images: impl IntoIterator<Item = DynamicImage>,
        is_image: bool,
        source: impl Into<String>,
    ) -> Self {
        let pages = images
            .into_iter()
            .enumerate()
            .map(|(page_number, image)| Arc::new(Page { page_number, image }))
            .collect();
        Self {
            pages,
            is_image,
            source: source.into(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Fail with [`DocumentError::EmptyDocument`] when there is nothing to process.
    pub fn ensure_not_empty(&self) -> Result<(), DocumentError> {
        if self.pages.is_empty() {
            return Err(DocumentError::EmptyDocument {
                path: PathBuf::from(&self.source),
            });
        }
        Ok(())
    }
}
