//! Rasterisation: turn the resolved input into page images.
//!
//! PDFs are rendered page by page through pdfium; image inputs are decoded
//! as a single page.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to call from async contexts. Image decoding is
//! CPU-bound as well. `tokio::task::spawn_blocking` moves both onto the
//! blocking pool so Tokio worker threads never stall.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Page sizes vary wildly: an A0 poster at 200 DPI would produce a
//! 6,600 × 9,400 px image. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded.

use crate::config::ProcessingConfig;
use crate::error::{DocumentError, ProcessingError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Rasterise every page of a PDF, in page order.
pub async fn render_pdf(
    pdf_path: &Path,
    config: &ProcessingConfig,
) -> Result<Vec<DynamicImage>, ProcessingError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;

    tokio::task::spawn_blocking(move || render_pdf_blocking(&path, dpi, max_pixels))
        .await
        .map_err(|e| ProcessingError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_pdf_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, ProcessingError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| DocumentError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    if total_pages == 0 {
        return Err(DocumentError::EmptyDocument {
            path: pdf_path.to_path_buf(),
        }
        .into());
    }

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / POINTS_PER_INCH)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);

    for idx in 0..total_pages {
        let page = pages
            .get(idx as u16)
            .map_err(|e| DocumentError::RasterisationFailed {
                page: idx,
                detail: format!("{:?}", e),
            })?;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            DocumentError::RasterisationFailed {
                page: idx,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx,
            image.width(),
            image.height()
        );

        results.push(image);
    }

    Ok(results)
}

/// Bind pdfium: `PDFIUM_LIB_PATH` (library file or directory) first, then
/// the system library search path.
fn bind_pdfium() -> Result<Pdfium, ProcessingError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let p = PathBuf::from(p);
            let lib = if p.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&p)
            } else {
                p
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        _ => Pdfium::bind_to_system_library(),
    };

    bindings
        .map(Pdfium::new)
        .map_err(|e| ProcessingError::PdfiumBindingFailed(e.to_string()))
}

/// Decode an image file as a single page.
pub async fn decode_image(path: &Path) -> Result<DynamicImage, ProcessingError> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<DynamicImage, ProcessingError> {
        let reader = image::ImageReader::open(&path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| DocumentError::UnsupportedImage {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        let image = reader.decode().map_err(|e| DocumentError::UnsupportedImage {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        debug!("Decoded image {} → {}x{} px", path.display(), image.width(), image.height());
        Ok(image)
    })
    .await
    .map_err(|e| ProcessingError::Internal(format!("Decode task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[tokio::test]
    async fn decodes_png_regardless_of_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.bin");
        RgbaImage::from_pixel(12, 8, Rgba([1, 2, 3, 255]))
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();

        let img = decode_image(&path).await.unwrap();
        assert_eq!((img.width(), img.height()), (12, 8));
    }

    #[tokio::test]
    async fn garbage_is_unsupported_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"plain text, not pixels").unwrap();

        let err = decode_image(&path).await.unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::InvalidDocument(DocumentError::UnsupportedImage { .. })
        ));
    }
}
