//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! ## Why download to a temp file?
//!
//! pdfium requires a file-system path and cannot stream from a byte buffer.
//! Downloading to a `TempDir` gives us a path pdfium can open while cleanup
//! happens automatically when `ResolvedInput` is dropped. PDF inputs are
//! checked for the `%PDF` magic bytes before returning so callers get a
//! meaningful [`DocumentError`] rather than a pdfium failure.

use crate::error::DocumentError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// What the caller says the input is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Image,
}

impl InputKind {
    pub fn from_is_image(is_image: bool) -> Self {
        if is_image {
            InputKind::Image
        } else {
            InputKind::Pdf
        }
    }

    fn fallback_name(self) -> &'static str {
        match self {
            InputKind::Pdf => "downloaded.pdf",
            InputKind::Image => "downloaded.img",
        }
    }
}

/// The resolved input: either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the body was saved in a temp directory that lives as
    /// long as this value.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local file.
///
/// URLs are downloaded to a temporary directory; local files are checked
/// for existence and read permission.
pub async fn resolve_input(
    input: &str,
    kind: InputKind,
    timeout_secs: u64,
) -> Result<ResolvedInput, DocumentError> {
    if input.trim().is_empty() {
        return Err(DocumentError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, kind, timeout_secs).await
    } else {
        resolve_local(input, kind)
    }
}

fn resolve_local(path_str: &str, kind: InputKind) -> Result<ResolvedInput, DocumentError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(DocumentError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            if kind == InputKind::Pdf {
                use std::io::Read;
                let mut magic = [0u8; 4];
                let n = f.read(&mut magic).unwrap_or(0);
                check_pdf_magic(&path, &magic[..n])?;
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocumentError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(DocumentError::FileNotFound { path });
        }
    }

    debug!("Resolved local {:?}: {}", kind, path.display());
    Ok(ResolvedInput::Local(path))
}

/// Reject anything that does not start with `%PDF`.
fn check_pdf_magic(path: &Path, head: &[u8]) -> Result<(), DocumentError> {
    if head.starts_with(b"%PDF") {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = head.len().min(4);
    magic[..n].copy_from_slice(&head[..n]);
    Err(DocumentError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

async fn download_url(
    url: &str,
    kind: InputKind,
    timeout_secs: u64,
) -> Result<ResolvedInput, DocumentError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocumentError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocumentError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocumentError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocumentError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url).unwrap_or_else(|| kind.fallback_name().to_string());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocumentError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let temp_dir = TempDir::new().map_err(|e| DocumentError::DownloadFailed {
        url: url.to_string(),
        reason: format!("cannot create temp dir: {e}"),
    })?;
    let file_path = temp_dir.path().join(&filename);

    if kind == InputKind::Pdf {
        check_pdf_magic(&file_path, &bytes)?;
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| DocumentError::DownloadFailed {
            url: url.to_string(),
            reason: format!("cannot write temp file: {e}"),
        })?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn extract_filename(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    (!last.is_empty() && last.contains('.')).then(|| last.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(
            extract_filename("https://example.com/a/scan.png?x=1"),
            Some("scan.png".to_string())
        );
        assert_eq!(extract_filename("https://example.com/a/"), None);
        assert_eq!(extract_filename("https://example.com/report"), None);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/no/such/file.pdf", InputKind::Pdf, 5)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DocumentError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let err = resolve_input("  ", InputKind::Image, 5).await.err().unwrap();
        assert!(matches!(err, DocumentError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn non_pdf_bytes_are_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04zip").unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), InputKind::Pdf, 5)
            .await
            .err()
            .unwrap();
        match err {
            DocumentError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn image_inputs_skip_pdf_check() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"\x89PNG").unwrap();
        let resolved = resolve_input(f.path().to_str().unwrap(), InputKind::Image, 5)
            .await
            .unwrap();
        assert_eq!(resolved.path(), f.path());
    }
}
