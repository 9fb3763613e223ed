//! Artifact storage: persist table and image artifacts, return a link.
//!
//! The aggregator hands every artifact to an [`ArtifactStore`] and writes the
//! returned reference into the result. Which backend is used is decided once
//! per run by [`store_from_config`]:
//!
//! | Backend                 | Link returned                         |
//! |-------------------------|---------------------------------------|
//! | [`LocalArtifactStore`]  | path under `output_dir`               |
//! | [`S3ArtifactStore`]     | presigned GET URL                     |
//! | [`MemoryArtifactStore`] | `memory://{run}/{file}` (tests, dry runs) |
//!
//! Every run gets a fresh [`RunId`] and all of its artifacts live under it,
//! so two runs sharing an `output_dir` or bucket prefix never write the same
//! name and links handed out earlier stay valid.

pub mod local;
pub mod memory;
pub mod s3;

pub use local::LocalArtifactStore;
pub use memory::MemoryArtifactStore;
pub use s3::S3ArtifactStore;

use crate::config::StorageConfig;
use crate::error::{ArtifactStoreError, ProcessingError};
use crate::model::Stream;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Artifact namespace of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    /// A new random (v4) run id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RunId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// What an artifact is; fixes its file name pattern and content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Table structure exported as HTML.
    TableContent,
    /// Rendering of a table region.
    TableImage,
    /// Figure crop.
    Image,
}

impl ArtifactKind {
    /// Result stream whose items link to this kind of artifact.
    pub fn stream(self) -> Stream {
        match self {
            ArtifactKind::TableContent | ArtifactKind::TableImage => Stream::Table,
            ArtifactKind::Image => Stream::Image,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ArtifactKind::TableContent => "text/html",
            ArtifactKind::TableImage | ArtifactKind::Image => "image/png",
        }
    }
}

/// Identity of an artifact, unique per (run, page, stream, order, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub run: RunId,
    pub page_number: usize,
    pub order: usize,
    pub kind: ArtifactKind,
}

impl ArtifactKey {
    pub fn table_content(run: RunId, page_number: usize, order: usize) -> Self {
        Self {
            run,
            page_number,
            order,
            kind: ArtifactKind::TableContent,
        }
    }

    pub fn table_image(run: RunId, page_number: usize, order: usize) -> Self {
        Self {
            run,
            page_number,
            order,
            kind: ArtifactKind::TableImage,
        }
    }

    pub fn image(run: RunId, page_number: usize, order: usize) -> Self {
        Self {
            run,
            page_number,
            order,
            kind: ArtifactKind::Image,
        }
    }

    /// Storage file name, e.g. `page0_table1_content.html`.
    pub fn file_name(&self) -> String {
        let (p, o) = (self.page_number, self.order);
        match self.kind {
            ArtifactKind::TableContent => format!("page{p}_table{o}_content.html"),
            ArtifactKind::TableImage => format!("page{p}_table{o}_image.png"),
            ArtifactKind::Image => format!("page{p}_image{o}.png"),
        }
    }

    /// Name relative to the store root: `{run}/{file name}`.
    pub fn object_name(&self) -> String {
        format!("{}/{}", self.run, self.file_name())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.run, self.file_name())
    }
}

/// Encoded artifact bytes plus MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

impl Artifact {
    pub fn new(bytes: Vec<u8>, content_type: &'static str) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    pub fn html(markup: impl Into<String>) -> Self {
        Self::new(markup.into().into_bytes(), ArtifactKind::TableContent.content_type())
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new(bytes, "image/png")
    }
}

/// Durable artifact persistence.
///
/// Implementations must be safe to call concurrently with distinct keys.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist `artifact` under `key` and return a retrievable reference.
    async fn put(&self, key: &ArtifactKey, artifact: Artifact) -> Result<String, ArtifactStoreError>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Pick the backend for a run: S3 when `use_s3`, bucket name and bucket key
/// are all set, the local directory otherwise.
pub async fn store_from_config(
    storage: &StorageConfig,
) -> Result<Arc<dyn ArtifactStore>, ProcessingError> {
    if storage.s3_enabled() {
        let store = S3ArtifactStore::from_config(storage).await?;
        info!("Artifacts go to S3 bucket '{}'", store.bucket());
        return Ok(Arc::new(store));
    }

    if storage.use_s3 {
        info!("S3 bucket name or key missing, storing artifacts locally");
    }
    info!("Artifacts go to {}", storage.output_dir.display());
    Ok(Arc::new(LocalArtifactStore::new(&storage.output_dir)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_unique_per_kind() {
        let run = RunId::new();
        assert_eq!(ArtifactKey::table_content(run, 0, 1).file_name(), "page0_table1_content.html");
        assert_eq!(ArtifactKey::table_image(run, 0, 1).file_name(), "page0_table1_image.png");
        assert_eq!(ArtifactKey::image(run, 3, 0).file_name(), "page3_image0.png");
    }

    #[test]
    fn object_names_are_namespaced_by_run() {
        let run = RunId::from(Uuid::from_u128(0xab));
        let key = ArtifactKey::image(run, 1, 0);
        assert_eq!(key.object_name(), "000000000000000000000000000000ab/page1_image0.png");
        assert_eq!(key.to_string(), key.object_name());

        let other = ArtifactKey::image(RunId::new(), 1, 0);
        assert_eq!(other.file_name(), key.file_name());
        assert_ne!(other.object_name(), key.object_name());
    }

    #[test]
    fn kinds_map_to_their_stream() {
        assert_eq!(ArtifactKind::TableContent.stream(), Stream::Table);
        assert_eq!(ArtifactKind::TableImage.stream(), Stream::Table);
        assert_eq!(ArtifactKind::Image.stream(), Stream::Image);
    }

    #[test]
    fn html_artifact_content_type() {
        let a = Artifact::html("<table></table>");
        assert_eq!(a.content_type, "text/html");
        assert_eq!(a.bytes, b"<table></table>");
    }

    #[tokio::test]
    async fn incomplete_s3_settings_fall_back_to_local() {
        let storage = StorageConfig {
            use_s3: true,
            s3_bucket_name: Some("docs".into()),
            ..Default::default()
        };
        let store = store_from_config(&storage).await.unwrap();
        assert_eq!(store.backend(), "local");
    }

    #[tokio::test]
    async fn complete_s3_settings_use_s3() {
        let storage = StorageConfig {
            use_s3: true,
            s3_bucket_name: Some("docs".into()),
            s3_bucket_key: Some("extracts".into()),
            ..Default::default()
        };
        let store = store_from_config(&storage).await.unwrap();
        assert_eq!(store.backend(), "s3");
    }
}
