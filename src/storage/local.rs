//! Filesystem artifact store.

use super::{Artifact, ArtifactKey, ArtifactStore};
use crate::error::ArtifactStoreError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes artifacts as files under `{dir}/{run}/` and returns their paths.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    dir: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, key: &ArtifactKey, artifact: Artifact) -> Result<String, ArtifactStoreError> {
        let run_dir = self.dir.join(key.run.to_string());
        tokio::fs::create_dir_all(&run_dir)
            .await
            .map_err(|source| ArtifactStoreError::Io {
                path: run_dir.clone(),
                source,
            })?;

        let path = run_dir.join(key.file_name());
        tokio::fs::write(&path, &artifact.bytes)
            .await
            .map_err(|source| ArtifactStoreError::Io {
                path: path.clone(),
                source,
            })?;

        debug!("Wrote {} ({} bytes)", path.display(), artifact.bytes.len());
        Ok(path.to_string_lossy().into_owned())
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RunId;

    #[tokio::test]
    async fn writes_file_and_returns_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path().join("outputs"));
        let run = RunId::new();

        let link = store
            .put(&ArtifactKey::table_content(run, 1, 0), Artifact::html("<table/>"))
            .await
            .unwrap();

        let expected = dir
            .path()
            .join("outputs")
            .join(run.to_string())
            .join("page1_table0_content.html");
        assert_eq!(link, expected.to_string_lossy());
        assert!(!link.starts_with("http"));
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "<table/>");
    }

    #[tokio::test]
    async fn runs_sharing_a_directory_keep_their_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());

        let first = store
            .put(&ArtifactKey::table_content(RunId::new(), 0, 0), Artifact::html("<table>a</table>"))
            .await
            .unwrap();
        let second = store
            .put(&ArtifactKey::table_content(RunId::new(), 0, 0), Artifact::html("<table>b</table>"))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "<table>a</table>");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "<table>b</table>");
    }

    #[tokio::test]
    async fn unwritable_dir_is_io_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A regular file cannot act as the output directory.
        let store = LocalArtifactStore::new(file.path());

        let err = store
            .put(&ArtifactKey::image(RunId::new(), 0, 0), Artifact::png(vec![1, 2, 3]))
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactStoreError::Io { .. }));
    }
}
