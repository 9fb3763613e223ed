//! In-memory artifact store.

use super::{Artifact, ArtifactKey, ArtifactStore};
use crate::error::ArtifactStoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Keeps artifacts in a map keyed by object name; links are
/// `memory://{run}/{file}`.
///
/// Deterministic, so useful for tests and for runs that only want the
/// ordered items.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<BTreeMap<String, Artifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Artifact stored under `key`, if any.
    pub fn get(&self, key: &ArtifactKey) -> Option<Artifact> {
        self.artifacts
            .lock()
            .ok()
            .and_then(|m| m.get(&key.object_name()).cloned())
    }

    /// Stored object names (`{run}/{file}`) in sorted order.
    pub fn object_names(&self) -> Vec<String> {
        self.artifacts
            .lock()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, key: &ArtifactKey, artifact: Artifact) -> Result<String, ArtifactStoreError> {
        let name = key.object_name();
        let mut map = self.artifacts.lock().map_err(|_| ArtifactStoreError::Encode {
            key: name.clone(),
            detail: "memory store lock poisoned".into(),
        })?;
        map.insert(name.clone(), artifact);
        Ok(format!("memory://{name}"))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RunId;
    use uuid::Uuid;

    #[tokio::test]
    async fn stores_and_links_by_object_name() {
        let store = MemoryArtifactStore::new();
        let key = ArtifactKey::image(RunId::from(Uuid::from_u128(7)), 2, 1);
        let link = store.put(&key, Artifact::png(vec![9])).await.unwrap();
        assert_eq!(link, "memory://00000000000000000000000000000007/page2_image1.png");
        assert_eq!(store.get(&key).unwrap().bytes, vec![9]);
        assert_eq!(store.len(), 1);
    }
}
