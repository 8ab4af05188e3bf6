//! File-backed copy of unsynced quiz progress.

use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use utils::assets::fallback_dir;
use uuid::Uuid;

use super::{autosave::LocalFallbackStore, intake::SaveIntakeRequest};

#[derive(Debug, Error)]
pub enum FallbackStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One JSON file per session under a directory.
#[derive(Debug, Clone)]
pub struct FileFallbackStore {
    dir: PathBuf,
}

impl FileFallbackStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the application data directory.
    pub fn in_data_dir() -> Self {
        Self::new(fallback_dir())
    }

    fn path_for(&self, session_id: Uuid) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }
}

#[async_trait]
impl LocalFallbackStore for FileFallbackStore {
    async fn store(&self, snapshot: &SaveIntakeRequest) -> Result<(), FallbackStoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(snapshot.session_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), "Stored local intake copy");
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<SaveIntakeRequest>, FallbackStoreError> {
        match tokio::fs::read(self.path_for(session_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self, session_id: Uuid) -> Result<(), FallbackStoreError> {
        match tokio::fs::remove_file(self.path_for(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_store_load_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFallbackStore::new(dir.path().join("fallback"));
        let snapshot = SaveIntakeRequest {
            session_id: Uuid::new_v4(),
            user_id: None,
            responses: json!({ "budget_range": "under_10k" }).as_object().cloned().unwrap(),
            current_step: "goals".to_string(),
            disciplines: vec![],
        };

        assert!(store.load(snapshot.session_id).await.unwrap().is_none());

        store.store(&snapshot).await.unwrap();
        assert_eq!(store.load(snapshot.session_id).await.unwrap(), Some(snapshot.clone()));

        store.clear(snapshot.session_id).await.unwrap();
        assert!(store.load(snapshot.session_id).await.unwrap().is_none());
        store.clear(snapshot.session_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_copy_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileFallbackStore::new(dir.path());
        let session_id = Uuid::new_v4();
        std::fs::write(dir.path().join(format!("{session_id}.json")), b"{not json").unwrap();

        assert!(matches!(
            store.load(session_id).await,
            Err(FallbackStoreError::Serde(_))
        ));
    }
}
