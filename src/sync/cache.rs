//! Local copies of tool state, one entry per project and tool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::types::ToolKey;

use super::SyncError;

/// Entries never leak between projects: the project is part of every key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub project_id: Uuid,
    pub tool: ToolKey,
}

impl CacheKey {
    pub fn new(project_id: Uuid, tool: ToolKey) -> Self {
        Self { project_id, tool }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedState {
    pub payload: Value,
    /// Server revision the payload was based on; 0 before the first save
    pub revision: i64,
    /// Local edits not yet accepted by the server
    pub dirty: bool,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait LocalCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedState>, SyncError>;
    async fn put(&self, key: &CacheKey, state: &CachedState) -> Result<(), SyncError>;
    async fn remove(&self, key: &CacheKey) -> Result<(), SyncError>;
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, CachedState>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedState>, SyncError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &CacheKey, state: &CachedState) -> Result<(), SyncError> {
        self.entries.lock().await.insert(*key, state.clone());
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), SyncError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// JSON files laid out as `<dir>/<project_id>/<tool>.json`
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir
            .join(key.project_id.to_string())
            .join(format!("{}.json", key.tool.as_str()))
    }
}

#[async_trait]
impl LocalCache for FileCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedState>, SyncError> {
        let path = self.path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::Cache(format!("{}: {}", path.display(), e))),
        };
        match serde_json::from_slice(&bytes) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                // A corrupt cache file is treated as absent; the server copy wins
                tracing::warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &CacheKey, state: &CachedState) -> Result<(), SyncError> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::Cache(format!("{}: {}", parent.display(), e)))?;
        }
        let body = serde_json::to_vec_pretty(state).map_err(|e| SyncError::Cache(e.to_string()))?;

        // Write then rename so a crash never leaves half a file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| SyncError::Cache(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| SyncError::Cache(format!("{}: {}", path.display(), e)))
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), SyncError> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Cache(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(payload: Value) -> CachedState {
        CachedState {
            payload,
            revision: 3,
            dirty: true,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn file_cache_scopes_entries_by_project() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let a = CacheKey::new(Uuid::new_v4(), ToolKey::PunchList);
        let b = CacheKey::new(Uuid::new_v4(), ToolKey::PunchList);

        cache.put(&a, &state(json!({"items": [1]}))).await.unwrap();
        assert_eq!(cache.get(&a).await.unwrap().unwrap().payload, json!({"items": [1]}));
        assert!(cache.get(&b).await.unwrap().is_none());

        cache.remove(&a).await.unwrap();
        assert!(cache.get(&a).await.unwrap().is_none());
        cache.remove(&a).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_files_read_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let key = CacheKey::new(Uuid::new_v4(), ToolKey::MoodBoards);
        let path = cache.path(&key);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"{not json").await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }
}
