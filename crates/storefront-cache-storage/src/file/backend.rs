//! Local store keeping one JSON document per key on disk

use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use storefront_cache_core::{CacheError, LocalStore, Result};

/// Configuration for the file store
#[derive(Debug, Clone)]
pub struct FileConfig {
    /// Directory holding the documents
    pub dir: PathBuf,
    /// Create the directory on first write
    pub create_dir: bool,
}

impl FileConfig {
    /// Store documents under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            create_dir: true,
        }
    }
}

/// File-backed local store
///
/// Each key maps to `<dir>/<key>.json`. Writes go to a temporary file
/// first and are renamed into place, so readers never see half a document.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: FileConfig,
}

impl FileStore {
    /// Create a new file store
    pub fn new(config: FileConfig) -> Self {
        Self { config }
    }

    /// Directory holding the documents
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(CacheError::InvalidInput("storage key must not be empty".into()));
        }
        let file_name: String = key
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
                _ => '_',
            })
            .collect();
        Ok(self.config.dir.join(format!("{file_name}.json")))
    }
}

fn storage_error(path: &Path, err: std::io::Error) -> CacheError {
    CacheError::Storage(format!("{}: {}", path.display(), err))
}

#[async_trait]
impl LocalStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|e| {
                    CacheError::Storage(format!("{}: corrupt document: {}", path.display(), e))
                })?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(&path, e)),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key)?;
        if self.config.create_dir {
            tokio::fs::create_dir_all(&self.config.dir)
                .await
                .map_err(|e| storage_error(&self.config.dir, e))?;
        }

        let bytes = serde_json::to_vec(&value)
            .map_err(|e| CacheError::Storage(format!("unserializable document: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| storage_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| storage_error(&path, e))
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_error(&path, e)),
        }
    }
}
