//! Photo storage: player photos, the prize photo and the gallery.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;

use crate::error::{AppError, Result};

pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `path`, replacing any previous blob, and returns
    /// the URL it is served from.
    fn put(&self, path: &str, bytes: &[u8]) -> Result<String>;

    fn delete(&self, path: &str) -> Result<()>;
}

/// Only plain relative paths like `gamePhotos/<id>` are accepted.
fn check_path(path: &str) -> Result<&Path> {
    let candidate = Path::new(path);
    let plain = !path.is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(candidate)
    } else {
        Err(AppError::Validation(format!("Invalid storage path: {}", path)))
    }
}

fn public_url(prefix: &str, path: &str) -> String {
    // The version query keeps browsers from showing a replaced photo.
    format!(
        "{}/{}?v={}",
        prefix.trim_end_matches('/'),
        path,
        Utc::now().timestamp_millis()
    )
}

/// Blobs as files under a root directory, served by the web server under
/// `url_prefix`.
pub struct FsBlobStore {
    root: PathBuf,
    url_prefix: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            url_prefix: url_prefix.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let target = self.root.join(check_path(path)?);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        tracing::debug!(path = path, size = bytes.len(), "Stored blob");
        Ok(public_url(&self.url_prefix, path))
    }

    fn delete(&self, path: &str) -> Result<()> {
        let target = self.root.join(check_path(path)?);
        fs::remove_file(&target)?;
        Ok(())
    }
}

/// Blobs kept in a map; for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<String> {
        check_path(path)?;
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), bytes.to_vec());
        Ok(public_url("/uploads", path))
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("Blob", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_put_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FsBlobStore::new(dir.path().join("uploads"), "/uploads").unwrap();

        let url = blobs.put("gamePhotos/abc", b"jpeg").unwrap();
        assert!(url.starts_with("/uploads/gamePhotos/abc?v="));
        assert_eq!(fs::read(blobs.root().join("gamePhotos/abc")).unwrap(), b"jpeg");

        blobs.delete("gamePhotos/abc").unwrap();
        assert!(!blobs.root().join("gamePhotos/abc").exists());
        assert!(blobs.delete("gamePhotos/abc").is_err());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let blobs = MemoryBlobStore::new();
        assert!(blobs.put("../etc/passwd", b"x").is_err());
        assert!(blobs.put("/abs", b"x").is_err());
        assert!(blobs.put("", b"x").is_err());
        assert!(blobs.is_empty());
    }

    #[test]
    fn test_memory_put_replaces() {
        let blobs = MemoryBlobStore::new();
        blobs.put("prize/current", b"one").unwrap();
        blobs.put("prize/current", b"two").unwrap();
        assert_eq!(blobs.get("prize/current"), Some(b"two".to_vec()));
        assert_eq!(blobs.len(), 1);
    }
}
