//! Persistent stores for raw tile bytes.
//!
//! A [`TileStore`] keeps the undecoded bytes of retrieved tiles, keyed by the
//! tile's relative path, so a restarted process finds them without going back
//! to the network.
//!
//! # Implementations
//!
//! - [`FileStore`]: Files under a root directory (native only)
//! - [`MemoryStore`]: In-memory map, for tests and ephemeral sessions
//! - [`NoStore`]: Passthrough implementation that stores nothing

use std::{
    collections::HashMap,
    future::Future,
    path::{Component, Path, PathBuf},
    pin::Pin,
    sync::{Arc, PoisonError, RwLock},
};

use web_time::SystemTime;

use crate::error::{Error, Result};

/// Future type for store get operations.
pub type GetFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>>> + Send + 'a>>;

/// Future type for store put/remove operations.
pub type StoreFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Future type for store contains operations.
pub type ContainsFuture<'a> = Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

/// Future type for store size queries.
pub type SizeFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<u64>>> + Send + 'a>>;

/// A store for raw tile bytes.
///
/// Paths are relative, `/`-separated, and produced by
/// [`Level::tile_path`](crate::Level::tile_path).
pub trait TileStore: Send + Sync {
    /// Get the bytes stored at `path`.
    ///
    /// Returns `Ok(None)` if nothing is stored there.
    fn get(&self, path: &str) -> GetFuture<'_>;

    /// Store bytes at `path`, replacing anything already there.
    fn put(&self, path: &str, data: Vec<u8>) -> StoreFuture<'_>;

    /// Check whether `path` is stored and was written at or after `not_before`.
    fn contains(&self, path: &str, not_before: Option<SystemTime>) -> ContainsFuture<'_>;

    /// Size in bytes of the data stored at `path`.
    fn size(&self, path: &str) -> SizeFuture<'_>;

    /// Remove the data stored at `path`, if any.
    fn remove(&self, path: &str) -> StoreFuture<'_>;
}

/// A store that keeps nothing.
#[derive(Debug, Clone, Default)]
pub struct NoStore;

impl NoStore {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TileStore for NoStore {
    fn get(&self, _path: &str) -> GetFuture<'_> {
        Box::pin(async { Ok(None) })
    }

    fn put(&self, _path: &str, _data: Vec<u8>) -> StoreFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    fn contains(&self, _path: &str, _not_before: Option<SystemTime>) -> ContainsFuture<'_> {
        Box::pin(async { Ok(false) })
    }

    fn size(&self, _path: &str) -> SizeFuture<'_> {
        Box::pin(async { Ok(None) })
    }

    fn remove(&self, _path: &str) -> StoreFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}

/// An in-memory store.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, (Vec<u8>, SystemTime)>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store bytes with an explicit write time.
    pub fn insert_with_time(&self, path: &str, data: Vec<u8>, written: SystemTime) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), (data, written));
    }
}

impl TileStore for MemoryStore {
    fn get(&self, path: &str) -> GetFuture<'_> {
        let result = self
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map(|(data, _)| data.clone());
        Box::pin(async move { Ok(result) })
    }

    fn put(&self, path: &str, data: Vec<u8>) -> StoreFuture<'_> {
        self.insert_with_time(path, data, SystemTime::now());
        Box::pin(async { Ok(()) })
    }

    fn contains(&self, path: &str, not_before: Option<SystemTime>) -> ContainsFuture<'_> {
        let result = self
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .is_some_and(|(_, written)| not_before.is_none_or(|t| *written >= t));
        Box::pin(async move { Ok(result) })
    }

    fn size(&self, path: &str) -> SizeFuture<'_> {
        let result = self
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map(|(data, _)| data.len() as u64);
        Box::pin(async move { Ok(result) })
    }

    fn remove(&self, path: &str) -> StoreFuture<'_> {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
        Box::pin(async { Ok(()) })
    }
}

/// A store backed by files under a root directory.
#[cfg(not(target_family = "wasm"))]
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

#[cfg(not(target_family = "wasm"))]
impl FileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative tile path, refusing anything that escapes the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let is_plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if path.is_empty() || !is_plain {
            return Err(Error::invalid_argument(
                "store path",
                format!("{path:?} is not a plain relative path"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[cfg(not(target_family = "wasm"))]
fn not_found_as_none<T>(result: std::io::Result<T>, path: &Path) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path.display().to_string(), e)),
    }
}

#[cfg(not(target_family = "wasm"))]
impl TileStore for FileStore {
    fn get(&self, path: &str) -> GetFuture<'_> {
        let file = self.resolve(path);
        Box::pin(async move {
            let file = file?;
            not_found_as_none(tokio::fs::read(&file).await, &file)
        })
    }

    fn put(&self, path: &str, data: Vec<u8>) -> StoreFuture<'_> {
        let file = self.resolve(path);
        Box::pin(async move {
            let file = file?;
            if let Some(parent) = file.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::io(parent.display().to_string(), e))?;
            }

            // Write to a sibling and rename so readers never see a partial tile.
            let partial = file.with_extension("part");
            tokio::fs::write(&partial, &data)
                .await
                .map_err(|e| Error::io(partial.display().to_string(), e))?;
            tokio::fs::rename(&partial, &file)
                .await
                .map_err(|e| Error::io(file.display().to_string(), e))
        })
    }

    fn contains(&self, path: &str, not_before: Option<SystemTime>) -> ContainsFuture<'_> {
        let file = self.resolve(path);
        Box::pin(async move {
            let file = file?;
            let Some(metadata) = not_found_as_none(tokio::fs::metadata(&file).await, &file)? else {
                return Ok(false);
            };
            if !metadata.is_file() {
                return Ok(false);
            }
            let Some(not_before) = not_before else {
                return Ok(true);
            };
            let modified = metadata
                .modified()
                .map_err(|e| Error::io(file.display().to_string(), e))?;
            Ok(modified >= not_before)
        })
    }

    fn size(&self, path: &str) -> SizeFuture<'_> {
        let file = self.resolve(path);
        Box::pin(async move {
            let file = file?;
            let metadata = not_found_as_none(tokio::fs::metadata(&file).await, &file)?;
            Ok(metadata.filter(std::fs::Metadata::is_file).map(|m| m.len()))
        })
    }

    fn remove(&self, path: &str) -> StoreFuture<'_> {
        let file = self.resolve(path);
        Box::pin(async move {
            let file = file?;
            not_found_as_none(tokio::fs::remove_file(&file).await, &file).map(|_| ())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use web_time::Duration;

    const PATH: &str = "imagery/2/10/10_20.png";

    #[tokio::test]
    async fn test_no_store() {
        let store = NoStore::new();
        store.put(PATH, vec![1, 2, 3]).await.unwrap();
        assert!(store.get(PATH).await.unwrap().is_none());
        assert!(!store.contains(PATH, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.put(PATH, vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(PATH).await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.size(PATH).await.unwrap(), Some(3));
        assert!(store.contains(PATH, None).await.unwrap());

        store.remove(PATH).await.unwrap();
        assert!(store.is_empty());
        assert!(!store.contains(PATH, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_freshness() {
        let store = MemoryStore::new();
        let now = SystemTime::now();
        store.insert_with_time(PATH, vec![1], now - Duration::from_secs(3600));

        assert!(store.contains(PATH, None).await.unwrap());
        assert!(store.contains(PATH, Some(now - Duration::from_secs(7200))).await.unwrap());
        assert!(!store.contains(PATH, Some(now)).await.unwrap());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert!(store.get(PATH).await.unwrap().is_none());
        assert!(!store.contains(PATH, None).await.unwrap());
        assert_eq!(store.size(PATH).await.unwrap(), None);

        store.put(PATH, vec![9; 128]).await.unwrap();
        assert!(dir.path().join(PATH).is_file());
        assert!(!dir.path().join("imagery/2/10/10_20.part").exists());
        assert_eq!(store.get(PATH).await.unwrap(), Some(vec![9; 128]));
        assert_eq!(store.size(PATH).await.unwrap(), Some(128));
        assert!(store.contains(PATH, None).await.unwrap());

        let future = SystemTime::now() + Duration::from_secs(3600);
        assert!(!store.contains(PATH, Some(future)).await.unwrap());

        store.remove(PATH).await.unwrap();
        assert!(!store.contains(PATH, None).await.unwrap());
        // Removing twice is not an error.
        store.remove(PATH).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        for path in ["../outside.png", "/etc/passwd", ""] {
            let result = store.put(path, vec![1]).await;
            assert!(matches!(result, Err(Error::InvalidArgument { .. })), "{path}");
        }
    }
}
