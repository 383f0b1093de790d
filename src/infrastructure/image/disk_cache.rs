//! Disk tier persisting raw encoded image bytes across sessions.
//!
//! One file per key, named by the percent-encoded URL. The tier has no size
//! ceiling and never evicts on its own; only [`DiskImageCache::clear`]
//! removes files.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::domain::entities::CacheKey;

/// Disk-based image cache.
#[derive(Debug)]
pub struct DiskImageCache {
    cache_dir: PathBuf,
}

impl DiskImageCache {
    /// Opens (creating if needed) a disk cache rooted at `cache_dir`.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be created.
    pub async fn new(cache_dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&cache_dir).await?;
        debug!(path = %cache_dir.display(), "Opened disk image cache");
        Ok(Self { cache_dir })
    }

    /// Directory holding the cached files.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path for a cached image.
    #[must_use]
    pub fn cache_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(key.file_name())
    }

    /// Reads raw bytes for a key. Any read failure counts as a miss.
    pub async fn get_bytes(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.cache_path(key);
        match fs::read(&path).await {
            Ok(bytes) => {
                trace!(key = %key, path = %path.display(), "Disk cache hit");
                Some(bytes)
            }
            Err(e) => {
                trace!(key = %key, error = %e, "Disk cache miss");
                None
            }
        }
    }

    /// Writes raw bytes for a key, replacing any previous file.
    ///
    /// Bytes are staged in a sibling file and renamed into place, so readers
    /// see either the old file or the complete new one. Concurrent writers of
    /// the same key are not coordinated; the last rename wins.
    ///
    /// # Errors
    /// Returns error if the file cannot be created or written.
    pub async fn put_bytes(&self, key: &CacheKey, bytes: &[u8]) -> io::Result<()> {
        let path = self.cache_path(key);
        let staging = self
            .cache_dir
            .join(format!(".{}.part", Uuid::new_v4().simple()));

        let mut file = fs::File::create(&staging).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e);
        }

        debug!(key = %key, path = %path.display(), size = bytes.len(), "Stored image in disk cache");
        Ok(())
    }

    /// Checks if an image is cached.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        fs::try_exists(self.cache_path(key)).await.unwrap_or(false)
    }

    /// Deletes the cache directory and recreates it empty.
    ///
    /// # Errors
    /// Returns error if the directory cannot be removed or recreated.
    pub async fn clear(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.cache_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        fs::create_dir_all(&self.cache_dir).await?;
        debug!(path = %self.cache_dir.display(), "Cleared disk cache");
        Ok(())
    }

    /// Number of cached files, ignoring in-progress writes.
    pub async fn len(&self) -> usize {
        let Ok(mut entries) = fs::read_dir(&self.cache_dir).await else {
            return 0;
        };
        let mut count = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if !entry.file_name().to_string_lossy().starts_with('.') {
                count += 1;
            }
        }
        count
    }

    /// Returns true if no files are cached.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
