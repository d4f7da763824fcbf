//! File-based blob storage with an in-memory LRU index

use crate::error::{BlobCacheError, Result};
use crate::types::{CacheEntry, CacheStats};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const TEMP_EXTENSION: &str = "tmp";

/// In-memory view of what is on disk.
///
/// Every rename into and removal from the cache directory happens while the
/// write lock on this index is held, so the index and the directory agree.
#[derive(Default)]
struct Index {
    entries: HashMap<String, CacheEntry>,
    total_size: u64,
}

impl Index {
    fn insert(&mut self, name: String, entry: CacheEntry) {
        self.total_size += entry.size;
        if let Some(old) = self.entries.insert(name, entry) {
            self.total_size -= old.size;
        }
    }

    fn remove(&mut self, name: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(name)?;
        self.total_size -= entry.size;
        Some(entry)
    }

    /// Drop least-recently-used entries (never `keep`) until `incoming` more
    /// bytes fit under `max_size`. Returns the removed entries.
    fn evict_for(&mut self, incoming: u64, max_size: u64, keep: &str) -> Vec<CacheEntry> {
        if self.total_size + incoming <= max_size {
            return Vec::new();
        }

        let mut candidates: Vec<(String, DateTime<Utc>)> = self
            .entries
            .iter()
            .filter(|(name, _)| name.as_str() != keep)
            .map(|(name, e)| (name.clone(), e.last_accessed))
            .collect();
        candidates.sort_by_key(|(_, accessed)| *accessed);

        let mut evicted = Vec::new();
        for (name, _) in candidates {
            if self.total_size + incoming <= max_size {
                break;
            }
            if let Some(entry) = self.remove(&name) {
                evicted.push(entry);
            }
        }
        evicted
    }
}

/// A disk-backed blob cache bounded by total size in bytes
pub struct BlobCache {
    index: RwLock<Index>,
    cache_dir: PathBuf,
    max_size: u64,
    write_seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl BlobCache {
    /// Create a new blob cache. Call [`BlobCache::init`] before use.
    pub fn new(cache_dir: PathBuf, max_size: u64) -> Self {
        Self {
            index: RwLock::new(Index::default()),
            cache_dir,
            max_size,
            write_seq: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Ensure the cache directory exists and index any blobs already in it
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).await?;

        let mut index = self.index.write().await;
        let mut dir = fs::read_dir(&self.cache_dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                continue;
            };

            if path.extension().is_some_and(|ext| ext == TEMP_EXTENSION) {
                debug!(path = ?path, "Removing interrupted write");
                let _ = fs::remove_file(&path).await;
                continue;
            }
            if !is_blob_name(&name) {
                continue;
            }

            let meta = item.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let last_accessed = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            index.insert(
                name,
                CacheEntry {
                    path,
                    size: meta.len(),
                    last_accessed,
                },
            );
        }

        let evicted = index.evict_for(0, self.max_size, "");
        self.delete_files(&evicted).await;

        info!(
            cache_dir = ?self.cache_dir,
            entries = index.entries.len(),
            total_size = index.total_size,
            max_size = self.max_size,
            "Cache initialized"
        );
        Ok(())
    }

    /// Name of the file holding `key`: hex-encoded SHA-256 of the key
    pub fn file_name(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Get a blob from the cache, marking it as recently used
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let name = Self::file_name(key);

        let read = {
            let index = self.index.read().await;
            let path = index.entries.get(&name).map(|entry| entry.path.clone());
            match path {
                Some(path) => Some(fs::read(&path).await),
                None => None,
            }
        };

        match read {
            Some(Ok(data)) => {
                if let Some(entry) = self.index.write().await.entries.get_mut(&name) {
                    entry.last_accessed = Utc::now();
                }
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(file = %name, size = data.len(), "Cache hit");
                Some(Bytes::from(data))
            }
            Some(Err(e)) => {
                warn!(file = %name, error = %e, "Failed to read cached file, removing entry");
                self.forget_missing(&name).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a blob, evicting least-recently-used blobs to make room
    pub async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let size = data.len() as u64;
        if size > self.max_size {
            return Err(BlobCacheError::TooLarge {
                size,
                max_size: self.max_size,
            });
        }

        let name = Self::file_name(key);
        let path = self.cache_dir.join(&name);
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let temp_path = self
            .cache_dir
            .join(format!("{}.{}.{}", name, seq, TEMP_EXTENSION));

        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let evicted = {
            let mut index = self.index.write().await;
            if let Err(e) = fs::rename(&temp_path, &path).await {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e.into());
            }

            index.remove(&name);
            let evicted = index.evict_for(size, self.max_size, &name);
            index.insert(
                name.clone(),
                CacheEntry {
                    path,
                    size,
                    last_accessed: Utc::now(),
                },
            );
            self.delete_files(&evicted).await;
            evicted
        };

        if !evicted.is_empty() {
            debug!(count = evicted.len(), "Evicted least recently used blobs");
        }
        debug!(file = %name, size, "Cached blob");
        Ok(())
    }

    /// Remove a blob. Returns whether it was present.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let name = Self::file_name(key);
        let mut index = self.index.write().await;
        let Some(entry) = index.remove(&name) else {
            return Ok(false);
        };

        match fs::remove_file(&entry.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(file = %name, "Removed blob");
        Ok(true)
    }

    /// Whether the index currently holds `key`
    pub async fn contains(&self, key: &str) -> bool {
        let name = Self::file_name(key);
        self.index.read().await.entries.contains_key(&name)
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let index = self.index.read().await;
        CacheStats {
            entries: index.entries.len(),
            total_size: index.total_size,
            max_size: self.max_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Drop an index entry whose file disappeared underneath us
    async fn forget_missing(&self, name: &str) {
        let mut index = self.index.write().await;
        let path = index.entries.get(name).map(|entry| entry.path.clone());
        let gone = match path {
            Some(path) => !fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        };
        if gone {
            index.remove(name);
        }
    }

    async fn delete_files(&self, evicted: &[CacheEntry]) {
        for entry in evicted {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = fs::remove_file(&entry.path).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = ?entry.path, error = %e, "Failed to delete evicted blob");
                }
            }
        }
    }
}

fn is_blob_name(name: &str) -> bool {
    name.len() == 64 && name.bytes().all(|b| b.is_ascii_hexdigit())
}
