//! Persistent metadata cache keyed by content hash.
//!
//! One JSON document under a hidden subdirectory of the caller-provided
//! cache root. Every operation is best-effort: a missing or corrupt file
//! degrades to an empty cache and I/O failures never abort the run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::fsutil::{hash_content, now_millis, to_unix_path};
use crate::metadata::ContractMetadata;

pub const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = ".facetgen";
const CACHE_FILE: &str = "metadata-cache.json";

/// Entries older than this are pruned lazily on save.
pub const RETENTION_MS: u64 = 7 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: String,
    pub timestamp: u64,
    pub content_hash: String,
    pub metadata: ContractMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    created_at: u64,
    updated_at: u64,
    entries: BTreeMap<String, CacheEntry>,
}

impl CacheDocument {
    fn empty() -> Self {
        let now = now_millis();
        Self {
            version: CACHE_VERSION,
            created_at: now,
            updated_at: now,
            entries: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct MetadataCache {
    file_path: PathBuf,
    document: CacheDocument,
    /// Hashes computed by `should_reprocess`, reused by `set` in the same run.
    hash_memo: BTreeMap<String, String>,
}

impl MetadataCache {
    /// Load the cache document from `<cache_root>/.facetgen/metadata-cache.json`.
    ///
    /// Missing or corrupt documents (including a version mismatch) yield a
    /// fresh empty cache, never an error.
    pub fn load(cache_root: &Path) -> Self {
        let file_path = cache_root.join(CACHE_DIR).join(CACHE_FILE);
        let document = std::fs::read_to_string(&file_path)
            .ok()
            .and_then(|raw| serde_json::from_str::<CacheDocument>(&raw).ok())
            .filter(|doc| doc.version == CACHE_VERSION)
            .unwrap_or_else(CacheDocument::empty);
        Self {
            file_path,
            document,
            hash_memo: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.document.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.entries.is_empty()
    }

    /// True when the file was never cached or its content hash changed.
    ///
    /// The computed hash is memoized so a following `set` for the same path
    /// does not hash the file twice. Whether the cached record is actually
    /// usable is the caller's call; hit/miss accounting lives there.
    pub fn should_reprocess(&mut self, path: &Path) -> bool {
        let key = to_unix_path(path);
        let Ok(content) = std::fs::read_to_string(path) else {
            return true;
        };
        let hash = hash_content(&content);
        let fresh = self
            .document
            .entries
            .get(&key)
            .is_some_and(|entry| entry.content_hash == hash);
        self.hash_memo.insert(key, hash);
        !fresh
    }

    pub fn get_cached(&self, path: &Path) -> Option<&ContractMetadata> {
        self.document
            .entries
            .get(&to_unix_path(path))
            .map(|entry| &entry.metadata)
    }

    /// Store one entry, reusing the memoized hash if available.
    pub fn set(&mut self, path: &Path, metadata: ContractMetadata) {
        let key = to_unix_path(path);
        let content_hash = match self.hash_memo.get(&key) {
            Some(hash) => hash.clone(),
            None => match std::fs::read_to_string(path) {
                Ok(content) => hash_content(&content),
                // Unreadable file: skip rather than cache a stale hash.
                Err(_) => return,
            },
        };
        self.document.entries.insert(
            key.clone(),
            CacheEntry {
                path: key,
                timestamp: now_millis(),
                content_hash,
                metadata,
            },
        );
    }

    /// Remove entries older than the retention window; returns removed count.
    pub fn prune(&mut self) -> usize {
        self.prune_at(now_millis())
    }

    /// Prune against an explicit clock, for boundary control.
    pub fn prune_at(&mut self, now_ms: u64) -> usize {
        let before = self.document.entries.len();
        self.document
            .entries
            .retain(|_, entry| now_ms.saturating_sub(entry.timestamp) <= RETENTION_MS);
        before - self.document.entries.len()
    }

    /// Persist the whole document, creating directories as needed.
    pub fn save(&mut self) -> Result<()> {
        self.document.updated_at = now_millis();
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }
        let payload = serde_json::to_string_pretty(&self.document)?;
        std::fs::write(&self.file_path, payload)
            .with_context(|| format!("Failed to write cache file: {}", self.file_path.display()))
    }

    /// Delete the cache file and reset in-memory state.
    pub fn clear(&mut self) -> Result<()> {
        if self.file_path.exists() {
            std::fs::remove_file(&self.file_path).with_context(|| {
                format!("Failed to remove cache file: {}", self.file_path.display())
            })?;
        }
        self.document = CacheDocument::empty();
        self.hash_memo.clear();
        Ok(())
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}
