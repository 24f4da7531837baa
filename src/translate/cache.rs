use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, RubigeneError};
use crate::file_utils::FileManager;

const SHARD_COUNT: usize = 16;

/// Identity of a cached gloss. Both parts are trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    lemma: String,
    target_language: String,
}

impl CacheKey {
    pub fn new(lemma: &str, target_language: &str) -> Self {
        Self {
            lemma: lemma.trim().to_lowercase(),
            target_language: target_language.trim().to_lowercase(),
        }
    }

    pub fn lemma(&self) -> &str {
        &self.lemma
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    fn digest(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(self.lemma.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.target_language.as_bytes());
        hasher.finalize().to_vec()
    }

    /// Hex SHA-256 of `lemma \0 target`, used as the entry's file name
    pub fn file_stem(&self) -> String {
        self.digest().iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn shard(&self) -> usize {
        self.digest()[0] as usize % SHARD_COUNT
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationCacheEntry {
    pub lemma: String,
    pub target_language: String,
    pub gloss: String,
    pub fetched_at: DateTime<Utc>,
}

impl TranslationCacheEntry {
    fn matches(&self, key: &CacheKey) -> bool {
        CacheKey::new(&self.lemma, &self.target_language) == *key
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub directory: PathBuf,
    pub entries: usize,
    pub total_bytes: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Persistent (lemma, target language) → gloss store.
///
/// Reads go through sharded in-memory maps backed by one JSON file per key.
/// Writes to the same shard are serialized; each file is replaced
/// atomically, so a crash leaves either the previous entry or the new one.
pub struct TranslationCache {
    dir: PathBuf,
    shards: Vec<RwLock<HashMap<CacheKey, TranslationCacheEntry>>>,
    write_locks: Vec<Mutex<()>>,
}

impl TranslationCache {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        FileManager::ensure_dir(&dir).map_err(|e| {
            RubigeneError::Cache(format!("cannot create cache directory {}: {}", dir.display(), e))
        })?;
        debug!("Translation cache at {}", dir.display());

        Ok(Self {
            dir,
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
            write_locks: (0..SHARD_COUNT).map(|_| Mutex::new(())).collect(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    /// Cached entry for `key`. Unreadable or corrupt files count as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<TranslationCacheEntry> {
        let shard = &self.shards[key.shard()];
        let cached = shard.read().get(key).cloned();
        if cached.is_some() {
            return cached;
        }

        let path = self.entry_path(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        let entry = match serde_json::from_str::<TranslationCacheEntry>(&content) {
            Ok(entry) if entry.matches(key) && !entry.gloss.trim().is_empty() => entry,
            Ok(_) => {
                warn!("Ignoring cache entry {} that does not belong to '{}'", path.display(), key.lemma());
                return None;
            }
            Err(e) => {
                warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        shard.write().insert(key.clone(), entry.clone());
        Some(entry)
    }

    /// Store `gloss` for `key`, replacing any previous entry.
    pub async fn put(&self, key: &CacheKey, gloss: &str) -> Result<TranslationCacheEntry> {
        let _guard = self.write_locks[key.shard()].lock().await;

        let entry = TranslationCacheEntry {
            lemma: key.lemma().to_string(),
            target_language: key.target_language().to_string(),
            gloss: gloss.to_string(),
            fetched_at: Utc::now(),
        };
        let content = serde_json::to_vec_pretty(&entry)?;
        let path = self.entry_path(key);

        FileManager::write_atomic(&path, content).await.map_err(|e| {
            RubigeneError::Cache(format!("failed to persist '{}': {}", key.lemma(), e))
        })?;

        self.shards[key.shard()].write().insert(key.clone(), entry.clone());
        debug!("Cached gloss for '{}' ({})", key.lemma(), key.target_language());
        Ok(entry)
    }

    /// All readable entries on disk, newest first.
    pub async fn list(&self) -> Result<Vec<TranslationCacheEntry>> {
        let mut entries = Vec::new();
        for path in self.entry_files().await? {
            if let Ok(content) = tokio::fs::read_to_string(&path).await {
                if let Ok(entry) = serde_json::from_str::<TranslationCacheEntry>(&content) {
                    entries.push(entry);
                }
            }
        }

        entries.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        Ok(entries)
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove every entry. Returns the number of files deleted.
    pub async fn clear(&self) -> Result<u64> {
        let mut count = 0;
        for path in self.entry_files().await? {
            if tokio::fs::remove_file(&path).await.is_ok() {
                count += 1;
            }
        }
        for shard in &self.shards {
            shard.write().clear();
        }

        info!("Cleared {} translation cache entries", count);
        Ok(count)
    }

    pub async fn info(&self) -> Result<CacheInfo> {
        let mut info = CacheInfo {
            directory: self.dir.clone(),
            ..Default::default()
        };

        for path in self.entry_files().await? {
            if let Ok(metadata) = tokio::fs::metadata(&path).await {
                info.total_bytes += metadata.len();
            }
        }

        let entries = self.list().await?;
        info.entries = entries.len();
        info.newest = entries.first().map(|e| e.fetched_at);
        info.oldest = entries.last().map(|e| e.fetched_at);
        Ok(info)
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dir_entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir_entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }
}
