//! Content-addressed result cache.
//!
//! Entries are keyed by (file path, rule-set fingerprint) and carry the hash
//! of the content they were computed from. A lookup only hits when the stored
//! hash matches the current content. Results live in memory for the session
//! and as one JSON file per key under the cache directory
//! (~/.cache/glint/results/ by default).

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::error::{EngineError, Result};
use crate::rule::Diagnostic;

/// Bumped whenever the entry layout or diagnostic encoding changes.
const CACHE_VERSION: u32 = 1;

/// Hex characters of the key digest used in file names.
const KEY_LEN: usize = 32;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// SHA-256 of file content, hex encoded.
pub fn hash_content(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Storage key for a (path, fingerprint) pair.
///
/// The content hash is deliberately not part of the key: an edited file maps
/// to the same slot and replaces the stale entry.
pub fn cache_key(path: &Path, fingerprint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update(fingerprint.as_bytes());
    let mut key = hex::encode(hasher.finalize());
    key.truncate(KEY_LEN);
    key
}

/// The default on-disk location for cached results.
pub fn default_cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "glint").map(|dirs| dirs.cache_dir().join("results"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    version: u32,
    content_hash: String,
    diagnostics: Vec<Diagnostic>,
}

/// In-memory + file-based cache of per-file diagnostics.
pub struct ResultCache {
    /// In-memory tier for the current session
    memory: RwLock<HashMap<String, CacheEntry>>,
    /// Directory holding persisted entries; `None` when disabled.
    dir: Option<PathBuf>,
}

impl ResultCache {
    /// Open a cache rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| EngineError::CacheInit {
            dir: dir.clone(),
            source,
        })?;
        tracing::debug!(dir = %dir.display(), "opened result cache");
        Ok(Self {
            memory: RwLock::new(HashMap::new()),
            dir: Some(dir),
        })
    }

    /// A cache that always misses and never touches storage.
    pub fn disabled() -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            dir: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Cached diagnostics for `path`, if computed from identical content
    /// under the same rule set.
    pub fn lookup(
        &self,
        path: &Path,
        content_hash: &str,
        fingerprint: &str,
    ) -> Option<Vec<Diagnostic>> {
        self.dir.as_ref()?;
        let key = cache_key(path, fingerprint);

        {
            let memory = self.memory.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = memory.get(&key) {
                return (entry.content_hash == content_hash).then(|| entry.diagnostics.clone());
            }
        }

        let entry = self.read_entry(&key)?;
        if entry.content_hash != content_hash {
            return None;
        }
        let diagnostics = entry.diagnostics.clone();

        // Promote to memory
        self.memory
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
        Some(diagnostics)
    }

    /// Record diagnostics for `path`. Persistence failures are logged and
    /// otherwise ignored.
    pub fn store(&self, path: &Path, content_hash: &str, fingerprint: &str, diagnostics: &[Diagnostic]) {
        if self.dir.is_none() {
            return;
        }
        let key = cache_key(path, fingerprint);
        let entry = CacheEntry {
            version: CACHE_VERSION,
            content_hash: content_hash.to_string(),
            diagnostics: diagnostics.to_vec(),
        };

        if let Err(err) = self.write_entry(&key, &entry) {
            tracing::debug!(path = %path.display(), error = %err, "cache write failed");
        }

        self.memory
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    /// Remove every cached entry. Returns the number of files deleted.
    pub fn clear(&self) -> io::Result<usize> {
        self.memory
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let Some(dir) = &self.dir else {
            return Ok(0);
        };
        clear_dir(dir)
    }

    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(format!("{}.json", key)))
    }

    fn read_entry(&self, key: &str) -> Option<CacheEntry> {
        let path = self.entry_path(key)?;
        let content = fs::read(&path).ok()?;
        match serde_json::from_slice::<CacheEntry>(&content) {
            Ok(entry) if entry.version == CACHE_VERSION => Some(entry),
            Ok(_) => None,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "discarding corrupt cache entry");
                None
            }
        }
    }

    /// Write through a temporary file and rename, so readers never observe a
    /// partially written entry.
    fn write_entry(&self, key: &str, entry: &CacheEntry) -> io::Result<()> {
        let Some(path) = self.entry_path(key) else {
            return Ok(());
        };
        let tmp = path.with_extension(format!(
            "tmp.{}.{}",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let content = serde_json::to_vec(entry).map_err(io::Error::other)?;
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path).inspect_err(|_| {
            let _ = fs::remove_file(&tmp);
        })
    }
}

/// Delete persisted entries in `dir` without opening a cache over it.
pub fn clear_dir(dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    tracing::debug!(dir = %dir.display(), removed, "cleared result cache");
    Ok(removed)
}
