//! Storage boundary. The engine only ever talks to a `Storage`
//! implementation; it never assumes a particular backend. Two backends
//! ship with the crate for testing and demoing — production hosts bring
//! their own (a real KV store, a database, whatever already backs their
//! plugin host).
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{AbeError, AbeResult};

// ---------------------------------------------------------------------------
// Storage key layout
// ---------------------------------------------------------------------------

pub const GLOBAL_PARAMS_KEY: &str = "config/ecelement";
pub const AUTHORITIES_PATH: &str = "authority_keys";
pub const SYSTEM_ATTRIBUTES_KEY: &str = "SYSTEM_ATTRIBUTES";
pub const SYSTEM_ATTRIBUTE_KEYS_PATH: &str = "system_attribute_keys";
pub const COMMON_ATTRIBUTES_KEY: &str = "COMMON_AUTHORITIES_ATTRIBUTES";
pub const MAJORITY_CONCERNS_KEY: &str = "majority_concerns";
pub const GIDS_PREFIX: &str = "subject/GIDS/";

/// The original plugin swapped these two accessors (writing an attribute's
/// published half under what it called `PRIVATE_DATA` and vice versa).
/// This crate keeps the sane convention: published material — the data
/// anyone may read to encrypt against an attribute — lives under
/// `PUBLISHED_DATA`; the authority-only secret halves live under
/// `PRIVATE_DATA`.
pub const PUBLISHED_DATA: &str = "PUBLISHED_DATA";
pub const PRIVATE_DATA: &str = "PRIVATE_DATA";

pub fn gid_key(gid: &str) -> String {
    format!("{}{}", GIDS_PREFIX, gid)
}

pub fn authority_attribute_key(accessor: &str, authority: &str, attribute: &str) -> String {
    format!("{}/{}/{}/{}", AUTHORITIES_PATH, authority, attribute, accessor)
}

pub fn common_attribute_key(accessor: &str, attribute: &str) -> String {
    format!("{}/{}/{}", COMMON_ATTRIBUTES_KEY, attribute, accessor)
}

/// The single `(alpha, y)` keypair materialized for one system attribute
/// (see `authority::AuthoritySetup::materialize_system_secret`), distinct
/// from `SYSTEM_ATTRIBUTES_KEY`, which only tracks the list of names.
pub fn system_attribute_key(accessor: &str, attribute: &str) -> String {
    format!("{}/{}/{}", SYSTEM_ATTRIBUTE_KEYS_PATH, attribute, accessor)
}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// A byte-oriented key-value capability. Values are opaque to the trait;
/// the engine serializes its own records to JSON before calling `put` and
/// parses them back out of `get`.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> AbeResult<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8]) -> AbeResult<()>;
    fn delete(&self, key: &str) -> AbeResult<()>;
    /// Every stored key that starts with `prefix`.
    fn list(&self, prefix: &str) -> AbeResult<Vec<String>>;
}

/// Convenience helpers layered on top of the raw `Storage` trait so callers
/// don't hand-roll JSON (de)serialization at every call site.
pub trait StorageExt: Storage {
    fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> AbeResult<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: serde::Serialize>(&self, key: &str, value: &T) -> AbeResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, &bytes)
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryStorage {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for InMemoryStorage {
    fn get(&self, key: &str) -> AbeResult<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AbeError::StorageFault("in-memory lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> AbeResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AbeError::StorageFault("in-memory lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> AbeResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AbeError::StorageFault("in-memory lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str) -> AbeResult<Vec<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AbeError::StorageFault("in-memory lock poisoned".into()))?;
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// One file per key, under a flattened filename (storage keys contain `/`,
/// which is mapped onto `__` so keys never escape `dir`).
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> AbeResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| AbeError::StorageFault(format!("create dir: {}", e)))?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key.replace('/', "__"))
    }

    fn key_from_path(&self, path: &Path) -> Option<String> {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.replace("__", "/"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> AbeResult<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read(&path)
            .map(Some)
            .map_err(|e| AbeError::StorageFault(format!("read {}: {}", key, e)))
    }

    fn put(&self, key: &str, value: &[u8]) -> AbeResult<()> {
        let path = self.entry_path(key);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, value)
            .map_err(|e| AbeError::StorageFault(format!("write {}: {}", key, e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| AbeError::StorageFault(format!("rename {}: {}", key, e)))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> AbeResult<()> {
        let path = self.entry_path(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| AbeError::StorageFault(format!("delete {}: {}", key, e)))?;
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> AbeResult<Vec<String>> {
        let mut out = Vec::new();
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| AbeError::StorageFault(format!("readdir: {}", e)))?;
        for entry in entries {
            let entry = entry.map_err(|e| AbeError::StorageFault(format!("entry: {}", e)))?;
            if let Some(key) = self.key_from_path(&entry.path()) {
                if key.starts_with(prefix) {
                    out.push(key);
                }
            }
        }
        Ok(out)
    }
}
