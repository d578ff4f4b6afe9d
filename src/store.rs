use crate::error::{RagError, Result};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable key to bytes storage used by the embedding cache.
///
/// Implementations assume a single writer.
pub trait ByteStore: Send + Sync {
    /// Fetch values for the given keys, `None` where nothing is stored
    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Store all entries, replacing existing values
    fn mset(&self, entries: &[(String, Vec<u8>)]) -> Result<()>;

    /// All stored keys, in no particular order
    fn keys(&self) -> Result<Vec<String>>;
}

/// Stores each value in its own file named after its key
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalFileStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

impl ByteStore for LocalFileStore {
    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        keys.iter()
            .map(|key| {
                let path = self.path_for(key)?;
                match fs::read(&path) {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(cache_io(&path, e)),
                }
            })
            .collect()
    }

    fn mset(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.root).map_err(|e| cache_io(&self.root, e))?;

        for (key, value) in entries {
            let path = self.path_for(key)?;
            // Write then rename so readers never observe a partial value
            let tmp_path = self.root.join(format!(".{}.tmp", key));
            fs::write(&tmp_path, value).map_err(|e| cache_io(&tmp_path, e))?;
            fs::rename(&tmp_path, &path).map_err(|e| cache_io(&path, e))?;
        }

        debug!("Stored {} entries in {}", entries.len(), self.root.display());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(cache_io(&self.root, e)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| cache_io(&self.root, e))?;
            if let Some(name) = entry.file_name().to_str() {
                if validate_key(name).is_ok() {
                    keys.push(name.to_string());
                }
            }
        }
        Ok(keys)
    }
}

/// Process-local store, mostly useful in tests
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| RagError::CacheIo("in-memory store lock poisoned".to_string()))
    }
}

impl ByteStore for InMemoryStore {
    fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let entries = self.lock()?;
        Ok(keys.iter().map(|key| entries.get(key).cloned()).collect())
    }

    fn mset(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        let mut stored = self.lock()?;
        for (key, value) in entries {
            stored.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(RagError::CacheIo(format!("invalid cache key: {:?}", key)))
    }
}

fn cache_io(path: &Path, error: std::io::Error) -> RagError {
    RagError::CacheIo(format!("{}: {}", path.display(), error))
}
