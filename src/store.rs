use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use tempfile::Builder;

use crate::error::SeqidError;

/// Byte blobs keyed by name. The only shared mutable resource of a
/// resolution run; one logical call owns a key at a time.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SeqidError>;
    fn put(&self, key: &str, value: &[u8]) -> Result<(), SeqidError>;
    fn remove(&self, key: &str) -> Result<(), SeqidError>;
    /// Keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>, SeqidError>;
}

impl<S: CacheStore + ?Sized> CacheStore for &S {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SeqidError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), SeqidError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), SeqidError> {
        (**self).remove(key)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, SeqidError> {
        (**self).keys(prefix)
    }
}

impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SeqidError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), SeqidError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), SeqidError> {
        (**self).remove(key)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, SeqidError> {
        (**self).keys(prefix)
    }
}

/// One JSON file per key under a root directory. Writes go through a temp
/// file and a rename so an interrupted run never leaves a half-written entry.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: Utf8PathBuf,
}

impl FsStore {
    pub fn new() -> Result<Self, SeqidError> {
        Ok(Self::new_with_root(default_cache_root()?))
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Utf8PathBuf {
        self.root.join(format!("{}.json", encode_key(key)))
    }

    pub fn clear(&self) -> Result<usize, SeqidError> {
        if !self.root.as_std_path().exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for path in self.entry_paths()? {
            fs::remove_file(path.as_std_path())
                .map_err(|err| SeqidError::Filesystem(err.to_string()))?;
            removed += 1;
        }
        Ok(removed)
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), SeqidError> {
        let parent = path
            .parent()
            .ok_or_else(|| SeqidError::Filesystem("invalid cache path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| SeqidError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix("useqid-entry")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| SeqidError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| SeqidError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| SeqidError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn entry_paths(&self) -> Result<Vec<Utf8PathBuf>, SeqidError> {
        let entries = fs::read_dir(self.root.as_std_path())
            .map_err(|err| SeqidError::Filesystem(err.to_string()))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| SeqidError::Filesystem(err.to_string()))?;
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                continue;
            };
            if path.is_file() && path.extension() == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl CacheStore for FsStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SeqidError> {
        let path = self.path_for(key);
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        fs::read(path.as_std_path())
            .map(Some)
            .map_err(|err| SeqidError::Filesystem(format!("read {path}: {err}")))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), SeqidError> {
        Self::write_bytes_atomic(&self.path_for(key), value)
    }

    fn remove(&self, key: &str) -> Result<(), SeqidError> {
        let path = self.path_for(key);
        if path.as_std_path().exists() {
            fs::remove_file(path.as_std_path())
                .map_err(|err| SeqidError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, SeqidError> {
        if !self.root.as_std_path().exists() {
            return Ok(Vec::new());
        }
        Ok(self
            .entry_paths()?
            .into_iter()
            .filter_map(|path| path.file_stem().and_then(decode_key))
            .filter(|key| key.starts_with(prefix))
            .collect())
    }
}

/// In-process store, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>, SeqidError> {
        self.entries
            .lock()
            .map_err(|_| SeqidError::Filesystem("memory store lock poisoned".to_string()))
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SeqidError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), SeqidError> {
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SeqidError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, SeqidError> {
        Ok(self
            .lock()?
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

pub fn default_cache_root() -> Result<Utf8PathBuf, SeqidError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("uniprot-seqid")).ok()
        })
        .ok_or_else(|| SeqidError::Filesystem("unable to resolve cache directory".to_string()))
}

/// Keys carry raw identifiers (`sp|P12345|...`, `gi:123`). Every byte that
/// is not safe in a file name, `_` included, becomes `_XX` in hex, so two
/// distinct keys never share a file.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-' | b'+') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("_{byte:02X}"));
        }
    }
    encoded
}

/// Inverse of [`encode_key`]; `None` for file names it did not produce.
fn decode_key(stem: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(stem.len());
    let mut rest = stem.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'_' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(byte);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}
