//! Key/value storage media.
//!
//! The storage medium itself is an external collaborator; the adapter only
//! requires this minimal string-keyed contract. [`FileKv`] is the durable
//! reference implementation (one JSON file per key, atomic replace);
//! [`MemoryKv`] backs tests.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use hashbrown::HashMap;

/// Minimal string key/value storage contract.
pub trait KvMedium: Send {
    /// Reads the value at `key`, or `None` when absent.
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    /// Writes `value` at `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
    /// Deletes the value at `key`. Deleting an absent key succeeds.
    fn delete(&mut self, key: &str) -> io::Result<()>;
}

/// File-backed medium: one file per key under a base directory.
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-write never leaves a truncated value behind.
#[derive(Debug, Clone)]
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    /// Creates a medium rooted at `dir`. The directory is created lazily on
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KvMedium for FileKv {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = tmp_path(&path);
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)
    }

    fn delete(&mut self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// In-memory medium for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: HashMap<String, String>,
}

impl MemoryKv {
    /// Creates an empty medium.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvMedium for MemoryKv {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> io::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}
