use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::CacheError;

/// Metadata of one unlocked case as persisted for later export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCase {
    #[serde(rename = "processo")]
    pub case_number: String,
    pub pid: String,
    pub data: serde_json::Value,
}

/// Key/value store of case metadata, keyed by case number.
pub trait MetadataCache: Send + Sync {
    /// Insert or replace the entry for `entry.case_number`.
    fn save(&self, entry: &CachedCase) -> Result<(), CacheError>;

    fn load(&self, case_number: &str) -> Result<Option<CachedCase>, CacheError>;
}

/// One pretty-printed JSON document per case under a directory.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, case_number: &str) -> PathBuf {
        let name: String = case_number
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl MetadataCache for JsonFileCache {
    fn save(&self, entry: &CachedCase) -> Result<(), CacheError> {
        let path = self.path_of(&entry.case_number);
        let io_err = |source: io::Error| CacheError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let json = serde_json::to_vec_pretty(entry)?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    fn load(&self, case_number: &str) -> Result<Option<CachedCase>, CacheError> {
        let path = self.path_of(case_number);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CachedCase>>,
}

impl MemoryCache {
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataCache for MemoryCache {
    fn save(&self, entry: &CachedCase) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.case_number.clone(), entry.clone());
        Ok(())
    }

    fn load(&self, case_number: &str) -> Result<Option<CachedCase>, CacheError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(case_number)
            .cloned())
    }
}
