use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tempfile::NamedTempFile;

use crate::error::{Result, StoreError};
use crate::options::StorageOptions;
use crate::s3_store::{RustS3Client, S3ObjectStore};

/// Durable key/value storage for documents.
///
/// Keys are `/`-separated relative paths. Implementations must be safe to use
/// from many workers at once; callers never write the same key concurrently.
pub trait ObjectStore: Send + Sync {
    /// Append `data` at `offset`. An offset of zero starts the object afresh;
    /// any other offset must equal the object's current size.
    fn append_object(&self, key: &str, offset: u64, data: &[u8]) -> Result<()>;

    /// Replace the object with exactly `length` bytes read from `data`.
    fn put_object(&self, key: &str, data: &mut dyn Read, length: u64) -> Result<()>;

    /// Size of the stored object, or `None` if it does not exist.
    fn object_size(&self, key: &str) -> Result<Option<u64>>;

    /// Seal an object built with `append_object`. Backends that make appends
    /// visible immediately have nothing to do.
    fn finish_object(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    /// Remove the object and any unfinished upload of it. Removing an absent
    /// object succeeds.
    fn delete_object(&self, key: &str) -> Result<()>;
}

/// Select a backend by its configuration name.
pub fn open_store(options: &StorageOptions) -> Result<Arc<dyn ObjectStore>> {
    match options.backend.to_ascii_lowercase().as_str() {
        "filesystem" | "fs" => Ok(Arc::new(FsObjectStore::new(&options.root))),
        "memory" => Ok(Arc::new(MemoryObjectStore::default())),
        "minio" | "s3" | "gcs" | "google" => {
            let client = RustS3Client::connect(&options.s3)?;
            Ok(Arc::new(S3ObjectStore::new(client)))
        }
        _ => Err(StoreError::UnknownBackend(options.backend.clone())),
    }
}

/// Objects as files below a root directory.
///
/// `put_object` writes a sibling temp file and renames it into place, so a
/// reader never sees a half-written whole-file upload.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of `key`, rejecting keys that escape the root.
    pub fn path_of(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn prepare(&self, key: &str) -> Result<PathBuf> {
        let path = self.path_of(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::io(key))?;
        }
        Ok(path)
    }
}

impl ObjectStore for FsObjectStore {
    fn append_object(&self, key: &str, offset: u64, data: &[u8]) -> Result<()> {
        let path = self.prepare(key)?;

        let mut file = if offset == 0 {
            OpenOptions::new().create(true).write(true).truncate(true).open(&path)
        } else {
            OpenOptions::new().append(true).open(&path)
        }
        .map_err(StoreError::io(key))?;

        let actual = file.metadata().map_err(StoreError::io(key))?.len();
        if actual != offset {
            return Err(StoreError::OffsetMismatch {
                key: key.to_string(),
                offset,
                actual,
            });
        }
        file.write_all(data).map_err(StoreError::io(key))
    }

    fn put_object(&self, key: &str, data: &mut dyn Read, length: u64) -> Result<()> {
        let path = self.prepare(key)?;
        let parent = path.parent().unwrap_or(&self.root);

        let mut tmp = NamedTempFile::new_in(parent).map_err(StoreError::io(key))?;
        let copied = io::copy(&mut data.take(length), &mut tmp).map_err(StoreError::io(key))?;
        if copied != length {
            return Err(StoreError::ShortRead {
                key: key.to_string(),
                expected: length,
                actual: copied,
            });
        }
        tmp.as_file().sync_all().map_err(StoreError::io(key))?;
        tmp.persist(&path).map_err(|e| StoreError::io(key)(e.error))?;
        Ok(())
    }

    fn object_size(&self, key: &str) -> Result<Option<u64>> {
        let path = self.path_of(key)?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(key)(e)),
        }
    }

    fn delete_object(&self, key: &str) -> Result<()> {
        let path = self.path_of(key)?;
        match fs::remove_file(&path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(StoreError::io(key)(e)),
            _ => Ok(()),
        }
    }
}

/// Objects held in memory; for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn append_object(&self, key: &str, offset: u64, data: &[u8]) -> Result<()> {
        let mut objects = self.lock();
        let object = objects.entry(key.to_string()).or_default();
        if offset == 0 {
            object.clear();
        }
        let actual = object.len() as u64;
        if actual != offset {
            return Err(StoreError::OffsetMismatch {
                key: key.to_string(),
                offset,
                actual,
            });
        }
        object.extend_from_slice(data);
        Ok(())
    }

    fn put_object(&self, key: &str, data: &mut dyn Read, length: u64) -> Result<()> {
        let mut buffer = Vec::new();
        data.take(length)
            .read_to_end(&mut buffer)
            .map_err(StoreError::io(key))?;
        if buffer.len() as u64 != length {
            return Err(StoreError::ShortRead {
                key: key.to_string(),
                expected: length,
                actual: buffer.len() as u64,
            });
        }
        self.lock().insert(key.to_string(), buffer);
        Ok(())
    }

    fn object_size(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.lock().get(key).map(|o| o.len() as u64))
    }

    fn delete_object(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const KEY: &str = "ABC123/COPIA INTEGRAL 0001234-56.2024.5.02.0001 abc123.pdf";

    #[test]
    fn fs_append_then_put_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        store.append_object(KEY, 0, b"hello ").unwrap();
        store.append_object(KEY, 6, b"world").unwrap();
        assert_eq!(store.object_size(KEY).unwrap(), Some(11));

        store.put_object(KEY, &mut Cursor::new(b"replaced".to_vec()), 8).unwrap();
        assert_eq!(fs::read(store.path_of(KEY).unwrap()).unwrap(), b"replaced");
    }

    #[test]
    fn fs_append_at_wrong_offset_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        store.append_object(KEY, 0, b"abc").unwrap();

        let err = store.append_object(KEY, 10, b"d").unwrap_err();
        assert!(matches!(err, StoreError::OffsetMismatch { actual: 3, .. }));
    }

    #[test]
    fn fs_restart_at_zero_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        store.append_object(KEY, 0, b"stale content").unwrap();
        store.append_object(KEY, 0, b"new").unwrap();
        assert_eq!(store.object_size(KEY).unwrap(), Some(3));
    }

    #[test]
    fn fs_short_source_leaves_no_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let err = store.put_object(KEY, &mut Cursor::new(b"abc".to_vec()), 10).unwrap_err();
        assert!(matches!(err, StoreError::ShortRead { actual: 3, .. }));
        assert_eq!(store.object_size(KEY).unwrap(), None);
    }

    #[test]
    fn fs_rejects_escaping_keys() {
        let store = FsObjectStore::new("/tmp/store");
        for key in ["", "../x.pdf", "/etc/passwd", "a/../../b"] {
            assert!(matches!(store.path_of(key), Err(StoreError::InvalidKey(_))), "{key}");
        }
    }

    #[test]
    fn fs_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        store.append_object(KEY, 0, b"partial").unwrap();

        store.delete_object(KEY).unwrap();
        assert_eq!(store.object_size(KEY).unwrap(), None);
        store.delete_object(KEY).unwrap();
    }

    #[test]
    fn memory_store_mirrors_fs_semantics() {
        let store = MemoryObjectStore::default();
        store.append_object("k", 0, b"ab").unwrap();
        store.append_object("k", 2, b"cd").unwrap();
        assert!(store.append_object("k", 1, b"x").is_err());
        assert_eq!(store.get("k").unwrap(), b"abcd");
        assert_eq!(store.object_size("missing").unwrap(), None);

        store.delete_object("k").unwrap();
        store.delete_object("k").unwrap();
        assert_eq!(store.object_size("k").unwrap(), None);
    }

    #[test]
    fn backends_by_name() {
        assert!(open_store(&StorageOptions::default().with_backend("memory")).is_ok());
        assert!(open_store(&StorageOptions::default().with_backend("Filesystem")).is_ok());
        // No endpoint configured.
        assert!(matches!(
            open_store(&StorageOptions::default().with_backend("minio")),
            Err(StoreError::Backend(_))
        ));
        assert!(matches!(
            open_store(&StorageOptions::default().with_backend("ftp")),
            Err(StoreError::UnknownBackend(_))
        ));
    }
}
