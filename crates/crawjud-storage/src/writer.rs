use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::WriteError;
use crate::options::StorageOptions;
use crate::store::ObjectStore;

/// How the document reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePath {
    /// Every chunk was appended as it arrived.
    Incremental,
    /// The staged file was uploaded in one `put`.
    WholeFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub key: String,
    pub bytes_written: u64,
    pub path: WritePath,
    pub chunks: u64,
    pub failed_appends: u64,
}

/// Streams a document into an [`ObjectStore`] chunk by chunk.
///
/// Every chunk is written to a local staging file and appended to the store.
/// After the first failed append no further appends are tried; once the
/// stream is drained the staged file is uploaded whole instead. The staging
/// file is removed on every path, including errors. A write that fails after
/// reaching the store deletes whatever it left there.
pub struct StreamingWriter {
    store: Arc<dyn ObjectStore>,
    staging_dir: PathBuf,
    chunk_size: usize,
}

impl StreamingWriter {
    pub fn new(store: Arc<dyn ObjectStore>, options: &StorageOptions) -> Self {
        Self {
            store,
            staging_dir: options.staging_dir(),
            chunk_size: options.chunk_size(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn write(
        &self,
        key: &str,
        source: &mut dyn Read,
        declared_length: Option<u64>,
    ) -> Result<WriteReport, WriteError> {
        fs::create_dir_all(&self.staging_dir).map_err(WriteError::Staging)?;
        let mut staging = tempfile::Builder::new()
            .prefix(".crawjud-")
            .suffix(".part")
            .tempfile_in(&self.staging_dir)
            .map_err(WriteError::Staging)?;

        let mut touched = false;
        let result = self.stream(key, source, declared_length, &mut staging, &mut touched);

        if let Err(e) = staging.close() {
            tracing::warn!(key, error = %e, "failed to remove staging file");
        }
        if result.is_err() && touched {
            if let Err(e) = self.store.delete_object(key) {
                tracing::warn!(key, error = %e, "failed to remove partial object");
            }
        }
        result
    }

    fn stream(
        &self,
        key: &str,
        source: &mut dyn Read,
        declared_length: Option<u64>,
        staging: &mut NamedTempFile,
        touched: &mut bool,
    ) -> Result<WriteReport, WriteError> {
        let mut buffer = vec![0u8; self.chunk_size];
        let mut written = 0u64;
        let mut chunks = 0u64;
        let mut failed_appends = 0u64;

        loop {
            let n = fill_chunk(source, &mut buffer).map_err(WriteError::Source)?;
            if n == 0 {
                break;
            }
            let chunk = &buffer[..n];
            staging.write_all(chunk).map_err(WriteError::Staging)?;

            if failed_appends == 0 {
                *touched = true;
                if let Err(e) = self.store.append_object(key, written, chunk) {
                    tracing::warn!(key, offset = written, error = %e, "incremental append failed");
                    failed_appends += 1;
                }
            }
            written += n as u64;
            chunks += 1;
        }
        staging.flush().map_err(WriteError::Staging)?;

        if let Some(declared) = declared_length.filter(|d| *d != written) {
            tracing::warn!(key, declared, received = written, "document length differs from declared length");
        }

        let sealed = chunks > 0 && failed_appends == 0 && self.seal(key);
        let incremental = sealed && self.stored_size(key) == Some(written);
        let path = if incremental {
            WritePath::Incremental
        } else {
            *touched = true;
            let file = staging.as_file_mut();
            file.seek(SeekFrom::Start(0)).map_err(WriteError::Staging)?;
            self.store.put_object(key, file, written)?;
            WritePath::WholeFile
        };

        let stored = self.stored_size(key);
        if stored != Some(written) {
            return Err(WriteError::SizeMismatch {
                key: key.to_string(),
                expected: written,
                actual: stored,
            });
        }

        tracing::debug!(key, bytes = written, chunks, ?path, "document stored");
        Ok(WriteReport {
            key: key.to_string(),
            bytes_written: written,
            path,
            chunks,
            failed_appends,
        })
    }

    fn seal(&self, key: &str) -> bool {
        match self.store.finish_object(key) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "could not finish incremental upload");
                false
            }
        }
    }

    fn stored_size(&self, key: &str) -> Option<u64> {
        match self.store.object_size(key) {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!(key, error = %e, "could not read stored object size");
                None
            }
        }
    }
}

/// Read until `buffer` is full or the source is exhausted.
fn fill_chunk(source: &mut dyn Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match source.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
