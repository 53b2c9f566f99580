use std::collections::HashMap;
use std::io::Read;
use std::sync::{Mutex, MutexGuard, PoisonError};

use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::serde_types::Part;

use crate::error::{Result, StoreError};
use crate::options::S3Options;
use crate::store::ObjectStore;

/// Smallest part S3 accepts for anything but the last part of an upload.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;
const PUT_PART_SIZE: usize = 8 * 1024 * 1024;
const CONTENT_TYPE: &str = "application/pdf";

/// The bucket requests an [`S3ObjectStore`] is built on.
///
/// Errors are plain messages; the store attaches the key.
pub trait MultipartApi: Send + Sync {
    /// Start a multipart upload and return its id.
    fn initiate(&self, key: &str) -> std::result::Result<String, String>;

    /// Upload one part and return its ETag.
    fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Vec<u8>,
    ) -> std::result::Result<String, String>;

    fn complete(&self, key: &str, upload_id: &str, parts: Vec<(u32, String)>) -> std::result::Result<(), String>;

    fn abort(&self, key: &str, upload_id: &str) -> std::result::Result<(), String>;

    /// Single-request upload.
    fn put(&self, key: &str, data: Vec<u8>) -> std::result::Result<(), String>;

    /// Size of a completed object, `None` if absent.
    fn head(&self, key: &str) -> std::result::Result<Option<u64>, String>;

    fn delete(&self, key: &str) -> std::result::Result<(), String>;
}

#[derive(Debug)]
struct Upload {
    upload_id: String,
    next_offset: u64,
    parts: Vec<(u32, String)>,
    pending: Vec<u8>,
}

/// An S3-compatible bucket (MinIO, AWS, GCS interoperability mode).
///
/// Appends become parts of a multipart upload. Data is buffered until a part
/// reaches [`MIN_PART_SIZE`]; [`ObjectStore::finish_object`] uploads the rest
/// and completes the upload, and only then is the object visible.
pub struct S3ObjectStore<C> {
    client: C,
    uploads: Mutex<HashMap<String, Upload>>,
}

impl<C: MultipartApi> S3ObjectStore<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            uploads: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Upload>> {
        self.uploads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn abort_pending(&self, key: &str) {
        let upload = self.lock().remove(key);
        if let Some(upload) = upload {
            if let Err(e) = self.client.abort(key, &upload.upload_id) {
                tracing::warn!(key, error = %e, "failed to abort multipart upload");
            }
        }
    }

    fn flush_part(&self, key: &str, upload: &mut Upload) -> Result<()> {
        let part_number = upload.parts.len() as u32 + 1;
        let data = std::mem::take(&mut upload.pending);
        let etag = self
            .client
            .upload_part(key, &upload.upload_id, part_number, data)
            .map_err(StoreError::remote(key))?;
        upload.parts.push((part_number, etag));
        Ok(())
    }

    fn append(&self, key: &str, upload: &mut Upload, data: &[u8]) -> Result<()> {
        upload.pending.extend_from_slice(data);
        upload.next_offset += data.len() as u64;
        if upload.pending.len() >= MIN_PART_SIZE {
            self.flush_part(key, upload)?;
        }
        Ok(())
    }

    fn put_multipart(&self, key: &str, data: &mut dyn Read, length: u64) -> Result<()> {
        let upload_id = self.client.initiate(key).map_err(StoreError::remote(key))?;
        let mut parts = Vec::new();
        let mut copied = 0u64;
        let outcome = loop {
            let want = (length - copied).min(PUT_PART_SIZE as u64);
            if want == 0 {
                break self
                    .client
                    .complete(key, &upload_id, std::mem::take(&mut parts))
                    .map_err(StoreError::remote(key));
            }
            let mut chunk = Vec::with_capacity(want as usize);
            if let Err(e) = Read::take(&mut *data, want).read_to_end(&mut chunk) {
                break Err(StoreError::io(key)(e));
            }
            copied += chunk.len() as u64;
            if (chunk.len() as u64) < want {
                break Err(StoreError::ShortRead {
                    key: key.to_string(),
                    expected: length,
                    actual: copied,
                });
            }
            let part_number = parts.len() as u32 + 1;
            match self.client.upload_part(key, &upload_id, part_number, chunk) {
                Ok(etag) => parts.push((part_number, etag)),
                Err(e) => break Err(StoreError::remote(key)(e)),
            }
        };
        if outcome.is_err() {
            if let Err(e) = self.client.abort(key, &upload_id) {
                tracing::warn!(key, error = %e, "failed to abort multipart upload");
            }
        }
        outcome
    }
}

impl<C: MultipartApi> ObjectStore for S3ObjectStore<C> {
    fn append_object(&self, key: &str, offset: u64, data: &[u8]) -> Result<()> {
        let mut upload = if offset == 0 {
            self.abort_pending(key);
            let upload_id = self.client.initiate(key).map_err(StoreError::remote(key))?;
            Upload {
                upload_id,
                next_offset: 0,
                parts: Vec::new(),
                pending: Vec::new(),
            }
        } else {
            let taken = self.lock().remove(key);
            match taken {
                Some(upload) if upload.next_offset == offset => upload,
                other => {
                    let actual = other.as_ref().map_or(0, |u| u.next_offset);
                    if let Some(upload) = other {
                        self.lock().insert(key.to_string(), upload);
                    }
                    return Err(StoreError::OffsetMismatch {
                        key: key.to_string(),
                        offset,
                        actual,
                    });
                }
            }
        };

        match self.append(key, &mut upload, data) {
            Ok(()) => {
                self.lock().insert(key.to_string(), upload);
                Ok(())
            }
            Err(e) => {
                if let Err(abort) = self.client.abort(key, &upload.upload_id) {
                    tracing::warn!(key, error = %abort, "failed to abort multipart upload");
                }
                Err(e)
            }
        }
    }

    fn put_object(&self, key: &str, data: &mut dyn Read, length: u64) -> Result<()> {
        self.abort_pending(key);
        if length > PUT_PART_SIZE as u64 {
            return self.put_multipart(key, data, length);
        }
        let mut buffer = Vec::with_capacity(length as usize);
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
        self.client.put(key, buffer).map_err(StoreError::remote(key))
    }

    fn object_size(&self, key: &str) -> Result<Option<u64>> {
        self.client.head(key).map_err(StoreError::remote(key))
    }

    fn finish_object(&self, key: &str) -> Result<()> {
        let taken = self.lock().remove(key);
        let Some(mut upload) = taken else {
            return Ok(());
        };
        let sealed = if upload.parts.is_empty() || !upload.pending.is_empty() {
            self.flush_part(key, &mut upload)
        } else {
            Ok(())
        }
        .and_then(|()| {
            self.client
                .complete(key, &upload.upload_id, std::mem::take(&mut upload.parts))
                .map_err(StoreError::remote(key))
        });
        if sealed.is_err() {
            if let Err(e) = self.client.abort(key, &upload.upload_id) {
                tracing::warn!(key, error = %e, "failed to abort multipart upload");
            }
        }
        sealed
    }

    fn delete_object(&self, key: &str) -> Result<()> {
        self.abort_pending(key);
        self.client.delete(key).map_err(StoreError::remote(key))
    }
}

/// [`MultipartApi`] over a `rust-s3` bucket with path-style addressing.
pub struct RustS3Client {
    bucket: Box<Bucket>,
}

impl RustS3Client {
    pub fn connect(options: &S3Options) -> Result<Self> {
        let endpoint = options
            .endpoint()
            .ok_or_else(|| StoreError::Backend("s3 endpoint is not configured".to_string()))?;
        let bucket_name = options
            .bucket()
            .ok_or_else(|| StoreError::Backend("s3 bucket is not configured".to_string()))?;
        let region = Region::Custom {
            region: options.region.clone(),
            endpoint,
        };
        let access_key = options.access_key();
        let secret_key = options.secret_key();
        let credentials = Credentials::new(access_key.as_deref(), secret_key.as_deref(), None, None, None)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let bucket = Bucket::new(&bucket_name, region, credentials)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .with_path_style();
        tracing::debug!(bucket = %bucket_name, "s3 store ready");
        Ok(Self { bucket })
    }
}

fn message(error: S3Error) -> String {
    error.to_string()
}

impl MultipartApi for RustS3Client {
    fn initiate(&self, key: &str) -> std::result::Result<String, String> {
        self.bucket
            .initiate_multipart_upload(key, CONTENT_TYPE)
            .map(|response| response.upload_id)
            .map_err(message)
    }

    fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Vec<u8>,
    ) -> std::result::Result<String, String> {
        self.bucket
            .put_multipart_chunk(&data, key, part_number, upload_id, CONTENT_TYPE)
            .map(|part| part.etag)
            .map_err(message)
    }

    fn complete(&self, key: &str, upload_id: &str, parts: Vec<(u32, String)>) -> std::result::Result<(), String> {
        let parts = parts
            .into_iter()
            .map(|(part_number, etag)| Part { part_number, etag })
            .collect();
        self.bucket
            .complete_multipart_upload(key, upload_id, parts)
            .map(drop)
            .map_err(message)
    }

    fn abort(&self, key: &str, upload_id: &str) -> std::result::Result<(), String> {
        self.bucket.abort_upload(key, upload_id).map_err(message)
    }

    fn put(&self, key: &str, data: Vec<u8>) -> std::result::Result<(), String> {
        self.bucket
            .put_object_with_content_type(key, &data, CONTENT_TYPE)
            .map(drop)
            .map_err(message)
    }

    fn head(&self, key: &str) -> std::result::Result<Option<u64>, String> {
        match self.bucket.head_object(key) {
            Ok((head, _)) => Ok(Some(head.content_length.unwrap_or(0).max(0) as u64)),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(None),
            Err(e) => Err(message(e)),
        }
    }

    fn delete(&self, key: &str) -> std::result::Result<(), String> {
        match self.bucket.delete_object(key) {
            Ok(_) | Err(S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(message(e)),
        }
    }
}
