//! Durable destinations of a batch: documents go to an [`ObjectStore`]
//! through the [`StreamingWriter`], case metadata goes to a [`MetadataCache`].

mod cache;
mod error;
mod options;
mod s3_store;
mod store;
mod writer;

pub use cache::{CachedCase, JsonFileCache, MemoryCache, MetadataCache};
pub use error::{CacheError, Result, StoreError, WriteError};
pub use options::{MAX_CHUNK_SIZE, MIN_CHUNK_SIZE, S3Options, StorageOptions};
pub use s3_store::{MIN_PART_SIZE, MultipartApi, RustS3Client, S3ObjectStore};
pub use store::{FsObjectStore, MemoryObjectStore, ObjectStore, open_store};
pub use writer::{StreamingWriter, WritePath, WriteReport};
