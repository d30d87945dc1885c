//! Object storage seam.
//!
//! The pipeline only needs get and put on an opaque key/value blob store.
//! `S3Store` talks to any S3-compatible endpoint; `MemoryStore` keeps blobs
//! in process.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use thiserror::Error;
use tracing::debug;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}")]
    Connect(String),

    #[error("{key} does not exist")]
    NotFound { key: String },

    #[error("{0}")]
    Backend(String),
}

/// Get/put access to a blob store.
pub trait BlobStore {
    /// Stream the object at `key` into `sink`, returning the bytes written.
    fn get_to_writer(&self, key: &str, sink: &mut (dyn Write + Send)) -> Result<u64, StorageError>;

    /// Store `body` under `key`, replacing any existing object.
    fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError>;
}

impl<T: BlobStore + ?Sized> BlobStore for &T {
    fn get_to_writer(&self, key: &str, sink: &mut (dyn Write + Send)) -> Result<u64, StorageError> {
        (**self).get_to_writer(key, sink)
    }

    fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError> {
        (**self).put(key, body, content_type)
    }
}

/// S3-compatible store (DigitalOcean Spaces, MinIO, AWS S3).
#[derive(Debug, Clone)]
pub struct S3Store {
    config: StorageConfig,
}

impl S3Store {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Open a session for one request. Missing credentials or bucket name
    /// surface as `StorageError::Connect`.
    fn bucket(&self) -> Result<Box<Bucket>, StorageError> {
        let access_key = required(&self.config.access_key, "access key")?;
        let secret_key = required(&self.config.secret_key, "secret key")?;
        let bucket_name = required(&self.config.bucket, "bucket name")?;

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::Connect(e.to_string()))?;
        let region = Region::Custom {
            region: self.config.region.clone(),
            endpoint: self.config.endpoint.clone(),
        };

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Connect(e.to_string()))?;
        if self.config.path_style {
            Ok(bucket.with_path_style())
        } else {
            Ok(bucket)
        }
    }
}

fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str, StorageError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| StorageError::Connect(format!("missing {}", what)))
}

fn backend_error(key: &str, err: S3Error) -> StorageError {
    match err {
        S3Error::HttpFailWithBody(404, _) => StorageError::NotFound {
            key: key.to_string(),
        },
        other => StorageError::Backend(other.to_string()),
    }
}

fn check_status(key: &str, status: u16) -> Result<(), StorageError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(StorageError::NotFound {
            key: key.to_string(),
        }),
        other => Err(StorageError::Backend(format!(
            "unexpected status {} for {}",
            other, key
        ))),
    }
}

/// Counts bytes on their way to the caller's sink.
struct CountingSink<'a> {
    inner: &'a mut (dyn Write + Send),
    written: u64,
}

impl Write for CountingSink<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl BlobStore for S3Store {
    fn get_to_writer(&self, key: &str, sink: &mut (dyn Write + Send)) -> Result<u64, StorageError> {
        let bucket = self.bucket()?;
        let mut counting = CountingSink {
            inner: sink,
            written: 0,
        };
        let status = bucket
            .get_object_to_writer(key, &mut counting)
            .map_err(|e| backend_error(key, e))?;
        check_status(key, status)?;
        debug!(key, bytes = counting.written, "downloaded object");
        Ok(counting.written)
    }

    fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError> {
        let bucket = self.bucket()?;
        let response = bucket
            .put_object_with_content_type(key, body, content_type)
            .map_err(|e| backend_error(key, e))?;
        check_status(key, response.status_code())?;
        debug!(key, bytes = body.len(), "uploaded object");
        Ok(())
    }
}

/// In-process store. Objects live as long as the store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, StoredObject>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, as an earlier upload would have.
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.lock().insert(
            key.into(),
            StoredObject {
                body: body.into(),
                content_type: None,
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredObject>> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BlobStore for MemoryStore {
    fn get_to_writer(&self, key: &str, sink: &mut (dyn Write + Send)) -> Result<u64, StorageError> {
        let body = self
            .lock()
            .get(key)
            .map(|object| object.body.clone())
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })?;
        sink.write_all(&body)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(body.len() as u64)
    }

    fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError> {
        self.lock().insert(
            key.to_string(),
            StoredObject {
                body: body.to_vec(),
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }
}
