//! Blob Transfer - storage to staging and back.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};

use tracing::debug;

use crate::error::PipelineError;
use crate::naming;
use crate::staging::{StagedAsset, StagingArea};
use crate::storage::{BlobStore, StorageError};

/// Moves blobs between a store and the local staging area.
pub struct BlobTransfer<'a, S: BlobStore + ?Sized> {
    store: &'a S,
    staging: &'a StagingArea,
}

impl<'a, S: BlobStore + ?Sized> BlobTransfer<'a, S> {
    pub fn new(store: &'a S, staging: &'a StagingArea) -> Self {
        Self { store, staging }
    }

    /// Download `{subject}.jpeg` into the staging area.
    ///
    /// The staged file is removed again on any failure.
    pub fn fetch(&self, subject_id: &str) -> Result<StagedAsset, PipelineError> {
        let key = naming::source_key(subject_id);
        let staged = self
            .staging
            .stage(&key)
            .map_err(|e| PipelineError::local_write(self.staging.dir().join(&key), e))?;

        let file = File::create(staged.path())
            .map_err(|e| PipelineError::local_write(staged.path(), e))?;
        let mut sink = RecordingSink::new(BufWriter::new(file));

        let fetched = self.store.get_to_writer(&key, &mut sink);
        if let Some(e) = sink.error.take() {
            return Err(PipelineError::local_write(staged.path(), e));
        }
        let bytes = fetched.map_err(|e| match e {
            StorageError::Connect(message) => PipelineError::StorageConnect(message),
            StorageError::NotFound { key } => PipelineError::ObjectNotFound { key },
            StorageError::Backend(message) => PipelineError::StorageRead {
                key: key.clone(),
                message,
            },
        })?;
        sink.inner
            .flush()
            .map_err(|e| PipelineError::local_write(staged.path(), e))?;

        debug!(key = %key, bytes, path = %staged.path().display(), "staged source");
        Ok(staged)
    }

    /// Upload a staged rendering as `{subject}-ascii-art.png` and return
    /// that key.
    pub fn publish(
        &self,
        subject_id: &str,
        artifact: &StagedAsset,
    ) -> Result<String, PipelineError> {
        let key = naming::output_key(subject_id);

        // Buffered whole: a rendering is at most render::MAX_CELLS glyph
        // cells of CELL_WIDTH x CELL_HEIGHT single-channel pixels.
        let body = {
            let mut file = File::open(artifact.path())
                .map_err(|e| PipelineError::local_read(artifact.path(), e))?;
            let mut body = Vec::new();
            file.read_to_end(&mut body)
                .map_err(|e| PipelineError::local_read(artifact.path(), e))?;
            body
        };

        self.store
            .put(&key, &body, naming::OUTPUT_CONTENT_TYPE)
            .map_err(|e| match e {
                StorageError::Connect(message) => PipelineError::StorageConnect(message),
                other => PipelineError::StorageWrite {
                    key: key.clone(),
                    message: other.to_string(),
                },
            })?;

        debug!(key = %key, bytes = body.len(), "published rendering");
        Ok(key)
    }
}

/// Keeps the first local write error so it can be told apart from a
/// failure on the storage side.
struct RecordingSink<W: Write> {
    inner: W,
    error: Option<io::Error>,
}

impl<W: Write> RecordingSink<W> {
    fn new(inner: W) -> Self {
        Self { inner, error: None }
    }

    fn record<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        result.map_err(|e| {
            let kind = e.kind();
            let message = e.to_string();
            self.error.get_or_insert(e);
            io::Error::new(kind, message)
        })
    }
}

impl<W: Write> Write for RecordingSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buf);
        self.record(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        self.record(result)
    }
}
