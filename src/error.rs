//! Error types for the conversion pipeline.
//!
//! Display strings are the legacy `body` text callers already match on.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::RenderFailure;

/// Terminal failures of a single invocation. None are retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Error getting media_id")]
    MissingSubject,

    #[error("Error creating session: {0}")]
    StorageConnect(String),

    #[error("Error getting object: {key} does not exist")]
    ObjectNotFound { key: String },

    #[error("Error getting object: {key}: {message}")]
    StorageRead { key: String, message: String },

    #[error("Error saving file: {}: {source}", path.display())]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error converting image: {0}")]
    Render(#[from] RenderFailure),

    #[error("Error opening file: {}: {source}", path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error uploading file: {key}: {message}")]
    StorageWrite { key: String, message: String },

    /// A stage panicked instead of returning an error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable failure taxonomy exposed next to the legacy text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingSubject,
    StorageConnect,
    ObjectNotFound,
    StorageRead,
    LocalWrite,
    Render,
    LocalRead,
    StorageWrite,
    Internal,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingSubject => ErrorKind::MissingSubject,
            Self::StorageConnect(_) => ErrorKind::StorageConnect,
            Self::ObjectNotFound { .. } => ErrorKind::ObjectNotFound,
            Self::StorageRead { .. } => ErrorKind::StorageRead,
            Self::LocalWrite { .. } => ErrorKind::LocalWrite,
            Self::Render(_) => ErrorKind::Render,
            Self::LocalRead { .. } => ErrorKind::LocalRead,
            Self::StorageWrite { .. } => ErrorKind::StorageWrite,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn local_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalWrite {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn local_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalRead {
            path: path.into(),
            source,
        }
    }
}
