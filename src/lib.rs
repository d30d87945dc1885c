//! ASCII Art Converter Core
//!
//! One invocation takes a `media_id`, fetches `{media_id}.jpeg` from object
//! storage, renders it as ASCII art, and publishes
//! `{media_id}-ascii-art.png` next to it.
//!
//! # Guarantees
//! 1. Only a missing `media_id` fails option resolution
//! 2. Every failure comes back in `body`; nothing escapes the boundary
//! 3. Staged files never outlive the invocation
//! 4. Same input, same output key

pub mod config;
pub mod error;
pub mod hashing;
pub mod logging;
pub mod naming;
pub mod options;
pub mod pipeline;
pub mod render;
pub mod staging;
pub mod storage;
pub mod transfer;

pub use config::{Config, ConfigError, LoggingConfig, StorageConfig};
pub use error::{ErrorKind, PipelineError};
pub use naming::{output_key, source_key, OUTPUT_SUFFIX, SOURCE_EXTENSION};
pub use options::{resolve, Dimensions, InvocationRequest, RenderOptions, ResolvedRequest};
pub use pipeline::{InvocationOutcome, InvocationResult, Pipeline, S3Pipeline};
pub use render::{AsciiRenderer, RenderFailure, Renderer};
pub use staging::{StagedAsset, StagingArea};
pub use storage::{BlobStore, MemoryStore, S3Store, StorageError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
