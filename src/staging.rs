//! Local staging area for invocation-scoped files.
//!
//! A `StagedAsset` deletes its file when dropped, so every exit path of an
//! invocation releases what it staged.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

/// Directory used as a relay between storage and the renderer.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve `file_name` in the staging directory, creating the directory
    /// if needed. The file itself is created by whoever writes it.
    ///
    /// Names must be a single path component so staged files stay inside
    /// the staging directory.
    pub fn stage(&self, file_name: &str) -> io::Result<StagedAsset> {
        let single_component = matches!(
            Path::new(file_name).components().collect::<Vec<_>>().as_slice(),
            [Component::Normal(_)]
        );
        if !single_component {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid staged file name {:?}", file_name),
            ));
        }
        fs::create_dir_all(&self.dir)?;
        Ok(StagedAsset {
            path: self.dir.join(file_name),
        })
    }
}

/// A transient local copy owned by one invocation.
#[derive(Debug)]
pub struct StagedAsset {
    path: PathBuf,
}

impl StagedAsset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

impl Drop for StagedAsset {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "released staged file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to release staged file"),
        }
    }
}
