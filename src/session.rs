//! Per-invocation storage
//!
//! A [`CaptureSession`] is a freshly created directory under the output root
//! holding the chunk images of exactly one invocation. Its name combines a
//! millisecond timestamp (for human ordering) with a random UUID, so
//! simultaneous invocations never share a directory.
//!
//! [`FullImage`] is the transient full-height capture. It lives in the
//! session directory only until slicing is done and removes itself on drop.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use image::DynamicImage;
use log::{debug, warn};
use uuid::Uuid;

use crate::{Error, Result};

const FULL_IMAGE_NAME: &str = "full.png";

/// Unique output location for one invocation
#[derive(Debug)]
pub struct CaptureSession {
    id: String,
    dir: PathBuf,
}

impl CaptureSession {
    /// Create a new, empty session directory under `root`.
    ///
    /// `root` itself is created if missing. Any failure is an
    /// [`Error::Resource`].
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .map_err(|e| Error::Resource(format!("cannot create {}: {}", root.display(), e)))?;

        let id = format!("{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4().simple());
        let dir = root.join(&id);
        // create_dir (not _all) so an existing directory is never reused
        fs::create_dir(&dir)
            .map_err(|e| Error::Resource(format!("cannot create {}: {}", dir.display(), e)))?;

        debug!("Created session directory {}", dir.display());
        Ok(Self { id, dir })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove the session directory and everything in it.
    pub fn discard(self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Path of chunk `index` (1-based) inside `dir`.
pub fn chunk_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{}.png", index))
}

/// The transient full-height capture
#[derive(Debug)]
pub struct FullImage {
    path: Option<PathBuf>,
}

impl FullImage {
    /// Persist PNG bytes as the session's full image.
    pub fn write(dir: &Path, png: &[u8]) -> Result<Self> {
        let path = dir.join(FULL_IMAGE_NAME);
        fs::write(&path, png)?;
        Ok(Self { path: Some(path) })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Decode the stored image.
    pub fn load(&self) -> Result<DynamicImage> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| Error::Capture("full image already removed".into()))?;
        image::open(path).map_err(|e| Error::Capture(format!("cannot decode {}: {}", path.display(), e)))
    }

    /// Delete the file now, reporting failure.
    pub fn remove(mut self) -> Result<()> {
        match self.path.take() {
            Some(path) => remove_if_present(&path),
            None => Ok(()),
        }
    }
}

impl Drop for FullImage {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = remove_if_present(&path) {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}
