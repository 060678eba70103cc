//! Photo directory: save, look up and remove visitor photographs.
//!
//! Files are named `<sanitized-name>_<YYYYMMDD_HHMMSS>.png`. Lookup is by
//! sanitized-name prefix, newest modification time first.

use crate::StoreError;
use std::path::{Path, PathBuf};

const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const PHOTO_EXTENSION: &str = "png";

/// Keep alphanumerics, spaces, hyphens and underscores; drop everything
/// else; trim trailing whitespace. Keeps visitor-supplied names safe to use
/// as filename stems.
pub fn sanitize_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .collect();
    kept.trim_end().to_string()
}

/// Filesystem directory of visitor photographs.
pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a photograph for `name`, creating the directory on demand.
    /// Returns the stored path.
    pub fn save(&self, name: &str, photo: &image::RgbImage) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.dir)?;

        let stamp = chrono::Local::now().format(FILENAME_TIMESTAMP_FORMAT);
        let filename = format!("{}_{stamp}.{PHOTO_EXTENSION}", sanitize_name(name));
        let path = self.dir.join(filename);

        photo.save(&path)?;
        tracing::info!(path = %path.display(), "photo saved");
        Ok(path)
    }

    /// Most recent photo stored for `name`, by modification time.
    pub fn latest(&self, name: &str) -> Result<Option<PathBuf>, StoreError> {
        let prefix = format!("{}_", sanitize_name(name));
        let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !file_name.starts_with(&prefix)
                || path.extension().and_then(|e| e.to_str()) != Some(PHOTO_EXTENSION)
            {
                continue;
            }

            let modified = entry.metadata()?.modified()?;
            let is_newer = newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true);
            if is_newer {
                newest = Some((modified, path));
            }
        }

        Ok(newest.map(|(_, p)| p))
    }

    /// Whether at least one photo exists for `name`.
    pub fn has_photo(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.latest(name)?.is_some())
    }

    /// Delete a stored photo. Returns false if it was already gone.
    pub fn remove(&self, path: &Path) -> Result<bool, StoreError> {
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        tracing::info!(path = %path.display(), "photo removed");
        Ok(true)
    }
}
