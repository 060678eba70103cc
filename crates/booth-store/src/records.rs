//! Append-only registration record store.
//!
//! One JSON array on disk, one object per accepted registration. Legacy
//! files holding a single object are normalized to a one-element list on
//! read; unparseable files are treated as empty with a logged warning —
//! a corrupt file must never take the kiosk down.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One accepted visitor registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub interest: String,
    pub program: String,
    pub term: String,
    pub contact: String,
    pub has_photo: bool,
    /// `YYYY-MM-DD HH:MM:SS`, local time.
    pub registered_at: String,
}

impl Registration {
    /// Build a registration stamped with the current local time.
    pub fn new(
        name: impl Into<String>,
        interest: impl Into<String>,
        program: impl Into<String>,
        term: impl Into<String>,
        contact: impl Into<String>,
        has_photo: bool,
    ) -> Self {
        Self {
            name: name.into(),
            interest: interest.into(),
            program: program.into(),
            term: term.into(),
            contact: contact.into(),
            has_photo,
            registered_at: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Flat-file JSON record store.
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all registrations. Missing file → empty; single-object file →
    /// one-element list; corrupt file → empty plus a warning.
    pub fn load(&self) -> Result<Vec<Registration>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let value: serde_json::Value = match serde_json::from_str(&contents) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "record file unparseable, treating as empty");
                return Ok(Vec::new());
            }
        };

        let normalized = match value {
            serde_json::Value::Array(items) => items,
            // Legacy layout: a single bare object.
            obj @ serde_json::Value::Object(_) => vec![obj],
            other => {
                tracing::warn!(path = %self.path.display(), ?other, "unexpected record file shape, treating as empty");
                return Ok(Vec::new());
            }
        };

        let mut records = Vec::with_capacity(normalized.len());
        for item in normalized {
            match serde_json::from_value::<Registration>(item) {
                Ok(r) => records.push(r),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "skipping malformed record");
                }
            }
        }

        Ok(records)
    }

    /// Append one registration and rewrite the array. Returns the new total.
    pub fn append(&self, registration: Registration) -> Result<usize, StoreError> {
        let mut records = self.load()?;
        records.push(registration);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&records)?)?;

        tracing::info!(path = %self.path.display(), total = records.len(), "registration appended");
        Ok(records.len())
    }

    /// Number of stored registrations.
    pub fn count(&self) -> Result<usize, StoreError> {
        Ok(self.load()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> Registration {
        Registration::new(name, "yes", "Engineering", "2026-1", "ana@example.com", true)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("records.json"));
        assert!(store.load().unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_append_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("records.json"));

        assert_eq!(store.append(sample("Ana")).unwrap(), 1);
        assert_eq!(store.append(sample("Luis")).unwrap(), 2);

        let records = store.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Ana");
        assert_eq!(records[1].name, "Luis");
        assert!(records[0].registered_at.len() == 19);
    }

    #[test]
    fn test_legacy_single_object_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let legacy = serde_json::to_string(&sample("Sole")).unwrap();
        std::fs::write(&path, legacy).unwrap();

        let store = RecordStore::new(&path);
        let records = store.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Sole");

        // Appending to a legacy file keeps the normalized list.
        store.append(sample("Ana")).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let store = RecordStore::new(&path);
        assert!(store.load().unwrap().is_empty());
        // A corrupt file does not block new registrations.
        assert_eq!(store.append(sample("Ana")).unwrap(), 1);
    }

    #[test]
    fn test_empty_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, "  \n").unwrap();
        assert!(RecordStore::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let good = serde_json::to_value(sample("Ana")).unwrap();
        let doc = serde_json::json!([good, {"name": "missing fields"}]);
        std::fs::write(&path, doc.to_string()).unwrap();

        let records = RecordStore::new(&path).load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Ana");
    }

    #[test]
    fn test_timestamp_shape() {
        let r = sample("Ana");
        // YYYY-MM-DD HH:MM:SS
        assert_eq!(r.registered_at.len(), 19);
        assert_eq!(&r.registered_at[4..5], "-");
        assert_eq!(&r.registered_at[10..11], " ");
        assert_eq!(&r.registered_at[13..14], ":");
    }
}
