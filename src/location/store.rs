//! Durable single-slot persistence for the last accepted fix.
//!
//! The store keeps exactly one record: the coordinates and observation
//! timestamp of the most recent fix that passed the acceptance policy.
//! Accuracy and provider are intentionally not persisted.
//!
//! # Format
//!
//! An INI file with a single `[last_fix]` section:
//!
//! ```ini
//! [last_fix]
//! latitude = 53.550000123
//! longitude = 9.990000456
//! timestamp = 1724400000000
//! ```
//!
//! # Invariants
//!
//! - `save` replaces the record atomically (temp file + rename); a record on
//!   disk never holds a partial write.
//! - `load_if_fresh` tolerates any subset of the keys being absent or
//!   malformed - that is simply "no persisted fix", never an error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ini::Ini;
use tracing::debug;

use super::fix::{PositionFix, StoredFix};

/// Section name for the persisted record.
const SECTION: &str = "last_fix";

/// Maximum age (milliseconds) for a persisted fix to be usable at cold start.
pub const FRESHNESS_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Errors from fix persistence.
///
/// Persistence is best-effort: callers log these and carry on; a failed save
/// never rolls back an in-memory acceptance or blocks publication.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to write or replace the record file.
    #[error("Failed to write fix record to {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create the parent directory for the record file.
    #[error("Failed to create store directory {path}: {source}")]
    CreateDirError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Single-slot durable store for the last accepted fix.
#[derive(Debug, Clone)]
pub struct FixStore {
    path: PathBuf,
}

impl FixStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store at the platform default location
    /// (`~/.ridetrack/last_fix.ini`, falling back to the current directory
    /// when no home directory is available).
    pub fn at_default_path() -> Self {
        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(".ridetrack").join("last_fix.ini"))
    }

    /// Path of the backing record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the persisted record with this fix's coordinates
    /// and timestamp.
    ///
    /// The record is written to a temporary file in the same directory and
    /// renamed over the old record, so all three fields land together or not
    /// at all.
    pub fn save(&self, fix: &PositionFix) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::CreateDirError {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let mut ini = Ini::new();
        ini.with_section(Some(SECTION))
            .set("latitude", format!("{}", fix.latitude))
            .set("longitude", format!("{}", fix.longitude))
            .set("timestamp", fix.observed_at_millis.to_string());

        let mut content = Vec::new();
        ini.write_to(&mut content).map_err(|e| StoreError::WriteError {
            path: self.path.clone(),
            source: e,
        })?;

        let tmp_path = self.path.with_extension("ini.tmp");
        fs::write(&tmp_path, &content).map_err(|e| StoreError::WriteError {
            path: tmp_path.clone(),
            source: e,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::WriteError {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Load the persisted record if it is complete and fresh.
    ///
    /// Returns `Some` only when latitude, longitude and timestamp are all
    /// present, parse cleanly, and `now_millis - timestamp` is within
    /// [`FRESHNESS_WINDOW_MS`]. A missing file, missing key or malformed
    /// value is treated identically to "no persisted fix".
    pub fn load_if_fresh(&self, now_millis: i64) -> Option<StoredFix> {
        let stored = self.load()?;

        if now_millis - stored.observed_at_millis > FRESHNESS_WINDOW_MS {
            debug!(
                age_ms = now_millis - stored.observed_at_millis,
                "Persisted fix is stale, discarding"
            );
            return None;
        }

        Some(stored)
    }

    /// Load the persisted record regardless of freshness.
    fn load(&self) -> Option<StoredFix> {
        let ini = match Ini::load_from_file(&self.path) {
            Ok(ini) => ini,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No readable fix record");
                return None;
            }
        };

        let section = ini.section(Some(SECTION))?;

        let latitude = section.get("latitude")?.trim().parse::<f64>().ok()?;
        let longitude = section.get("longitude")?.trim().parse::<f64>().ok()?;
        let observed_at_millis = section.get("timestamp")?.trim().parse::<i64>().ok()?;

        Some(StoredFix {
            latitude,
            longitude,
            observed_at_millis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FixStore {
        FixStore::new(dir.path().join("last_fix.ini"))
    }

    fn fix(observed_at: i64) -> PositionFix {
        PositionFix::new(53.5511, 9.9937, 20.0, observed_at, "gps")
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save(&fix(1_000)).unwrap();

        let stored = store.load_if_fresh(2_000).expect("fresh record");
        assert_eq!(stored.latitude, 53.5511);
        assert_eq!(stored.longitude, 9.9937);
        assert_eq!(stored.observed_at_millis, 1_000);
    }

    #[test]
    fn test_save_replaces_previous_record() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save(&fix(1_000)).unwrap();
        store
            .save(&PositionFix::new(48.1374, 11.5755, 30.0, 5_000, "network"))
            .unwrap();

        let stored = store.load_if_fresh(6_000).unwrap();
        assert_eq!(stored.latitude, 48.1374);
        assert_eq!(stored.observed_at_millis, 5_000);
    }

    #[test]
    fn test_missing_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.load_if_fresh(1_000).is_none());
    }

    #[test]
    fn test_freshness_boundary() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&fix(1_000_000)).unwrap();

        // 1ms inside the window: usable
        assert!(store
            .load_if_fresh(1_000_000 + FRESHNESS_WINDOW_MS - 1)
            .is_some());
        // Exactly at the window: still usable
        assert!(store.load_if_fresh(1_000_000 + FRESHNESS_WINDOW_MS).is_some());
        // 1ms past the window: discarded
        assert!(store
            .load_if_fresh(1_000_000 + FRESHNESS_WINDOW_MS + 1)
            .is_none());
    }

    #[test]
    fn test_missing_key_is_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_fix.ini");
        std::fs::write(&path, "[last_fix]\nlatitude = 53.55\ntimestamp = 1000\n").unwrap();

        let store = FixStore::new(&path);
        assert!(store.load_if_fresh(1_500).is_none());
    }

    #[test]
    fn test_malformed_value_is_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_fix.ini");
        std::fs::write(
            &path,
            "[last_fix]\nlatitude = north\nlongitude = 9.99\ntimestamp = 1000\n",
        )
        .unwrap();

        let store = FixStore::new(&path);
        assert!(store.load_if_fresh(1_500).is_none());
    }

    #[test]
    fn test_garbage_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_fix.ini");
        std::fs::write(&path, "not an ini file at all \u{0}\u{1}").unwrap();

        let store = FixStore::new(&path);
        assert!(store.load_if_fresh(1_500).is_none());
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = FixStore::new(dir.path().join("nested").join("deep").join("last_fix.ini"));

        store.save(&fix(1_000)).unwrap();
        assert!(store.load_if_fresh(1_500).is_some());
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&fix(1_000)).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], "last_fix.ini");
    }

    #[test]
    fn test_default_path_under_home() {
        let store = FixStore::at_default_path();
        assert!(store.path().ends_with(".ridetrack/last_fix.ini"));
    }
}
