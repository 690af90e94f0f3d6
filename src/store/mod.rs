//! Durable feature record storage.
//!
//! One JSON record per feature under `{state_dir}/features/`, written
//! with an atomic-rename discipline: serialize to a sibling temp file in
//! the destination directory, flush it, then rename over the target. A
//! crash between those steps leaves the previous valid record intact.
//! This layer guarantees durability, not mutual exclusion; callers must
//! serialize writes to the same feature.

pub mod allocator;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

pub use allocator::IdAllocator;

use crate::error::{Error, Result};
use crate::feature::Feature;

/// Feature record store rooted at a state directory.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    features_dir: PathBuf,
}

impl FeatureStore {
    /// Open (creating if needed) the store under a state directory.
    pub fn open(state_dir: &Path) -> Result<Self> {
        let features_dir = state_dir.join("features");
        fs::create_dir_all(&features_dir)?;
        Ok(Self { features_dir })
    }

    /// Record path for a feature id.
    pub fn record_path(&self, id: u32) -> PathBuf {
        self.features_dir.join(format!("{id:03}.json"))
    }

    /// Load a feature record.
    pub fn load(&self, id: u32) -> Result<Feature> {
        let path = self.record_path(id);
        if !path.is_file() {
            return Err(Error::FeatureNotFound(id));
        }
        let content = fs::read_to_string(&path)?;
        let feature = serde_json::from_str(&content)?;
        Ok(feature)
    }

    /// Persist a feature record atomically.
    pub fn save(&self, feature: &Feature) -> Result<()> {
        let path = self.record_path(feature.id);
        let content = serde_json::to_string_pretty(feature)?;
        write_atomic(&path, content.as_bytes())?;
        debug!(feature = feature.id, phase = %feature.phase, "feature record saved");
        Ok(())
    }

    /// List all stored features, sorted by id.
    pub fn list(&self) -> Result<Vec<Feature>> {
        let mut features = Vec::new();
        for entry in fs::read_dir(&self.features_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let content = fs::read_to_string(&path)?;
                let feature: Feature = serde_json::from_str(&content)?;
                features.push(feature);
            }
        }
        features.sort_by_key(|f| f.id);
        Ok(features)
    }

    /// List features that are still active (not archived or cancelled).
    pub fn list_active(&self) -> Result<Vec<Feature>> {
        Ok(self.list()?.into_iter().filter(Feature::is_active).collect())
    }
}

/// Write `content` to `path` via a sibling temp file and atomic rename.
///
/// The temp file lives in the destination directory so the rename cannot
/// cross filesystems. On any failure the temp file is cleaned up by its
/// guard and the previous record is left untouched.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("record path has no parent: {}", path.display()),
        ))
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::feature::Phase;

    fn sample(id: u32) -> Feature {
        Feature::new(
            id,
            "user-auth".to_string(),
            format!("{id:03}-user-auth"),
            PathBuf::from("/tmp/ws"),
        )
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeatureStore::open(dir.path()).unwrap();

        let feature = sample(1);
        store.save(&feature).unwrap();

        let loaded = store.load(1).unwrap();
        assert_eq!(loaded.id, 1);
        assert_eq!(loaded.branch, "001-user-auth");
        assert_eq!(loaded.phase, Phase::Specify);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeatureStore::open(dir.path()).unwrap();
        assert!(matches!(store.load(42), Err(Error::FeatureNotFound(42))));
    }

    #[test]
    fn test_save_overwrites_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeatureStore::open(dir.path()).unwrap();

        let mut feature = sample(1);
        store.save(&feature).unwrap();

        feature.phase = Phase::Plan;
        store.save(&feature).unwrap();

        let loaded = store.load(1).unwrap();
        assert_eq!(loaded.phase, Phase::Plan);
    }

    #[test]
    fn test_stray_temp_file_does_not_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeatureStore::open(dir.path()).unwrap();

        let feature = sample(1);
        store.save(&feature).unwrap();

        // Simulate a crash between temp-write and rename: a stray temp
        // file next to the record must not affect loading or listing.
        let stray = dir.path().join("features").join(".tmpdead01");
        std::fs::write(&stray, b"{ half-written garbage").unwrap();

        let loaded = store.load(1).unwrap();
        assert_eq!(loaded.branch, "001-user-auth");
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn test_list_active_filters_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeatureStore::open(dir.path()).unwrap();

        let mut archived = sample(1);
        archived.phase = Phase::Archived;
        store.save(&archived).unwrap();

        let mut cancelled = sample(2);
        cancelled.phase = Phase::Cancelled;
        store.save(&cancelled).unwrap();

        let active = sample(3);
        store.save(&active).unwrap();

        let listed = store.list_active().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, 3);
    }
}
