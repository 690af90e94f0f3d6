//! Monotonic feature id allocation.
//!
//! Ids come from a dedicated counter record rather than being re-derived
//! by scanning directories or branches, so an id is never handed out
//! twice even after features are archived or discarded. The counter is
//! written through the same atomic-rename discipline as feature records.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::write_atomic;
use crate::error::Result;

/// Counter record persisted as `allocator.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AllocatorRecord {
    /// Next id to hand out
    next_id: u32,
}

impl Default for AllocatorRecord {
    fn default() -> Self {
        Self { next_id: 1 }
    }
}

/// Allocator for sequential, never-reused feature ids.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    path: PathBuf,
}

impl IdAllocator {
    /// Open (creating if needed) the allocator under a state directory.
    pub fn open(state_dir: &Path) -> Result<Self> {
        fs::create_dir_all(state_dir)?;
        Ok(Self {
            path: state_dir.join("allocator.json"),
        })
    }

    /// Allocate the next id. The incremented counter is persisted before
    /// the id is returned, so a crash cannot cause reuse.
    pub fn next(&self) -> Result<u32> {
        let record = self.load()?;
        let id = record.next_id;
        let updated = AllocatorRecord { next_id: id + 1 };
        let content = serde_json::to_string_pretty(&updated)?;
        write_atomic(&self.path, content.as_bytes())?;
        debug!(id, "feature id allocated");
        Ok(id)
    }

    /// Peek at the next id without allocating it.
    pub fn peek(&self) -> Result<u32> {
        Ok(self.load()?.next_id)
    }

    fn load(&self) -> Result<AllocatorRecord> {
        if !self.path.is_file() {
            return Ok(AllocatorRecord::default());
        }
        let content = fs::read_to_string(&self.path)?;
        let record = serde_json::from_str(&content)?;
        Ok(record)
    }
}
