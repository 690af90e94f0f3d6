//! Feature records and pipeline phases.
//!
//! A feature is one tracked unit of work: an id, a slug, a branch, the
//! pipeline phase it has reached, an optional bound workspace, and the
//! task list created for its implement stage.

pub mod docs;
pub mod phase;
pub mod slug;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use docs::FeatureDocs;
pub use phase::{Phase, PhaseController};

use crate::task::Task;

/// One tracked unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    /// Sequential id, globally unique, never reused
    pub id: u32,

    /// Normalized short name
    pub slug: String,

    /// Branch name: `{id:03}-{slug}`
    pub branch: String,

    /// Pipeline phase
    pub phase: Phase,

    /// Bound workspace directory; present only while the feature is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<PathBuf>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Tasks for the implement stage; empty until the feature passes the
    /// tasks gate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
}

impl Feature {
    /// Create a new feature record in the initial phase.
    pub fn new(id: u32, slug: String, branch: String, workspace_path: PathBuf) -> Self {
        Self {
            id,
            slug,
            branch,
            phase: Phase::Specify,
            workspace_path: Some(workspace_path),
            created_at: Utc::now(),
            tasks: Vec::new(),
        }
    }

    /// Whether the feature is still active (not archived or cancelled).
    pub fn is_active(&self) -> bool {
        !self.phase.is_terminal()
    }

    /// Display name derived from the slug.
    pub fn name(&self) -> String {
        self.slug.replace('-', " ")
    }

    /// Look up a task by id.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Look up a task by id, mutably.
    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// Count of tasks in a terminal status.
    pub fn resolved_task_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_resolved()).count()
    }

    /// Compact progress string for display, e.g. `3/7`.
    pub fn progress_string(&self) -> String {
        format!("{}/{}", self.resolved_task_count(), self.tasks.len())
    }
}
