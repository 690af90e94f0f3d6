//! Task records.
//!
//! A task is one schedulable unit of implementation work within a
//! feature. Tasks carry phase/parallelism metadata and an explicit
//! dependency set; their statuses are mutated only by the scheduler.

pub mod parse;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A task scoped to a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task id ("T001", ...), unique within the feature, stable sort key
    pub id: String,

    /// What the task does
    pub description: String,

    /// Phase group this task belongs to (setup, foundational, story-N, ...)
    pub phase_number: u32,

    /// Whether the task may run concurrently with its batch siblings
    pub is_parallel_safe: bool,

    /// Optional story grouping label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_tag: Option<String>,

    /// Ids of tasks that must resolve before this one may start
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,

    /// Current status
    pub status: TaskStatus,

    /// Paths the task is expected to touch (hint only, not enforced)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub file_targets: BTreeSet<String>,

    /// Free-text completion summary from the external collaborator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Task {
    /// Whether the task has reached a terminal status.
    pub fn is_resolved(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl TaskStatus {
    /// Completed and skipped are terminal; no transition leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome reported for a dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed,
    Skipped,
}

impl TaskOutcome {
    pub fn as_status(self) -> TaskStatus {
        match self {
            Self::Completed => TaskStatus::Completed,
            Self::Skipped => TaskStatus::Skipped,
        }
    }
}

impl std::str::FromStr for TaskOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" | "complete" | "done" => Ok(Self::Completed),
            "skipped" | "skip" => Ok(Self::Skipped),
            other => Err(format!("unknown outcome '{other}' (expected completed or skipped)")),
        }
    }
}
