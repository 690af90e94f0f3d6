//! Crate-wide error types.
//!
//! Validation and conflict errors are raised before any mutation; IO and
//! git failures propagate with context so the caller can act on them.

use std::path::PathBuf;

use thiserror::Error;

use crate::feature::Phase;
use crate::task::TaskStatus;

/// Result type for orchestration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during feature orchestration.
#[derive(Debug, Error)]
pub enum Error {
    /// Feature record not found in the store.
    #[error("Feature {0:03} not found")]
    FeatureNotFound(u32),

    /// Name hint produced an empty or malformed slug.
    #[error("Cannot derive a slug from '{0}'")]
    InvalidSlug(String),

    /// Derived branch name does not match the required pattern.
    #[error("Branch name '{0}' does not match NNN-slug pattern")]
    InvalidBranch(String),

    /// Branch already exists in the repository.
    #[error("Branch '{0}' already exists")]
    BranchExists(String),

    /// Workspace path already exists on disk.
    #[error("Workspace path already exists: {0}")]
    PathExists(PathBuf),

    /// The configured base branch is missing.
    #[error("Base branch '{0}' not found in repository")]
    BaseBranchMissing(String),

    /// A trial merge reported conflicts and force was not given.
    #[error("Merging '{branch}' into '{target}' would conflict in {} file(s)", .paths.len())]
    WouldConflict {
        branch: String,
        target: String,
        paths: Vec<String>,
    },

    /// Workspace has uncommitted modifications and force was not given.
    #[error("Workspace for '{0}' has uncommitted changes (use force to discard)")]
    DirtyWorkspace(String),

    /// A task references a dependency that does not exist.
    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    /// The dependency relation contains a cycle.
    #[error("Cyclic dependency involving tasks: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    /// A task depends on a task in a strictly later phase.
    #[error("Task {task} (phase {phase}) depends on {dependency} in later phase {dependency_phase}")]
    ForwardDependency {
        task: String,
        phase: u32,
        dependency: String,
        dependency_phase: u32,
    },

    /// A phase transition precondition is not met.
    #[error("Feature {feature:03} cannot leave phase '{phase}': {reason}")]
    PhaseGateNotSatisfied {
        feature: u32,
        phase: Phase,
        reason: String,
    },

    /// An operation is not legal in the feature's current phase.
    #[error("Feature {feature:03} is in phase '{actual}', but '{operation}' requires phase '{expected}'")]
    WrongPhase {
        feature: u32,
        operation: &'static str,
        expected: Phase,
        actual: Phase,
    },

    /// A task status transition is not legal.
    #[error("Task {task} is '{actual}', expected '{expected}'")]
    InvalidTransition {
        task: String,
        expected: TaskStatus,
        actual: TaskStatus,
    },

    /// Referenced task id does not exist in the feature.
    #[error("Unknown task id: {0}")]
    UnknownTask(String),

    /// No ready tasks remain but pending tasks do.
    #[error("Deadlock: no ready tasks, {} pending task(s) blocked: {}", .blocked.len(), .blocked.join(", "))]
    DeadlockDetected { blocked: Vec<String> },

    /// Malformed tasks artifact.
    #[error("Invalid tasks artifact: {0}")]
    InvalidTasksArtifact(String),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying git operation failed.
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Record (de)serialization failure.
    #[error("Record serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Configuration file failure.
    #[error("Configuration error: {0}")]
    Config(String),
}
