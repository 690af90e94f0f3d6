//! # Treeline
//!
//! Feature workflow orchestrator - drive features from spec to merge
//! through isolated worktrees.
//!
//! Treeline tracks in-progress features, binds each one to an isolated
//! Git worktree, and walks it through an ordered pipeline of phases
//! (specify → plan → tasks → implement → review → archive) while
//! scheduling a dependency-ordered task list inside the implement stage.
//!
//! ## Quick Start
//!
//! ```bash
//! # Install
//! cargo install treeline
//!
//! # Start a feature
//! treeline new "user authentication"
//!
//! # Or use the short alias
//! tlr new "user authentication"
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::redundant_else)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::use_self)]

pub mod config;
pub mod error;
pub mod feature;
pub mod graph;
pub mod orchestrator;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod workspace;

pub use config::Config;
pub use error::{Error, Result};
pub use feature::{Feature, FeatureDocs, Phase, PhaseController};
pub use graph::{Partition, TaskGraph};
pub use orchestrator::Orchestrator;
pub use scheduler::ExecutionScheduler;
pub use store::{FeatureStore, IdAllocator};
pub use task::{Task, TaskOutcome, TaskStatus};
pub use workspace::{MergeReport, Workspace, WorkspaceManager, WorkspaceStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "treeline";

/// Short alias
pub const APP_ALIAS: &str = "tlr";
