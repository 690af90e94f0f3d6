//! Workspace artifact documents.
//!
//! Each feature workspace carries three markdown artifacts that gate the
//! pipeline: `spec.md`, `plan.md`, and `tasks.md`, kept under
//! `specs/{branch}/` inside the worktree so artifacts from different
//! features never collide once merged into the same target branch. Their
//! content is written by the external collaborator; the orchestrator only
//! seeds templates, probes for existence, and parses the task list.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::task::{parse, Task};

/// Artifact paths and probes for one feature workspace.
#[derive(Debug, Clone)]
pub struct FeatureDocs {
    /// Artifact directory: `{workspace}/specs/{branch}`
    dir: PathBuf,
}

impl FeatureDocs {
    pub fn new(workspace: &Path, branch: &str) -> Self {
        Self {
            dir: workspace.join("specs").join(branch),
        }
    }

    /// Artifact directory for this feature.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the specification artifact.
    pub fn spec_path(&self) -> PathBuf {
        self.dir.join("spec.md")
    }

    /// Path of the plan artifact.
    pub fn plan_path(&self) -> PathBuf {
        self.dir.join("plan.md")
    }

    /// Path of the task list artifact.
    pub fn tasks_path(&self) -> PathBuf {
        self.dir.join("tasks.md")
    }

    pub fn spec_exists(&self) -> bool {
        self.spec_path().is_file()
    }

    pub fn plan_exists(&self) -> bool {
        self.plan_path().is_file()
    }

    pub fn tasks_exists(&self) -> bool {
        self.tasks_path().is_file()
    }

    /// Parse the tasks artifact into task records.
    pub fn parse_tasks(&self) -> Result<Vec<Task>> {
        let content = std::fs::read_to_string(self.tasks_path())?;
        parse::parse_tasks(&content)
    }

    /// Seed the specification template if not present.
    pub fn seed_spec(&self, feature_name: &str) -> Result<()> {
        self.write_if_missing(&self.spec_path(), &spec_template(feature_name))
    }

    /// Seed the plan template if not present.
    pub fn seed_plan(&self, feature_name: &str) -> Result<()> {
        self.write_if_missing(&self.plan_path(), &plan_template(feature_name))
    }

    /// Seed the tasks template if not present.
    pub fn seed_tasks(&self, feature_name: &str) -> Result<()> {
        self.write_if_missing(&self.tasks_path(), &parse::tasks_template(feature_name))
    }

    fn write_if_missing(&self, path: &Path, content: &str) -> Result<()> {
        if !path.exists() {
            std::fs::create_dir_all(&self.dir)?;
            std::fs::write(path, content)?;
        }
        Ok(())
    }
}

/// Generate the specification markdown template.
pub fn spec_template(name: &str) -> String {
    format!(
        r#"# Specification: {name}

## Summary

[What this feature does and why]

## Requirements

- [ ] Requirement 1
- [ ] Requirement 2

## Acceptance Criteria

- [ ] Criterion 1
- [ ] Criterion 2

## Out of Scope

- [What this feature explicitly does not cover]
"#
    )
}

/// Generate the plan markdown template.
pub fn plan_template(name: &str) -> String {
    format!(
        r#"# Plan: {name}

## Approach

[Technical approach and key decisions]

## Affected Areas

- `src/`

## Risks

- [Known risks and mitigations]
"#
    )
}
