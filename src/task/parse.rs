//! Tasks artifact parsing.
//!
//! The `tasks.md` artifact is a markdown task list grouped into phases:
//!
//! ```markdown
//! # Tasks: User Authentication
//!
//! ## Phase 1: Setup
//!
//! - [ ] T001 Create auth module scaffolding in `src/auth/mod.rs`
//! - [ ] T002 [P] [US1] Add password hashing (depends: T001) `src/auth/hash.rs`
//! ```
//!
//! `[P]` marks a task parallel-safe, a second bracket tag is the story
//! label, `(depends: ...)` lists explicit dependencies, and backtick
//! paths become file target hints. Checkbox state maps to status so a
//! hand-maintained file can be re-imported: `[ ]` pending, `[x]`
//! completed, `[-]` skipped.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Task, TaskStatus};
use crate::error::{Error, Result};

static TASK_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^T[0-9]{3}$").expect("valid id regex"));

static TASK_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^- \[(?<check>[ xX-])\] (?<id>T[0-9]{3}) (?<rest>.+)$").expect("valid task regex")
});

static DEPENDS_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(depends:\s*(?<ids>[^)]*)\)").expect("valid depends regex"));

/// Parse a tasks artifact into task records.
///
/// Tasks keep their file order; ids must be unique. A line that looks
/// like a task entry but does not parse is an error rather than being
/// silently dropped.
pub fn parse_tasks(content: &str) -> Result<Vec<Task>> {
    let mut tasks: Vec<Task> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut current_phase: u32 = 1;

    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.trim();

        // Phase header (## Phase N: Name)
        if let Some(header) = line.strip_prefix("## ") {
            if let Some(rest) = header.strip_prefix("Phase ") {
                let num_str = rest.split(|c: char| !c.is_ascii_digit()).next().unwrap_or("");
                current_phase = num_str.parse().map_err(|_| {
                    Error::InvalidTasksArtifact(format!(
                        "line {}: phase header without a number: '{line}'",
                        lineno + 1
                    ))
                })?;
            }
            continue;
        }

        let Some(caps) = TASK_LINE.captures(line) else {
            // Not a task entry; tolerate prose, titles, and blank lines.
            if line.starts_with("- [") {
                return Err(Error::InvalidTasksArtifact(format!(
                    "line {}: malformed task entry: '{line}'",
                    lineno + 1
                )));
            }
            continue;
        };

        let id = caps["id"].to_string();
        if !seen.insert(id.clone()) {
            return Err(Error::InvalidTasksArtifact(format!(
                "line {}: duplicate task id {id}",
                lineno + 1
            )));
        }

        let status = match &caps["check"] {
            "x" | "X" => TaskStatus::Completed,
            "-" => TaskStatus::Skipped,
            _ => TaskStatus::Pending,
        };

        tasks.push(parse_entry(&id, &caps["rest"], current_phase, status));
    }

    Ok(tasks)
}

/// Parse the part of a task line after the id.
fn parse_entry(id: &str, rest: &str, phase_number: u32, status: TaskStatus) -> Task {
    let mut rest = rest.trim().to_string();
    let mut is_parallel_safe = false;
    let mut story_tag = None;

    // Leading bracket tags: [P] and/or a story label like [US1].
    while rest.starts_with('[') {
        let Some(end) = rest.find(']') else { break };
        let tag = rest[1..end].to_string();
        if tag == "P" {
            is_parallel_safe = true;
        } else if story_tag.is_none() && !tag.is_empty() && !tag.contains(' ') {
            story_tag = Some(tag);
        } else {
            break;
        }
        rest = rest[end + 1..].trim_start().to_string();
    }

    // Explicit dependency clause.
    let mut depends_on = BTreeSet::new();
    let clause = DEPENDS_CLAUSE.captures(&rest).map(|caps| {
        let ids: Vec<String> = caps["ids"]
            .split(',')
            .map(|dep| dep.trim().to_string())
            .filter(|dep| !dep.is_empty())
            .collect();
        (ids, caps.get(0).expect("whole match").range())
    });
    if let Some((ids, range)) = clause {
        depends_on.extend(ids);
        rest.replace_range(range, "");
    }

    // Backtick paths become file target hints.
    let mut file_targets = BTreeSet::new();
    let mut parts = rest.split('`');
    let mut description = String::from(parts.next().unwrap_or("").trim_end());
    while let (Some(path), tail) = (parts.next(), parts.next()) {
        if !path.trim().is_empty() {
            file_targets.insert(path.trim().to_string());
        }
        if let Some(tail) = tail {
            let tail = tail.trim();
            if !tail.is_empty() {
                if !description.is_empty() {
                    description.push(' ');
                }
                description.push_str(tail);
            }
        }
    }

    let description = description.trim().trim_end_matches(',').trim().to_string();

    Task {
        id: id.to_string(),
        description,
        phase_number,
        is_parallel_safe,
        story_tag,
        depends_on,
        status,
        file_targets,
        summary: None,
    }
}

/// Validate a task id against the `Tnnn` pattern.
pub fn is_valid_task_id(id: &str) -> bool {
    TASK_ID.is_match(id)
}

/// Generate the tasks markdown template.
pub fn tasks_template(feature_name: &str) -> String {
    format!(
        r#"# Tasks: {feature_name}

## Phase 1: Setup

- [ ] T001 Project scaffolding for the feature

## Phase 2: Implementation

- [ ] T002 First unit of work
- [ ] T003 [P] Parallel-safe unit of work

## Phase 3: Polish

- [ ] T004 Documentation and cleanup
"#
    )
}
