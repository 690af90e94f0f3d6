//! Implicit dependency inference.
//!
//! A pure pre-processing pass that turns positional conventions in the
//! task list into an explicit edge set, kept separate from graph
//! validation so the policy can change without touching cycle detection.
//!
//! For a task with no explicit dependencies:
//! - its anchor is the nearest preceding non-parallel-safe task in the
//!   same phase; parallel-safe tasks share that anchor instead of
//!   depending on each other
//! - a task with no anchor in its phase depends on every task of the
//!   previous phase (the phase boundary is a barrier)
//! - a task with no anchor in the first occupied phase has no
//!   dependencies

use std::collections::{BTreeMap, BTreeSet};

use crate::task::Task;

/// Compute the explicit dependency set for every task.
///
/// Explicit `depends_on` entries are passed through untouched; inference
/// applies only to tasks that declare none.
pub fn infer_dependencies(tasks: &[Task]) -> BTreeMap<String, BTreeSet<String>> {
    let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    // Tasks of each phase, in list order, for the barrier rule.
    let mut by_phase: BTreeMap<u32, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        by_phase.entry(task.phase_number).or_default().push(task);
    }

    for (idx, task) in tasks.iter().enumerate() {
        if !task.depends_on.is_empty() {
            edges.insert(task.id.clone(), task.depends_on.clone());
            continue;
        }

        let anchor = tasks[..idx]
            .iter()
            .rev()
            .find(|prev| prev.phase_number == task.phase_number && !prev.is_parallel_safe);

        let deps: BTreeSet<String> = if let Some(anchor) = anchor {
            std::iter::once(anchor.id.clone()).collect()
        } else {
            previous_phase(&by_phase, task.phase_number)
                .map(|prev| prev.iter().map(|t| t.id.clone()).collect())
                .unwrap_or_default()
        };

        edges.insert(task.id.clone(), deps);
    }

    edges
}

/// Tasks of the nearest occupied phase before `phase`.
fn previous_phase<'a>(
    by_phase: &'a BTreeMap<u32, Vec<&'a Task>>,
    phase: u32,
) -> Option<&'a Vec<&'a Task>> {
    by_phase.range(..phase).next_back().map(|(_, tasks)| tasks)
}
