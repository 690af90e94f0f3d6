//! Task dependency graph.
//!
//! Builds nodes and edges from task records (inferring implicit edges
//! first), validates the result, and partitions tasks into
//! resolved/ready/blocked given their current statuses.

pub mod infer;

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::task::{Task, TaskStatus};

/// Per-task metadata kept by the graph.
#[derive(Debug, Clone)]
pub struct TaskNode {
    /// Phase group of the task
    pub phase_number: u32,

    /// Whether the task may run concurrently with batch siblings
    pub is_parallel_safe: bool,

    /// Resolved dependency set (explicit plus inferred)
    pub depends_on: BTreeSet<String>,
}

/// Validated dependency graph over one feature's tasks.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: BTreeMap<String, TaskNode>,
}

/// DFS visit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InStack,
    Done,
}

/// Partition of tasks given their current statuses.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Terminal tasks (completed, plus skipped under the default policy)
    pub resolved: BTreeSet<String>,

    /// Pending tasks whose dependencies are all resolved
    pub ready: Vec<String>,

    /// Remaining pending tasks, each with its unresolved blocking set
    pub blocked: BTreeMap<String, BTreeSet<String>>,
}

impl TaskGraph {
    /// Build and validate a graph from task records.
    ///
    /// Runs the inference pass, then rejects unknown dependency ids,
    /// dependencies on a strictly later phase, and cycles.
    pub fn build(tasks: &[Task]) -> Result<Self> {
        let edges = infer::infer_dependencies(tasks);

        let mut nodes = BTreeMap::new();
        for task in tasks {
            let depends_on = edges.get(&task.id).cloned().unwrap_or_default();
            nodes.insert(
                task.id.clone(),
                TaskNode {
                    phase_number: task.phase_number,
                    is_parallel_safe: task.is_parallel_safe,
                    depends_on,
                },
            );
        }

        let graph = Self { nodes };
        graph.validate()?;
        Ok(graph)
    }

    fn validate(&self) -> Result<()> {
        // Unknown and forward dependencies first; cycle detection assumes
        // every edge endpoint exists.
        for (id, node) in &self.nodes {
            for dep in &node.depends_on {
                let dep_node = self.nodes.get(dep).ok_or_else(|| Error::UnknownDependency {
                    task: id.clone(),
                    dependency: dep.clone(),
                })?;
                if dep_node.phase_number > node.phase_number {
                    return Err(Error::ForwardDependency {
                        task: id.clone(),
                        phase: node.phase_number,
                        dependency: dep.clone(),
                        dependency_phase: dep_node.phase_number,
                    });
                }
            }
        }

        self.check_cycles()
    }

    /// DFS cycle detection. Reports the ids on the first cycle found.
    fn check_cycles(&self) -> Result<()> {
        let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
        let mut path: Vec<&str> = Vec::new();

        for start in self.nodes.keys() {
            if !marks.contains_key(start.as_str()) {
                self.dfs(start, &mut marks, &mut path)?;
            }
        }
        Ok(())
    }

    fn dfs<'a>(
        &'a self,
        id: &'a str,
        marks: &mut BTreeMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Result<()> {
        marks.insert(id, Mark::InStack);
        path.push(id);

        for dep in &self.nodes[id].depends_on {
            match marks.get(dep.as_str()) {
                None => self.dfs(dep, marks, path)?,
                Some(Mark::InStack) => {
                    // Back edge: everything on the path from dep onward is
                    // on the cycle.
                    let mut cycle: Vec<String> = path
                        .iter()
                        .skip_while(|node| *node != dep)
                        .map(|node| (*node).to_string())
                        .collect();
                    cycle.sort();
                    return Err(Error::CyclicDependency(cycle));
                }
                Some(Mark::Done) => {}
            }
        }

        path.pop();
        marks.insert(id, Mark::Done);
        Ok(())
    }

    /// Look up a node.
    pub fn node(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.get(id)
    }

    /// Number of tasks in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Partition tasks into resolved/ready/blocked given their statuses.
    ///
    /// `skipped_unblocks` controls whether a skipped dependency counts as
    /// resolved for unblocking purposes. Tasks currently in progress are
    /// dispatched and belong to no partition bucket.
    pub fn partition(&self, tasks: &[Task], skipped_unblocks: bool) -> Partition {
        let mut partition = Partition::default();

        for task in tasks {
            let counts = match task.status {
                TaskStatus::Completed => true,
                TaskStatus::Skipped => skipped_unblocks,
                TaskStatus::Pending | TaskStatus::InProgress => false,
            };
            if counts {
                partition.resolved.insert(task.id.clone());
            }
        }

        for task in tasks {
            if task.status != TaskStatus::Pending {
                continue;
            }
            let Some(node) = self.nodes.get(&task.id) else {
                continue;
            };
            let unresolved: BTreeSet<String> = node
                .depends_on
                .iter()
                .filter(|dep| !partition.resolved.contains(*dep))
                .cloned()
                .collect();
            if unresolved.is_empty() {
                partition.ready.push(task.id.clone());
            } else {
                partition.blocked.insert(task.id.clone(), unresolved);
            }
        }

        partition
    }
}
