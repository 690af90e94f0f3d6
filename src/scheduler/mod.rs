//! Task execution scheduling.
//!
//! Computes the next batch of dispatchable tasks and applies status
//! transitions reported by the caller. Dispatch follows a
//! narrow-then-wide shape: at most one non-parallel-safe task is in
//! flight at a time, while all ready parallel-safe tasks are offered
//! together as one batch.

use tracing::{debug, info};

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::graph::TaskGraph;
use crate::task::{Task, TaskOutcome, TaskStatus};

/// Scheduler over one feature's task graph.
#[derive(Debug, Clone)]
pub struct ExecutionScheduler {
    /// Whether a skipped dependency counts as resolved for unblocking
    skipped_unblocks: bool,
}

impl ExecutionScheduler {
    pub fn new(skipped_unblocks: bool) -> Self {
        Self { skipped_unblocks }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.skipped_unblocks)
    }

    /// Compute the next batch of tasks and mark them in progress.
    ///
    /// Ordering: lower phase first, non-parallel before parallel within a
    /// phase, ties broken by ascending id. Repeated calls without an
    /// intervening report return the same batch (in-flight tasks are
    /// re-offered, nothing new is dispatched past them).
    pub fn next_batch(&self, graph: &TaskGraph, tasks: &mut [Task]) -> Vec<String> {
        let mut in_flight: Vec<String> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .map(|t| t.id.clone())
            .collect();
        self.sort_batch(graph, &mut in_flight);

        // A dispatched non-parallel task must be reported before anything
        // else is offered.
        if in_flight
            .iter()
            .any(|id| graph.node(id).is_some_and(|n| !n.is_parallel_safe))
        {
            return in_flight;
        }

        let partition = graph.partition(tasks, self.skipped_unblocks);
        let mut ready = partition.ready;
        self.sort_batch(graph, &mut ready);

        let dispatch: Vec<String> = if in_flight.is_empty() {
            let narrow = ready
                .first()
                .is_some_and(|id| graph.node(id).is_some_and(|n| !n.is_parallel_safe));
            if ready.is_empty() {
                Vec::new()
            } else if narrow {
                vec![ready[0].clone()]
            } else {
                ready
                    .into_iter()
                    .filter(|id| graph.node(id).is_some_and(|n| n.is_parallel_safe))
                    .collect()
            }
        } else {
            // Parallel work in flight: widen the batch with newly ready
            // parallel tasks, but hold back non-parallel ones.
            ready
                .into_iter()
                .filter(|id| graph.node(id).is_some_and(|n| n.is_parallel_safe))
                .collect()
        };

        for id in &dispatch {
            if let Some(task) = tasks.iter_mut().find(|t| &t.id == id) {
                task.status = TaskStatus::InProgress;
                debug!(task = %id, "task dispatched");
            }
        }

        let mut batch = in_flight;
        batch.extend(dispatch);
        self.sort_batch(graph, &mut batch);
        batch
    }

    /// Apply a reported outcome to a dispatched task.
    ///
    /// Only `in_progress -> completed | skipped` is legal; anything else
    /// is rejected without mutating state.
    pub fn report(
        &self,
        tasks: &mut [Task],
        task_id: &str,
        outcome: TaskOutcome,
        reason: Option<&str>,
    ) -> Result<()> {
        let task = tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| Error::UnknownTask(task_id.to_string()))?;

        if task.status != TaskStatus::InProgress {
            return Err(Error::InvalidTransition {
                task: task_id.to_string(),
                expected: TaskStatus::InProgress,
                actual: task.status,
            });
        }

        task.status = outcome.as_status();
        if let Some(reason) = reason {
            task.summary = Some(reason.to_string());
        }
        info!(task = %task_id, status = %task.status, "task reported");
        Ok(())
    }

    /// Whether every task has reached a terminal status.
    pub fn is_complete(&self, tasks: &[Task]) -> bool {
        tasks.iter().all(Task::is_resolved)
    }

    /// Whether pending tasks remain that can never become ready.
    ///
    /// True when nothing is ready, nothing is in flight, and pending
    /// tasks remain. Surfaced to the caller; never auto-resolved.
    pub fn has_deadlock(&self, graph: &TaskGraph, tasks: &[Task]) -> bool {
        if self.in_progress(tasks).next().is_some() {
            return false;
        }
        let partition = graph.partition(tasks, self.skipped_unblocks);
        partition.ready.is_empty() && self.pending_ids(tasks).next().is_some()
    }

    /// Ids of tasks currently in progress.
    pub fn in_progress<'a>(&self, tasks: &'a [Task]) -> impl Iterator<Item = &'a str> {
        tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .map(|t| t.id.as_str())
    }

    /// Ids of tasks still pending.
    pub fn pending_ids<'a>(&self, tasks: &'a [Task]) -> impl Iterator<Item = String> + 'a {
        tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id.clone())
    }

    /// Sort a batch by phase, non-parallel first, then id.
    fn sort_batch(&self, graph: &TaskGraph, batch: &mut [String]) {
        batch.sort_by_key(|id| {
            graph
                .node(id)
                .map(|n| (n.phase_number, n.is_parallel_safe, id.clone()))
                .unwrap_or((u32::MAX, true, id.clone()))
        });
    }
}
