//! Feature pipeline phases and transition gates.
//!
//! A feature moves forward through specify → plan → tasks → implement →
//! review → archived. Each transition is guarded by a gate; skipping a
//! gate is rejected without mutating state. `Cancelled` is an out-of-band
//! terminal reachable from any non-archived phase.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::feature::docs::FeatureDocs;
use crate::feature::Feature;
use crate::graph::TaskGraph;
use crate::scheduler::ExecutionScheduler;
use crate::task::Task;

/// Pipeline phase of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Specify,
    Plan,
    Tasks,
    Implement,
    Review,
    Archived,
    Cancelled,
}

impl Phase {
    /// The next phase in the pipeline, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Specify => Some(Self::Plan),
            Self::Plan => Some(Self::Tasks),
            Self::Tasks => Some(Self::Implement),
            Self::Implement => Some(Self::Review),
            Self::Review => Some(Self::Archived),
            Self::Archived | Self::Cancelled => None,
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Archived | Self::Cancelled)
    }

    /// Lowercase name, as persisted and displayed.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Specify => "specify",
            Self::Plan => "plan",
            Self::Tasks => "tasks",
            Self::Implement => "implement",
            Self::Review => "review",
            Self::Archived => "archived",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate checks for phase transitions.
///
/// The controller never mutates a feature itself; it only decides whether
/// a transition is legal and, for the tasks → implement gate, returns the
/// validated task set to persist.
pub struct PhaseController<'a> {
    scheduler: &'a ExecutionScheduler,
}

impl<'a> PhaseController<'a> {
    pub fn new(scheduler: &'a ExecutionScheduler) -> Self {
        Self { scheduler }
    }

    /// Check the gate out of the feature's current phase and return the
    /// target phase. For `Tasks`, the validated task list parsed from the
    /// tasks artifact is returned alongside so the caller can persist it.
    pub fn check_gate(
        &self,
        feature: &Feature,
        docs: &FeatureDocs,
    ) -> Result<(Phase, Option<Vec<Task>>)> {
        let target = feature.phase.next().ok_or(Error::WrongPhase {
            feature: feature.id,
            operation: "advance",
            expected: Phase::Review,
            actual: feature.phase,
        })?;

        match feature.phase {
            Phase::Specify => {
                if !docs.spec_exists() {
                    return Err(self.gate_error(feature, "specification artifact missing"));
                }
                Ok((target, None))
            }
            Phase::Plan => {
                if !docs.plan_exists() {
                    return Err(self.gate_error(feature, "plan artifact missing"));
                }
                Ok((target, None))
            }
            Phase::Tasks => {
                if !docs.tasks_exists() {
                    return Err(self.gate_error(feature, "tasks artifact missing"));
                }
                let tasks = docs.parse_tasks()?;
                if tasks.is_empty() {
                    return Err(self.gate_error(feature, "tasks artifact is empty"));
                }
                // Validates acyclicity and phase ordering before the
                // feature is allowed into implement.
                TaskGraph::build(&tasks)?;
                Ok((target, Some(tasks)))
            }
            Phase::Implement => {
                let graph = TaskGraph::build(&feature.tasks)?;
                if self.scheduler.in_progress(&feature.tasks).next().is_some() {
                    return Err(self.gate_error(
                        feature,
                        "tasks still in progress (report them completed or skipped)",
                    ));
                }
                if !self.scheduler.is_complete(&feature.tasks) {
                    if self.scheduler.has_deadlock(&graph, &feature.tasks) {
                        let blocked = self
                            .scheduler
                            .pending_ids(&feature.tasks)
                            .collect::<Vec<_>>();
                        return Err(Error::DeadlockDetected { blocked });
                    }
                    return Err(self.gate_error(feature, "tasks remain unfinished"));
                }
                Ok((target, None))
            }
            Phase::Review => {
                // Review → archived is driven by the archive operation,
                // which performs the merge before the phase moves.
                Ok((target, None))
            }
            Phase::Archived | Phase::Cancelled => unreachable!("terminal phases have no next()"),
        }
    }

    /// Check that `feature` allows `operation` in phase `expected`.
    pub fn require_phase(
        feature: &Feature,
        operation: &'static str,
        expected: Phase,
    ) -> Result<()> {
        if feature.phase != expected {
            return Err(Error::WrongPhase {
                feature: feature.id,
                operation,
                expected,
                actual: feature.phase,
            });
        }
        Ok(())
    }

    /// Check that a feature can still be cancelled.
    pub fn require_cancellable(feature: &Feature) -> Result<()> {
        if feature.phase == Phase::Archived || feature.phase == Phase::Cancelled {
            return Err(Error::WrongPhase {
                feature: feature.id,
                operation: "discard",
                expected: Phase::Review,
                actual: feature.phase,
            });
        }
        Ok(())
    }

    fn gate_error(&self, feature: &Feature, reason: &str) -> Error {
        Error::PhaseGateNotSatisfied {
            feature: feature.id,
            phase: feature.phase,
            reason: reason.to_string(),
        }
    }
}
