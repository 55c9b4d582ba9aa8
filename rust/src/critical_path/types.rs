//! Types for critical path analysis.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance for floating point comparisons of hour values.
pub const EPSILON: f64 = 1e-9;

/// Per-task timing information from the forward and backward passes (hours).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskTiming {
    /// Earliest possible start time (from forward pass).
    pub earliest_start: f64,
    /// Earliest possible finish time (from forward pass).
    pub earliest_finish: f64,
    /// Latest allowable start time (from backward pass).
    pub latest_start: f64,
    /// Latest allowable finish time (from backward pass).
    pub latest_finish: f64,
    /// Slack = latest_start - earliest_start.
    pub slack: f64,
}

impl TaskTiming {
    pub fn is_critical(&self) -> bool {
        self.slack.abs() < EPSILON
    }
}

/// Tasks that share an earliest start and have no dependency among them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParallelGroup {
    pub earliest_start: f64,
    /// Member task ids, ascending.
    pub task_ids: Vec<String>,
}

/// Result of a critical path calculation for one scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CriticalPath {
    pub scope_id: String,
    /// Graph revision this result was computed from.
    pub revision: u64,
    /// Zero-slack task ids in execution order.
    pub tasks: Vec<String>,
    /// Latest earliest-finish over all tasks.
    pub project_duration: f64,
    /// Slack per task id.
    pub slack: BTreeMap<String, f64>,
    /// Full timing per task id.
    pub timings: BTreeMap<String, TaskTiming>,
    /// Parallelization candidates, ordered by earliest start.
    pub parallel_groups: Vec<ParallelGroup>,
}

impl CriticalPath {
    pub fn is_critical(&self, task_id: &str) -> bool {
        self.timings
            .get(task_id)
            .map(TaskTiming::is_critical)
            .unwrap_or(false)
    }

    pub fn slack_of(&self, task_id: &str) -> Option<f64> {
        self.slack.get(task_id).copied()
    }

    pub fn timing(&self, task_id: &str) -> Option<&TaskTiming> {
        self.timings.get(task_id)
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }
}
