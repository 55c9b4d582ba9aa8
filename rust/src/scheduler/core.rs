//! Ready-task selection and ranking.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::SchedulingConfig;
use crate::critical_path::CriticalPath;
use crate::graph::{DependencyGraph, NodeIdx};
use crate::models::{Task, TaskStatus};
use crate::{log_checks, log_debug};

use super::readiness::{is_ready, unmet_start_dependencies};
use super::scoring::{score_task, ScoreBreakdown};

/// A ready task together with the score that placed it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedTask {
    pub task: Task,
    pub score: ScoreBreakdown,
}

/// Sort key: higher score first, then ascending task id.
#[derive(Debug, Clone)]
struct RankKey<'g> {
    neg_score: f64,
    task_id: &'g str,
    idx: NodeIdx,
    score: ScoreBreakdown,
}

impl PartialEq for RankKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankKey<'_> {}

impl Ord for RankKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_f64(self.neg_score, other.neg_score).then(self.task_id.cmp(other.task_id))
    }
}

impl PartialOrd for RankKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Picks the next tasks to hand out within one scope.
///
/// Borrows the graph and an already computed critical path; it never mutates
/// either.
pub struct TaskScheduler<'a> {
    graph: &'a DependencyGraph,
    critical_path: &'a CriticalPath,
    config: &'a SchedulingConfig,
    verbosity: u8,
}

impl<'a> TaskScheduler<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        critical_path: &'a CriticalPath,
        config: &'a SchedulingConfig,
        verbosity: u8,
    ) -> Self {
        Self {
            graph,
            critical_path,
            config,
            verbosity,
        }
    }

    /// Accepted tasks whose mandatory start gates are open, in node order.
    pub fn ready_tasks(&self) -> Vec<NodeIdx> {
        let mut ready = Vec::new();
        for idx in self.graph.nodes() {
            let task = self.graph.task(idx);
            if task.status != TaskStatus::Accepted {
                continue;
            }
            if is_ready(self.graph, idx) {
                ready.push(idx);
            } else if self.verbosity >= crate::logging::VERBOSITY_CHECKS {
                let blockers: Vec<String> = unmet_start_dependencies(self.graph, idx)
                    .into_iter()
                    .map(|d| format!("{} ({})", d.prerequisite_id, d.kind))
                    .collect();
                log_checks!(
                    self.verbosity,
                    "Task {} not ready, waiting on: {}",
                    task.id,
                    blockers.join(", ")
                );
            }
        }
        ready
    }

    /// Ready tasks ordered by score, each with its score breakdown.
    pub fn rank(&self, agent_type: Option<&str>) -> Vec<RankedTask> {
        let mut keys: Vec<RankKey<'_>> = self
            .ready_tasks()
            .into_iter()
            .map(|idx| {
                let task = self.graph.task(idx);
                let score = score_task(
                    task,
                    self.critical_path.is_critical(&task.id),
                    self.critical_path.slack_of(&task.id).unwrap_or(0.0),
                    self.config,
                    agent_type,
                );
                log_debug!(
                    self.verbosity,
                    "Task {} score={:.4} (priority={:.3} critical={:.3} slack={:.3} effort={:.3} affinity={:.3})",
                    task.id,
                    score.total,
                    score.priority,
                    score.critical_path,
                    score.slack,
                    score.effort,
                    score.affinity
                );
                RankKey {
                    neg_score: -score.total,
                    task_id: task.id.as_str(),
                    idx,
                    score,
                }
            })
            .collect();

        keys.sort();

        keys.into_iter()
            .map(|k| RankedTask {
                task: self.graph.task(k.idx).clone(),
                score: k.score,
            })
            .collect()
    }

    /// Ready tasks ordered by score.
    pub fn next_tasks(&self, agent_type: Option<&str>) -> Vec<Task> {
        self.rank(agent_type).into_iter().map(|r| r.task).collect()
    }
}
