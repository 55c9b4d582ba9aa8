//! Scoring functions for ranking ready tasks.

use serde::{Deserialize, Serialize};

use crate::config::SchedulingConfig;
use crate::models::Task;

/// Weighted components of a task's score.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub priority: f64,
    pub critical_path: f64,
    pub slack: f64,
    pub effort: f64,
    pub affinity: f64,
    pub total: f64,
}

/// Divide by a reference ceiling and clamp into `[0, 1]`.
#[inline]
pub fn normalize(value: f64, ceiling: f64) -> f64 {
    (value / ceiling).clamp(0.0, 1.0)
}

/// Score a ready task.
///
/// Formula:
/// `w_p * priority/P + w_c * critical + w_s * (1 - slack/S) + w_e * (1 - effort/E)`
/// plus the affinity bonus when the requesting agent type matches.
///
/// Higher score = better task to hand out first.
pub fn score_task(
    task: &Task,
    on_critical_path: bool,
    slack_hours: f64,
    config: &SchedulingConfig,
    agent_type: Option<&str>,
) -> ScoreBreakdown {
    let priority =
        config.priority_weight * normalize(task.priority as f64, config.priority_ceiling);
    let critical_path = if on_critical_path {
        config.critical_path_weight
    } else {
        0.0
    };
    let slack =
        config.slack_weight * (1.0 - normalize(slack_hours, config.slack_ceiling_hours));
    let effort =
        config.effort_weight * (1.0 - normalize(task.effort_hours, config.effort_ceiling_hours));
    let affinity = match agent_type {
        Some(agent) if config.has_affinity(&task.task_type, agent) => config.affinity_bonus,
        _ => 0.0,
    };

    ScoreBreakdown {
        priority,
        critical_path,
        slack,
        effort,
        affinity,
        total: priority + critical_path + slack + effort + affinity,
    }
}
