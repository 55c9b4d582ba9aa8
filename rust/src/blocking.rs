//! Downstream impact of a blocked task.
//!
//! When a task enters the `blocked` state, every task that transitively
//! depends on it is affected. The report classifies the severity against the
//! current critical path and attaches advisory recommendations produced by a
//! configurable rule table.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::critical_path::CriticalPath;
use crate::error::{DependencyError, Result};
use crate::graph::DependencyGraph;
use crate::log_checks;
use crate::models::TaskStatus;

/// How badly a blocked task affects its scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Impact report for one task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockingImpact {
    pub task_id: String,
    /// False unless the task is currently blocked.
    pub impact: bool,
    /// Transitive dependents, ascending by id.
    pub affected: Vec<String>,
    pub on_critical_path: bool,
    pub severity: Severity,
    /// Advisory estimate in hours, when known.
    pub estimated_delay_hours: Option<f64>,
    pub recommendations: Vec<String>,
}

impl BlockingImpact {
    fn no_impact(task_id: &str, on_critical_path: bool) -> Self {
        Self {
            task_id: task_id.to_string(),
            impact: false,
            affected: Vec::new(),
            on_critical_path,
            severity: Severity::Low,
            estimated_delay_hours: None,
            recommendations: Vec::new(),
        }
    }
}

/// When a recommendation rule fires.
///
/// In TOML: `condition = "has_downstream"`, `condition = { severity_is = "critical" }`
/// or `condition = { delay_exceeds = 8.0 }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCondition {
    SeverityIs(Severity),
    HasDownstream,
    OnCriticalPath,
    /// Fires only when a delay estimate is available and exceeds the hours.
    DelayExceeds(f64),
}

/// A recommendation template and the condition that selects it.
///
/// Templates may use `{task}`, `{count}` and `{delay}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRule {
    pub condition: RuleCondition,
    pub template: String,
}

impl RecommendationRule {
    pub fn new(condition: RuleCondition, template: impl Into<String>) -> Self {
        Self {
            condition,
            template: template.into(),
        }
    }

    fn matches(&self, severity: Severity, count: usize, on_cp: bool, delay: Option<f64>) -> bool {
        match &self.condition {
            RuleCondition::SeverityIs(s) => *s == severity,
            RuleCondition::HasDownstream => count > 0,
            RuleCondition::OnCriticalPath => on_cp,
            RuleCondition::DelayExceeds(hours) => delay.is_some_and(|d| d > *hours),
        }
    }

    fn render(&self, task_id: &str, count: usize, delay: Option<f64>) -> String {
        let delay = delay.map_or_else(|| "unknown".to_string(), |d| format!("{:.1}", d));
        self.template
            .replace("{task}", task_id)
            .replace("{count}", &count.to_string())
            .replace("{delay}", &delay)
    }
}

/// The built-in rule table, in firing order.
pub fn default_rules() -> Vec<RecommendationRule> {
    vec![
        RecommendationRule::new(
            RuleCondition::SeverityIs(Severity::Critical),
            "critical path affected: escalate immediately",
        ),
        RecommendationRule::new(
            RuleCondition::HasDownstream,
            "{count} downstream tasks cannot start",
        ),
        RecommendationRule::new(
            RuleCondition::SeverityIs(Severity::High),
            "downstream work has slack: re-plan dependents of {task} before it runs out",
        ),
        RecommendationRule::new(
            RuleCondition::DelayExceeds(8.0),
            "estimated delay of {delay}h exceeds a working day: consider reassigning {task}",
        ),
    ]
}

/// Computes blocking impact against a graph and its critical path.
pub struct BlockingDetector<'a> {
    graph: &'a DependencyGraph,
    critical_path: &'a CriticalPath,
    rules: &'a [RecommendationRule],
    verbosity: u8,
}

impl<'a> BlockingDetector<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        critical_path: &'a CriticalPath,
        rules: &'a [RecommendationRule],
        verbosity: u8,
    ) -> Self {
        Self {
            graph,
            critical_path,
            rules,
            verbosity,
        }
    }

    /// Impact of `task_id` being blocked, with an optional delay estimate.
    pub fn detect(&self, task_id: &str, estimated_delay_hours: Option<f64>) -> Result<BlockingImpact> {
        let idx = self
            .graph
            .node(task_id)
            .ok_or_else(|| DependencyError::UnknownTask(task_id.to_string()))?;
        let on_critical_path = self.critical_path.is_critical(task_id);

        if self.graph.task(idx).status != TaskStatus::Blocked {
            log_checks!(
                self.verbosity,
                "Task {} is {}, no blocking impact",
                task_id,
                self.graph.task(idx).status
            );
            return Ok(BlockingImpact::no_impact(task_id, on_critical_path));
        }

        let mut affected: Vec<String> = self
            .graph
            .dependents_closure(idx)
            .into_iter()
            .map(|n| self.graph.id_of(n).to_string())
            .collect();
        affected.sort();

        let severity = if on_critical_path {
            Severity::Critical
        } else if !affected.is_empty() {
            Severity::High
        } else {
            Severity::Low
        };

        let count = affected.len();
        let recommendations: Vec<String> = self
            .rules
            .iter()
            .filter(|r| r.matches(severity, count, on_critical_path, estimated_delay_hours))
            .map(|r| r.render(task_id, count, estimated_delay_hours))
            .collect();

        log_checks!(
            self.verbosity,
            "Blocked task {} affects {} downstream tasks (severity {})",
            task_id,
            count,
            severity
        );

        Ok(BlockingImpact {
            task_id: task_id.to_string(),
            impact: true,
            affected,
            on_critical_path,
            severity,
            estimated_delay_hours,
            recommendations,
        })
    }
}
