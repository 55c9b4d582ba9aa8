//! Graph export for visualization tooling.

use serde::{Deserialize, Serialize};

use crate::critical_path::CriticalPath;
use crate::graph::DependencyGraph;
use crate::models::{DependencyKind, TaskStatus};

/// A task with its schedule annotations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: TaskStatus,
    pub task_type: String,
    pub effort_hours: f64,
    pub priority: u8,
    pub earliest_start: f64,
    pub slack_hours: f64,
    pub critical: bool,
}

/// A dependency, drawn from prerequisite to dependent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportEdge {
    pub from: String,
    pub to: String,
    pub kind: DependencyKind,
    pub lag_hours: f64,
    pub mandatory: bool,
}

/// Nodes and edges of one scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub scope_id: String,
    pub project_duration: f64,
    pub critical_path: Vec<String>,
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<ExportEdge>,
}

impl GraphExport {
    /// Nodes sorted by id; edges sorted by (prerequisite, dependent, kind).
    pub fn build(graph: &DependencyGraph, critical_path: &CriticalPath) -> Self {
        let snapshot = graph.snapshot();
        let nodes = snapshot
            .nodes
            .into_iter()
            .map(|task| {
                let timing = critical_path.timing(&task.id).cloned().unwrap_or_default();
                ExportNode {
                    critical: timing.is_critical(),
                    earliest_start: timing.earliest_start,
                    slack_hours: timing.slack,
                    id: task.id,
                    title: task.title,
                    status: task.status,
                    task_type: task.task_type,
                    effort_hours: task.effort_hours,
                    priority: task.priority,
                }
            })
            .collect();
        let edges = snapshot
            .edges
            .into_iter()
            .map(|dep| ExportEdge {
                from: dep.prerequisite_id,
                to: dep.dependent_id,
                kind: dep.kind,
                lag_hours: dep.lag_hours,
                mandatory: dep.mandatory,
            })
            .collect();

        Self {
            scope_id: snapshot.scope_id,
            project_duration: critical_path.project_duration,
            critical_path: critical_path.tasks.clone(),
            nodes,
            edges,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
