//! Dependency satisfaction rules.
//!
//! Start-gated kinds decide whether a dependent may be scheduled; finish-gated
//! kinds only constrain when it may complete.

use serde::{Deserialize, Serialize};

use crate::error::{DependencyError, Result};
use crate::graph::{DependencyGraph, NodeIdx};
use crate::models::{Dependency, DependencyKind, TaskStatus};

/// Whether a prerequisite in `status` lets its dependent start.
pub fn start_gate_satisfied(kind: DependencyKind, status: TaskStatus) -> bool {
    match kind {
        DependencyKind::FinishToStart => status == TaskStatus::Completed,
        DependencyKind::StartToStart => status.has_started(),
        // Checked when the dependent completes.
        DependencyKind::FinishToFinish | DependencyKind::StartToFinish => true,
    }
}

/// Whether a prerequisite in `status` lets its dependent complete.
pub fn finish_gate_satisfied(kind: DependencyKind, status: TaskStatus) -> bool {
    match kind {
        DependencyKind::FinishToStart | DependencyKind::FinishToFinish => {
            status == TaskStatus::Completed
        }
        DependencyKind::StartToStart | DependencyKind::StartToFinish => status.has_started(),
    }
}

/// Mandatory dependencies of `idx` that still block it from starting.
pub fn unmet_start_dependencies(graph: &DependencyGraph, idx: NodeIdx) -> Vec<Dependency> {
    graph
        .prerequisites_of(idx)
        .iter()
        .filter(|e| e.mandatory && !start_gate_satisfied(e.kind, graph.task(e.node).status))
        .map(|e| graph.edge_record(idx, e))
        .collect()
}

/// An `accepted` task whose mandatory start gates are all open.
pub fn is_ready(graph: &DependencyGraph, idx: NodeIdx) -> bool {
    graph.task(idx).status == TaskStatus::Accepted
        && graph
            .prerequisites_of(idx)
            .iter()
            .all(|e| !e.mandatory || start_gate_satisfied(e.kind, graph.task(e.node).status))
}

/// Outcome of checking whether a task may be marked completed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionCheck {
    pub task_id: String,
    pub can_complete: bool,
    /// Mandatory dependencies whose finish gate is still closed.
    pub unmet: Vec<Dependency>,
}

/// Evaluate the completion-time constraints of a task.
pub fn check_completion(graph: &DependencyGraph, task_id: &str) -> Result<CompletionCheck> {
    let idx = graph
        .node(task_id)
        .ok_or_else(|| DependencyError::UnknownTask(task_id.to_string()))?;
    let unmet: Vec<Dependency> = graph
        .prerequisites_of(idx)
        .iter()
        .filter(|e| e.mandatory && !finish_gate_satisfied(e.kind, graph.task(e.node).status))
        .map(|e| graph.edge_record(idx, e))
        .collect();
    Ok(CompletionCheck {
        task_id: task_id.to_string(),
        can_complete: unmet.is_empty(),
        unmet,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;

    fn pair(kind: DependencyKind, prereq_status: TaskStatus, mandatory: bool) -> DependencyGraph {
        DependencyGraph::from_records(
            "s",
            vec![
                Task::new("p", 2.0, 3).with_status(prereq_status),
                Task::new("d", 2.0, 3),
            ],
            vec![Dependency::new("d", "p", kind).mandatory(mandatory)],
        )
        .unwrap()
    }

    fn dependent_ready(graph: &DependencyGraph) -> bool {
        is_ready(graph, graph.node("d").unwrap())
    }

    #[test]
    fn test_finish_to_start_requires_completion() {
        assert!(!dependent_ready(&pair(
            DependencyKind::FinishToStart,
            TaskStatus::InProgress,
            true
        )));
        assert!(!dependent_ready(&pair(
            DependencyKind::FinishToStart,
            TaskStatus::Review,
            true
        )));
        assert!(dependent_ready(&pair(
            DependencyKind::FinishToStart,
            TaskStatus::Completed,
            true
        )));
    }

    #[test]
    fn test_start_to_start_requires_start() {
        assert!(!dependent_ready(&pair(
            DependencyKind::StartToStart,
            TaskStatus::Accepted,
            true
        )));
        assert!(dependent_ready(&pair(
            DependencyKind::StartToStart,
            TaskStatus::InProgress,
            true
        )));
        assert!(dependent_ready(&pair(
            DependencyKind::StartToStart,
            TaskStatus::Review,
            true
        )));
    }

    #[test]
    fn test_finish_gated_kinds_do_not_block_start() {
        assert!(dependent_ready(&pair(
            DependencyKind::FinishToFinish,
            TaskStatus::Proposed,
            true
        )));
        assert!(dependent_ready(&pair(
            DependencyKind::StartToFinish,
            TaskStatus::Accepted,
            true
        )));
    }

    #[test]
    fn test_advisory_dependency_never_blocks() {
        assert!(dependent_ready(&pair(
            DependencyKind::FinishToStart,
            TaskStatus::Proposed,
            false
        )));
    }

    #[test]
    fn test_only_accepted_tasks_are_ready() {
        let mut graph = pair(DependencyKind::FinishToStart, TaskStatus::Completed, true);
        graph.set_status("d", TaskStatus::InProgress).unwrap();
        assert!(!dependent_ready(&graph));
    }

    #[test]
    fn test_unmet_start_dependencies_lists_blockers() {
        let graph = pair(DependencyKind::FinishToStart, TaskStatus::InProgress, true);
        let unmet = unmet_start_dependencies(&graph, graph.node("d").unwrap());
        assert_eq!(unmet.len(), 1);
        assert_eq!(unmet[0].prerequisite_id, "p");
    }

    #[test]
    fn test_completion_check_finish_to_finish() {
        let graph = pair(DependencyKind::FinishToFinish, TaskStatus::InProgress, true);
        let check = check_completion(&graph, "d").unwrap();
        assert!(!check.can_complete);
        assert_eq!(check.unmet[0].kind, DependencyKind::FinishToFinish);

        let graph = pair(DependencyKind::FinishToFinish, TaskStatus::Completed, true);
        assert!(check_completion(&graph, "d").unwrap().can_complete);
    }

    #[test]
    fn test_completion_check_start_to_finish() {
        let graph = pair(DependencyKind::StartToFinish, TaskStatus::Accepted, true);
        assert!(!check_completion(&graph, "d").unwrap().can_complete);

        let graph = pair(DependencyKind::StartToFinish, TaskStatus::InProgress, true);
        assert!(check_completion(&graph, "d").unwrap().can_complete);
    }

    #[test]
    fn test_completion_check_unknown_task() {
        let graph = pair(DependencyKind::FinishToStart, TaskStatus::Completed, true);
        assert_eq!(
            check_completion(&graph, "zzz"),
            Err(DependencyError::UnknownTask("zzz".to_string()))
        );
    }
}
