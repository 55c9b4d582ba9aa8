//! Error types for dependency graph mutations and queries.

use thiserror::Error;

use crate::models::TaskStatus;

/// Errors reported by the dependency engine.
///
/// Every variant is reported synchronously to the caller. A mutation that
/// fails with any of these leaves the graph exactly as it was.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DependencyError {
    #[error("Adding dependency {dependent} -> {prerequisite} would create a cycle: {}", cycle.join(" -> "))]
    CircularDependency {
        dependent: String,
        prerequisite: String,
        /// Existing path from the dependent back to the prerequisite, closed by the new edge.
        cycle: Vec<String>,
    },
    #[error("Unknown task: {0}")]
    UnknownTask(String),
    #[error("Task cannot depend on itself: {0}")]
    SelfDependency(String),
    #[error("Invalid dependency kind: {0}")]
    InvalidDependencyKind(String),
    #[error("Invalid lag for {dependent} -> {prerequisite}: {lag_hours}")]
    InvalidLag {
        dependent: String,
        prerequisite: String,
        lag_hours: f64,
    },
    #[error("Invalid task {id}: {reason}")]
    InvalidTask { id: String, reason: String },
    #[error("Invalid status transition for {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    #[error("Invalid task status: {0}")]
    InvalidStatus(String),
    #[error("Unknown scope: {0}")]
    UnknownScope(String),
    #[error("Task store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, DependencyError>;
