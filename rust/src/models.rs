//! Core data types for the dependency engine.
//!
//! Tasks and dependencies are owned by the external task store; the engine
//! only keeps in-memory copies to build its graph projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DependencyError, Result};

/// Identifier of a scheduling scope (e.g. one work item).
pub type ScopeId = String;

/// Lowest accepted task priority.
pub const MIN_PRIORITY: u8 = 1;
/// Highest accepted task priority.
pub const MAX_PRIORITY: u8 = 5;

/// Task status in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Proposed,
    Accepted,
    InProgress,
    Blocked,
    Review,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Proposed => "proposed",
            TaskStatus::Accepted => "accepted",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Review => "review",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Whether work on the task has begun (used by start-gated dependency kinds).
    pub fn has_started(&self) -> bool {
        matches!(
            self,
            TaskStatus::InProgress | TaskStatus::Review | TaskStatus::Completed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    /// Check whether `next` is a legal successor of this status.
    ///
    /// `proposed -> accepted -> in_progress <-> blocked -> review -> completed`,
    /// with review able to return to in_progress and `cancelled` reachable
    /// from every non-terminal status.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        if next == Cancelled {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Proposed, Accepted)
                | (Accepted, InProgress)
                | (InProgress, Blocked)
                | (InProgress, Review)
                | (Blocked, InProgress)
                | (Blocked, Review)
                | (Review, InProgress)
                | (Review, Completed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = DependencyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "proposed" => Ok(TaskStatus::Proposed),
            "accepted" => Ok(TaskStatus::Accepted),
            "in_progress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "review" => Ok(TaskStatus::Review),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(DependencyError::InvalidStatus(other.to_string())),
        }
    }
}

/// How a prerequisite's timing gates its dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::FinishToStart => "finish_to_start",
            DependencyKind::StartToStart => "start_to_start",
            DependencyKind::FinishToFinish => "finish_to_finish",
            DependencyKind::StartToFinish => "start_to_finish",
        }
    }
}

impl Default for DependencyKind {
    fn default() -> Self {
        DependencyKind::FinishToStart
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyKind {
    type Err = DependencyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "finish_to_start" | "FS" => Ok(DependencyKind::FinishToStart),
            "start_to_start" | "SS" => Ok(DependencyKind::StartToStart),
            "finish_to_finish" | "FF" => Ok(DependencyKind::FinishToFinish),
            "start_to_finish" | "SF" => Ok(DependencyKind::StartToFinish),
            other => Err(DependencyError::InvalidDependencyKind(other.to_string())),
        }
    }
}

/// A unit of work referenced by the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Effort estimate in hours (positive).
    pub effort_hours: f64,
    /// Ordinal priority, 1 (lowest) to 5 (highest).
    pub priority: u8,
    pub status: TaskStatus,
    /// Free-form type tag, only used for agent affinity bonuses.
    #[serde(default)]
    pub task_type: String,
}

impl Task {
    pub fn new(id: impl Into<String>, effort_hours: f64, priority: u8) -> Self {
        Self {
            id: id.into(),
            title: None,
            effort_hours,
            priority,
            status: TaskStatus::Accepted,
            task_type: String::new(),
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = task_type.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Reject records the graph cannot reason about.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(DependencyError::InvalidTask {
                id: self.id.clone(),
                reason: "empty id".to_string(),
            });
        }
        if !self.effort_hours.is_finite() || self.effort_hours <= 0.0 {
            return Err(DependencyError::InvalidTask {
                id: self.id.clone(),
                reason: format!("effort must be positive, got {}", self.effort_hours),
            });
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(DependencyError::InvalidTask {
                id: self.id.clone(),
                reason: format!(
                    "priority must be in {}..={}, got {}",
                    MIN_PRIORITY, MAX_PRIORITY, self.priority
                ),
            });
        }
        Ok(())
    }
}

/// A dependency edge: `dependent_id` waits on `prerequisite_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub dependent_id: String,
    pub prerequisite_id: String,
    #[serde(default)]
    pub kind: DependencyKind,
    #[serde(default)]
    pub lag_hours: f64,
    #[serde(default = "default_mandatory")]
    pub mandatory: bool,
}

fn default_mandatory() -> bool {
    true
}

impl Dependency {
    pub fn new(
        dependent_id: impl Into<String>,
        prerequisite_id: impl Into<String>,
        kind: DependencyKind,
    ) -> Self {
        Self {
            dependent_id: dependent_id.into(),
            prerequisite_id: prerequisite_id.into(),
            kind,
            lag_hours: 0.0,
            mandatory: true,
        }
    }

    pub fn with_lag(mut self, lag_hours: f64) -> Self {
        self.lag_hours = lag_hours;
        self
    }

    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    /// Identity used for idempotent inserts: (dependent, prerequisite, kind).
    pub fn same_edge(&self, other: &Dependency) -> bool {
        self.dependent_id == other.dependent_id
            && self.prerequisite_id == other.prerequisite_id
            && self.kind == other.kind
    }
}

/// Blocker information supplied by the external blocker-tracking collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockerRecord {
    pub task_id: String,
    pub blocked_since: DateTime<Utc>,
    pub expected_resolution_hours: f64,
}

impl BlockerRecord {
    /// Time blocked so far plus the expected resolution time, in hours.
    pub fn estimated_delay_hours(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = (now - self.blocked_since).num_seconds().max(0) as f64 / 3600.0;
        elapsed + self.expected_resolution_hours.max(0.0)
    }
}
