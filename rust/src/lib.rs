//! Dependency management and scheduling engine.
//!
//! Tasks and their typed dependencies form a per-scope DAG. On top of it the
//! crate computes the critical path with slack and parallelization groups,
//! ranks the tasks that are ready to start, and reports the downstream
//! impact of blocked tasks. Task records come from a [`TaskStore`]; the
//! engine keeps one graph and one critical path cache per scope.

pub mod blocking;
pub mod config;
pub mod critical_path;
pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod store;

#[cfg(feature = "python")]
mod python;

pub use blocking::{
    default_rules, BlockingDetector, BlockingImpact, RecommendationRule, RuleCondition, Severity,
};
pub use config::{BlockingConfig, ConfigError, EngineConfig, SchedulingConfig};
pub use critical_path::{
    calculate_critical_path, CacheStats, CriticalPath, CriticalPathCache, ParallelGroup,
    TaskTiming,
};
pub use engine::DependencyEngine;
pub use error::{DependencyError, Result};
pub use export::{ExportEdge, ExportNode, GraphExport};
pub use graph::{DependencyGraph, GraphSnapshot, NodeIdx};
pub use models::{BlockerRecord, Dependency, DependencyKind, ScopeId, Task, TaskStatus};
pub use scheduler::{check_completion, CompletionCheck, RankedTask, ScoreBreakdown, TaskScheduler};
pub use store::{InMemoryTaskStore, TaskStore};
