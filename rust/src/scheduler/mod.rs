//! Task scheduler.
//!
//! Selects the tasks in a scope whose mandatory dependencies allow them to
//! start, scores them against the critical path and orders them for
//! assignment. Completion-time constraints are checked separately.

mod core;
mod readiness;
mod scoring;

pub use core::{RankedTask, TaskScheduler};
pub use readiness::{
    check_completion, finish_gate_satisfied, is_ready, start_gate_satisfied,
    unmet_start_dependencies, CompletionCheck,
};
pub use scoring::{normalize, score_task, ScoreBreakdown};
