//! Critical path analysis.
//!
//! Computes earliest/latest start and finish times for every task in a scope,
//! the total project duration, per-task slack and parallelization groups.
//! Results are cached per scope and keyed on the graph revision.

mod cache;
mod calculation;
mod types;

pub use cache::{CacheStats, CriticalPathCache};
pub use calculation::calculate_critical_path;
pub use types::{CriticalPath, ParallelGroup, TaskTiming, EPSILON};
