//! Logging macros with verbosity level control.
//!
//! Events are emitted through `tracing`; the embedding application decides
//! where they go by installing a subscriber. Verbosity levels:
//! - 0: SILENT (nothing from the engine)
//! - 1: CHANGES (graph mutations, cache invalidations)
//! - 2: CHECKS (readiness decisions, rejected mutations)
//! - 3: DEBUG (pass internals, per-task timings)

#[doc(hidden)]
pub use tracing;

/// Verbosity level constants.
pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log at CHANGES level (verbosity >= 1).
///
/// Used for: accepted dependencies, status changes, scope reloads.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            $crate::logging::tracing::info!(target: "depsched", $($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2).
///
/// Used for: readiness checks, skip reasons, rejected mutations.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            $crate::logging::tracing::debug!(target: "depsched", $($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3).
///
/// Used for: forward/backward pass values, cache hits.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            $crate::logging::tracing::trace!(target: "depsched", $($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_ordering() {
        assert!(VERBOSITY_SILENT < VERBOSITY_CHANGES);
        assert!(VERBOSITY_CHANGES < VERBOSITY_CHECKS);
        assert!(VERBOSITY_CHECKS < VERBOSITY_DEBUG);
    }

    #[test]
    fn test_log_macros_compile() {
        let verbosity = VERBOSITY_DEBUG;
        log_changes!(verbosity, "dependency {} -> {}", "a", "b");
        log_checks!(verbosity, "task {} not ready", "c");
        log_debug!(verbosity, "es={}", 4.0);
    }

    mod caller_without_tracing {
        // Shadows the `tracing` crate name at the call site.
        #[allow(dead_code)]
        mod tracing {}

        #[test]
        fn test_macros_resolve_tracing_through_crate() {
            crate::log_changes!(3u8, "scope {} reloaded", "s");
            crate::log_checks!(3u8, "task {} skipped", "t");
            crate::log_debug!(3u8, "lf={}", 2.0);
        }
    }
}
