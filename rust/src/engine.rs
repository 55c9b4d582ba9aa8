//! Engine facade: one graph and critical path cache per scope.
//!
//! Scopes are loaded lazily from the [`TaskStore`] on first use. Each scope is
//! guarded by its own `RwLock`: mutations take the write lock and clear the
//! cached critical path before releasing it, reads share the read lock. The
//! scope map lock is only held to look up or insert a scope.
//!
//! The store owns task records. Every operation re-reads the scope's tasks
//! and replaces graph records that differ from the store's before it runs.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use rustc_hash::FxHashMap;

use crate::blocking::{BlockingDetector, BlockingImpact};
use crate::config::EngineConfig;
use crate::critical_path::{CacheStats, CriticalPath, CriticalPathCache};
use crate::error::{DependencyError, Result};
use crate::export::GraphExport;
use crate::graph::{DependencyGraph, GraphSnapshot};
use crate::models::{Dependency, DependencyKind, ScopeId, Task, TaskStatus};
use crate::scheduler::{self, CompletionCheck, RankedTask, TaskScheduler};
use crate::store::TaskStore;
use crate::{log_changes, log_checks};

struct ScopeState {
    graph: DependencyGraph,
    cache: CriticalPathCache,
}

impl ScopeState {
    fn new(graph: DependencyGraph) -> Self {
        Self {
            graph,
            cache: CriticalPathCache::new(),
        }
    }
}

struct ScopeSlot {
    state: RwLock<ScopeState>,
}

impl ScopeSlot {
    fn read(&self) -> RwLockReadGuard<'_, ScopeState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ScopeState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Dependency management and scheduling over a task store.
pub struct DependencyEngine<S: TaskStore> {
    store: S,
    config: EngineConfig,
    scopes: RwLock<FxHashMap<ScopeId, Arc<ScopeSlot>>>,
}

impl<S: TaskStore> DependencyEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            scopes: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn with_defaults(store: S) -> Self {
        Self::new(store, EngineConfig::default())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn verbosity(&self) -> u8 {
        self.config.verbosity
    }

    fn load_graph(&self, scope_id: &str) -> Result<DependencyGraph> {
        let tasks = self.store.list_tasks(scope_id)?;
        let dependencies = self.store.list_dependencies(scope_id)?;
        log_changes!(
            self.verbosity(),
            "Loading scope {} ({} tasks, {} dependencies)",
            scope_id,
            tasks.len(),
            dependencies.len()
        );
        DependencyGraph::from_records(scope_id, tasks, dependencies)
    }

    fn cached_slot(&self, scope_id: &str) -> Option<Arc<ScopeSlot>> {
        self.scopes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope_id)
            .cloned()
    }

    fn insert_slot(&self, scope_id: &str, graph: DependencyGraph) -> Arc<ScopeSlot> {
        let mut scopes = self.scopes.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have loaded the scope meanwhile; keep the first.
        Arc::clone(scopes.entry(scope_id.to_string()).or_insert_with(|| {
            Arc::new(ScopeSlot {
                state: RwLock::new(ScopeState::new(graph)),
            })
        }))
    }

    /// Slot for an existing scope, loading it from the store on first use.
    fn slot(&self, scope_id: &str) -> Result<Arc<ScopeSlot>> {
        if let Some(slot) = self.cached_slot(scope_id) {
            return Ok(slot);
        }
        let graph = self.load_graph(scope_id)?;
        if graph.is_empty() {
            return Err(DependencyError::UnknownScope(scope_id.to_string()));
        }
        Ok(self.insert_slot(scope_id, graph))
    }

    /// Slot for `scope_id`, created empty when the store has nothing for it.
    fn slot_or_empty(&self, scope_id: &str) -> Result<Arc<ScopeSlot>> {
        if let Some(slot) = self.cached_slot(scope_id) {
            return Ok(slot);
        }
        let graph = self.load_graph(scope_id)?;
        Ok(self.insert_slot(scope_id, graph))
    }

    fn scope_of_task(&self, task_id: &str) -> Result<ScopeId> {
        self.store
            .scope_of(task_id)?
            .ok_or_else(|| DependencyError::UnknownTask(task_id.to_string()))
    }

    fn slot_for_task(&self, task_id: &str) -> Result<(ScopeId, Arc<ScopeSlot>)> {
        let scope_id = self.scope_of_task(task_id)?;
        let slot = self.slot(&scope_id)?;
        Ok((scope_id, slot))
    }

    /// Replace graph task records that differ from the store's.
    ///
    /// Tasks known only to the graph are kept.
    fn sync_tasks(&self, state: &mut ScopeState, tasks: Vec<Task>) -> Result<()> {
        let mut changed = 0usize;
        for task in tasks {
            if state.graph.task_by_id(&task.id) != Some(&task) {
                state.graph.upsert_task(task)?;
                changed += 1;
            }
        }
        if changed > 0 {
            state.cache.invalidate();
            log_changes!(
                self.verbosity(),
                "Synced {} task record(s) from store into scope {}",
                changed,
                state.graph.scope_id()
            );
        }
        Ok(())
    }

    /// Bring a slot up to date before a read. Takes the write lock only when
    /// the store has records the graph lacks.
    fn sync_for_read(&self, scope_id: &str, slot: &ScopeSlot) -> Result<()> {
        let tasks = self.store.list_tasks(scope_id)?;
        let stale = {
            let state = slot.read();
            tasks
                .iter()
                .any(|task| state.graph.task_by_id(&task.id) != Some(task))
        };
        if stale {
            let mut state = slot.write();
            self.sync_tasks(&mut state, tasks)?;
        }
        Ok(())
    }

    fn read_slot(&self, scope_id: &str) -> Result<Arc<ScopeSlot>> {
        let slot = self.slot(scope_id)?;
        self.sync_for_read(scope_id, &slot)?;
        Ok(slot)
    }

    fn read_slot_for_task(&self, task_id: &str) -> Result<Arc<ScopeSlot>> {
        let (scope_id, slot) = self.slot_for_task(task_id)?;
        self.sync_for_read(&scope_id, &slot)?;
        Ok(slot)
    }

    // ---- mutations ----

    /// Register a dependency with no lag.
    pub fn add_dependency(
        &self,
        dependent_id: &str,
        prerequisite_id: &str,
        kind: DependencyKind,
        mandatory: bool,
    ) -> Result<Dependency> {
        self.add_dependency_record(
            Dependency::new(dependent_id, prerequisite_id, kind).mandatory(mandatory),
        )
    }

    /// Register a dependency whose kind is given as a string.
    pub fn add_dependency_str(
        &self,
        dependent_id: &str,
        prerequisite_id: &str,
        kind: &str,
        mandatory: bool,
    ) -> Result<Dependency> {
        let kind: DependencyKind = kind.parse()?;
        self.add_dependency(dependent_id, prerequisite_id, kind, mandatory)
    }

    /// Register a dependency.
    ///
    /// The store is written before the graph, so a store failure leaves both
    /// unchanged. Re-adding an identical edge returns the stored record.
    pub fn add_dependency_record(&self, dependency: Dependency) -> Result<Dependency> {
        if dependency.dependent_id == dependency.prerequisite_id {
            return Err(DependencyError::SelfDependency(dependency.dependent_id));
        }
        let (scope_id, slot) = self.slot_for_task(&dependency.dependent_id)?;
        let mut state = slot.write();
        self.sync_tasks(&mut state, self.store.list_tasks(&scope_id)?)?;

        let checked = state.graph.check_dependency(&dependency);
        let existing = match checked {
            Ok(existing) => existing,
            Err(err) => {
                log_checks!(
                    self.verbosity(),
                    "Rejected dependency {} -> {}: {}",
                    dependency.prerequisite_id,
                    dependency.dependent_id,
                    err
                );
                return Err(err);
            }
        };
        if let Some(existing) = existing {
            return Ok(existing);
        }

        self.store.persist_dependency(&dependency)?;
        let added = state.graph.add_dependency(dependency)?;
        state.cache.invalidate();
        log_changes!(
            self.verbosity(),
            "Added {} dependency {} -> {} in scope {}",
            added.kind,
            added.prerequisite_id,
            added.dependent_id,
            state.graph.scope_id()
        );
        Ok(added)
    }

    /// Remove a dependency. Returns `None` when no such edge exists.
    pub fn remove_dependency(
        &self,
        dependent_id: &str,
        prerequisite_id: &str,
        kind: DependencyKind,
    ) -> Result<Option<Dependency>> {
        let (scope_id, slot) = self.slot_for_task(dependent_id)?;
        let mut state = slot.write();
        self.sync_tasks(&mut state, self.store.list_tasks(&scope_id)?)?;

        let Some(existing) = state.graph.find_dependency(dependent_id, prerequisite_id, kind)
        else {
            return Ok(None);
        };
        self.store.delete_dependency(&existing)?;
        let removed = state.graph.remove_dependency(dependent_id, prerequisite_id, kind);
        state.cache.invalidate();
        log_changes!(
            self.verbosity(),
            "Removed {} dependency {} -> {}",
            kind,
            prerequisite_id,
            dependent_id
        );
        Ok(removed)
    }

    /// Mirror a task created or edited in the store into its scope's graph.
    pub fn upsert_task(&self, scope_id: &str, task: Task) -> Result<()> {
        let slot = self.slot_or_empty(scope_id)?;
        let mut state = slot.write();
        let task_id = task.id.clone();
        state.graph.upsert_task(task)?;
        state.cache.invalidate();
        log_changes!(self.verbosity(), "Upserted task {} in scope {}", task_id, scope_id);
        Ok(())
    }

    /// Apply a status change reported by the task store.
    ///
    /// Returns the previous status.
    pub fn apply_status_change(&self, task_id: &str, status: TaskStatus) -> Result<TaskStatus> {
        let (_, slot) = self.slot_for_task(task_id)?;
        let mut state = slot.write();
        let previous = state.graph.set_status(task_id, status)?;
        if previous != status {
            state.cache.invalidate();
            log_changes!(
                self.verbosity(),
                "Task {} status {} -> {}",
                task_id,
                previous,
                status
            );
        }
        Ok(previous)
    }

    /// Rebuild a scope from the store, discarding the in-memory graph.
    ///
    /// A loaded scope is re-read while its write lock is held, so no mutation
    /// can land in the store between the read and the swap.
    pub fn refresh_scope(&self, scope_id: &str) -> Result<()> {
        match self.cached_slot(scope_id) {
            Some(slot) => {
                let mut state = slot.write();
                *state = ScopeState::new(self.load_graph(scope_id)?);
            }
            None => {
                let graph = self.load_graph(scope_id)?;
                self.insert_slot(scope_id, graph);
            }
        }
        log_changes!(self.verbosity(), "Refreshed scope {}", scope_id);
        Ok(())
    }

    // ---- reads ----

    pub fn get_critical_path(&self, scope_id: &str) -> Result<Arc<CriticalPath>> {
        let slot = self.read_slot(scope_id)?;
        let state = slot.read();
        state.cache.get_or_compute(&state.graph, self.verbosity())
    }

    /// Ready tasks in a scope, best first.
    pub fn get_next_tasks(&self, scope_id: &str, agent_type: Option<&str>) -> Result<Vec<Task>> {
        Ok(self
            .rank_next_tasks(scope_id, agent_type)?
            .into_iter()
            .map(|r| r.task)
            .collect())
    }

    /// Ready tasks in a scope with their score breakdowns, best first.
    pub fn rank_next_tasks(
        &self,
        scope_id: &str,
        agent_type: Option<&str>,
    ) -> Result<Vec<RankedTask>> {
        let slot = self.read_slot(scope_id)?;
        let state = slot.read();
        let critical_path = state.cache.get_or_compute(&state.graph, self.verbosity())?;
        Ok(TaskScheduler::new(
            &state.graph,
            &critical_path,
            &self.config.scheduling,
            self.verbosity(),
        )
        .rank(agent_type))
    }

    /// Blocking impact, with the delay estimated from the store's blocker
    /// record when one exists.
    pub fn get_blocking_impact(&self, task_id: &str) -> Result<BlockingImpact> {
        let delay = self
            .store
            .blocker(task_id)?
            .map(|record| record.estimated_delay_hours(Utc::now()));
        self.blocking_impact(task_id, delay)
    }

    /// Blocking impact with a caller-supplied delay estimate in hours.
    pub fn get_blocking_impact_with_delay(
        &self,
        task_id: &str,
        estimated_delay_hours: f64,
    ) -> Result<BlockingImpact> {
        self.blocking_impact(task_id, Some(estimated_delay_hours))
    }

    fn blocking_impact(&self, task_id: &str, delay: Option<f64>) -> Result<BlockingImpact> {
        let slot = self.read_slot_for_task(task_id)?;
        let state = slot.read();
        let critical_path = state.cache.get_or_compute(&state.graph, self.verbosity())?;
        BlockingDetector::new(
            &state.graph,
            &critical_path,
            &self.config.blocking.rules,
            self.verbosity(),
        )
        .detect(task_id, delay)
    }

    pub fn check_completion(&self, task_id: &str) -> Result<CompletionCheck> {
        let slot = self.read_slot_for_task(task_id)?;
        let state = slot.read();
        scheduler::check_completion(&state.graph, task_id)
    }

    pub fn export_graph(&self, scope_id: &str) -> Result<GraphExport> {
        let slot = self.read_slot(scope_id)?;
        let state = slot.read();
        let critical_path = state.cache.get_or_compute(&state.graph, self.verbosity())?;
        Ok(GraphExport::build(&state.graph, &critical_path))
    }

    pub fn get_graph(&self, scope_id: &str) -> Result<GraphSnapshot> {
        let slot = self.read_slot(scope_id)?;
        let state = slot.read();
        Ok(state.graph.snapshot())
    }

    /// Task ids of a scope in dependency order, ties by ascending id.
    pub fn topological_order(&self, scope_id: &str) -> Result<Vec<String>> {
        let slot = self.read_slot(scope_id)?;
        let state = slot.read();
        state.graph.topological_sort()
    }

    pub fn cache_stats(&self, scope_id: &str) -> Result<CacheStats> {
        let slot = self.slot(scope_id)?;
        let state = slot.read();
        Ok(state.cache.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocking::Severity;
    use crate::models::BlockerRecord;
    use crate::store::InMemoryTaskStore;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Mutex};
    use std::thread;

    const FS: DependencyKind = DependencyKind::FinishToStart;

    fn make_task(id: &str, effort: f64, task_type: &str) -> Task {
        Task::new(id, effort, 3).with_type(task_type)
    }

    /// The auth feature from the graph tests, registered through the engine.
    fn auth_engine() -> DependencyEngine<InMemoryTaskStore> {
        let store = InMemoryTaskStore::new();
        for task in [
            make_task("A", 4.0, "schema"),
            make_task("B", 4.0, "model"),
            make_task("C", 4.0, "jwt"),
            make_task("D", 3.0, "login"),
            make_task("E", 6.0, "tests"),
        ] {
            store.insert_task("auth", task).unwrap();
        }
        let engine = DependencyEngine::with_defaults(store);
        for (dependent, prerequisite) in [("B", "A"), ("C", "B"), ("D", "B"), ("E", "C"), ("E", "D")] {
            engine.add_dependency(dependent, prerequisite, FS, true).unwrap();
        }
        engine
    }

    fn advance(engine: &DependencyEngine<InMemoryTaskStore>, id: &str, path: &[TaskStatus]) {
        for status in path {
            engine.store().set_status(id, *status).unwrap();
            engine.apply_status_change(id, *status).unwrap();
        }
    }

    fn complete(engine: &DependencyEngine<InMemoryTaskStore>, id: &str) {
        advance(
            engine,
            id,
            &[TaskStatus::InProgress, TaskStatus::Review, TaskStatus::Completed],
        );
    }

    #[test]
    fn test_worked_example_end_to_end() {
        let engine = auth_engine();

        let cp = engine.get_critical_path("auth").unwrap();
        assert!((cp.project_duration - 18.0).abs() < 1e-9);
        assert_eq!(cp.tasks, vec!["A", "B", "C", "E"]);
        assert_eq!(cp.parallel_groups[0].task_ids, vec!["C", "D"]);

        let next: Vec<String> = engine
            .get_next_tasks("auth", None)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(next, vec!["A"]);

        complete(&engine, "A");
        advance(&engine, "B", &[TaskStatus::InProgress, TaskStatus::Blocked]);
        let impact = engine.get_blocking_impact("B").unwrap();
        assert_eq!(impact.affected, vec!["C", "D", "E"]);
        assert_eq!(impact.severity, Severity::Critical);
    }

    #[test]
    fn test_dependencies_persisted_and_reloaded() {
        let engine = auth_engine();
        assert_eq!(engine.store().dependency_count(), 5);

        engine.refresh_scope("auth").unwrap();
        let snapshot = engine.get_graph("auth").unwrap();
        assert_eq!(snapshot.edges.len(), 5);
        assert_eq!(engine.topological_order("auth").unwrap(), vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_cycle_rejected_and_state_unchanged() {
        let engine = auth_engine();
        let before = engine.get_graph("auth").unwrap();

        let err = engine.add_dependency("A", "E", FS, true).unwrap_err();
        match err {
            DependencyError::CircularDependency { cycle, .. } => {
                assert_eq!(cycle.first().map(String::as_str), Some("A"));
                assert_eq!(cycle.last().map(String::as_str), Some("A"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(engine.get_graph("auth").unwrap(), before);
        assert_eq!(engine.store().dependency_count(), 5);
    }

    #[test]
    fn test_add_dependency_errors() {
        let engine = auth_engine();
        assert_eq!(
            engine.add_dependency("A", "A", FS, true),
            Err(DependencyError::SelfDependency("A".to_string()))
        );
        assert_eq!(
            engine.add_dependency("ghost", "A", FS, true),
            Err(DependencyError::UnknownTask("ghost".to_string()))
        );
        assert_eq!(
            engine.add_dependency("E", "ghost", FS, true),
            Err(DependencyError::UnknownTask("ghost".to_string()))
        );
        assert_eq!(
            engine.add_dependency_str("E", "A", "before", true),
            Err(DependencyError::InvalidDependencyKind("before".to_string()))
        );
    }

    #[test]
    fn test_add_dependency_str_and_idempotence() {
        let engine = auth_engine();
        let first = engine.add_dependency_str("E", "A", "SS", true).unwrap();
        assert_eq!(first.kind, DependencyKind::StartToStart);
        let again = engine.add_dependency_str("E", "A", "start_to_start", true).unwrap();
        assert_eq!(first, again);
        assert_eq!(engine.get_graph("auth").unwrap().edges.len(), 6);
    }

    #[test]
    fn test_mutation_invalidates_cache() {
        let engine = auth_engine();
        let before = engine.get_critical_path("auth").unwrap();
        let cached = engine.get_critical_path("auth").unwrap();
        assert!(Arc::ptr_eq(&before, &cached));
        assert_eq!(engine.cache_stats("auth").unwrap(), CacheStats { hits: 1, misses: 1 });

        engine.add_dependency("D", "C", FS, true).unwrap();
        let after = engine.get_critical_path("auth").unwrap();
        assert!((after.project_duration - 21.0).abs() < 1e-9);

        engine.remove_dependency("D", "C", FS).unwrap();
        let restored = engine.get_critical_path("auth").unwrap();
        assert!((restored.project_duration - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_remove_missing_dependency() {
        let engine = auth_engine();
        assert_eq!(engine.remove_dependency("A", "E", FS).unwrap(), None);
        assert_eq!(engine.store().dependency_count(), 5);
    }

    #[test]
    fn test_store_failure_leaves_graph_unchanged() {
        let engine = auth_engine();
        engine.store().set_fail_writes(true);

        assert!(matches!(
            engine.add_dependency("D", "C", FS, true),
            Err(DependencyError::Store(_))
        ));
        assert!(matches!(
            engine.remove_dependency("E", "D", FS),
            Err(DependencyError::Store(_))
        ));
        assert_eq!(engine.get_graph("auth").unwrap().edges.len(), 5);
    }

    #[test]
    fn test_unknown_scope() {
        let engine = auth_engine();
        assert_eq!(
            engine.get_critical_path("billing").map(|_| ()),
            Err(DependencyError::UnknownScope("billing".to_string()))
        );
    }

    #[test]
    fn test_upsert_task_creates_scope() {
        let engine = auth_engine();
        engine.upsert_task("billing", Task::new("invoice", 2.0, 4)).unwrap();
        let next = engine.get_next_tasks("billing", None).unwrap();
        assert_eq!(next[0].id, "invoice");
    }

    #[test]
    fn test_status_change_validation() {
        let engine = auth_engine();
        assert!(matches!(
            engine.apply_status_change("A", TaskStatus::Completed),
            Err(DependencyError::InvalidTransition { .. })
        ));
        assert_eq!(
            engine.apply_status_change("A", TaskStatus::InProgress).unwrap(),
            TaskStatus::Accepted
        );
    }

    #[test]
    fn test_check_completion_through_engine() {
        let engine = auth_engine();
        let check = engine.check_completion("B").unwrap();
        assert!(!check.can_complete);
        assert_eq!(check.unmet[0].prerequisite_id, "A");

        complete(&engine, "A");
        assert!(engine.check_completion("B").unwrap().can_complete);
    }

    #[test]
    fn test_blocking_delay_from_store() {
        let engine = auth_engine();
        advance(&engine, "A", &[TaskStatus::InProgress, TaskStatus::Blocked]);
        engine.store().set_blocker(BlockerRecord {
            task_id: "A".to_string(),
            blocked_since: Utc::now() - Duration::hours(10),
            expected_resolution_hours: 2.0,
        });

        let impact = engine.get_blocking_impact("A").unwrap();
        let delay = impact.estimated_delay_hours.unwrap();
        assert!((11.9..12.1).contains(&delay));

        let supplied = engine.get_blocking_impact_with_delay("A", 1.0).unwrap();
        assert_eq!(supplied.estimated_delay_hours, Some(1.0));
    }

    #[test]
    fn test_rank_and_export() {
        let engine = auth_engine();
        complete(&engine, "A");
        complete(&engine, "B");

        let ranked = engine.rank_next_tasks("auth", None).unwrap();
        assert_eq!(ranked[0].task.id, "C");
        assert!((ranked[0].score.total - 0.79).abs() < 1e-9);

        let export = engine.export_graph("auth").unwrap();
        assert_eq!(export.nodes.len(), 5);
        assert!(export.to_json().unwrap().contains("\"critical\":true"));
    }

    #[test]
    fn test_reads_follow_store_status() {
        let engine = auth_engine();
        engine.store().set_status("A", TaskStatus::InProgress).unwrap();
        assert!(engine.get_next_tasks("auth", None).unwrap().is_empty());

        engine.store().set_status("A", TaskStatus::Review).unwrap();
        engine.store().set_status("A", TaskStatus::Completed).unwrap();
        let next: Vec<String> = engine
            .get_next_tasks("auth", None)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(next, vec!["B"]);
        assert!(engine.check_completion("B").unwrap().can_complete);
    }

    #[test]
    fn test_add_dependency_on_task_created_in_store() {
        let engine = auth_engine();
        engine.get_graph("auth").unwrap();
        engine
            .store()
            .insert_task("auth", make_task("F", 2.0, "docs"))
            .unwrap();

        let added = engine.add_dependency("F", "E", FS, true).unwrap();
        assert_eq!(added.prerequisite_id, "E");
        let cp = engine.get_critical_path("auth").unwrap();
        assert!((cp.project_duration - 20.0).abs() < 1e-9);
        assert_eq!(cp.tasks.last().map(String::as_str), Some("F"));
    }

    /// Store whose next `list_dependencies` call waits for a release signal.
    struct PausingStore {
        inner: InMemoryTaskStore,
        armed: AtomicBool,
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl PausingStore {
        fn new(inner: InMemoryTaskStore) -> Self {
            Self {
                inner,
                armed: AtomicBool::new(false),
                entered: Mutex::new(None),
                release: Mutex::new(None),
            }
        }

        fn pause_next_listing(&self, entered: mpsc::Sender<()>, release: mpsc::Receiver<()>) {
            *self.entered.lock().unwrap() = Some(entered);
            *self.release.lock().unwrap() = Some(release);
            self.armed.store(true, Ordering::SeqCst);
        }
    }

    impl TaskStore for PausingStore {
        fn list_tasks(&self, scope_id: &str) -> Result<Vec<Task>> {
            self.inner.list_tasks(scope_id)
        }

        fn list_dependencies(&self, scope_id: &str) -> Result<Vec<Dependency>> {
            let listed = self.inner.list_dependencies(scope_id);
            if self.armed.swap(false, Ordering::SeqCst) {
                if let Some(entered) = self.entered.lock().unwrap().take() {
                    entered.send(()).unwrap();
                }
                if let Some(release) = self.release.lock().unwrap().take() {
                    release.recv().unwrap();
                }
            }
            listed
        }

        fn task(&self, task_id: &str) -> Result<Option<Task>> {
            self.inner.task(task_id)
        }

        fn scope_of(&self, task_id: &str) -> Result<Option<ScopeId>> {
            self.inner.scope_of(task_id)
        }

        fn persist_dependency(&self, dependency: &Dependency) -> Result<()> {
            self.inner.persist_dependency(dependency)
        }

        fn delete_dependency(&self, dependency: &Dependency) -> Result<()> {
            self.inner.delete_dependency(dependency)
        }
    }

    #[test]
    fn test_refresh_does_not_lose_concurrent_dependency() {
        let inner = InMemoryTaskStore::new();
        inner.insert_task("s", Task::new("a", 1.0, 3)).unwrap();
        inner.insert_task("s", Task::new("b", 1.0, 3)).unwrap();
        let engine = Arc::new(DependencyEngine::with_defaults(PausingStore::new(inner)));
        engine.get_graph("s").unwrap();

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        engine.store().pause_next_listing(entered_tx, release_rx);

        let refresher = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.refresh_scope("s"))
        };
        // The refresh has read the store's (empty) dependency list.
        entered_rx.recv().unwrap();

        let writer = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.add_dependency("b", "a", FS, true))
        };
        thread::sleep(std::time::Duration::from_millis(50));
        release_tx.send(()).unwrap();

        refresher.join().unwrap().unwrap();
        writer.join().unwrap().unwrap();

        assert_eq!(engine.store().inner.dependency_count(), 1);
        assert_eq!(engine.get_graph("s").unwrap().edges.len(), 1);
        let next: Vec<String> = engine
            .get_next_tasks("s", None)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(next, vec!["a"]);
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let store = InMemoryTaskStore::new();
        for i in 0..50 {
            store
                .insert_task("chain", Task::new(format!("t{i:02}"), 1.0, 3))
                .unwrap();
            store
                .insert_task("other", Task::new(format!("o{i:02}"), 1.0, 3))
                .unwrap();
        }
        let engine = Arc::new(DependencyEngine::with_defaults(store));

        let mut handles = Vec::new();
        for worker in 0..4 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for i in (worker + 1..50).step_by(4) {
                    let dependent = format!("t{i:02}");
                    let prerequisite = format!("t{:02}", i - 1);
                    engine.add_dependency(&dependent, &prerequisite, FS, true).unwrap();
                }
            }));
        }
        for _ in 0..4 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for _ in 0..20 {
                    let cp = engine.get_critical_path("chain").unwrap();
                    // Never a stale cache: the result matches the graph it came from.
                    assert!(cp.project_duration >= 1.0);
                    assert!(cp.slack.values().all(|s| *s >= 0.0));
                    engine.get_next_tasks("other", None).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let cp = engine.get_critical_path("chain").unwrap();
        assert!((cp.project_duration - 50.0).abs() < 1e-9);
        assert_eq!(cp.tasks.len(), 50);
        assert_eq!(engine.get_next_tasks("other", None).unwrap().len(), 50);
    }
}
