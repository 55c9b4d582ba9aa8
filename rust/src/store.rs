//! Task and dependency storage interface.
//!
//! The engine does not own task records. It reads them from a [`TaskStore`]
//! supplied by the task-management layer and writes back only dependency
//! records. [`InMemoryTaskStore`] is a complete implementation for embedding
//! and tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::error::{DependencyError, Result};
use crate::models::{BlockerRecord, Dependency, ScopeId, Task, TaskStatus};

/// Storage backing the engine.
///
/// Implementations use interior mutability; the engine shares one store across
/// threads.
pub trait TaskStore: Send + Sync {
    /// All tasks in a scope.
    fn list_tasks(&self, scope_id: &str) -> Result<Vec<Task>>;

    /// All dependencies whose endpoints lie in a scope.
    fn list_dependencies(&self, scope_id: &str) -> Result<Vec<Dependency>>;

    fn task(&self, task_id: &str) -> Result<Option<Task>>;

    /// Scope a task belongs to.
    fn scope_of(&self, task_id: &str) -> Result<Option<ScopeId>>;

    /// Persist a dependency. Called before the graph commits it; an error
    /// aborts the mutation.
    fn persist_dependency(&self, dependency: &Dependency) -> Result<()>;

    /// Delete a dependency. Same ordering contract as [`Self::persist_dependency`].
    fn delete_dependency(&self, dependency: &Dependency) -> Result<()>;

    /// Blocker bookkeeping for a blocked task, if the store tracks it.
    fn blocker(&self, _task_id: &str) -> Result<Option<BlockerRecord>> {
        Ok(None)
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    /// task id -> (scope, record)
    tasks: BTreeMap<String, (ScopeId, Task)>,
    dependencies: Vec<Dependency>,
    blockers: BTreeMap<String, BlockerRecord>,
}

/// Thread-safe in-memory [`TaskStore`].
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    inner: RwLock<StoreInner>,
    fail_writes: AtomicBool,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task in `scope_id`.
    pub fn insert_task(&self, scope_id: impl Into<ScopeId>, task: Task) -> Result<()> {
        task.validate()?;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.tasks.insert(task.id.clone(), (scope_id.into(), task));
        Ok(())
    }

    /// Update a stored task's status, validating the transition.
    pub fn set_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let (_, task) = inner
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| DependencyError::UnknownTask(task_id.to_string()))?;
        if task.status != status && !task.status.can_transition_to(status) {
            return Err(DependencyError::InvalidTransition {
                task_id: task_id.to_string(),
                from: task.status,
                to: status,
            });
        }
        task.status = status;
        Ok(())
    }

    pub fn set_blocker(&self, record: BlockerRecord) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.blockers.insert(record.task_id.clone(), record);
    }

    pub fn clear_blocker(&self, task_id: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.blockers.remove(task_id);
    }

    /// Make every subsequent dependency write fail with a store error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn dependency_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .dependencies
            .len()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DependencyError::Store("store is not accepting writes".to_string()));
        }
        Ok(())
    }
}

impl TaskStore for InMemoryTaskStore {
    fn list_tasks(&self, scope_id: &str) -> Result<Vec<Task>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .tasks
            .values()
            .filter(|(scope, _)| scope == scope_id)
            .map(|(_, task)| task.clone())
            .collect())
    }

    fn list_dependencies(&self, scope_id: &str) -> Result<Vec<Dependency>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let in_scope = |id: &str| {
            inner
                .tasks
                .get(id)
                .is_some_and(|(scope, _)| scope == scope_id)
        };
        Ok(inner
            .dependencies
            .iter()
            .filter(|d| in_scope(&d.dependent_id) && in_scope(&d.prerequisite_id))
            .cloned()
            .collect())
    }

    fn task(&self, task_id: &str) -> Result<Option<Task>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.tasks.get(task_id).map(|(_, task)| task.clone()))
    }

    fn scope_of(&self, task_id: &str) -> Result<Option<ScopeId>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.tasks.get(task_id).map(|(scope, _)| scope.clone()))
    }

    fn persist_dependency(&self, dependency: &Dependency) -> Result<()> {
        self.check_writable()?;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match inner.dependencies.iter_mut().find(|d| d.same_edge(dependency)) {
            Some(existing) => *existing = dependency.clone(),
            None => inner.dependencies.push(dependency.clone()),
        }
        Ok(())
    }

    fn delete_dependency(&self, dependency: &Dependency) -> Result<()> {
        self.check_writable()?;
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.dependencies.retain(|d| !d.same_edge(dependency));
        Ok(())
    }

    fn blocker(&self, task_id: &str) -> Result<Option<BlockerRecord>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.blockers.get(task_id).cloned())
    }
}
