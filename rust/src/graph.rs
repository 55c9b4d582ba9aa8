//! Dependency graph over the tasks of one scope.
//!
//! Tasks live in an arena indexed by [`NodeIdx`]; edges are stored twice, as
//! adjacency lists in both directions, so forward and backward traversals
//! are plain vector scans. Every mutation keeps the graph acyclic.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use crate::error::{DependencyError, Result};
use crate::models::{Dependency, DependencyKind, ScopeId, Task, TaskStatus};

/// Arena index of a task (u32 for compact adjacency lists).
pub type NodeIdx = u32;

/// One end of a dependency edge as seen from the other end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// The node at the far end of the edge.
    pub node: NodeIdx,
    pub kind: DependencyKind,
    pub lag_hours: f64,
    pub mandatory: bool,
}

/// Deterministic copy of a graph: nodes sorted by id, edges sorted by
/// (prerequisite, dependent, kind).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub scope_id: ScopeId,
    pub nodes: Vec<Task>,
    pub edges: Vec<Dependency>,
}

/// Directed acyclic graph of tasks; edges point prerequisite -> dependent.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    scope_id: ScopeId,
    /// task id -> arena index
    index: FxHashMap<String, NodeIdx>,
    tasks: Vec<Task>,
    /// Outgoing edges: prerequisite -> its dependents.
    dependents: Vec<Vec<Edge>>,
    /// Incoming edges: dependent -> its prerequisites.
    prerequisites: Vec<Vec<Edge>>,
    edge_count: usize,
    /// Bumped on every mutation; caches key on it.
    revision: u64,
}

impl DependencyGraph {
    pub fn new(scope_id: impl Into<ScopeId>) -> Self {
        Self {
            scope_id: scope_id.into(),
            index: FxHashMap::default(),
            tasks: Vec::new(),
            dependents: Vec::new(),
            prerequisites: Vec::new(),
            edge_count: 0,
            revision: 0,
        }
    }

    /// Build a graph from store records.
    ///
    /// Records are applied in sorted order so the resulting arena layout does
    /// not depend on the order the store returned them in. Invalid records are
    /// rejected with the same errors live mutations get.
    pub fn from_records(
        scope_id: impl Into<ScopeId>,
        mut tasks: Vec<Task>,
        mut dependencies: Vec<Dependency>,
    ) -> Result<Self> {
        let mut graph = Self::new(scope_id);
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        for task in tasks {
            graph.upsert_task(task)?;
        }
        dependencies.sort_by(|a, b| {
            (&a.prerequisite_id, &a.dependent_id, a.kind).cmp(&(
                &b.prerequisite_id,
                &b.dependent_id,
                b.kind,
            ))
        });
        for dep in dependencies {
            graph.add_dependency(dep)?;
        }
        Ok(graph)
    }

    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Arena index for a task id.
    #[inline]
    pub fn node(&self, task_id: &str) -> Option<NodeIdx> {
        self.index.get(task_id).copied()
    }

    #[inline]
    pub fn task(&self, idx: NodeIdx) -> &Task {
        &self.tasks[idx as usize]
    }

    pub fn task_by_id(&self, task_id: &str) -> Option<&Task> {
        self.node(task_id).map(|idx| self.task(idx))
    }

    #[inline]
    pub fn id_of(&self, idx: NodeIdx) -> &str {
        &self.tasks[idx as usize].id
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.index.contains_key(task_id)
    }

    /// All arena indices.
    pub fn nodes(&self) -> impl Iterator<Item = NodeIdx> {
        0..self.tasks.len() as NodeIdx
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Edges to the tasks that depend on `idx`.
    #[inline]
    pub fn dependents_of(&self, idx: NodeIdx) -> &[Edge] {
        &self.dependents[idx as usize]
    }

    /// Edges to the tasks `idx` depends on.
    #[inline]
    pub fn prerequisites_of(&self, idx: NodeIdx) -> &[Edge] {
        &self.prerequisites[idx as usize]
    }

    fn require(&self, task_id: &str) -> Result<NodeIdx> {
        self.node(task_id)
            .ok_or_else(|| DependencyError::UnknownTask(task_id.to_string()))
    }

    /// Insert a task, or replace the record of an existing one.
    pub fn upsert_task(&mut self, task: Task) -> Result<NodeIdx> {
        task.validate()?;
        self.revision += 1;
        if let Some(&idx) = self.index.get(&task.id) {
            self.tasks[idx as usize] = task;
            return Ok(idx);
        }
        let idx = self.tasks.len() as NodeIdx;
        self.index.insert(task.id.clone(), idx);
        self.tasks.push(task);
        self.dependents.push(Vec::new());
        self.prerequisites.push(Vec::new());
        Ok(idx)
    }

    /// Apply a status change reported by the task store.
    ///
    /// Returns the previous status. Setting the current status again is a
    /// no-op that does not bump the revision.
    pub fn set_status(&mut self, task_id: &str, status: TaskStatus) -> Result<TaskStatus> {
        let idx = self.require(task_id)?;
        let current = self.tasks[idx as usize].status;
        if current == status {
            return Ok(current);
        }
        if !current.can_transition_to(status) {
            return Err(DependencyError::InvalidTransition {
                task_id: task_id.to_string(),
                from: current,
                to: status,
            });
        }
        self.tasks[idx as usize].status = status;
        self.revision += 1;
        Ok(current)
    }

    /// Find an existing edge with the same (dependent, prerequisite, kind).
    pub fn find_dependency(
        &self,
        dependent_id: &str,
        prerequisite_id: &str,
        kind: DependencyKind,
    ) -> Option<Dependency> {
        let dependent = self.node(dependent_id)?;
        let prerequisite = self.node(prerequisite_id)?;
        self.prerequisites[dependent as usize]
            .iter()
            .find(|e| e.node == prerequisite && e.kind == kind)
            .map(|e| self.edge_record(dependent, e))
    }

    /// Rebuild the dependency record for an incoming edge of `dependent`.
    pub fn edge_record(&self, dependent: NodeIdx, edge: &Edge) -> Dependency {
        Dependency {
            dependent_id: self.id_of(dependent).to_string(),
            prerequisite_id: self.id_of(edge.node).to_string(),
            kind: edge.kind,
            lag_hours: edge.lag_hours,
            mandatory: edge.mandatory,
        }
    }

    /// Validate a dependency without inserting it.
    ///
    /// Returns `Ok(Some(existing))` when an identical edge is already present,
    /// `Ok(None)` when the edge can be inserted.
    pub fn check_dependency(&self, dep: &Dependency) -> Result<Option<Dependency>> {
        if dep.dependent_id == dep.prerequisite_id {
            return Err(DependencyError::SelfDependency(dep.dependent_id.clone()));
        }
        let dependent = self.require(&dep.dependent_id)?;
        let prerequisite = self.require(&dep.prerequisite_id)?;
        if !dep.lag_hours.is_finite() || dep.lag_hours < 0.0 {
            return Err(DependencyError::InvalidLag {
                dependent: dep.dependent_id.clone(),
                prerequisite: dep.prerequisite_id.clone(),
                lag_hours: dep.lag_hours,
            });
        }
        if let Some(existing) =
            self.find_dependency(&dep.dependent_id, &dep.prerequisite_id, dep.kind)
        {
            return Ok(Some(existing));
        }
        // The new edge runs prerequisite -> dependent; it closes a cycle iff the
        // prerequisite is already downstream of the dependent.
        if let Some(path) = self.find_path(dependent, prerequisite) {
            let mut cycle: Vec<String> = path.iter().map(|&n| self.id_of(n).to_string()).collect();
            cycle.push(dep.dependent_id.clone());
            return Err(DependencyError::CircularDependency {
                dependent: dep.dependent_id.clone(),
                prerequisite: dep.prerequisite_id.clone(),
                cycle,
            });
        }
        Ok(None)
    }

    /// Add a dependency edge.
    ///
    /// Re-adding an identical (dependent, prerequisite, kind) edge returns the
    /// stored record unchanged. On error the graph is untouched.
    pub fn add_dependency(&mut self, dep: Dependency) -> Result<Dependency> {
        if let Some(existing) = self.check_dependency(&dep)? {
            return Ok(existing);
        }
        // check_dependency resolved both ids
        let dependent = self.require(&dep.dependent_id)?;
        let prerequisite = self.require(&dep.prerequisite_id)?;

        self.dependents[prerequisite as usize].push(Edge {
            node: dependent,
            kind: dep.kind,
            lag_hours: dep.lag_hours,
            mandatory: dep.mandatory,
        });
        self.prerequisites[dependent as usize].push(Edge {
            node: prerequisite,
            kind: dep.kind,
            lag_hours: dep.lag_hours,
            mandatory: dep.mandatory,
        });
        self.edge_count += 1;
        self.revision += 1;
        Ok(dep)
    }

    /// Remove one edge. Returns the removed record, or `None` if absent.
    pub fn remove_dependency(
        &mut self,
        dependent_id: &str,
        prerequisite_id: &str,
        kind: DependencyKind,
    ) -> Option<Dependency> {
        let removed = self.find_dependency(dependent_id, prerequisite_id, kind)?;
        let dependent = self.node(dependent_id)?;
        let prerequisite = self.node(prerequisite_id)?;
        self.dependents[prerequisite as usize].retain(|e| !(e.node == dependent && e.kind == kind));
        self.prerequisites[dependent as usize]
            .retain(|e| !(e.node == prerequisite && e.kind == kind));
        self.edge_count -= 1;
        self.revision += 1;
        Some(removed)
    }

    /// Path `from -> ... -> to` following dependent edges, if one exists.
    ///
    /// Iterative DFS with an explicit stack; each node is expanded once.
    pub fn find_path(&self, from: NodeIdx, to: NodeIdx) -> Option<Vec<NodeIdx>> {
        if from == to {
            return Some(vec![from]);
        }
        let mut parent: FxHashMap<NodeIdx, NodeIdx> = FxHashMap::default();
        let mut stack: Vec<NodeIdx> = vec![from];

        while let Some(node) = stack.pop() {
            for edge in &self.dependents[node as usize] {
                let next = edge.node;
                if next == from || parent.contains_key(&next) {
                    continue;
                }
                parent.insert(next, node);
                if next == to {
                    let mut path = vec![to];
                    let mut cur = to;
                    while let Some(&p) = parent.get(&cur) {
                        path.push(p);
                        cur = p;
                    }
                    path.reverse();
                    return Some(path);
                }
                stack.push(next);
            }
        }
        None
    }

    /// Whether `target` is reachable from `from` via dependent edges.
    pub fn reaches(&self, from: NodeIdx, target: NodeIdx) -> bool {
        self.find_path(from, target).is_some()
    }

    /// Kahn's algorithm; ready nodes are released in ascending task id order.
    pub fn topological_order(&self) -> Result<Vec<NodeIdx>> {
        let n = self.tasks.len();
        let mut in_degree: Vec<usize> = self.prerequisites.iter().map(|p| p.len()).collect();

        let mut ready: BinaryHeap<Reverse<(&str, NodeIdx)>> = self
            .nodes()
            .filter(|&idx| in_degree[idx as usize] == 0)
            .map(|idx| Reverse((self.id_of(idx), idx)))
            .collect();

        let mut order: Vec<NodeIdx> = Vec::with_capacity(n);
        while let Some(Reverse((_, idx))) = ready.pop() {
            order.push(idx);
            for edge in &self.dependents[idx as usize] {
                let degree = &mut in_degree[edge.node as usize];
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse((self.id_of(edge.node), edge.node)));
                }
            }
        }

        if order.len() != n {
            // Unreachable while mutations go through add_dependency.
            let stuck = self
                .nodes()
                .find(|&idx| in_degree[idx as usize] > 0)
                .map(|idx| self.id_of(idx).to_string())
                .unwrap_or_default();
            return Err(DependencyError::CircularDependency {
                dependent: stuck.clone(),
                prerequisite: stuck.clone(),
                cycle: vec![stuck],
            });
        }
        Ok(order)
    }

    /// Task ids in deterministic topological order.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        Ok(self
            .topological_order()?
            .into_iter()
            .map(|idx| self.id_of(idx).to_string())
            .collect())
    }

    /// Every task transitively depending on `idx`, in BFS order (excluding `idx`).
    pub fn dependents_closure(&self, idx: NodeIdx) -> Vec<NodeIdx> {
        let mut visited = vec![false; self.tasks.len()];
        visited[idx as usize] = true;
        let mut queue: VecDeque<NodeIdx> = VecDeque::from([idx]);
        let mut closure = Vec::new();

        while let Some(node) = queue.pop_front() {
            for edge in &self.dependents[node as usize] {
                if !visited[edge.node as usize] {
                    visited[edge.node as usize] = true;
                    closure.push(edge.node);
                    queue.push_back(edge.node);
                }
            }
        }
        closure
    }

    /// Independent cycle check: iterative three-colour DFS.
    pub fn has_cycle(&self) -> bool {
        const WHITE: u8 = 0;
        const GREY: u8 = 1;
        const BLACK: u8 = 2;

        let mut colour = vec![WHITE; self.tasks.len()];
        for root in self.nodes() {
            if colour[root as usize] != WHITE {
                continue;
            }
            // (node, next edge position)
            let mut stack: Vec<(NodeIdx, usize)> = vec![(root, 0)];
            colour[root as usize] = GREY;
            while let Some(top) = stack.last_mut() {
                let (node, pos) = *top;
                let edges = &self.dependents[node as usize];
                if pos < edges.len() {
                    top.1 += 1;
                    let next = edges[pos].node;
                    match colour[next as usize] {
                        GREY => return true,
                        WHITE => {
                            colour[next as usize] = GREY;
                            stack.push((next, 0));
                        }
                        _ => {}
                    }
                } else {
                    colour[node as usize] = BLACK;
                    stack.pop();
                }
            }
        }
        false
    }

    /// All dependency records, sorted by (prerequisite, dependent, kind).
    pub fn dependencies(&self) -> Vec<Dependency> {
        let mut deps: Vec<Dependency> = self
            .nodes()
            .flat_map(|dependent| {
                self.prerequisites[dependent as usize]
                    .iter()
                    .map(move |e| self.edge_record(dependent, e))
            })
            .collect();
        deps.sort_by(|a, b| {
            (&a.prerequisite_id, &a.dependent_id, a.kind).cmp(&(
                &b.prerequisite_id,
                &b.dependent_id,
                b.kind,
            ))
        });
        deps
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let mut nodes: Vec<Task> = self.tasks.clone();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        GraphSnapshot {
            scope_id: self.scope_id.clone(),
            nodes,
            edges: self.dependencies(),
        }
    }
}
