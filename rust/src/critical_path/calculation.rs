//! Critical path calculation using forward and backward passes.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::graph::{DependencyGraph, NodeIdx};
use crate::models::DependencyKind;
use crate::{log_checks, log_debug};

use super::types::{CriticalPath, ParallelGroup, TaskTiming, EPSILON};

/// Lower bound a prerequisite puts on its dependent's earliest start.
#[inline]
fn earliest_start_bound(
    kind: DependencyKind,
    lag: f64,
    prereq_es: f64,
    prereq_ef: f64,
    effort: f64,
) -> f64 {
    match kind {
        DependencyKind::FinishToStart => prereq_ef + lag,
        DependencyKind::StartToStart => prereq_es + lag,
        DependencyKind::FinishToFinish => prereq_ef + lag - effort,
        DependencyKind::StartToFinish => prereq_es + lag - effort,
    }
}

/// Upper bound a dependent puts on its prerequisite's latest finish.
#[inline]
fn latest_finish_bound(
    kind: DependencyKind,
    lag: f64,
    dependent_ls: f64,
    dependent_lf: f64,
    effort: f64,
) -> f64 {
    match kind {
        DependencyKind::FinishToStart => dependent_ls - lag,
        DependencyKind::StartToStart => dependent_ls - lag + effort,
        DependencyKind::FinishToFinish => dependent_lf - lag,
        DependencyKind::StartToFinish => dependent_lf - lag + effort,
    }
}

/// Calculate the critical path of every task in the graph.
///
/// Tasks are visited in topological order for the forward pass and in
/// reverse for the backward pass. Mandatory and advisory edges both shape
/// the timings; only readiness treats them differently.
pub fn calculate_critical_path(graph: &DependencyGraph, verbosity: u8) -> Result<CriticalPath> {
    let order = graph.topological_order()?;
    let n = graph.len();

    // Forward pass: earliest start/finish
    let mut es = vec![0.0_f64; n];
    let mut ef = vec![0.0_f64; n];
    for &idx in &order {
        let i = idx as usize;
        let effort = graph.task(idx).effort_hours;
        let mut earliest_start = 0.0_f64;
        for edge in graph.prerequisites_of(idx) {
            let p = edge.node as usize;
            let bound = earliest_start_bound(edge.kind, edge.lag_hours, es[p], ef[p], effort);
            if bound > earliest_start {
                earliest_start = bound;
            }
        }
        es[i] = earliest_start;
        ef[i] = earliest_start + effort;
    }

    let project_duration = ef.iter().copied().fold(0.0_f64, f64::max);

    // Backward pass: latest start/finish
    let mut ls = vec![0.0_f64; n];
    let mut lf = vec![0.0_f64; n];
    for &idx in order.iter().rev() {
        let i = idx as usize;
        let effort = graph.task(idx).effort_hours;
        let mut latest_finish = project_duration;
        for edge in graph.dependents_of(idx) {
            let s = edge.node as usize;
            let bound = latest_finish_bound(edge.kind, edge.lag_hours, ls[s], lf[s], effort);
            if bound < latest_finish {
                latest_finish = bound;
            }
        }
        lf[i] = latest_finish;
        ls[i] = latest_finish - effort;
    }

    let mut timings: BTreeMap<String, TaskTiming> = BTreeMap::new();
    let mut slack: BTreeMap<String, f64> = BTreeMap::new();
    let mut node_slack = vec![0.0_f64; n];
    for idx in graph.nodes() {
        let i = idx as usize;
        let mut task_slack = ls[i] - es[i];
        if task_slack < EPSILON {
            task_slack = 0.0;
        }
        node_slack[i] = task_slack;
        let id = graph.id_of(idx);
        log_debug!(
            verbosity,
            "  {}: es={} ef={} ls={} lf={} slack={}",
            id,
            es[i],
            ef[i],
            ls[i],
            lf[i],
            task_slack
        );
        slack.insert(id.to_string(), task_slack);
        timings.insert(
            id.to_string(),
            TaskTiming {
                earliest_start: es[i],
                earliest_finish: ef[i],
                latest_start: ls[i],
                latest_finish: lf[i],
                slack: task_slack,
            },
        );
    }

    // Critical tasks in execution order: by earliest start, topological order within ties
    let mut critical: Vec<NodeIdx> = order
        .iter()
        .copied()
        .filter(|&idx| node_slack[idx as usize] == 0.0)
        .collect();
    critical.sort_by(|a, b| es[*a as usize].total_cmp(&es[*b as usize]));
    let tasks: Vec<String> = critical
        .iter()
        .map(|&idx| graph.id_of(idx).to_string())
        .collect();

    let parallel_groups = find_parallel_groups(graph, &es, &node_slack);

    log_checks!(
        verbosity,
        "Critical path for scope {}: duration={} tasks={:?} groups={}",
        graph.scope_id(),
        project_duration,
        tasks,
        parallel_groups.len()
    );

    Ok(CriticalPath {
        scope_id: graph.scope_id().to_string(),
        revision: graph.revision(),
        tasks,
        project_duration,
        slack,
        timings,
        parallel_groups,
    })
}

/// Group tasks sharing an earliest start into parallelization candidates.
///
/// A group needs at least two members, at least one of them non-critical,
/// and no dependency path, direct or transitive, between any two members.
fn find_parallel_groups(
    graph: &DependencyGraph,
    es: &[f64],
    node_slack: &[f64],
) -> Vec<ParallelGroup> {
    let mut by_start: Vec<NodeIdx> = graph.nodes().collect();
    by_start.sort_by(|&a, &b| {
        es[a as usize]
            .total_cmp(&es[b as usize])
            .then_with(|| graph.id_of(a).cmp(graph.id_of(b)))
    });

    let mut groups = Vec::new();
    let mut start = 0;
    while start < by_start.len() {
        let bucket_es = es[by_start[start] as usize];
        let mut end = start + 1;
        while end < by_start.len() && (es[by_start[end] as usize] - bucket_es).abs() < EPSILON {
            end += 1;
        }

        let bucket = &by_start[start..end];
        if bucket.len() >= 2 {
            let mut members: Vec<NodeIdx> = Vec::with_capacity(bucket.len());
            for &candidate in bucket {
                if members
                    .iter()
                    .all(|&m| !graph.reaches(m, candidate) && !graph.reaches(candidate, m))
                {
                    members.push(candidate);
                }
            }
            let has_float = members.iter().any(|&m| node_slack[m as usize] > 0.0);
            if members.len() >= 2 && has_float {
                groups.push(ParallelGroup {
                    earliest_start: bucket_es,
                    task_ids: members
                        .iter()
                        .map(|&m| graph.id_of(m).to_string())
                        .collect(),
                });
            }
        }
        start = end;
    }
    groups
}
