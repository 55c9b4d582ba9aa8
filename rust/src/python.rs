//! Python bindings over an engine backed by the in-memory store.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use std::collections::BTreeMap;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::EngineConfig;
use crate::engine::DependencyEngine;
use crate::error::DependencyError;
use crate::models::{Dependency, DependencyKind, Task, TaskStatus};
use crate::store::InMemoryTaskStore;

fn to_py_err(err: DependencyError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Dependency engine with its own task store.
#[pyclass(name = "Engine")]
pub struct PyEngine {
    inner: DependencyEngine<InMemoryTaskStore>,
}

#[pymethods]
impl PyEngine {
    /// Create an engine, optionally configured from a TOML document.
    #[new]
    #[pyo3(signature = (config_toml=None))]
    fn new(config_toml: Option<&str>) -> PyResult<Self> {
        let config = match config_toml {
            Some(source) => EngineConfig::from_toml_str(source)
                .map_err(|e| PyValueError::new_err(e.to_string()))?,
            None => EngineConfig::default(),
        };
        Ok(Self {
            inner: DependencyEngine::new(InMemoryTaskStore::new(), config),
        })
    }

    #[pyo3(signature = (scope_id, task_id, effort_hours, priority=3, status="accepted", task_type="", title=None))]
    #[allow(clippy::too_many_arguments)]
    fn add_task(
        &self,
        scope_id: &str,
        task_id: &str,
        effort_hours: f64,
        priority: u8,
        status: &str,
        task_type: &str,
        title: Option<String>,
    ) -> PyResult<()> {
        let status: TaskStatus = status.parse().map_err(to_py_err)?;
        let mut task = Task::new(task_id, effort_hours, priority)
            .with_status(status)
            .with_type(task_type);
        if let Some(title) = title {
            task = task.with_title(title);
        }
        self.inner
            .store()
            .insert_task(scope_id, task.clone())
            .map_err(to_py_err)?;
        self.inner.upsert_task(scope_id, task).map_err(to_py_err)
    }

    /// Record a status change in the store and the graph.
    fn set_status(&self, task_id: &str, status: &str) -> PyResult<()> {
        let status: TaskStatus = status.parse().map_err(to_py_err)?;
        self.inner
            .store()
            .set_status(task_id, status)
            .map_err(to_py_err)?;
        self.inner
            .apply_status_change(task_id, status)
            .map(|_| ())
            .map_err(to_py_err)
    }

    /// Raises ValueError on cycles, unknown tasks, self-dependencies and bad kinds.
    #[pyo3(signature = (dependent_id, prerequisite_id, kind="finish_to_start", mandatory=true, lag_hours=0.0))]
    fn add_dependency(
        &self,
        dependent_id: &str,
        prerequisite_id: &str,
        kind: &str,
        mandatory: bool,
        lag_hours: f64,
    ) -> PyResult<()> {
        let kind: DependencyKind = kind.parse().map_err(to_py_err)?;
        let dependency = Dependency::new(dependent_id, prerequisite_id, kind)
            .mandatory(mandatory)
            .with_lag(lag_hours);
        self.inner
            .add_dependency_record(dependency)
            .map(|_| ())
            .map_err(to_py_err)
    }

    /// Returns whether an edge was removed.
    #[pyo3(signature = (dependent_id, prerequisite_id, kind="finish_to_start"))]
    fn remove_dependency(&self, dependent_id: &str, prerequisite_id: &str, kind: &str) -> PyResult<bool> {
        let kind: DependencyKind = kind.parse().map_err(to_py_err)?;
        self.inner
            .remove_dependency(dependent_id, prerequisite_id, kind)
            .map(|removed| removed.is_some())
            .map_err(to_py_err)
    }

    /// Returns (critical task ids, project duration in hours, slack per task).
    fn critical_path(&self, scope_id: &str) -> PyResult<(Vec<String>, f64, BTreeMap<String, f64>)> {
        let cp = self.inner.get_critical_path(scope_id).map_err(to_py_err)?;
        Ok((cp.tasks.clone(), cp.project_duration, cp.slack.clone()))
    }

    #[pyo3(signature = (scope_id, agent_type=None))]
    fn next_tasks(&self, scope_id: &str, agent_type: Option<&str>) -> PyResult<Vec<String>> {
        let tasks = self
            .inner
            .get_next_tasks(scope_id, agent_type)
            .map_err(to_py_err)?;
        Ok(tasks.into_iter().map(|t| t.id).collect())
    }

    /// Returns (severity, affected task ids, recommendations).
    #[pyo3(signature = (task_id, delay_hours=None))]
    fn blocking_impact(
        &self,
        task_id: &str,
        delay_hours: Option<f64>,
    ) -> PyResult<(String, Vec<String>, Vec<String>)> {
        let impact = match delay_hours {
            Some(hours) => self.inner.get_blocking_impact_with_delay(task_id, hours),
            None => self.inner.get_blocking_impact(task_id),
        }
        .map_err(to_py_err)?;
        Ok((
            impact.severity.to_string(),
            impact.affected,
            impact.recommendations,
        ))
    }

    #[pyo3(signature = (scope_id, pretty=false))]
    fn export_graph_json(&self, scope_id: &str, pretty: bool) -> PyResult<String> {
        let export = self.inner.export_graph(scope_id).map_err(to_py_err)?;
        let json = if pretty {
            export.to_json_pretty()
        } else {
            export.to_json()
        };
        json.map_err(|e| PyValueError::new_err(e.to_string()))
    }

    fn topological_order(&self, scope_id: &str) -> PyResult<Vec<String>> {
        self.inner.topological_order(scope_id).map_err(to_py_err)
    }
}

/// The depsched Python module.
#[pymodule]
fn depsched(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyEngine>()?;
    Ok(())
}
