//! Python extension module `_bugmine_core`.

use std::path::PathBuf;

use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3::wrap_pyfunction;

use crate::config::MinerConfig;
use crate::errors::MinerError;
use crate::models::DatasetSummary;
use crate::models::{MethodRecord, TicketRecord, VersionRecord};
use crate::store::DatasetStore;

fn summary_dict<'py>(
    py: Python<'py>,
    project: &str,
    summary: &DatasetSummary,
    diagnostics: usize,
) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("project", project)?;
    dict.set_item("versions", summary.versions)?;
    dict.set_item("versions_dropped", summary.versions_dropped)?;
    dict.set_item("tickets", summary.tickets)?;
    dict.set_item("tickets_dropped", summary.tickets_dropped)?;
    dict.set_item("tickets_inferred", summary.tickets_inferred)?;
    dict.set_item("methods", summary.methods)?;
    dict.set_item("buggy_methods", summary.buggy_methods)?;
    dict.set_item("buggy_ratio", summary.buggy_ratio())?;
    dict.set_item("proportion", summary.proportion)?;
    dict.set_item("diagnostics", diagnostics)?;
    Ok(dict)
}

/// Mine the project described by the TOML file at `config_path`, store the
/// dataset and return its summary counts.
#[pyfunction]
fn mine_project<'py>(py: Python<'py>, config_path: PathBuf) -> PyResult<Bound<'py, PyDict>> {
    let config = MinerConfig::load(&config_path)?;
    let dataset = py.allow_threads(|| crate::mine_and_store(&config))?;
    summary_dict(
        py,
        &dataset.project.name,
        &dataset.summary,
        dataset.diagnostics.len(),
    )
}

/// Load the stored records of `project` as lists keyed by record kind.
#[pyfunction]
fn load_dataset<'py>(
    py: Python<'py>,
    db_path: PathBuf,
    project: &str,
) -> PyResult<Bound<'py, PyDict>> {
    let store = DatasetStore::open(&db_path)?;
    store.init_schema()?;
    let stored = store
        .load_project(project)?
        .ok_or_else(|| MinerError::Config(format!("project {project} is not stored")))?;

    let dict = PyDict::new(py);
    dict.set_item("project", stored.name)?;
    dict.set_item("proportion", stored.proportion)?;
    dict.set_item("versions", store.load_versions(project)?)?;
    dict.set_item("tickets", store.load_tickets(project)?)?;
    dict.set_item("methods", store.load_methods(project)?)?;
    Ok(dict)
}

#[pymodule]
fn _bugmine_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<VersionRecord>()?;
    m.add_class::<TicketRecord>()?;
    m.add_class::<MethodRecord>()?;

    m.add_function(wrap_pyfunction!(mine_project, m)?)?;
    m.add_function(wrap_pyfunction!(load_dataset, m)?)?;
    Ok(())
}
