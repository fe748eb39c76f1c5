//! Python bindings.
//!
//! Models come in as JSON in the [`ModelSpec`](crate::model::ModelSpec)
//! layout. Networks go back as JSON, trajectories as `(headers, array,
//! truncated)` with a 2-D numpy array of samples.

use numpy::PyArray2;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

use crate::error::Error;
use crate::model::Model;
use crate::network::GeneratorConfig;
use crate::simulation::{self, Method, OdeOptions, RunConfig, SsaOptions, Trajectory};

fn to_py_err(err: Error) -> PyErr {
    match err {
        Error::Model(e) => PyValueError::new_err(e.to_string()),
        Error::Simulation(e) => PyRuntimeError::new_err(e.to_string()),
    }
}

fn generator_config(max_species: usize, max_reactions: usize, max_iterations: usize) -> GeneratorConfig {
    GeneratorConfig {
        max_species,
        max_reactions,
        max_iterations,
        ..GeneratorConfig::default()
    }
}

fn into_py<'py>(py: Python<'py>, trajectory: Trajectory) -> (Vec<String>, &'py PyArray2<f64>, bool) {
    let array = PyArray2::from_owned_array(py, trajectory.to_array());
    (trajectory.headers, array, trajectory.truncated)
}

/// Generate the reaction network of a JSON model.
///
/// # Returns
/// * JSON-encoded network (species, reactions, termination)
#[pyfunction]
#[pyo3(signature = (model_json, max_species=10000, max_reactions=100000, max_iterations=50))]
fn generate_network(
    py: Python<'_>,
    model_json: &str,
    max_species: usize,
    max_reactions: usize,
    max_iterations: usize,
) -> PyResult<String> {
    let model = Model::from_json(model_json).map_err(|e| to_py_err(e.into()))?;
    let config = generator_config(max_species, max_reactions, max_iterations);
    let network = py
        .allow_threads(|| model.generate_network(config))
        .map_err(|e| to_py_err(e.into()))?;
    serde_json::to_string(&network).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

/// Generate and simulate a JSON model.
///
/// # Arguments
/// * `method` - "ode" or "ssa"
/// * `seed` - RNG seed for "ssa"; runs are not reproducible without one
///
/// # Returns
/// * Tuple of (headers, samples, truncated)
#[pyfunction]
#[pyo3(signature = (model_json, method="ode", t_end=10.0, n_steps=100, seed=None, atol=1e-8, rtol=1e-6, max_events=None, max_species=10000))]
fn simulate<'py>(
    py: Python<'py>,
    model_json: &str,
    method: &str,
    t_end: f64,
    n_steps: usize,
    seed: Option<u64>,
    atol: f64,
    rtol: f64,
    max_events: Option<u64>,
    max_species: usize,
) -> PyResult<(Vec<String>, &'py PyArray2<f64>, bool)> {
    let method = match method {
        "ode" => Method::Deterministic(OdeOptions {
            atol,
            rtol,
            ..OdeOptions::default()
        }),
        "ssa" => Method::Stochastic(SsaOptions { seed, max_events }),
        other => {
            return Err(PyValueError::new_err(format!(
                "unknown method '{}', expected 'ode' or 'ssa'",
                other
            )))
        }
    };
    let model = Model::from_json(model_json).map_err(|e| to_py_err(e.into()))?;
    let run = RunConfig {
        method,
        t_end,
        n_steps,
        ..RunConfig::default()
    };
    let generator = GeneratorConfig {
        max_species,
        ..GeneratorConfig::default()
    };
    let (_, trajectory) = py
        .allow_threads(|| model.run(generator, &run))
        .map_err(to_py_err)?;
    Ok(into_py(py, trajectory))
}

/// Run independent stochastic trajectories in parallel (run i uses seed + i).
#[pyfunction]
#[pyo3(signature = (model_json, n_runs, seed, t_end=10.0, n_steps=100, max_species=10000))]
fn simulate_ensemble<'py>(
    py: Python<'py>,
    model_json: &str,
    n_runs: usize,
    seed: u64,
    t_end: f64,
    n_steps: usize,
    max_species: usize,
) -> PyResult<Vec<(Vec<String>, &'py PyArray2<f64>, bool)>> {
    let model = Model::from_json(model_json).map_err(|e| to_py_err(e.into()))?;
    let run = RunConfig {
        observables: model.observables.clone(),
        ..RunConfig::stochastic(t_end, n_steps, None)
    };
    let generator = GeneratorConfig {
        max_species,
        ..GeneratorConfig::default()
    };
    let trajectories = py
        .allow_threads(|| -> Result<Vec<Trajectory>, Error> {
            let network = model.generate_network(generator)?;
            Ok(simulation::simulate_ensemble(&network, &run, n_runs, seed)?)
        })
        .map_err(to_py_err)?;
    Ok(trajectories.into_iter().map(|t| into_py(py, t)).collect())
}

#[pymodule]
fn rulenet(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(generate_network, m)?)?;
    m.add_function(wrap_pyfunction!(simulate, m)?)?;
    m.add_function(wrap_pyfunction!(simulate_ensemble, m)?)?;
    Ok(())
}
