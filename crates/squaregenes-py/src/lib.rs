use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use squaregenes_core::{SimConfig, World};

/// PyO3 module exposing headless squaregenes runs to Python.
#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Default world configuration as a JSON object.
#[pyfunction]
fn default_config_json() -> PyResult<String> {
    serde_json::to_string(&SimConfig::default()).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Run one world and return its summary as JSON. `config_json` may hold a
/// partial configuration; explicit `grid_pow` and `seed` override it.
#[pyfunction]
#[pyo3(signature = (steps, grid_pow=None, seed=None, sample_every=100, config_json=None))]
fn run(
    steps: usize,
    grid_pow: Option<u32>,
    seed: Option<u64>,
    sample_every: usize,
    config_json: Option<&str>,
) -> PyResult<String> {
    let mut config = match config_json {
        Some(json) => SimConfig::from_json_str(json)
            .map_err(|e| PyValueError::new_err(format!("invalid config json: {e}")))?,
        None => SimConfig::default(),
    };
    if let Some(pow) = grid_pow {
        config.grid_pow = pow;
    }
    if let Some(seed) = seed {
        config.seed = seed;
    }
    let mut world = World::try_new(config).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let summary = world
        .try_run_experiment(steps, sample_every)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    serde_json::to_string(&summary).map_err(|e| PyValueError::new_err(e.to_string()))
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(default_config_json, m)?)?;
    m.add_function(wrap_pyfunction!(run, m)?)?;
    Ok(())
}
