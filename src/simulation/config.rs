//! Run configuration for deterministic and stochastic simulation.

use serde::{Deserialize, Serialize};

use super::observables::Observable;
use crate::error::SimulationError;

/// Error control for the adaptive Runge-Kutta integrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdeOptions {
    /// Absolute tolerance.
    pub atol: f64,
    /// Relative tolerance.
    pub rtol: f64,
    /// First trial step; estimated from the initial derivative when unset.
    pub initial_step: Option<f64>,
    /// Steps below this fail the run.
    pub min_step: f64,
    /// Accepted plus rejected steps over the whole run.
    pub max_internal_steps: u64,
}

impl Default for OdeOptions {
    fn default() -> Self {
        Self {
            atol: 1e-8,
            rtol: 1e-6,
            initial_step: None,
            min_step: 1e-14,
            max_internal_steps: 1_000_000,
        }
    }
}

/// Stochastic run options.
///
/// Without a seed the generator is seeded from system entropy and runs are
/// not reproducible.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsaOptions {
    pub seed: Option<u64>,
    /// Stop after this many reaction events.
    pub max_events: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Deterministic(OdeOptions),
    Stochastic(SsaOptions),
}

impl Default for Method {
    fn default() -> Self {
        Method::Deterministic(OdeOptions::default())
    }
}

/// Early stop once every output changes by less than `tolerance` per sample
/// interval for `window` consecutive intervals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SteadyState {
    pub tolerance: f64,
    pub window: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub method: Method,
    pub t_end: f64,
    /// Sample intervals; the trajectory has `n_steps + 1` rows.
    pub n_steps: usize,
    /// Outputs in place of raw species columns when non-empty.
    pub observables: Vec<Observable>,
    /// Deterministic runs only.
    pub steady_state: Option<SteadyState>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            method: Method::default(),
            t_end: 10.0,
            n_steps: 100,
            observables: Vec::new(),
            steady_state: None,
        }
    }
}

impl RunConfig {
    pub fn deterministic(t_end: f64, n_steps: usize) -> Self {
        Self {
            t_end,
            n_steps,
            ..Self::default()
        }
    }

    pub fn stochastic(t_end: f64, n_steps: usize, seed: Option<u64>) -> Self {
        Self {
            method: Method::Stochastic(SsaOptions { seed, max_events: None }),
            t_end,
            n_steps,
            ..Self::default()
        }
    }

    pub fn with_observables(mut self, observables: Vec<Observable>) -> Self {
        self.observables = observables;
        self
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let invalid = |message: String| Err(SimulationError::InvalidConfig(message));
        if !self.t_end.is_finite() || self.t_end <= 0.0 {
            return invalid(format!("t_end must be positive, got {}", self.t_end));
        }
        if self.n_steps == 0 {
            return invalid("n_steps must be positive".to_string());
        }
        if let Method::Deterministic(ode) = &self.method {
            if !(ode.atol > 0.0) || !(ode.rtol > 0.0) {
                return invalid(format!("tolerances must be positive (atol={}, rtol={})", ode.atol, ode.rtol));
            }
            if let Some(h) = ode.initial_step {
                if !(h > 0.0) {
                    return invalid(format!("initial_step must be positive, got {}", h));
                }
            }
            if !(ode.min_step >= 0.0) || ode.max_internal_steps == 0 {
                return invalid("min_step must be non-negative and max_internal_steps positive".to_string());
            }
        }
        if let Some(steady) = &self.steady_state {
            if !(steady.tolerance > 0.0) || steady.window == 0 {
                return invalid("steady state needs a positive tolerance and window".to_string());
            }
        }
        Ok(())
    }
}
