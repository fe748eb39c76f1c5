//! Dormand–Prince 5(4) integrator with adaptive steps.
//!
//! Steps are shortened to land exactly on each sample time, so samples are
//! never interpolated. The local error estimate is the RMS of the embedded
//! 4th-order difference scaled by `atol + rtol * |y|`.

use tracing::debug;

use super::config::{OdeOptions, RunConfig};
use super::system::ReactionSystem;
use super::trajectory::{Outputs, Recorder, Trajectory};
use crate::error::SimulationError;
use crate::interrupt::Interrupt;

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// 5th minus 4th order weights
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Stage buffers reused across steps.
struct Stages {
    k: [Vec<f64>; 7],
    scratch: Vec<f64>,
    next: Vec<f64>,
}

impl Stages {
    fn new(n: usize) -> Self {
        Self {
            k: std::array::from_fn(|_| vec![0.0; n]),
            scratch: vec![0.0; n],
            next: vec![0.0; n],
        }
    }

    /// One trial step from `y` with `k[0] = f(y)`. Fills `next` and `k[6]`
    /// and returns the scaled error norm.
    fn step(&mut self, system: &ReactionSystem, y: &[f64], h: f64, options: &OdeOptions) -> f64 {
        let n = y.len();
        let Stages { k, scratch, next } = self;

        for i in 0..n {
            scratch[i] = y[i] + h * A21 * k[0][i];
        }
        system.derivatives(scratch, &mut k[1]);
        for i in 0..n {
            scratch[i] = y[i] + h * (A31 * k[0][i] + A32 * k[1][i]);
        }
        system.derivatives(scratch, &mut k[2]);
        for i in 0..n {
            scratch[i] = y[i] + h * (A41 * k[0][i] + A42 * k[1][i] + A43 * k[2][i]);
        }
        system.derivatives(scratch, &mut k[3]);
        for i in 0..n {
            scratch[i] = y[i] + h * (A51 * k[0][i] + A52 * k[1][i] + A53 * k[2][i] + A54 * k[3][i]);
        }
        system.derivatives(scratch, &mut k[4]);
        for i in 0..n {
            scratch[i] =
                y[i] + h * (A61 * k[0][i] + A62 * k[1][i] + A63 * k[2][i] + A64 * k[3][i] + A65 * k[4][i]);
        }
        system.derivatives(scratch, &mut k[5]);
        for i in 0..n {
            next[i] =
                y[i] + h * (A71 * k[0][i] + A73 * k[2][i] + A74 * k[3][i] + A75 * k[4][i] + A76 * k[5][i]);
        }
        system.derivatives(next, &mut k[6]);

        if n == 0 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            let err = h * (E1 * k[0][i] + E3 * k[2][i] + E4 * k[3][i] + E5 * k[4][i] + E6 * k[5][i] + E7 * k[6][i]);
            let scale = options.atol + options.rtol * y[i].abs().max(next[i].abs());
            sum += (err / scale).powi(2);
        }
        (sum / n as f64).sqrt()
    }
}

/// Starting step from the size of the state relative to its derivative.
fn initial_step(y: &[f64], dydt: &[f64], options: &OdeOptions, interval: f64) -> f64 {
    if let Some(h) = options.initial_step {
        return h.min(interval);
    }
    let rms = |v: &[f64], w: &[f64]| -> f64 {
        if v.is_empty() {
            return 0.0;
        }
        let sum: f64 = v
            .iter()
            .zip(w)
            .map(|(a, b)| (a / (options.atol + options.rtol * b.abs())).powi(2))
            .sum();
        (sum / v.len() as f64).sqrt()
    };
    let d0 = rms(y, y);
    let d1 = rms(dydt, y);
    let h = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
    h.min(interval)
}

fn first_non_finite(values: &[f64]) -> usize {
    values.iter().position(|v| !v.is_finite()).unwrap_or(0)
}

/// Integrate from `initial` to `config.t_end`, sampling `n_steps + 1` rows.
pub(crate) fn integrate(
    system: &ReactionSystem,
    initial: &[f64],
    config: &RunConfig,
    options: &OdeOptions,
    mut recorder: Recorder<'_>,
    interrupt: &Interrupt,
) -> Result<Trajectory, SimulationError> {
    let n = system.n_species();
    let interval = config.t_end / config.n_steps as f64;
    let mut y = initial.to_vec();
    let mut stages = Stages::new(n);
    system.derivatives(&y, &mut stages.k[0]);
    let mut h = initial_step(&y, &stages.k[0], options, interval);
    let mut t = 0.0;
    let mut steps: u64 = 0;
    let mut quiet = 0;

    recorder.record(t, &y);
    for sample in 1..=config.n_steps {
        let target = config.t_end * sample as f64 / config.n_steps as f64;
        while t < target {
            if interrupt.check().is_some() {
                debug!(time = t, steps, "integration interrupted");
                return Ok(recorder.finish(true));
            }
            steps += 1;
            if steps > options.max_internal_steps {
                return Err(SimulationError::StepBudgetExceeded { time: t, steps: options.max_internal_steps });
            }

            let last = h >= target - t;
            let step = if last { target - t } else { h };
            let err = stages.step(system, &y, step, options);

            if !err.is_finite() {
                h = step * MIN_FACTOR;
                if h < options.min_step {
                    return Err(SimulationError::NonFinite {
                        time: t,
                        species: first_non_finite(&stages.next),
                    });
                }
                continue;
            }

            let factor = if err == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            };
            if err <= 1.0 {
                t = if last { target } else { t + step };
                std::mem::swap(&mut y, &mut stages.next);
                stages.k.swap(0, 6);
                h = if last { h.max(step * factor) } else { step * factor };
            } else {
                h = step * factor.min(1.0);
                if h < options.min_step {
                    return Err(SimulationError::StepSizeUnderflow {
                        time: t,
                        step: h,
                        state: y,
                    });
                }
            }
        }

        recorder.record(t, &y);
        if let Some(steady) = &config.steady_state {
            match recorder.last_change() {
                Some(change) if change < steady.tolerance => quiet += 1,
                _ => quiet = 0,
            }
            if quiet >= steady.window {
                debug!(time = t, "steady state reached");
                break;
            }
        }
    }
    debug!(steps, "integration finished");
    Ok(recorder.finish(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::graph::SpeciesGraph;
    use crate::model::molecule::MoleculeTypes;
    use crate::network::generator::{Network, Reaction, Termination};
    use crate::network::store::Species;
    use crate::simulation::config::SteadyState;

    fn decay(rate: f64) -> Network {
        Network {
            types: MoleculeTypes::new(),
            species: vec![Species {
                index: 0,
                graph: SpeciesGraph::new(),
                quantity: 1.0,
            }],
            reactions: vec![Reaction {
                reactants: vec![(0, 1)],
                products: vec![],
                rule: 0,
                rule_name: "decay".to_string(),
                statistical_factor: 1.0,
                rate,
            }],
            rules: Vec::new(),
            termination: Termination::Converged,
            iterations: 1,
            rejected_products: 0,
        }
    }

    fn run(network: &Network, config: &RunConfig) -> Result<Trajectory, SimulationError> {
        let system = ReactionSystem::from_network(network);
        let outputs = Outputs::Species(1);
        let recorder = Recorder::new(&outputs, vec!["time".into(), "X".into()], config.n_steps + 1);
        integrate(
            &system,
            &network.initial_quantities(),
            config,
            &OdeOptions::default(),
            recorder,
            &Interrupt::none(),
        )
    }

    #[test]
    fn test_exponential_decay() {
        let network = decay(0.7);
        let trajectory = run(&network, &RunConfig::deterministic(5.0, 10)).unwrap();
        assert_eq!(trajectory.len(), 11);
        for row in &trajectory.data {
            let exact = (-0.7 * row[0]).exp();
            assert!((row[1] - exact).abs() < 1e-5, "t={} got {} want {}", row[0], row[1], exact);
        }
        assert_eq!(trajectory.data[10][0], 5.0);
        assert!(!trajectory.truncated);
    }

    #[test]
    fn test_steady_state_stops_early() {
        let network = decay(5.0);
        let config = RunConfig {
            steady_state: Some(SteadyState {
                tolerance: 1e-6,
                window: 2,
            }),
            ..RunConfig::deterministic(100.0, 100)
        };
        let trajectory = run(&network, &config).unwrap();
        assert!(trajectory.len() < 101);
        assert!(!trajectory.truncated);
    }

    #[test]
    fn test_blow_up_underflows_step_size() {
        // 2X -> 3X with X(0) = 1 diverges at t = 1
        let mut network = decay(1.0);
        network.reactions[0].reactants = vec![(0, 2)];
        network.reactions[0].products = vec![(0, 3)];
        let err = run(&network, &RunConfig::deterministic(2.0, 4)).unwrap_err();
        match err {
            SimulationError::StepSizeUnderflow { time, step, state } => {
                assert!(time > 0.9 && time < 1.1, "t={}", time);
                assert!(step < OdeOptions::default().min_step);
                assert_eq!(state.len(), 1);
                assert!(state[0] > 10.0);
            }
            other => panic!("expected step size underflow, got {:?}", other),
        }
    }

    #[test]
    fn test_step_budget() {
        let network = decay(1.0);
        let system = ReactionSystem::from_network(&network);
        let outputs = Outputs::Species(1);
        let config = RunConfig::deterministic(10.0, 1);
        let options = OdeOptions {
            max_internal_steps: 2,
            initial_step: Some(1e-3),
            ..OdeOptions::default()
        };
        let err = integrate(
            &system,
            &[1.0],
            &config,
            &options,
            Recorder::new(&outputs, vec![], 2),
            &Interrupt::none(),
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::StepBudgetExceeded { .. }));
    }
}
