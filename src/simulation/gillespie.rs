//! Gillespie direct method over integer populations, with parallel ensembles.
//!
//! Propensities are recomputed in full after each event. Samples hold the
//! population in effect at each sample time, since the state is piecewise
//! constant between events.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use super::config::{Method, RunConfig, SsaOptions};
use super::system::ReactionSystem;
use super::trajectory::{Outputs, Recorder, Trajectory};
use crate::error::SimulationError;
use crate::interrupt::Interrupt;
use crate::network::generator::Network;

/// Round initial quantities to populations.
fn populations(initial: &[f64]) -> Result<Vec<i64>, SimulationError> {
    initial
        .iter()
        .enumerate()
        .map(|(i, &q)| {
            if !q.is_finite() || q < 0.0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "species {} has initial quantity {}",
                    i, q
                )));
            }
            Ok(q.round() as i64)
        })
        .collect()
}

/// Run a single trajectory.
pub(crate) fn simulate(
    system: &ReactionSystem,
    initial: &[f64],
    config: &RunConfig,
    options: &SsaOptions,
    mut recorder: Recorder<'_>,
    interrupt: &Interrupt,
) -> Result<Trajectory, SimulationError> {
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut current = populations(initial)?;
    let mut quantities: Vec<f64> = current.iter().map(|&p| p as f64).collect();
    let mut rates = vec![0.0; system.n_reactions()];
    let sample_time = |i: usize| config.t_end * i as f64 / config.n_steps as f64;

    let mut current_time = 0.0;
    let mut events: u64 = 0;
    let mut next_sample = 1;
    let mut truncated = false;
    recorder.record(0.0, &quantities);

    while next_sample <= config.n_steps {
        if interrupt.check().is_some() {
            truncated = true;
            break;
        }
        let total_rate = system.propensities(&current, &mut rates);
        if total_rate <= 0.0 {
            // absorbing state
            while next_sample <= config.n_steps {
                recorder.record(sample_time(next_sample), &quantities);
                next_sample += 1;
            }
            break;
        }

        // Sample waiting time (exponential)
        let dt = -(1.0 - rng.gen::<f64>()).ln() / total_rate;
        let event_time = current_time + dt;
        while next_sample <= config.n_steps && sample_time(next_sample) < event_time {
            recorder.record(sample_time(next_sample), &quantities);
            next_sample += 1;
        }
        if next_sample > config.n_steps {
            break;
        }
        if options.max_events.is_some_and(|max| events >= max) {
            truncated = true;
            break;
        }

        // Sample next reaction (weighted by propensity)
        let u: f64 = rng.gen::<f64>() * total_rate;
        let mut cumsum = 0.0;
        let mut chosen = None;
        for (i, &rate) in rates.iter().enumerate() {
            if rate <= 0.0 {
                continue;
            }
            cumsum += rate;
            chosen = Some(i);
            if u < cumsum {
                break;
            }
        }
        let Some(reaction) = chosen else {
            break;
        };

        if let Some(species) = system.fire(reaction, &mut current) {
            return Err(SimulationError::NegativePopulation {
                time: event_time,
                species,
                population: current[species],
                reaction,
            });
        }
        for (q, &p) in quantities.iter_mut().zip(&current) {
            *q = p as f64;
        }
        current_time = event_time;
        events += 1;
    }

    debug!(events, time = current_time, truncated, "stochastic run finished");
    Ok(recorder.finish(truncated))
}

/// Simulate `n_runs` independent stochastic trajectories in parallel.
///
/// Run `i` is seeded with `seed + i`, so the ensemble is reproducible and
/// does not depend on thread scheduling. `config.method` must be stochastic;
/// its own seed is ignored.
pub fn simulate_ensemble(
    network: &Network,
    config: &RunConfig,
    n_runs: usize,
    seed: u64,
) -> Result<Vec<Trajectory>, SimulationError> {
    config.validate()?;
    let Method::Stochastic(options) = &config.method else {
        return Err(SimulationError::InvalidConfig(
            "ensembles require the stochastic method".to_string(),
        ));
    };
    let outputs = Outputs::resolve(network, &config.observables)?;
    let headers = outputs.headers(network);
    let system = ReactionSystem::from_network(network);
    let initial = network.initial_quantities();
    info!(runs = n_runs, reactions = system.n_reactions(), "starting stochastic ensemble");

    // Parallel simulation using Rayon
    (0..n_runs)
        .into_par_iter()
        .map(|i| {
            let options = SsaOptions {
                seed: Some(seed.wrapping_add(i as u64)),
                ..options.clone()
            };
            let recorder = Recorder::new(&outputs, headers.clone(), config.n_steps + 1);
            simulate(&system, &initial, config, &options, recorder, &Interrupt::none())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::graph::SpeciesGraph;
    use crate::model::molecule::MoleculeTypes;
    use crate::network::generator::{Reaction, Termination};
    use crate::network::store::Species;

    fn reaction(reactants: Vec<(usize, usize)>, products: Vec<(usize, usize)>, rate: f64) -> Reaction {
        Reaction {
            reactants,
            products,
            rule: 0,
            rule_name: "r".to_string(),
            statistical_factor: 1.0,
            rate,
        }
    }

    /// X <-> Y with 100 copies of X.
    fn isomerization() -> Network {
        Network {
            types: MoleculeTypes::new(),
            species: vec![
                Species {
                    index: 0,
                    graph: SpeciesGraph::new(),
                    quantity: 100.0,
                },
                Species {
                    index: 1,
                    graph: SpeciesGraph::new(),
                    quantity: 0.0,
                },
            ],
            reactions: vec![
                reaction(vec![(0, 1)], vec![(1, 1)], 1.0),
                reaction(vec![(1, 1)], vec![(0, 1)], 0.5),
            ],
            rules: Vec::new(),
            termination: Termination::Converged,
            iterations: 1,
            rejected_products: 0,
        }
    }

    fn run(network: &Network, options: SsaOptions) -> Trajectory {
        let config = RunConfig::stochastic(5.0, 20, options.seed);
        let outputs = Outputs::Species(network.species.len());
        let recorder = Recorder::new(&outputs, outputs.headers(network), 21);
        let system = ReactionSystem::from_network(network);
        simulate(&system, &network.initial_quantities(), &config, &options, recorder, &Interrupt::none()).unwrap()
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let network = isomerization();
        let options = SsaOptions {
            seed: Some(42),
            max_events: None,
        };
        let a = run(&network, options.clone());
        let b = run(&network, options);
        assert_eq!(a, b);
        assert_eq!(a.len(), 21);
    }

    #[test]
    fn test_total_is_conserved() {
        let trajectory = run(
            &isomerization(),
            SsaOptions {
                seed: Some(7),
                max_events: None,
            },
        );
        for row in &trajectory.data {
            assert_eq!(row[1] + row[2], 100.0);
        }
    }

    #[test]
    fn test_event_budget_truncates() {
        let trajectory = run(
            &isomerization(),
            SsaOptions {
                seed: Some(1),
                max_events: Some(3),
            },
        );
        assert!(trajectory.truncated);
        assert!(trajectory.len() < 21);
    }

    #[test]
    fn test_absorbing_state_fills_samples() {
        let mut network = isomerization();
        network.reactions.clear();
        let trajectory = run(
            &network,
            SsaOptions {
                seed: Some(1),
                max_events: None,
            },
        );
        assert_eq!(trajectory.len(), 21);
        assert_eq!(trajectory.last().unwrap()[1], 100.0);
    }

    #[test]
    fn test_ensemble_seeds_differ_per_run() {
        let network = isomerization();
        let config = RunConfig::stochastic(5.0, 20, None);
        let runs = simulate_ensemble(&network, &config, 4, 11).unwrap();
        assert_eq!(runs.len(), 4);
        let again = simulate_ensemble(&network, &config, 4, 11).unwrap();
        assert_eq!(runs, again);
        assert_ne!(runs[0], runs[1]);
    }
}
