//! Deterministic and stochastic simulation of a generated network.
//!
//! Both methods only see the finished [`Network`]: its species quantities and
//! reaction rates. Observables are resolved once before the run starts.

pub mod config;
pub mod gillespie;
pub mod observables;
pub mod ode;
pub mod system;
pub mod trajectory;

pub use config::{Method, OdeOptions, RunConfig, SsaOptions, SteadyState};
pub use gillespie::simulate_ensemble;
pub use observables::{Observable, ObservableKind, ResolvedObservable};
pub use system::ReactionSystem;
pub use trajectory::Trajectory;

use tracing::info;

use crate::error::SimulationError;
use crate::interrupt::Interrupt;
use crate::network::generator::Network;
use trajectory::{Outputs, Recorder};

/// Simulate `network` from its initial quantities.
pub fn simulate(network: &Network, config: &RunConfig) -> Result<Trajectory, SimulationError> {
    simulate_with_interrupt(network, config, &Interrupt::none())
}

/// As [`simulate`], returning the samples so far with `truncated` set when
/// `interrupt` fires.
pub fn simulate_with_interrupt(
    network: &Network,
    config: &RunConfig,
    interrupt: &Interrupt,
) -> Result<Trajectory, SimulationError> {
    config.validate()?;
    let outputs = Outputs::resolve(network, &config.observables)?;
    let recorder = Recorder::new(&outputs, outputs.headers(network), config.n_steps + 1);
    let system = ReactionSystem::from_network(network);
    let initial = network.initial_quantities();
    info!(
        species = system.n_species(),
        reactions = system.n_reactions(),
        t_end = config.t_end,
        "starting simulation"
    );
    match &config.method {
        Method::Deterministic(options) => ode::integrate(&system, &initial, config, options, recorder, interrupt),
        Method::Stochastic(options) => gillespie::simulate(&system, &initial, config, options, recorder, interrupt),
    }
}
