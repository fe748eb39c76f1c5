//! Rule-based network generation and simulation for molecular interaction
//! models.
//!
//! Molecules are typed graphs of components with internal states and bonds.
//! Rules rewrite pattern matches into products; the [`network`] generator
//! applies them breadth-first from seed species until no new species appear
//! or a limit is hit. The resulting [`Network`] is simulated either
//! deterministically (adaptive Runge-Kutta on mass-action ODEs) or
//! stochastically (Gillespie direct method).
//!
//! ```no_run
//! use rulenet::{GeneratorConfig, Model, RunConfig};
//!
//! # fn main() -> rulenet::Result<()> {
//! let model = Model::from_json(&std::fs::read_to_string("model.json").unwrap_or_default())?;
//! let (network, trajectory) = model.run(GeneratorConfig::default(), &RunConfig::deterministic(10.0, 100))?;
//! println!("{} species, {} rows", network.species.len(), trajectory.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod interrupt;
pub mod model;
pub mod network;
pub mod simulation;

#[cfg(feature = "python")]
mod python;

pub use error::{Error, ModelError, Result, SimulationError};
pub use interrupt::{CancelFlag, Interrupt};
pub use model::{Model, ModelSpec, RuleSpec, SeedSpec};
pub use network::{GeneratorConfig, GeneratorProgress, Network, NetworkGenerator, Reaction, Termination};
pub use simulation::{simulate, simulate_ensemble, simulate_with_interrupt, Method, Observable, RunConfig, Trajectory};
