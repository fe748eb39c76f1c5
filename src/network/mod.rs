//! Network generation: matching, species interning, product construction and
//! the breadth-first generation loop.

pub mod generator;
pub mod matcher;
pub mod store;
pub mod transform;

pub use generator::{GeneratorConfig, GeneratorProgress, Network, NetworkGenerator, Reaction, RuleRate, Termination};
pub use matcher::{count_embeddings, embeddings, matches, Embedding};
pub use store::{Species, SpeciesStore};
pub use transform::Rejection;
