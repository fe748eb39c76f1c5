//! Breadth-first network generation.
//!
//! Each pass matches every rule against a frozen snapshot of the species
//! store, considering only reactant tuples that involve at least one species
//! discovered by the previous pass. Matching and product construction run in
//! parallel per rule; interning and reaction recording are serial, in rule
//! order, so indices do not depend on thread scheduling.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::ModelError;
use crate::interrupt::{Interrupt, InterruptReason};
use crate::model::graph::SpeciesGraph;
use crate::model::molecule::MoleculeTypes;
use crate::model::parameters::Parameters;
use crate::model::rule::{RateLaw, Rule};

use super::matcher::{embeddings, matches, Embedding};
use super::store::{Species, SpeciesStore};
use super::transform::{apply, Rejection};

/// Rejected products logged individually before going quiet.
const REJECTION_WARNINGS: usize = 5;

/// Limits for network generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Maximum number of species, seeds included.
    pub max_species: usize,
    pub max_reactions: usize,
    /// Maximum number of generation passes.
    pub max_iterations: usize,
    /// Maximum molecules in one species.
    pub max_agg: usize,
    /// Maximum molecules of a single type in one species.
    pub max_stoich: usize,
    /// Match rules on the rayon pool.
    pub parallel: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_species: 10_000,
            max_reactions: 100_000,
            max_iterations: 50,
            max_agg: 500,
            max_stoich: 500,
            parallel: true,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        let limits = [
            ("max_species", self.max_species),
            ("max_reactions", self.max_reactions),
            ("max_iterations", self.max_iterations),
            ("max_agg", self.max_agg),
            ("max_stoich", self.max_stoich),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(ModelError::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }
}

/// Why generation stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// A full pass added no species.
    Converged,
    MaxSpecies,
    MaxReactions,
    MaxIterations,
    Cancelled,
    DeadlineExceeded,
}

impl From<InterruptReason> for Termination {
    fn from(reason: InterruptReason) -> Self {
        match reason {
            InterruptReason::Cancelled => Termination::Cancelled,
            InterruptReason::DeadlineExceeded => Termination::DeadlineExceeded,
        }
    }
}

/// A concrete reaction between species indices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// (species index, multiplicity), ascending by index.
    pub reactants: Vec<(usize, usize)>,
    pub products: Vec<(usize, usize)>,
    /// Index of the originating rule.
    pub rule: usize,
    pub rule_name: String,
    /// Matches in this reaction's class divided by the rule symmetry.
    pub statistical_factor: f64,
    /// Rate law value times the statistical factor.
    pub rate: f64,
}

impl Reaction {
    /// Total reactant molecularity.
    pub fn order(&self) -> usize {
        self.reactants.iter().map(|&(_, n)| n).sum()
    }
}

/// Rate law of each rule, kept for re-evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleRate {
    pub name: String,
    pub rate: RateLaw,
}

/// Result of network generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub types: MoleculeTypes,
    pub species: Vec<Species>,
    pub reactions: Vec<Reaction>,
    pub rules: Vec<RuleRate>,
    pub termination: Termination,
    /// Completed generation passes.
    pub iterations: usize,
    /// Products dropped by the aggregate limits.
    pub rejected_products: usize,
}

impl Network {
    /// True unless generation reached its fixed point.
    pub fn truncated(&self) -> bool {
        self.termination != Termination::Converged
    }

    pub fn initial_quantities(&self) -> Vec<f64> {
        self.species.iter().map(|s| s.quantity).collect()
    }

    /// Species in bond-label notation.
    pub fn species_label(&self, index: usize) -> String {
        self.species[index].graph.display(&self.types).to_string()
    }

    /// Recompute every reaction rate from its rule's rate law.
    pub fn reevaluate_rates(&mut self, parameters: &Parameters) -> Result<(), ModelError> {
        let values = self
            .rules
            .iter()
            .map(|rule| rule.rate.evaluate(parameters, &format!("rule '{}'", rule.name)))
            .collect::<Result<Vec<f64>, ModelError>>()?;
        for reaction in &mut self.reactions {
            reaction.rate = values[reaction.rule] * reaction.statistical_factor;
        }
        Ok(())
    }

    /// Copy with rates evaluated against other parameters.
    pub fn with_parameters(&self, parameters: &Parameters) -> Result<Network, ModelError> {
        let mut network = self.clone();
        network.reevaluate_rates(parameters)?;
        Ok(network)
    }
}

/// Store and reaction counts after a generation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorProgress {
    pub iteration: usize,
    pub species: usize,
    pub new_species: usize,
    pub reactions: usize,
}

type ProgressFn<'a> = Box<dyn Fn(&GeneratorProgress) + Send + Sync + 'a>;

/// Outcomes of one reactant tuple, one per embedding combination.
struct Candidate {
    reactants: Vec<usize>,
    outcomes: Vec<Result<Vec<SpeciesGraph>, Rejection>>,
}

type ReactionKey = (usize, Vec<usize>, Vec<usize>);

/// Drives rule application to a fixed point or a limit.
pub struct NetworkGenerator<'a> {
    types: &'a MoleculeTypes,
    rules: &'a [Rule],
    parameters: &'a Parameters,
    config: GeneratorConfig,
    interrupt: Interrupt,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> NetworkGenerator<'a> {
    pub fn new(
        types: &'a MoleculeTypes,
        rules: &'a [Rule],
        parameters: &'a Parameters,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            types,
            rules,
            parameters,
            config,
            interrupt: Interrupt::none(),
            progress: None,
        }
    }

    /// Stop early, returning a truncated network, when `interrupt` fires.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Call `progress` after every pass.
    pub fn with_progress(mut self, progress: impl Fn(&GeneratorProgress) + Send + Sync + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Generate the network reachable from `seeds`.
    ///
    /// Configuration problems are reported before any pass runs. Hitting a
    /// limit or the interrupt is not an error: the partial network comes back
    /// with [`Network::termination`] set accordingly.
    pub fn generate(&self, seeds: &[(SpeciesGraph, f64)]) -> Result<Network, ModelError> {
        self.config.validate()?;
        let base_rates = self
            .rules
            .iter()
            .map(|rule| rule.rate.evaluate(self.parameters, &format!("rule '{}'", rule.name)))
            .collect::<Result<Vec<f64>, ModelError>>()?;

        let mut store = SpeciesStore::new();
        for (i, (graph, quantity)) in seeds.iter().enumerate() {
            let context = format!("seed species {}", i);
            graph.validate(self.types, &context)?;
            if graph.is_empty() || !graph.is_connected() {
                return Err(ModelError::DisconnectedSpecies { context });
            }
            if !quantity.is_finite() || *quantity < 0.0 {
                return Err(ModelError::InvalidConfig(format!(
                    "{}: initial quantity {} must be finite and non-negative",
                    context, quantity
                )));
            }
            let (index, fresh) = store.intern(self.types, graph.clone(), *quantity);
            if !fresh {
                warn!(seed = i, species = index, "duplicate seed species, quantities summed");
                store.add_quantity(index, *quantity);
            }
        }

        info!(
            seeds = store.len(),
            rules = self.rules.len(),
            max_species = self.config.max_species,
            "starting network generation"
        );

        let mut state = PassState::default();
        let mut frontier = 0;
        let mut iterations = 0;
        let termination = loop {
            if let Some(reason) = self.interrupt.check() {
                break Termination::from(reason);
            }
            if store.len() >= self.config.max_species {
                break Termination::MaxSpecies;
            }
            if iterations >= self.config.max_iterations {
                break Termination::MaxIterations;
            }

            let snapshot = store.len();
            let matched = self.match_rules(&store, frontier, snapshot);
            iterations += 1;
            let limit = self.record(&mut store, &mut state, matched);
            let progress = GeneratorProgress {
                iteration: iterations,
                species: store.len(),
                new_species: store.len() - snapshot,
                reactions: state.reactions.len(),
            };
            debug!(
                pass = progress.iteration,
                species = progress.species,
                new_species = progress.new_species,
                reactions = progress.reactions,
                "generation pass complete"
            );
            if let Some(report) = &self.progress {
                report(&progress);
            }
            if let Some(limit) = limit {
                break limit;
            }
            if store.len() == snapshot {
                break Termination::Converged;
            }
            frontier = snapshot;
        };

        if termination != Termination::Converged {
            warn!(?termination, species = store.len(), "network generation truncated");
        }
        info!(
            species = store.len(),
            reactions = state.reactions.len(),
            iterations,
            rejected = state.rejected,
            "network generation finished"
        );

        let reactions = state
            .reactions
            .into_iter()
            .zip(state.counts)
            .map(|(mut reaction, count)| {
                let symmetry = self.rules[reaction.rule].symmetry() as f64;
                reaction.statistical_factor = count as f64 / symmetry;
                reaction.rate = base_rates[reaction.rule] * reaction.statistical_factor;
                reaction
            })
            .collect();

        Ok(Network {
            types: self.types.clone(),
            species: store.into_species(),
            reactions,
            rules: self
                .rules
                .iter()
                .map(|rule| RuleRate {
                    name: rule.name.clone(),
                    rate: rule.rate.clone(),
                })
                .collect(),
            termination,
            iterations,
            rejected_products: state.rejected,
        })
    }

    fn match_rules(&self, store: &SpeciesStore, frontier: usize, snapshot: usize) -> Vec<Vec<Candidate>> {
        if self.config.parallel {
            self.rules
                .par_iter()
                .map(|rule| self.match_rule(rule, store, frontier, snapshot))
                .collect()
        } else {
            self.rules
                .iter()
                .map(|rule| self.match_rule(rule, store, frontier, snapshot))
                .collect()
        }
    }

    /// Include/exclude constraints of reactant `index`.
    fn admits(rule: &Rule, index: usize, graph: &SpeciesGraph) -> bool {
        rule.includes()
            .iter()
            .filter(|(i, _)| *i == index)
            .all(|(_, pattern)| matches(pattern, graph))
            && !rule
                .excludes()
                .iter()
                .filter(|(i, _)| *i == index)
                .any(|(_, pattern)| matches(pattern, graph))
    }

    fn match_rule(&self, rule: &Rule, store: &SpeciesStore, frontier: usize, snapshot: usize) -> Vec<Candidate> {
        let n = rule.reactants().len();
        if n == 0 {
            if frontier > 0 {
                return Vec::new();
            }
            return vec![Candidate {
                reactants: Vec::new(),
                outcomes: vec![apply(self.types, rule, &[], &[], false)],
            }];
        }

        let per_reactant: Vec<Vec<(usize, Vec<Embedding>)>> = rule
            .reactants()
            .iter()
            .enumerate()
            .map(|(i, pattern)| {
                store
                    .candidates(pattern, snapshot)
                    .into_iter()
                    .filter(|&s| Self::admits(rule, i, &store.get(s).graph))
                    .map(|s| (s, embeddings(pattern, &store.get(s).graph)))
                    .filter(|(_, found)| !found.is_empty())
                    .collect()
            })
            .collect();

        let mut candidates = Vec::new();
        if per_reactant.iter().all(|list| !list.is_empty()) {
            let mut choice = vec![0; n];
            loop {
                let tuple: Vec<usize> = (0..n).map(|i| per_reactant[i][choice[i]].0).collect();
                if tuple.iter().any(|&s| s >= frontier) {
                    let graphs: Vec<&SpeciesGraph> = tuple.iter().map(|&s| &store.get(s).graph).collect();
                    let lists: Vec<&[Embedding]> = (0..n).map(|i| per_reactant[i][choice[i]].1.as_slice()).collect();
                    let outcomes = combinations(&lists)
                        .into_iter()
                        .map(|combo| apply(self.types, rule, &graphs, &combo, false))
                        .collect();
                    candidates.push(Candidate {
                        reactants: tuple,
                        outcomes,
                    });
                }
                if !advance(&mut choice, &per_reactant) {
                    break;
                }
            }
        }

        if rule.is_intramolecular_allowed() {
            let combined = rule.combined_reactants();
            for s in store.candidates(combined, snapshot) {
                let graph = &store.get(s).graph;
                if s < frontier || !(0..n).all(|i| Self::admits(rule, i, graph)) {
                    continue;
                }
                let outcomes: Vec<_> = embeddings(combined, graph)
                    .into_iter()
                    .map(|e| apply(self.types, rule, &[graph], &e.split(rule.reactant_offsets()), true))
                    .collect();
                if !outcomes.is_empty() {
                    candidates.push(Candidate {
                        reactants: vec![s],
                        outcomes,
                    });
                }
            }
        }
        candidates
    }

    /// Intern products and record reactions. Returns the limit that stopped
    /// the pass, if any.
    fn record(
        &self,
        store: &mut SpeciesStore,
        state: &mut PassState,
        matched: Vec<Vec<Candidate>>,
    ) -> Option<Termination> {
        let mut hit = None;
        for (rule_index, candidates) in matched.into_iter().enumerate() {
            let rule = &self.rules[rule_index];
            for candidate in candidates {
                for outcome in candidate.outcomes {
                    let products = match outcome {
                        Ok(products) => products,
                        Err(rejection) => {
                            trace!(rule = %rule.name, reactants = ?candidate.reactants, ?rejection, "match produced no reaction");
                            continue;
                        }
                    };
                    if let Some(reason) = self.exceeds_aggregate_limits(&products) {
                        state.rejected += 1;
                        if state.rejected <= REJECTION_WARNINGS {
                            warn!(rule = %rule.name, reactants = ?candidate.reactants, reason, "product rejected");
                        } else if state.rejected == REJECTION_WARNINGS + 1 {
                            warn!("further rejected products are not logged");
                        }
                        continue;
                    }
                    let Some(product_ids) = store.intern_all(self.types, products, self.config.max_species) else {
                        hit = Some(Termination::MaxSpecies);
                        continue;
                    };
                    state.add(rule_index, rule, &candidate.reactants, product_ids);
                    if state.reactions.len() >= self.config.max_reactions {
                        return Some(Termination::MaxReactions);
                    }
                }
            }
        }
        hit
    }

    fn exceeds_aggregate_limits(&self, products: &[SpeciesGraph]) -> Option<&'static str> {
        for product in products {
            if product.len() > self.config.max_agg {
                return Some("max_agg");
            }
            if product.type_counts().iter().any(|&(_, n)| n > self.config.max_stoich) {
                return Some("max_stoich");
            }
        }
        None
    }
}

/// Reactions recorded so far and their match counts.
#[derive(Default)]
struct PassState {
    reactions: Vec<Reaction>,
    counts: Vec<usize>,
    index: HashMap<ReactionKey, usize>,
    rejected: usize,
}

impl PassState {
    fn add(&mut self, rule_index: usize, rule: &Rule, reactants: &[usize], products: Vec<usize>) {
        let mut reactant_key = reactants.to_vec();
        reactant_key.sort_unstable();
        let mut product_key = products;
        product_key.sort_unstable();
        let key = (rule_index, reactant_key, product_key);
        if let Some(&existing) = self.index.get(&key) {
            self.counts[existing] += 1;
            return;
        }
        self.index.insert(key.clone(), self.reactions.len());
        self.counts.push(1);
        self.reactions.push(Reaction {
            reactants: multiplicities(&key.1),
            products: multiplicities(&key.2),
            rule: rule_index,
            rule_name: rule.name.clone(),
            statistical_factor: 0.0,
            rate: 0.0,
        });
    }
}

/// Run-length encode a sorted index list.
fn multiplicities(sorted: &[usize]) -> Vec<(usize, usize)> {
    let mut out: Vec<(usize, usize)> = Vec::new();
    for &index in sorted {
        match out.last_mut() {
            Some((last, count)) if *last == index => *count += 1,
            _ => out.push((index, 1)),
        }
    }
    out
}

/// Odometer step over per-reactant candidate lists.
fn advance(choice: &mut [usize], lists: &[Vec<(usize, Vec<Embedding>)>]) -> bool {
    for i in (0..choice.len()).rev() {
        choice[i] += 1;
        if choice[i] < lists[i].len() {
            return true;
        }
        choice[i] = 0;
    }
    false
}

/// Cartesian product of embedding lists, first list varying slowest.
fn combinations(lists: &[&[Embedding]]) -> Vec<Vec<Embedding>> {
    let mut out: Vec<Vec<Embedding>> = vec![Vec::new()];
    for list in lists {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                list.iter().map(move |e| {
                    let mut next = prefix.clone();
                    next.push(e.clone());
                    next
                })
            })
            .collect();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::molecule::{ComponentType, MoleculeType};
    use crate::model::notation::{parse_pattern, parse_species};

    fn types() -> MoleculeTypes {
        let mut types = MoleculeTypes::new();
        types
            .declare(MoleculeType::new("A", vec![ComponentType::new("b")]))
            .unwrap();
        types
            .declare(MoleculeType::new("B", vec![ComponentType::new("a")]))
            .unwrap();
        types
            .declare(MoleculeType::new("D", vec![ComponentType::new("d")]))
            .unwrap();
        types
            .declare(MoleculeType::new(
                "P",
                vec![ComponentType::new("h"), ComponentType::new("t")],
            ))
            .unwrap();
        types
            .declare(MoleculeType::new(
                "L",
                vec![ComponentType::new("r"), ComponentType::new("r")],
            ))
            .unwrap();
        types
    }

    fn rule(types: &MoleculeTypes, name: &str, reactants: &[&str], products: &[&str], k: f64) -> Rule {
        Rule::new(
            types,
            name,
            reactants.iter().map(|s| parse_pattern(types, s).unwrap()).collect(),
            products.iter().map(|s| parse_pattern(types, s).unwrap()).collect(),
            RateLaw::Constant(k),
        )
        .unwrap()
    }

    fn seeds(types: &MoleculeTypes, items: &[(&str, f64)]) -> Vec<(SpeciesGraph, f64)> {
        items
            .iter()
            .map(|(s, q)| (parse_species(types, s).unwrap(), *q))
            .collect()
    }

    #[test]
    fn test_binding_network() {
        let types = types();
        let rules = vec![rule(&types, "bind", &["A(b)", "B(a)"], &["A(b!1).B(a!1)"], 2.0)];
        let params = Parameters::new();
        let network = NetworkGenerator::new(&types, &rules, &params, GeneratorConfig::default())
            .generate(&seeds(&types, &[("A(b)", 1.0), ("B(a)", 1.0)]))
            .unwrap();
        assert_eq!(network.species.len(), 3);
        assert_eq!(network.reactions.len(), 1);
        assert_eq!(network.reactions[0].reactants, vec![(0, 1), (1, 1)]);
        assert_eq!(network.reactions[0].products, vec![(2, 1)]);
        assert_eq!(network.reactions[0].rate, 2.0);
        assert_eq!(network.termination, Termination::Converged);
        assert!(!network.truncated());
    }

    #[test]
    fn test_homodimer_rate_is_halved() {
        let types = types();
        let rules = vec![rule(&types, "dimerize", &["D(d)", "D(d)"], &["D(d!1).D(d!1)"], 1.0)];
        let params = Parameters::new();
        let network = NetworkGenerator::new(&types, &rules, &params, GeneratorConfig::default())
            .generate(&seeds(&types, &[("D(d)", 10.0)]))
            .unwrap();
        assert_eq!(network.species.len(), 2);
        assert_eq!(network.reactions.len(), 1);
        assert_eq!(network.reactions[0].reactants, vec![(0, 2)]);
        assert_eq!(network.reactions[0].statistical_factor, 0.5);
        assert_eq!(network.reactions[0].rate, 0.5);
    }

    #[test]
    fn test_polymerization_truncates_at_species_limit() {
        let types = types();
        let rules = vec![rule(&types, "grow", &["P(t)", "P(h)"], &["P(t!1).P(h!1)"], 1.0)];
        let params = Parameters::new();
        let config = GeneratorConfig {
            max_species: 12,
            ..GeneratorConfig::default()
        };
        let network = NetworkGenerator::new(&types, &rules, &params, config)
            .generate(&seeds(&types, &[("P(h,t)", 1.0)]))
            .unwrap();
        assert_eq!(network.species.len(), 12);
        assert_eq!(network.termination, Termination::MaxSpecies);
        assert!(network.truncated());
    }

    #[test]
    fn test_iteration_limit() {
        let types = types();
        let rules = vec![rule(&types, "grow", &["P(t)", "P(h)"], &["P(t!1).P(h!1)"], 1.0)];
        let params = Parameters::new();
        let config = GeneratorConfig {
            max_iterations: 2,
            parallel: false,
            ..GeneratorConfig::default()
        };
        let network = NetworkGenerator::new(&types, &rules, &params, config)
            .generate(&seeds(&types, &[("P(h,t)", 1.0)]))
            .unwrap();
        assert_eq!(network.termination, Termination::MaxIterations);
        assert_eq!(network.iterations, 2);
        // monomer, dimer, then trimer and tetramer
        assert_eq!(network.species.len(), 4);
    }

    #[test]
    fn test_aggregate_limit_rejects_products() {
        let types = types();
        let rules = vec![rule(&types, "grow", &["P(t)", "P(h)"], &["P(t!1).P(h!1)"], 1.0)];
        let params = Parameters::new();
        let config = GeneratorConfig {
            max_agg: 3,
            ..GeneratorConfig::default()
        };
        let network = NetworkGenerator::new(&types, &rules, &params, config)
            .generate(&seeds(&types, &[("P(h,t)", 1.0)]))
            .unwrap();
        assert_eq!(network.species.len(), 3);
        assert!(network.rejected_products > 0);
        assert_eq!(network.termination, Termination::Converged);
    }

    #[test]
    fn test_duplicate_seeds_sum() {
        let types = types();
        let params = Parameters::new();
        let network = NetworkGenerator::new(&types, &[], &params, GeneratorConfig::default())
            .generate(&seeds(&types, &[("A(b!1).B(a!1)", 1.0), ("B(a!2).A(b!2)", 2.5)]))
            .unwrap();
        assert_eq!(network.species.len(), 1);
        assert_eq!(network.species[0].quantity, 3.5);
    }

    #[test]
    fn test_undefined_rate_parameter_fails_early() {
        let types = types();
        let mut r = rule(&types, "bind", &["A(b)", "B(a)"], &["A(b!1).B(a!1)"], 1.0);
        r.rate = RateLaw::parameter("kon");
        let rules = vec![r];
        let params = Parameters::new();
        let err = NetworkGenerator::new(&types, &rules, &params, GeneratorConfig::default())
            .generate(&seeds(&types, &[("A(b)", 1.0)]))
            .unwrap_err();
        assert!(matches!(err, ModelError::UndefinedParameter { .. }));
    }

    #[test]
    fn test_cancelled_generation_returns_partial_network() {
        let types = types();
        let rules = vec![rule(&types, "grow", &["P(t)", "P(h)"], &["P(t!1).P(h!1)"], 1.0)];
        let params = Parameters::new();
        let flag = crate::interrupt::CancelFlag::new();
        flag.cancel();
        let network = NetworkGenerator::new(&types, &rules, &params, GeneratorConfig::default())
            .with_interrupt(Interrupt::none().with_cancel(flag))
            .generate(&seeds(&types, &[("P(h,t)", 1.0)]))
            .unwrap();
        assert_eq!(network.termination, Termination::Cancelled);
        assert_eq!(network.species.len(), 1);
    }

    #[test]
    fn test_reevaluate_rates() {
        let types = types();
        let mut r = rule(&types, "dimerize", &["D(d)", "D(d)"], &["D(d!1).D(d!1)"], 1.0);
        r.rate = RateLaw::parameter("k");
        let rules = vec![r];
        let mut params = Parameters::new();
        params.set("k", 4.0);
        let mut network = NetworkGenerator::new(&types, &rules, &params, GeneratorConfig::default())
            .generate(&seeds(&types, &[("D(d)", 1.0)]))
            .unwrap();
        assert_eq!(network.reactions[0].rate, 2.0);
        params.set("k", 10.0);
        network.reevaluate_rates(&params).unwrap();
        assert_eq!(network.reactions[0].rate, 5.0);
    }

    #[test]
    fn test_repeated_components_do_not_inflate_rate() {
        let types = types();
        let params = Parameters::new();
        let initial = seeds(&types, &[("L(r,r)", 1.0)]);
        let listed = vec![rule(&types, "degrade", &["L(r,r)"], &[], 1.0)];
        let bare = vec![rule(&types, "degrade", &["L()"], &[], 1.0)];
        let listed = NetworkGenerator::new(&types, &listed, &params, GeneratorConfig::default())
            .generate(&initial)
            .unwrap();
        let bare = NetworkGenerator::new(&types, &bare, &params, GeneratorConfig::default())
            .generate(&initial)
            .unwrap();
        assert_eq!(listed.reactions.len(), 1);
        assert_eq!(listed.reactions[0].statistical_factor, 1.0);
        assert_eq!(listed.reactions[0].rate, bare.reactions[0].rate);

        // either free site can bind
        let rules = vec![rule(&types, "bind", &["L(r)", "D(d)"], &["L(r!1).D(d!1)"], 1.0)];
        let network = NetworkGenerator::new(&types, &rules, &params, GeneratorConfig::default())
            .generate(&seeds(&types, &[("L(r,r)", 1.0), ("D(d)", 1.0)]))
            .unwrap();
        assert_eq!(network.reactions[0].statistical_factor, 2.0);
    }

    #[test]
    fn test_seeds_at_species_limit_are_truncated() {
        let types = types();
        let rules = vec![rule(&types, "bind", &["A(b)", "B(a)"], &["A(b!1).B(a!1)"], 1.0)];
        let params = Parameters::new();
        let config = GeneratorConfig {
            max_species: 2,
            ..GeneratorConfig::default()
        };
        let network = NetworkGenerator::new(&types, &rules, &params, config)
            .generate(&seeds(&types, &[("A(b)", 1.0), ("B(a)", 1.0)]))
            .unwrap();
        assert_eq!(network.termination, Termination::MaxSpecies);
        assert_eq!(network.iterations, 0);
        assert!(network.reactions.is_empty());
    }

    #[test]
    fn test_progress_reported_every_pass() {
        let types = types();
        let rules = vec![rule(&types, "grow", &["P(t)", "P(h)"], &["P(t!1).P(h!1)"], 1.0)];
        let params = Parameters::new();
        let config = GeneratorConfig {
            max_iterations: 3,
            ..GeneratorConfig::default()
        };
        let reports = std::sync::Mutex::new(Vec::new());
        let network = NetworkGenerator::new(&types, &rules, &params, config)
            .with_progress(|p| reports.lock().unwrap().push(*p))
            .generate(&seeds(&types, &[("P(h,t)", 1.0)]))
            .unwrap();
        let reports = reports.into_inner().unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(
            reports.iter().map(|p| p.iteration).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        let last = reports[2];
        assert_eq!(last.species, network.species.len());
        assert_eq!(last.reactions, network.reactions.len());
        assert_eq!(reports[0].species, 2);
        assert_eq!(reports[0].new_species, 1);
    }

    #[test]
    fn test_multiplicities() {
        assert_eq!(multiplicities(&[0, 0, 3]), vec![(0, 2), (3, 1)]);
        assert!(multiplicities(&[]).is_empty());
    }
}
