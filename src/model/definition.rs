//! Structured model input: the hand-off from a language front end.
//!
//! A [`ModelSpec`] is plain data (serde), with species and patterns written in
//! bond-label notation. [`Model::from_spec`] validates everything eagerly, so
//! a model that builds can always be handed to the generator.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::graph::SpeciesGraph;
use super::molecule::{MoleculeType, MoleculeTypes};
use super::notation::{parse_pattern, parse_species};
use super::parameters::{ParameterValue, Parameters};
use super::pattern::Pattern;
use super::rule::{MoleculeMapping, RateLaw, Rule};
use crate::error::{Error, ModelError};
use crate::interrupt::Interrupt;
use crate::network::generator::{GeneratorConfig, Network, NetworkGenerator};
use crate::simulation::{simulate_with_interrupt, Observable, RunConfig, Trajectory};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeedSpec {
    pub species: String,
    pub quantity: ParameterValue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub reactants: Vec<String>,
    pub products: Vec<String>,
    pub rate: RateLaw,
    /// Adds a rule named `"<name> (reverse)"` with the inverse mapping.
    /// Cannot be combined with reactant constraints or `delete_molecules`.
    #[serde(default)]
    pub reverse_rate: Option<RateLaw>,
    /// Flat (reactant molecule, product molecule) pairs; inferred when absent.
    #[serde(default)]
    pub mapping: Option<Vec<(usize, usize)>>,
    #[serde(default)]
    pub include_reactants: Vec<(usize, String)>,
    #[serde(default)]
    pub exclude_reactants: Vec<(usize, String)>,
    #[serde(default)]
    pub allow_intramolecular: bool,
    #[serde(default)]
    pub delete_molecules: bool,
}

impl RuleSpec {
    pub fn new(name: &str, reactants: &[&str], products: &[&str], rate: impl Into<RateLaw>) -> Self {
        Self {
            name: name.to_string(),
            reactants: reactants.iter().map(|s| s.to_string()).collect(),
            products: products.iter().map(|s| s.to_string()).collect(),
            rate: rate.into(),
            reverse_rate: None,
            mapping: None,
            include_reactants: Vec::new(),
            exclude_reactants: Vec::new(),
            allow_intramolecular: false,
            delete_molecules: false,
        }
    }

    pub fn reversible(mut self, rate: impl Into<RateLaw>) -> Self {
        self.reverse_rate = Some(rate.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSpec {
    pub molecule_types: Vec<MoleculeType>,
    pub parameters: Vec<(String, ParameterValue)>,
    pub seed_species: Vec<SeedSpec>,
    pub rules: Vec<RuleSpec>,
    pub observables: Vec<Observable>,
}

/// A validated model, scoped to one caller. Nothing here is global.
#[derive(Clone, Debug)]
pub struct Model {
    pub types: MoleculeTypes,
    pub parameters: Parameters,
    definitions: Vec<(String, ParameterValue)>,
    seeds: Vec<(SpeciesGraph, ParameterValue)>,
    pub rules: Vec<Rule>,
    pub observables: Vec<Observable>,
}

impl Model {
    pub fn from_spec(spec: &ModelSpec) -> Result<Self, ModelError> {
        let mut types = MoleculeTypes::new();
        for molecule_type in &spec.molecule_types {
            types.declare(molecule_type.clone())?;
        }
        let parameters = Parameters::resolve(&spec.parameters)?;

        let mut seeds = Vec::with_capacity(spec.seed_species.len());
        for seed in &spec.seed_species {
            let graph = parse_species(&types, &seed.species)?;
            seeds.push((graph, seed.quantity.clone()));
        }

        let mut rules = Vec::new();
        let mut names = HashSet::new();
        for rule_spec in &spec.rules {
            for rule in build_rules(&types, rule_spec)? {
                if !names.insert(rule.name.clone()) {
                    return Err(ModelError::Duplicate {
                        context: "rules".to_string(),
                        name: rule.name,
                    });
                }
                rules.push(rule);
            }
        }

        let model = Self {
            types,
            parameters,
            definitions: spec.parameters.clone(),
            seeds,
            rules,
            observables: spec.observables.clone(),
        };
        model.check_parameters()?;
        debug!(
            molecule_types = model.types.len(),
            seeds = model.seeds.len(),
            rules = model.rules.len(),
            "model built"
        );
        Ok(model)
    }

    /// Parse a JSON-encoded [`ModelSpec`].
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let spec: ModelSpec = serde_json::from_str(text)
            .map_err(|e| ModelError::InvalidConfig(format!("model JSON: {}", e)))?;
        Self::from_spec(&spec)
    }

    /// Rates and seed quantities must evaluate before any work starts.
    fn check_parameters(&self) -> Result<(), ModelError> {
        for rule in &self.rules {
            rule.rate.evaluate(&self.parameters, &format!("rule '{}'", rule.name))?;
        }
        self.seed_species().map(|_| ())
    }

    /// Same model with some parameters pinned; dependent expressions follow.
    pub fn with_parameters(&self, overrides: &[(String, f64)]) -> Result<Self, ModelError> {
        let mut model = self.clone();
        model.parameters = Parameters::resolve_with(&self.definitions, overrides)?;
        model.check_parameters()?;
        Ok(model)
    }

    /// Seed graphs with quantities evaluated against the current parameters.
    pub fn seed_species(&self) -> Result<Vec<(SpeciesGraph, f64)>, ModelError> {
        self.seeds
            .iter()
            .enumerate()
            .map(|(i, (graph, quantity))| {
                let value = match quantity {
                    ParameterValue::Value(v) => *v,
                    ParameterValue::Expression(text) => {
                        self.parameters.evaluate(text, &format!("seed species {}", i))?
                    }
                };
                Ok((graph.clone(), value))
            })
            .collect()
    }

    pub fn generate_network(&self, config: GeneratorConfig) -> Result<Network, ModelError> {
        self.generate_network_with_interrupt(config, Interrupt::none())
    }

    pub fn generate_network_with_interrupt(
        &self,
        config: GeneratorConfig,
        interrupt: Interrupt,
    ) -> Result<Network, ModelError> {
        let seeds = self.seed_species()?;
        NetworkGenerator::new(&self.types, &self.rules, &self.parameters, config)
            .with_interrupt(interrupt)
            .generate(&seeds)
    }

    /// Generate, then simulate. The model's observables are used when the run
    /// configuration names none.
    pub fn run(&self, generator: GeneratorConfig, run: &RunConfig) -> Result<(Network, Trajectory), Error> {
        self.run_with_interrupt(generator, run, Interrupt::none())
    }

    pub fn run_with_interrupt(
        &self,
        generator: GeneratorConfig,
        run: &RunConfig,
        interrupt: Interrupt,
    ) -> Result<(Network, Trajectory), Error> {
        let network = self.generate_network_with_interrupt(generator, interrupt.clone())?;
        let trajectory = if run.observables.is_empty() && !self.observables.is_empty() {
            let run = run.clone().with_observables(self.observables.clone());
            simulate_with_interrupt(&network, &run, &interrupt)?
        } else {
            simulate_with_interrupt(&network, run, &interrupt)?
        };
        Ok((network, trajectory))
    }
}

fn parse_patterns(types: &MoleculeTypes, texts: &[String]) -> Result<Vec<Pattern>, ModelError> {
    texts.iter().map(|text| parse_pattern(types, text)).collect()
}

/// The forward rule and, when reversible, its reverse.
fn build_rules(types: &MoleculeTypes, spec: &RuleSpec) -> Result<Vec<Rule>, ModelError> {
    let reactants = parse_patterns(types, &spec.reactants)?;
    let products = parse_patterns(types, &spec.products)?;
    let mut rule = match &spec.mapping {
        Some(pairs) => Rule::with_mapping(
            types,
            &spec.name,
            reactants,
            products,
            spec.rate.clone(),
            MoleculeMapping(pairs.clone()),
        )?,
        None => Rule::new(types, &spec.name, reactants, products, spec.rate.clone())?,
    };
    if spec.reverse_rate.is_some()
        && (!spec.include_reactants.is_empty() || !spec.exclude_reactants.is_empty() || spec.delete_molecules)
    {
        return Err(ModelError::InvalidConfig(format!(
            "rule '{}': reactant constraints and delete_molecules need a one-way rule; declare the reverse separately",
            spec.name
        )));
    }
    let reverse = match &spec.reverse_rate {
        Some(rate) => Some(
            rule.reverse(types, &format!("{} (reverse)", spec.name), rate.clone())?
                .allow_intramolecular(spec.allow_intramolecular),
        ),
        None => None,
    };
    for (index, text) in &spec.include_reactants {
        rule = rule.include_reactants(*index, parse_pattern(types, text)?)?;
    }
    for (index, text) in &spec.exclude_reactants {
        rule = rule.exclude_reactants(*index, parse_pattern(types, text)?)?;
    }
    rule = rule
        .allow_intramolecular(spec.allow_intramolecular)
        .delete_molecules(spec.delete_molecules);

    let mut rules = vec![rule];
    rules.extend(reverse);
    Ok(rules)
}
