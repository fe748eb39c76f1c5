//! Reaction rules: graph rewrites from reactant patterns to product patterns.
//!
//! Reactant and product molecules are numbered flat, in pattern order. A
//! [`MoleculeMapping`] pairs reactant molecules with the product molecules
//! they become; unpaired reactant molecules are deleted and unpaired product
//! molecules are created. The rewrite itself is compiled once into a
//! [`Transform`] addressed in pattern coordinates, which the network layer
//! resolves through each match.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::molecule::{MoleculeTypeId, MoleculeTypes};
use super::parameters::Parameters;
use super::pattern::{BondConstraint, Pattern, PatternComponent, PatternMolecule, StateConstraint};
use crate::error::ModelError;

/// Rate law of a rule, evaluated against the model parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateLaw {
    Constant(f64),
    /// Parameter name or arithmetic expression over parameters.
    Expression(String),
}

impl RateLaw {
    pub fn parameter(name: &str) -> Self {
        RateLaw::Expression(name.to_string())
    }

    pub fn evaluate(&self, parameters: &Parameters, context: &str) -> Result<f64, ModelError> {
        let value = match self {
            RateLaw::Constant(v) => *v,
            RateLaw::Expression(text) => parameters.evaluate(text, context)?,
        };
        if !value.is_finite() || value < 0.0 {
            return Err(ModelError::InvalidConfig(format!(
                "{}: rate evaluates to {}",
                context, value
            )));
        }
        Ok(value)
    }
}

impl From<f64> for RateLaw {
    fn from(value: f64) -> Self {
        RateLaw::Constant(value)
    }
}

impl From<&str> for RateLaw {
    fn from(expression: &str) -> Self {
        RateLaw::Expression(expression.to_string())
    }
}

/// Explicit (reactant molecule, product molecule) pairs, flat indices.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoleculeMapping(pub Vec<(usize, usize)>);

impl MoleculeMapping {
    pub fn inverse(&self) -> Self {
        MoleculeMapping(self.0.iter().map(|&(r, p)| (p, r)).collect())
    }
}

/// A component touched by the transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    /// Listed component `component` of flat reactant molecule `molecule`.
    Reactant { molecule: usize, component: usize },
    /// Type slot `slot` of the `index`-th created molecule.
    Created { index: usize, slot: usize },
}

/// Where a product molecule comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductSource {
    Reactant(usize),
    Created(usize),
}

/// A molecule instantiated by the rule.
#[derive(Clone, Debug, PartialEq)]
pub struct CreatedMolecule {
    pub type_id: MoleculeTypeId,
    pub states: Vec<Option<usize>>,
}

/// Compiled rewrite, applied in field order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transform {
    pub delete_bonds: Vec<(Endpoint, Endpoint)>,
    pub clear_bonds: Vec<Endpoint>,
    pub set_states: Vec<(Endpoint, usize)>,
    pub created: Vec<CreatedMolecule>,
    pub add_bonds: Vec<(Endpoint, Endpoint)>,
    pub delete_molecules: Vec<usize>,
    /// Source of each flat product molecule.
    pub product_sources: Vec<ProductSource>,
    /// Product pattern of each flat product molecule.
    pub product_pattern: Vec<usize>,
}

/// A directed reaction rule.
#[derive(Clone, Debug)]
pub struct Rule {
    pub name: String,
    pub rate: RateLaw,
    reactants: Vec<Pattern>,
    products: Vec<Pattern>,
    combined: Pattern,
    reactant_offsets: Vec<usize>,
    mapping: MoleculeMapping,
    transform: Transform,
    symmetry: usize,
    include: Vec<(usize, Pattern)>,
    exclude: Vec<(usize, Pattern)>,
    intramolecular: bool,
    delete_molecules: bool,
}

impl Rule {
    /// Build a rule, pairing molecules greedily by type in pattern order.
    pub fn new(
        types: &MoleculeTypes,
        name: &str,
        reactants: Vec<Pattern>,
        products: Vec<Pattern>,
        rate: RateLaw,
    ) -> Result<Self, ModelError> {
        let mapping = infer_mapping(&reactants, &products);
        Self::with_mapping(types, name, reactants, products, rate, mapping)
    }

    pub fn with_mapping(
        types: &MoleculeTypes,
        name: &str,
        reactants: Vec<Pattern>,
        products: Vec<Pattern>,
        rate: RateLaw,
        mapping: MoleculeMapping,
    ) -> Result<Self, ModelError> {
        let context = format!("rule '{}'", name);
        let combined = Pattern::concat(types, &reactants, &context)?;
        let product_side = Pattern::concat(types, &products, &context)?;
        let reactant_offsets = offsets(&reactants);
        let product_offsets = offsets(&products);

        let image = check_mapping(&mapping, &combined, &product_side, &context)?;
        let transform = compile(
            types,
            &combined,
            &product_side,
            &image,
            &product_offsets,
            &context,
        )?;
        let symmetry = symmetry(&combined, &reactant_offsets, &product_side, &product_offsets, &image);

        Ok(Self {
            name: name.to_string(),
            rate,
            reactants,
            products,
            combined,
            reactant_offsets,
            mapping,
            transform,
            symmetry,
            include: Vec::new(),
            exclude: Vec::new(),
            intramolecular: false,
            delete_molecules: false,
        })
    }

    /// The rule running the other way, with the inverse mapping.
    pub fn reverse(&self, types: &MoleculeTypes, name: &str, rate: RateLaw) -> Result<Self, ModelError> {
        Self::with_mapping(
            types,
            name,
            self.products.clone(),
            self.reactants.clone(),
            rate,
            self.mapping.inverse(),
        )
    }

    /// Require reactant `index` to also match `pattern`.
    pub fn include_reactants(mut self, index: usize, pattern: Pattern) -> Result<Self, ModelError> {
        self.check_reactant_index(index)?;
        self.include.push((index, pattern));
        Ok(self)
    }

    /// Reject reactant `index` species that match `pattern`.
    pub fn exclude_reactants(mut self, index: usize, pattern: Pattern) -> Result<Self, ModelError> {
        self.check_reactant_index(index)?;
        self.exclude.push((index, pattern));
        Ok(self)
    }

    fn check_reactant_index(&self, index: usize) -> Result<(), ModelError> {
        if index >= self.reactants.len() {
            return Err(ModelError::InvalidConfig(format!(
                "rule '{}': reactant index {} out of range ({} reactants)",
                self.name,
                index,
                self.reactants.len()
            )));
        }
        Ok(())
    }

    /// Also match all reactant patterns inside one species.
    pub fn allow_intramolecular(mut self, allow: bool) -> Self {
        self.intramolecular = allow;
        self
    }

    /// Delete only unmapped molecules instead of whole reactant species.
    pub fn delete_molecules(mut self, delete: bool) -> Self {
        self.delete_molecules = delete;
        self
    }

    #[inline]
    pub fn reactants(&self) -> &[Pattern] {
        &self.reactants
    }

    #[inline]
    pub fn products(&self) -> &[Pattern] {
        &self.products
    }

    /// All reactant patterns as one pattern, for intramolecular matching.
    #[inline]
    pub fn combined_reactants(&self) -> &Pattern {
        &self.combined
    }

    /// First flat molecule index of each reactant pattern.
    #[inline]
    pub fn reactant_offsets(&self) -> &[usize] {
        &self.reactant_offsets
    }

    /// Reactant pattern and local molecule index of a flat reactant molecule.
    pub fn locate_reactant(&self, flat: usize) -> (usize, usize) {
        let pattern = self
            .reactant_offsets
            .iter()
            .rposition(|&offset| offset <= flat)
            .unwrap_or(0);
        (pattern, flat - self.reactant_offsets[pattern])
    }

    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    pub fn mapping(&self) -> &MoleculeMapping {
        &self.mapping
    }

    /// Number of reactant-side automorphisms that leave the products unchanged.
    #[inline]
    pub fn symmetry(&self) -> usize {
        self.symmetry
    }

    pub fn includes(&self) -> &[(usize, Pattern)] {
        &self.include
    }

    pub fn excludes(&self) -> &[(usize, Pattern)] {
        &self.exclude
    }

    pub fn is_intramolecular_allowed(&self) -> bool {
        self.intramolecular && self.reactants.len() > 1
    }

    pub fn deletes_molecules_only(&self) -> bool {
        self.delete_molecules
    }

    /// True if every molecule of reactant pattern `index` is deleted.
    pub fn deletes_whole_reactant(&self, index: usize) -> bool {
        let start = self.reactant_offsets[index];
        let end = start + self.reactants[index].len();
        !self.reactants[index].is_empty()
            && (start..end).all(|r| self.transform.delete_molecules.contains(&r))
    }
}

fn offsets(patterns: &[Pattern]) -> Vec<usize> {
    let mut next = 0;
    patterns
        .iter()
        .map(|p| {
            let start = next;
            next += p.len();
            start
        })
        .collect()
}

fn pattern_membership(offsets: &[usize], total: usize) -> Vec<usize> {
    let mut membership = vec![0; total];
    for (i, &start) in offsets.iter().enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(total);
        for slot in &mut membership[start..end] {
            *slot = i;
        }
    }
    membership
}

fn infer_mapping(reactants: &[Pattern], products: &[Pattern]) -> MoleculeMapping {
    let reactant_types: Vec<MoleculeTypeId> = reactants
        .iter()
        .flat_map(|p| p.molecules().iter().map(|m| m.type_id))
        .collect();
    let mut taken = vec![false; reactant_types.len()];
    let mut pairs = Vec::new();
    let product_types = products.iter().flat_map(|p| p.molecules().iter().map(|m| m.type_id));
    for (p, type_id) in product_types.enumerate() {
        if let Some(r) = (0..reactant_types.len()).find(|&r| !taken[r] && reactant_types[r] == type_id) {
            taken[r] = true;
            pairs.push((r, p));
        }
    }
    MoleculeMapping(pairs)
}

/// Validate the mapping and return reactant molecule → product molecule.
fn check_mapping(
    mapping: &MoleculeMapping,
    reactants: &Pattern,
    products: &Pattern,
    context: &str,
) -> Result<Vec<Option<usize>>, ModelError> {
    let invalid = |reason: String| ModelError::InvalidMapping {
        context: context.to_string(),
        reason,
    };
    let mut image = vec![None; reactants.len()];
    let mut preimage = vec![None; products.len()];
    for &(r, p) in &mapping.0 {
        if r >= reactants.len() || p >= products.len() {
            return Err(invalid(format!("pair ({}, {}) is out of range", r, p)));
        }
        if image[r].is_some() || preimage[p].is_some() {
            return Err(invalid(format!("pair ({}, {}) maps a molecule twice", r, p)));
        }
        let (rm, pm) = (&reactants.molecules()[r], &products.molecules()[p]);
        if rm.type_id != pm.type_id {
            return Err(invalid(format!("reactant molecule {} and product molecule {} differ in type", r, p)));
        }
        if component_names(rm) != component_names(pm) {
            return Err(invalid(format!(
                "reactant molecule {} and product molecule {} list different components",
                r, p
            )));
        }
        image[r] = Some(p);
        preimage[p] = Some(r);
    }
    Ok(image)
}

fn component_names(molecule: &PatternMolecule) -> Vec<&str> {
    let mut names: Vec<&str> = molecule.components.iter().map(|c| c.name.as_str()).collect();
    names.sort_unstable();
    names
}

/// Index of the listed component in `to` that corresponds to listed
/// component `c` of `from`: same name, same occurrence.
fn corresponding(from: &PatternMolecule, c: usize, to: &PatternMolecule) -> Option<usize> {
    let name = &from.components[c].name;
    let occurrence = from.components[..c].iter().filter(|x| &x.name == name).count();
    to.components
        .iter()
        .enumerate()
        .filter(|(_, x)| &x.name == name)
        .nth(occurrence)
        .map(|(i, _)| i)
}

fn ordered(a: Endpoint, b: Endpoint) -> (Endpoint, Endpoint) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn compile(
    types: &MoleculeTypes,
    reactants: &Pattern,
    products: &Pattern,
    image: &[Option<usize>],
    product_offsets: &[usize],
    context: &str,
) -> Result<Transform, ModelError> {
    let invalid = |reason: String| ModelError::InvalidMapping {
        context: context.to_string(),
        reason,
    };
    let mut preimage = vec![None; products.len()];
    for (r, p) in image.iter().enumerate() {
        if let Some(p) = p {
            preimage[*p] = Some(r);
        }
    }

    let mut transform = Transform {
        product_pattern: pattern_membership(product_offsets, products.len()),
        ..Transform::default()
    };

    // product molecule sources and created molecules
    let mut created_index = vec![0; products.len()];
    for (p, molecule) in products.molecules().iter().enumerate() {
        match preimage[p] {
            Some(r) => transform.product_sources.push(ProductSource::Reactant(r)),
            None => {
                let index = transform.created.len();
                let mtype = types.get(molecule.type_id);
                let mut states: Vec<Option<usize>> = mtype
                    .components
                    .iter()
                    .map(|c| if c.has_states() { Some(0) } else { None })
                    .collect();
                for (c, component) in molecule.components.iter().enumerate() {
                    let slot = created_slot(molecule, c);
                    if let StateConstraint::Exact(s) = component.state {
                        states[slot] = Some(s);
                    }
                    if matches!(component.bond, BondConstraint::Bound | BondConstraint::Wildcard) {
                        return Err(invalid(format!(
                            "created molecule {} cannot use an unspecified bond on '{}'",
                            p, component.name
                        )));
                    }
                }
                transform.created.push(CreatedMolecule {
                    type_id: molecule.type_id,
                    states,
                });
                created_index[p] = index;
                transform.product_sources.push(ProductSource::Created(index));
            }
        }
    }

    let product_endpoint = |p: usize, c: usize| -> Endpoint {
        match preimage[p] {
            Some(r) => Endpoint::Reactant {
                molecule: r,
                component: corresponding(&products.molecules()[p], c, &reactants.molecules()[r]).unwrap_or(c),
            },
            None => Endpoint::Created {
                index: created_index[p],
                slot: created_slot(&products.molecules()[p], c),
            },
        }
    };

    let mut reactant_bonds = BTreeSet::new();
    for (r, molecule) in reactants.molecules().iter().enumerate() {
        for (c, component) in molecule.components.iter().enumerate() {
            if let Some((pr, pc)) = component.partner() {
                let a = Endpoint::Reactant { molecule: r, component: c };
                let b = Endpoint::Reactant { molecule: pr, component: pc };
                reactant_bonds.insert(ordered(a, b));
            }
        }
    }
    let mut product_bonds = BTreeSet::new();
    for (p, molecule) in products.molecules().iter().enumerate() {
        for (c, component) in molecule.components.iter().enumerate() {
            if let Some((pp, pc)) = component.partner() {
                product_bonds.insert(ordered(product_endpoint(p, c), product_endpoint(pp, pc)));
            }
        }
    }

    for &(a, b) in &reactant_bonds {
        let survives = |e: Endpoint| match e {
            Endpoint::Reactant { molecule, .. } => image[molecule].is_some(),
            Endpoint::Created { .. } => true,
        };
        if survives(a) && survives(b) && !product_bonds.contains(&(a, b)) {
            transform.delete_bonds.push((a, b));
        }
    }
    for &(a, b) in &product_bonds {
        if !reactant_bonds.contains(&(a, b)) {
            transform.add_bonds.push((a, b));
        }
    }

    // per-component state and bond transitions of mapped molecules
    for (r, molecule) in reactants.molecules().iter().enumerate() {
        let Some(p) = image[r] else {
            transform.delete_molecules.push(r);
            continue;
        };
        let target = &products.molecules()[p];
        for (c, before) in molecule.components.iter().enumerate() {
            let Some(pc) = corresponding(molecule, c, target) else {
                return Err(invalid(format!("component '{}' of molecule {} is not mapped", before.name, r)));
            };
            let after = &target.components[pc];
            let endpoint = Endpoint::Reactant { molecule: r, component: c };

            match (before.state, after.state) {
                (_, StateConstraint::Exact(s)) => {
                    if before.state != StateConstraint::Exact(s) {
                        transform.set_states.push((endpoint, s));
                    }
                }
                (StateConstraint::Wildcard, StateConstraint::Wildcard) => {}
                (StateConstraint::Exact(_), StateConstraint::Wildcard) => {
                    return Err(invalid(format!(
                        "state of '{}' on molecule {} must also be given on the product side",
                        before.name, r
                    )));
                }
            }

            use BondConstraint::*;
            match (before.bond, after.bond) {
                (Label(_), Label(_)) | (Unbound, Unbound) | (Bound, Bound) | (Wildcard, Wildcard) => {}
                (Label(_), Unbound) | (Unbound, Label(_)) | (Wildcard, Label(_)) => {}
                (Bound, Unbound) => transform.clear_bonds.push(endpoint),
                (before_bond, after_bond) => {
                    return Err(invalid(format!(
                        "component '{}' of molecule {} cannot change bond from {:?} to {:?}",
                        before.name, r, before_bond, after_bond
                    )));
                }
            }
        }
    }

    Ok(transform)
}

/// Type slot used by listed component `c` of a created molecule: the k-th
/// listing of a name takes the k-th slot with that name.
fn created_slot(molecule: &PatternMolecule, c: usize) -> usize {
    let component = &molecule.components[c];
    let occurrence = molecule.components[..c]
        .iter()
        .filter(|x| x.name == component.name)
        .count();
    component
        .slots()
        .get(occurrence)
        .copied()
        .unwrap_or_else(|| component.slots().first().copied().unwrap_or(0))
}

/// Same constraints, ignoring the numeric value of bond labels.
fn same_component(x: &PatternComponent, y: &PatternComponent) -> bool {
    x.name == y.name
        && x.state == y.state
        && match (x.bond, y.bond) {
            (BondConstraint::Label(_), BondConstraint::Label(_)) => true,
            (u, v) => u == v,
        }
}

/// Every bijection of the listed components of `a` onto those of `b` that
/// pairs components with the same constraints.
fn component_matchings(a: &PatternMolecule, b: &PatternMolecule) -> Vec<Vec<usize>> {
    fn extend(
        k: usize,
        a: &PatternMolecule,
        b: &PatternMolecule,
        assigned: &mut Vec<usize>,
        used: &mut Vec<bool>,
        out: &mut Vec<Vec<usize>>,
    ) {
        if k == a.components.len() {
            out.push(assigned.clone());
            return;
        }
        for target in 0..b.components.len() {
            if used[target] || !same_component(&a.components[k], &b.components[target]) {
                continue;
            }
            used[target] = true;
            assigned.push(target);
            extend(k + 1, a, b, assigned, used, out);
            assigned.pop();
            used[target] = false;
        }
    }

    let mut out = Vec::new();
    if a.type_id == b.type_id && a.components.len() == b.components.len() {
        let mut used = vec![false; b.components.len()];
        extend(0, a, b, &mut Vec::new(), &mut used, &mut out);
    }
    out
}

/// Permutation of pattern molecules together with, for each molecule, the
/// permutation of its listed components onto those of its image.
struct Relabeling {
    molecules: Vec<usize>,
    components: Vec<Vec<usize>>,
}

impl Relabeling {
    fn identity(pattern: &Pattern) -> Self {
        Self {
            molecules: (0..pattern.len()).collect(),
            components: pattern
                .molecules()
                .iter()
                .map(|m| (0..m.components.len()).collect())
                .collect(),
        }
    }
}

/// `relabel` maps the pattern onto itself, keeping constraints, labeled
/// partners and pattern membership.
fn preserves(pattern: &Pattern, membership: &[usize], relabel: &Relabeling) -> bool {
    let molecules = pattern.molecules();
    for (m, molecule) in molecules.iter().enumerate() {
        let target = &molecules[relabel.molecules[m]];
        if target.type_id != molecule.type_id || target.components.len() != molecule.components.len() {
            return false;
        }
        for (c, component) in molecule.components.iter().enumerate() {
            let image = &target.components[relabel.components[m][c]];
            if !same_component(component, image) {
                return false;
            }
            if let Some((pm, pc)) = component.partner() {
                if image.partner() != Some((relabel.molecules[pm], relabel.components[pm][pc])) {
                    return false;
                }
            }
        }
    }
    // molecules of one pattern must land together in one pattern
    let n_patterns = membership.iter().max().map_or(0, |&m| m + 1);
    let mut target = vec![None; n_patterns];
    for (m, &group) in membership.iter().enumerate() {
        let landed = membership[relabel.molecules[m]];
        match target[group] {
            None => target[group] = Some(landed),
            Some(t) if t == landed => {}
            Some(_) => return false,
        }
    }
    let mut hit = vec![false; n_patterns];
    for t in target.into_iter().flatten() {
        if hit[t] {
            return false;
        }
        hit[t] = true;
    }
    true
}

/// Product-side relabeling carried along by a reactant relabeling. Created
/// molecules stay put.
fn induced(
    reactants: &Pattern,
    products: &Pattern,
    image: &[Option<usize>],
    relabel: &Relabeling,
) -> Option<Relabeling> {
    let mut out = Relabeling::identity(products);
    for (r, &target) in relabel.molecules.iter().enumerate() {
        match (image[r], image[target]) {
            (Some(p), Some(q)) => {
                out.molecules[p] = q;
                let product = &products.molecules()[p];
                for pc in 0..product.components.len() {
                    let c = corresponding(product, pc, &reactants.molecules()[r])?;
                    let moved = relabel.components[r][c];
                    out.components[p][pc] =
                        corresponding(&reactants.molecules()[target], moved, &products.molecules()[q])?;
                }
            }
            (None, None) => {}
            _ => return None,
        }
    }
    Some(out)
}

/// Number of reactant pattern automorphisms, over molecules and same-named
/// components, that carry the products onto themselves.
fn symmetry(
    reactants: &Pattern,
    reactant_offsets: &[usize],
    products: &Pattern,
    product_offsets: &[usize],
    image: &[Option<usize>],
) -> usize {
    let n = reactants.len();
    let reactant_membership = pattern_membership(reactant_offsets, n);
    let product_membership = pattern_membership(product_offsets, products.len());
    let molecules = reactants.molecules();
    let matchings: Vec<Vec<Vec<Vec<usize>>>> = molecules
        .iter()
        .map(|a| molecules.iter().map(|b| component_matchings(a, b)).collect())
        .collect();

    let mut count = 0;
    let mut relabel = Relabeling::identity(reactants);
    let mut used = vec![false; n];

    fn extend(
        k: usize,
        relabel: &mut Relabeling,
        used: &mut Vec<bool>,
        matchings: &[Vec<Vec<Vec<usize>>>],
        accept: &mut dyn FnMut(&Relabeling),
    ) {
        if k == used.len() {
            accept(relabel);
            return;
        }
        for target in 0..used.len() {
            if used[target] {
                continue;
            }
            used[target] = true;
            relabel.molecules[k] = target;
            for components in &matchings[k][target] {
                relabel.components[k].clone_from(components);
                extend(k + 1, relabel, used, matchings, accept);
            }
            used[target] = false;
        }
    }

    let mut accept = |relabel: &Relabeling| {
        if !preserves(reactants, &reactant_membership, relabel) {
            return;
        }
        if let Some(on_products) = induced(reactants, products, image, relabel) {
            if preserves(products, &product_membership, &on_products) {
                count += 1;
            }
        }
    };
    extend(0, &mut relabel, &mut used, &matchings, &mut accept);
    count.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::molecule::{ComponentType, MoleculeType};
    use crate::model::notation::parse_pattern;

    fn types() -> MoleculeTypes {
        let mut types = MoleculeTypes::new();
        types
            .declare(MoleculeType::new(
                "A",
                vec![ComponentType::new("b"), ComponentType::with_states("y", &["U", "P"])],
            ))
            .unwrap();
        types
            .declare(MoleculeType::new("B", vec![ComponentType::new("a")]))
            .unwrap();
        types
            .declare(MoleculeType::new("D", vec![ComponentType::new("d")]))
            .unwrap();
        types
            .declare(MoleculeType::new(
                "L",
                vec![ComponentType::new("r"), ComponentType::new("r")],
            ))
            .unwrap();
        types
    }

    fn rule(types: &MoleculeTypes, reactants: &[&str], products: &[&str]) -> Result<Rule, ModelError> {
        let r = reactants.iter().map(|s| parse_pattern(types, s).unwrap()).collect();
        let p = products.iter().map(|s| parse_pattern(types, s).unwrap()).collect();
        Rule::new(types, "r", r, p, RateLaw::Constant(1.0))
    }

    #[test]
    fn test_binding_compiles_to_one_bond() {
        let types = types();
        let r = rule(&types, &["A(b)", "B(a)"], &["A(b!1).B(a!1)"]).unwrap();
        let t = r.transform();
        assert_eq!(t.add_bonds.len(), 1);
        assert!(t.delete_bonds.is_empty());
        assert!(t.created.is_empty());
        assert!(t.delete_molecules.is_empty());
        assert_eq!(r.symmetry(), 1);
        assert_eq!(t.product_pattern, vec![0, 0]);
    }

    #[test]
    fn test_unbinding_and_reverse() {
        let types = types();
        let forward = rule(&types, &["A(b)", "B(a)"], &["A(b!1).B(a!1)"]).unwrap();
        let reverse = forward.reverse(&types, "r_rev", RateLaw::Constant(0.1)).unwrap();
        assert_eq!(reverse.transform().delete_bonds.len(), 1);
        assert!(reverse.transform().add_bonds.is_empty());
        assert_eq!(reverse.transform().product_pattern, vec![0, 1]);
    }

    #[test]
    fn test_state_change() {
        let types = types();
        let r = rule(&types, &["A(y~U)"], &["A(y~P)"]).unwrap();
        assert_eq!(
            r.transform().set_states,
            vec![(Endpoint::Reactant { molecule: 0, component: 0 }, 1)]
        );
    }

    #[test]
    fn test_homodimer_symmetry() {
        let types = types();
        let r = rule(&types, &["D(d)", "D(d)"], &["D(d!1).D(d!1)"]).unwrap();
        assert_eq!(r.symmetry(), 2);
        let r = rule(&types, &["D(d!1).D(d!1)"], &["D(d)", "D(d)"]).unwrap();
        assert_eq!(r.symmetry(), 2);
    }

    #[test]
    fn test_repeated_component_symmetry() {
        let types = types();
        assert_eq!(rule(&types, &["L(r,r)"], &[]).unwrap().symmetry(), 2);
        assert_eq!(rule(&types, &["L()"], &[]).unwrap().symmetry(), 1);
        // only one of the two sites ends up bound
        let r = rule(&types, &["L(r,r)", "D(d)"], &["L(r!1,r).D(d!1)"]).unwrap();
        assert_eq!(r.symmetry(), 1);
        let r = rule(&types, &["L(r,r)", "D(d)", "D(d)"], &["L(r!1,r!2).D(d!1).D(d!2)"]).unwrap();
        assert_eq!(r.symmetry(), 2);
    }

    #[test]
    fn test_synthesis_and_degradation() {
        let types = types();
        let r = Rule::new(&types, "syn", vec![], vec![parse_pattern(&types, "A(b,y~P)").unwrap()], 1.0.into()).unwrap();
        assert_eq!(r.transform().created.len(), 1);
        assert_eq!(r.transform().created[0].states, vec![None, Some(1)]);

        let r = rule(&types, &["A()"], &[]).unwrap();
        assert_eq!(r.transform().delete_molecules, vec![0]);
        assert!(r.deletes_whole_reactant(0));
    }

    #[test]
    fn test_bad_mapping_rejected() {
        let types = types();
        let err = Rule::with_mapping(
            &types,
            "bad",
            vec![parse_pattern(&types, "A(b)").unwrap()],
            vec![parse_pattern(&types, "B(a)").unwrap()],
            1.0.into(),
            MoleculeMapping(vec![(0, 0)]),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidMapping { .. }));

        let err = rule(&types, &["A(y~U)"], &["A(y~?)"]).unwrap_err();
        assert!(matches!(err, ModelError::InvalidMapping { .. }));
    }

    #[test]
    fn test_undefined_rate_parameter() {
        let err = RateLaw::parameter("kon")
            .evaluate(&Parameters::new(), "rule 'bind'")
            .unwrap_err();
        assert!(matches!(err, ModelError::UndefinedParameter { .. }));
    }
}
