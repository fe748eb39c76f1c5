//! Product construction: apply a compiled rule transform to matched reactants.

use std::collections::BTreeSet;

use crate::model::graph::{Site, SpeciesGraph};
use crate::model::molecule::MoleculeTypes;
use crate::model::rule::{Endpoint, ProductSource, Rule};

use super::matcher::Embedding;

/// Why a match produced no reaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// A new bond would exceed a component's `max_bonds`.
    BondCapacity,
    /// A product pattern did not come out as exactly one complex.
    ProductShape,
}

/// Apply `rule` to reactant species matched by `embeddings`.
///
/// With `intramolecular` set, `reactants` holds one species and every
/// embedding points into it. Otherwise embedding `i` points into
/// `reactants[i]`. Products are returned in product pattern order, followed
/// by any fragments no product pattern names.
pub fn apply(
    types: &MoleculeTypes,
    rule: &Rule,
    reactants: &[&SpeciesGraph],
    embeddings: &[Embedding],
    intramolecular: bool,
) -> Result<Vec<SpeciesGraph>, Rejection> {
    let transform = rule.transform();
    let mut complex = SpeciesGraph::new();
    let mut copies: Vec<(usize, usize)> = Vec::with_capacity(reactants.len());
    for reactant in reactants {
        let offset = complex.merge(reactant);
        copies.push((offset, reactant.len()));
    }
    let placed: Vec<Embedding> = embeddings
        .iter()
        .enumerate()
        .map(|(i, e)| if intramolecular { e.clone() } else { e.offset(copies[i].0) })
        .collect();

    let locate = |molecule: usize| -> Site {
        let (pattern, local) = rule.locate_reactant(molecule);
        Site::new(placed[pattern].molecules[local], 0)
    };

    let mut created_at: Vec<usize> = Vec::with_capacity(transform.created.len());
    let resolve = |endpoint: Endpoint, created_at: &[usize]| -> Site {
        match endpoint {
            Endpoint::Reactant { molecule, component } => {
                let (pattern, local) = rule.locate_reactant(molecule);
                placed[pattern].site(local, component)
            }
            Endpoint::Created { index, slot } => Site::new(created_at[index], slot),
        }
    };

    for &(a, b) in &transform.delete_bonds {
        complex.remove_bond(resolve(a, &created_at), resolve(b, &created_at));
    }
    for &endpoint in &transform.clear_bonds {
        complex.clear_bonds(resolve(endpoint, &created_at));
    }
    for &(endpoint, state) in &transform.set_states {
        complex.set_state(resolve(endpoint, &created_at), Some(state));
    }
    for created in &transform.created {
        let m = complex.add_molecule(types, created.type_id);
        for (slot, &state) in created.states.iter().enumerate() {
            complex.set_state(Site::new(m, slot), state);
        }
        created_at.push(m);
    }
    for &(a, b) in &transform.add_bonds {
        let (a, b) = (resolve(a, &created_at), resolve(b, &created_at));
        for site in [a, b] {
            let capacity = types.get(complex.molecules[site.molecule].type_id).components[site.component].max_bonds;
            if complex.partners(site).len() >= capacity as usize {
                return Err(Rejection::BondCapacity);
            }
        }
        complex.add_bond(a, b);
    }

    let mut doomed = BTreeSet::new();
    for &r in &transform.delete_molecules {
        let (pattern, _) = rule.locate_reactant(r);
        if rule.deletes_whole_reactant(pattern) && !rule.deletes_molecules_only() {
            let copy = if intramolecular { 0 } else { pattern };
            let (offset, len) = copies[copy];
            doomed.extend(offset..offset + len);
        } else {
            doomed.insert(locate(r).molecule);
        }
    }
    let remap = complex.remove_molecules(&doomed);

    // final position of each product pattern molecule
    let mut positions = Vec::with_capacity(transform.product_sources.len());
    for source in &transform.product_sources {
        let before = match *source {
            ProductSource::Reactant(r) => locate(r).molecule,
            ProductSource::Created(index) => created_at[index],
        };
        match remap[before] {
            Some(after) => positions.push(after),
            None => return Err(Rejection::ProductShape),
        }
    }

    let groups = complex.connected_components();
    let mut group_of = vec![0; complex.len()];
    for (g, group) in groups.iter().enumerate() {
        for &m in group {
            group_of[m] = g;
        }
    }

    let n_patterns = rule.products().len();
    let mut pattern_group: Vec<Option<usize>> = vec![None; n_patterns];
    for (p, &position) in positions.iter().enumerate() {
        let pattern = transform.product_pattern[p];
        let group = group_of[position];
        match pattern_group[pattern] {
            None => pattern_group[pattern] = Some(group),
            Some(g) if g == group => {}
            Some(_) => return Err(Rejection::ProductShape),
        }
    }
    let mut claimed = vec![false; groups.len()];
    let mut order = Vec::with_capacity(groups.len());
    for group in pattern_group.into_iter().flatten() {
        if claimed[group] {
            return Err(Rejection::ProductShape);
        }
        claimed[group] = true;
        order.push(group);
    }
    order.extend((0..groups.len()).filter(|&g| !claimed[g]));

    Ok(order.into_iter().map(|g| complex.extract(&groups[g])).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::canonical::is_isomorphic;
    use crate::model::molecule::{ComponentType, MoleculeType};
    use crate::model::notation::{parse_pattern, parse_species};
    use crate::model::rule::RateLaw;
    use crate::network::matcher::embeddings;

    fn types() -> MoleculeTypes {
        let mut types = MoleculeTypes::new();
        types
            .declare(MoleculeType::new(
                "A",
                vec![ComponentType::new("b"), ComponentType::with_states("y", &["U", "P"])],
            ))
            .unwrap();
        types
            .declare(MoleculeType::new("B", vec![ComponentType::new("a"), ComponentType::new("c")]))
            .unwrap();
        types
            .declare(MoleculeType::new("C", vec![ComponentType::new("b")]))
            .unwrap();
        types
    }

    fn rule(types: &MoleculeTypes, reactants: &[&str], products: &[&str]) -> Rule {
        Rule::new(
            types,
            "r",
            reactants.iter().map(|s| parse_pattern(types, s).unwrap()).collect(),
            products.iter().map(|s| parse_pattern(types, s).unwrap()).collect(),
            RateLaw::Constant(1.0),
        )
        .unwrap()
    }

    fn species(types: &MoleculeTypes, text: &str) -> SpeciesGraph {
        parse_species(types, text).unwrap()
    }

    #[test]
    fn test_binding_product() {
        let types = types();
        let r = rule(&types, &["A(b)", "B(a)"], &["A(b!1).B(a!1)"]);
        let a = species(&types, "A(b,y~P)");
        let b = species(&types, "B(a,c)");
        let ea = embeddings(&r.reactants()[0], &a).remove(0);
        let eb = embeddings(&r.reactants()[1], &b).remove(0);
        let products = apply(&types, &r, &[&a, &b], &[ea, eb], false).unwrap();
        assert_eq!(products.len(), 1);
        assert!(is_isomorphic(&types, &products[0], &species(&types, "A(b!1,y~P).B(a!1,c)")));
    }

    #[test]
    fn test_unbinding_keeps_unnamed_partners() {
        let types = types();
        let r = rule(&types, &["A(b!1).B(a!1)"], &["A(b)", "B(a)"]);
        let abc = species(&types, "A(b!1).B(a!1,c!2).C(b!2)");
        let e = embeddings(&r.reactants()[0], &abc).remove(0);
        let products = apply(&types, &r, &[&abc], &[e], false).unwrap();
        assert_eq!(products.len(), 2);
        assert!(is_isomorphic(&types, &products[0], &species(&types, "A(b,y~U)")));
        assert!(is_isomorphic(&types, &products[1], &species(&types, "B(a,c!1).C(b!1)")));
    }

    #[test]
    fn test_ring_unbinding_is_rejected() {
        let mut types = types();
        types
            .declare(MoleculeType::new("L", vec![ComponentType::new("r"), ComponentType::new("r")]))
            .unwrap();
        let r = rule(&types, &["L(r!1).L(r!1)"], &["L(r)", "L(r)"]);
        // two L joined twice stay connected after one bond breaks
        let ring = species(&types, "L(r!1,r!2).L(r!1,r!2)");
        let e = embeddings(&r.reactants()[0], &ring).remove(0);
        assert_eq!(apply(&types, &r, &[&ring], &[e], false), Err(Rejection::ProductShape));

        let chain = species(&types, "L(r!1,r).L(r!1,r)");
        let e = embeddings(&r.reactants()[0], &chain).remove(0);
        assert_eq!(apply(&types, &r, &[&chain], &[e], false).unwrap().len(), 2);
    }

    #[test]
    fn test_state_change_product() {
        let types = types();
        let r = rule(&types, &["A(y~U)"], &["A(y~P)"]);
        let a = species(&types, "A(b!1,y~U).B(a!1)");
        let e = embeddings(&r.reactants()[0], &a).remove(0);
        let products = apply(&types, &r, &[&a], &[e], false).unwrap();
        assert!(is_isomorphic(&types, &products[0], &species(&types, "A(b!1,y~P).B(a!1)")));
    }

    #[test]
    fn test_degradation_removes_whole_species() {
        let types = types();
        let r = rule(&types, &["A()"], &[]);
        let ab = species(&types, "A(b!1).B(a!1)");
        let e = embeddings(&r.reactants()[0], &ab).remove(0);
        assert!(apply(&types, &r, &[&ab], &[e.clone()], false).unwrap().is_empty());

        let r = r.delete_molecules(true);
        let products = apply(&types, &r, &[&ab], &[e], false).unwrap();
        assert_eq!(products.len(), 1);
        assert!(is_isomorphic(&types, &products[0], &species(&types, "B(a,c)")));
    }

    #[test]
    fn test_bond_capacity_rejects() {
        let types = types();
        // a wildcard site may already be bound
        let r = rule(&types, &["A(b!?)", "B(a)"], &["A(b!1).B(a!1)"]);
        let a = species(&types, "A(b!1).C(b!1)");
        let b = species(&types, "B()");
        let ea = embeddings(&r.reactants()[0], &a).remove(0);
        let eb = embeddings(&r.reactants()[1], &b).remove(0);
        assert_eq!(
            apply(&types, &r, &[&a, &b], &[ea, eb], false),
            Err(Rejection::BondCapacity)
        );
    }
}
