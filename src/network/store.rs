//! Deduplicated species collection.
//!
//! Species are bucketed by [`CanonicalLabel`] and confirmed by a full
//! isomorphism check. Indices are assigned on first insertion and never
//! change; the store only grows.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::canonical::{Canonical, CanonicalLabel};
use crate::model::graph::SpeciesGraph;
use crate::model::molecule::{MoleculeTypeId, MoleculeTypes};
use crate::model::pattern::Pattern;

/// A species with its stable index and initial quantity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub index: usize,
    pub graph: SpeciesGraph,
    pub quantity: f64,
}

/// Species store for one generation run.
#[derive(Clone, Debug, Default)]
pub struct SpeciesStore {
    species: Vec<Species>,
    canonical: Vec<Canonical>,
    buckets: HashMap<CanonicalLabel, Vec<usize>>,
    by_type: HashMap<MoleculeTypeId, Vec<usize>>,
}

impl SpeciesStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.species.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> &Species {
        &self.species[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Species> {
        self.species.iter()
    }

    /// Index of the species isomorphic to `graph`, if stored.
    pub fn find(&self, types: &MoleculeTypes, graph: &SpeciesGraph) -> Option<usize> {
        self.lookup(graph, &Canonical::of(types, graph))
    }

    fn lookup(&self, graph: &SpeciesGraph, canonical: &Canonical) -> Option<usize> {
        self.buckets.get(&canonical.label())?.iter().copied().find(|&i| {
            self.canonical[i].isomorphic(&self.species[i].graph, canonical, graph)
        })
    }

    /// Insert `graph` unless an isomorphic species exists. Returns the index
    /// and whether it was newly added.
    pub fn intern(&mut self, types: &MoleculeTypes, graph: SpeciesGraph, quantity: f64) -> (usize, bool) {
        let canonical = Canonical::of(types, &graph);
        if let Some(index) = self.lookup(&graph, &canonical) {
            return (index, false);
        }
        (self.insert(graph, canonical, quantity), true)
    }

    /// Intern a reaction's products together, with zero quantity.
    ///
    /// Returns `None` without inserting anything if the new distinct species
    /// would push the store past `limit`.
    pub fn intern_all(
        &mut self,
        types: &MoleculeTypes,
        graphs: Vec<SpeciesGraph>,
        limit: usize,
    ) -> Option<Vec<usize>> {
        enum Slot {
            Existing(usize),
            Fresh(usize),
        }
        let prepared: Vec<(SpeciesGraph, Canonical)> = graphs
            .into_iter()
            .map(|g| {
                let canonical = Canonical::of(types, &g);
                (g, canonical)
            })
            .collect();

        let mut fresh: Vec<usize> = Vec::new();
        let mut slots = Vec::with_capacity(prepared.len());
        for (i, (graph, canonical)) in prepared.iter().enumerate() {
            if let Some(index) = self.lookup(graph, canonical) {
                slots.push(Slot::Existing(index));
                continue;
            }
            let twin = fresh.iter().position(|&j| {
                let (other, other_canonical) = &prepared[j];
                other_canonical.isomorphic(other, canonical, graph)
            });
            match twin {
                Some(k) => slots.push(Slot::Fresh(k)),
                None => {
                    slots.push(Slot::Fresh(fresh.len()));
                    fresh.push(i);
                }
            }
        }
        if self.len() + fresh.len() > limit {
            return None;
        }

        let base = self.len();
        let mut prepared: Vec<Option<(SpeciesGraph, Canonical)>> = prepared.into_iter().map(Some).collect();
        for &i in &fresh {
            if let Some((graph, canonical)) = prepared[i].take() {
                self.insert(graph, canonical, 0.0);
            }
        }
        Some(
            slots
                .into_iter()
                .map(|slot| match slot {
                    Slot::Existing(index) => index,
                    Slot::Fresh(k) => base + k,
                })
                .collect(),
        )
    }

    fn insert(&mut self, graph: SpeciesGraph, canonical: Canonical, quantity: f64) -> usize {
        let index = self.species.len();
        self.buckets.entry(canonical.label()).or_default().push(index);
        for (type_id, _) in graph.type_counts() {
            self.by_type.entry(type_id).or_default().push(index);
        }
        self.canonical.push(canonical);
        self.species.push(Species { index, graph, quantity });
        index
    }

    pub fn add_quantity(&mut self, index: usize, quantity: f64) {
        self.species[index].quantity += quantity;
    }

    /// Species below `limit` that contain every molecule type `pattern`
    /// needs, ascending.
    pub fn candidates(&self, pattern: &Pattern, limit: usize) -> Vec<usize> {
        let required = pattern.required_types();
        let Some(rarest) = required
            .iter()
            .map(|t| self.by_type.get(t).map_or(&[][..], Vec::as_slice))
            .min_by_key(|list| list.len())
        else {
            return (0..limit.min(self.len())).collect();
        };
        rarest
            .iter()
            .copied()
            .filter(|&i| i < limit)
            .filter(|&i| required.iter().all(|&t| self.species[i].graph.contains_type(t)))
            .collect()
    }

    pub fn into_species(self) -> Vec<Species> {
        self.species
    }
}
