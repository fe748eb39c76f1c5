//! Species identity: canonical labels and isomorphism.
//!
//! The label is an isomorphism invariant computed by color refinement over
//! molecules and components. Equal labels are necessary but not sufficient
//! for equivalence, so the store confirms bucket hits with [`Canonical::isomorphic`].
//!
//! Same-named components of one molecule are interchangeable: `A(r!1,r)` and
//! `A(r,r!1)` are the same species.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::graph::{Site, SpeciesGraph};
use super::molecule::MoleculeTypes;

const UNMAPPED: usize = usize::MAX;

/// Cheap isomorphism-invariant label used to bucket species.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalLabel {
    pub molecules: usize,
    pub bonds: usize,
    pub digest: u64,
}

/// Exact per-site attributes: (name key, state, bond count).
type SiteKey = (usize, Option<usize>, usize);

/// Refined colors of one species graph.
#[derive(Clone, Debug)]
pub struct Canonical {
    label: CanonicalLabel,
    molecule_colors: Vec<u64>,
    site_colors: Vec<Vec<u64>>,
    site_keys: Vec<Vec<SiteKey>>,
}

fn digest<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl Canonical {
    /// Refine colors until the partition stops splitting.
    pub fn of(types: &MoleculeTypes, graph: &SpeciesGraph) -> Self {
        let n_mol = graph.len();
        let mut offsets = Vec::with_capacity(n_mol);
        let mut n_sites = 0;
        for molecule in &graph.molecules {
            offsets.push(n_mol + n_sites);
            n_sites += molecule.components.len();
        }
        let vertex = |site: Site| offsets[site.molecule] + site.component;

        let mut site_keys = Vec::with_capacity(n_mol);
        let mut colors = Vec::with_capacity(n_mol + n_sites);
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n_mol + n_sites];

        for molecule in &graph.molecules {
            colors.push(digest(&("molecule", molecule.type_id)));
        }
        for (m, molecule) in graph.molecules.iter().enumerate() {
            let mtype = types.get(molecule.type_id);
            let mut keys = Vec::with_capacity(molecule.components.len());
            for (c, component) in molecule.components.iter().enumerate() {
                let name_key = mtype.slots_named(&mtype.components[c].name).next().unwrap_or(c);
                let key = (name_key, component.state, component.bonds.len());
                colors.push(digest(&("site", molecule.type_id, key)));
                keys.push(key);

                let v = vertex(Site::new(m, c));
                adjacency[m].push(v);
                adjacency[v].push(m);
                for &partner in &component.bonds {
                    adjacency[v].push(vertex(partner));
                }
            }
            site_keys.push(keys);
        }

        let mut classes = distinct(&colors);
        for _ in 0..colors.len() {
            let refined: Vec<u64> = (0..colors.len())
                .map(|v| {
                    let mut around: Vec<u64> = adjacency[v].iter().map(|&u| colors[u]).collect();
                    around.sort_unstable();
                    digest(&(colors[v], around))
                })
                .collect();
            let refined_classes = distinct(&refined);
            colors = refined;
            if refined_classes == classes {
                break;
            }
            classes = refined_classes;
        }

        let mut sorted = colors.clone();
        sorted.sort_unstable();
        let label = CanonicalLabel {
            molecules: n_mol,
            bonds: graph.bond_count(),
            digest: digest(&sorted),
        };
        let site_colors = graph
            .molecules
            .iter()
            .enumerate()
            .map(|(m, molecule)| {
                (0..molecule.components.len())
                    .map(|c| colors[offsets[m] + c])
                    .collect()
            })
            .collect();
        colors.truncate(n_mol);

        Self {
            label,
            molecule_colors: colors,
            site_colors,
            site_keys,
        }
    }

    #[inline]
    pub fn label(&self) -> CanonicalLabel {
        self.label
    }

    /// Full isomorphism check between `graph` (refined as `self`) and `other`.
    pub fn isomorphic(&self, graph: &SpeciesGraph, other: &Canonical, other_graph: &SpeciesGraph) -> bool {
        if self.label != other.label {
            return false;
        }
        Search::new(graph, self, other_graph, other, 1).run() == 1
    }

    /// Number of self-isomorphisms, counting permutations of same-named components.
    pub fn automorphisms(&self, graph: &SpeciesGraph) -> usize {
        Search::new(graph, self, graph, self, usize::MAX).run()
    }
}

fn distinct(colors: &[u64]) -> usize {
    colors.iter().collect::<HashSet<_>>().len()
}

/// Isomorphism-invariant label of a species graph.
pub fn canonical_label(types: &MoleculeTypes, graph: &SpeciesGraph) -> CanonicalLabel {
    Canonical::of(types, graph).label()
}

/// True if the two graphs are the same species.
pub fn is_isomorphic(types: &MoleculeTypes, a: &SpeciesGraph, b: &SpeciesGraph) -> bool {
    Canonical::of(types, a).isomorphic(a, &Canonical::of(types, b), b)
}

pub fn automorphism_count(types: &MoleculeTypes, graph: &SpeciesGraph) -> usize {
    Canonical::of(types, graph).automorphisms(graph)
}

/// Backtracking over molecule images, then component images per molecule.
struct Search<'g> {
    a: &'g SpeciesGraph,
    ca: &'g Canonical,
    b: &'g SpeciesGraph,
    cb: &'g Canonical,
    order: Vec<usize>,
    molecule_map: Vec<usize>,
    site_map: Vec<Vec<usize>>,
    used: Vec<bool>,
    found: usize,
    limit: usize,
}

impl<'g> Search<'g> {
    fn new(
        a: &'g SpeciesGraph,
        ca: &'g Canonical,
        b: &'g SpeciesGraph,
        cb: &'g Canonical,
        limit: usize,
    ) -> Self {
        Self {
            a,
            ca,
            b,
            cb,
            order: visit_order(a, ca),
            molecule_map: vec![UNMAPPED; a.len()],
            site_map: a
                .molecules
                .iter()
                .map(|m| vec![UNMAPPED; m.components.len()])
                .collect(),
            used: vec![false; b.len()],
            found: 0,
            limit,
        }
    }

    fn run(mut self) -> usize {
        if self.a.len() != self.b.len() {
            return 0;
        }
        self.molecule(0);
        self.found
    }

    fn candidates(&self, am: usize) -> Vec<usize> {
        let anchor = self.a.molecules[am]
            .components
            .iter()
            .flat_map(|c| c.bonds.iter())
            .map(|s| self.molecule_map[s.molecule])
            .find(|&image| image != UNMAPPED);
        let pool = match anchor {
            Some(image) => self.b.neighbors(image),
            None => (0..self.b.len()).collect(),
        };
        pool.into_iter()
            .filter(|&bm| {
                !self.used[bm]
                    && self.b.molecules[bm].type_id == self.a.molecules[am].type_id
                    && self.cb.molecule_colors[bm] == self.ca.molecule_colors[am]
            })
            .collect()
    }

    /// Returns true once the search limit is reached.
    fn molecule(&mut self, k: usize) -> bool {
        if k == self.order.len() {
            self.found += 1;
            return self.found >= self.limit;
        }
        let am = self.order[k];
        for bm in self.candidates(am) {
            self.molecule_map[am] = bm;
            self.used[bm] = true;
            let stop = self.component(k, am, bm, 0);
            self.used[bm] = false;
            self.molecule_map[am] = UNMAPPED;
            if stop {
                return true;
            }
        }
        false
    }

    fn component(&mut self, k: usize, am: usize, bm: usize, c: usize) -> bool {
        let n = self.a.molecules[am].components.len();
        if c == n {
            return self.molecule(k + 1);
        }
        for d in 0..n {
            if self.cb.site_keys[bm][d] != self.ca.site_keys[am][c]
                || self.cb.site_colors[bm][d] != self.ca.site_colors[am][c]
                || self.site_map[am][..c].contains(&d)
                || !self.bonds_agree(Site::new(am, c), Site::new(bm, d))
            {
                continue;
            }
            self.site_map[am][c] = d;
            let stop = self.component(k, am, bm, c + 1);
            self.site_map[am][c] = UNMAPPED;
            if stop {
                return true;
            }
        }
        false
    }

    /// Every bond from `from` to an already mapped site must exist on the image.
    fn bonds_agree(&self, from: Site, to: Site) -> bool {
        let targets = self.b.partners(to);
        self.a.partners(from).iter().all(|p| {
            let pm = self.molecule_map[p.molecule];
            if pm == UNMAPPED {
                return true;
            }
            let pc = self.site_map[p.molecule][p.component];
            pc == UNMAPPED || targets.contains(&Site::new(pm, pc))
        })
    }
}

/// Breadth-first per connected group, rooted at the rarest molecule color.
fn visit_order(graph: &SpeciesGraph, canonical: &Canonical) -> Vec<usize> {
    let n = graph.len();
    let rarity = |m: usize| {
        canonical
            .molecule_colors
            .iter()
            .filter(|&&c| c == canonical.molecule_colors[m])
            .count()
    };
    let mut seen = vec![false; n];
    let mut order = Vec::with_capacity(n);
    while order.len() < n {
        let Some(root) = (0..n).filter(|&m| !seen[m]).min_by_key(|&m| (rarity(m), m)) else {
            break;
        };
        seen[root] = true;
        let mut queue = VecDeque::from([root]);
        while let Some(m) = queue.pop_front() {
            order.push(m);
            for next in graph.neighbors(m) {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
    }
    order
}
