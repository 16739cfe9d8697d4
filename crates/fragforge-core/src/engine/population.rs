use super::candidate::Candidate;
use super::crossover::{XoverSite, locate_compatible_xover_sites};
use crate::core::library::fragment_space::FragmentSpace;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, instrument};

/// Crossover sites between pairs of members, keyed by candidate name.
///
/// Storing the sites of `a -> b` also stores their mirror under `b -> a`. An empty list records
/// that the pair was examined and found incompatible.
#[derive(Default)]
struct XoverCache {
    sites: HashMap<String, HashMap<String, Vec<XoverSite>>>,
}

impl XoverCache {
    fn contains(&self, a: &str, b: &str) -> bool {
        self.sites.get(a).is_some_and(|m| m.contains_key(b))
    }

    fn put(&mut self, a: &str, b: &str, sites: Vec<XoverSite>) {
        let mirrored = sites.iter().map(XoverSite::mirrored).collect();
        self.sites
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string(), sites);
        self.sites
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string(), mirrored);
    }

    fn get(&self, a: &str, b: &str) -> Vec<XoverSite> {
        self.sites
            .get(a)
            .and_then(|m| m.get(b))
            .cloned()
            .unwrap_or_default()
    }

    fn has_sites(&self, a: &str, b: &str) -> bool {
        self.sites
            .get(a)
            .and_then(|m| m.get(b))
            .is_some_and(|s| !s.is_empty())
    }

    fn remove(&mut self, name: &str) {
        self.sites.remove(name);
        for partners in self.sites.values_mut() {
            partners.remove(name);
        }
    }
}

/// Aggregate fitness statistics of the evaluated members.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationStats {
    pub size: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

/// An insertion-ordered collection of candidates shared between the workers of a run.
///
/// Every method takes `&self`. Members sit behind a read-write lock, the crossover-site cache
/// behind its own mutex, and every structural change bumps an atomic version counter.
pub struct Population {
    members: RwLock<Vec<Arc<Candidate>>>,
    xover_cache: Mutex<XoverCache>,
    version: AtomicU64,
}

impl Default for Population {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Population")
            .field("len", &self.len())
            .field("version", &self.version())
            .finish()
    }
}

impl Clone for Population {
    /// Copies the members and the version; the crossover cache starts empty.
    fn clone(&self) -> Self {
        Self {
            members: RwLock::new(self.read_members().clone()),
            xover_cache: Mutex::new(XoverCache::default()),
            version: AtomicU64::new(self.version()),
        }
    }
}

impl Population {
    pub fn new() -> Self {
        Self {
            members: RwLock::new(Vec::new()),
            xover_cache: Mutex::new(XoverCache::default()),
            version: AtomicU64::new(0),
        }
    }

    fn read_members(&self) -> RwLockReadGuard<'_, Vec<Arc<Candidate>>> {
        self.members.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_members(&self) -> RwLockWriteGuard<'_, Vec<Arc<Candidate>>> {
        self.members.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cache(&self) -> MutexGuard<'_, XoverCache> {
        self.xover_cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    fn forget(&self, removed: &[Arc<Candidate>]) {
        if removed.is_empty() {
            return;
        }
        let mut cache = self.lock_cache();
        for c in removed {
            cache.remove(c.name());
        }
    }

    /// Incremented on every structural change.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.read_members().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_members().is_empty()
    }

    pub fn add(&self, candidate: Candidate) -> Arc<Candidate> {
        let shared = Arc::new(candidate);
        self.write_members().push(Arc::clone(&shared));
        self.bump();
        shared
    }

    /// Inserts at `index`, clamped to the current length.
    pub fn insert(&self, index: usize, candidate: Candidate) -> Arc<Candidate> {
        let shared = Arc::new(candidate);
        {
            let mut members = self.write_members();
            let index = index.min(members.len());
            members.insert(index, Arc::clone(&shared));
        }
        self.bump();
        shared
    }

    /// Replaces the member at `index`, returning the one it replaced.
    pub fn set(&self, index: usize, candidate: Candidate) -> Option<Arc<Candidate>> {
        let old = {
            let mut members = self.write_members();
            let slot = members.get_mut(index)?;
            std::mem::replace(slot, Arc::new(candidate))
        };
        self.forget(std::slice::from_ref(&old));
        self.bump();
        Some(old)
    }

    pub fn remove(&self, index: usize) -> Option<Arc<Candidate>> {
        let removed = {
            let mut members = self.write_members();
            (index < members.len()).then(|| members.remove(index))?
        };
        self.forget(std::slice::from_ref(&removed));
        self.bump();
        Some(removed)
    }

    pub fn remove_named(&self, name: &str) -> Option<Arc<Candidate>> {
        let removed = {
            let mut members = self.write_members();
            let index = members.iter().position(|c| c.name() == name)?;
            members.remove(index)
        };
        self.forget(std::slice::from_ref(&removed));
        self.bump();
        Some(removed)
    }

    /// Keeps only the members for which `keep` returns `true`.
    pub fn retain(&self, mut keep: impl FnMut(&Candidate) -> bool) {
        let removed: Vec<Arc<Candidate>> = {
            let mut members = self.write_members();
            let (kept, removed) = members.drain(..).partition(|c| keep(c));
            *members = kept;
            removed
        };
        self.forget(&removed);
        self.bump();
    }

    pub fn clear(&self) {
        self.write_members().clear();
        *self.lock_cache() = XoverCache::default();
        self.bump();
    }

    /// A snapshot of the members in insertion order.
    pub fn members(&self) -> Vec<Arc<Candidate>> {
        self.read_members().clone()
    }

    pub fn get(&self, index: usize) -> Option<Arc<Candidate>> {
        self.read_members().get(index).cloned()
    }

    pub fn candidate_named(&self, name: &str) -> Option<Arc<Candidate>> {
        self.read_members().iter().find(|c| c.name() == name).cloned()
    }

    pub fn contains_uid(&self, uid: &str) -> bool {
        self.read_members().iter().any(|c| c.uid() == uid)
    }

    /// Keeps the `size` fittest members. Unevaluated members rank last.
    pub fn trim(&self, size: usize) {
        let removed = {
            let mut members = self.write_members();
            if members.len() <= size {
                return;
            }
            members.sort_by(|a, b| {
                let fa = a.fitness().unwrap_or(f64::NEG_INFINITY);
                let fb = b.fitness().unwrap_or(f64::NEG_INFINITY);
                fb.total_cmp(&fa)
            });
            members.split_off(size)
        };
        debug!(removed = removed.len(), kept = size, "Population trimmed");
        self.forget(&removed);
        self.bump();
    }

    pub fn min_fitness(&self) -> Option<f64> {
        self.read_members()
            .iter()
            .filter_map(|c| c.fitness())
            .min_by(f64::total_cmp)
    }

    pub fn max_fitness(&self) -> Option<f64> {
        self.read_members()
            .iter()
            .filter_map(|c| c.fitness())
            .max_by(f64::total_cmp)
    }

    /// Whether `value` lies within the best `percentile` (0 to 1) of the fitness range.
    pub fn is_within_percentile(&self, value: f64, percentile: f64) -> bool {
        let members = self.read_members();
        let (min, max) = members
            .iter()
            .filter_map(|c| c.fitness())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), f| (lo.min(f), hi.max(f)));
        if min > max {
            return false;
        }
        value > min + (1.0 - percentile) * (max - min)
    }

    /// Fitness statistics, computed while holding the member lock.
    pub fn stats(&self) -> Option<PopulationStats> {
        let members = self.read_members();
        let mut values: Vec<f64> = members.iter().filter_map(|c| c.fitness()).collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (values[n / 2 - 1] + values[n / 2]) / 2.0
        } else {
            values[n / 2]
        };
        Some(PopulationStats {
            size: members.len(),
            min: values[0],
            max: values[n - 1],
            mean,
            median,
            std_dev: variance.sqrt(),
        })
    }

    /// Members of `eligible` that share at least one crossover site with `a`.
    ///
    /// Pairs not yet in the cache are examined first. `a` itself and members whose graph is
    /// identical to the one of `a` never qualify.
    #[instrument(level = "debug", skip_all, fields(candidate = a.name()))]
    pub fn crossover_partners(
        &self,
        a: &Candidate,
        eligible: &[Arc<Candidate>],
        space: &FragmentSpace,
        max_subgraph_size: usize,
    ) -> Vec<Arc<Candidate>> {
        let missing: Vec<&Arc<Candidate>> = {
            let cache = self.lock_cache();
            eligible
                .iter()
                .filter(|b| b.name() != a.name() && !cache.contains(a.name(), b.name()))
                .collect()
        };

        let examine = |b: &&Arc<Candidate>| -> (String, Vec<XoverSite>) {
            let sites = if a.graph().is_isomorphic_to(b.graph()) {
                Vec::new()
            } else {
                locate_compatible_xover_sites(a.graph(), b.graph(), space, max_subgraph_size)
            };
            (b.name().to_string(), sites)
        };
        #[cfg(feature = "parallel")]
        let found: Vec<(String, Vec<XoverSite>)> = missing.par_iter().map(examine).collect();
        #[cfg(not(feature = "parallel"))]
        let found: Vec<(String, Vec<XoverSite>)> = missing.iter().map(examine).collect();

        let live: HashSet<String> = self
            .read_members()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let mut cache = self.lock_cache();
        for (name, sites) in found {
            if live.contains(a.name()) && live.contains(&name) {
                cache.put(a.name(), &name, sites);
            }
        }
        eligible
            .iter()
            .filter(|b| b.name() != a.name() && cache.has_sites(a.name(), b.name()))
            .cloned()
            .collect()
    }

    /// Cached crossover sites for `a -> b`, seen from `a`.
    pub fn crossover_sites(&self, a: &Candidate, b: &Candidate) -> Vec<XoverSite> {
        self.lock_cache().get(a.name(), b.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::library::test_utils::*;
    use crate::core::models::ids::IdGenerator;
    use crate::engine::candidate::CandidateSource;
    use crate::engine::evaluation::Evaluation;

    fn candidate(name: &str, fitness: f64, graph: crate::core::models::graph::Graph) -> Candidate {
        Candidate::new(name, graph, 0, CandidateSource::Construction).with_evaluation(Evaluation {
            uid: format!("uid-{name}"),
            fitness,
            representation: None,
        })
    }

    fn scored(fitnesses: &[f64]) -> Population {
        let population = Population::new();
        for (i, f) in fitnesses.iter().enumerate() {
            population.add(candidate(&format!("M{i}"), *f, Default::default()));
        }
        population
    }

    mod membership {
        use super::*;

        #[test]
        fn structural_changes_bump_the_version() {
            let population = scored(&[1.0, 2.0]);
            let v = population.version();
            population.insert(0, candidate("M9", 0.5, Default::default()));
            population.remove(1);
            population.retain(|c| c.name() != "M9");
            assert_eq!(population.version(), v + 3);
            assert_eq!(population.len(), 1);
            assert_eq!(population.get(0).unwrap().name(), "M1");
        }

        #[test]
        fn trim_keeps_the_fittest() {
            let population = scored(&[1.0, 5.0, 3.0, 4.0]);
            population.trim(2);
            let names: Vec<String> = population
                .members()
                .iter()
                .map(|c| c.name().to_string())
                .collect();
            assert_eq!(names, vec!["M1", "M3"]);
        }

        #[test]
        fn lookup_by_name_and_uid() {
            let population = scored(&[1.0, 2.0]);
            assert_eq!(population.candidate_named("M1").unwrap().fitness(), Some(2.0));
            assert!(population.candidate_named("M7").is_none());
            assert!(population.contains_uid("uid-M0"));
            assert!(population.remove_named("M0").is_some());
            assert!(!population.contains_uid("uid-M0"));
        }

        #[test]
        fn clone_copies_members_and_version() {
            let population = scored(&[1.0, 2.0]);
            let copy = population.clone();
            assert_eq!(copy.len(), 2);
            assert_eq!(copy.version(), population.version());
        }
    }

    mod statistics {
        use super::*;

        #[test]
        fn fitness_range_and_percentile() {
            let population = scored(&[0.0, 10.0, 4.0]);
            assert_eq!(population.min_fitness(), Some(0.0));
            assert_eq!(population.max_fitness(), Some(10.0));
            assert!(population.is_within_percentile(9.5, 0.1));
            assert!(!population.is_within_percentile(8.5, 0.1));
        }

        #[test]
        fn stats_snapshot() {
            let population = scored(&[1.0, 2.0, 3.0, 4.0]);
            let stats = population.stats().unwrap();
            assert_eq!(stats.size, 4);
            assert_eq!(stats.median, 2.5);
            assert_eq!(stats.mean, 2.5);
            assert!((stats.std_dev - 1.25_f64.sqrt()).abs() < 1e-12);
        }

        #[test]
        fn empty_population_has_no_stats() {
            let population = Population::new();
            assert!(population.stats().is_none());
            assert!(population.min_fitness().is_none());
            assert!(!population.is_within_percentile(1.0, 0.5));
        }
    }

    mod crossover_cache {
        use super::*;

        fn chains() -> (crate::core::library::fragment_space::FragmentSpace, Population) {
            let space = test_library();
            let ids = IdGenerator::new();
            let population = Population::new();
            population.add(candidate("M0", 1.0, linear_graph(&space, &ids, 2).0));
            population.add(candidate("M1", 2.0, linear_graph(&space, &ids, 3).0));
            population.add(candidate("M2", 3.0, linear_graph(&space, &ids, 2).0));
            (space, population)
        }

        #[test]
        fn identical_graphs_and_self_are_not_partners() {
            let (space, population) = chains();
            let members = population.members();
            let partners = population.crossover_partners(&members[0], &members, &space, 100);
            assert_eq!(partners.len(), 1);
            assert_eq!(partners[0].name(), "M1");
        }

        #[test]
        fn cached_sites_are_stored_both_ways() {
            let (space, population) = chains();
            let members = population.members();
            population.crossover_partners(&members[0], &members, &space, 100);
            let forward = population.crossover_sites(&members[0], &members[1]);
            let backward = population.crossover_sites(&members[1], &members[0]);
            assert!(!forward.is_empty());
            let mirrored: Vec<XoverSite> = forward.iter().map(XoverSite::mirrored).collect();
            assert_eq!(backward, mirrored);
        }

        #[test]
        fn removal_purges_cached_sites() {
            let (space, population) = chains();
            let members = population.members();
            population.crossover_partners(&members[0], &members, &space, 100);
            population.remove_named("M1");
            assert!(population.crossover_sites(&members[0], &members[1]).is_empty());
            assert!(population.crossover_sites(&members[1], &members[0]).is_empty());
        }
    }
}
