//! Parent selection over a pool of candidates.
//!
//! Every strategy draws `n` picks with repetition. Candidates that were never evaluated count as
//! having zero fitness.

use super::candidate::{Candidate, CandidateSource};
use super::config::{SelectionStrategy, SourceWeights};
use super::context::GaContext;
use super::crossover::XoverSite;
use super::population::Population;
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{instrument, trace, warn};

fn fitness_of(c: &Candidate) -> f64 {
    c.fitness().unwrap_or(0.0)
}

/// Two random draws per pick; a coin flip decides whether the fitter or the weaker one is kept.
pub fn tournament<R: Rng>(pool: &[Arc<Candidate>], n: usize, rng: &mut R) -> Vec<Arc<Candidate>> {
    let mut picks = Vec::with_capacity(n);
    for _ in 0..n {
        let (Some(p1), Some(p2)) = (pool.choose(rng), pool.choose(rng)) else {
            break;
        };
        let fitter = rng.gen_bool(0.5);
        let p1_wins = if fitter {
            fitness_of(p1) > fitness_of(p2)
        } else {
            fitness_of(p1) < fitness_of(p2)
        };
        picks.push(Arc::clone(if p1_wins { p1 } else { p2 }));
    }
    picks
}

pub fn random<R: Rng>(pool: &[Arc<Candidate>], n: usize, rng: &mut R) -> Vec<Arc<Candidate>> {
    (0..n).filter_map(|_| pool.choose(rng).cloned()).collect()
}

/// Roulette-wheel selection: a binary search of a uniform draw on the cumulative fitness.
///
/// Negative fitness values are translated by the magnitude of the minimum. Falls back to
/// uniform picks when the total fitness is not positive.
pub fn roulette_wheel<R: Rng>(pool: &[Arc<Candidate>], n: usize, rng: &mut R) -> Vec<Arc<Candidate>> {
    let min = pool
        .iter()
        .map(|c| fitness_of(c))
        .fold(f64::INFINITY, f64::min);
    let offset = if min < 0.0 { -min } else { 0.0 };
    let cumulative: Vec<f64> = pool
        .iter()
        .scan(0.0, |sum, c| {
            *sum += fitness_of(c) + offset;
            Some(*sum)
        })
        .collect();
    let total = cumulative.last().copied().unwrap_or(0.0);
    if !(total > 0.0 && total.is_finite()) {
        if !pool.is_empty() {
            warn!(total, "Total fitness is not positive, selecting uniformly");
        }
        return random(pool, n, rng);
    }
    (0..n)
        .map(|_| {
            let target = rng.gen_range(0.0..1.0) * total;
            let index = cumulative
                .partition_point(|&c| c <= target)
                .min(pool.len() - 1);
            Arc::clone(&pool[index])
        })
        .collect()
}

/// Stochastic universal sampling: one random offset, then `n` evenly spaced pointers over the
/// cumulative expected frequencies.
///
/// Member `i` is picked either floor or ceil of `f_i / total * n` times. Negative fitness
/// values are translated by the magnitude of the minimum.
pub fn stochastic_universal<R: Rng>(
    pool: &[Arc<Candidate>],
    n: usize,
    rng: &mut R,
) -> Vec<Arc<Candidate>> {
    if pool.is_empty() {
        return Vec::new();
    }
    let fitness: Vec<f64> = pool.iter().map(|c| fitness_of(c)).collect();
    let min = fitness.iter().copied().fold(f64::INFINITY, f64::min);
    let offset = if min < 0.0 { -min } else { 0.0 };
    let total: f64 = fitness.iter().map(|f| f + offset).sum();
    let expectations: Vec<f64> = if total > 0.0 && total.is_finite() {
        fitness.iter().map(|f| (f + offset) / total * n as f64).collect()
    } else {
        vec![n as f64 / pool.len() as f64; pool.len()]
    };

    let pointer = rng.gen_range(0.0..1.0);
    let mut picks = Vec::with_capacity(n);
    let mut cumulative = 0.0;
    for (candidate, expected) in pool.iter().zip(&expectations) {
        cumulative += expected;
        while picks.len() < n && cumulative > pointer + picks.len() as f64 {
            picks.push(Arc::clone(candidate));
        }
    }
    // Rounding can leave the last pointer just past the end of the curve.
    while picks.len() < n {
        picks.push(Arc::clone(&pool[pool.len() - 1]));
    }
    picks
}

pub fn select<R: Rng>(
    strategy: SelectionStrategy,
    pool: &[Arc<Candidate>],
    n: usize,
    rng: &mut R,
) -> Vec<Arc<Candidate>> {
    match strategy {
        SelectionStrategy::Tournament => tournament(pool, n, rng),
        SelectionStrategy::RouletteWheel => roulette_wheel(pool, n, rng),
        SelectionStrategy::StochasticUniversal => stochastic_universal(pool, n, rng),
        SelectionStrategy::Random => random(pool, n, rng),
    }
}

/// Draws the way the next candidate is produced, proportionally to `weights`.
pub fn pick_new_candidate_generation_mode<R: Rng>(weights: &SourceWeights, rng: &mut R) -> CandidateSource {
    let total = weights.crossover + weights.mutation + weights.construction;
    let draw = rng.gen_range(0.0..1.0) * total;
    if draw < weights.crossover {
        CandidateSource::Crossover
    } else if draw < weights.crossover + weights.mutation {
        CandidateSource::Mutation
    } else {
        CandidateSource::Construction
    }
}

/// Fitness-based, compatibility-constrained choice of two parents and a crossover site.
///
/// The first parent is selected among `eligible`, the second among the members of `eligible`
/// sharing at least one crossover site with it; the site is then drawn uniformly.
#[instrument(level = "debug", skip_all)]
pub fn perform_fbcc<R: Rng>(
    population: &Population,
    eligible: &[Arc<Candidate>],
    ctx: &GaContext,
    rng: &mut R,
) -> Option<(Arc<Candidate>, Arc<Candidate>, XoverSite)> {
    let strategy = ctx.config.selection;
    let a = select(strategy, eligible, 1, rng).pop()?;
    let partners =
        population.crossover_partners(&a, eligible, ctx.space, ctx.config.max_xover_subgraph_size);
    if partners.is_empty() {
        trace!(candidate = a.name(), "No crossover partner");
        return None;
    }
    let b = select(strategy, &partners, 1, rng).pop()?;
    let sites = population.crossover_sites(&a, &b);
    let site = sites.choose(rng)?.clone();
    trace!(a = a.name(), b = b.name(), sites = sites.len(), "Crossover parents chosen");
    Some((a, b, site))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::library::test_utils::*;
    use crate::core::models::graph::Graph;
    use crate::engine::context::test_utils::*;
    use crate::engine::evaluation::Evaluation;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    fn scored(fitness: f64, name: &str, graph: Graph) -> Arc<Candidate> {
        Arc::new(
            Candidate::new(name, graph, 0, CandidateSource::Construction).with_evaluation(Evaluation {
                uid: name.to_string(),
                fitness,
                representation: None,
            }),
        )
    }

    fn pool(fitness: &[f64]) -> Vec<Arc<Candidate>> {
        fitness
            .iter()
            .enumerate()
            .map(|(i, f)| scored(*f, &format!("M{i}"), Graph::new()))
            .collect()
    }

    fn counts(picks: &[Arc<Candidate>]) -> HashMap<String, usize> {
        let mut out = HashMap::new();
        for p in picks {
            *out.entry(p.name().to_string()).or_insert(0) += 1;
        }
        out
    }

    mod strategies {
        use super::*;

        #[test]
        fn tournament_always_fills_every_pick() {
            let members = pool(&[1.0, 2.0, 3.0]);
            let mut rng = ChaCha8Rng::seed_from_u64(3);
            assert_eq!(tournament(&members, 25, &mut rng).len(), 25);
            assert!(tournament(&[], 5, &mut rng).is_empty());
        }

        #[test]
        fn sus_counts_stay_within_floor_and_ceil() {
            let fitness = [1.0, 2.0, 3.0, 4.0, 0.5];
            let members = pool(&fitness);
            let total: f64 = fitness.iter().sum();
            let n = 7;
            for seed in 0..20 {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let picks = stochastic_universal(&members, n, &mut rng);
                assert_eq!(picks.len(), n);
                let counts = counts(&picks);
                for (i, f) in fitness.iter().enumerate() {
                    let expected = f / total * n as f64;
                    let got = counts.get(&format!("M{i}")).copied().unwrap_or(0) as f64;
                    assert!(got >= expected.floor() && got <= expected.ceil());
                }
            }
        }

        #[test]
        fn sus_translates_negative_fitness() {
            let members = pool(&[-2.0, -1.0, 2.0]);
            let mut rng = ChaCha8Rng::seed_from_u64(5);
            let picks = stochastic_universal(&members, 10, &mut rng);
            assert_eq!(picks.len(), 10);
            assert!(counts(&picks).get("M0").is_none());
        }

        #[test]
        fn roulette_wheel_skips_zero_fitness_members() {
            let members = pool(&[0.0, 5.0, 0.0]);
            let mut rng = ChaCha8Rng::seed_from_u64(9);
            let picks = roulette_wheel(&members, 30, &mut rng);
            assert!(picks.iter().all(|p| p.name() == "M1"));
        }

        #[test]
        fn roulette_wheel_translates_negative_fitness() {
            let members = pool(&[-3.0, -1.0, 2.0]);
            let mut rng = ChaCha8Rng::seed_from_u64(13);
            let picks = roulette_wheel(&members, 200, &mut rng);
            assert_eq!(picks.len(), 200);
            let tally = counts(&picks);
            assert!(tally.get("M0").is_none());
            assert!(tally["M2"] > tally["M1"]);
        }

        #[test]
        fn roulette_wheel_without_positive_total_is_uniform() {
            let members = pool(&[0.0, 0.0]);
            let mut rng = ChaCha8Rng::seed_from_u64(9);
            assert_eq!(roulette_wheel(&members, 4, &mut rng).len(), 4);
        }

        #[test]
        fn generation_mode_follows_weights() {
            let weights = SourceWeights {
                crossover: 0.0,
                mutation: 1.0,
                construction: 0.0,
            };
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            for _ in 0..20 {
                assert_eq!(
                    pick_new_candidate_generation_mode(&weights, &mut rng),
                    CandidateSource::Mutation
                );
            }
        }
    }

    mod fbcc {
        use super::*;

        #[test]
        fn picks_compatible_parents_and_a_cached_site() {
            let harness = Harness::new(default_config());
            let ctx = harness.ctx();
            let population = Population::new();
            population.add(
                Candidate::new("M0", linear_graph(&harness.space, &harness.ids, 2).0, 0, CandidateSource::Construction)
                    .with_evaluation(Evaluation {
                        uid: "a".into(),
                        fitness: 1.0,
                        representation: None,
                    }),
            );
            population.add(
                Candidate::new("M1", linear_graph(&harness.space, &harness.ids, 3).0, 0, CandidateSource::Construction)
                    .with_evaluation(Evaluation {
                        uid: "b".into(),
                        fitness: 2.0,
                        representation: None,
                    }),
            );
            let members = population.members();
            let mut rng = ChaCha8Rng::seed_from_u64(2);
            let (a, b, site) = perform_fbcc(&population, &members, &ctx, &mut rng).unwrap();
            assert_ne!(a.name(), b.name());
            assert!(population.crossover_sites(&a, &b).contains(&site));
        }

        #[test]
        fn lone_candidate_has_no_partner() {
            let harness = Harness::new(default_config());
            let ctx = harness.ctx();
            let population = Population::new();
            population.add(Candidate::new(
                "M0",
                linear_graph(&harness.space, &harness.ids, 2).0,
                0,
                CandidateSource::Construction,
            ));
            let members = population.members();
            let mut rng = ChaCha8Rng::seed_from_u64(2);
            assert!(perform_fbcc(&population, &members, &ctx, &mut rng).is_none());
        }
    }
}
