use super::generate::{
    build_candidate_by_mutation, build_candidate_by_xover, build_candidate_from_scratch,
    build_candidate_manually,
};
use crate::core::library::fragment_space::FragmentSpace;
use crate::core::library::ring_closures::RingClosuresArchive;
use crate::core::models::graph::Graph;
use crate::core::models::ids::IdGenerator;
use crate::engine::candidate::{Candidate, CandidateSource};
use crate::engine::config::GaConfig;
use crate::engine::context::GaContext;
use crate::engine::error::EngineError;
use crate::engine::evaluation::Evaluator;
use crate::engine::monitor::{CounterId, Monitor};
use crate::engine::population::{Population, PopulationStats};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::selection::pick_new_candidate_generation_mode;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, instrument, warn};

#[derive(Debug)]
pub struct EvolutionResult {
    pub population: Population,
    /// One monitor per generation, the initial population being generation 0.
    pub monitors: Vec<Monitor>,
}

/// Shared inputs of one round of candidate production.
struct Round<'a> {
    ctx: GaContext<'a>,
    evaluator: &'a dyn Evaluator,
    population: &'a Population,
    eligible: &'a [Arc<Candidate>],
    generation: usize,
    construction_only: bool,
}

/// The random stream of one production slot.
///
/// Draws do not depend on scheduling. Vertex ids, graph ids and candidate names come from the
/// shared [`IdGenerator`], and duplicates are resolved first come first served, so with the
/// `parallel` feature those follow thread order. Sequential runs are fully reproducible.
fn slot_rng(seed: u64, generation: usize, slot: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(((generation as u64) << 32) | slot as u64);
    rng
}

fn produce_one(
    round: &Round,
    slot: usize,
    seen: &Mutex<HashSet<String>>,
) -> Result<Option<Candidate>, EngineError> {
    let ctx = &round.ctx;
    let mut rng = slot_rng(ctx.config.seed, round.generation, slot);
    for _ in 0..ctx.config.max_tries_per_generation {
        let source = if round.construction_only {
            CandidateSource::Construction
        } else {
            pick_new_candidate_generation_mode(&ctx.config.sources, &mut rng)
        };
        let built = match source {
            CandidateSource::Crossover => build_candidate_by_xover(
                round.eligible,
                round.population,
                round.generation,
                ctx,
                round.evaluator,
                &mut rng,
            )?,
            CandidateSource::Mutation => build_candidate_by_mutation(
                round.eligible,
                round.generation,
                ctx,
                round.evaluator,
                &mut rng,
            )?,
            CandidateSource::Construction | CandidateSource::Manual => {
                build_candidate_from_scratch(round.generation, ctx, round.evaluator, &mut rng)?
            }
        };
        let Some(candidate) = built else {
            continue;
        };
        let fresh = !round.population.contains_uid(candidate.uid())
            && seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(candidate.uid().to_string());
        if !fresh {
            ctx.monitor.increase(CounterId::DuplicatePreFitness);
            continue;
        }
        ctx.reporter.report(Progress::TaskIncrement);
        return Ok(Some(candidate));
    }
    Ok(None)
}

/// Produces up to `count` new, mutually distinct candidates, one random stream per slot.
fn produce(round: &Round, count: usize) -> Result<Vec<Candidate>, EngineError> {
    round.ctx.reporter.report(Progress::TaskStart {
        total_steps: count as u64,
    });
    let seen = Mutex::new(HashSet::new());
    let slots: Vec<usize> = (0..count).collect();

    #[cfg(feature = "parallel")]
    let results: Vec<Option<Candidate>> = slots
        .par_iter()
        .map(|&slot| produce_one(round, slot, &seen))
        .collect::<Result<_, _>>()?;
    #[cfg(not(feature = "parallel"))]
    let results: Vec<Option<Candidate>> = slots
        .iter()
        .map(|&slot| produce_one(round, slot, &seen))
        .collect::<Result<_, _>>()?;

    round.ctx.reporter.report(Progress::TaskFinish);
    let produced: Vec<Candidate> = results.into_iter().flatten().collect();
    if produced.len() < count {
        warn!(
            requested = count,
            produced = produced.len(),
            generation = round.generation,
            "Gave up on some candidates after too many failed attempts"
        );
    }
    Ok(produced)
}

fn log_stats(generation: usize, stats: Option<PopulationStats>) {
    if let Some(s) = stats {
        info!(
            generation,
            size = s.size,
            min = s.min,
            max = s.max,
            mean = s.mean,
            median = s.median,
            std_dev = s.std_dev,
            "Population statistics"
        );
    }
}

/// Runs a generational evolution.
///
/// The initial population holds the `seeds` that pass evaluation, topped up with graphs grown
/// from scratch. Every later generation produces `num_offspring` candidates by crossover,
/// mutation or construction, adds them and trims the population back to its configured size,
/// keeping the fittest. Candidates whose UID is already known are rejected.
#[instrument(skip_all, name = "evolution_workflow")]
pub fn run(
    space: &FragmentSpace,
    archive: &RingClosuresArchive,
    config: &GaConfig,
    evaluator: &dyn Evaluator,
    seeds: Vec<Graph>,
    reporter: &ProgressReporter,
) -> Result<EvolutionResult, EngineError> {
    let ids = IdGenerator::new();
    let population = Population::new();
    let mut monitors = Vec::with_capacity(config.generations + 1);

    // === Phase 1: Initial population ===
    reporter.report(Progress::PhaseStart {
        name: "Initial Population",
    });
    info!(
        seeds = seeds.len(),
        target = config.population_size,
        "Building initial population."
    );
    let monitor = Monitor::new("initial", 0);
    {
        let ctx = GaContext::new(space, archive, config, &ids, &monitor, reporter);
        for graph in seeds {
            if population.len() >= config.population_size {
                break;
            }
            if let Some(candidate) = build_candidate_manually(graph, 0, &ctx, evaluator)? {
                if population.contains_uid(candidate.uid()) {
                    monitor.increase(CounterId::DuplicatePreFitness);
                } else {
                    population.add(candidate);
                }
            }
        }
        let missing = config.population_size.saturating_sub(population.len());
        let round = Round {
            ctx,
            evaluator,
            population: &population,
            eligible: &[],
            generation: 0,
            construction_only: true,
        };
        for candidate in produce(&round, missing)? {
            population.add(candidate);
        }
    }
    if population.is_empty() {
        return Err(EngineError::Internal(
            "no candidate could be built for the initial population".into(),
        ));
    }
    log_stats(0, population.stats());
    monitors.push(monitor);
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Generations ===
    for generation in 1..=config.generations {
        reporter.report(Progress::PhaseStart { name: "Generation" });
        let monitor = Monitor::new(format!("generation-{generation}"), generation);
        let eligible = population.members();
        let round = Round {
            ctx: GaContext::new(space, archive, config, &ids, &monitor, reporter),
            evaluator,
            population: &population,
            eligible: &eligible,
            generation,
            construction_only: false,
        };
        let offspring = produce(&round, config.num_offspring)?;
        let added = offspring.len();
        for candidate in offspring {
            population.add(candidate);
        }
        population.trim(config.population_size);
        info!(generation, added, "Generation complete.");
        log_stats(generation, population.stats());
        monitors.push(monitor);
        reporter.report(Progress::PhaseFinish);
    }

    info!(
        size = population.len(),
        best = population.max_fitness(),
        "Evolution complete."
    );
    Ok(EvolutionResult {
        population,
        monitors,
    })
}
