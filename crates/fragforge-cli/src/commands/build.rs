use crate::cli::BuildArgs;
use crate::error::{CliError, Result};
use fragforge::{
    core::{
        library::{fragment_space::FragmentSpace, ring_closures::RingClosuresArchive},
        models::ids::IdGenerator,
    },
    engine::{
        candidate::Candidate,
        config::{GaConfigBuilder, GrowthConfig, RingClosureConfig},
        context::GaContext,
        evaluation::AdditiveEvaluator,
        monitor::{CounterId, Monitor},
        progress::ProgressReporter,
    },
    workflows::generate::build_candidate_from_scratch,
};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::io::Write;
use tracing::{debug, info, warn};

/// Grows up to `count` distinct candidates, giving up after `count * max_tries_per_generation`
/// attempts.
fn build_candidates<R: Rng>(
    ctx: &GaContext,
    evaluator: &AdditiveEvaluator,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Candidate>> {
    let max_attempts = count * ctx.config.max_tries_per_generation;
    let mut seen = HashSet::new();
    let mut built = Vec::with_capacity(count);
    let mut attempts = 0;
    while built.len() < count && attempts < max_attempts {
        attempts += 1;
        let Some(candidate) = build_candidate_from_scratch(0, ctx, evaluator, rng)? else {
            continue;
        };
        if !seen.insert(candidate.uid().to_string()) {
            ctx.monitor.increase(CounterId::DuplicatePreFitness);
            debug!(uid = candidate.uid(), "Discarding duplicate candidate.");
            continue;
        }
        built.push(candidate);
    }
    if built.len() < count {
        warn!(
            requested = count,
            built = built.len(),
            attempts,
            "Gave up on some candidates after too many failed attempts"
        );
    }
    Ok(built)
}

fn print_candidates<W: Write>(mut writer: W, candidates: &[Candidate]) -> std::io::Result<()> {
    for candidate in candidates {
        writeln!(
            writer,
            "{}\t{:.4}\t{}\t{}",
            candidate.name(),
            candidate.fitness().unwrap_or(0.0),
            candidate.graph().heavy_atom_count(),
            candidate.graph()
        )?;
    }
    writer.flush()
}

pub fn run(args: BuildArgs) -> Result<()> {
    info!("Loading building-block library from {:?}", &args.library);
    let space = FragmentSpace::load(&args.library)?;
    let archive = match &args.ring_closures {
        Some(path) => RingClosuresArchive::load(path)?,
        None => RingClosuresArchive::default(),
    };

    let mut growth = GrowthConfig::default();
    if let Some(max) = args.max_heavy_atoms {
        growth.max_heavy_atoms = max;
    }
    let config = GaConfigBuilder::new()
        .population_size(args.count.max(1))
        .num_offspring(0)
        .generations(0)
        .seed(args.seed)
        .growth(growth)
        .rings(RingClosureConfig {
            enabled: args.rings,
            ..Default::default()
        })
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let ids = IdGenerator::new();
    let monitor = Monitor::new("build", 0);
    let reporter = ProgressReporter::new();
    let ctx = GaContext::new(&space, &archive, &config, &ids, &monitor, &reporter);
    let evaluator = AdditiveEvaluator::new(&space, 0.0);
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

    let candidates = build_candidates(&ctx, &evaluator, args.count, &mut rng)?;
    info!(
        built = candidates.len(),
        attempts = monitor.get(CounterId::BuildAnewAttempts),
        "Construction finished."
    );
    print_candidates(std::io::stdout().lock(), &candidates)?;
    Ok(())
}
