use crate::cli::EvolveArgs;
use crate::config::PartialEvolutionConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use fragforge::{
    core::library::{fragment_space::FragmentSpace, ring_closures::RingClosuresArchive},
    engine::{
        candidate::Candidate, evaluation::AdditiveEvaluator, monitor::Monitor,
        progress::ProgressReporter,
    },
    workflows,
};
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Serialize)]
struct CandidateRow<'a> {
    name: &'a str,
    uid: &'a str,
    fitness: Option<f64>,
    generation: usize,
    source: String,
    annotation: &'a str,
    representation: Option<&'a str>,
}

impl<'a> From<&'a Candidate> for CandidateRow<'a> {
    fn from(c: &'a Candidate) -> Self {
        Self {
            name: c.name(),
            uid: c.uid(),
            fitness: c.fitness(),
            generation: c.generation(),
            source: c.source().to_string(),
            annotation: c.graph().annotation(),
            representation: c.representation(),
        }
    }
}

/// Writes the population, fittest first, as a CSV table with a header row.
fn write_population(path: &Path, members: &[Arc<Candidate>]) -> Result<()> {
    let mut sorted: Vec<&Candidate> = members.iter().map(Arc::as_ref).collect();
    sorted.sort_by(|a, b| {
        b.fitness()
            .unwrap_or(f64::NEG_INFINITY)
            .total_cmp(&a.fitness().unwrap_or(f64::NEG_INFINITY))
    });

    let to_output_error = |source| CliError::Output {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(to_output_error)?;
    for candidate in sorted {
        writer
            .serialize(CandidateRow::from(candidate))
            .map_err(to_output_error)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes one summary row per monitor, preceded by a single header.
fn write_monitors(path: &Path, monitors: &[Monitor]) -> Result<()> {
    let mut file = File::create(path)?;
    for (i, monitor) in monitors.iter().enumerate() {
        monitor
            .write_report(&mut file, "SUMMARY", i == 0)
            .map_err(|source| CliError::Output {
                path: path.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}

pub fn run(args: EvolveArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialEvolutionConfig::from_file(path)?,
        None => PartialEvolutionConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;

    info!("Loading building-block library from {:?}", &config.library_path);
    let space = FragmentSpace::load(&config.library_path)?;
    let archive = match &config.ring_closures_path {
        Some(path) => {
            info!("Loading ring-closures archive from {:?}", path);
            RingClosuresArchive::load(path)?
        }
        None => RingClosuresArchive::default(),
    };
    let evaluator = AdditiveEvaluator::new(&space, config.size_penalty);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Starting evolution: {} candidates over {} generations...",
        config.core_config.population_size, config.core_config.generations
    );
    let result = workflows::evolve::run(
        &space,
        &archive,
        &config.core_config,
        &evaluator,
        Vec::new(),
        &reporter,
    )?;

    let members = result.population.members();
    info!(
        "Workflow finished with {} candidate(s). Writing results...",
        members.len()
    );
    write_population(&args.output, &members)?;
    if let Some(path) = &args.monitor {
        write_monitors(path, &result.monitors)?;
        println!("Event counters written to: {}", path.display());
    }

    match result.population.max_fitness() {
        Some(best) => println!(
            "✓ Population of {} written to: {} (best fitness: {:.4})",
            members.len(),
            args.output.display(),
            best
        ),
        None => {
            warn!("Evolution completed but no candidate was evaluated.");
            println!("Warning: no evaluated candidate was produced.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::commands::test_utils::write_library;
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    fn evolve_args(args: &[&str]) -> EvolveArgs {
        let mut argv = vec!["fragforge", "evolve"];
        argv.extend_from_slice(args);
        match Cli::parse_from(argv).command {
            Commands::Evolve(evolve_args) => evolve_args,
            _ => panic!("Expected 'evolve' subcommand"),
        }
    }

    #[test]
    fn run_writes_population_and_monitor_reports() {
        let dir = tempdir().unwrap();
        let library = write_library(dir.path());
        let output = dir.path().join("population.csv");
        let monitor = dir.path().join("monitor.txt");
        let args = evolve_args(&[
            "-l",
            library.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "-m",
            monitor.to_str().unwrap(),
            "-p",
            "4",
            "-g",
            "2",
            "-S",
            "population.offspring=3",
        ]);

        run(args).unwrap();

        let population = fs::read_to_string(&output).unwrap();
        let mut lines = population.lines();
        assert_eq!(
            lines.next(),
            Some("name,uid,fitness,generation,source,annotation,representation")
        );
        let rows: Vec<&str> = lines.collect();
        assert!(!rows.is_empty() && rows.len() <= 4);
        assert!(rows.iter().all(|row| row.starts_with('M')));

        let report = fs::read_to_string(&monitor).unwrap();
        let report_lines: Vec<&str> = report.lines().collect();
        assert_eq!(report_lines.len(), 4);
        assert!(report_lines[0].starts_with("RecordType MonitorName Generation"));
        assert!(report_lines[1].starts_with("SUMMARY initial 0"));
        assert!(report_lines[3].starts_with("SUMMARY generation-2 2"));
    }

    #[test]
    fn missing_library_file_is_reported() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("population.csv");
        let args = evolve_args(&["-o", output.to_str().unwrap()]);
        assert!(matches!(run(args), Err(CliError::Config(_))));
        assert!(!output.exists());
    }
}
