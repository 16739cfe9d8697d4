use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "FragForge CLI - Evolutionary design of graphs of building blocks connected through typed attachment points.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a generational evolution and write the final population.
    Evolve(EvolveArgs),
    /// Grow random candidates from scratch and print them.
    Build(BuildArgs),
    /// Summarize a building-block library.
    Library(LibraryArgs),
}

/// Arguments for the `evolve` subcommand.
#[derive(Args, Debug)]
pub struct EvolveArgs {
    // --- Core Arguments ---
    /// Path to the run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path for the CSV summary of the final population.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path for the space-separated report of the event counters, one row per generation.
    #[arg(short, long, value_name = "PATH")]
    pub monitor: Option<PathBuf>,

    // --- Library Overrides ---
    /// Override the building-block library file.
    #[arg(short, long, value_name = "PATH")]
    pub library: Option<PathBuf>,

    /// Override the archive of ring-closing chains.
    #[arg(long, value_name = "PATH")]
    pub ring_closures: Option<PathBuf>,

    // --- Run Overrides ---
    /// Override the number of candidates kept in the population.
    #[arg(short = 'p', long, value_name = "INT")]
    pub population_size: Option<usize>,

    /// Override the number of generations.
    #[arg(short = 'g', long, value_name = "INT")]
    pub generations: Option<usize>,

    /// Override the seed of the random number generators.
    #[arg(short = 's', long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the parent selection strategy (tournament, roulette-wheel, stochastic-universal, random).
    #[arg(long, value_name = "NAME")]
    pub selection: Option<String>,

    /// Enable ring closures, overriding the config file.
    #[arg(long)]
    pub rings: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S population.size=50
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `build` subcommand.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Path to the building-block library file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub library: PathBuf,

    /// Path to the archive of ring-closing chains.
    #[arg(long, value_name = "PATH")]
    pub ring_closures: Option<PathBuf>,

    /// Number of candidates to build.
    #[arg(short = 'n', long, default_value_t = 1, value_name = "INT")]
    pub count: usize,

    /// Seed of the random number generator.
    #[arg(short = 's', long, default_value_t = 0, value_name = "INT")]
    pub seed: u64,

    /// Maximum number of heavy atoms of a grown graph.
    #[arg(long, value_name = "INT")]
    pub max_heavy_atoms: Option<usize>,

    /// Close rings between ring-closing vertices.
    #[arg(long)]
    pub rings: bool,
}

/// Arguments for the `library` subcommand.
#[derive(Args, Debug)]
pub struct LibraryArgs {
    /// Path to the building-block library file.
    #[arg(required = true, value_name = "PATH")]
    pub library: PathBuf,

    /// Path to an archive of ring-closing chains to summarize as well.
    #[arg(long, value_name = "PATH")]
    pub ring_closures: Option<PathBuf>,
}
