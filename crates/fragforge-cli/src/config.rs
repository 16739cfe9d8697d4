mod defaults;
mod models;

pub use models::AppConfig;

use crate::cli::EvolveArgs;
use crate::error::{CliError, Result};
use defaults::DefaultsConfig;
use fragforge::core::models::vertex::MutationType;
use fragforge::engine::config as core_config;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialLibraryConfig {
    path: Option<PathBuf>,
    ring_closures: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialPopulationConfig {
    size: Option<usize>,
    offspring: Option<usize>,
    generations: Option<usize>,
    seed: Option<u64>,
    selection: Option<String>,
    max_tries_per_generation: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialSourcesConfig {
    crossover: Option<f64>,
    mutation: Option<f64>,
    construction: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialMutationConfig {
    multi_site_weights: Option<Vec<f64>>,
    excluded: Option<Vec<MutationType>>,
    max_attempts: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialCrossoverConfig {
    max_subgraph_size: Option<usize>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(deny_unknown_fields)]
struct PartialGrowthGate {
    scheme: core_config::GrowthScheme,
    lambda: Option<f64>,
    steepness: Option<f64>,
    middle: Option<f64>,
}

impl PartialGrowthGate {
    fn resolve(self, defaults: &DefaultsConfig) -> core_config::GrowthGate {
        core_config::GrowthGate::new(
            self.scheme,
            self.lambda.unwrap_or(defaults.gate_lambda),
            self.steepness.unwrap_or(defaults.gate_steepness),
            self.middle.unwrap_or(defaults.gate_middle),
        )
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialGrowthConfig {
    max_heavy_atoms: Option<usize>,
    symmetric_substitution_probability: Option<f64>,
    size_gate: Option<PartialGrowthGate>,
    level_gate: Option<PartialGrowthGate>,
    crowding_gate: Option<PartialGrowthGate>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialRingsConfig {
    enabled: Option<bool>,
    closable_chain_bias: Option<bool>,
    min_size: Option<usize>,
    max_size: Option<usize>,
    max_closures: Option<usize>,
    require_closure: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialEvaluationConfig {
    size_penalty: Option<f64>,
}

/// The run configuration as written in a TOML file; every section and key is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialEvolutionConfig {
    library: Option<PartialLibraryConfig>,
    population: Option<PartialPopulationConfig>,
    sources: Option<PartialSourcesConfig>,
    mutation: Option<PartialMutationConfig>,
    crossover: Option<PartialCrossoverConfig>,
    growth: Option<PartialGrowthConfig>,
    rings: Option<PartialRingsConfig>,
    evaluation: Option<PartialEvaluationConfig>,
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn existing_path(path: PathBuf) -> Result<PathBuf> {
    if !path.exists() {
        return Err(CliError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Provided path does not exist: {}", path.display()),
        )));
    }
    Ok(path)
}

impl PartialEvolutionConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn merge_with_cli(mut self, args: &EvolveArgs) -> Result<AppConfig> {
        self.apply_set_values(&args.set_values)?;
        let defaults = DefaultsConfig::default();

        let library = self.library.take().unwrap_or_default();
        let population = self.population.take().unwrap_or_default();
        let sources = self.sources.take().unwrap_or_default();
        let mutation = self.mutation.take().unwrap_or_default();
        let crossover = self.crossover.take().unwrap_or_default();
        let evaluation = self.evaluation.take().unwrap_or_default();

        let library_path = args
            .library
            .clone()
            .or(library.path)
            .ok_or_else(|| {
                CliError::Config(
                    "A value for 'library.path' is required either in the config file or via CLI argument."
                        .to_string(),
                )
            })
            .and_then(existing_path)?;
        let ring_closures_path = args
            .ring_closures
            .clone()
            .or(library.ring_closures)
            .map(existing_path)
            .transpose()?;

        let selection = match args.selection.as_ref().or(population.selection.as_ref()) {
            Some(name) => name
                .parse::<core_config::SelectionStrategy>()
                .map_err(|e| CliError::Config(e.to_string()))?,
            None => core_config::SelectionStrategy::default(),
        };

        let default_sources = core_config::SourceWeights::default();
        let source_weights = core_config::SourceWeights {
            crossover: sources.crossover.unwrap_or(default_sources.crossover),
            mutation: sources.mutation.unwrap_or(default_sources.mutation),
            construction: sources.construction.unwrap_or(default_sources.construction),
        };

        let mut builder = core_config::GaConfigBuilder::new()
            .population_size(
                args.population_size
                    .or(population.size)
                    .unwrap_or(defaults.population_size),
            )
            .num_offspring(population.offspring.unwrap_or(defaults.num_offspring))
            .generations(
                args.generations
                    .or(population.generations)
                    .unwrap_or(defaults.generations),
            )
            .seed(args.seed.or(population.seed).unwrap_or(defaults.seed))
            .selection(selection)
            .sources(source_weights)
            .excluded_mutations(mutation.excluded.unwrap_or_default())
            .growth(Self::merge_growth(self.growth.take(), &defaults))
            .rings(Self::merge_rings(self.rings.take(), args.rings));

        if let Some(weights) = mutation.multi_site_weights {
            builder = builder.multi_site_weights(weights);
        }
        if let Some(n) = mutation.max_attempts {
            builder = builder.max_genetic_op_attempts(n);
        }
        if let Some(n) = population.max_tries_per_generation {
            builder = builder.max_tries_per_generation(n);
        }
        if let Some(n) = crossover.max_subgraph_size {
            builder = builder.max_xover_subgraph_size(n);
        }

        let core_config = builder
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        Ok(AppConfig {
            library_path,
            ring_closures_path,
            size_penalty: evaluation.size_penalty.unwrap_or(defaults.size_penalty),
            core_config,
        })
    }

    fn merge_growth(
        partial: Option<PartialGrowthConfig>,
        defaults: &DefaultsConfig,
    ) -> core_config::GrowthConfig {
        let partial = partial.unwrap_or_default();
        let base = core_config::GrowthConfig::default();
        core_config::GrowthConfig {
            size_gate: partial
                .size_gate
                .map(|g| g.resolve(defaults))
                .or(base.size_gate),
            level_gate: partial
                .level_gate
                .map(|g| g.resolve(defaults))
                .or(base.level_gate),
            crowding_gate: partial
                .crowding_gate
                .map_or(base.crowding_gate, |g| g.resolve(defaults)),
            max_heavy_atoms: partial.max_heavy_atoms.unwrap_or(base.max_heavy_atoms),
            symmetric_substitution_probability: partial
                .symmetric_substitution_probability
                .unwrap_or(base.symmetric_substitution_probability),
        }
    }

    fn merge_rings(
        partial: Option<PartialRingsConfig>,
        cli_enable: bool,
    ) -> core_config::RingClosureConfig {
        let partial = partial.unwrap_or_default();
        let base = core_config::RingClosureConfig::default();
        core_config::RingClosureConfig {
            enabled: cli_enable || partial.enabled.unwrap_or(base.enabled),
            closable_chain_bias: partial
                .closable_chain_bias
                .unwrap_or(base.closable_chain_bias),
            min_ring_size: partial.min_size.unwrap_or(base.min_ring_size),
            max_ring_size: partial.max_size.unwrap_or(base.max_ring_size),
            max_closures: partial.max_closures.unwrap_or(base.max_closures),
            require_closure: partial.require_closure.unwrap_or(base.require_closure),
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "library.path" => {
                    self.library.get_or_insert_with(Default::default).path = Some(value.into());
                }
                "library.ring-closures" => {
                    self.library
                        .get_or_insert_with(Default::default)
                        .ring_closures = Some(value.into());
                }
                "population.size" => {
                    self.population.get_or_insert_with(Default::default).size =
                        Some(parse_value(key, value)?);
                }
                "population.offspring" => {
                    self.population.get_or_insert_with(Default::default).offspring =
                        Some(parse_value(key, value)?);
                }
                "population.generations" => {
                    self.population
                        .get_or_insert_with(Default::default)
                        .generations = Some(parse_value(key, value)?);
                }
                "population.seed" => {
                    self.population.get_or_insert_with(Default::default).seed =
                        Some(parse_value(key, value)?);
                }
                "population.selection" => {
                    self.population.get_or_insert_with(Default::default).selection =
                        Some(value.to_string());
                }
                "sources.crossover" => {
                    self.sources.get_or_insert_with(Default::default).crossover =
                        Some(parse_value(key, value)?);
                }
                "sources.mutation" => {
                    self.sources.get_or_insert_with(Default::default).mutation =
                        Some(parse_value(key, value)?);
                }
                "sources.construction" => {
                    self.sources.get_or_insert_with(Default::default).construction =
                        Some(parse_value(key, value)?);
                }
                "mutation.max-attempts" => {
                    self.mutation.get_or_insert_with(Default::default).max_attempts =
                        Some(parse_value(key, value)?);
                }
                "crossover.max-subgraph-size" => {
                    self.crossover
                        .get_or_insert_with(Default::default)
                        .max_subgraph_size = Some(parse_value(key, value)?);
                }
                "growth.max-heavy-atoms" => {
                    self.growth
                        .get_or_insert_with(Default::default)
                        .max_heavy_atoms = Some(parse_value(key, value)?);
                }
                "growth.symmetric-substitution-probability" => {
                    self.growth
                        .get_or_insert_with(Default::default)
                        .symmetric_substitution_probability = Some(parse_value(key, value)?);
                }
                "rings.enabled" => {
                    self.rings.get_or_insert_with(Default::default).enabled =
                        Some(parse_value(key, value)?);
                }
                "rings.min-size" => {
                    self.rings.get_or_insert_with(Default::default).min_size =
                        Some(parse_value(key, value)?);
                }
                "rings.max-size" => {
                    self.rings.get_or_insert_with(Default::default).max_size =
                        Some(parse_value(key, value)?);
                }
                "rings.max-closures" => {
                    self.rings.get_or_insert_with(Default::default).max_closures =
                        Some(parse_value(key, value)?);
                }
                "evaluation.size-penalty" => {
                    self.evaluation
                        .get_or_insert_with(Default::default)
                        .size_penalty = Some(parse_value(key, value)?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        dir: TempDir,
        library: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let library = dir.path().join("library.toml");
        fs::write(&library, "").unwrap();
        Fixture { dir, library }
    }

    fn write_config_file(fixture: &Fixture, name: &str, content: &str) -> PathBuf {
        let file_path = fixture.dir.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn library_section(fixture: &Fixture) -> String {
        format!(
            "[library]\npath = '{}'\n",
            fixture.library.to_str().unwrap()
        )
    }

    fn evolve_args(config_path: &Path, extra: &[&str]) -> EvolveArgs {
        let mut args = vec![
            "fragforge".to_string(),
            "evolve".to_string(),
            "-o".to_string(),
            "out.csv".to_string(),
            "-c".to_string(),
            config_path.to_str().unwrap().to_string(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        match Cli::parse_from(args).command {
            Commands::Evolve(evolve_args) => evolve_args,
            _ => panic!("Expected 'evolve' subcommand"),
        }
    }

    fn merge(config_path: &Path, extra: &[&str]) -> Result<AppConfig> {
        let args = evolve_args(config_path, extra);
        PartialEvolutionConfig::from_file(config_path)?.merge_with_cli(&args)
    }

    mod merging {
        use super::*;

        #[test]
        fn file_values_are_merged_with_defaults() {
            let fixture = fixture();
            let content = format!(
                "{}\n[population]\nsize = 8\n\n[mutation]\nexcluded = ['DELETE', 'extend']\n",
                library_section(&fixture)
            );
            let path = write_config_file(&fixture, "defaults.toml", &content);
            let config = merge(&path, &[]).unwrap();

            assert_eq!(config.library_path, fixture.library);
            assert!(config.ring_closures_path.is_none());
            assert_eq!(config.size_penalty, 0.0);
            let ga = &config.core_config;
            assert_eq!(ga.population_size, 8);
            assert_eq!(ga.num_offspring, 10);
            assert_eq!(ga.generations, 10);
            assert_eq!(ga.selection, core_config::SelectionStrategy::Tournament);
            assert_eq!(
                ga.excluded_mutations,
                vec![MutationType::Delete, MutationType::Extend]
            );
            assert_eq!(ga.growth, core_config::GrowthConfig::default());
            assert!(!ga.rings.enabled);
        }

        #[test]
        fn cli_args_override_file_values() {
            let fixture = fixture();
            let content = format!(
                "{}\n[population]\nsize = 5\nseed = 1\nselection = 'random'\n",
                library_section(&fixture)
            );
            let path = write_config_file(&fixture, "override.toml", &content);
            let config = merge(
                &path,
                &["-p", "12", "--seed", "99", "--selection", "sus", "--rings"],
            )
            .unwrap();

            let ga = &config.core_config;
            assert_eq!(ga.population_size, 12);
            assert_eq!(ga.seed, 99);
            assert_eq!(ga.selection, core_config::SelectionStrategy::StochasticUniversal);
            assert!(ga.rings.enabled);
        }

        #[test]
        fn set_values_override_file_and_defaults() {
            let fixture = fixture();
            let content = format!(
                "{}\n[population]\ngenerations = 3\n",
                library_section(&fixture)
            );
            let path = write_config_file(&fixture, "set.toml", &content);
            let config = merge(
                &path,
                &[
                    "-S",
                    "population.generations=7",
                    "-S",
                    "growth.max-heavy-atoms=40",
                    "-S",
                    "evaluation.size-penalty=0.1",
                ],
            )
            .unwrap();

            assert_eq!(config.core_config.generations, 7);
            assert_eq!(config.core_config.growth.max_heavy_atoms, 40);
            assert_eq!(config.size_penalty, 0.1);
        }

        #[test]
        fn growth_gates_fill_missing_parameters() {
            let fixture = fixture();
            let content = format!(
                "{}\n[growth.size-gate]\nscheme = 'sigma'\nsteepness = 2.0\nmiddle = 10.0\n",
                library_section(&fixture)
            );
            let path = write_config_file(&fixture, "gates.toml", &content);
            let config = merge(&path, &[]).unwrap();

            let gate = config.core_config.growth.size_gate.unwrap();
            assert_eq!(gate.scheme, core_config::GrowthScheme::Sigma);
            assert_eq!(gate.steepness, 2.0);
            assert_eq!(gate.middle, 10.0);
            assert_eq!(gate.lambda, 0.5);
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn missing_library_returns_config_error() {
            let fixture = fixture();
            let path = write_config_file(&fixture, "empty.toml", "[population]\nsize = 4\n");
            let result = merge(&path, &[]);
            assert!(matches!(&result, Err(CliError::Config(msg)) if msg.contains("library")));
        }

        #[test]
        fn nonexistent_library_returns_io_error() {
            let fixture = fixture();
            let path = write_config_file(&fixture, "ghost.toml", "[library]\npath = 'no/such/file.toml'\n");
            assert!(matches!(merge(&path, &[]), Err(CliError::Io(_))));
        }

        #[test]
        fn unknown_file_keys_are_rejected() {
            let fixture = fixture();
            let path = write_config_file(&fixture, "unknown.toml", "[population]\ncolour = 'red'\n");
            assert!(matches!(
                PartialEvolutionConfig::from_file(&path),
                Err(CliError::FileParsing { .. })
            ));
        }

        #[test]
        fn unsupported_set_key_is_rejected() {
            let fixture = fixture();
            let path = write_config_file(&fixture, "key.toml", &library_section(&fixture));
            let result = merge(&path, &["-S", "population.colour=red"]);
            assert!(matches!(&result, Err(CliError::Config(msg)) if msg.contains("population.colour")));
        }

        #[test]
        fn malformed_set_value_is_rejected() {
            let fixture = fixture();
            let path = write_config_file(&fixture, "value.toml", &library_section(&fixture));
            assert!(matches!(
                merge(&path, &["-S", "population.size=many"]),
                Err(CliError::Config(_))
            ));
            assert!(matches!(
                merge(&path, &["-S", "population.size"]),
                Err(CliError::Config(_))
            ));
        }

        #[test]
        fn invalid_core_values_surface_as_config_errors() {
            let fixture = fixture();
            let content = format!(
                "{}\n[rings]\nmin-size = 9\nmax-size = 3\n",
                library_section(&fixture)
            );
            let path = write_config_file(&fixture, "rings.toml", &content);
            assert!(matches!(merge(&path, &[]), Err(CliError::Config(_))));
        }
    }
}
