use crate::core::models::vertex::MutationType;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Shape of a growth-acceptance curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrowthScheme {
    ExpDiff,
    Tanh,
    Sigma,
    Unrestricted,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown growth scheme '{0}'")]
pub struct ParseGrowthSchemeError(pub String);

impl GrowthScheme {
    /// Maps the numeric scheme codes `0..=3` used in parameter files.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::ExpDiff),
            1 => Some(Self::Tanh),
            2 => Some(Self::Sigma),
            3 => Some(Self::Unrestricted),
            _ => None,
        }
    }
}

impl FromStr for GrowthScheme {
    type Err = ParseGrowthSchemeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        if let Ok(code) = normalized.parse::<u8>() {
            return Self::from_code(code).ok_or_else(|| ParseGrowthSchemeError(s.to_string()));
        }
        match normalized.as_str() {
            "exp-diff" => Ok(Self::ExpDiff),
            "tanh" => Ok(Self::Tanh),
            "sigma" => Ok(Self::Sigma),
            "unrestricted" => Ok(Self::Unrestricted),
            _ => Err(ParseGrowthSchemeError(s.to_string())),
        }
    }
}

impl fmt::Display for GrowthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::ExpDiff => "exp-diff",
                Self::Tanh => "tanh",
                Self::Sigma => "sigma",
                Self::Unrestricted => "unrestricted",
            }
        )
    }
}

/// One factor of the growth acceptance probability.
///
/// `lambda` drives the `ExpDiff` and `Tanh` shapes; `steepness` and `middle` drive `Sigma`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthGate {
    pub scheme: GrowthScheme,
    pub lambda: f64,
    pub steepness: f64,
    pub middle: f64,
}

impl GrowthGate {
    pub fn new(scheme: GrowthScheme, lambda: f64, steepness: f64, middle: f64) -> Self {
        Self {
            scheme,
            lambda,
            steepness,
            middle,
        }
    }

    pub fn unrestricted() -> Self {
        Self::new(GrowthScheme::Unrestricted, 0.5, 1.0, 2.5)
    }

    /// Probability of accepting growth when the gate's driver has value `x`.
    pub fn probability(&self, x: f64) -> f64 {
        match self.scheme {
            GrowthScheme::ExpDiff => {
                let f = (-x * self.lambda).exp();
                1.0 - (1.0 - f) / (1.0 + f)
            }
            GrowthScheme::Tanh => 1.0 - (self.lambda * x).tanh(),
            GrowthScheme::Sigma => {
                1.0 - 1.0 / (1.0 + (-self.steepness * (x - self.middle)).exp())
            }
            GrowthScheme::Unrestricted => 1.0,
        }
    }
}

/// Stochastic growth model used when graphs are extended.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthConfig {
    /// Gate driven by the heavy-atom count of the whole graph, if enabled.
    pub size_gate: Option<GrowthGate>,
    /// Gate driven by the tree level of the vertex being extended, if enabled.
    pub level_gate: Option<GrowthGate>,
    /// Gate driven by the crowdedness of the AP being extended.
    pub crowding_gate: GrowthGate,
    pub max_heavy_atoms: usize,
    pub symmetric_substitution_probability: f64,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            size_gate: None,
            level_gate: Some(GrowthGate::new(GrowthScheme::ExpDiff, 0.5, 1.0, 2.5)),
            crowding_gate: GrowthGate::unrestricted(),
            max_heavy_atoms: 100,
            symmetric_substitution_probability: 0.8,
        }
    }
}

impl GrowthConfig {
    pub fn size_probability(&self, heavy_atoms: usize) -> f64 {
        self.size_gate
            .map_or(1.0, |gate| gate.probability(heavy_atoms as f64))
    }

    pub fn level_probability(&self, level: i32) -> f64 {
        self.level_gate
            .map_or(1.0, |gate| gate.probability(f64::from(level)))
    }

    pub fn crowding_probability(&self, crowdedness: usize) -> f64 {
        self.crowding_gate.probability(crowdedness as f64)
    }
}

/// Ring closure settings.
///
/// Ring sizes count the vertices on the ring path, ring-closing vertices excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct RingClosureConfig {
    pub enabled: bool,
    /// Prefer fragments that continue a chain known to close a ring.
    pub closable_chain_bias: bool,
    pub min_ring_size: usize,
    pub max_ring_size: usize,
    pub max_closures: usize,
    /// Reject graphs with ring-closing vertices when none of them can close a ring.
    pub require_closure: bool,
}

impl Default for RingClosureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            closable_chain_bias: false,
            min_ring_size: 2,
            max_ring_size: 8,
            max_closures: 4,
            require_closure: false,
        }
    }
}

/// How parents are drawn from a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    #[default]
    Tournament,
    RouletteWheel,
    StochasticUniversal,
    Random,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown selection strategy '{0}'")]
pub struct ParseSelectionStrategyError(pub String);

impl FromStr for SelectionStrategy {
    type Err = ParseSelectionStrategyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "tournament" | "ts" => Ok(Self::Tournament),
            "roulette-wheel" | "rw" | "rws" => Ok(Self::RouletteWheel),
            "stochastic-universal" | "sus" => Ok(Self::StochasticUniversal),
            "random" => Ok(Self::Random),
            _ => Err(ParseSelectionStrategyError(s.to_string())),
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Tournament => "tournament",
                Self::RouletteWheel => "roulette-wheel",
                Self::StochasticUniversal => "stochastic-universal",
                Self::Random => "random",
            }
        )
    }
}

/// Relative weights of the ways a new candidate can be produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceWeights {
    pub crossover: f64,
    pub mutation: f64,
    pub construction: f64,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            crossover: 1.0,
            mutation: 1.0,
            construction: 1.0,
        }
    }
}

/// Parameters of an evolutionary run.
#[derive(Debug, Clone, PartialEq)]
pub struct GaConfig {
    pub population_size: usize,
    pub num_offspring: usize,
    pub generations: usize,
    pub seed: u64,
    pub selection: SelectionStrategy,
    pub sources: SourceWeights,
    /// `multi_site_weights[i]` is the weight of mutating `i + 1` sites at once.
    pub multi_site_weights: Vec<f64>,
    pub excluded_mutations: Vec<MutationType>,
    pub max_genetic_op_attempts: usize,
    /// Maximum number of failed attempts tolerated while filling one generation, as a multiple
    /// of the number of candidates requested.
    pub max_tries_per_generation: usize,
    pub max_xover_subgraph_size: usize,
    pub growth: GrowthConfig,
    pub rings: RingClosureConfig,
}

#[derive(Default)]
pub struct GaConfigBuilder {
    population_size: Option<usize>,
    num_offspring: Option<usize>,
    generations: Option<usize>,
    seed: Option<u64>,
    selection: Option<SelectionStrategy>,
    sources: Option<SourceWeights>,
    multi_site_weights: Option<Vec<f64>>,
    excluded_mutations: Option<Vec<MutationType>>,
    max_genetic_op_attempts: Option<usize>,
    max_tries_per_generation: Option<usize>,
    max_xover_subgraph_size: Option<usize>,
    growth: Option<GrowthConfig>,
    rings: Option<RingClosureConfig>,
}

impl GaConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn population_size(mut self, size: usize) -> Self {
        self.population_size = Some(size);
        self
    }
    pub fn num_offspring(mut self, n: usize) -> Self {
        self.num_offspring = Some(n);
        self
    }
    pub fn generations(mut self, n: usize) -> Self {
        self.generations = Some(n);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn selection(mut self, strategy: SelectionStrategy) -> Self {
        self.selection = Some(strategy);
        self
    }
    pub fn sources(mut self, weights: SourceWeights) -> Self {
        self.sources = Some(weights);
        self
    }
    pub fn multi_site_weights(mut self, weights: Vec<f64>) -> Self {
        self.multi_site_weights = Some(weights);
        self
    }
    pub fn excluded_mutations(mut self, excluded: Vec<MutationType>) -> Self {
        self.excluded_mutations = Some(excluded);
        self
    }
    pub fn max_genetic_op_attempts(mut self, n: usize) -> Self {
        self.max_genetic_op_attempts = Some(n);
        self
    }
    pub fn max_tries_per_generation(mut self, n: usize) -> Self {
        self.max_tries_per_generation = Some(n);
        self
    }
    pub fn max_xover_subgraph_size(mut self, n: usize) -> Self {
        self.max_xover_subgraph_size = Some(n);
        self
    }
    pub fn growth(mut self, growth: GrowthConfig) -> Self {
        self.growth = Some(growth);
        self
    }
    pub fn rings(mut self, rings: RingClosureConfig) -> Self {
        self.rings = Some(rings);
        self
    }

    pub fn build(self) -> Result<GaConfig, ConfigError> {
        let population_size = self
            .population_size
            .ok_or(ConfigError::MissingParameter("population_size"))?;
        if population_size == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "population_size",
                reason: "must be at least 1".into(),
            });
        }
        let sources = self.sources.unwrap_or_default();
        let source_values = [sources.crossover, sources.mutation, sources.construction];
        if source_values.iter().any(|w| *w < 0.0 || !w.is_finite())
            || source_values.iter().sum::<f64>() <= 0.0
        {
            return Err(ConfigError::InvalidParameter {
                name: "sources",
                reason: "weights must be finite, non-negative and not all zero".into(),
            });
        }
        let multi_site_weights = self.multi_site_weights.unwrap_or_else(|| vec![1.0]);
        if multi_site_weights.is_empty()
            || multi_site_weights.iter().any(|w| *w < 0.0 || !w.is_finite())
            || multi_site_weights.iter().sum::<f64>() <= 0.0
        {
            return Err(ConfigError::InvalidParameter {
                name: "multi_site_weights",
                reason: "weights must be finite, non-negative and not all zero".into(),
            });
        }
        let growth = self.growth.unwrap_or_default();
        if !(0.0..=1.0).contains(&growth.symmetric_substitution_probability) {
            return Err(ConfigError::InvalidParameter {
                name: "symmetric_substitution_probability",
                reason: format!(
                    "{} is not a probability",
                    growth.symmetric_substitution_probability
                ),
            });
        }
        let rings = self.rings.unwrap_or_default();
        if rings.min_ring_size > rings.max_ring_size {
            return Err(ConfigError::InvalidParameter {
                name: "min_ring_size",
                reason: format!(
                    "{} exceeds max_ring_size {}",
                    rings.min_ring_size, rings.max_ring_size
                ),
            });
        }

        Ok(GaConfig {
            population_size,
            num_offspring: self
                .num_offspring
                .ok_or(ConfigError::MissingParameter("num_offspring"))?,
            generations: self
                .generations
                .ok_or(ConfigError::MissingParameter("generations"))?,
            seed: self.seed.unwrap_or(0),
            selection: self.selection.unwrap_or_default(),
            sources,
            multi_site_weights,
            excluded_mutations: self.excluded_mutations.unwrap_or_default(),
            max_genetic_op_attempts: self.max_genetic_op_attempts.unwrap_or(100).max(1),
            max_tries_per_generation: self.max_tries_per_generation.unwrap_or(25).max(1),
            max_xover_subgraph_size: self.max_xover_subgraph_size.unwrap_or(100),
            growth,
            rings,
        })
    }
}
