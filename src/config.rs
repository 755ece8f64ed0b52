//! Configuration parameters for the road network, the genetic algorithm and the surrogate.

use crate::error::Result;
use itertools::iproduct;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for loading and caching the road network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Place name handed to the graph provider
    pub location: String,
    /// Kind of road network to request (e.g. "drive")
    pub network_type: String,
    /// Directory holding cached artifacts
    pub cache_dir: PathBuf,
    /// Read and write the road network snapshot under `cache_dir`
    pub use_cache: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            location: "Kendari, Indonesia".to_string(),
            network_type: "drive".to_string(),
            cache_dir: PathBuf::from("cache"),
            use_cache: true,
        }
    }
}

impl MapConfig {
    /// Set the place name.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Set the network type.
    pub fn with_network_type(mut self, network_type: impl Into<String>) -> Self {
        self.network_type = network_type.into();
        self
    }

    /// Set the cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Enable or disable the on-disk snapshot cache.
    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Path of the persisted road network snapshot.
    pub fn graph_cache_file(&self) -> PathBuf {
        self.cache_dir.join("graph.json")
    }
}

/// The four tunable genetic algorithm hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaParams {
    pub pop_size: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
}

impl GaParams {
    /// Feature vector in the column order used by the surrogate model.
    pub fn features(&self) -> [f64; 4] {
        [
            self.pop_size as f64,
            self.generations as f64,
            self.mutation_rate,
            self.crossover_rate,
        ]
    }
}

/// Names of the surrogate features, in [`GaParams::features`] order.
pub const FEATURE_NAMES: [&str; 4] = ["pop_size", "generations", "mutation_rate", "crossover_rate"];

/// A Cartesian grid over the four hyperparameter dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub pop_size: Vec<usize>,
    pub generations: Vec<usize>,
    pub mutation_rate: Vec<f64>,
    pub crossover_rate: Vec<f64>,
}

impl ParamGrid {
    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.pop_size.len()
            * self.generations.len()
            * self.mutation_rate.len()
            * self.crossover_rate.len()
    }

    /// Check if the grid has no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All grid points, varying the crossover rate fastest.
    pub fn combinations(&self) -> Vec<GaParams> {
        iproduct!(
            self.pop_size.iter(),
            self.generations.iter(),
            self.mutation_rate.iter(),
            self.crossover_rate.iter()
        )
        .map(
            |(&pop_size, &generations, &mutation_rate, &crossover_rate)| GaParams {
                pop_size,
                generations,
                mutation_rate,
                crossover_rate,
            },
        )
        .collect()
    }
}

/// Configuration settings for the genetic algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    /// Number of individuals per generation
    pub pop_size: usize,
    /// Number of generations to run
    pub generations: usize,
    /// Probability that an individual is mutated
    pub mutation_rate: f64,
    /// Probability that a pair of parents is recombined
    pub crossover_rate: f64,
    /// Per-position swap probability inside a mutation; `None` reuses `mutation_rate`
    pub shuffle_indpb: Option<f64>,
    /// Number of contestants per selection tournament
    pub tournament_size: usize,
    /// Number of best individuals archived across generations
    pub hall_of_fame_size: usize,
    /// Derive the random seed from the distance matrix
    pub deterministic: bool,
    /// Speed used to turn distance into travel time
    pub average_speed_kmh: f64,
    /// Coarse search space swept by the tuner
    pub search_space: ParamGrid,
    /// Fine grid queried against the surrogate
    pub recommendation_space: ParamGrid,
}

impl Default for GaConfig {
    fn default() -> Self {
        GaConfig {
            pop_size: 50,
            generations: 50,
            mutation_rate: 0.2,
            crossover_rate: 0.7,
            shuffle_indpb: None,
            tournament_size: 3,
            hall_of_fame_size: 1,
            deterministic: true,
            average_speed_kmh: 40.0,
            search_space: ParamGrid {
                pop_size: vec![50, 100, 150, 200],
                generations: vec![50, 100, 150, 200, 250],
                mutation_rate: vec![0.01, 0.06, 0.12, 0.17, 0.23, 0.28, 0.34, 0.39, 0.45, 0.50],
                crossover_rate: vec![0.50, 0.55, 0.60, 0.65, 0.70, 0.75, 0.80, 0.85, 0.90, 0.95],
            },
            recommendation_space: ParamGrid {
                pop_size: vec![50, 100, 150, 200, 250],
                generations: vec![50, 100, 150, 200, 250, 300],
                mutation_rate: vec![
                    0.01, 0.035, 0.06, 0.085, 0.11, 0.135, 0.16, 0.185, 0.21, 0.235, 0.26,
                    0.285, 0.31, 0.335, 0.36, 0.385, 0.41, 0.435, 0.46, 0.50,
                ],
                crossover_rate: vec![
                    0.50, 0.524, 0.547, 0.571, 0.595, 0.618, 0.642, 0.666, 0.689, 0.713, 0.737,
                    0.761, 0.784, 0.808, 0.832, 0.855, 0.879, 0.903, 0.926, 0.95,
                ],
            },
        }
    }
}

impl GaConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        GaConfig::default()
    }

    /// Set the population size.
    pub fn with_pop_size(mut self, size: usize) -> Self {
        self.pop_size = size;
        self
    }

    /// Set the number of generations.
    pub fn with_generations(mut self, generations: usize) -> Self {
        self.generations = generations;
        self
    }

    /// Set the per-individual mutation probability.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    /// Set the crossover probability.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    /// Set the per-position swap probability used inside a mutation.
    pub fn with_shuffle_indpb(mut self, indpb: f64) -> Self {
        self.shuffle_indpb = Some(indpb);
        self
    }

    /// Set the tournament size.
    pub fn with_tournament_size(mut self, size: usize) -> Self {
        self.tournament_size = size;
        self
    }

    /// Set the hall of fame size.
    pub fn with_hall_of_fame_size(mut self, size: usize) -> Self {
        self.hall_of_fame_size = size;
        self
    }

    /// Enable or disable matrix-derived seeding.
    pub fn with_deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    /// Set the average travel speed.
    pub fn with_average_speed_kmh(mut self, speed: f64) -> Self {
        self.average_speed_kmh = speed;
        self
    }

    /// Set the coarse search space.
    pub fn with_search_space(mut self, grid: ParamGrid) -> Self {
        self.search_space = grid;
        self
    }

    /// Set the fine recommendation space.
    pub fn with_recommendation_space(mut self, grid: ParamGrid) -> Self {
        self.recommendation_space = grid;
        self
    }

    /// Apply a set of hyperparameters.
    pub fn with_params(mut self, params: GaParams) -> Self {
        self.pop_size = params.pop_size;
        self.generations = params.generations;
        self.mutation_rate = params.mutation_rate;
        self.crossover_rate = params.crossover_rate;
        self
    }

    /// The currently configured hyperparameters.
    pub fn params(&self) -> GaParams {
        GaParams {
            pop_size: self.pop_size,
            generations: self.generations,
            mutation_rate: self.mutation_rate,
            crossover_rate: self.crossover_rate,
        }
    }
}

/// Configuration for the gradient-boosted surrogate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurrogateConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to each tree
    pub learning_rate: f64,
    /// Maximum depth of a tree
    pub max_depth: usize,
    /// L2 regularization on leaf weights
    pub lambda: f64,
    /// Minimum number of samples on each side of a split
    pub min_child_weight: f64,
    /// Fraction of samples held out for evaluation
    pub test_size: f64,
    /// Graph nodes used to build the tuning sample matrix
    pub training_n_nodes: usize,
    /// Where the fitted model is persisted
    pub model_cache_file: PathBuf,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        SurrogateConfig {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            lambda: 1.0,
            min_child_weight: 1.0,
            test_size: 0.2,
            training_n_nodes: 10,
            model_cache_file: PathBuf::from("cache").join("surrogate.json"),
        }
    }
}

impl SurrogateConfig {
    /// Set the number of boosting rounds.
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Set the learning rate.
    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    /// Set the maximum tree depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the held-out fraction.
    pub fn with_test_size(mut self, fraction: f64) -> Self {
        self.test_size = fraction;
        self
    }

    /// Set the number of graph nodes sampled for tuning.
    pub fn with_training_n_nodes(mut self, n: usize) -> Self {
        self.training_n_nodes = n;
        self
    }

    /// Set the model persistence path.
    pub fn with_model_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_cache_file = path.into();
        self
    }
}

/// Top-level configuration combining all sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    pub map: MapConfig,
    pub ga: GaConfig,
    pub surrogate: SurrogateConfig,
    /// Seed for the train/test partition
    pub random_state: u64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        OptimizationConfig {
            map: MapConfig::default(),
            ga: GaConfig::default(),
            surrogate: SurrogateConfig::default(),
            random_state: 42,
        }
    }
}

impl OptimizationConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        OptimizationConfig::default()
    }

    /// Load a configuration from a JSON file; missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Set the map section.
    pub fn with_map(mut self, map: MapConfig) -> Self {
        self.map = map;
        self
    }

    /// Set the genetic algorithm section.
    pub fn with_ga(mut self, ga: GaConfig) -> Self {
        self.ga = ga;
        self
    }

    /// Set the surrogate section.
    pub fn with_surrogate(mut self, surrogate: SurrogateConfig) -> Self {
        self.surrogate = surrogate;
        self
    }

    /// Set the partition seed.
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Copy recommended hyperparameters into the genetic algorithm section.
    pub fn with_optimal_params(mut self, params: GaParams) -> Self {
        self.ga = self.ga.with_params(params);
        self
    }
}
