//! The evolutionary tour solver.

use crate::config::{GaConfig, GaParams};
use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};
use crate::genetic::{Genetic, GeneticOperators};
use crate::population::{HallOfFame, Population};
use crate::tour::tour_length;
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Outcome of one solver run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaResult {
    /// Best tour found
    pub route: Vec<usize>,
    /// Its total cyclic length in meters
    pub distance: f64,
    /// Number of generations run
    pub generation: usize,
    /// Best archived fitness after each generation
    pub history: Vec<f64>,
    /// Number of fitness evaluations performed
    pub evaluations: usize,
    /// Seed used when running deterministically
    pub seed: Option<u64>,
}

/// Genetic algorithm over tours of a fixed distance matrix.
///
/// Each run starts from `pop_size` random permutations, then for a fixed number of
/// generations selects parents by tournament, recombines consecutive pairs, mutates,
/// re-evaluates changed tours, and replaces the population. The best tours seen are
/// kept in a hall of fame. Runs are seeded from the matrix content unless
/// [`GaConfig::deterministic`] is off.
pub struct GeneticAlgorithm<O: GeneticOperators = Genetic> {
    pub config: GaConfig,
    operators: O,
    matrix: Option<DistanceMatrix>,
}

impl GeneticAlgorithm<Genetic> {
    /// Create a solver using tournament selection, ordered crossover and shuffle mutation.
    pub fn new(config: GaConfig) -> Self {
        let operators = Genetic::new(config.tournament_size, config.shuffle_indpb);
        GeneticAlgorithm::with_operators(config, operators)
    }
}

impl<O: GeneticOperators> GeneticAlgorithm<O> {
    /// Create a solver with custom genetic operators.
    pub fn with_operators(config: GaConfig, operators: O) -> Self {
        GeneticAlgorithm {
            config,
            operators,
            matrix: None,
        }
    }

    pub fn operators(&self) -> &O {
        &self.operators
    }

    /// Set the matrix used by [`GeneticAlgorithm::run`] and [`GeneticAlgorithm::evaluate`].
    pub fn set_distance_matrix(&mut self, matrix: DistanceMatrix) {
        self.matrix = Some(matrix);
    }

    pub fn distance_matrix(&self) -> Option<&DistanceMatrix> {
        self.matrix.as_ref()
    }

    /// Total cyclic length of a tour over the configured matrix.
    pub fn evaluate(&self, tour: &[usize]) -> Result<f64> {
        let matrix = self
            .matrix
            .as_ref()
            .ok_or_else(|| Error::precondition("distance matrix not set"))?;
        if tour.iter().any(|&i| i >= matrix.size()) {
            return Err(Error::precondition("tour index outside the distance matrix"));
        }
        Ok(tour_length(tour, matrix))
    }

    /// Optimize over the configured matrix with the configured hyperparameters.
    pub fn run(&mut self) -> Result<GaResult> {
        let Some(matrix) = self.matrix.take() else {
            return Err(Error::precondition(
                "distance matrix not set, call set_distance_matrix first",
            ));
        };
        let params = self.config.params();
        let result = self.optimize(&matrix, params);
        self.matrix = Some(matrix);
        result
    }

    /// Optimize over `matrix` with explicit hyperparameters.
    pub fn optimize(&mut self, matrix: &DistanceMatrix, params: GaParams) -> Result<GaResult> {
        let seed = self.config.deterministic.then(|| matrix.checksum_seed());
        let mut rng = match seed {
            Some(seed) => {
                info!("Using deterministic seed: {}", seed);
                ChaCha8Rng::seed_from_u64(seed)
            }
            None => ChaCha8Rng::from_entropy(),
        };

        let mut result = self.optimize_with_rng(matrix, params, &mut rng)?;
        result.seed = seed;
        Ok(result)
    }

    /// Optimize with a caller-supplied random source.
    pub fn optimize_with_rng<R: Rng + ?Sized>(
        &mut self,
        matrix: &DistanceMatrix,
        params: GaParams,
        rng: &mut R,
    ) -> Result<GaResult> {
        Self::validate(matrix, &params)?;

        info!(
            "Starting GA: pop_size={}, generations={}, mutation_rate={:.3}, crossover_rate={:.3}",
            params.pop_size, params.generations, params.mutation_rate, params.crossover_rate
        );

        self.operators.prepare(&params);

        let mut population = Population::random(params.pop_size, matrix.size(), rng);
        let mut evaluations = population.evaluate_invalid(matrix);

        let mut hall_of_fame = HallOfFame::new(self.config.hall_of_fame_size);
        hall_of_fame.update(&population);

        let mut history = Vec::with_capacity(params.generations);

        for generation in 0..params.generations {
            // Selection
            let mut offspring = self
                .operators
                .select(&population.individuals, params.pop_size, rng);

            // Crossover on consecutive pairs
            for pair in offspring.chunks_exact_mut(2) {
                if rng.gen::<f64>() < params.crossover_rate {
                    let (first, second) = pair.split_at_mut(1);
                    self.operators.recombine(&mut first[0], &mut second[0], rng);
                }
            }

            // Mutation
            for child in offspring.iter_mut() {
                if rng.gen::<f64>() < params.mutation_rate {
                    self.operators.perturb(child, rng);
                }
            }

            population = Population::from_tours(offspring);
            evaluations += population.evaluate_invalid(matrix);
            hall_of_fame.update(&population);

            let best = hall_of_fame
                .best()
                .map(|t| t.fitness_or_inf())
                .unwrap_or(f64::INFINITY);
            history.push(best);

            if generation % 10 == 0 {
                debug!(
                    "Gen {}: best fitness = {:.2}, mean = {:.2}",
                    generation,
                    best,
                    population.mean_fitness().unwrap_or(f64::INFINITY)
                );
            }
        }

        let best = hall_of_fame
            .best()
            .ok_or_else(|| Error::precondition("population produced no evaluated tour"))?;
        let distance = best.fitness_or_inf();

        info!(
            "GA completed: best_distance={:.2}m in {} generations",
            distance, params.generations
        );

        Ok(GaResult {
            route: best.genome.clone(),
            distance,
            generation: params.generations,
            history,
            evaluations,
            seed: None,
        })
    }

    fn validate(matrix: &DistanceMatrix, params: &GaParams) -> Result<()> {
        if matrix.is_empty() {
            return Err(Error::precondition("distance matrix is empty"));
        }
        if params.pop_size == 0 {
            return Err(Error::precondition("pop_size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&params.mutation_rate) {
            return Err(Error::precondition(format!(
                "mutation_rate {} outside [0, 1]",
                params.mutation_rate
            )));
        }
        if !(0.0..=1.0).contains(&params.crossover_rate) {
            return Err(Error::precondition(format!(
                "crossover_rate {} outside [0, 1]",
                params.crossover_rate
            )));
        }
        Ok(())
    }
}
