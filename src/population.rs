//! Population management for the genetic algorithm.

use crate::distance::DistanceMatrix;
use crate::tour::Tour;
use rand::Rng;

/// The tours of one generation.
#[derive(Debug, Clone, Default)]
pub struct Population {
    pub individuals: Vec<Tour>,
}

impl Population {
    /// Create a population of `pop_size` random permutations of `0..n`.
    pub fn random<R: Rng + ?Sized>(pop_size: usize, n: usize, rng: &mut R) -> Self {
        Population {
            individuals: (0..pop_size).map(|_| Tour::random(n, rng)).collect(),
        }
    }

    pub fn from_tours(individuals: Vec<Tour>) -> Self {
        Population { individuals }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Evaluate every tour whose fitness is invalid; returns how many were evaluated.
    pub fn evaluate_invalid(&mut self, matrix: &DistanceMatrix) -> usize {
        let mut evaluated = 0;
        for tour in self.individuals.iter_mut().filter(|t| !t.has_valid_fitness()) {
            tour.evaluate(matrix);
            evaluated += 1;
        }
        evaluated
    }

    /// The shortest evaluated tour.
    pub fn best(&self) -> Option<&Tour> {
        self.individuals
            .iter()
            .filter(|t| t.has_valid_fitness())
            .min_by(|a, b| a.cmp_fitness(b))
    }

    /// Mean fitness over the finite evaluated tours.
    pub fn mean_fitness(&self) -> Option<f64> {
        let finite: Vec<f64> = self
            .individuals
            .iter()
            .filter_map(|t| t.fitness())
            .filter(|f| f.is_finite())
            .collect();

        if finite.is_empty() {
            None
        } else {
            Some(finite.iter().sum::<f64>() / finite.len() as f64)
        }
    }
}

/// Archive of the best distinct tours seen across all generations, shortest first.
#[derive(Debug, Clone)]
pub struct HallOfFame {
    capacity: usize,
    members: Vec<Tour>,
}

impl HallOfFame {
    pub fn new(capacity: usize) -> Self {
        HallOfFame {
            capacity: capacity.max(1),
            members: Vec::with_capacity(capacity.max(1)),
        }
    }

    /// Offer every evaluated tour of a population to the archive.
    pub fn update(&mut self, population: &Population) {
        for tour in population.individuals.iter().filter(|t| t.has_valid_fitness()) {
            self.offer(tour);
        }
    }

    /// Insert a tour if it beats the worst member and is not already archived.
    pub fn offer(&mut self, tour: &Tour) {
        if self.members.iter().any(|m| m.is_clone_of(tour)) {
            return;
        }

        let full = self.members.len() >= self.capacity;
        if full {
            match self.members.last() {
                Some(worst) if tour.fitness_or_inf() < worst.fitness_or_inf() => {
                    self.members.pop();
                }
                _ => return,
            }
        }

        // Keep earlier entries ahead of later ones on ties
        let position = self
            .members
            .partition_point(|m| m.fitness_or_inf() <= tour.fitness_or_inf());
        self.members.insert(position, tour.clone());
    }

    pub fn best(&self) -> Option<&Tour> {
        self.members.first()
    }

    pub fn members(&self) -> &[Tour] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
