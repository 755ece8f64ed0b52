//! Tour representation for the genetic algorithm population.

use crate::distance::DistanceMatrix;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Total length of a closed tour, including the edge from the last index back to the first.
pub fn tour_length(genome: &[usize], matrix: &DistanceMatrix) -> f64 {
    let n = genome.len();
    if n == 0 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n - 1 {
        total += matrix.get(genome[i], genome[i + 1]);
    }
    total + matrix.get(genome[n - 1], genome[0])
}

/// A visiting order over all waypoints, interpreted as a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    /// Permutation of waypoint indices
    pub genome: Vec<usize>,
    /// Cached total length; `None` once the genome changes
    fitness: Option<f64>,
}

impl Tour {
    /// Create a tour from an index sequence; its fitness starts invalid.
    pub fn new(genome: Vec<usize>) -> Self {
        Tour {
            genome,
            fitness: None,
        }
    }

    /// A uniformly random permutation of `0..n`.
    pub fn random<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Self {
        let mut genome: Vec<usize> = (0..n).collect();
        genome.shuffle(rng);
        Tour::new(genome)
    }

    pub fn len(&self) -> usize {
        self.genome.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genome.is_empty()
    }

    /// The cached fitness, if the genome has not changed since the last evaluation.
    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    /// Cached fitness, treating an unevaluated tour as infinitely long.
    pub fn fitness_or_inf(&self) -> f64 {
        self.fitness.unwrap_or(f64::INFINITY)
    }

    pub fn has_valid_fitness(&self) -> bool {
        self.fitness.is_some()
    }

    /// Mark the genome as changed.
    pub fn invalidate(&mut self) {
        self.fitness = None;
    }

    /// Compute and cache the fitness if it is not already valid.
    pub fn evaluate(&mut self, matrix: &DistanceMatrix) -> f64 {
        match self.fitness {
            Some(fitness) => fitness,
            None => {
                let fitness = tour_length(&self.genome, matrix);
                self.fitness = Some(fitness);
                fitness
            }
        }
    }

    /// Check that the genome visits every index in `0..len` exactly once.
    pub fn is_permutation(&self) -> bool {
        let n = self.genome.len();
        let mut seen = vec![false; n];
        for &index in &self.genome {
            if index >= n || seen[index] {
                return false;
            }
            seen[index] = true;
        }
        true
    }

    /// Cyclically shift the genome so that `anchor` comes first.
    ///
    /// Returns `false`, leaving the tour untouched, if `anchor` is not in the tour.
    /// The cached fitness survives since rotation preserves the cycle.
    pub fn rotate_to(&mut self, anchor: usize) -> bool {
        match self.genome.iter().position(|&i| i == anchor) {
            Some(position) => {
                self.genome.rotate_left(position);
                true
            }
            None => false,
        }
    }

    /// Check if this tour visits the same indices in the same order as another.
    pub fn is_clone_of(&self, other: &Tour) -> bool {
        self.genome == other.genome
    }

    /// Order two evaluated tours by fitness, shorter first.
    pub fn cmp_fitness(&self, other: &Tour) -> Ordering {
        self.fitness_or_inf().total_cmp(&other.fitness_or_inf())
    }
}
