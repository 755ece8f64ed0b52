//! Genetic operators for the tour optimizer.

use crate::config::GaParams;
use crate::tour::Tour;
use rand::Rng;

/// The three operator slots of the generational loop.
///
/// Implementations must keep every tour a valid permutation.
pub trait GeneticOperators {
    /// Adjust operator settings to the hyperparameters of the coming run.
    fn prepare(&mut self, _params: &GaParams) {}

    /// Pick `count` parents from an evaluated population.
    fn select<R: Rng + ?Sized>(&self, population: &[Tour], count: usize, rng: &mut R)
        -> Vec<Tour>;

    /// Recombine two parents in place into two children.
    fn recombine<R: Rng + ?Sized>(&self, first: &mut Tour, second: &mut Tour, rng: &mut R);

    /// Perturb the visiting order of a tour in place.
    fn perturb<R: Rng + ?Sized>(&self, tour: &mut Tour, rng: &mut R);
}

/// Tournament selection, ordered crossover (OX) and shuffle-indexes mutation.
#[derive(Debug, Clone)]
pub struct Genetic {
    /// Contestants sampled (with replacement) per tournament
    pub tournament_size: usize,
    /// Per-position swap probability within a mutation
    pub indpb: f64,
    /// Fixed `indpb`; when `None` it follows the run's mutation rate
    pub indpb_override: Option<f64>,
}

impl Default for Genetic {
    fn default() -> Self {
        Genetic {
            tournament_size: 3,
            indpb: 0.2,
            indpb_override: None,
        }
    }
}

impl Genetic {
    pub fn new(tournament_size: usize, indpb_override: Option<f64>) -> Self {
        Genetic {
            tournament_size,
            indpb: indpb_override.unwrap_or(0.2),
            indpb_override,
        }
    }

    /// Run one tournament and return the index of the shortest contestant.
    pub fn tournament<R: Rng + ?Sized>(&self, population: &[Tour], rng: &mut R) -> usize {
        let mut best = rng.gen_range(0..population.len());
        for _ in 1..self.tournament_size.max(1) {
            let contestant = rng.gen_range(0..population.len());
            if population[contestant].fitness_or_inf() < population[best].fitness_or_inf() {
                best = contestant;
            }
        }
        best
    }

    /// Build one OX child: keep `segment_parent[start..=end]` in place and fill the
    /// remaining positions, starting after `end`, in the order they appear in `order_parent`.
    pub fn ordered_child(
        segment_parent: &[usize],
        order_parent: &[usize],
        start: usize,
        end: usize,
    ) -> Vec<usize> {
        let tour_size = segment_parent.len();
        let mut child = vec![0; tour_size];
        let mut used = vec![false; tour_size];

        for i in start..=end {
            child[i] = segment_parent[i];
            used[segment_parent[i]] = true;
        }

        let mut filled = end - start + 1;
        let mut j = (end + 1) % tour_size;
        let mut k = (end + 1) % tour_size;

        while filled < tour_size {
            let candidate = order_parent[k];
            if !used[candidate] {
                child[j] = candidate;
                used[candidate] = true;
                filled += 1;
                j = (j + 1) % tour_size;
            }
            k = (k + 1) % tour_size;
        }

        child
    }
}

impl GeneticOperators for Genetic {
    fn prepare(&mut self, params: &GaParams) {
        self.indpb = self.indpb_override.unwrap_or(params.mutation_rate);
    }

    fn select<R: Rng + ?Sized>(
        &self,
        population: &[Tour],
        count: usize,
        rng: &mut R,
    ) -> Vec<Tour> {
        if population.is_empty() {
            return Vec::new();
        }

        (0..count)
            .map(|_| population[self.tournament(population, rng)].clone())
            .collect()
    }

    fn recombine<R: Rng + ?Sized>(&self, first: &mut Tour, second: &mut Tour, rng: &mut R) {
        let tour_size = first.len();
        if tour_size < 2 || second.len() != tour_size {
            return;
        }

        // Two distinct cutting points
        let cut1 = rng.gen_range(0..tour_size);
        let mut cut2 = rng.gen_range(0..tour_size - 1);
        if cut2 >= cut1 {
            cut2 += 1;
        }
        let (start, end) = if cut1 < cut2 { (cut1, cut2) } else { (cut2, cut1) };

        let child1 = Self::ordered_child(&first.genome, &second.genome, start, end);
        let child2 = Self::ordered_child(&second.genome, &first.genome, start, end);

        first.genome = child1;
        second.genome = child2;
        first.invalidate();
        second.invalidate();
    }

    fn perturb<R: Rng + ?Sized>(&self, tour: &mut Tour, rng: &mut R) {
        let tour_size = tour.len();
        if tour_size < 2 {
            return;
        }

        // Each position is swapped with probability indpb with some other position
        let mut swapped = false;
        for i in 0..tour_size {
            if rng.gen::<f64>() < self.indpb {
                let mut j = rng.gen_range(0..tour_size - 1);
                if j >= i {
                    j += 1;
                }
                tour.genome.swap(i, j);
                swapped = true;
            }
        }
        if swapped {
            tour.invalidate();
        }
    }
}
