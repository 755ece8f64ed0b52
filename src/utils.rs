//! Utility functions for reporting optimization runs.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::geo::Coordinate;
use crate::optimizer::OptimizationResult;
use crate::solver::GaResult;

/// Format a duration as hours, minutes, and seconds.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}h {:02}m {:02}s", hours, minutes, seconds)
}

/// Save an optimized route as a readable report.
pub fn save_route_report<P: AsRef<Path>>(
    result: &OptimizationResult,
    input: &[Coordinate],
    path: P,
) -> std::io::Result<()> {
    let mut file = File::create(path)?;

    writeln!(file, "Optimized route over {} stops", result.route_indices.len())?;
    writeln!(file, "Total Distance: {:.2} m", result.total_distance)?;
    writeln!(
        file,
        "Estimated Time: {:.1} min",
        result.estimated_time_minutes
    )?;
    if let Some(params) = result.params {
        writeln!(
            file,
            "Parameters: pop_size={}, generations={}, mutation_rate={:.3}, crossover_rate={:.3}",
            params.pop_size, params.generations, params.mutation_rate, params.crossover_rate
        )?;
    }
    writeln!(file)?;

    for waypoint in result.waypoints(input) {
        writeln!(
            file,
            "#{:<3} stop {:<3} ({:.6}, {:.6})",
            waypoint.waypoint_index, waypoint.trips_idx, waypoint.latitude, waypoint.longitude
        )?;
    }

    let legs: Vec<usize> = result
        .paths
        .legs(&result.route_indices)
        .map(|leg| leg.len())
        .collect();
    if !legs.is_empty() {
        writeln!(file)?;
        writeln!(file, "Path points per leg: {:?}", legs)?;
    }

    Ok(())
}

/// Statistics about a solver run.
pub struct SearchStatistics {
    pub generations: usize,
    pub evaluations: usize,
    pub runtime: Duration,
    pub best_distance: f64,
    pub first_generation_best: f64,
    pub seed: Option<u64>,
}

impl SearchStatistics {
    /// Summarize a finished run.
    pub fn from_result(result: &GaResult, runtime: Duration) -> Self {
        SearchStatistics {
            generations: result.generation,
            evaluations: result.evaluations,
            runtime,
            best_distance: result.distance,
            first_generation_best: result.history.first().copied().unwrap_or(result.distance),
            seed: result.seed,
        }
    }

    /// Relative improvement of the best distance over the first generation.
    pub fn improvement(&self) -> f64 {
        if self.first_generation_best.is_finite() && self.first_generation_best > 0.0 {
            (self.first_generation_best - self.best_distance) / self.first_generation_best
        } else {
            0.0
        }
    }

    /// Format the statistics as a string.
    pub fn format(&self) -> String {
        format!(
            "Search Statistics:
- Generations: {}
- Evaluations: {}
- Runtime: {}
- Best Distance: {:.2}
- Improvement over first generation: {:.1}%
- Seed: {}",
            self.generations,
            self.evaluations,
            format_duration(self.runtime),
            self.best_distance,
            self.improvement() * 100.0,
            self.seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "random".to_string())
        )
    }
}
