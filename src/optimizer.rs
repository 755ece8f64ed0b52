//! Route optimization from geographic coordinates.

use crate::config::{GaConfig, GaParams};
use crate::distance::{DistanceOracle, PathGeometries};
use crate::error::{Error, Result};
use crate::geo::Coordinate;
use crate::network::GraphLoader;
use crate::solver::GeneticAlgorithm;
use crate::tour::Tour;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Index of the start location in the caller's coordinate list.
pub const ANCHOR_INDEX: usize = 0;

/// Estimated driving time in minutes for a distance in meters.
pub fn estimate_travel_minutes(distance_m: f64, average_speed_kmh: f64) -> f64 {
    (distance_m / 1000.0) / average_speed_kmh * 60.0
}

/// Rotate a closed tour so that `anchor` is visited first.
///
/// Tours that do not contain `anchor` are returned unchanged.
pub fn rotate_to_anchor(route: Vec<usize>, anchor: usize) -> Vec<usize> {
    let mut tour = Tour::new(route);
    tour.rotate_to(anchor);
    tour.genome
}

/// Per-request options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OptimizeOptions {
    /// Use the installed tuned hyperparameters, if any
    pub use_tuned_params: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        OptimizeOptions {
            use_tuned_params: true,
        }
    }
}

/// A stop in optimized order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Position in the optimized sequence
    pub waypoint_index: usize,
    /// Index of the stop in the caller's input
    pub trips_idx: usize,
    pub latitude: f64,
    pub longitude: f64,
}

/// Result of optimizing a set of coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Input indices in visiting order, starting at the anchor
    pub route_indices: Vec<usize>,
    /// Snapped network positions in visiting order
    pub route_coordinates: Vec<Coordinate>,
    /// Total closed-tour length in meters
    pub total_distance: f64,
    pub estimated_time_minutes: f64,
    /// Road geometry for every ordered pair of inputs
    pub paths: PathGeometries,
    /// Hyperparameters the solver ran with, if it ran
    pub params: Option<GaParams>,
}

impl OptimizationResult {
    /// The caller's original coordinates in optimized order.
    pub fn waypoints(&self, input: &[Coordinate]) -> Vec<Waypoint> {
        self.route_indices
            .iter()
            .enumerate()
            .filter_map(|(waypoint_index, &trips_idx)| {
                input.get(trips_idx).map(|c| Waypoint {
                    waypoint_index,
                    trips_idx,
                    latitude: c.latitude,
                    longitude: c.longitude,
                })
            })
            .collect()
    }
}

/// Orchestrates distance matrix construction and the genetic algorithm.
pub struct RouteOptimizer {
    graph: Arc<GraphLoader>,
    ga: GeneticAlgorithm,
    average_speed_kmh: f64,
    tuned_params: Option<GaParams>,
}

impl RouteOptimizer {
    pub fn new(config: GaConfig, graph: Arc<GraphLoader>) -> Self {
        RouteOptimizer {
            graph,
            average_speed_kmh: config.average_speed_kmh,
            ga: GeneticAlgorithm::new(config),
            tuned_params: None,
        }
    }

    /// Install recommended hyperparameters for requests that ask for them.
    pub fn with_tuned_params(mut self, params: GaParams) -> Self {
        self.tuned_params = Some(params);
        self
    }

    pub fn tuned_params(&self) -> Option<GaParams> {
        self.tuned_params
    }

    pub fn graph_loader(&self) -> &Arc<GraphLoader> {
        &self.graph
    }

    /// Check if the road network is loaded.
    pub fn is_ready(&self) -> bool {
        self.graph.is_loaded()
    }

    /// Find a short closed tour through `coordinates`, starting at the first one.
    pub fn optimize(
        &mut self,
        coordinates: &[Coordinate],
        options: OptimizeOptions,
    ) -> Result<OptimizationResult> {
        if coordinates.is_empty() {
            return Err(Error::precondition("need at least 1 coordinate"));
        }
        for coordinate in coordinates {
            coordinate.validate()?;
        }

        info!("Optimizing route for {} coordinates", coordinates.len());

        if coordinates.len() == 1 {
            info!("Single coordinate provided, returning trivial route");
            return Ok(OptimizationResult {
                route_indices: vec![ANCHOR_INDEX],
                route_coordinates: coordinates.to_vec(),
                total_distance: 0.0,
                estimated_time_minutes: 0.0,
                paths: PathGeometries::new(1),
                params: None,
            });
        }

        let graph = self.graph.graph().ok_or(Error::UnconfiguredState)?;
        let oracle = DistanceOracle::new(graph);

        debug!("Calculating distance matrix");
        let (nodes, matrix, paths) = oracle.build(coordinates)?;

        let params = match (options.use_tuned_params, self.tuned_params) {
            (true, Some(tuned)) => tuned,
            _ => self.ga.config.params(),
        };

        debug!("Running genetic algorithm");
        let result = self.ga.optimize(&matrix, params)?;

        let route_indices = rotate_to_anchor(result.route, ANCHOR_INDEX);
        debug!("Rotated route to start with {}: {:?}", ANCHOR_INDEX, route_indices);

        let ordered_nodes: Vec<_> = route_indices.iter().map(|&i| nodes[i]).collect();
        let route_coordinates = oracle.node_coordinates(&ordered_nodes)?;

        let estimated_time_minutes =
            estimate_travel_minutes(result.distance, self.average_speed_kmh);

        info!(
            "Route optimized: distance={:.2}km, time={:.1}min, route={:?}",
            result.distance / 1000.0,
            estimated_time_minutes,
            route_indices
        );

        Ok(OptimizationResult {
            route_indices,
            route_coordinates,
            total_distance: result.distance,
            estimated_time_minutes,
            paths,
            params: Some(params),
        })
    }
}
