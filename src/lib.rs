//! # road_tsp
//!
//! Road-network aware tour optimization.
//!
//! Waypoints are snapped to a road graph and turned into a matrix of shortest-path
//! lengths. A genetic algorithm (tournament selection, ordered crossover, shuffle
//! mutation) searches for a short closed tour over that matrix, and the result is
//! rotated to start at the first waypoint. A hyperparameter tuner sweeps the solver's
//! settings over a grid and fits a gradient-boosted surrogate that recommends settings
//! without further solver runs.

pub mod config;
pub mod distance;
pub mod error;
pub mod genetic;
pub mod geo;
pub mod network;
pub mod optimizer;
pub mod population;
pub mod solver;
pub mod surrogate;
pub mod tour;
pub mod tuner;
pub mod utils;

pub use crate::config::{GaConfig, GaParams, MapConfig, OptimizationConfig, ParamGrid, SurrogateConfig};
pub use crate::distance::{DistanceMatrix, DistanceOracle, PathGeometries};
pub use crate::error::{Error, Result};
pub use crate::geo::Coordinate;
pub use crate::network::{GraphLoader, GraphProvider, RoadGraph, RoadNetwork};
pub use crate::optimizer::{OptimizationResult, OptimizeOptions, RouteOptimizer};
pub use crate::solver::{GaResult, GeneticAlgorithm};
pub use crate::surrogate::SurrogateModel;
pub use crate::tour::Tour;
pub use crate::tuner::{HyperparameterTuner, Recommendation};
