//! Road-network distance matrices and per-pair path geometries.

use crate::error::{Error, Result};
use crate::geo::Coordinate;
use crate::network::{NodeId, RoadNetwork};
use log::debug;
use serde::{Deserialize, Serialize};

/// Upper bound of the matrix-derived seed.
const SEED_MODULUS: u64 = 1 << 32;

/// Square matrix of shortest-path lengths in meters.
///
/// Entry `(i, j)` is `f64::INFINITY` when no directed path leads from `i` to `j`.
/// The matrix need not be symmetric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    rows: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    /// Build a matrix from its rows.
    ///
    /// Rows must form a square matrix with a zero diagonal and no negative or NaN
    /// entries; `f64::INFINITY` marks an unreachable pair.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        if let Some(row) = rows.iter().find(|row| row.len() != n) {
            return Err(Error::precondition(format!(
                "distance matrix must be square: {} rows but a row of length {}",
                n,
                row.len()
            )));
        }
        if rows.iter().flatten().any(|d| d.is_nan()) {
            return Err(Error::precondition("distance matrix contains NaN"));
        }
        if let Some(i) = (0..n).find(|&i| rows[i][i] != 0.0) {
            return Err(Error::precondition(format!(
                "distance matrix diagonal must be zero: entry ({}, {}) is {}",
                i, i, rows[i][i]
            )));
        }
        if rows.iter().flatten().any(|&d| d < 0.0) {
            return Err(Error::precondition("distance matrix contains a negative distance"));
        }
        Ok(DistanceMatrix { rows })
    }

    /// Number of waypoints.
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distance from `from` to `to`.
    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.rows[from][to]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Check whether a directed path exists between two waypoints.
    pub fn is_reachable(&self, from: usize, to: usize) -> bool {
        self.rows[from][to].is_finite()
    }

    /// Seed derived from the matrix content, so identical matrices seed identical runs.
    ///
    /// Sums the finite entries, scales to millimeters, and reduces modulo 2^32.
    pub fn checksum_seed(&self) -> u64 {
        let sum: f64 = self
            .rows
            .iter()
            .flatten()
            .filter(|d| d.is_finite())
            .sum();
        ((sum * 1000.0).abs() as u64) % SEED_MODULUS
    }
}

/// Geometry of the shortest path for every ordered pair of waypoints.
///
/// An empty geometry means the pair is unreachable (or `i == j`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathGeometries {
    size: usize,
    paths: Vec<Vec<Coordinate>>,
}

impl PathGeometries {
    /// Create empty geometries for `size` waypoints.
    pub fn new(size: usize) -> Self {
        PathGeometries {
            size,
            paths: vec![Vec::new(); size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The path from waypoint `from` to waypoint `to`.
    pub fn get(&self, from: usize, to: usize) -> &[Coordinate] {
        &self.paths[from * self.size + to]
    }

    fn set(&mut self, from: usize, to: usize, path: Vec<Coordinate>) {
        self.paths[from * self.size + to] = path;
    }

    /// Paths along consecutive legs of a closed tour.
    pub fn legs<'a>(&'a self, tour: &'a [usize]) -> impl Iterator<Item = &'a [Coordinate]> + 'a {
        let n = tour.len();
        let legs = if n > 1 { n } else { 0 };
        (0..legs).map(move |i| self.get(tour[i], tour[(i + 1) % n]))
    }
}

/// Builds distance matrices by querying a road network.
pub struct DistanceOracle<'a, N: RoadNetwork + ?Sized> {
    network: &'a N,
}

impl<'a, N: RoadNetwork + ?Sized> DistanceOracle<'a, N> {
    pub fn new(network: &'a N) -> Self {
        DistanceOracle { network }
    }

    /// Resolve each coordinate to its nearest network node.
    pub fn nearest_nodes(&self, coordinates: &[Coordinate]) -> Result<Vec<NodeId>> {
        coordinates
            .iter()
            .map(|c| {
                self.network
                    .nearest_node(c)
                    .ok_or_else(|| Error::precondition("road network has no nodes"))
            })
            .collect()
    }

    /// Compute shortest-path lengths and geometries for every ordered pair of nodes.
    ///
    /// Unreachable pairs get an infinite distance and an empty geometry.
    pub fn distance_matrix(&self, nodes: &[NodeId]) -> Result<(DistanceMatrix, PathGeometries)> {
        let n = nodes.len();
        let mut rows = vec![vec![0.0; n]; n];
        let mut paths = PathGeometries::new(n);

        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }

                match self.network.shortest_path(nodes[i], nodes[j]) {
                    Some((length, path)) => {
                        rows[i][j] = length;
                        let geometry = path
                            .into_iter()
                            .filter_map(|node| self.network.node_coordinate(node))
                            .collect();
                        paths.set(i, j, geometry);
                    }
                    None => {
                        debug!("No path between waypoints {} and {}", i, j);
                        rows[i][j] = f64::INFINITY;
                    }
                }
            }
        }

        Ok((DistanceMatrix::from_rows(rows)?, paths))
    }

    /// Resolve coordinates and build their matrix in one step.
    pub fn build(
        &self,
        coordinates: &[Coordinate],
    ) -> Result<(Vec<NodeId>, DistanceMatrix, PathGeometries)> {
        let nodes = self.nearest_nodes(coordinates)?;
        let (matrix, paths) = self.distance_matrix(&nodes)?;
        Ok((nodes, matrix, paths))
    }

    /// Distance matrix over the first `n_nodes` nodes of the network, used as a tuning benchmark.
    pub fn sample_matrix(&self, n_nodes: usize) -> Result<DistanceMatrix> {
        let nodes: Vec<NodeId> = self.network.node_ids().into_iter().take(n_nodes).collect();
        if nodes.len() < 2 {
            return Err(Error::precondition(format!(
                "need at least 2 network nodes to sample, found {}",
                nodes.len()
            )));
        }
        let (matrix, _) = self.distance_matrix(&nodes)?;
        Ok(matrix)
    }

    /// Geographic positions of the given nodes.
    pub fn node_coordinates(&self, nodes: &[NodeId]) -> Result<Vec<Coordinate>> {
        nodes
            .iter()
            .map(|&node| {
                self.network.node_coordinate(node).ok_or_else(|| {
                    Error::precondition(format!("node {} is not in the road network", node.index()))
                })
            })
            .collect()
    }
}
