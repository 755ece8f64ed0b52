//! Road network provider interface, a petgraph-backed road graph, and the
//! exactly-once graph loader.

use crate::config::MapConfig;
use crate::error::{Error, Result};
use crate::geo::Coordinate;
use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use petgraph::algo::{astar, dijkstra};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Opaque identifier of an intersection in a loaded road network.
pub type NodeId = NodeIndex;

/// Shortest-path queries the optimizer needs from a road network.
pub trait RoadNetwork {
    /// The node closest to `coordinate`, or `None` for an empty network.
    fn nearest_node(&self, coordinate: &Coordinate) -> Option<NodeId>;

    /// Geographic position of a node.
    fn node_coordinate(&self, node: NodeId) -> Option<Coordinate>;

    /// Length in meters of the shortest directed path, `f64::INFINITY` if none exists.
    fn shortest_path_length(&self, from: NodeId, to: NodeId) -> f64;

    /// Length and node sequence of the shortest directed path.
    fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<(f64, Vec<NodeId>)>;

    /// All nodes in a stable order.
    fn node_ids(&self) -> Vec<NodeId>;
}

/// A directed road segment in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    pub from: usize,
    pub to: usize,
    /// Physical length in meters
    pub length: f64,
}

/// Serializable form of a road network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadNetworkSnapshot {
    pub nodes: Vec<Coordinate>,
    pub edges: Vec<RoadSegment>,
}

/// A directed road graph whose nodes are intersections and whose edge weights
/// are segment lengths in meters.
#[derive(Debug, Clone, Default)]
pub struct RoadGraph {
    graph: DiGraph<Coordinate, f64>,
}

impl RoadGraph {
    /// Create an empty road graph.
    pub fn new() -> Self {
        RoadGraph {
            graph: DiGraph::new(),
        }
    }

    /// Add an intersection.
    pub fn add_intersection(&mut self, coordinate: Coordinate) -> NodeId {
        self.graph.add_node(coordinate)
    }

    /// Add a one-way segment with an explicit length.
    pub fn add_road(&mut self, from: NodeId, to: NodeId, length_m: f64) {
        self.graph.add_edge(from, to, length_m);
    }

    /// Add a segment in both directions with an explicit length.
    pub fn add_two_way_road(&mut self, a: NodeId, b: NodeId, length_m: f64) {
        self.add_road(a, b, length_m);
        self.add_road(b, a, length_m);
    }

    /// Add a two-way segment whose length is the great-circle distance between its ends.
    pub fn add_street(&mut self, a: NodeId, b: NodeId) {
        let length = self.graph[a].haversine_m(&self.graph[b]);
        self.add_two_way_road(a, b, length);
    }

    /// Number of intersections.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of directed segments.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Build a graph from its serialized form.
    pub fn from_snapshot(snapshot: &RoadNetworkSnapshot) -> Result<Self> {
        let mut graph = RoadGraph::new();
        let ids: Vec<NodeId> = snapshot
            .nodes
            .iter()
            .map(|&c| graph.add_intersection(c))
            .collect();

        for edge in &snapshot.edges {
            let (Some(&from), Some(&to)) = (ids.get(edge.from), ids.get(edge.to)) else {
                return Err(Error::Provider(format!(
                    "segment {} -> {} references an unknown node",
                    edge.from, edge.to
                )));
            };
            if !edge.length.is_finite() || edge.length < 0.0 {
                return Err(Error::Provider(format!(
                    "segment {} -> {} has invalid length {}",
                    edge.from, edge.to, edge.length
                )));
            }
            graph.add_road(from, to, edge.length);
        }

        Ok(graph)
    }

    /// Serialize the graph.
    pub fn to_snapshot(&self) -> RoadNetworkSnapshot {
        RoadNetworkSnapshot {
            nodes: self.graph.node_weights().copied().collect(),
            edges: self
                .graph
                .raw_edges()
                .iter()
                .map(|e| RoadSegment {
                    from: e.source().index(),
                    to: e.target().index(),
                    length: e.weight,
                })
                .collect(),
        }
    }

    /// Read a JSON snapshot from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let snapshot: RoadNetworkSnapshot = serde_json::from_str(&text)?;
        RoadGraph::from_snapshot(&snapshot)
    }

    /// Write a JSON snapshot to disk, creating parent directories as needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string(&self.to_snapshot())?;
        fs::write(path, text)?;
        Ok(())
    }
}

impl RoadNetwork for RoadGraph {
    fn nearest_node(&self, coordinate: &Coordinate) -> Option<NodeId> {
        self.graph.node_indices().min_by(|&a, &b| {
            let da = self.graph[a].haversine_m(coordinate);
            let db = self.graph[b].haversine_m(coordinate);
            da.total_cmp(&db)
        })
    }

    fn node_coordinate(&self, node: NodeId) -> Option<Coordinate> {
        self.graph.node_weight(node).copied()
    }

    fn shortest_path_length(&self, from: NodeId, to: NodeId) -> f64 {
        let lengths = dijkstra(&self.graph, from, Some(to), |e| *e.weight());
        lengths.get(&to).copied().unwrap_or(f64::INFINITY)
    }

    fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<(f64, Vec<NodeId>)> {
        astar(&self.graph, from, |n| n == to, |e| *e.weight(), |_| 0.0)
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.graph.node_indices().collect()
    }
}

/// Source of a fresh road network when no cached snapshot is usable.
pub trait GraphProvider: Send + Sync {
    fn fetch(&self, map: &MapConfig) -> Result<RoadGraph>;
}

/// Provides a graph read from a JSON snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotFileProvider {
    pub path: PathBuf,
}

impl SnapshotFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotFileProvider { path: path.into() }
    }
}

impl GraphProvider for SnapshotFileProvider {
    fn fetch(&self, map: &MapConfig) -> Result<RoadGraph> {
        debug!(
            "Reading {} network for {} from {}",
            map.network_type,
            map.location,
            self.path.display()
        );
        RoadGraph::load(&self.path)
    }
}

/// Provides a copy of a graph built in memory.
#[derive(Debug, Clone)]
pub struct StaticGraphProvider {
    graph: RoadGraph,
}

impl StaticGraphProvider {
    pub fn new(graph: RoadGraph) -> Self {
        StaticGraphProvider { graph }
    }
}

impl GraphProvider for StaticGraphProvider {
    fn fetch(&self, _map: &MapConfig) -> Result<RoadGraph> {
        Ok(self.graph.clone())
    }
}

/// Owns the road network for the lifetime of the process.
///
/// The graph is loaded at most once: concurrent callers of [`GraphLoader::load_graph`]
/// block until the single initialization finishes, after which reads need no locking.
/// Loading prefers the snapshot under [`MapConfig::graph_cache_file`] and falls back to
/// the provider, writing a fresh snapshot on success.
pub struct GraphLoader {
    config: MapConfig,
    provider: Box<dyn GraphProvider>,
    graph: OnceCell<RoadGraph>,
}

impl GraphLoader {
    pub fn new(config: MapConfig, provider: impl GraphProvider + 'static) -> Self {
        GraphLoader {
            config,
            provider: Box::new(provider),
            graph: OnceCell::new(),
        }
    }

    /// Create a loader that is already initialized with `graph`.
    pub fn with_graph(config: MapConfig, graph: RoadGraph) -> Self {
        let loader = GraphLoader::new(config, StaticGraphProvider::new(graph.clone()));
        // A fresh cell cannot already hold a value.
        let _ = loader.graph.set(graph);
        loader
    }

    /// Create a loader that reads an explicit snapshot file.
    ///
    /// The named file always wins: the on-disk graph cache is neither read nor written.
    pub fn from_snapshot_file(config: MapConfig, path: impl Into<PathBuf>) -> Self {
        GraphLoader::new(config.with_use_cache(false), SnapshotFileProvider::new(path))
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Load the graph on first call and return the shared instance afterwards.
    pub fn load_graph(&self) -> Result<&RoadGraph> {
        self.graph.get_or_try_init(|| self.load_uncached())
    }

    /// The graph if it has been loaded.
    pub fn graph(&self) -> Option<&RoadGraph> {
        self.graph.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.graph.get().is_some()
    }

    fn load_uncached(&self) -> Result<RoadGraph> {
        let cache_file = self.config.graph_cache_file();

        if self.config.use_cache {
            if cache_file.exists() {
                match Self::load_from_cache(&cache_file) {
                    Ok(graph) => {
                        info!(
                            "Loaded graph from cache: {} ({} nodes, {} edges)",
                            cache_file.display(),
                            graph.node_count(),
                            graph.edge_count()
                        );
                        return Ok(graph);
                    }
                    Err(e) => warn!("{}", e),
                }
            } else {
                debug!("No graph cache at {}", cache_file.display());
            }
        }

        info!("Fetching road network for {}...", self.config.location);
        let graph = self.provider.fetch(&self.config)?;

        if self.config.use_cache {
            match graph.save(&cache_file) {
                Ok(()) => info!("Graph cached to: {}", cache_file.display()),
                Err(e) => warn!("Could not save graph cache: {}", e),
            }
        }

        Ok(graph)
    }

    fn load_from_cache(path: &Path) -> Result<RoadGraph> {
        RoadGraph::load(path).map_err(|e| Error::CacheLoadFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
