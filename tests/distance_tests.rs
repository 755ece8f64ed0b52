//! Tests for the road graph, the distance oracle and the graph loader.

use road_tsp::config::MapConfig;
use road_tsp::distance::DistanceOracle;
use road_tsp::error::Error;
use road_tsp::geo::Coordinate;
use road_tsp::network::{
    GraphLoader, NodeId, RoadGraph, RoadNetwork, RoadNetworkSnapshot, RoadSegment,
    SnapshotFileProvider, StaticGraphProvider,
};
use std::fs;
use std::path::PathBuf;

/// A fresh, empty scratch directory unique to one test.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("road_tsp_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// A 3x3 street grid with ~111 m spacing near Kendari; every street is two-way.
fn create_grid() -> (RoadGraph, Vec<NodeId>) {
    let mut graph = RoadGraph::new();
    let mut ids = Vec::new();
    for row in 0..3 {
        for col in 0..3 {
            ids.push(graph.add_intersection(Coordinate::new(
                -3.97 + row as f64 * 0.001,
                122.51 + col as f64 * 0.001,
            )));
        }
    }
    for row in 0..3 {
        for col in 0..3 {
            let here = ids[row * 3 + col];
            if col + 1 < 3 {
                graph.add_street(here, ids[row * 3 + col + 1]);
            }
            if row + 1 < 3 {
                graph.add_street(here, ids[(row + 1) * 3 + col]);
            }
        }
    }
    (graph, ids)
}

/// Two disconnected islands: a <-> b and c <-> d.
fn create_islands() -> (RoadGraph, Vec<NodeId>) {
    let mut graph = RoadGraph::new();
    let a = graph.add_intersection(Coordinate::new(0.0, 0.0));
    let b = graph.add_intersection(Coordinate::new(0.0, 0.01));
    let c = graph.add_intersection(Coordinate::new(1.0, 0.0));
    let d = graph.add_intersection(Coordinate::new(1.0, 0.01));
    graph.add_two_way_road(a, b, 1000.0);
    graph.add_two_way_road(c, d, 1000.0);
    (graph, vec![a, b, c, d])
}

#[test]
fn test_nearest_node() {
    let (graph, ids) = create_grid();
    let near_center = Coordinate::new(-3.9691, 122.5112);
    assert_eq!(graph.nearest_node(&near_center), Some(ids[4]));

    let empty = RoadGraph::new();
    assert_eq!(empty.nearest_node(&near_center), None);
}

#[test]
fn test_shortest_path_length_and_route() {
    let mut graph = RoadGraph::new();
    let a = graph.add_intersection(Coordinate::new(0.0, 0.0));
    let b = graph.add_intersection(Coordinate::new(0.0, 0.001));
    let c = graph.add_intersection(Coordinate::new(0.0, 0.002));
    graph.add_road(a, b, 100.0);
    graph.add_road(b, c, 100.0);
    graph.add_road(a, c, 500.0);

    assert_eq!(graph.shortest_path_length(a, c), 200.0);
    // One-way streets: no way back
    assert!(graph.shortest_path_length(c, a).is_infinite());

    let (length, path) = graph.shortest_path(a, c).unwrap();
    assert_eq!(length, 200.0);
    assert_eq!(path, vec![a, b, c]);
    assert!(graph.shortest_path(c, a).is_none());
}

#[test]
fn test_distance_matrix_diagonal_and_symmetry() {
    let (graph, ids) = create_grid();
    let oracle = DistanceOracle::new(&graph);
    let nodes = vec![ids[0], ids[4], ids[8]];
    let (matrix, paths) = oracle.distance_matrix(&nodes).unwrap();

    assert_eq!(matrix.size(), 3);
    for i in 0..3 {
        assert_eq!(matrix.get(i, i), 0.0);
        assert!(paths.get(i, i).is_empty());
        for j in 0..3 {
            assert!((matrix.get(i, j) - matrix.get(j, i)).abs() < 1e-6);
        }
    }

    // Corner to corner takes four grid edges of roughly 111 m
    let corner = matrix.get(0, 2);
    assert!(corner > 440.0 && corner < 450.0, "got {}", corner);

    let path = paths.get(0, 2);
    assert_eq!(path.len(), 5);
    assert_eq!(path.first(), graph.node_coordinate(ids[0]).as_ref());
    assert_eq!(path.last(), graph.node_coordinate(ids[8]).as_ref());
}

#[test]
fn test_matrix_matches_shortest_path_length() {
    let (graph, ids) = create_grid();
    let oracle = DistanceOracle::new(&graph);
    let (matrix, _) = oracle.distance_matrix(&ids).unwrap();

    for (i, &from) in ids.iter().enumerate() {
        for (j, &to) in ids.iter().enumerate() {
            let expected = if i == j { 0.0 } else { graph.shortest_path_length(from, to) };
            assert!((matrix.get(i, j) - expected).abs() < 1e-6);
        }
    }
}

#[test]
fn test_unreachable_pairs_are_infinite() {
    let (graph, ids) = create_islands();
    let oracle = DistanceOracle::new(&graph);
    let (matrix, paths) = oracle.distance_matrix(&ids).unwrap();

    assert_eq!(matrix.get(0, 1), 1000.0);
    assert!(matrix.get(0, 2).is_infinite());
    assert!(!matrix.is_reachable(1, 3));
    assert!(paths.get(0, 2).is_empty());
    assert_eq!(paths.get(0, 1).len(), 2);
}

#[test]
fn test_build_snaps_coordinates() {
    let (graph, ids) = create_grid();
    let oracle = DistanceOracle::new(&graph);
    let coords = vec![
        Coordinate::new(-3.97001, 122.51001),
        Coordinate::new(-3.96799, 122.51201),
    ];

    let (nodes, matrix, _) = oracle.build(&coords).unwrap();
    assert_eq!(nodes, vec![ids[0], ids[8]]);
    assert_eq!(matrix.size(), 2);
    assert!(matrix.get(0, 1) > 0.0);
}

#[test]
fn test_build_on_empty_network_fails() {
    let graph = RoadGraph::new();
    let oracle = DistanceOracle::new(&graph);
    let result = oracle.build(&[Coordinate::new(0.0, 0.0)]);
    assert!(matches!(result, Err(Error::Precondition(_))));
}

#[test]
fn test_sample_matrix() {
    let (graph, _) = create_grid();
    let oracle = DistanceOracle::new(&graph);

    let matrix = oracle.sample_matrix(4).unwrap();
    assert_eq!(matrix.size(), 4);

    // Asking for more nodes than exist takes all of them
    assert_eq!(oracle.sample_matrix(100).unwrap().size(), 9);

    assert!(matches!(
        oracle.sample_matrix(1),
        Err(Error::Precondition(_))
    ));
}

#[test]
fn test_path_legs_follow_tour() {
    let (graph, ids) = create_grid();
    let oracle = DistanceOracle::new(&graph);
    let (_, paths) = oracle.distance_matrix(&[ids[0], ids[2], ids[8]]).unwrap();

    let tour = [0, 2, 1];
    let legs: Vec<_> = paths.legs(&tour).collect();
    assert_eq!(legs.len(), 3);
    assert_eq!(legs[0], paths.get(0, 2));
    assert_eq!(legs[2], paths.get(1, 0));

    assert_eq!(paths.legs(&[0]).count(), 0);
}

#[test]
fn test_snapshot_round_trip() {
    let (graph, ids) = create_grid();
    let restored = RoadGraph::from_snapshot(&graph.to_snapshot()).unwrap();

    assert_eq!(restored.node_count(), graph.node_count());
    assert_eq!(restored.edge_count(), graph.edge_count());
    assert_eq!(
        restored.shortest_path_length(ids[0], ids[8]),
        graph.shortest_path_length(ids[0], ids[8])
    );
}

#[test]
fn test_snapshot_rejects_bad_segments() {
    let snapshot = RoadNetworkSnapshot {
        nodes: vec![Coordinate::new(0.0, 0.0)],
        edges: vec![RoadSegment {
            from: 0,
            to: 5,
            length: 10.0,
        }],
    };
    assert!(matches!(
        RoadGraph::from_snapshot(&snapshot),
        Err(Error::Provider(_))
    ));

    let snapshot = RoadNetworkSnapshot {
        nodes: vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)],
        edges: vec![RoadSegment {
            from: 0,
            to: 1,
            length: -1.0,
        }],
    };
    assert!(matches!(
        RoadGraph::from_snapshot(&snapshot),
        Err(Error::Provider(_))
    ));
}

#[test]
fn test_loader_fetches_and_writes_cache() {
    let dir = scratch_dir("fetch");
    let (graph, _) = create_grid();
    let map = MapConfig::default().with_cache_dir(&dir);

    let loader = GraphLoader::new(map.clone(), StaticGraphProvider::new(graph.clone()));
    assert!(!loader.is_loaded());
    assert!(loader.graph().is_none());

    let loaded = loader.load_graph().unwrap();
    assert_eq!(loaded.node_count(), 9);
    assert!(loader.is_loaded());
    assert!(map.graph_cache_file().exists());

    // The cached snapshot is preferred over the provider on the next load
    let from_cache = GraphLoader::new(map, StaticGraphProvider::new(RoadGraph::new()));
    assert_eq!(from_cache.load_graph().unwrap().node_count(), 9);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_loader_falls_back_on_corrupt_cache() {
    let dir = scratch_dir("corrupt");
    let map = MapConfig::default().with_cache_dir(&dir);
    fs::write(map.graph_cache_file(), "not json").unwrap();

    let (graph, _) = create_islands();
    let loader = GraphLoader::new(map.clone(), StaticGraphProvider::new(graph));
    let loaded = loader.load_graph().unwrap();
    assert_eq!(loaded.node_count(), 4);

    // The corrupt cache was replaced by a readable snapshot
    assert_eq!(RoadGraph::load(map.graph_cache_file()).unwrap().node_count(), 4);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_loader_without_cache() {
    let dir = scratch_dir("nocache");
    let map = MapConfig::default()
        .with_cache_dir(&dir)
        .with_use_cache(false);

    let (graph, _) = create_grid();
    let loader = GraphLoader::new(map.clone(), StaticGraphProvider::new(graph));
    loader.load_graph().unwrap();
    assert!(!map.graph_cache_file().exists());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_loader_loads_once() {
    let dir = scratch_dir("once");
    let (graph, _) = create_grid();
    let loader = GraphLoader::new(
        MapConfig::default().with_cache_dir(&dir).with_use_cache(false),
        StaticGraphProvider::new(graph),
    );

    let first = loader.load_graph().unwrap() as *const RoadGraph;
    let second = loader.load_graph().unwrap() as *const RoadGraph;
    assert_eq!(first, second);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_snapshot_file_provider() {
    let dir = scratch_dir("provider");
    let (graph, _) = create_grid();
    let snapshot_path = dir.join("kendari.json");
    graph.save(&snapshot_path).unwrap();

    let map = MapConfig::default()
        .with_cache_dir(dir.join("cache"))
        .with_use_cache(false);
    let loader = GraphLoader::new(map, SnapshotFileProvider::new(&snapshot_path));
    assert_eq!(loader.load_graph().unwrap().edge_count(), graph.edge_count());

    let missing = GraphLoader::new(
        MapConfig::default().with_use_cache(false),
        SnapshotFileProvider::new(dir.join("missing.json")),
    );
    assert!(matches!(missing.load_graph(), Err(Error::Io(_))));
    assert!(!missing.is_loaded());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_explicit_snapshot_wins_over_cache() {
    let dir = scratch_dir("explicit");
    let map = MapConfig::default().with_cache_dir(&dir);

    // A graph cached by an earlier run
    let (stale, _) = create_islands();
    stale.save(map.graph_cache_file()).unwrap();

    let (requested, _) = create_grid();
    let requested_path = dir.join("requested.json");
    requested.save(&requested_path).unwrap();

    let loader = GraphLoader::from_snapshot_file(map.clone(), &requested_path);
    assert!(!loader.config().use_cache);
    assert_eq!(loader.load_graph().unwrap().node_count(), requested.node_count());

    // The cache is left untouched
    assert_eq!(RoadGraph::load(map.graph_cache_file()).unwrap().node_count(), 4);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_with_graph_is_preloaded() {
    let (graph, _) = create_islands();
    let loader = GraphLoader::with_graph(MapConfig::default().with_use_cache(false), graph);
    assert!(loader.is_loaded());
    assert_eq!(loader.graph().unwrap().node_count(), 4);
}
