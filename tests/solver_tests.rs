//! Tests for the evolutionary tour solver.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use road_tsp::config::{GaConfig, GaParams};
use road_tsp::distance::DistanceMatrix;
use road_tsp::error::Error;
use road_tsp::solver::GeneticAlgorithm;
use road_tsp::tour::Tour;

fn params(pop_size: usize, generations: usize) -> GaParams {
    GaParams {
        pop_size,
        generations,
        mutation_rate: 0.2,
        crossover_rate: 0.7,
    }
}

/// Points on a line at x = 0, 100, 200, ...; the best closed tour is 2 * span.
fn create_line_matrix(n: usize) -> DistanceMatrix {
    let rows = (0..n)
        .map(|i| (0..n).map(|j| (i as f64 - j as f64).abs() * 100.0).collect())
        .collect();
    DistanceMatrix::from_rows(rows).unwrap()
}

fn assert_permutation(route: &[usize], n: usize) {
    let tour = Tour::new(route.to_vec());
    assert_eq!(route.len(), n);
    assert!(tour.is_permutation(), "not a permutation: {:?}", route);
}

#[test]
fn test_three_stops_symmetric_500m() {
    let matrix = DistanceMatrix::from_rows(vec![
        vec![0.0, 500.0, 500.0],
        vec![500.0, 0.0, 500.0],
        vec![500.0, 500.0, 0.0],
    ])
    .unwrap();

    let mut ga = GeneticAlgorithm::new(GaConfig::default());
    let result = ga.optimize(&matrix, params(20, 10)).unwrap();

    assert_permutation(&result.route, 3);
    assert!((result.distance - 1500.0).abs() < 1e-9);
}

#[test]
fn test_finds_optimum_on_line() {
    let matrix = create_line_matrix(7);
    let mut ga = GeneticAlgorithm::new(GaConfig::default());
    let result = ga.optimize(&matrix, params(60, 80)).unwrap();

    assert_permutation(&result.route, 7);
    assert!((result.distance - 1200.0).abs() < 1e-9, "got {}", result.distance);
}

#[test]
fn test_reported_distance_matches_route() {
    let matrix = create_line_matrix(9);
    let mut ga = GeneticAlgorithm::new(GaConfig::default());
    let result = ga.optimize(&matrix, params(30, 20)).unwrap();

    ga.set_distance_matrix(matrix);
    assert_eq!(ga.evaluate(&result.route).unwrap(), result.distance);
}

#[test]
fn test_evaluate_invariant_under_rotation() {
    let mut ga = GeneticAlgorithm::new(GaConfig::default());
    ga.set_distance_matrix(create_line_matrix(6));

    let route = vec![4, 1, 5, 0, 3, 2];
    let expected = ga.evaluate(&route).unwrap();
    for shift in 1..route.len() {
        let mut rotated = route.clone();
        rotated.rotate_left(shift);
        assert_eq!(ga.evaluate(&rotated).unwrap(), expected);
    }
}

#[test]
fn test_evaluate_rejects_bad_input() {
    let mut ga = GeneticAlgorithm::new(GaConfig::default());
    assert!(matches!(ga.evaluate(&[0, 1]), Err(Error::Precondition(_))));

    ga.set_distance_matrix(create_line_matrix(3));
    assert!(matches!(ga.evaluate(&[0, 1, 3]), Err(Error::Precondition(_))));
}

#[test]
fn test_deterministic_runs_are_identical() {
    let matrix = create_line_matrix(10);
    let config = GaConfig::default().with_deterministic(true);

    let first = GeneticAlgorithm::new(config.clone())
        .optimize(&matrix, params(30, 25))
        .unwrap();
    let second = GeneticAlgorithm::new(config)
        .optimize(&matrix, params(30, 25))
        .unwrap();

    assert_eq!(first.route, second.route);
    assert_eq!(first.distance, second.distance);
    assert_eq!(first.history, second.history);
    assert_eq!(first.seed, Some(matrix.checksum_seed()));
}

#[test]
fn test_seed_derived_from_matrix_sum() {
    let matrix = DistanceMatrix::from_rows(vec![
        vec![0.0, 1.5, f64::INFINITY],
        vec![2.25, 0.0, 1.0],
        vec![3.0, 4.0, 0.0],
    ])
    .unwrap();

    // 11.75 m of finite entries scaled by 1000
    assert_eq!(matrix.checksum_seed(), 11_750);
}

#[test]
fn test_non_deterministic_run_has_no_seed() {
    let matrix = create_line_matrix(5);
    let config = GaConfig::default().with_deterministic(false);
    let result = GeneticAlgorithm::new(config)
        .optimize(&matrix, params(10, 5))
        .unwrap();

    assert_eq!(result.seed, None);
    assert_permutation(&result.route, 5);
}

#[test]
fn test_avoids_unreachable_leg_when_finite_tour_exists() {
    // The direct arc 0 -> 2 is missing; 0 -> 1 -> 2 -> 3 -> 0 is finite.
    let inf = f64::INFINITY;
    let matrix = DistanceMatrix::from_rows(vec![
        vec![0.0, 1.0, inf, inf],
        vec![inf, 0.0, 1.0, inf],
        vec![inf, inf, 0.0, 1.0],
        vec![1.0, inf, inf, 0.0],
    ])
    .unwrap();

    let mut ga = GeneticAlgorithm::new(GaConfig::default());
    let result = ga.optimize(&matrix, params(40, 40)).unwrap();

    assert!(result.distance.is_finite());
    assert_eq!(result.distance, 4.0);
}

#[test]
fn test_all_unreachable_reports_infinite_distance() {
    let inf = f64::INFINITY;
    let matrix = DistanceMatrix::from_rows(vec![vec![0.0, inf], vec![inf, 0.0]]).unwrap();

    let mut ga = GeneticAlgorithm::new(GaConfig::default());
    let result = ga.optimize(&matrix, params(4, 3)).unwrap();

    assert_permutation(&result.route, 2);
    assert!(result.distance.is_infinite());
}

#[test]
fn test_single_stop() {
    let matrix = DistanceMatrix::from_rows(vec![vec![0.0]]).unwrap();
    let mut ga = GeneticAlgorithm::new(GaConfig::default());
    let result = ga.optimize(&matrix, params(5, 5)).unwrap();

    assert_eq!(result.route, vec![0]);
    assert_eq!(result.distance, 0.0);
}

#[test]
fn test_zero_generations_returns_initial_best() {
    let matrix = create_line_matrix(5);
    let mut ga = GeneticAlgorithm::new(GaConfig::default());
    let result = ga.optimize(&matrix, params(10, 0)).unwrap();

    assert_eq!(result.generation, 0);
    assert!(result.history.is_empty());
    assert_eq!(result.evaluations, 10);
    assert_permutation(&result.route, 5);
    assert!(result.distance.is_finite());
}

#[test]
fn test_history_never_worsens() {
    let matrix = create_line_matrix(12);
    let mut ga = GeneticAlgorithm::new(GaConfig::default());
    let result = ga.optimize(&matrix, params(20, 30)).unwrap();

    assert_eq!(result.history.len(), 30);
    for pair in result.history.windows(2) {
        assert!(pair[1] <= pair[0]);
    }
    assert_eq!(result.history.last().copied(), Some(result.distance));
}

#[test]
fn test_invalid_parameters_rejected() {
    let matrix = create_line_matrix(4);
    let mut ga = GeneticAlgorithm::new(GaConfig::default());

    assert!(matches!(
        ga.optimize(&matrix, params(0, 5)),
        Err(Error::Precondition(_))
    ));

    let bad_rate = GaParams {
        mutation_rate: 1.5,
        ..params(5, 5)
    };
    assert!(matches!(
        ga.optimize(&matrix, bad_rate),
        Err(Error::Precondition(_))
    ));

    let empty = DistanceMatrix::from_rows(Vec::new()).unwrap();
    assert!(matches!(
        ga.optimize(&empty, params(5, 5)),
        Err(Error::Precondition(_))
    ));
}

#[test]
fn test_run_requires_matrix() {
    let mut ga = GeneticAlgorithm::new(GaConfig::default());
    assert!(matches!(ga.run(), Err(Error::Precondition(_))));

    ga.set_distance_matrix(create_line_matrix(4));
    let result = ga.run().unwrap();
    assert_permutation(&result.route, 4);
    // The matrix stays installed after the run
    assert!(ga.distance_matrix().is_some());
}

#[test]
fn test_run_uses_configured_params() {
    let config = GaConfig::default().with_pop_size(8).with_generations(3);
    let mut ga = GeneticAlgorithm::new(config);
    ga.set_distance_matrix(create_line_matrix(5));

    let result = ga.run().unwrap();
    assert_eq!(result.generation, 3);
    assert_eq!(result.history.len(), 3);
}

#[test]
fn test_optimize_with_explicit_rng() {
    let matrix = create_line_matrix(6);
    let mut ga = GeneticAlgorithm::new(GaConfig::default());

    let mut rng = ChaCha8Rng::seed_from_u64(123);
    let first = ga.optimize_with_rng(&matrix, params(15, 10), &mut rng).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(123);
    let second = ga.optimize_with_rng(&matrix, params(15, 10), &mut rng).unwrap();

    assert_eq!(first.route, second.route);
    assert_eq!(first.seed, None);
}

#[test]
fn test_non_square_matrix_rejected() {
    let result = DistanceMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0]]);
    assert!(matches!(result, Err(Error::Precondition(_))));

    let result = DistanceMatrix::from_rows(vec![vec![0.0, f64::NAN], vec![1.0, 0.0]]);
    assert!(matches!(result, Err(Error::Precondition(_))));
}

#[test]
fn test_matrix_with_nonzero_diagonal_rejected() {
    let result = DistanceMatrix::from_rows(vec![vec![1.0, 2.0], vec![2.0, 0.0]]);
    assert!(matches!(result, Err(Error::Precondition(_))));

    let result = DistanceMatrix::from_rows(vec![vec![0.0, 2.0], vec![2.0, f64::INFINITY]]);
    assert!(matches!(result, Err(Error::Precondition(_))));
}

#[test]
fn test_matrix_with_negative_distance_rejected() {
    let result = DistanceMatrix::from_rows(vec![vec![0.0, -1.0], vec![1.0, 0.0]]);
    assert!(matches!(result, Err(Error::Precondition(_))));

    // Unreachable pairs are still accepted
    let inf = f64::INFINITY;
    assert!(DistanceMatrix::from_rows(vec![vec![0.0, inf], vec![1.0, 0.0]]).is_ok());
}
