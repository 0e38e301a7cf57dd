//! End-to-end solver tests.

mod helpers;

use helpers::{dense_solve, random_diag_dominant, random_vector, relative_error, residual_norm};
use neusolve::config::SolverConfig;
use neusolve::types::{CsrMatrix, Matrix};
use neusolve::{ExecutionStrategy, SolverError, SolverSession};

fn dominant_3x3() -> Matrix {
    Matrix::Csr(CsrMatrix::from_triples(
        3,
        3,
        vec![
            (0, 0, 4.0),
            (0, 1, 1.0),
            (1, 0, 1.0),
            (1, 1, 4.0),
            (1, 2, 1.0),
            (2, 1, 1.0),
            (2, 2, 4.0),
        ],
    ))
}

/// The canonical 3x3 system: converges quickly to the exact solution
/// [5/28, 2/7, 19/28] with the default (vectorized) strategy.
#[test]
fn canonical_3x3_scenario() {
    let session = SolverSession::new();
    let matrix = dominant_3x3();
    let rhs = vec![1.0, 2.0, 3.0];

    let result = session.solve(&matrix, &rhs, &SolverConfig::default()).unwrap();

    assert!(result.converged);
    assert!(result.iterations < 30, "took {} iterations", result.iterations);
    assert_eq!(result.strategy, ExecutionStrategy::Vectorized);
    assert!(result.residual_norm < 1e-6);

    let exact = [5.0 / 28.0, 2.0 / 7.0, 19.0 / 28.0];
    for i in 0..3 {
        assert!(
            (result.solution[i] - exact[i]).abs() < 1e-6,
            "x[{i}] = {} (expected {})",
            result.solution[i],
            exact[i],
        );
    }
}

/// Diagonally dominant systems converge within a reasonable iteration bound
/// and satisfy the residual tolerance.
#[test]
fn random_dominant_systems_converge() {
    let session = SolverSession::new();
    for seed in [3u64, 17, 99] {
        let n = 60;
        let matrix = random_diag_dominant(n, 0.1, seed);
        let rhs = random_vector(n, seed + 1);

        let result = session.solve(&matrix, &rhs, &SolverConfig::default()).unwrap();
        assert!(result.converged, "seed {seed}");
        assert!(result.iterations <= 100, "seed {seed}: {}", result.iterations);
        assert!(residual_norm(&matrix, &result.solution, &rhs) < 2e-6, "seed {seed}");

        let exact = dense_solve(&matrix, &rhs);
        assert!(
            relative_error(&result.solution, &exact) < 1e-5,
            "seed {seed}"
        );
    }
}

/// A zero diagonal entry fails before any iteration.
#[test]
fn zero_diagonal_fails_fast() {
    let session = SolverSession::new();
    let matrix = Matrix::Csr(CsrMatrix::from_triples(
        2,
        2,
        vec![(0, 0, 1.0), (0, 1, 3.0), (1, 0, 3.0)],
    ));
    let err = session
        .solve(&matrix, &[1.0, 1.0], &SolverConfig::default())
        .unwrap_err();
    match err {
        SolverError::SingularDiagonal { row, value } => {
            assert_eq!(row, 1);
            assert_eq!(value, 0.0);
        }
        other => panic!("expected SingularDiagonal, got {other:?}"),
    }
}

/// Non-convergence is a soft failure: the result comes back with
/// `converged == false` and a finite diagnostic.
#[test]
fn non_convergence_is_reported_not_thrown() {
    let session = SolverSession::new();
    let matrix = Matrix::Csr(CsrMatrix::from_triples(
        2,
        2,
        vec![(0, 0, 1.0), (0, 1, 5.0), (1, 0, 5.0), (1, 1, 1.0)],
    ));
    let result = session
        .solve(&matrix, &[1.0, 1.0], &SolverConfig::default())
        .unwrap();
    assert!(!result.converged);
    assert!(!result.recommendations.is_empty());
}

/// Exhausting the iteration budget still returns the partial solution.
#[test]
fn iteration_budget_exhaustion() {
    let session = SolverSession::new();
    let matrix = random_diag_dominant(40, 0.1, 5);
    let rhs = random_vector(40, 6);
    let config = SolverConfig {
        epsilon: 1e-14,
        max_iterations: 2,
        ..Default::default()
    };
    let result = session.solve(&matrix, &rhs, &config).unwrap();
    assert!(!result.converged);
    assert_eq!(result.iterations, 2);
    assert_eq!(result.solution.len(), 40);
    assert!(result.residual_norm.is_finite());
    assert!(result
        .recommendations
        .iter()
        .any(|r| r.contains("max_iterations")));
}

/// All four execution strategies produce the same solution.
#[test]
fn strategies_agree_on_solution() {
    let n = 80;
    let matrix = random_diag_dominant(n, 0.08, 13);
    let rhs = random_vector(n, 14);
    let session = SolverSession::new();

    let reference = session
        .solve(&matrix, &rhs, &SolverConfig::default())
        .unwrap();
    assert!(reference.converged);

    // Blocked: force a small streaming threshold so the working set trips it.
    let mut blocked_config = SolverConfig::default();
    blocked_config.memory.streaming_threshold = 1;
    let blocked = session.solve(&matrix, &rhs, &blocked_config).unwrap();
    assert_eq!(blocked.strategy, ExecutionStrategy::Blocked);

    // Parallel: lower the row threshold below n.
    let mut parallel_config = SolverConfig::default();
    parallel_config.adaptive.parallel_row_threshold = 10;
    let parallel = session.solve(&matrix, &rhs, &parallel_config).unwrap();
    assert_eq!(parallel.strategy, ExecutionStrategy::Parallel);

    // Streaming: hand the session an already-chunked matrix.
    let streamed_input = Matrix::Streaming(neusolve::streaming::StreamingMatrix::from_matrix(
        &matrix, 16, 2,
    ));
    let streamed = session
        .solve(&streamed_input, &rhs, &SolverConfig::default())
        .unwrap();
    assert_eq!(streamed.strategy, ExecutionStrategy::Streaming);

    for other in [&blocked, &parallel, &streamed] {
        assert!(other.converged);
        for i in 0..n {
            assert!(
                (other.solution[i] - reference.solution[i]).abs() < 1e-10,
                "strategy {} row {i}",
                other.strategy,
            );
        }
    }
}

/// Auto-tuning changes only performance hints, never results.
#[test]
fn auto_tuning_preserves_results() {
    let matrix = random_diag_dominant(50, 0.1, 21);
    let rhs = random_vector(50, 22);
    let session = SolverSession::new();

    let plain = session
        .solve(&matrix, &rhs, &SolverConfig::default())
        .unwrap();

    let mut tuned_config = SolverConfig::default();
    tuned_config.performance.enable_auto_tuning = true;
    let tuned = session.solve(&matrix, &rhs, &tuned_config).unwrap();

    assert!(tuned.converged);
    for i in 0..50 {
        assert!((tuned.solution[i] - plain.solution[i]).abs() < 1e-9, "row {i}");
    }
}

/// Convergence history decreases monotonically for a well-behaved system.
#[test]
fn residual_history_decreases() {
    let session = SolverSession::new();
    let matrix = dominant_3x3();
    let result = session
        .solve(&matrix, &[1.0, 2.0, 3.0], &SolverConfig::default())
        .unwrap();
    for window in result.history.windows(2) {
        assert!(
            window[1].residual_norm <= window[0].residual_norm + 1e-12,
            "{} -> {}",
            window[0].residual_norm,
            window[1].residual_norm,
        );
    }
}

/// Disabling pooling still solves correctly and leaves the session pool
/// untouched.
#[test]
fn pooling_toggle() {
    let session = SolverSession::new();
    let mut config = SolverConfig::default();
    config.memory.enable_pooling = false;

    let result = session.solve(&dominant_3x3(), &[1.0, 2.0, 3.0], &config).unwrap();
    assert!(result.converged);
    assert_eq!(session.pool_stats().requests, 0);
    assert!(result
        .recommendations
        .iter()
        .any(|r| r.contains("pooling")));
}

/// Benchmark batch returns one result per input plus a recommendation.
#[test]
fn run_benchmark_batch() {
    let session = SolverSession::new();
    let matrices = vec![
        random_diag_dominant(30, 0.15, 31),
        random_diag_dominant(45, 0.1, 32),
    ];
    let vectors = vec![random_vector(30, 41), random_vector(45, 42)];

    let report = session.run_benchmark(&matrices, &vectors).unwrap();
    assert_eq!(report.results.len(), 2);
    assert!(report.results.iter().all(|r| r.converged));
    assert!(report.comparison.hints.block_size > 0);
    assert!(report.comparison.total_duration > std::time::Duration::ZERO);
}
