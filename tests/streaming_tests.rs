//! Streaming matrix tests.

mod helpers;

use helpers::{random_diag_dominant, random_vector};
use neusolve::config::SolverConfig;
use neusolve::streaming::StreamingMatrix;
use neusolve::types::{CsrMatrix, Matrix};
use neusolve::{OptimizationHints, SolverSession};

/// A 10,000-row diagonal matrix streamed in 1,000-row chunks produces a
/// matvec identical to the non-streaming CSR matvec.
#[test]
fn large_diagonal_streaming_matches_csr() {
    let n = 10_000;
    let triples: Vec<(usize, usize, f64)> = (0..n).map(|i| (i, i, 2.0 + (i % 5) as f64)).collect();
    let csr = CsrMatrix::from_triples(n, n, triples);
    let source = Matrix::Csr(csr.clone());
    let streaming = StreamingMatrix::from_matrix(&source, 1_000, 3);

    let x = random_vector(n, 8);
    let mut y_csr = vec![0.0f64; n];
    let mut y_stream = vec![0.0f64; n];
    csr.multiply_vector(&x, &mut y_csr);
    streaming.multiply_vector(&x, &mut y_stream);

    for i in 0..n {
        assert!((y_csr[i] - y_stream[i]).abs() < 1e-12, "row {i}");
    }
    assert_eq!(streaming.num_chunks(), 10);
    assert!(streaming.cached_chunks() <= 3);
}

/// Sparse random matrix: streaming agrees with the packed representation.
#[test]
fn random_matrix_streaming_matches_packed() {
    let n = 200;
    let source = random_diag_dominant(n, 0.05, 23);
    let csr = source.to_csr();
    let streaming = StreamingMatrix::from_matrix(&source, 32, 2);

    let x = random_vector(n, 24);
    let mut y_csr = vec![0.0f64; n];
    let mut y_stream = vec![0.0f64; n];
    csr.multiply_vector(&x, &mut y_csr);
    streaming.multiply_vector(&x, &mut y_stream);

    for i in 0..n {
        assert!((y_csr[i] - y_stream[i]).abs() < 1e-12, "row {i}");
    }
}

/// Eviction keeps the resident count bounded while repeated passes rebuild
/// chunks from the retained source.
#[test]
fn eviction_respects_budget_across_passes() {
    let source = random_diag_dominant(120, 0.08, 33);
    let streaming = StreamingMatrix::from_matrix(&source, 10, 2);
    let x = random_vector(120, 34);
    let mut y = vec![0.0f64; 120];

    for _ in 0..3 {
        streaming.multiply_vector(&x, &mut y);
        assert!(streaming.cached_chunks() <= 2);
    }
    // 12 chunks per pass, only 2 resident: every pass rebuilds every chunk.
    assert_eq!(streaming.chunk_builds(), 36);
}

/// A solve through a streaming matrix reaches the same solution as the
/// packed solve.
#[test]
fn streaming_solve_matches_packed_solve() {
    let n = 150;
    let matrix = random_diag_dominant(n, 0.05, 51);
    let rhs = random_vector(n, 52);
    let session = SolverSession::new();

    let packed = session.solve(&matrix, &rhs, &SolverConfig::default()).unwrap();
    assert!(packed.converged);

    let streamed_input = Matrix::Streaming(StreamingMatrix::from_matrix(&matrix, 25, 2));
    let streamed = session
        .solve(&streamed_input, &rhs, &SolverConfig::default())
        .unwrap();
    assert!(streamed.converged);

    for i in 0..n {
        assert!(
            (packed.solution[i] - streamed.solution[i]).abs() < 1e-10,
            "row {i}"
        );
    }
}

/// Chunk sizes that do not divide the row count handle the ragged tail.
#[test]
fn ragged_tail_chunk() {
    let source = random_diag_dominant(17, 0.3, 61);
    let csr = source.to_csr();
    let streaming = StreamingMatrix::from_matrix(&source, 5, 4);
    assert_eq!(streaming.num_chunks(), 4); // 5 + 5 + 5 + 2

    let x = random_vector(17, 62);
    let mut y_csr = vec![0.0f64; 17];
    let mut y_stream = vec![0.0f64; 17];
    csr.multiply_vector(&x, &mut y_csr);
    streaming.multiply_vector(&x, &mut y_stream);
    for i in 0..17 {
        assert!((y_csr[i] - y_stream[i]).abs() < 1e-12, "row {i}");
    }
}

/// Streaming matrices answer entry queries against the retained source.
#[test]
fn entry_queries_against_source() {
    let source = random_diag_dominant(25, 0.2, 71);
    let streaming = StreamingMatrix::from_matrix(&source, 6, 2);
    for row in 0..25 {
        for col in 0..25 {
            assert_eq!(
                streaming.get_entry(row, col),
                source.get_entry(row, col),
                "({row}, {col})"
            );
        }
    }
}

/// The tagged Matrix type dispatches streaming matvec like any other format.
#[test]
fn tagged_dispatch() {
    let source = random_diag_dominant(20, 0.2, 81);
    let csr = source.to_csr();
    let tagged = Matrix::Streaming(StreamingMatrix::from_matrix(&source, 4, 2));

    let x = random_vector(20, 82);
    let mut y_ref = vec![0.0f64; 20];
    let mut y_tagged = vec![0.0f64; 20];
    csr.multiply_vector(&x, &mut y_ref);
    tagged.multiply_vector(&x, &mut y_tagged, &OptimizationHints::default());
    for i in 0..20 {
        assert!((y_ref[i] - y_tagged[i]).abs() < 1e-12, "row {i}");
    }
}
