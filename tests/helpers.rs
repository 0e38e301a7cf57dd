//! Shared test helpers for the integration suite.
//!
//! Provides deterministic random matrix generators, a dense reference
//! solver, and floating-point comparison utilities.

use neusolve::types::{CooMatrix, CsrMatrix, Matrix};

// ---------------------------------------------------------------------------
// Random number generator (simple LCG for deterministic reproducibility)
// ---------------------------------------------------------------------------

/// A minimal linear congruential generator for deterministic test data.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    /// Create a new LCG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next u64 value.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Generate a uniform f64 in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform f64 in [lo, hi).
    pub fn next_f64_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

// ---------------------------------------------------------------------------
// Matrix generators
// ---------------------------------------------------------------------------

/// Generate a random strictly diagonally dominant CSR matrix of dimension
/// `n`, wrapped in the tagged [`Matrix`] type.
///
/// Each row gets approximately `density * n` off-diagonal entries; the
/// diagonal is set to `1 + sum_of_abs_off_diag` plus a random excess so the
/// Neumann series is guaranteed to converge.
pub fn random_diag_dominant(n: usize, density: f64, seed: u64) -> Matrix {
    let mut rng = Lcg::new(seed);
    let mut triples: Vec<(usize, usize, f64)> = Vec::new();

    for i in 0..n {
        let mut off_diag_sum = 0.0f64;

        for j in 0..n {
            if i == j {
                continue;
            }
            if rng.next_f64() < density {
                let val = rng.next_f64_range(-1.0, 1.0);
                triples.push((i, j, val));
                off_diag_sum += val.abs();
            }
        }

        // Ensure at least one off-diagonal entry per row.
        if off_diag_sum == 0.0 && n > 1 {
            let j = (i + 1) % n;
            let val = rng.next_f64_range(0.1, 0.5);
            triples.push((i, j, val));
            off_diag_sum = val;
        }

        triples.push((i, i, off_diag_sum + 1.0 + rng.next_f64()));
    }

    Matrix::Csr(CsrMatrix::from_triples(n, n, triples))
}

/// Deterministic random vector of length `n`.
pub fn random_vector(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = Lcg::new(seed);
    (0..n).map(|_| rng.next_f64_range(-1.0, 1.0)).collect()
}

/// COO matrix from explicit triples, wrapped in [`Matrix`].
pub fn coo_matrix(rows: usize, cols: usize, triples: Vec<(usize, usize, f64)>) -> Matrix {
    Matrix::Coo(CooMatrix::from_triples(rows, cols, triples))
}

// ---------------------------------------------------------------------------
// Dense reference solver
// ---------------------------------------------------------------------------

/// Solve `Ax = b` by dense Gaussian elimination with partial pivoting.
///
/// O(n^3) reference used only on small test problems to verify the
/// iterative solver.
///
/// # Panics
///
/// Panics if the matrix is singular or dimensions are inconsistent.
pub fn dense_solve(matrix: &Matrix, rhs: &[f64]) -> Vec<f64> {
    let n = matrix.rows();
    assert_eq!(n, matrix.cols(), "dense_solve requires a square matrix");
    assert_eq!(rhs.len(), n, "rhs length must match matrix dimension");

    let dense = matrix.to_dense();
    let mut aug = vec![vec![0.0f64; n + 1]; n];
    for i in 0..n {
        for j in 0..n {
            aug[i][j] = dense.get(i, j);
        }
        aug[i][n] = rhs[i];
    }

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = aug[col][col].abs();
        for row in (col + 1)..n {
            if aug[row][col].abs() > max_val {
                max_val = aug[row][col].abs();
                max_row = row;
            }
        }
        assert!(max_val > 1e-15, "matrix is singular or near-singular");
        aug.swap(col, max_row);

        let pivot = aug[col][col];
        for row in (col + 1)..n {
            let factor = aug[row][col] / pivot;
            for j in col..=n {
                aug[row][j] -= factor * aug[col][j];
            }
        }
    }

    let mut x = vec![0.0f64; n];
    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum -= aug[i][j] * x[j];
        }
        x[i] = sum / aug[i][i];
    }
    x
}

// ---------------------------------------------------------------------------
// Floating-point comparison utilities
// ---------------------------------------------------------------------------

/// L2 norm of a vector.
pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

/// Relative error `||approx - exact|| / ||exact||` (absolute when the exact
/// solution has zero norm).
pub fn relative_error(approx: &[f64], exact: &[f64]) -> f64 {
    assert_eq!(approx.len(), exact.len());
    let error = approx
        .iter()
        .zip(exact.iter())
        .map(|(&a, &e)| (a - e) * (a - e))
        .sum::<f64>()
        .sqrt();
    let exact_norm = l2_norm(exact);
    if exact_norm > 1e-15 {
        error / exact_norm
    } else {
        error
    }
}

/// Residual norm `||A x - b||` computed through the tagged matrix type.
pub fn residual_norm(matrix: &Matrix, x: &[f64], rhs: &[f64]) -> f64 {
    let n = matrix.rows();
    let mut ax = vec![0.0f64; n];
    matrix.multiply_vector(x, &mut ax, &neusolve::OptimizationHints::default());
    (0..n)
        .map(|i| {
            let r = ax[i] - rhs[i];
            r * r
        })
        .sum::<f64>()
        .sqrt()
}
