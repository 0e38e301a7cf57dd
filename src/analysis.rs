//! Format-agnostic matrix analysis.
//!
//! Performs a single pass over the stored entries to compute the structural
//! and numerical properties the strategy selector and the solver's
//! diagnostics rely on. Analysis is pure: it is computed on demand and never
//! cached on the matrix itself.

use serde::{Deserialize, Serialize};

use crate::types::Matrix;

/// Derived, read-only snapshot of a matrix's solver-relevant properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixAnalysis {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Number of stored entries.
    pub nnz: usize,
    /// Sparsity ratio: `1 - nnz / (rows * cols)`.
    pub sparsity: f64,
    /// `true` if `|a_ii| >= sum_{j != i} |a_ij|` for every row.
    pub row_diagonally_dominant: bool,
    /// `true` if `|a_jj| >= sum_{i != j} |a_ij|` for every column.
    pub col_diagonally_dominant: bool,
    /// Minimum over rows of `|a_ii| - sum_{j != i} |a_ij|`; negative when
    /// some row violates dominance. Used as a convergence-risk indicator.
    pub dominance_strength: f64,
    /// `true` if the matrix is symmetric within the comparison tolerance.
    pub symmetric: bool,
}

/// Diagonal-dominance report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagonalDominance {
    /// Dominance holds for every row.
    pub by_rows: bool,
    /// Dominance holds for every column.
    pub by_cols: bool,
    /// Minimum row strength `|a_ii| - sum_{j != i} |a_ij|`.
    pub strength: f64,
}

/// Check row and column diagonal dominance.
///
/// For each row `i`, strength is `|a_ii| - sum_{j != i} |a_ij|`; the matrix
/// is row-dominant when every strength is non-negative (the symmetric
/// definition applies to columns). Non-square matrices are never dominant.
pub fn check_diagonal_dominance(matrix: &Matrix) -> DiagonalDominance {
    let rows = matrix.rows();
    let cols = matrix.cols();
    if rows != cols || rows == 0 {
        return DiagonalDominance {
            by_rows: false,
            by_cols: false,
            strength: f64::NEG_INFINITY,
        };
    }

    let mut diag = vec![0.0f64; rows];
    let mut row_off = vec![0.0f64; rows];
    let mut col_off = vec![0.0f64; cols];

    matrix.for_each_entry(|r, c, v| {
        if r == c {
            diag[r] += v;
        } else {
            row_off[r] += v.abs();
            col_off[c] += v.abs();
        }
    });

    let mut strength = f64::INFINITY;
    let mut by_rows = true;
    let mut by_cols = true;
    for i in 0..rows {
        let s = diag[i].abs() - row_off[i];
        strength = strength.min(s);
        if s < 0.0 {
            by_rows = false;
        }
        if diag[i].abs() < col_off[i] {
            by_cols = false;
        }
    }

    DiagonalDominance {
        by_rows,
        by_cols,
        strength,
    }
}

/// Symmetry check: compares `a_ij` with `a_ji` for every stored entry within
/// `tolerance`. Entries absent from one triangle are treated as implicit
/// zeros, so only positions present in either triangle are compared.
pub fn is_symmetric(matrix: &Matrix, tolerance: f64) -> bool {
    if matrix.rows() != matrix.cols() {
        return false;
    }
    let mut symmetric = true;
    matrix.for_each_entry(|r, c, v| {
        if symmetric && r != c {
            let mirrored = matrix.get_entry(c, r);
            if (v - mirrored).abs() > tolerance {
                symmetric = false;
            }
        }
    });
    symmetric
}

/// Per-row sums of stored entries.
pub fn row_sums(matrix: &Matrix) -> Vec<f64> {
    let mut sums = vec![0.0f64; matrix.rows()];
    matrix.for_each_entry(|r, _, v| sums[r] += v);
    sums
}

/// Per-column sums of stored entries.
pub fn col_sums(matrix: &Matrix) -> Vec<f64> {
    let mut sums = vec![0.0f64; matrix.cols()];
    matrix.for_each_entry(|_, c, v| sums[c] += v);
    sums
}

/// Aggregate dominance, symmetry, and sparsity into one snapshot.
pub fn analyze_matrix(matrix: &Matrix) -> MatrixAnalysis {
    let rows = matrix.rows();
    let cols = matrix.cols();
    let nnz = matrix.nnz();
    let total = (rows as f64) * (cols as f64);
    let sparsity = if total > 0.0 {
        1.0 - (nnz as f64) / total
    } else {
        0.0
    };

    let dominance = check_diagonal_dominance(matrix);

    MatrixAnalysis {
        rows,
        cols,
        nnz,
        sparsity,
        row_diagonally_dominant: dominance.by_rows,
        col_diagonally_dominant: dominance.by_cols,
        dominance_strength: dominance.strength,
        symmetric: is_symmetric(matrix, 1e-12),
    }
}
