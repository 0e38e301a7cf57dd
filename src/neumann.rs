//! Neumann-series iterative solver.
//!
//! Solves `Ax = b` by splitting `A = D - R` (where `D` is the diagonal) and
//! accumulating the series
//!
//! ```text
//! x_0 = t_0 = D^{-1} b
//! t_k = D^{-1} (A t_{k-1} - D t_{k-1})      (= D^{-1} R t_{k-1})
//! x_k = x_{k-1} + t_k
//! ```
//!
//! which converges when the spectral radius of `D^{-1} R` is below 1,
//! guaranteed for diagonally dominant matrices.
//!
//! # Termination
//!
//! Each iteration computes the residual `||A x_k - b||` and stops when it
//! falls below the tolerance, or when the series term becomes negligible
//! (`||t_k|| < epsilon * 1e-3`; further terms cannot materially change the
//! solution). Exhausting the iteration budget is a soft failure: the partial
//! solution and residual are returned with `converged = false`, never an
//! error. The only hard failure is an unusable diagonal entry, reported
//! before any iteration begins.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::OptimizationHints;
use crate::error::{ShapeError, SolverError};
use crate::pool::VectorPool;
use crate::simd;
use crate::streaming::StreamingMatrix;
use crate::types::CsrMatrix;

/// A diagonal entry below this magnitude cannot be used as a divisor.
pub const MIN_DIAGONAL: f64 = 1e-15;

/// If the residual grows by more than this factor in a single step, the
/// iteration is declared diverging and stopped early.
const INSTABILITY_GROWTH_FACTOR: f64 = 2.0;

/// Per-iteration convergence snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceInfo {
    /// Iteration index (0 is the initial guess `D^{-1} b`).
    pub iteration: usize,
    /// Residual L2 norm at this iteration.
    pub residual_norm: f64,
}

/// Raw outcome of an iteration run, before the session attaches profiling
/// and recommendations.
#[derive(Debug, Clone)]
pub struct IterationOutcome {
    /// Solution vector (partial if not converged).
    pub solution: Vec<f64>,
    /// Number of series iterations performed.
    pub iterations: usize,
    /// Final residual L2 norm.
    pub residual_norm: f64,
    /// Whether a stopping condition other than budget exhaustion was met.
    pub converged: bool,
    /// Per-iteration residual history.
    pub history: Vec<ConvergenceInfo>,
    /// Notes about early termination or instability, surfaced to callers as
    /// recommendations.
    pub notes: Vec<String>,
}

// ---------------------------------------------------------------------------
// Execution engine
// ---------------------------------------------------------------------------

/// Matvec backend for one execution strategy.
///
/// The iteration itself is identical across strategies; only the
/// matrix-vector product changes. Parallel workers own disjoint row ranges
/// and write into disjoint slices of the output, so no locking is needed and
/// results are deterministic regardless of worker scheduling.
pub enum ExecutionEngine<'a> {
    /// Plain unrolled CSR traversal.
    Vectorized {
        /// Packed matrix.
        csr: &'a CsrMatrix,
    },
    /// Cache-blocked CSR traversal.
    Blocked {
        /// Packed matrix.
        csr: &'a CsrMatrix,
        /// Rows per cache block.
        block_size: usize,
    },
    /// Row-partitioned fan-out across the worker pool.
    Parallel {
        /// Packed matrix.
        csr: &'a CsrMatrix,
    },
    /// Chunk-by-chunk dispatch with bounded resident chunks.
    Streaming {
        /// Chunked matrix.
        matrix: &'a StreamingMatrix,
    },
}

impl ExecutionEngine<'_> {
    /// Number of rows of the underlying matrix.
    pub fn rows(&self) -> usize {
        match self {
            ExecutionEngine::Vectorized { csr }
            | ExecutionEngine::Blocked { csr, .. }
            | ExecutionEngine::Parallel { csr } => csr.rows,
            ExecutionEngine::Streaming { matrix } => matrix.rows(),
        }
    }

    /// Diagonal of the underlying matrix; missing entries read as zero.
    pub fn diagonal(&self) -> Vec<f64> {
        match self {
            ExecutionEngine::Vectorized { csr }
            | ExecutionEngine::Blocked { csr, .. }
            | ExecutionEngine::Parallel { csr } => csr.diagonal(),
            ExecutionEngine::Streaming { matrix } => matrix.diagonal(),
        }
    }

    /// `y = A * x` under this strategy.
    pub fn apply(&self, x: &[f64], y: &mut [f64]) {
        match self {
            ExecutionEngine::Vectorized { csr } => csr.multiply_vector(x, y),
            ExecutionEngine::Blocked { csr, block_size } => {
                csr.multiply_vector_blocked(x, y, *block_size)
            }
            ExecutionEngine::Parallel { csr } => parallel_multiply(csr, x, y),
            ExecutionEngine::Streaming { matrix } => matrix.multiply_vector(x, y),
        }
    }
}

/// Row-partitioned parallel matvec.
///
/// The output is split into contiguous per-worker slices; each worker
/// computes only its own row range. Ranges are disjoint and pre-partitioned,
/// so the result does not depend on scheduling order.
fn parallel_multiply(csr: &CsrMatrix, x: &[f64], y: &mut [f64]) {
    let rows = csr.rows;
    if rows == 0 {
        return;
    }
    let workers = rayon::current_num_threads().max(1);
    let range = rows.div_ceil(workers).max(1);

    y[..rows]
        .par_chunks_mut(range)
        .enumerate()
        .for_each(|(worker, out)| {
            let base = worker * range;
            for (offset, slot) in out.iter_mut().enumerate() {
                *slot = csr.row_dot(base + offset, x);
            }
        });
}

// ---------------------------------------------------------------------------
// NeumannSolver
// ---------------------------------------------------------------------------

/// Neumann-series solver parameterised by tolerance and iteration budget.
#[derive(Debug, Clone)]
pub struct NeumannSolver {
    /// Target residual L2 norm.
    pub epsilon: f64,
    /// Upper bound on series iterations.
    pub max_iterations: usize,
}

impl NeumannSolver {
    /// Create a solver.
    pub fn new(epsilon: f64, max_iterations: usize) -> Self {
        Self {
            epsilon,
            max_iterations,
        }
    }

    /// Run the iteration against the given execution engine.
    ///
    /// Scratch vectors come from `pool` and are returned on every exit path
    /// via their RAII handles.
    ///
    /// # Errors
    ///
    /// - [`SolverError::Shape`] if the RHS length does not match the matrix.
    /// - [`SolverError::SingularDiagonal`] if any `|d_ii| <` [`MIN_DIAGONAL`].
    #[instrument(skip(self, engine, rhs, pool), fields(n = engine.rows()))]
    pub fn run(
        &self,
        engine: &ExecutionEngine<'_>,
        rhs: &[f64],
        pool: &VectorPool,
    ) -> Result<IterationOutcome, SolverError> {
        let n = engine.rows();
        if rhs.len() != n {
            return Err(SolverError::Shape(ShapeError::DimensionMismatch(format!(
                "rhs length {} does not match matrix dimension {}",
                rhs.len(),
                n,
            ))));
        }

        if n == 0 {
            return Ok(IterationOutcome {
                solution: Vec::new(),
                iterations: 0,
                residual_norm: 0.0,
                converged: true,
                history: Vec::new(),
                notes: Vec::new(),
            });
        }

        // Split A = D - R; every diagonal entry must be usable as a divisor.
        let diag = engine.diagonal();
        let mut d_inv = pool.acquire(n);
        for (i, &d) in diag.iter().enumerate() {
            if d.abs() < MIN_DIAGONAL {
                return Err(SolverError::SingularDiagonal { row: i, value: d });
            }
            d_inv[i] = 1.0 / d;
        }

        let mut x = pool.acquire(n);
        let mut term = pool.acquire(n);
        let mut scratch = pool.acquire(n);

        // x_0 = t_0 = D^{-1} b
        for i in 0..n {
            x[i] = d_inv[i] * rhs[i];
        }
        term.copy_from_slice(&x);

        let mut history = Vec::with_capacity(self.max_iterations.min(256));
        let mut notes = Vec::new();

        // Initial residual: x_0 may already satisfy the tolerance.
        engine.apply(&x, &mut scratch);
        let mut residual_norm = residual_norm_from(&scratch, rhs);
        history.push(ConvergenceInfo {
            iteration: 0,
            residual_norm,
        });

        let mut converged = residual_norm < self.epsilon;
        let mut iterations = 0usize;
        let mut prev_residual = residual_norm;

        if !converged {
            for k in 1..=self.max_iterations {
                iterations = k;

                // t_k = D^{-1} (A t_{k-1} - D t_{k-1})
                engine.apply(&term, &mut scratch);
                for j in 0..n {
                    term[j] = d_inv[j] * (scratch[j] - diag[j] * term[j]);
                }

                // x_k = x_{k-1} + t_k
                simd::add_in_place(&mut x, &term);

                // r = ||A x_k - b||
                engine.apply(&x, &mut scratch);
                residual_norm = residual_norm_from(&scratch, rhs);
                history.push(ConvergenceInfo {
                    iteration: k,
                    residual_norm,
                });
                debug!(iteration = k, residual_norm, "neumann iteration");

                if !residual_norm.is_finite() {
                    warn!(iteration = k, "residual became non-finite");
                    notes.push(format!(
                        "residual became non-finite at iteration {k}; the system is \
                         likely outside the convergent regime",
                    ));
                    break;
                }

                if residual_norm < self.epsilon {
                    converged = true;
                    break;
                }

                let term_norm = simd::norm2(&term);
                if term_norm < self.epsilon * 1e-3 {
                    converged = true;
                    notes.push(format!(
                        "series term became negligible ({term_norm:.3e}) at iteration {k}",
                    ));
                    break;
                }

                if k > 1
                    && prev_residual.is_finite()
                    && prev_residual > 0.0
                    && residual_norm > INSTABILITY_GROWTH_FACTOR * prev_residual
                {
                    warn!(
                        iteration = k,
                        prev = prev_residual,
                        current = residual_norm,
                        "residual diverging"
                    );
                    notes.push(format!(
                        "residual grew from {prev_residual:.3e} to {residual_norm:.3e} at \
                         iteration {k}; the matrix is likely not diagonally dominant",
                    ));
                    break;
                }

                prev_residual = residual_norm;
            }
        }

        Ok(IterationOutcome {
            solution: x.detach(),
            iterations,
            residual_norm,
            converged,
            history,
            notes,
        })
    }
}

/// `||ax - b||_2` where `ax` already holds `A * x`.
#[inline]
fn residual_norm_from(ax: &[f64], b: &[f64]) -> f64 {
    let mut norm_sq = 0.0f64;
    for i in 0..ax.len() {
        let r = ax[i] - b[i];
        norm_sq += r * r;
    }
    norm_sq.sqrt()
}
