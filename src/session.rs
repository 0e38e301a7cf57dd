//! Solver session: the public facade.
//!
//! A [`SolverSession`] owns the cross-call shared state (the buffer pool
//! and the memory manager) and wires together validation, analysis,
//! auto-tuning, strategy selection, and the Neumann iteration. Create one
//! session, run any number of solves against it, and call
//! [`cleanup`](SolverSession::cleanup) when done.
//!
//! # Example
//!
//! ```rust
//! use neusolve::session::SolverSession;
//! use neusolve::config::SolverConfig;
//! use neusolve::types::{CsrMatrix, Matrix};
//!
//! let matrix = Matrix::Csr(CsrMatrix::from_triples(3, 3, vec![
//!     (0, 0, 4.0), (0, 1, 1.0),
//!     (1, 0, 1.0), (1, 1, 4.0), (1, 2, 1.0),
//!     (2, 1, 1.0), (2, 2, 4.0),
//! ]));
//! let rhs = vec![1.0, 2.0, 3.0];
//!
//! let session = SolverSession::new();
//! let result = session.solve(&matrix, &rhs, &SolverConfig::default()).unwrap();
//! assert!(result.converged);
//! assert!(result.residual_norm < 1e-6);
//! session.cleanup();
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::analysis::{analyze_matrix, MatrixAnalysis};
use crate::autotune::AutoTuner;
use crate::config::{OptimizationHints, SolverConfig};
use crate::error::{ShapeError, SolverError};
use crate::neumann::{ConvergenceInfo, ExecutionEngine, IterationOutcome, NeumannSolver};
use crate::pool::{MemoryManager, MemoryProfile, PoolStats, VectorPool};
use crate::selector::{ExecutionStrategy, StrategySelector};
use crate::streaming::StreamingMatrix;
use crate::types::{validate, CsrMatrix, Matrix};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Optimization statistics attached to every solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationStats {
    /// Fraction of dense storage saved by the packed format.
    pub memory_reduction: f64,
    /// Buffer-pool hit rate measured during the solve.
    pub cache_hit_rate: f64,
    /// Fraction of stored entries processed inside full unrolled groups.
    pub vectorization_efficiency: f64,
    /// Number of deviations from the default (vectorized) strategy.
    pub algorithm_switches: usize,
}

/// Result of one solve.
///
/// Produced once at the end of a solve and not mutated afterward. Callers
/// must check [`converged`](Self::converged) in addition to handling the
/// shape/singularity errors: iteration exhaustion and numerical difficulty
/// are reported here, never thrown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResult {
    /// Solution vector (partial when `converged` is false).
    pub solution: Vec<f64>,
    /// Series iterations performed.
    pub iterations: usize,
    /// Final residual L2 norm.
    pub residual_norm: f64,
    /// Whether a stopping condition other than budget exhaustion was met.
    pub converged: bool,
    /// Execution strategy that ran the solve.
    pub strategy: ExecutionStrategy,
    /// Optimization statistics.
    pub stats: OptimizationStats,
    /// Measured memory behaviour of the solve.
    pub memory_profile: MemoryProfile,
    /// Per-iteration residual history.
    pub history: Vec<ConvergenceInfo>,
    /// Human-readable recommendations derived from measured behaviour.
    pub recommendations: Vec<String>,
}

/// Output of [`SolverSession::run_benchmark`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Per-input solve results.
    pub results: Vec<SolveResult>,
    /// Aggregate comparison and recommended configuration.
    pub comparison: BenchmarkComparison,
}

/// Aggregate view over a benchmark batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    /// Recommended configuration for similar-shaped systems.
    pub recommended: SolverConfig,
    /// Kernel hints tuned on the batch.
    pub hints: OptimizationHints,
    /// Strategy of the fastest solve in the batch.
    pub fastest_strategy: ExecutionStrategy,
    /// Total wall-clock time across the batch.
    pub total_duration: Duration,
}

// ---------------------------------------------------------------------------
// SolverSession
// ---------------------------------------------------------------------------

/// Owns the pool and memory manager shared across solves.
#[derive(Debug, Default)]
pub struct SolverSession {
    pool: VectorPool,
    memory: MemoryManager,
}

impl SolverSession {
    /// Create a session with an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer-pool counters.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Current memory pressure (`current / peak` tracked bytes).
    pub fn memory_pressure(&self) -> f64 {
        self.memory.pressure()
    }

    /// Release all pooled buffers and reset the memory counters.
    pub fn cleanup(&self) {
        self.pool.clear();
        self.memory.reset();
    }

    /// Solve `Ax = b`.
    ///
    /// Preprocesses the matrix into packed form, selects an execution
    /// strategy from size, sparsity, and memory pressure, runs the Neumann
    /// iteration, and attaches measured diagnostics.
    ///
    /// # Errors
    ///
    /// - [`SolverError::Shape`] for malformed matrices, non-square systems,
    ///   or a RHS whose length does not match.
    /// - [`SolverError::SingularDiagonal`] if any diagonal entry is unusable
    ///   as a divisor.
    ///
    /// Non-convergence is *not* an error; check
    /// [`SolveResult::converged`].
    #[instrument(skip(self, matrix, rhs, config), fields(rows = matrix.rows(), nnz = matrix.nnz()))]
    pub fn solve(
        &self,
        matrix: &Matrix,
        rhs: &[f64],
        config: &SolverConfig,
    ) -> Result<SolveResult, SolverError> {
        validate(matrix)?;
        let rows = matrix.rows();
        let cols = matrix.cols();
        if rows != cols {
            return Err(SolverError::Shape(ShapeError::DimensionMismatch(format!(
                "solver requires a square matrix but got {rows}x{cols}",
            ))));
        }
        if rhs.len() != rows {
            return Err(SolverError::Shape(ShapeError::DimensionMismatch(format!(
                "rhs length {} does not match matrix dimension {rows}",
                rhs.len(),
            ))));
        }
        for (i, &v) in rhs.iter().enumerate() {
            if !v.is_finite() {
                return Err(SolverError::Shape(ShapeError::NonFiniteValue(format!(
                    "rhs[{i}] = {v}",
                ))));
            }
        }

        let analysis = analyze_matrix(matrix);
        let nnz = analysis.nnz;
        let mut hints = OptimizationHints::from_config(config);

        // Pressure reflects what is already resident (pooled buffers from
        // earlier solves) against the session's high-water mark.
        let pressure = self.memory.pressure();
        let selector = StrategySelector::new(config);
        let strategy = if matches!(matrix, Matrix::Streaming(_)) {
            // The caller already chunked the matrix; keep it that way.
            ExecutionStrategy::Streaming
        } else {
            selector.select(rows, nnz, pressure)
        };

        info!(%strategy, rows, nnz, pressure, "solve: selected strategy");

        // Pack into the representation the strategy iterates on.
        let stream_storage;
        let csr_storage;
        let engine = if strategy == ExecutionStrategy::Streaming {
            if let Matrix::Streaming(sm) = matrix {
                ExecutionEngine::Streaming { matrix: sm }
            } else {
                stream_storage = StreamingMatrix::from_matrix(
                    matrix,
                    hints.stream_chunk_size,
                    config.memory.max_cached_chunks,
                );
                ExecutionEngine::Streaming {
                    matrix: &stream_storage,
                }
            }
        } else {
            csr_storage = matrix.to_csr();
            if config.performance.enable_auto_tuning {
                hints = AutoTuner::default().tune(&csr_storage, rhs, &hints);
            }
            match strategy {
                ExecutionStrategy::Blocked => ExecutionEngine::Blocked {
                    csr: &csr_storage,
                    block_size: hints.block_size,
                },
                ExecutionStrategy::Parallel => ExecutionEngine::Parallel { csr: &csr_storage },
                _ => ExecutionEngine::Vectorized { csr: &csr_storage },
            }
        };

        // Pooling can be disabled per solve; a throwaway pool keeps the
        // acquire/release pairing identical either way.
        let local_pool;
        let pool: &VectorPool = if config.memory.enable_pooling {
            &self.pool
        } else {
            local_pool = VectorPool::new();
            &local_pool
        };

        let working_set = StrategySelector::working_set_bytes(rows, nnz);
        self.memory.reserve(working_set);

        let solver = NeumannSolver::new(config.epsilon, config.max_iterations);
        let label = strategy.to_string();
        let (run_result, profile) = self
            .memory
            .profile_operation(&label, pool, || solver.run(&engine, rhs, pool));

        self.memory.release(working_set);
        self.memory.set_resident(self.pool.pooled_bytes());

        let outcome = run_result?;
        Ok(self.assemble_result(outcome, profile, strategy, &analysis, config, &hints, pressure))
    }

    /// Batch-benchmark entry point.
    ///
    /// Solves each `(matrix, vector)` pair with auto-tuning enabled and
    /// aggregates a recommended configuration.
    ///
    /// # Errors
    ///
    /// Propagates the first structural or singularity error; also fails if
    /// the input slices differ in length.
    pub fn run_benchmark(
        &self,
        matrices: &[Matrix],
        vectors: &[Vec<f64>],
    ) -> Result<BenchmarkReport, SolverError> {
        if matrices.len() != vectors.len() {
            return Err(SolverError::Shape(ShapeError::DimensionMismatch(format!(
                "{} matrices but {} vectors",
                matrices.len(),
                vectors.len(),
            ))));
        }

        let config = SolverConfig {
            performance: crate::config::PerformanceConfig {
                enable_auto_tuning: true,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut results = Vec::with_capacity(matrices.len());
        let mut total_duration = Duration::ZERO;
        let mut hints = OptimizationHints::from_config(&config);

        for (matrix, rhs) in matrices.iter().zip(vectors.iter()) {
            // Tune on the concrete input; the last packed system's winning
            // parameters carry into the aggregate recommendation.
            if !matches!(matrix, Matrix::Streaming(_)) {
                let csr: CsrMatrix = matrix.to_csr();
                hints = AutoTuner::default().tune(&csr, rhs, &hints);
            }
            let result = self.solve(matrix, rhs, &config)?;
            total_duration += result.memory_profile.duration;
            results.push(result);
        }

        let fastest_strategy = results
            .iter()
            .min_by_key(|r| r.memory_profile.duration)
            .map(|r| r.strategy)
            .unwrap_or(ExecutionStrategy::Vectorized);

        let recommended = SolverConfig {
            performance: crate::config::PerformanceConfig {
                // The tuned hints make re-tuning on every solve unnecessary.
                enable_auto_tuning: false,
                ..Default::default()
            },
            ..config
        };

        Ok(BenchmarkReport {
            results,
            comparison: BenchmarkComparison {
                recommended,
                hints,
                fastest_strategy,
                total_duration,
            },
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble_result(
        &self,
        outcome: IterationOutcome,
        profile: MemoryProfile,
        strategy: ExecutionStrategy,
        analysis: &MatrixAnalysis,
        config: &SolverConfig,
        hints: &OptimizationHints,
        pressure: f64,
    ) -> SolveResult {
        let dense_bytes = analysis.rows * analysis.cols * std::mem::size_of::<f64>();
        let packed_bytes = StrategySelector::working_set_bytes(analysis.rows, analysis.nnz);
        let memory_reduction = if dense_bytes > 0 {
            (1.0 - packed_bytes as f64 / dense_bytes as f64).max(0.0)
        } else {
            0.0
        };

        let stats = OptimizationStats {
            memory_reduction,
            cache_hit_rate: profile.cache_hit_rate,
            vectorization_efficiency: vectorization_efficiency(analysis, hints),
            algorithm_switches: usize::from(strategy != ExecutionStrategy::Vectorized),
        };

        let mut recommendations = outcome.notes.clone();
        if !outcome.converged {
            recommendations.push(format!(
                "did not converge after {} iterations (residual {:.3e}); increase \
                 max_iterations or relax epsilon",
                outcome.iterations, outcome.residual_norm,
            ));
        }
        if analysis.dominance_strength < 0.0 {
            recommendations.push(
                "matrix is not diagonally dominant; the Neumann series is not \
                 guaranteed to converge"
                    .to_string(),
            );
        }
        if !config.memory.enable_pooling {
            recommendations
                .push("buffer pooling is disabled; enable it to reduce allocation churn".into());
        }
        if pressure > config.adaptive.memory_pressure_threshold {
            recommendations.push(format!(
                "memory pressure {pressure:.2} exceeded the threshold; streaming \
                 execution was selected",
            ));
        }

        SolveResult {
            solution: outcome.solution,
            iterations: outcome.iterations,
            residual_norm: outcome.residual_norm,
            converged: outcome.converged,
            strategy,
            stats,
            memory_profile: profile,
            history: outcome.history,
            recommendations,
        }
    }
}

/// Fraction of stored entries that fall inside full unrolled groups when
/// rows are processed `unroll_factor` entries at a time.
fn vectorization_efficiency(analysis: &MatrixAnalysis, hints: &OptimizationHints) -> f64 {
    if hints.unroll_factor <= 1 || analysis.nnz == 0 || analysis.rows == 0 {
        return 0.0;
    }
    let unroll = hints.unroll_factor;
    let avg_row = analysis.nnz / analysis.rows.max(1);
    let grouped_per_row = avg_row / unroll * unroll;
    if avg_row == 0 {
        0.0
    } else {
        grouped_per_row as f64 / avg_row as f64
    }
}
