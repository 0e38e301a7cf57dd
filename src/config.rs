//! Solver configuration and optimization hints.
//!
//! [`SolverConfig`] is constructed once per solve, merged with defaults via
//! the struct-update syntax, and read-only for the duration of the solve.
//! [`OptimizationHints`] are derived from the configuration (and optionally
//! overwritten by the auto-tuner) before the iteration begins, and frozen
//! thereafter.
//!
//! # Example
//!
//! ```rust
//! use neusolve::config::SolverConfig;
//!
//! let config = SolverConfig {
//!     epsilon: 1e-8,
//!     ..Default::default()
//! };
//! assert_eq!(config.max_iterations, 1000);
//! ```

use serde::{Deserialize, Serialize};

/// Top-level solver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Convergence tolerance: the solve stops once `||A*x - b|| < epsilon`.
    ///
    /// Default: `1e-6`.
    pub epsilon: f64,

    /// Upper bound on iterations. Exhausting it is a soft failure reported
    /// through `SolveResult::converged`, never an error.
    ///
    /// Default: `1000`.
    pub max_iterations: usize,

    /// Memory optimization knobs.
    pub memory: MemoryConfig,

    /// Performance knobs.
    pub performance: PerformanceConfig,

    /// Adaptive strategy-selection thresholds.
    pub adaptive: AdaptiveConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            max_iterations: 1000,
            memory: MemoryConfig::default(),
            performance: PerformanceConfig::default(),
            adaptive: AdaptiveConfig::default(),
        }
    }
}

/// Memory optimization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Reuse scratch vectors through the session's buffer pool.
    ///
    /// Default: `true`.
    pub enable_pooling: bool,

    /// Working-set size in bytes above which the cache-blocked matvec is
    /// preferred over the plain vectorized one.
    ///
    /// Default: 64 MiB.
    pub streaming_threshold: usize,

    /// Maximum number of chunk sub-matrices a streaming matrix keeps
    /// resident at once.
    ///
    /// Default: `4`.
    pub max_cached_chunks: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enable_pooling: true,
            streaming_threshold: 64 * 1024 * 1024,
            max_cached_chunks: 4,
        }
    }
}

/// Performance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Use the unrolled vector kernels. Disabling this only changes the
    /// reported efficiency statistics; results are numerically equivalent.
    ///
    /// Default: `true`.
    pub enable_vectorization: bool,

    /// Allow the cache-blocked matvec strategy.
    ///
    /// Default: `true`.
    pub enable_blocking: bool,

    /// Micro-benchmark block size and unroll factor on the actual input
    /// before solving. Advisory only; the solver functions correctly with
    /// default hints when disabled.
    ///
    /// Default: `false`.
    pub enable_auto_tuning: bool,

    /// Allow the parallel row-partitioned matvec strategy.
    ///
    /// Default: `true`.
    pub enable_parallel: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            enable_vectorization: true,
            enable_blocking: true,
            enable_auto_tuning: false,
            enable_parallel: true,
        }
    }
}

/// Thresholds that govern adaptive strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Row count above which the parallel strategy is selected (when
    /// parallelism is enabled).
    ///
    /// Default: `10_000`.
    pub parallel_row_threshold: usize,

    /// Memory-pressure ratio (current / peak) above which the streaming
    /// strategy is selected.
    ///
    /// Default: `0.8`.
    pub memory_pressure_threshold: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            parallel_row_threshold: 10_000,
            memory_pressure_threshold: 0.8,
        }
    }
}

/// Low-level execution hints derived from configuration and auto-tuning.
///
/// Mutable only during the auto-tuning phase; frozen once the iteration
/// begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationHints {
    /// Rows per cache block in the blocked matvec.
    pub block_size: usize,
    /// Elements per unrolled group in the vector kernels.
    pub unroll_factor: usize,
    /// Advisory prefetch flag. The portable kernels ignore it; it is kept
    /// for parity with tuned configurations produced elsewhere.
    pub prefetch: bool,
    /// Row-chunk size for streaming matrices and chunked vector operations.
    pub stream_chunk_size: usize,
}

impl Default for OptimizationHints {
    fn default() -> Self {
        Self {
            block_size: 4,
            unroll_factor: 4,
            prefetch: false,
            stream_chunk_size: 1024,
        }
    }
}

impl OptimizationHints {
    /// Derive hints from a configuration.
    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            block_size: 4,
            unroll_factor: if config.performance.enable_vectorization {
                4
            } else {
                1
            },
            prefetch: false,
            stream_chunk_size: 1024,
        }
    }
}
