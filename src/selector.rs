//! Adaptive execution-strategy selection.
//!
//! The selector inspects matrix size, sparsity, and the current memory
//! pressure to pick one of the four Neumann execution strategies. Selection
//! is a pure function of its three inputs, with no randomness, so solves are
//! reproducible for a fixed configuration and memory state.
//!
//! # Decision tree
//!
//! | Condition | Strategy |
//! |-----------|----------|
//! | pressure > `memory_pressure_threshold` | `streaming-neumann` |
//! | rows > `parallel_row_threshold` and parallelism enabled | `parallel-neumann` |
//! | working set > `streaming_threshold` bytes and blocking enabled | `blocked-neumann` |
//! | otherwise | `vectorized-neumann` |

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SolverConfig;

/// Execution strategy for the Neumann iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStrategy {
    /// Plain unrolled matvec; default for systems comfortably within memory.
    Vectorized,
    /// Cache-blocked matvec; same algorithm, blocked traversal.
    Blocked,
    /// Chunk-streamed matvec with bounded resident chunks.
    Streaming,
    /// Row-partitioned matvec fanned out across worker tasks.
    Parallel,
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStrategy::Vectorized => write!(f, "vectorized-neumann"),
            ExecutionStrategy::Blocked => write!(f, "blocked-neumann"),
            ExecutionStrategy::Streaming => write!(f, "streaming-neumann"),
            ExecutionStrategy::Parallel => write!(f, "parallel-neumann"),
        }
    }
}

/// Stateless strategy selector.
#[derive(Debug, Clone)]
pub struct StrategySelector {
    config: SolverConfig,
}

impl StrategySelector {
    /// Create a selector bound to a configuration.
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Estimated packed working set in bytes: CSR storage plus the four
    /// iteration vectors.
    pub fn working_set_bytes(rows: usize, nnz: usize) -> usize {
        let csr = nnz * (std::mem::size_of::<f64>() + std::mem::size_of::<usize>())
            + (rows + 1) * std::mem::size_of::<usize>();
        let vectors = 4 * rows * std::mem::size_of::<f64>();
        csr + vectors
    }

    /// Select the strategy for a system of `rows` rows and `nnz` stored
    /// entries under the given memory pressure.
    pub fn select(&self, rows: usize, nnz: usize, pressure: f64) -> ExecutionStrategy {
        let adaptive = &self.config.adaptive;
        let performance = &self.config.performance;

        if pressure > adaptive.memory_pressure_threshold {
            debug!(
                pressure,
                threshold = adaptive.memory_pressure_threshold,
                "selecting streaming (memory pressure)"
            );
            return ExecutionStrategy::Streaming;
        }

        if performance.enable_parallel && rows > adaptive.parallel_row_threshold {
            debug!(
                rows,
                threshold = adaptive.parallel_row_threshold,
                "selecting parallel (row count)"
            );
            return ExecutionStrategy::Parallel;
        }

        let working_set = Self::working_set_bytes(rows, nnz);
        if performance.enable_blocking && working_set > self.config.memory.streaming_threshold {
            debug!(
                working_set,
                threshold = self.config.memory.streaming_threshold,
                "selecting blocked (working set)"
            );
            return ExecutionStrategy::Blocked;
        }

        debug!(rows, nnz, "selecting vectorized (default)");
        ExecutionStrategy::Vectorized
    }
}
