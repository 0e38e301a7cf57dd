//! Auto-tuning via micro-benchmarks.
//!
//! The tuner times the blocked matvec and the hinted dot product over the
//! *actual* solve input at several candidate block sizes and unroll factors,
//! then picks the combination minimising wall-clock time subject to a memory
//! ceiling. Tuning is advisory only: the solver functions correctly with the
//! default hints when tuning is disabled.

use std::hint::black_box;
use std::time::Instant;

use tracing::debug;

use crate::config::OptimizationHints;
use crate::types::CsrMatrix;

/// Candidate rows-per-block values.
pub const BLOCK_CANDIDATES: [usize; 4] = [2, 4, 8, 16];

/// Candidate unroll factors.
pub const UNROLL_CANDIDATES: [usize; 3] = [2, 4, 8];

/// Micro-benchmark driver.
#[derive(Debug, Clone)]
pub struct AutoTuner {
    /// Timed repetitions per candidate.
    pub repetitions: usize,
    /// Candidates whose scratch requirement exceeds this ceiling are skipped.
    pub memory_ceiling: usize,
}

impl Default for AutoTuner {
    fn default() -> Self {
        Self {
            repetitions: 3,
            memory_ceiling: 256 * 1024 * 1024,
        }
    }
}

impl AutoTuner {
    /// Benchmark the kernels over `csr` and `rhs`, returning tuned hints.
    ///
    /// Falls back to `base` unchanged when the system is empty or every
    /// candidate exceeds the memory ceiling.
    pub fn tune(&self, csr: &CsrMatrix, rhs: &[f64], base: &OptimizationHints) -> OptimizationHints {
        let n = csr.rows;
        if n == 0 || rhs.len() < csr.cols {
            return base.clone();
        }

        // Scratch for one matvec output; identical for all candidates, but
        // checked against the ceiling so tuning never overcommits memory.
        let scratch_bytes = n * std::mem::size_of::<f64>();
        if scratch_bytes > self.memory_ceiling {
            debug!(scratch_bytes, ceiling = self.memory_ceiling, "auto-tuning skipped");
            return base.clone();
        }

        let mut y = vec![0.0f64; n];
        let reps = self.repetitions.max(1);

        let mut best_time = f64::INFINITY;
        let mut best = (base.block_size, base.unroll_factor);

        for &block in &BLOCK_CANDIDATES {
            for &unroll in &UNROLL_CANDIDATES {
                let start = Instant::now();
                for _ in 0..reps {
                    csr.multiply_vector_blocked(black_box(rhs), &mut y, block);
                    black_box(crate::simd::dot_hinted(&y, rhs, unroll));
                }
                let elapsed = start.elapsed().as_secs_f64();
                if elapsed < best_time {
                    best_time = elapsed;
                    best = (block, unroll);
                }
            }
        }

        debug!(
            block_size = best.0,
            unroll_factor = best.1,
            "auto-tuning selected kernel parameters"
        );

        OptimizationHints {
            block_size: best.0,
            unroll_factor: best.1,
            ..base.clone()
        }
    }
}
