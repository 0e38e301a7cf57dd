//! Memory-efficient Neumann-series solver for sparse linear systems.
//!
//! This crate solves `Ax = b` for large, sparse, diagonally dominant
//! matrices by iterating the Neumann series under the splitting `A = D - R`,
//! selecting between vectorized, cache-blocked, chunk-streamed, and
//! parallel-worker execution depending on matrix size and memory pressure.
//!
//! # Components
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`types`] | Dense / COO / CSR / CSC representations and conversions |
//! | [`streaming`] | Chunked CSR with a bounded resident-chunk cache |
//! | [`analysis`] | Diagonal dominance, symmetry, sparsity |
//! | [`pool`] | Buffer pool, memory manager, operation profiling |
//! | [`simd`] | Unrolled vector kernels (optional AVX2 path) |
//! | [`selector`] | Deterministic execution-strategy selection |
//! | [`neumann`] | The series iteration itself |
//! | [`autotune`] | Kernel-parameter micro-benchmarks |
//! | [`session`] | The `solve` / `cleanup` / `run_benchmark` facade |
//!
//! # Example
//!
//! ```rust
//! use neusolve::{Matrix, SolverConfig, SolverSession};
//! use neusolve::types::CsrMatrix;
//!
//! // Diagonally dominant 3x3 system.
//! let matrix = Matrix::Csr(CsrMatrix::from_triples(3, 3, vec![
//!     (0, 0, 4.0), (0, 1, 1.0),
//!     (1, 0, 1.0), (1, 1, 4.0), (1, 2, 1.0),
//!     (2, 1, 1.0), (2, 2, 4.0),
//! ]));
//! let rhs = vec![1.0, 2.0, 3.0];
//!
//! let session = SolverSession::new();
//! let result = session.solve(&matrix, &rhs, &SolverConfig::default()).unwrap();
//!
//! assert!(result.converged);
//! assert!(result.residual_norm < 1e-6);
//! session.cleanup();
//! ```
//!
//! # Failure semantics
//!
//! Malformed inputs ([`ShapeError`]) and an unusable diagonal
//! ([`SolverError::SingularDiagonal`]) are hard errors surfaced before any
//! iteration. Numerical non-convergence is a soft failure: the result is
//! returned with [`SolveResult::converged`]` == false` alongside the best
//! achieved residual, so callers can retry with a different configuration.

pub mod analysis;
pub mod autotune;
pub mod config;
pub mod error;
pub mod neumann;
pub mod pool;
pub mod selector;
pub mod session;
pub mod simd;
pub mod streaming;
pub mod types;

pub use config::{OptimizationHints, SolverConfig};
pub use error::{ShapeError, SolverError};
pub use selector::ExecutionStrategy;
pub use session::{BenchmarkReport, SolveResult, SolverSession};
pub use types::Matrix;
