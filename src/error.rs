//! Error types for the solver crate.
//!
//! Structural problems (malformed matrices, mismatched dimensions) and an
//! unusable diagonal are the only hard failures; they are surfaced to the
//! caller before any iteration begins. Numerical non-convergence is *not* an
//! error; it is reported through [`SolveResult::converged`].
//!
//! [`SolveResult::converged`]: crate::session::SolveResult

/// Primary error type for solver operations.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// The input matrix or vector is structurally malformed.
    #[error("invalid shape: {0}")]
    Shape(#[from] ShapeError),

    /// A diagonal entry is too small to be used as a divisor.
    ///
    /// The Neumann splitting `A = D - R` requires every `|d_ii|` to be
    /// invertible; this is checked before the first iteration.
    #[error("diagonal entry at row {row} is unusable as a divisor ({value:.3e})")]
    SingularDiagonal {
        /// Row of the offending diagonal entry.
        row: usize,
        /// The entry's value (zero when the entry is absent entirely).
        value: f64,
    },
}

/// Structural validation errors for matrices and vectors.
///
/// These are raised eagerly before any computation begins so that callers get
/// clear diagnostics rather than mysterious numerical failures.
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    /// Parallel index/value arrays of a sparse format disagree in length.
    #[error("array length mismatch: {0}")]
    LengthMismatch(String),

    /// Matrix and vector dimensions are inconsistent.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A row/column pointer array has the wrong length.
    #[error("{axis} pointer array has length {got} (expected {expected})")]
    PointerLength {
        /// Which pointer array ("row" or "column").
        axis: &'static str,
        /// Observed length.
        got: usize,
        /// Required length (`rows + 1` or `cols + 1`).
        expected: usize,
    },

    /// A row/column pointer array is not monotonically non-decreasing.
    #[error("{axis} pointer array is not monotonically non-decreasing at position {position}")]
    NonMonotonicPointers {
        /// Which pointer array ("row" or "column").
        axis: &'static str,
        /// First position at which the array decreases.
        position: usize,
    },

    /// A stored index exceeds the declared matrix dimensions.
    #[error("index {index} out of bounds for dimension {bound} (entry {entry})")]
    IndexOutOfBounds {
        /// Offending index value.
        index: usize,
        /// Dimension it must stay below.
        bound: usize,
        /// Position of the offending entry in the storage arrays.
        entry: usize,
    },

    /// A value is NaN or infinite where a finite number is required.
    #[error("non-finite value detected: {0}")]
    NonFiniteValue(String),
}
