//! Matrix representations and format conversions.
//!
//! Provides the tagged [`Matrix`] type over dense row-major, COO, CSR, CSC,
//! and chunked streaming storage. Matrices are immutable after construction:
//! conversions produce new instances and never mutate in place.
//!
//! # CSR layout
//!
//! For a matrix with `m` rows and `nnz` non-zeros:
//! - `row_ptr` has length `m + 1`
//! - `col_indices` and `values` each have length `nnz`
//! - Row `i` spans indices `row_ptr[i]..row_ptr[i+1]`
//! - Column indices are sorted within each row (enables binary-search lookup)

use crate::config::OptimizationHints;
use crate::error::ShapeError;
use crate::streaming::StreamingMatrix;

// ---------------------------------------------------------------------------
// DenseMatrix
// ---------------------------------------------------------------------------

/// Dense row-major matrix.
#[derive(Debug, Clone)]
pub struct DenseMatrix {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Row-major values, length `rows * cols`.
    pub data: Vec<f64>,
}

impl DenseMatrix {
    /// Build from row-major data.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, ShapeError> {
        if data.len() != rows * cols {
            return Err(ShapeError::LengthMismatch(format!(
                "dense data length {} does not equal rows * cols = {}",
                data.len(),
                rows * cols,
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Entry accessor.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Convert to COO, dropping entries with magnitude `<= tolerance`.
    ///
    /// Traversal is row-major, so the resulting triples are already sorted
    /// by (row, col).
    pub fn to_coo(&self, tolerance: f64) -> CooMatrix {
        let mut row_indices = Vec::new();
        let mut col_indices = Vec::new();
        let mut values = Vec::new();

        for row in 0..self.rows {
            for col in 0..self.cols {
                let v = self.data[row * self.cols + col];
                if v.abs() > tolerance {
                    row_indices.push(row);
                    col_indices.push(col);
                    values.push(v);
                }
            }
        }

        CooMatrix {
            rows: self.rows,
            cols: self.cols,
            row_indices,
            col_indices,
            values,
        }
    }
}

// ---------------------------------------------------------------------------
// CooMatrix
// ---------------------------------------------------------------------------

/// Coordinate-format sparse matrix: parallel `(row, col, value)` arrays.
#[derive(Debug, Clone)]
pub struct CooMatrix {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Row index of each stored entry.
    pub row_indices: Vec<usize>,
    /// Column index of each stored entry.
    pub col_indices: Vec<usize>,
    /// Value of each stored entry.
    pub values: Vec<f64>,
}

impl CooMatrix {
    /// Build from `(row, col, value)` triples.
    pub fn from_triples(
        rows: usize,
        cols: usize,
        triples: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> Self {
        let mut row_indices = Vec::new();
        let mut col_indices = Vec::new();
        let mut values = Vec::new();
        for (r, c, v) in triples {
            row_indices.push(r);
            col_indices.push(c);
            values.push(v);
        }
        Self {
            rows,
            cols,
            row_indices,
            col_indices,
            values,
        }
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Expand to a dense row-major matrix. Duplicate positions accumulate.
    pub fn to_dense(&self) -> DenseMatrix {
        let mut data = vec![0.0f64; self.rows * self.cols];
        for i in 0..self.values.len() {
            data[self.row_indices[i] * self.cols + self.col_indices[i]] += self.values[i];
        }
        DenseMatrix {
            rows: self.rows,
            cols: self.cols,
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// CsrMatrix
// ---------------------------------------------------------------------------

/// Compressed Sparse Row matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    /// Row pointers: `row_ptr[i]` is the start index in `col_indices` /
    /// `values` for row `i`.
    pub row_ptr: Vec<usize>,
    /// Column indices for each non-zero entry, sorted within each row.
    pub col_indices: Vec<usize>,
    /// Values for each non-zero entry.
    pub values: Vec<f64>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl CsrMatrix {
    /// Build a CSR matrix from a COO matrix.
    ///
    /// Triples are sorted by (row, col), explicit zeros are skipped, and
    /// duplicate positions are summed. The resulting column indices are
    /// sorted within each row.
    pub fn from_coo(coo: &CooMatrix) -> Self {
        let mut sorted: Vec<(usize, usize, f64)> = (0..coo.nnz())
            .map(|i| (coo.row_indices[i], coo.col_indices[i], coo.values[i]))
            .filter(|&(_, _, v)| v != 0.0)
            .collect();
        sorted.sort_unstable_by_key(|&(r, c, _)| (r, c));

        // Merge duplicates in place: sorted order makes them adjacent.
        let mut merged: Vec<(usize, usize, f64)> = Vec::with_capacity(sorted.len());
        for (r, c, v) in sorted {
            match merged.last_mut() {
                Some(last) if last.0 == r && last.1 == c => last.2 += v,
                _ => merged.push((r, c, v)),
            }
        }

        let nnz = merged.len();
        let mut row_ptr = vec![0usize; coo.rows + 1];
        let mut col_indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        for &(r, _, _) in &merged {
            row_ptr[r + 1] += 1;
        }
        for i in 1..=coo.rows {
            row_ptr[i] += row_ptr[i - 1];
        }
        for (_, c, v) in merged {
            col_indices.push(c);
            values.push(v);
        }

        Self {
            row_ptr,
            col_indices,
            values,
            rows: coo.rows,
            cols: coo.cols,
        }
    }

    /// Build from `(row, col, value)` triples.
    pub fn from_triples(
        rows: usize,
        cols: usize,
        triples: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> Self {
        Self::from_coo(&CooMatrix::from_triples(rows, cols, triples))
    }

    /// Square identity matrix of dimension `n`.
    pub fn identity(n: usize) -> Self {
        Self {
            row_ptr: (0..=n).collect(),
            col_indices: (0..n).collect(),
            values: vec![1.0f64; n],
            rows: n,
            cols: n,
        }
    }

    /// Number of non-zero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Iterate over `(col_index, value)` pairs for the given row.
    #[inline]
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        self.col_indices[start..end]
            .iter()
            .copied()
            .zip(self.values[start..end].iter().copied())
    }

    /// Entry lookup via binary search on the sorted column indices of `row`.
    pub fn get_entry(&self, row: usize, col: usize) -> f64 {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        match self.col_indices[start..end].binary_search(&col) {
            Ok(pos) => self.values[start + pos],
            Err(_) => 0.0,
        }
    }

    /// Dot product of row `row` with `x`, 4-way unrolled.
    ///
    /// Each unrolled group accumulates left-to-right; groups are combined
    /// into the running sum in traversal order.
    #[inline]
    pub fn row_dot(&self, row: usize, x: &[f64]) -> f64 {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        let mut sum = 0.0f64;
        let mut idx = start;

        while idx + 4 <= end {
            let g = ((self.values[idx] * x[self.col_indices[idx]]
                + self.values[idx + 1] * x[self.col_indices[idx + 1]])
                + self.values[idx + 2] * x[self.col_indices[idx + 2]])
                + self.values[idx + 3] * x[self.col_indices[idx + 3]];
            sum += g;
            idx += 4;
        }
        while idx < end {
            sum += self.values[idx] * x[self.col_indices[idx]];
            idx += 1;
        }
        sum
    }

    /// Sparse matrix-vector multiply: `y = A * x`.
    #[inline]
    pub fn multiply_vector(&self, x: &[f64], y: &mut [f64]) {
        debug_assert!(x.len() >= self.cols);
        debug_assert!(y.len() >= self.rows);
        for i in 0..self.rows {
            y[i] = self.row_dot(i, x);
        }
    }

    /// Cache-blocked matvec: processes `block_size` rows per block.
    ///
    /// Numerically identical to [`multiply_vector`](Self::multiply_vector);
    /// blocking only changes the traversal grouping.
    pub fn multiply_vector_blocked(&self, x: &[f64], y: &mut [f64], block_size: usize) {
        debug_assert!(x.len() >= self.cols);
        debug_assert!(y.len() >= self.rows);
        let block = block_size.max(1);
        let mut block_start = 0;
        while block_start < self.rows {
            let block_end = (block_start + block).min(self.rows);
            for i in block_start..block_end {
                y[i] = self.row_dot(i, x);
            }
            block_start = block_end;
        }
    }

    /// Extract the diagonal as a dense vector. Missing entries are zero.
    pub fn diagonal(&self) -> Vec<f64> {
        let n = self.rows.min(self.cols);
        let mut d = vec![0.0f64; self.rows];
        for i in 0..n {
            d[i] = self.get_entry(i, i);
        }
        d
    }

    /// Expand to a dense row-major matrix.
    pub fn to_dense(&self) -> DenseMatrix {
        let mut data = vec![0.0f64; self.rows * self.cols];
        for row in 0..self.rows {
            for (col, v) in self.row_entries(row) {
                data[row * self.cols + col] = v;
            }
        }
        DenseMatrix {
            rows: self.rows,
            cols: self.cols,
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// CscMatrix
// ---------------------------------------------------------------------------

/// Compressed Sparse Column matrix.
#[derive(Debug, Clone)]
pub struct CscMatrix {
    /// Column pointers: `col_ptr[j]` is the start index in `row_indices` /
    /// `values` for column `j`.
    pub col_ptr: Vec<usize>,
    /// Row indices for each non-zero entry, sorted within each column.
    pub row_indices: Vec<usize>,
    /// Values for each non-zero entry.
    pub values: Vec<f64>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl CscMatrix {
    /// Build a CSC matrix from a CSR matrix.
    ///
    /// Re-derives triples by row iteration, re-sorts by (col, row), and
    /// rebuilds the column pointer array by cumulative counting.
    pub fn from_csr(csr: &CsrMatrix) -> Self {
        let nnz = csr.nnz();
        let mut col_ptr = vec![0usize; csr.cols + 1];
        for &c in &csr.col_indices {
            col_ptr[c + 1] += 1;
        }
        for j in 1..=csr.cols {
            col_ptr[j] += col_ptr[j - 1];
        }

        // Scatter pass: row-major CSR traversal visits each column's entries
        // in increasing row order, so row indices come out sorted per column.
        let mut row_indices = vec![0usize; nnz];
        let mut values = vec![0.0f64; nnz];
        let mut cursor = col_ptr.clone();
        for row in 0..csr.rows {
            for (col, v) in csr.row_entries(row) {
                let dest = cursor[col];
                row_indices[dest] = row;
                values[dest] = v;
                cursor[col] += 1;
            }
        }

        Self {
            col_ptr,
            row_indices,
            values,
            rows: csr.rows,
            cols: csr.cols,
        }
    }

    /// Number of non-zero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Entry lookup via binary search on the sorted row indices of `col`.
    pub fn get_entry(&self, row: usize, col: usize) -> f64 {
        let start = self.col_ptr[col];
        let end = self.col_ptr[col + 1];
        match self.row_indices[start..end].binary_search(&row) {
            Ok(pos) => self.values[start + pos],
            Err(_) => 0.0,
        }
    }

    /// Column-wise scatter-accumulate matvec, skipping zero input entries.
    pub fn multiply_vector(&self, x: &[f64], y: &mut [f64]) {
        debug_assert!(x.len() >= self.cols);
        debug_assert!(y.len() >= self.rows);
        y[..self.rows].fill(0.0);
        for (col, &xj) in x.iter().enumerate().take(self.cols) {
            if xj == 0.0 {
                continue;
            }
            let start = self.col_ptr[col];
            let end = self.col_ptr[col + 1];
            for idx in start..end {
                y[self.row_indices[idx]] += self.values[idx] * xj;
            }
        }
    }

    /// Expand to a dense row-major matrix.
    pub fn to_dense(&self) -> DenseMatrix {
        let mut data = vec![0.0f64; self.rows * self.cols];
        for col in 0..self.cols {
            let start = self.col_ptr[col];
            let end = self.col_ptr[col + 1];
            for idx in start..end {
                data[self.row_indices[idx] * self.cols + col] = self.values[idx];
            }
        }
        DenseMatrix {
            rows: self.rows,
            cols: self.cols,
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Matrix (tagged variant)
// ---------------------------------------------------------------------------

/// Tagged matrix representation.
///
/// All variants answer the same structural queries and implement the one hot
/// operation, [`multiply_vector`](Self::multiply_vector). Conversions produce
/// new instances; a `Matrix` is never mutated after construction.
#[derive(Debug)]
pub enum Matrix {
    /// Dense row-major storage.
    Dense(DenseMatrix),
    /// Coordinate triples.
    Coo(CooMatrix),
    /// Compressed sparse row.
    Csr(CsrMatrix),
    /// Compressed sparse column.
    Csc(CscMatrix),
    /// Chunked CSR with a bounded resident-chunk cache.
    Streaming(StreamingMatrix),
}

impl Matrix {
    /// Number of rows.
    pub fn rows(&self) -> usize {
        match self {
            Matrix::Dense(m) => m.rows,
            Matrix::Coo(m) => m.rows,
            Matrix::Csr(m) => m.rows,
            Matrix::Csc(m) => m.rows,
            Matrix::Streaming(m) => m.rows(),
        }
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        match self {
            Matrix::Dense(m) => m.cols,
            Matrix::Coo(m) => m.cols,
            Matrix::Csr(m) => m.cols,
            Matrix::Csc(m) => m.cols,
            Matrix::Streaming(m) => m.cols(),
        }
    }

    /// Number of stored entries (dense counts its non-zeros).
    pub fn nnz(&self) -> usize {
        match self {
            Matrix::Dense(m) => m.data.iter().filter(|v| **v != 0.0).count(),
            Matrix::Coo(m) => m.nnz(),
            Matrix::Csr(m) => m.nnz(),
            Matrix::Csc(m) => m.nnz(),
            Matrix::Streaming(m) => m.nnz(),
        }
    }

    /// Entry lookup. Absent sparse entries read as zero.
    pub fn get_entry(&self, row: usize, col: usize) -> f64 {
        match self {
            Matrix::Dense(m) => m.get(row, col),
            Matrix::Coo(m) => {
                let mut sum = 0.0;
                for i in 0..m.nnz() {
                    if m.row_indices[i] == row && m.col_indices[i] == col {
                        sum += m.values[i];
                    }
                }
                sum
            }
            Matrix::Csr(m) => m.get_entry(row, col),
            Matrix::Csc(m) => m.get_entry(row, col),
            Matrix::Streaming(m) => m.get_entry(row, col),
        }
    }

    /// Visit every stored entry as `(row, col, value)`.
    ///
    /// Dense matrices skip exact zeros so that all variants agree on what
    /// counts as a stored entry.
    pub fn for_each_entry(&self, mut f: impl FnMut(usize, usize, f64)) {
        match self {
            Matrix::Dense(m) => {
                for row in 0..m.rows {
                    for col in 0..m.cols {
                        let v = m.data[row * m.cols + col];
                        if v != 0.0 {
                            f(row, col, v);
                        }
                    }
                }
            }
            Matrix::Coo(m) => {
                for i in 0..m.nnz() {
                    f(m.row_indices[i], m.col_indices[i], m.values[i]);
                }
            }
            Matrix::Csr(m) => {
                for row in 0..m.rows {
                    for (col, v) in m.row_entries(row) {
                        f(row, col, v);
                    }
                }
            }
            Matrix::Csc(m) => {
                for col in 0..m.cols {
                    let start = m.col_ptr[col];
                    let end = m.col_ptr[col + 1];
                    for idx in start..end {
                        f(m.row_indices[idx], col, m.values[idx]);
                    }
                }
            }
            Matrix::Streaming(m) => m.for_each_entry(f),
        }
    }

    /// Pack into CSR. CSR input is cloned as-is.
    pub fn to_csr(&self) -> CsrMatrix {
        match self {
            Matrix::Csr(m) => m.clone(),
            other => {
                let mut triples = Vec::with_capacity(other.nnz());
                other.for_each_entry(|r, c, v| triples.push((r, c, v)));
                CsrMatrix::from_triples(other.rows(), other.cols(), triples)
            }
        }
    }

    /// Expand to dense row-major storage.
    pub fn to_dense(&self) -> DenseMatrix {
        match self {
            Matrix::Dense(m) => m.clone(),
            Matrix::Coo(m) => m.to_dense(),
            Matrix::Csr(m) => m.to_dense(),
            Matrix::Csc(m) => m.to_dense(),
            Matrix::Streaming(m) => m.to_csr().to_dense(),
        }
    }

    /// Matrix-vector multiply: `y = A * x`, dispatched per representation.
    ///
    /// CSR uses the cache-blocked traversal (`hints.block_size` rows per
    /// block); CSC scatter-accumulates and skips zero input entries;
    /// streaming dispatches chunk by chunk.
    pub fn multiply_vector(&self, x: &[f64], y: &mut [f64], hints: &OptimizationHints) {
        debug_assert!(x.len() >= self.cols());
        debug_assert!(y.len() >= self.rows());
        match self {
            Matrix::Dense(m) => {
                for row in 0..m.rows {
                    y[row] =
                        crate::simd::dot(&m.data[row * m.cols..(row + 1) * m.cols], &x[..m.cols]);
                }
            }
            Matrix::Coo(m) => {
                y[..m.rows].fill(0.0);
                for i in 0..m.nnz() {
                    y[m.row_indices[i]] += m.values[i] * x[m.col_indices[i]];
                }
            }
            Matrix::Csr(m) => m.multiply_vector_blocked(x, y, hints.block_size),
            Matrix::Csc(m) => m.multiply_vector(x, y),
            Matrix::Streaming(m) => m.multiply_vector(x, y),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate the structural integrity of a matrix.
///
/// Checks, per representation: parallel array lengths, pointer-array length
/// and monotonicity, index bounds, and value finiteness. Runs eagerly before
/// any computation so callers get clear diagnostics instead of mysterious
/// numerical failures.
pub fn validate(matrix: &Matrix) -> Result<(), ShapeError> {
    match matrix {
        Matrix::Dense(m) => {
            if m.data.len() != m.rows * m.cols {
                return Err(ShapeError::LengthMismatch(format!(
                    "dense data length {} does not equal rows * cols = {}",
                    m.data.len(),
                    m.rows * m.cols,
                )));
            }
            check_finite(&m.data)?;
        }
        Matrix::Coo(m) => {
            if m.row_indices.len() != m.values.len() || m.col_indices.len() != m.values.len() {
                return Err(ShapeError::LengthMismatch(format!(
                    "coo arrays disagree: rows={} cols={} values={}",
                    m.row_indices.len(),
                    m.col_indices.len(),
                    m.values.len(),
                )));
            }
            for i in 0..m.nnz() {
                if m.row_indices[i] >= m.rows {
                    return Err(ShapeError::IndexOutOfBounds {
                        index: m.row_indices[i],
                        bound: m.rows,
                        entry: i,
                    });
                }
                if m.col_indices[i] >= m.cols {
                    return Err(ShapeError::IndexOutOfBounds {
                        index: m.col_indices[i],
                        bound: m.cols,
                        entry: i,
                    });
                }
            }
            check_finite(&m.values)?;
        }
        Matrix::Csr(m) => {
            validate_pointers("row", &m.row_ptr, m.rows, m.values.len())?;
            if m.col_indices.len() != m.values.len() {
                return Err(ShapeError::LengthMismatch(format!(
                    "col_indices length {} does not match values length {}",
                    m.col_indices.len(),
                    m.values.len(),
                )));
            }
            for (i, &c) in m.col_indices.iter().enumerate() {
                if c >= m.cols {
                    return Err(ShapeError::IndexOutOfBounds {
                        index: c,
                        bound: m.cols,
                        entry: i,
                    });
                }
            }
            check_finite(&m.values)?;
        }
        Matrix::Csc(m) => {
            validate_pointers("column", &m.col_ptr, m.cols, m.values.len())?;
            if m.row_indices.len() != m.values.len() {
                return Err(ShapeError::LengthMismatch(format!(
                    "row_indices length {} does not match values length {}",
                    m.row_indices.len(),
                    m.values.len(),
                )));
            }
            for (i, &r) in m.row_indices.iter().enumerate() {
                if r >= m.rows {
                    return Err(ShapeError::IndexOutOfBounds {
                        index: r,
                        bound: m.rows,
                        entry: i,
                    });
                }
            }
            check_finite(&m.values)?;
        }
        Matrix::Streaming(m) => m.validate()?,
    }
    Ok(())
}

/// Check a pointer array: length `count + 1`, starts at zero, monotonically
/// non-decreasing, and terminates at `nnz`.
fn validate_pointers(
    axis: &'static str,
    ptr: &[usize],
    count: usize,
    nnz: usize,
) -> Result<(), ShapeError> {
    if ptr.len() != count + 1 {
        return Err(ShapeError::PointerLength {
            axis,
            got: ptr.len(),
            expected: count + 1,
        });
    }
    if ptr[0] != 0 {
        return Err(ShapeError::NonMonotonicPointers { axis, position: 0 });
    }
    for i in 1..ptr.len() {
        if ptr[i] < ptr[i - 1] {
            return Err(ShapeError::NonMonotonicPointers { axis, position: i });
        }
    }
    if ptr[count] != nnz {
        return Err(ShapeError::LengthMismatch(format!(
            "{axis} pointer terminates at {} but {} values are stored",
            ptr[count], nnz,
        )));
    }
    Ok(())
}

fn check_finite(values: &[f64]) -> Result<(), ShapeError> {
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            return Err(ShapeError::NonFiniteValue(format!("value[{i}] = {v}")));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_csr() -> CsrMatrix {
        // [2 0 1]   [1]   [5]
        // [0 3 0] * [2] = [6]
        // [1 0 4]   [3]   [13]
        CsrMatrix::from_triples(
            3,
            3,
            vec![(0, 0, 2.0), (0, 2, 1.0), (1, 1, 3.0), (2, 0, 1.0), (2, 2, 4.0)],
        )
    }

    #[test]
    fn csr_matvec() {
        let m = sample_csr();
        let mut y = vec![0.0; 3];
        m.multiply_vector(&[1.0, 2.0, 3.0], &mut y);
        assert_eq!(y, vec![5.0, 6.0, 13.0]);
    }

    #[test]
    fn blocked_matvec_matches_plain() {
        let m = sample_csr();
        let x = [1.0, 2.0, 3.0];
        let mut plain = vec![0.0; 3];
        let mut blocked = vec![0.0; 3];
        m.multiply_vector(&x, &mut plain);
        for block in [1, 2, 4, 16] {
            m.multiply_vector_blocked(&x, &mut blocked, block);
            assert_eq!(plain, blocked, "block={block}");
        }
    }

    #[test]
    fn from_coo_sorts_merges_and_drops_zeros() {
        let coo = CooMatrix::from_triples(
            2,
            2,
            vec![(1, 1, 4.0), (0, 1, 1.0), (0, 0, 0.0), (0, 1, 2.0)],
        );
        let csr = CsrMatrix::from_coo(&coo);
        assert_eq!(csr.nnz(), 2);
        assert_eq!(csr.get_entry(0, 0), 0.0);
        assert_eq!(csr.get_entry(0, 1), 3.0);
        assert_eq!(csr.get_entry(1, 1), 4.0);
        // Sorted columns within each row.
        for row in 0..csr.rows {
            let start = csr.row_ptr[row];
            let end = csr.row_ptr[row + 1];
            assert!(csr.col_indices[start..end].windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn csc_agrees_with_csr_on_every_entry() {
        let csr = sample_csr();
        let csc = CscMatrix::from_csr(&csr);
        for row in 0..3 {
            for col in 0..3 {
                assert_eq!(csr.get_entry(row, col), csc.get_entry(row, col));
            }
        }
    }

    #[test]
    fn csc_matvec_matches_csr() {
        let csr = sample_csr();
        let csc = CscMatrix::from_csr(&csr);
        let x = [1.0, 0.0, 3.0]; // zero entry exercises the skip path
        let mut y_csr = vec![0.0; 3];
        let mut y_csc = vec![0.0; 3];
        csr.multiply_vector(&x, &mut y_csr);
        csc.multiply_vector(&x, &mut y_csc);
        assert_eq!(y_csr, y_csc);
    }

    #[test]
    fn dense_round_trip() {
        let dense = DenseMatrix::new(2, 3, vec![1.0, 0.0, 2.0, 0.0, 3.0, 0.0]).unwrap();
        let coo = dense.to_coo(0.0);
        assert_eq!(coo.nnz(), 3);
        let back = coo.to_dense();
        assert_eq!(back.data, dense.data);
    }

    #[test]
    fn dense_to_coo_drops_small_entries() {
        let dense = DenseMatrix::new(1, 3, vec![1.0, 1e-12, -1e-12]).unwrap();
        let coo = dense.to_coo(1e-9);
        assert_eq!(coo.nnz(), 1);
        assert_eq!(coo.values, vec![1.0]);
    }

    #[test]
    fn validate_rejects_non_monotonic_row_ptr() {
        let mut csr = sample_csr();
        csr.row_ptr[1] = 5;
        csr.row_ptr[2] = 2;
        let err = validate(&Matrix::Csr(csr)).unwrap_err();
        assert!(matches!(err, ShapeError::NonMonotonicPointers { .. }));
    }

    #[test]
    fn validate_rejects_wrong_pointer_length() {
        let csr = CsrMatrix {
            row_ptr: vec![0, 1],
            col_indices: vec![0],
            values: vec![1.0],
            rows: 3,
            cols: 3,
        };
        let err = validate(&Matrix::Csr(csr)).unwrap_err();
        assert!(matches!(err, ShapeError::PointerLength { .. }));
    }

    #[test]
    fn validate_rejects_length_mismatch() {
        let coo = CooMatrix {
            rows: 2,
            cols: 2,
            row_indices: vec![0, 1],
            col_indices: vec![0],
            values: vec![1.0, 2.0],
        };
        let err = validate(&Matrix::Coo(coo)).unwrap_err();
        assert!(matches!(err, ShapeError::LengthMismatch(_)));
    }

    #[test]
    fn validate_rejects_nan() {
        let mut csr = sample_csr();
        csr.values[0] = f64::NAN;
        let err = validate(&Matrix::Csr(csr)).unwrap_err();
        assert!(matches!(err, ShapeError::NonFiniteValue(_)));
    }

    #[test]
    fn identity_diagonal() {
        let m = CsrMatrix::identity(4);
        assert_eq!(m.diagonal(), vec![1.0; 4]);
        assert_eq!(m.nnz(), 4);
    }
}
