//! Chunked streaming matrix for systems too large to hold fully packed.
//!
//! [`StreamingMatrix`] partitions rows into fixed-size chunks and builds one
//! CSR sub-matrix per chunk lazily. At most `max_cached_chunks` chunks are
//! resident at once; the least-recently-accessed chunk is evicted first and
//! rebuilt from the retained coordinate source on the next access, trading
//! recomputation cost for bounded memory.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::ShapeError;
use crate::types::{CsrMatrix, Matrix};

/// Chunked CSR matrix with a bounded resident-chunk cache.
///
/// The coordinate source stays resident (sorted by row, so each chunk's
/// triples form a contiguous slice); only the packed per-chunk CSR
/// sub-matrices are cached and evicted. The cache lives behind a `RefCell`
/// so chunk materialisation works through a shared reference, keeping the
/// public matrix API immutable.
#[derive(Debug)]
pub struct StreamingMatrix {
    rows: usize,
    cols: usize,
    chunk_size: usize,
    max_cached_chunks: usize,

    // Source triples sorted by (row, col).
    src_rows: Vec<usize>,
    src_cols: Vec<usize>,
    src_vals: Vec<f64>,
    // Triple-index boundary of each chunk; length `num_chunks + 1`.
    chunk_ptr: Vec<usize>,

    cache: RefCell<HashMap<usize, CachedChunk>>,
    clock: Cell<u64>,
    builds: Cell<u64>,
    hits: Cell<u64>,
}

#[derive(Debug)]
struct CachedChunk {
    csr: CsrMatrix,
    last_access: u64,
}

impl StreamingMatrix {
    /// Partition `matrix` into row chunks of `chunk_size`, retaining at most
    /// `max_cached_chunks` packed chunks at a time.
    pub fn from_matrix(matrix: &Matrix, chunk_size: usize, max_cached_chunks: usize) -> Self {
        let rows = matrix.rows();
        let cols = matrix.cols();
        let chunk_size = chunk_size.max(1);

        let mut triples: Vec<(usize, usize, f64)> = Vec::with_capacity(matrix.nnz());
        matrix.for_each_entry(|r, c, v| triples.push((r, c, v)));
        triples.sort_unstable_by_key(|&(r, c, _)| (r, c));

        let num_chunks = rows.div_ceil(chunk_size);
        let mut chunk_ptr = vec![0usize; num_chunks + 1];
        {
            let mut cursor = 0;
            for chunk in 0..num_chunks {
                let row_end = ((chunk + 1) * chunk_size).min(rows);
                while cursor < triples.len() && triples[cursor].0 < row_end {
                    cursor += 1;
                }
                chunk_ptr[chunk + 1] = cursor;
            }
        }

        let mut src_rows = Vec::with_capacity(triples.len());
        let mut src_cols = Vec::with_capacity(triples.len());
        let mut src_vals = Vec::with_capacity(triples.len());
        for (r, c, v) in triples {
            src_rows.push(r);
            src_cols.push(c);
            src_vals.push(v);
        }

        Self {
            rows,
            cols,
            chunk_size,
            max_cached_chunks: max_cached_chunks.max(1),
            src_rows,
            src_cols,
            src_vals,
            chunk_ptr,
            cache: RefCell::new(HashMap::new()),
            clock: Cell::new(0),
            builds: Cell::new(0),
            hits: Cell::new(0),
        }
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries in the coordinate source.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.src_vals.len()
    }

    /// Rows per chunk.
    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of row chunks.
    #[inline]
    pub fn num_chunks(&self) -> usize {
        self.chunk_ptr.len() - 1
    }

    /// Number of chunks currently resident.
    pub fn cached_chunks(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Chunk builds performed so far (including rebuilds after eviction).
    pub fn chunk_builds(&self) -> u64 {
        self.builds.get()
    }

    /// Chunk cache hits so far.
    pub fn chunk_hits(&self) -> u64 {
        self.hits.get()
    }

    /// Entry lookup against the coordinate source.
    pub fn get_entry(&self, row: usize, col: usize) -> f64 {
        let start = self.src_rows.partition_point(|&r| r < row);
        let mut sum = 0.0;
        for i in start..self.src_rows.len() {
            if self.src_rows[i] != row {
                break;
            }
            if self.src_cols[i] == col {
                sum += self.src_vals[i];
            }
        }
        sum
    }

    /// Visit every stored entry as `(row, col, value)`.
    pub fn for_each_entry(&self, mut f: impl FnMut(usize, usize, f64)) {
        for i in 0..self.src_vals.len() {
            f(self.src_rows[i], self.src_cols[i], self.src_vals[i]);
        }
    }

    /// Pack the whole source into one CSR matrix.
    pub fn to_csr(&self) -> CsrMatrix {
        let triples: Vec<(usize, usize, f64)> = (0..self.src_vals.len())
            .map(|i| (self.src_rows[i], self.src_cols[i], self.src_vals[i]))
            .collect();
        CsrMatrix::from_triples(self.rows, self.cols, triples)
    }

    /// Diagonal of the logical matrix. Missing entries are zero.
    pub fn diagonal(&self) -> Vec<f64> {
        let n = self.rows.min(self.cols);
        let mut d = vec![0.0f64; self.rows];
        for i in 0..self.src_vals.len() {
            let r = self.src_rows[i];
            if r < n && self.src_cols[i] == r {
                d[r] += self.src_vals[i];
            }
        }
        d
    }

    /// Matrix-vector multiply dispatched chunk by chunk.
    ///
    /// Each chunk writes its partial result at the chunk's row offset;
    /// chunks over the retention budget are evicted after use.
    pub fn multiply_vector(&self, x: &[f64], y: &mut [f64]) {
        debug_assert!(x.len() >= self.cols);
        debug_assert!(y.len() >= self.rows);
        for chunk in 0..self.num_chunks() {
            let row_offset = chunk * self.chunk_size;
            let row_end = (row_offset + self.chunk_size).min(self.rows);
            self.with_chunk(chunk, |csr| {
                csr.multiply_vector(x, &mut y[row_offset..row_end]);
            });
        }
    }

    /// Validate the source structure.
    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.src_rows.len() != self.src_vals.len() || self.src_cols.len() != self.src_vals.len()
        {
            return Err(ShapeError::LengthMismatch(format!(
                "streaming source arrays disagree: rows={} cols={} values={}",
                self.src_rows.len(),
                self.src_cols.len(),
                self.src_vals.len(),
            )));
        }
        for i in 1..self.chunk_ptr.len() {
            if self.chunk_ptr[i] < self.chunk_ptr[i - 1] {
                return Err(ShapeError::NonMonotonicPointers {
                    axis: "chunk",
                    position: i,
                });
            }
        }
        for (i, (&r, &c)) in self.src_rows.iter().zip(self.src_cols.iter()).enumerate() {
            if r >= self.rows {
                return Err(ShapeError::IndexOutOfBounds {
                    index: r,
                    bound: self.rows,
                    entry: i,
                });
            }
            if c >= self.cols {
                return Err(ShapeError::IndexOutOfBounds {
                    index: c,
                    bound: self.cols,
                    entry: i,
                });
            }
        }
        for (i, &v) in self.src_vals.iter().enumerate() {
            if !v.is_finite() {
                return Err(ShapeError::NonFiniteValue(format!("value[{i}] = {v}")));
            }
        }
        Ok(())
    }

    /// Run `f` against the packed CSR of chunk `idx`, materialising and
    /// evicting as needed.
    fn with_chunk<R>(&self, idx: usize, f: impl FnOnce(&CsrMatrix) -> R) -> R {
        let tick = self.clock.get() + 1;
        self.clock.set(tick);

        let mut cache = self.cache.borrow_mut();
        if cache.contains_key(&idx) {
            self.hits.set(self.hits.get() + 1);
        } else {
            let csr = self.build_chunk(idx);
            cache.insert(
                idx,
                CachedChunk {
                    csr,
                    last_access: tick,
                },
            );
            self.builds.set(self.builds.get() + 1);
            trace!(chunk = idx, "materialised streaming chunk");
        }
        if let Some(entry) = cache.get_mut(&idx) {
            entry.last_access = tick;
        }

        // Evict least-recently-accessed chunks above the retention budget,
        // never the chunk currently in use.
        while cache.len() > self.max_cached_chunks {
            let victim = cache
                .iter()
                .filter(|(k, _)| **k != idx)
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(k, _)| *k);
            match victim {
                Some(v) => {
                    cache.remove(&v);
                    debug!(chunk = v, "evicted streaming chunk");
                }
                None => break,
            }
        }

        match cache.get(&idx) {
            Some(entry) => f(&entry.csr),
            // Unreachable: the chunk was inserted above and never evicted.
            None => f(&self.build_chunk(idx)),
        }
    }

    /// Pack chunk `idx` from the coordinate source into a local CSR whose
    /// row 0 corresponds to logical row `idx * chunk_size`.
    fn build_chunk(&self, idx: usize) -> CsrMatrix {
        let row_offset = idx * self.chunk_size;
        let row_end = (row_offset + self.chunk_size).min(self.rows);
        let chunk_rows = row_end - row_offset;
        let start = self.chunk_ptr[idx];
        let end = self.chunk_ptr[idx + 1];

        let triples = (start..end)
            .map(|i| (self.src_rows[i] - row_offset, self.src_cols[i], self.src_vals[i]));
        CsrMatrix::from_triples(chunk_rows, self.cols, triples)
    }
}
