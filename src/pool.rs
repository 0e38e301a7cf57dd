//! Memory pool and memory profiling.
//!
//! [`VectorPool`] keeps released scratch vectors keyed by exact length so
//! hot solver loops can reuse buffers instead of allocating. Buffers are
//! zero-filled when released, which prevents stale data from leaking across
//! unrelated uses, and each size bucket is capped so the pool's total
//! footprint stays bounded: excess released buffers are simply dropped.
//!
//! [`MemoryManager`] tracks current and peak byte usage and wraps operations
//! in [`profile_operation`](MemoryManager::profile_operation) so
//! recommendations can be derived from measured behaviour rather than static
//! heuristics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Maximum buffers retained per size bucket. Excess releases are discarded.
pub const MAX_POOLED_PER_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// VectorPool
// ---------------------------------------------------------------------------

/// Reusable buffer pool keyed by exact buffer length.
///
/// `acquire` hands out a zeroed buffer of exactly the requested length,
/// reusing a released one when available. The returned [`PooledVector`]
/// gives the buffer back on drop, including early-error paths, so
/// acquisition and release are always paired.
#[derive(Debug, Default)]
pub struct VectorPool {
    buckets: Mutex<HashMap<usize, Vec<Vec<f64>>>>,
    requests: AtomicU64,
    hits: AtomicU64,
    discarded: AtomicU64,
    pooled_bytes: AtomicUsize,
}

impl VectorPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtain a zeroed buffer of exactly `len` elements.
    ///
    /// Falls back to a fresh allocation when the bucket is empty; pool
    /// exhaustion is never an error.
    pub fn acquire(&self, len: usize) -> PooledVector<'_> {
        self.requests.fetch_add(1, Ordering::Relaxed);

        let reused = {
            let mut buckets = self.buckets.lock();
            buckets.get_mut(&len).and_then(Vec::pop)
        };

        let buf = match reused {
            Some(buf) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.pooled_bytes
                    .fetch_sub(len * std::mem::size_of::<f64>(), Ordering::Relaxed);
                buf
            }
            None => vec![0.0f64; len],
        };

        PooledVector {
            buf: Some(buf),
            pool: self,
        }
    }

    /// Return a buffer to its size bucket, zero-filling it first.
    fn release(&self, mut buf: Vec<f64>) {
        buf.fill(0.0);
        let len = buf.len();
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(len).or_default();
        if bucket.len() < MAX_POOLED_PER_SIZE {
            bucket.push(buf);
            self.pooled_bytes
                .fetch_add(len * std::mem::size_of::<f64>(), Ordering::Relaxed);
        } else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            trace!(len, "pool bucket full, discarding released buffer");
        }
    }

    /// Drop every retained buffer.
    pub fn clear(&self) {
        self.buckets.lock().clear();
        self.pooled_bytes.store(0, Ordering::Relaxed);
    }

    /// Bytes currently retained by the pool.
    pub fn pooled_bytes(&self) -> usize {
        self.pooled_bytes.load(Ordering::Relaxed)
    }

    /// Counters snapshot.
    pub fn stats(&self) -> PoolStats {
        let requests = self.requests.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        PoolStats {
            requests,
            hits,
            hit_rate: if requests > 0 {
                hits as f64 / requests as f64
            } else {
                0.0
            },
            discarded: self.discarded.load(Ordering::Relaxed),
            pooled_bytes: self.pooled_bytes(),
        }
    }
}

/// Pool usage counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolStats {
    /// Total `acquire` calls.
    pub requests: u64,
    /// Acquisitions served from the pool.
    pub hits: u64,
    /// `hits / requests`, zero before the first request.
    pub hit_rate: f64,
    /// Buffers dropped because their bucket was full.
    pub discarded: u64,
    /// Bytes currently retained.
    pub pooled_bytes: usize,
}

/// RAII handle for a pooled buffer.
///
/// Dereferences to `[f64]`. Dropping the handle returns the buffer to the
/// pool; [`detach`](Self::detach) takes ownership instead (used for the
/// solution vector, which outlives the solve).
pub struct PooledVector<'a> {
    buf: Option<Vec<f64>>,
    pool: &'a VectorPool,
}

impl PooledVector<'_> {
    /// Take ownership of the buffer; it will not be returned to the pool.
    pub fn detach(mut self) -> Vec<f64> {
        self.buf.take().unwrap_or_default()
    }
}

impl Drop for PooledVector<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

impl std::ops::Deref for PooledVector<'_> {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl std::ops::DerefMut for PooledVector<'_> {
    fn deref_mut(&mut self) -> &mut [f64] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

// ---------------------------------------------------------------------------
// MemoryManager
// ---------------------------------------------------------------------------

/// Tracks current and peak byte usage across a solver session.
///
/// `reserve`/`release` account transient working sets;
/// [`set_resident`](Self::set_resident) records bytes retained between
/// solves (pooled buffers). The pressure ratio `current / peak` feeds the
/// adaptive strategy selector.
#[derive(Debug, Default)]
pub struct MemoryManager {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl MemoryManager {
    /// Create a manager with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account `bytes` of additional usage.
    pub fn reserve(&self, bytes: usize) {
        let now = self.current.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak.fetch_max(now, Ordering::Relaxed);
    }

    /// Release previously reserved bytes (saturating).
    pub fn release(&self, bytes: usize) {
        let _ = self
            .current
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some(c.saturating_sub(bytes))
            });
    }

    /// Record the bytes resident between operations (e.g. pooled buffers).
    pub fn set_resident(&self, bytes: usize) {
        self.current.store(bytes, Ordering::Relaxed);
        self.peak.fetch_max(bytes, Ordering::Relaxed);
    }

    /// Current tracked usage in bytes.
    pub fn current_bytes(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    /// High-water mark in bytes.
    pub fn peak_bytes(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    /// Memory pressure: `current / peak`, zero before anything was tracked.
    pub fn pressure(&self) -> f64 {
        let peak = self.peak_bytes();
        if peak == 0 {
            0.0
        } else {
            self.current_bytes() as f64 / peak as f64
        }
    }

    /// Reset both counters.
    pub fn reset(&self) {
        self.current.store(0, Ordering::Relaxed);
        self.peak.store(0, Ordering::Relaxed);
    }

    /// Run `op`, measuring memory before/after/peak, wall-clock duration,
    /// and the pool hit rate observed during the operation.
    pub fn profile_operation<T>(
        &self,
        label: &str,
        pool: &VectorPool,
        op: impl FnOnce() -> T,
    ) -> (T, MemoryProfile) {
        let bytes_before = self.current_bytes();
        let stats_before = pool.stats();
        let start = Instant::now();

        let out = op();

        let duration = start.elapsed();
        let stats_after = pool.stats();
        let delta_requests = stats_after.requests - stats_before.requests;
        let delta_hits = stats_after.hits - stats_before.hits;

        let profile = MemoryProfile {
            label: label.to_string(),
            bytes_before,
            bytes_after: self.current_bytes(),
            peak_bytes: self.peak_bytes(),
            duration,
            cache_hit_rate: if delta_requests > 0 {
                delta_hits as f64 / delta_requests as f64
            } else {
                0.0
            },
        };

        (out, profile)
    }
}

/// Measured memory behaviour of one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryProfile {
    /// Operation label.
    pub label: String,
    /// Tracked bytes when the operation began.
    pub bytes_before: usize,
    /// Tracked bytes when the operation finished.
    pub bytes_after: usize,
    /// Session high-water mark at completion.
    pub peak_bytes: usize,
    /// Wall-clock duration.
    pub duration: Duration,
    /// Pool hit rate observed during the operation (an estimate of cache
    /// friendliness; zero when the pool was not used).
    pub cache_hit_rate: f64,
}
