//! # larder-bench: Performance benchmarks for Larder
//!
//! Shared fixtures and latency statistics for the benchmarks under
//! `benches/`.
//!
//! ## Benchmarks
//!
//! - **cache**: write, read and compaction through [`larder::Cache`]
//! - **primitives**: CRC32 and the zstd codec in isolation
//! - **`write_latency`**: submit-to-completion percentiles on the worker pool
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p larder-bench
//!
//! # Run specific benchmark
//! cargo bench -p larder-bench --bench cache
//!
//! # Save baseline for comparison
//! cargo bench -p larder-bench --bench cache -- --save-baseline main
//! ```

// Latency stats use f64 for percentile calculations
#![allow(clippy::cast_precision_loss)]

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use hdrhistogram::Histogram;
use larder::{
    Cache, CacheOptions, InlineScheduler, PoolScheduler, RecordDescriptor, Segment, WriteRequest,
};
use tempfile::TempDir;

/// Payload sizes shared by the byte-throughput benchmarks.
pub const PAYLOAD_SIZES: [usize; 5] = [64, 1024, 4096, 16_384, 65_536];

/// Compressible payload resembling serialized asset data.
pub fn payload(len: usize) -> Vec<u8> {
    b"glyph:0041 advance=12 bearing=(1,9) "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

/// A cache in a temporary directory with one registered segment.
///
/// The directory is removed when the fixture is dropped.
pub struct Fixture {
    pub cache: Cache,
    pub segment: Arc<Segment>,
    _dir: TempDir,
}

impl Fixture {
    /// Writes run on the calling thread.
    pub fn inline(options: impl FnOnce(CacheOptions) -> CacheOptions) -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create bench directory")?;
        let cache = Cache::new(options(CacheOptions::new(dir.path())), Arc::new(InlineScheduler));
        Self::with_cache(cache, dir)
    }

    /// Writes run on a pool of `threads` workers.
    pub fn pooled(threads: usize) -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create bench directory")?;
        let scheduler = PoolScheduler::new(threads)?;
        let cache = Cache::new(CacheOptions::new(dir.path()), Arc::new(scheduler));
        Self::with_cache(cache, dir)
    }

    fn with_cache(cache: Cache, dir: TempDir) -> Result<Self> {
        let group = cache.group("bench")?;
        let segment = cache.register(&group);
        Ok(Self {
            cache,
            segment,
            _dir: dir,
        })
    }

    /// Writes `count` copies of `data` and returns their descriptors.
    pub fn fill(&self, data: &[u8], count: usize) -> Result<Vec<RecordDescriptor>> {
        (0..count)
            .map(|_| {
                self.cache
                    .write(&self.segment, data.to_vec())
                    .context("fill write failed")
            })
            .collect()
    }

    /// Submits `count` writes of `data` at once and records each one's
    /// submit-to-completion latency.
    pub fn measure_queued_writes(&self, data: &[u8], count: usize) -> Result<LatencyTracker> {
        let mut tracker = LatencyTracker::new();
        let tickets: Vec<_> = (0..count)
            .map(|_| {
                let data = data.to_vec();
                let started = Instant::now();
                let ticket = self.cache.submit_write(
                    WriteRequest::new(Arc::clone(&self.segment))
                        .serialize(move |buf| buf.extend_from_slice(&data)),
                );
                (started, ticket)
            })
            .collect();

        for (started, ticket) in tickets {
            ticket.wait()?;
            tracker.record(started.elapsed().as_nanos() as u64);
        }
        Ok(tracker)
    }
}

/// Tracks latency percentiles for operations.
#[derive(Debug)]
pub struct LatencyTracker {
    histogram: Histogram<u64>,
}

impl LatencyTracker {
    /// Tracks latencies with 3 significant digits.
    pub fn new() -> Self {
        Self {
            histogram: Histogram::new(3).expect("valid histogram config"),
        }
    }

    /// Records a latency measurement in nanoseconds.
    pub fn record(&mut self, latency_ns: u64) {
        self.histogram.record(latency_ns).ok();
    }

    pub fn count(&self) -> u64 {
        self.histogram.len()
    }

    pub fn quantile(&self, q: f64) -> u64 {
        self.histogram.value_at_quantile(q)
    }

    pub fn max(&self) -> u64 {
        self.histogram.max()
    }

    pub fn mean(&self) -> f64 {
        self.histogram.mean()
    }

    /// Latency statistics as JSON for CI integration.
    pub fn to_json(&self, operation: &str) -> String {
        serde_json::json!({
            "operation": operation,
            "count": self.count(),
            "p50_ns": self.quantile(0.50),
            "p99_ns": self.quantile(0.99),
            "p999_ns": self.quantile(0.999),
            "max_ns": self.max(),
            "mean_ns": self.mean(),
        })
        .to_string()
    }

    pub fn print_summary(&self, operation: &str) {
        println!("{operation} latency ({} samples):", self.count());
        for (label, q) in [("p50", 0.50), ("p99", 0.99), ("p99.9", 0.999)] {
            let ns = self.quantile(q);
            println!("  {label:<6} {ns:>10} ns ({:>8.2} μs)", ns as f64 / 1000.0);
        }
        println!(
            "  {:<6} {:>10} ns ({:>8.2} μs)",
            "max",
            self.max(),
            self.max() as f64 / 1000.0
        );
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}
