//! Chunked execution of the aggregation pass.
//!
//! This module sits "above" [`crate::processing`] and provides:
//!
//! - Optional parallel aggregation over record chunks (rayon), merged into one result
//! - Real-time metrics + observer hooks for monitoring
//!
//! Aggregation is a sum, so partial results merge into exactly what a single sequential pass
//! produces regardless of chunk size or thread count.

mod observer;

use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::processing::aggregate::{GeoAggregates, accumulate, merge_aggregates};
use crate::types::{GeoLevel, SchoolRecord};

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver, LogExecutionObserver,
    StdErrExecutionObserver,
};

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Aggregate chunks on a rayon pool. Off by default.
    pub parallel: bool,
    /// Number of worker threads used when `parallel` is set.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Number of records per chunk.
    pub chunk_size: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            num_threads: None,
            chunk_size: 16_384,
        }
    }
}

/// Runs the aggregation pass, sequentially or across a rayon pool.
pub struct ExecutionEngine {
    pool: Option<ThreadPool>,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// A zero `chunk_size` is treated as 1. If the thread pool cannot be built the engine logs a
    /// warning and runs sequentially.
    pub fn new(opts: ExecutionOptions) -> Self {
        let pool = if opts.parallel {
            let n_threads = opts
                .num_threads
                .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
                .max(1);
            match ThreadPoolBuilder::new().num_threads(n_threads).build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    log::warn!("could not build a {n_threads}-thread pool, aggregating sequentially: {e}");
                    None
                }
            }
        } else {
            None
        };

        Self {
            pool,
            opts,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        }
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Group `records` by the key of `level`.
    pub fn aggregate(&self, records: &[SchoolRecord], level: GeoLevel) -> GeoAggregates {
        let start = Instant::now();
        self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted {
            level,
            records: records.len(),
            parallel: self.is_parallel(),
        });

        let ranges = chunk_ranges(records.len(), self.opts.chunk_size.max(1));
        let out = match &self.pool {
            Some(pool) => pool.install(|| {
                ranges
                    .into_par_iter()
                    .map(|range| self.aggregate_chunk(records, range, level))
                    .reduce(GeoAggregates::new, |mut acc, part| {
                        merge_aggregates(&mut acc, part);
                        acc
                    })
            }),
            None => {
                let mut acc = GeoAggregates::new();
                for range in ranges {
                    merge_aggregates(&mut acc, self.aggregate_chunk(records, range, level));
                }
                acc
            }
        };

        self.metrics.end_run(start.elapsed());
        self.emit(ExecutionEvent::RunFinished {
            level,
            keys: out.len(),
            elapsed: start.elapsed(),
            metrics: self.metrics.snapshot(),
        });
        out
    }

    fn aggregate_chunk(&self, records: &[SchoolRecord], range: Range<usize>, level: GeoLevel) -> GeoAggregates {
        let start_row = range.start;
        self.metrics.on_chunk_start();
        self.emit(ExecutionEvent::ChunkStarted {
            start_row,
            row_count: range.len(),
        });

        let mut out = GeoAggregates::new();
        accumulate(&mut out, &records[range.clone()], level);
        self.metrics.on_rows_processed(range.len());

        self.emit(ExecutionEvent::ChunkFinished {
            start_row,
            keys: out.len(),
        });
        self.metrics.on_chunk_end();
        out
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new(ExecutionOptions::default())
    }
}

fn chunk_ranges(row_count: usize, chunk_size: usize) -> Vec<Range<usize>> {
    let mut out = Vec::with_capacity(row_count.div_ceil(chunk_size));
    let mut start = 0usize;
    while start < row_count {
        let end = (start + chunk_size).min(row_count);
        out.push(start..end);
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{ExecutionEngine, ExecutionOptions, chunk_ranges};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::execution::{ExecutionEvent, ExecutionObserver};
    use crate::processing::aggregate::aggregate;
    use crate::types::{Category, GeoLevel, RuralUrban, SchoolRecord};

    fn records_of_n(n: usize) -> Vec<SchoolRecord> {
        (0..n)
            .map(|i| SchoolRecord {
                school_id: i.to_string(),
                state: format!("S{}", i % 7),
                district: format!("D{}", i % 13),
                block: "B".to_string(),
                rural_urban: match i % 3 {
                    0 => RuralUrban::Rural,
                    1 => RuralUrban::Urban,
                    _ => RuralUrban::Unclassified,
                },
                school_type: Category::Code((i % 4).to_string()),
                school_category: Category::Unclassified,
            })
            .collect()
    }

    #[derive(Default)]
    struct ChunkCounter {
        started: AtomicUsize,
        finished: AtomicUsize,
        runs: AtomicUsize,
    }

    impl ExecutionObserver for ChunkCounter {
        fn on_event(&self, event: &ExecutionEvent) {
            match event {
                ExecutionEvent::ChunkStarted { .. } => {
                    self.started.fetch_add(1, Ordering::SeqCst);
                }
                ExecutionEvent::ChunkFinished { .. } => {
                    self.finished.fetch_add(1, Ordering::SeqCst);
                }
                ExecutionEvent::RunFinished { .. } => {
                    self.runs.fetch_add(1, Ordering::SeqCst);
                }
                ExecutionEvent::RunStarted { .. } => {}
            }
        }
    }

    #[test]
    fn parallel_aggregation_matches_sequential() {
        let records = records_of_n(1_000);
        let engine = ExecutionEngine::new(ExecutionOptions {
            parallel: true,
            num_threads: Some(4),
            chunk_size: 37,
        });
        assert!(engine.is_parallel());
        for level in [GeoLevel::State, GeoLevel::District] {
            assert_eq!(engine.aggregate(&records, level), aggregate(&records, level));
        }
    }

    #[test]
    fn sequential_engine_chunks_and_merges() {
        let records = records_of_n(250);
        let observer = Arc::new(ChunkCounter::default());
        let obs_trait: Arc<dyn ExecutionObserver> = observer.clone();
        let engine = ExecutionEngine::new(ExecutionOptions {
            parallel: false,
            num_threads: None,
            chunk_size: 100,
        })
        .with_observer(obs_trait);

        let out = engine.aggregate(&records, GeoLevel::State);
        assert_eq!(out, aggregate(&records, GeoLevel::State));
        assert_eq!(observer.started.load(Ordering::SeqCst), 3);
        assert_eq!(observer.finished.load(Ordering::SeqCst), 3);
        assert_eq!(observer.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn metrics_are_available_after_run() {
        let records = records_of_n(60);
        let engine = ExecutionEngine::new(ExecutionOptions {
            parallel: true,
            num_threads: Some(2),
            chunk_size: 10,
        });
        let metrics = engine.metrics();
        engine.aggregate(&records, GeoLevel::District);

        let snap = metrics.snapshot();
        assert_eq!(snap.run_id, 1);
        assert_eq!(snap.rows_processed, 60);
        assert_eq!(snap.chunks_started, 6);
        assert_eq!(snap.chunks_finished, 6);
        assert!(snap.max_active_chunks >= 1);
        assert!(snap.elapsed.is_some());
    }

    #[test]
    fn empty_input_has_no_chunks() {
        assert!(chunk_ranges(0, 10).is_empty());
        assert_eq!(chunk_ranges(25, 10), vec![0..10, 10..20, 20..25]);
        assert!(ExecutionEngine::default().aggregate(&[], GeoLevel::State).is_empty());
    }
}
