//! Pipeline Engine - single guarded state object for one sensor stream
//!
//! ```text
//! payload bytes
//!     ↓
//! PipelineEngine::ingest_payload()   (ingestion task)
//!     ↓
//! SeriesStore (raw) + SlidingAggregator
//!     ↓
//! PipelineEngine::flush()            (scheduler task)
//!     ↓
//! SeriesStore (aggregates) → Publisher
//! ```
//!
//! Both tasks share one `Arc<Mutex<PipelineEngine>>`. Every method here
//! completes synchronously, so no lock is held across an await point.

use super::aggregator::SlidingAggregator;
use super::series::{SeriesSnapshot, SeriesStore};
use super::types::{AggregateRecord, AggregationMode, IngestError, IngestStats, Sample};
use std::sync::{Mutex, MutexGuard};

/// Orchestrates ingestion, aggregation and series bookkeeping
pub struct PipelineEngine {
    aggregator: SlidingAggregator,
    series: SeriesStore,
    stats: IngestStats,

    /// Timestamp function in Unix milliseconds (mockable for tests)
    now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl PipelineEngine {
    /// Create an engine stamped with wall-clock time (`chrono::Utc::now()`)
    pub fn new(mode: AggregationMode) -> Self {
        Self::new_with_timestamp_fn(mode, Box::new(|| chrono::Utc::now().timestamp_millis()))
    }

    /// Create an engine with a custom clock (deterministic tests)
    pub fn new_with_timestamp_fn(
        mode: AggregationMode,
        now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        Self {
            aggregator: SlidingAggregator::new(mode),
            series: SeriesStore::new(),
            stats: IngestStats::default(),
            now_fn,
        }
    }

    pub fn now_ms(&self) -> i64 {
        (self.now_fn)()
    }

    pub fn mode(&self) -> AggregationMode {
        self.aggregator.mode()
    }

    /// Ingest boundary: one call per arriving message
    ///
    /// A payload that does not parse as a finite number is counted and
    /// rejected; nothing is appended.
    pub fn ingest_payload(&mut self, payload: &[u8]) -> Result<Sample, IngestError> {
        match parse_payload(payload) {
            Ok(value) => Ok(self.ingest_value(value)),
            Err(e) => {
                self.stats.parse_failures += 1;
                Err(e)
            }
        }
    }

    /// Stamp an already-decoded value and append it
    pub fn ingest_value(&mut self, value: f64) -> Sample {
        let sample = self.series.push_raw(Sample::new(self.now_ms(), value));
        self.aggregator.ingest(sample);
        self.stats.accepted += 1;
        sample
    }

    /// Compute one aggregate at `now_ms` and record it in the aggregate series
    ///
    /// `None` means there was nothing to publish this cycle.
    pub fn flush(&mut self, now_ms: i64) -> Option<AggregateRecord> {
        let record = self.aggregator.compute_and_flush(now_ms)?;
        Some(self.series.push_aggregate(record))
    }

    pub fn series(&self) -> &SeriesStore {
        &self.series
    }

    pub fn snapshot(&self) -> SeriesSnapshot {
        self.series.snapshot()
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn window_values(&self) -> Vec<f64> {
        self.aggregator.window_values()
    }
}

/// Lock the shared engine, recovering the guard if a holder panicked
///
/// The engine is plain data and every mutation completes before the lock is
/// released, so a poisoned guard still holds consistent state.
pub fn lock_engine(engine: &Mutex<PipelineEngine>) -> MutexGuard<'_, PipelineEngine> {
    engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn parse_payload(payload: &[u8]) -> Result<f64, IngestError> {
    let text = std::str::from_utf8(payload).map_err(|_| IngestError::InvalidUtf8)?;
    let trimmed = text.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| IngestError::NotANumber(trimmed.to_string()))?;

    if !value.is_finite() {
        return Err(IngestError::NonFinite(value));
    }
    Ok(value)
}
