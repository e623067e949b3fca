//! Window bookkeeping and mean computation
//!
//! `SlidingAggregator` is pure state: no clocks, no I/O. Callers supply the
//! flush timestamp and decide what to do with the emitted record.
//!
//! The two aggregation modes are kept as separate window types on purpose.
//! `MovingWindow` drains on every flush, `CumulativeMean` never does. Folding
//! them into one abstraction would hide the difference in what a published
//! value means.

use super::types::{round_aggregate, AggregateRecord, AggregationMode, Sample};
use std::collections::VecDeque;

/// Size-bounded FIFO of the most recent samples
#[derive(Debug, Clone)]
pub struct MovingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl MovingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    /// Mean of the current contents, then clear
    pub fn drain_mean(&mut self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let n = self.values.len() as f64;
        let sum: f64 = self.values.iter().sum();
        let mean = if sum.is_finite() {
            sum / n
        } else {
            // Sum overflowed; scale each term first
            self.values.iter().map(|v| v / n).sum()
        };
        self.values.clear();
        Some(mean)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

/// Running mean over every sample since start
///
/// Each flush reports the all-time mean, not the mean since the previous
/// flush. A flush only produces a value if something arrived in between.
#[derive(Debug, Clone, Default)]
pub struct CumulativeMean {
    sum: f64,
    /// Fallback once `sum` overflows
    running: f64,
    count: u64,
    since_flush: u64,
}

impl CumulativeMean {
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.since_flush += 1;

        let n = self.count as f64;
        self.running = self.running - self.running / n + value / n;
    }

    pub fn take_mean(&mut self) -> Option<f64> {
        if self.since_flush == 0 {
            return None;
        }
        self.since_flush = 0;
        if self.sum.is_finite() {
            Some(self.sum / self.count as f64)
        } else {
            Some(self.running)
        }
    }

    pub fn pending(&self) -> u64 {
        self.since_flush
    }
}

#[derive(Debug, Clone)]
enum WindowState {
    Moving(MovingWindow),
    Cumulative(CumulativeMean),
}

/// Owns the aggregation window for one sensor stream
#[derive(Debug, Clone)]
pub struct SlidingAggregator {
    mode: AggregationMode,
    state: WindowState,
}

impl SlidingAggregator {
    /// A moving-average window of size zero would never hold a sample, so it
    /// is raised to one. Config validation rejects zero before this point.
    pub fn new(mode: AggregationMode) -> Self {
        let state = match mode {
            AggregationMode::MovingAverage { window_size } => {
                WindowState::Moving(MovingWindow::new(window_size.max(1)))
            }
            AggregationMode::SimpleMean => WindowState::Cumulative(CumulativeMean::default()),
        };
        Self { mode, state }
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    pub fn ingest(&mut self, sample: Sample) {
        match &mut self.state {
            WindowState::Moving(window) => window.push(sample.value),
            WindowState::Cumulative(mean) => mean.push(sample.value),
        }
    }

    /// Compute one aggregate at `now_ms`
    ///
    /// Returns `None` when there is nothing to report this cycle:
    /// - moving average: the window is empty
    /// - simple mean: no sample arrived since the last flush
    pub fn compute_and_flush(&mut self, now_ms: i64) -> Option<AggregateRecord> {
        let mean = match &mut self.state {
            WindowState::Moving(window) => window.drain_mean(),
            WindowState::Cumulative(mean) => mean.take_mean(),
        }?;

        Some(AggregateRecord {
            timestamp_ms: now_ms,
            value: round_aggregate(mean),
        })
    }

    /// Current moving-window contents, oldest first (empty in simple-mean mode)
    pub fn window_values(&self) -> Vec<f64> {
        match &self.state {
            WindowState::Moving(window) => window.values(),
            WindowState::Cumulative(_) => Vec::new(),
        }
    }

    /// Samples that the next flush would account for
    pub fn pending(&self) -> usize {
        match &self.state {
            WindowState::Moving(window) => window.len(),
            WindowState::Cumulative(mean) => mean.pending() as usize,
        }
    }
}
