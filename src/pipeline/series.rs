//! Raw and aggregate series shared with renderers and exporters
//!
//! The two series are timestamped independently. They can differ in length
//! and never share indices, so every cross-series view filters by timestamp.

use super::types::{AggregateRecord, Sample};
use serde::{Deserialize, Serialize};

/// Owned copy of both series for rendering or export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    /// (timestamp_ms, value) pairs of every accepted sample
    pub raw: Vec<(i64, f64)>,
    /// (timestamp_ms, value) pairs of every emitted aggregate
    pub aggregates: Vec<(i64, f64)>,
    pub raw_origin_ms: Option<i64>,
    pub aggregate_origin_ms: Option<i64>,
}

impl SeriesSnapshot {
    /// Raw points as (seconds since the raw origin, value)
    pub fn relative_raw(&self) -> Vec<(f64, f64)> {
        relative_to(&self.raw, self.raw_origin_ms)
    }

    /// Aggregate points as (seconds since the aggregate origin, value)
    pub fn relative_aggregates(&self) -> Vec<(f64, f64)> {
        relative_to(&self.aggregates, self.aggregate_origin_ms)
    }
}

/// Append-only store for `RawSeries` and `AggregateSeries`
#[derive(Debug, Clone, Default)]
pub struct SeriesStore {
    raw: Vec<Sample>,
    aggregates: Vec<AggregateRecord>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw sample, clamping its timestamp so the series never goes backwards
    pub fn push_raw(&mut self, mut sample: Sample) -> Sample {
        if let Some(last) = self.raw.last() {
            sample.timestamp_ms = sample.timestamp_ms.max(last.timestamp_ms);
        }
        self.raw.push(sample);
        sample
    }

    /// Append an aggregate record, same clamping rule as `push_raw`
    pub fn push_aggregate(&mut self, mut record: AggregateRecord) -> AggregateRecord {
        if let Some(last) = self.aggregates.last() {
            record.timestamp_ms = record.timestamp_ms.max(last.timestamp_ms);
        }
        self.aggregates.push(record);
        record
    }

    pub fn raw(&self) -> &[Sample] {
        &self.raw
    }

    pub fn aggregates(&self) -> &[AggregateRecord] {
        &self.aggregates
    }

    pub fn raw_origin(&self) -> Option<i64> {
        self.raw.first().map(|s| s.timestamp_ms)
    }

    pub fn aggregate_origin(&self) -> Option<i64> {
        self.aggregates.first().map(|r| r.timestamp_ms)
    }

    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            raw: self.raw.iter().map(|s| (s.timestamp_ms, s.value)).collect(),
            aggregates: self
                .aggregates
                .iter()
                .map(|r| (r.timestamp_ms, r.value))
                .collect(),
            raw_origin_ms: self.raw_origin(),
            aggregate_origin_ms: self.aggregate_origin(),
        }
    }

    /// Raw samples with `timestamp >= latest_raw - trailing_secs`
    pub fn trailing_raw(&self, trailing_secs: f64) -> Vec<Sample> {
        let cutoff = match self.raw.last() {
            Some(last) => trailing_cutoff(last.timestamp_ms, trailing_secs),
            None => return Vec::new(),
        };
        self.raw
            .iter()
            .filter(|s| s.timestamp_ms >= cutoff)
            .copied()
            .collect()
    }

    /// Aggregates with `timestamp >= latest_aggregate - trailing_secs`
    pub fn trailing_aggregates(&self, trailing_secs: f64) -> Vec<AggregateRecord> {
        let cutoff = match self.aggregates.last() {
            Some(last) => trailing_cutoff(last.timestamp_ms, trailing_secs),
            None => return Vec::new(),
        };
        self.aggregates
            .iter()
            .filter(|r| r.timestamp_ms >= cutoff)
            .copied()
            .collect()
    }
}

fn trailing_cutoff(latest_ms: i64, trailing_secs: f64) -> i64 {
    latest_ms.saturating_sub((trailing_secs.max(0.0) * 1000.0) as i64)
}

fn relative_to(points: &[(i64, f64)], origin_ms: Option<i64>) -> Vec<(f64, f64)> {
    let origin = match origin_ms {
        Some(origin) => origin,
        None => return Vec::new(),
    };
    points
        .iter()
        .map(|(ts, value)| ((ts - origin) as f64 / 1000.0, *value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_are_independent() {
        let mut store = SeriesStore::new();
        store.push_raw(Sample::new(1_000, 1.0));
        store.push_raw(Sample::new(1_500, 2.0));
        store.push_raw(Sample::new(2_200, 3.0));
        store.push_aggregate(AggregateRecord { timestamp_ms: 2_000, value: 1.5 });

        assert_eq!(store.raw().len(), 3);
        assert_eq!(store.aggregates().len(), 1);
        assert_eq!(store.raw_origin(), Some(1_000));
        assert_eq!(store.aggregate_origin(), Some(2_000));
    }

    #[test]
    fn test_timestamps_never_decrease() {
        let mut store = SeriesStore::new();
        store.push_raw(Sample::new(5_000, 1.0));
        let clamped = store.push_raw(Sample::new(4_000, 2.0));

        assert_eq!(clamped.timestamp_ms, 5_000);
        assert!(store.raw().windows(2).all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
    }

    #[test]
    fn test_trailing_view_filters_by_timestamp() {
        let mut store = SeriesStore::new();
        for ts in [0, 10_000, 20_000, 25_000, 30_000] {
            store.push_raw(Sample::new(ts, ts as f64));
        }
        store.push_aggregate(AggregateRecord { timestamp_ms: 1_000, value: 0.0 });
        store.push_aggregate(AggregateRecord { timestamp_ms: 40_000, value: 1.0 });

        let raw: Vec<i64> = store.trailing_raw(10.0).iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(raw, vec![20_000, 25_000, 30_000]);

        // Aggregates use their own latest timestamp, not the raw one
        let aggs = store.trailing_aggregates(10.0);
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].timestamp_ms, 40_000);
    }

    #[test]
    fn test_trailing_view_on_empty_store() {
        let store = SeriesStore::new();
        assert!(store.trailing_raw(30.0).is_empty());
        assert!(store.trailing_aggregates(30.0).is_empty());
    }

    #[test]
    fn test_snapshot_relative_times() {
        let mut store = SeriesStore::new();
        store.push_raw(Sample::new(10_000, 1.0));
        store.push_raw(Sample::new(12_500, 2.0));
        store.push_aggregate(AggregateRecord { timestamp_ms: 15_000, value: 1.5 });

        let snapshot = store.snapshot();
        assert_eq!(snapshot.relative_raw(), vec![(0.0, 1.0), (2.5, 2.0)]);
        assert_eq!(snapshot.relative_aggregates(), vec![(0.0, 1.5)]);
        assert!(SeriesSnapshot::default().relative_raw().is_empty());
    }
}
