//! Core data types for the sensor aggregation pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places kept on every published aggregate
pub const AGGREGATE_PRECISION: i32 = 2;

/// A single scalar reading stamped at arrival (Unix milliseconds, UTC)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self { timestamp_ms, value }
    }
}

/// One emitted summary value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    /// Time of computation (Unix milliseconds, UTC)
    pub timestamp_ms: i64,
    /// Mean of the window, rounded to `AGGREGATE_PRECISION` decimals
    pub value: f64,
}

/// Aggregation behaviour selected at startup
///
/// The two modes are intentionally asymmetric:
/// - `MovingAverage` keeps at most `window_size` recent samples and drains
///   them on every flush (a periodic batch mean over the newest samples).
/// - `SimpleMean` never drains; each flush reports the mean of every sample
///   seen since the process started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMode {
    MovingAverage { window_size: usize },
    SimpleMean,
}

impl AggregationMode {
    pub fn from_flags(use_moving_average: bool, window_size: usize) -> Self {
        if use_moving_average {
            AggregationMode::MovingAverage { window_size }
        } else {
            AggregationMode::SimpleMean
        }
    }

    /// Legend label used by the renderer
    pub fn label(&self) -> &'static str {
        match self {
            AggregationMode::MovingAverage { .. } => "Moving Average",
            AggregationMode::SimpleMean => "Simple Mean",
        }
    }

    /// Wraps a flushed value in the payload shape this mode publishes
    pub fn payload(&self, record: &AggregateRecord) -> AggregatePayload {
        match self {
            AggregationMode::MovingAverage { .. } => AggregatePayload::List(vec![record.value]),
            AggregationMode::SimpleMean => AggregatePayload::Scalar(record.value),
        }
    }
}

/// Text published to the cloud topic once per successful flush
///
/// The shape differs by mode and consumers must handle both:
/// - `Scalar` (simple mean) renders as a bare number, e.g. `15.0`
/// - `List` (moving average) renders as a bracketed list, e.g. `[5.0]`
///
/// Numbers use the shortest round-trip form with a trailing `.0` on whole
/// values, so parsing the text back yields the rounded mean exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregatePayload {
    Scalar(f64),
    List(Vec<f64>),
}

impl fmt::Display for AggregatePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregatePayload::Scalar(value) => write!(f, "{:?}", value),
            AggregatePayload::List(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", value)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl AggregatePayload {
    pub fn values(&self) -> Vec<f64> {
        match self {
            AggregatePayload::Scalar(value) => vec![*value],
            AggregatePayload::List(values) => values.clone(),
        }
    }
}

impl std::str::FromStr for AggregatePayload {
    type Err = IngestError;

    /// Accepts either published shape: `15.0` or `[5.0, 6.25]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let parse = |item: &str| -> Result<f64, IngestError> {
            let item = item.trim();
            item.parse::<f64>()
                .map_err(|_| IngestError::NotANumber(item.to_string()))
        };

        match text.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            Some(inner) if inner.trim().is_empty() => Ok(AggregatePayload::List(Vec::new())),
            Some(inner) => inner
                .split(',')
                .map(parse)
                .collect::<Result<Vec<_>, _>>()
                .map(AggregatePayload::List),
            None => parse(text).map(AggregatePayload::Scalar),
        }
    }
}

/// Reasons an inbound payload is dropped at the ingest boundary
#[derive(Debug, Clone, PartialEq)]
pub enum IngestError {
    InvalidUtf8,
    NotANumber(String),
    NonFinite(f64),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::InvalidUtf8 => write!(f, "Payload is not valid UTF-8"),
            IngestError::NotANumber(text) => write!(f, "Payload is not numeric: {:?}", text),
            IngestError::NonFinite(value) => write!(f, "Payload is not a finite number: {}", value),
        }
    }
}

impl std::error::Error for IngestError {}

/// Ingestion counters, reset only at process start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: u64,
    pub parse_failures: u64,
}

/// Round half away from zero to `AGGREGATE_PRECISION` decimals
///
/// Magnitudes too large to scale have no fractional digits and pass through.
pub fn round_aggregate(value: f64) -> f64 {
    let factor = 10f64.powi(AGGREGATE_PRECISION);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}
