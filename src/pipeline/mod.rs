//! # Sensor Aggregation Pipeline
//!
//! Ingests scalar readings from the edge topic, keeps a moving-average or
//! cumulative-mean window, and flushes one aggregate per sampling interval
//! to the cloud topic.
//!
//! ## Architecture
//!
//! Two tasks share one `Arc<Mutex<PipelineEngine>>`:
//!
//! 1. Ingestion (`ingestion`): one engine call per arriving payload
//! 2. Flush scheduler (`scheduler`): one engine flush per tick, then publish
//!
//! The engine owns the aggregation window (`aggregator`) and the raw and
//! aggregate series (`series`) that the UI and the exporter read.
//!
//! ## Module Organization
//!
//! - `types` - Sample, AggregateRecord, AggregationMode, payload shapes
//! - `aggregator` - SlidingAggregator and its two window types
//! - `series` - SeriesStore and snapshot/trailing views
//! - `engine` - PipelineEngine (the guarded state object)
//! - `ingestion` - edge subscription loop
//! - `scheduler` - fixed-period flush loop
//! - `config` - environment configuration

pub mod types;
pub mod aggregator;
pub mod series;
pub mod engine;
pub mod ingestion;
pub mod scheduler;
pub mod config;

// Re-export commonly used types
pub use types::{AggregatePayload, AggregateRecord, AggregationMode, IngestError, IngestStats, Sample};
pub use aggregator::SlidingAggregator;
pub use series::{SeriesSnapshot, SeriesStore};
pub use engine::{lock_engine, PipelineEngine};
pub use scheduler::FlushSummary;
pub use config::{ConfigError, PipelineConfig};
