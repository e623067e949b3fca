//! SensorFlow - streaming sensor aggregation
//!
//! Simulated readings flow from an edge topic through a moving-average or
//! simple-mean aggregator and are republished on a cloud topic, while both
//! series are kept for live and end-of-run rendering.

pub mod export;
pub mod pipeline;
pub mod producer;
pub mod simulator;
pub mod transport;
pub mod ui;

pub use pipeline::{PipelineConfig, PipelineEngine};
pub use simulator::{ArrivalClock, Simulator};
pub use transport::{Broker, BrokerRegistry, Publisher, Subscription, TransportError};
