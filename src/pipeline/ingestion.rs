//! Pipeline ingestion - edge subscription to engine
//!
//! Runs in its own task, independent of the flush scheduler. Each payload
//! takes the engine lock exactly once; parse failures are counted and logged
//! without interrupting the loop.

use super::engine::{lock_engine, PipelineEngine};
use super::types::IngestStats;
use crate::transport::Subscription;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

const THROUGHPUT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Receive payloads until shutdown is requested or the broker disconnects
///
/// Arguments:
/// - `subscription`: edge-topic subscription delivering raw payload bytes
/// - `engine`: shared PipelineEngine instance
/// - `shutdown`: flips to `true` (or closes) when the run should stop
///
/// Returns the engine's ingestion counters at exit.
pub async fn start_pipeline_ingestion(
    mut subscription: Subscription,
    engine: Arc<Mutex<PipelineEngine>>,
    mut shutdown: watch::Receiver<bool>,
) -> IngestStats {
    log::info!("🚀 Starting pipeline ingestion on topic {}", subscription.topic());

    let mut received = 0u64;
    let mut last_log_time = Instant::now();

    loop {
        if *shutdown.borrow() {
            log::info!("🛑 Ingestion received shutdown signal");
            break;
        }

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() {
                    log::info!("🛑 Shutdown handle dropped, stopping ingestion");
                    break;
                }
            }

            payload = subscription.recv() => {
                let payload = match payload {
                    Some(payload) => payload,
                    None => {
                        log::warn!("⚠️  Edge subscription closed, stopping ingestion");
                        break;
                    }
                };

                let result = {
                    let mut engine_guard = lock_engine(&engine);
                    engine_guard.ingest_payload(&payload)
                };

                match result {
                    Ok(sample) => {
                        received += 1;
                        log::debug!("📥 Received data from edge broker: {}", sample.value);
                    }
                    Err(e) => {
                        log::warn!("⚠️  Dropped non-numeric payload: {}", e);
                    }
                }

                if last_log_time.elapsed() >= THROUGHPUT_LOG_INTERVAL {
                    let per_sec = received as f64 / last_log_time.elapsed().as_secs_f64();
                    log::info!(
                        "📊 Ingestion rate: {:.1} samples/sec | backlog: {}",
                        per_sec,
                        subscription.backlog()
                    );
                    received = 0;
                    last_log_time = Instant::now();
                }
            }
        }
    }

    let stats = lock_engine(&engine).stats();
    log::info!(
        "✅ Pipeline ingestion stopped ({} accepted, {} dropped)",
        stats.accepted,
        stats.parse_failures
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::AggregationMode;
    use crate::transport::{Broker, Publisher};

    fn test_engine() -> Arc<Mutex<PipelineEngine>> {
        Arc::new(Mutex::new(PipelineEngine::new_with_timestamp_fn(
            AggregationMode::MovingAverage { window_size: 5 },
            Box::new(|| 1_000),
        )))
    }

    #[tokio::test]
    async fn test_ingestion_processes_payloads() {
        let broker = Broker::new("edge", 100);
        let subscription = broker.subscribe("sensor/data").unwrap();
        let engine = test_engine();
        let (_stop_tx, stop_rx) = watch::channel(false);

        for payload in ["1.0", "abc", "2.0", "3.0"] {
            broker.publish("sensor/data", payload.to_string()).await.unwrap();
        }
        broker.disconnect();

        let stats = start_pipeline_ingestion(subscription, engine.clone(), stop_rx).await;

        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.parse_failures, 1);
        assert_eq!(lock_engine(&engine).window_values(), vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_ingestion_stops_on_shutdown() {
        let broker = Broker::new("edge", 100);
        let subscription = broker.subscribe("sensor/data").unwrap();
        let engine = test_engine();
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(start_pipeline_ingestion(subscription, engine.clone(), stop_rx));

        broker.publish("sensor/data", "4.5".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_tx.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("ingestion did not stop")
            .unwrap();
        assert_eq!(stats.accepted, 1);
        assert_eq!(lock_engine(&engine).series().raw().len(), 1);
    }
}
