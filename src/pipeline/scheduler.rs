//! Flush scheduler - periodic aggregate computation and publish
//!
//! One tick per `sampling_interval` on a fixed grid. Each tick runs a single
//! flush under the engine lock, releases the lock, then publishes. Ticks are
//! processed strictly one after another, so flushes never overlap.

use super::engine::{lock_engine, PipelineEngine};
use crate::transport::Publisher;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Counters reported when the scheduler stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub ticks: u64,
    pub published: u64,
    pub empty: u64,
    pub publish_failures: u64,
}

/// Flush scheduler task
///
/// Arguments:
/// - `engine`: shared PipelineEngine instance
/// - `publisher`: cloud-side publisher
/// - `topic`: cloud topic for aggregate payloads
/// - `sampling_interval`: period between flushes (first flush after one period)
/// - `run_budget`: stop once this much time has elapsed (checked after each flush)
/// - `shutdown`: flips to `true` (or closes) on an external stop request
///
/// A tick with no data publishes nothing and the next tick stays on the
/// fixed grid. Publish failures are logged and do not stop the loop.
pub async fn flush_scheduler_task(
    engine: Arc<Mutex<PipelineEngine>>,
    publisher: Arc<dyn Publisher>,
    topic: String,
    sampling_interval: Duration,
    run_budget: Option<Duration>,
    mut shutdown: watch::Receiver<bool>,
) -> FlushSummary {
    log::info!(
        "⏰ Starting flush scheduler (interval: {:?}, budget: {:?}, publishing to {} on {})",
        sampling_interval,
        run_budget,
        topic,
        publisher.endpoint()
    );

    let mut summary = FlushSummary::default();
    let start = Instant::now();
    let first_tick = match start.checked_add(sampling_interval) {
        Some(first_tick) if !sampling_interval.is_zero() => first_tick,
        _ => {
            log::error!("❌ Unusable sampling interval {:?}, flush scheduler not started", sampling_interval);
            return summary;
        }
    };
    let mut timer = interval_at(first_tick, sampling_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow() {
            log::info!("🛑 Flush scheduler received shutdown signal");
            break;
        }

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() {
                    log::info!("🛑 Shutdown handle dropped, stopping flush scheduler");
                    break;
                }
                continue;
            }

            _ = timer.tick() => {}
        }

        summary.ticks += 1;

        // Lock held only for the computation, released before publishing
        let flushed = {
            let mut engine_guard = lock_engine(&engine);
            let now = engine_guard.now_ms();
            engine_guard
                .flush(now)
                .map(|record| (record, engine_guard.mode().payload(&record)))
        };

        match flushed {
            Some((record, payload)) => match publisher.publish(&topic, payload.to_string()).await {
                Ok(()) => {
                    summary.published += 1;
                    log::debug!("✅ Published aggregate {} to {}", payload, topic);
                }
                Err(e) => {
                    summary.publish_failures += 1;
                    log::error!("❌ Failed to publish aggregate {}: {}", record.value, e);
                }
            },
            None => {
                summary.empty += 1;
                log::debug!("Insufficient data for aggregate this cycle, skipping publish");
            }
        }

        if let Some(budget) = run_budget {
            if start.elapsed() >= budget {
                log::info!("⏱️  Run budget of {:?} elapsed", budget);
                break;
            }
        }
    }

    log::info!(
        "✅ Flush scheduler stopped ({} ticks, {} published, {} empty, {} failed)",
        summary.ticks,
        summary.published,
        summary.empty,
        summary.publish_failures
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::AggregationMode;
    use crate::transport::TransportError;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }

        fn endpoint(&self) -> &str {
            "recording"
        }
    }

    struct FailingPublisher;

    #[async_trait]
    impl Publisher for FailingPublisher {
        async fn publish(&self, _topic: &str, _payload: String) -> Result<(), TransportError> {
            Err(TransportError::Disconnected("cloud".to_string()))
        }

        fn endpoint(&self) -> &str {
            "cloud"
        }
    }

    /// Records each payload only after a delay, to hold a publish in flight
    #[derive(Default)]
    struct SlowPublisher {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Publisher for SlowPublisher {
        async fn publish(&self, _topic: &str, payload: String) -> Result<(), TransportError> {
            tokio::time::sleep(Duration::from_secs(2)).await;
            self.sent.lock().unwrap().push(payload);
            Ok(())
        }

        fn endpoint(&self) -> &str {
            "slow"
        }
    }

    fn engine(mode: AggregationMode) -> Arc<Mutex<PipelineEngine>> {
        Arc::new(Mutex::new(PipelineEngine::new_with_timestamp_fn(mode, Box::new(|| 42))))
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_stops_after_expected_ticks() {
        let engine = engine(AggregationMode::SimpleMean);
        lock_engine(&engine).ingest_value(10.0);
        lock_engine(&engine).ingest_value(20.0);

        let publisher = Arc::new(RecordingPublisher::default());
        let (_stop_tx, stop_rx) = watch::channel(false);

        let summary = flush_scheduler_task(
            engine.clone(),
            publisher.clone(),
            "sensor/average".to_string(),
            Duration::from_secs(5),
            Some(Duration::from_secs(10)),
            stop_rx,
        )
        .await;

        // Ticks at 5s and 10s; only the first has fresh data
        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.published, 1);
        assert_eq!(summary.empty, 1);

        let sent = publisher.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[("sensor/average".to_string(), "15.0".to_string())]);
        assert_eq!(lock_engine(&engine).series().aggregates().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_moving_average_publishes_list_payload() {
        let engine = engine(AggregationMode::MovingAverage { window_size: 3 });
        for v in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0] {
            lock_engine(&engine).ingest_value(v);
        }

        let publisher = Arc::new(RecordingPublisher::default());
        let (_stop_tx, stop_rx) = watch::channel(false);

        flush_scheduler_task(
            engine,
            publisher.clone(),
            "avg".to_string(),
            Duration::from_secs(1),
            Some(Duration::from_secs(1)),
            stop_rx,
        )
        .await;

        let sent = publisher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "[5.0]");
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_does_not_stop_loop() {
        let engine = engine(AggregationMode::SimpleMean);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let feeder = engine.clone();
        let scheduler = tokio::spawn(flush_scheduler_task(
            engine.clone(),
            Arc::new(FailingPublisher),
            "avg".to_string(),
            Duration::from_secs(1),
            Some(Duration::from_secs(3)),
            stop_rx,
        ));

        // Feed at half-second offsets so each tick sees exactly one new sample
        tokio::time::sleep(Duration::from_millis(500)).await;
        for v in [1.0, 2.0, 3.0] {
            lock_engine(&feeder).ingest_value(v);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        let summary = scheduler.await.unwrap();
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.publish_failures, 3);

        // Aggregation state is recorded even though publishing failed
        assert_eq!(lock_engine(&engine).series().aggregates().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_halts_ticks() {
        let engine = engine(AggregationMode::SimpleMean);
        let publisher = Arc::new(RecordingPublisher::default());
        let (stop_tx, stop_rx) = watch::channel(false);

        let scheduler = tokio::spawn(flush_scheduler_task(
            engine,
            publisher,
            "avg".to_string(),
            Duration::from_secs(5),
            None,
            stop_rx,
        ));

        tokio::time::sleep(Duration::from_secs(12)).await;
        stop_tx.send(true).unwrap();

        let summary = scheduler.await.unwrap();
        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.empty, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_publish() {
        let engine = engine(AggregationMode::SimpleMean);
        lock_engine(&engine).ingest_value(7.0);

        let publisher = Arc::new(SlowPublisher::default());
        let (stop_tx, stop_rx) = watch::channel(false);

        let scheduler = tokio::spawn(flush_scheduler_task(
            engine.clone(),
            publisher.clone(),
            "avg".to_string(),
            Duration::from_secs(1),
            None,
            stop_rx,
        ));

        // Tick at 1s starts a publish that finishes at 3s
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(publisher.sent.lock().unwrap().is_empty());
        stop_tx.send(true).unwrap();

        let summary = scheduler.await.unwrap();
        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.published, 1);
        assert_eq!(publisher.sent.lock().unwrap().as_slice(), &["7.0".to_string()]);
        assert_eq!(lock_engine(&engine).series().aggregates().len(), 1);
    }

    #[tokio::test]
    async fn test_unusable_interval_returns_without_ticking() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (_stop_tx, stop_rx) = watch::channel(false);

        let summary = flush_scheduler_task(
            engine(AggregationMode::SimpleMean),
            publisher,
            "avg".to_string(),
            Duration::ZERO,
            None,
            stop_rx.clone(),
        )
        .await;
        assert_eq!(summary, FlushSummary::default());

        let summary = flush_scheduler_task(
            engine(AggregationMode::SimpleMean),
            Arc::new(RecordingPublisher::default()),
            "avg".to_string(),
            Duration::MAX,
            None,
            stop_rx,
        )
        .await;
        assert_eq!(summary.ticks, 0);
    }
}
