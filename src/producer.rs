//! Edge producer and cloud consumer tasks
//!
//! `publish_samples` drives the pipeline without hardware: simulated
//! readings are published to the edge topic at Poisson-distributed
//! intervals. `cloud_consumer_task` is the downstream subscriber that logs
//! what the flush scheduler publishes.

use crate::pipeline::AggregatePayload;
use crate::simulator::{ArrivalClock, Simulator};
use crate::transport::{Publisher, Subscription, TransportError};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

/// Longest single wait between simulated readings
pub const MAX_ARRIVAL_DELAY: Duration = Duration::from_secs(60);

/// Publish up to `max_messages` simulated readings to `topic`
///
/// Stops early on shutdown or when the broker disconnects. Returns the
/// number of readings actually published.
pub async fn publish_samples(
    mut simulator: Simulator,
    mut clock: ArrivalClock,
    publisher: Arc<dyn Publisher>,
    topic: String,
    arrival_rate: f64,
    max_messages: u64,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    log::info!(
        "🛰️  Simulated sensor publishing to {} on {} (rate: {}/s, limit: {})",
        topic,
        publisher.endpoint(),
        arrival_rate,
        max_messages
    );

    let mut published = 0u64;
    let mut elapsed_secs = 0.0;

    while published < max_messages {
        if *shutdown.borrow() {
            break;
        }

        let wait_secs = clock.next_time_interval(arrival_rate);
        let wait = Duration::try_from_secs_f64(wait_secs)
            .unwrap_or(MAX_ARRIVAL_DELAY)
            .min(MAX_ARRIVAL_DELAY);

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }

            _ = sleep(wait) => {}
        }
        elapsed_secs += wait.as_secs_f64();

        let value = simulator.calculate_next_value();
        match publisher.publish(&topic, value.to_string()).await {
            Ok(()) => {
                published += 1;
                log::debug!("📤 Published {} to {} at t={:.3}s", value, topic, elapsed_secs);
            }
            Err(TransportError::Disconnected(addr)) => {
                log::warn!("⚠️  Edge broker {} disconnected, producer stopping", addr);
                break;
            }
            Err(e) => {
                log::error!("❌ Failed to publish reading: {}", e);
            }
        }
    }

    log::info!("✅ Simulated sensor stopped after {} readings", published);
    published
}

/// Log every aggregate arriving on the cloud topic
///
/// Returns the number of aggregate payloads received.
pub async fn cloud_consumer_task(
    mut subscription: Subscription,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    log::info!("☁️  Cloud consumer listening on {}", subscription.topic());
    let mut received = 0u64;

    loop {
        tokio::select! {
            // Drain what is already queued before honouring shutdown
            biased;

            payload = subscription.recv() => {
                let payload = match payload {
                    Some(payload) => payload,
                    None => break,
                };
                received += 1;

                let text = String::from_utf8_lossy(&payload);
                match text.parse::<AggregatePayload>() {
                    Ok(aggregate) => log::info!("☁️  Aggregate received: {:?}", aggregate.values()),
                    Err(e) => log::warn!("⚠️  Unreadable aggregate payload {:?}: {}", text, e),
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    log::info!("✅ Cloud consumer stopped after {} aggregates", received);
    received
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Broker;

    #[tokio::test(start_paused = true)]
    async fn test_publishes_simulated_sequence() {
        let broker = Arc::new(Broker::new("edge", 100));
        let mut subscription = broker.subscribe("sensor/data").unwrap();
        let (_stop_tx, stop_rx) = watch::channel(false);

        let published = publish_samples(
            Simulator::new(12345, 20.0, 5.0),
            ArrivalClock::new(12345),
            broker.clone(),
            "sensor/data".to_string(),
            10.0,
            5,
            stop_rx,
        )
        .await;
        assert_eq!(published, 5);

        let expected: Vec<String> = Simulator::new(12345, 20.0, 5.0)
            .take(5)
            .map(|v| v.to_string())
            .collect();
        for value in expected {
            let payload = subscription.recv().await.unwrap();
            assert_eq!(String::from_utf8(payload).unwrap(), value);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_stops_on_disconnect() {
        let broker = Arc::new(Broker::new("edge", 100));
        broker.disconnect();
        let (_stop_tx, stop_rx) = watch::channel(false);

        let published = publish_samples(
            Simulator::new(1, 20.0, 5.0),
            ArrivalClock::new(1),
            broker,
            "sensor/data".to_string(),
            10.0,
            100,
            stop_rx,
        )
        .await;
        assert_eq!(published, 0);
    }

    #[tokio::test]
    async fn test_cloud_consumer_counts_payloads() {
        let broker = Broker::new("cloud", 10);
        let subscription = broker.subscribe("sensor/average").unwrap();
        let (_stop_tx, stop_rx) = watch::channel(false);

        broker.publish("sensor/average", "15.0".to_string()).await.unwrap();
        broker.publish("sensor/average", "[5.0]".to_string()).await.unwrap();
        broker.disconnect();

        assert_eq!(cloud_consumer_task(subscription, stop_rx).await, 2);
    }
}
