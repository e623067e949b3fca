//! In-process publish/subscribe transport
//!
//! Stands in for the edge and cloud brokers. The pipeline only depends on
//! two capabilities: a `Subscription` that yields payload bytes and a
//! `Publisher` that sends text to a topic. Delivery is fire-and-forget.
//! A full subscriber queue drops the message and a topic with no
//! subscribers swallows it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Broker was disconnected before the operation
    Disconnected(String),
    InvalidAddress(String),
    InvalidTopic(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Disconnected(addr) => write!(f, "Broker {} is disconnected", addr),
            TransportError::InvalidAddress(addr) => write!(f, "Invalid broker address: {:?}", addr),
            TransportError::InvalidTopic(topic) => write!(f, "Invalid topic: {:?}", topic),
        }
    }
}

impl std::error::Error for TransportError {}

/// Publish side of the transport
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Send `payload` to every current subscriber of `topic`
    async fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError>;

    /// Broker address, for logging
    fn endpoint(&self) -> &str;
}

/// Receive side of a topic subscription
pub struct Subscription {
    topic: String,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl Subscription {
    /// Next payload, or `None` once the broker disconnects
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Payloads queued but not yet received
    pub fn backlog(&self) -> usize {
        self.rx.len()
    }
}

/// One named broker holding per-topic subscriber queues
pub struct Broker {
    address: String,
    queue_capacity: usize,
    topics: Mutex<HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>>,
    closed: AtomicBool,
}

impl Broker {
    pub fn new(address: &str, queue_capacity: usize) -> Self {
        Self {
            address: address.to_string(),
            queue_capacity: queue_capacity.max(1),
            topics: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError> {
        validate_topic(topic)?;
        if !self.is_connected() {
            return Err(TransportError::Disconnected(self.address.clone()));
        }

        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.lock_topics()
            .entry(topic.to_string())
            .or_default()
            .push(tx);

        log::debug!("📡 Subscribed to {} on {}", topic, self.address);
        Ok(Subscription {
            topic: topic.to_string(),
            rx,
        })
    }

    /// Close the broker: pending subscriptions drain then end, later publishes fail
    pub fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.lock_topics().clear();
        log::info!("🔌 Broker {} disconnected", self.address);
    }

    fn lock_topics(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>> {
        self.topics.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Publisher for Broker {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        validate_topic(topic)?;
        if !self.is_connected() {
            return Err(TransportError::Disconnected(self.address.clone()));
        }

        let bytes = payload.into_bytes();
        let mut topics = self.lock_topics();
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.retain(|tx| match tx.try_send(bytes.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    log::warn!("⚠️  Subscriber queue full on {}, message dropped", topic);
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });
        }
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.address
    }
}

/// Address → broker map; the same address always yields the same live broker
#[derive(Default)]
pub struct BrokerRegistry {
    brokers: Mutex<HashMap<String, Arc<Broker>>>,
    queue_capacity: usize,
}

impl BrokerRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            brokers: Mutex::new(HashMap::new()),
            queue_capacity,
        }
    }

    pub fn connect(&self, address: &str) -> Result<Arc<Broker>, TransportError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(TransportError::InvalidAddress(address.to_string()));
        }

        let mut brokers = self.brokers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(broker) = brokers.get(address) {
            if broker.is_connected() {
                return Ok(broker.clone());
            }
        }

        let broker = Arc::new(Broker::new(address, self.queue_capacity));
        brokers.insert(address.to_string(), broker.clone());
        log::info!("🔌 Connected to broker {}", address);
        Ok(broker)
    }
}

fn validate_topic(topic: &str) -> Result<(), TransportError> {
    if topic.is_empty() || topic.contains(['+', '#']) {
        return Err(TransportError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let broker = Broker::new("edge", 8);
        let mut a = broker.subscribe("sensor/data").unwrap();
        let mut b = broker.subscribe("sensor/data").unwrap();
        let mut other = broker.subscribe("sensor/other").unwrap();

        broker.publish("sensor/data", "21.5".to_string()).await.unwrap();

        assert_eq!(a.recv().await.unwrap(), b"21.5".to_vec());
        assert_eq!(b.recv().await.unwrap(), b"21.5".to_vec());
        assert_eq!(other.backlog(), 0);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let broker = Broker::new("cloud", 8);
        assert!(broker.publish("sensor/average", "1.0".to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let broker = Broker::new("edge", 1);
        let mut sub = broker.subscribe("t").unwrap();

        broker.publish("t", "1".to_string()).await.unwrap();
        broker.publish("t", "2".to_string()).await.unwrap();

        assert_eq!(sub.recv().await.unwrap(), b"1".to_vec());
        assert_eq!(sub.backlog(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_ends_subscriptions_and_fails_publish() {
        let broker = Broker::new("edge", 8);
        let mut sub = broker.subscribe("t").unwrap();
        broker.publish("t", "queued".to_string()).await.unwrap();

        broker.disconnect();

        assert_eq!(sub.recv().await.unwrap(), b"queued".to_vec());
        assert!(sub.recv().await.is_none());
        assert_eq!(
            broker.publish("t", "late".to_string()).await,
            Err(TransportError::Disconnected("edge".to_string()))
        );
        assert!(broker.subscribe("t").is_err());
    }

    #[test]
    fn test_registry_shares_brokers_by_address() {
        let registry = BrokerRegistry::new(4);
        let a = registry.connect("192.168.168.128").unwrap();
        let b = registry.connect("192.168.168.128").unwrap();
        let c = registry.connect("192.168.168.1").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(registry.connect("  ").is_err());

        // A disconnected broker is replaced on reconnect
        a.disconnect();
        let d = registry.connect("192.168.168.128").unwrap();
        assert!(d.is_connected());
        assert!(!Arc::ptr_eq(&a, &d));
    }

    #[tokio::test]
    async fn test_wildcard_topics_rejected() {
        let broker = Broker::new("edge", 4);
        assert!(broker.subscribe("sensor/#").is_err());
        assert!(broker.publish("", "x".to_string()).await.is_err());
    }
}
