//! Pub/sub publisher backed by an MQTT broker connection

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tracing::{debug, error, info, warn};

use crate::config::BrokerConfig;
use crate::error::{RelayError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const REQUEST_CAPACITY: usize = 64;

/// Invoked with `(topic, message)` for every message received on a topic
pub type MessageCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Fire-and-forget send of `message` to `topic`. Must not wait on the broker.
    async fn publish(&self, topic: &str, message: String) -> Result<()>;

    async fn subscribe(&self, topic: &str, callback: MessageCallback) -> Result<()>;
}

/// Callbacks keyed by exact topic name
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<RwLock<HashMap<String, Vec<MessageCallback>>>>,
}

impl SubscriptionRegistry {
    pub fn register(&self, topic: &str, callback: MessageCallback) {
        if let Ok(mut guard) = self.inner.write() {
            guard.entry(topic.to_string()).or_default().push(callback);
        }
    }

    pub fn topics(&self) -> Vec<String> {
        self.inner
            .read()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Runs every callback registered for `topic`, returning how many ran
    pub fn dispatch(&self, topic: &str, message: &str) -> usize {
        let callbacks = match self.inner.read() {
            Ok(guard) => guard.get(topic).cloned().unwrap_or_default(),
            Err(_) => return 0,
        };
        for callback in &callbacks {
            callback(topic, message);
        }
        callbacks.len()
    }
}

pub struct MqttPublisher {
    client: AsyncClient,
    subscriptions: SubscriptionRegistry,
}

impl MqttPublisher {
    /// Connect to the broker and wait for its CONNACK.
    ///
    /// The event loop is only handed to a background task once the broker
    /// has accepted the connection, so a bad address or bad credentials
    /// surface here.
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let Some(user) = &config.user {
            options.set_credentials(user.clone(), config.password.clone().unwrap_or_default());
        }

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        tokio::time::timeout(CONNECT_TIMEOUT, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| {
                RelayError::BrokerError(format!(
                    "timed out connecting to {}:{}",
                    config.host, config.port
                ))
            })??;
        info!("Connected to broker at {}:{}", config.host, config.port);

        let subscriptions = SubscriptionRegistry::default();
        tokio::spawn(run_event_loop(eventloop, client.clone(), subscriptions.clone()));

        Ok(Self {
            client,
            subscriptions,
        })
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    /// Queues the message for the event loop. Fails instead of waiting when
    /// the request buffer is full, e.g. while the broker is unreachable.
    async fn publish(&self, topic: &str, message: String) -> Result<()> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, message)
            .map_err(|e| RelayError::PublishError(e.to_string()))
    }

    async fn subscribe(&self, topic: &str, callback: MessageCallback) -> Result<()> {
        self.subscriptions.register(topic, callback);
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| RelayError::BrokerError(e.to_string()))
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => continue,
            Err(e) => return Err(RelayError::BrokerError(e.to_string())),
        }
    }
}

/// Drives the connection for the lifetime of the process
async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    subscriptions: SubscriptionRegistry,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = String::from_utf8_lossy(&publish.payload);
                if subscriptions.dispatch(&publish.topic, &message) == 0 {
                    debug!("No subscriber for message on '{}'", publish.topic);
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Reconnected to broker");
                for topic in subscriptions.topics() {
                    if let Err(e) = client.try_subscribe(topic.clone(), QoS::AtLeastOnce) {
                        error!("Failed to resubscribe to '{}': {}", topic, e);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Broker connection error: {}", e);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
