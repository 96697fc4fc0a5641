//! MQTT transport: outbound command publishing and the inbound data loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use sensorhub_core::config::{broker, dispatch};
use sensorhub_core::{topics, Error, Result};

use crate::ingest::Ingestor;

/// Cap on the backoff applied between reconnect attempts.
const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(30);

/// Broker connection parameters.
#[derive(Debug, Clone)]
pub struct MqttBusConfig {
    pub host: String,
    pub port: u16,
    /// Client id; a random one is generated when not set.
    pub client_id: Option<String>,
    pub keep_alive: Duration,
}

impl Default for MqttBusConfig {
    fn default() -> Self {
        Self {
            host: broker::HOST.to_string(),
            port: broker::PORT,
            client_id: None,
            keep_alive: Duration::from_secs(broker::KEEP_ALIVE_SECS),
        }
    }
}

impl MqttBusConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    fn options(&self) -> MqttOptions {
        let client_id = self
            .client_id
            .clone()
            .unwrap_or_else(|| format!("sensorhub_{}", uuid::Uuid::new_v4()));
        let mut opts = MqttOptions::new(client_id, &self.host, self.port);
        opts.set_keep_alive(self.keep_alive);
        opts
    }
}

/// Connection status of the collector loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// Outbound publisher seam. The dispatcher talks to the broker through
/// this trait so command logic can be tested without a live connection.
#[async_trait]
pub trait BusPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// Command publisher backed by a live rumqttc client.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
}

impl MqttBus {
    /// Connect a publish-only client, with no data subscription.
    ///
    /// The returned task drives the connection and ends once the client
    /// disconnects. Used by one-shot command sending from the CLI.
    pub fn connect(config: &MqttBusConfig) -> (Self, JoinHandle<()>) {
        let (client, mut eventloop) = AsyncClient::new(config.options(), broker::CHANNEL_CAPACITY);
        let handle = tokio::spawn(async move {
            loop {
                if let Err(e) = eventloop.poll().await {
                    debug!("publisher connection closed: {}", e);
                    break;
                }
            }
        });
        (Self { client }, handle)
    }

    pub async fn disconnect(&self) {
        let _ = self.client.disconnect().await;
    }
}

#[async_trait]
impl BusPublisher for MqttBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let publish = self
            .client
            .publish(topic, QoS::AtLeastOnce, false, payload);
        match tokio::time::timeout(
            Duration::from_secs(dispatch::PUBLISH_TIMEOUT_SECS),
            publish,
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Transport(format!("publish to {} failed: {}", topic, e))),
            Err(_) => Err(Error::Timeout(format!("publish to {} timed out", topic))),
        }
    }
}

/// Owns the broker connection and the inbound event loop.
///
/// Readings arriving on the data subscription are handed to the
/// [`Ingestor`]; a failed write never takes the loop down. The loop
/// reconnects with capped exponential backoff until shut down.
pub struct MqttCollector {
    client: AsyncClient,
    status: Arc<RwLock<ConnectionStatus>>,
    shutdown_tx: watch::Sender<bool>,
    loop_handle: JoinHandle<()>,
}

impl MqttCollector {
    /// Connect to the broker, subscribe to the data topic, and spawn the
    /// event loop.
    pub fn connect(config: &MqttBusConfig, ingestor: Arc<Ingestor>) -> Self {
        let (client, eventloop) =
            AsyncClient::new(config.options(), broker::CHANNEL_CAPACITY);

        let status = Arc::new(RwLock::new(ConnectionStatus::Connecting));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            host = %config.host,
            port = config.port,
            topic = topics::DATA_SUBSCRIPTION,
            "connecting to broker"
        );

        let loop_handle = tokio::spawn(event_loop(
            eventloop,
            client.clone(),
            ingestor,
            status.clone(),
            shutdown_rx,
        ));

        Self {
            client,
            status,
            shutdown_tx,
            loop_handle,
        }
    }

    /// A cloneable publisher sharing this connection.
    pub fn publisher(&self) -> MqttBus {
        MqttBus {
            client: self.client.clone(),
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        *self.status.read().await
    }

    /// Shared handle to the connection status, for surfacing it elsewhere
    /// (the HTTP health endpoint reads it).
    pub fn status_handle(&self) -> Arc<RwLock<ConnectionStatus>> {
        self.status.clone()
    }

    /// Stop the event loop, letting any in-flight reading finish first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.client.disconnect().await;
        if let Err(e) = self.loop_handle.await {
            warn!("collector loop did not shut down cleanly: {}", e);
        }
        *self.status.write().await = ConnectionStatus::Disconnected;
        info!("collector disconnected");
    }
}

async fn event_loop(
    mut eventloop: rumqttc::EventLoop,
    client: AsyncClient,
    ingestor: Arc<Ingestor>,
    status: Arc<RwLock<ConnectionStatus>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut consecutive_errors: u32 = 0;

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                debug!("collector loop shutting down");
                break;
            }
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    consecutive_errors = 0;
                    *status.write().await = ConnectionStatus::Connected;
                    info!("broker connection established");
                    // The broker does not retain subscriptions across a
                    // clean-session reconnect; subscribe on every ConnAck.
                    if let Err(e) = client
                        .subscribe(topics::DATA_SUBSCRIPTION, QoS::AtLeastOnce)
                        .await
                    {
                        warn!("data subscription failed: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    consecutive_errors = 0;
                    // Awaited in-loop: a message is fully handled before the
                    // next poll, so shutdown drains the one in flight.
                    ingestor.on_message(&publish.topic, &publish.payload).await;
                }
                Ok(_) => {
                    consecutive_errors = 0;
                }
                Err(e) => {
                    *status.write().await = ConnectionStatus::Error;
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    let backoff = reconnect_backoff(consecutive_errors);
                    error!(
                        errors = consecutive_errors,
                        "broker connection error, retrying in {:?}: {}",
                        backoff,
                        e
                    );
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
    }

    *status.write().await = ConnectionStatus::Disconnected;
}

fn reconnect_backoff(consecutive_errors: u32) -> Duration {
    let exp = consecutive_errors.min(7).saturating_sub(1);
    let backoff = Duration::from_millis(500) * 2u32.pow(exp);
    backoff.min(MAX_RECONNECT_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_caps() {
        assert_eq!(reconnect_backoff(1), Duration::from_millis(500));
        assert_eq!(reconnect_backoff(2), Duration::from_secs(1));
        assert_eq!(reconnect_backoff(6), Duration::from_secs(16));
        assert_eq!(reconnect_backoff(100), MAX_RECONNECT_BACKOFF);
    }

    #[test]
    fn test_config_defaults() {
        let config = MqttBusConfig::default();
        assert_eq!(config.host, broker::HOST);
        assert_eq!(config.port, broker::PORT);
        assert!(config.client_id.is_none());
    }
}
