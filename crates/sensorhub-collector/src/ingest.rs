//! Inbound reading ingest.
//!
//! Every message arriving on the data subscription passes through
//! [`Ingestor::on_message`]. The handler never returns an error: a
//! malformed payload or a failed write is logged and dropped so one bad
//! message cannot stall the collector loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task;
use tracing::{debug, error, warn};

use sensorhub_core::config::ingest;
use sensorhub_core::{topics, ReadingMessage, SensorState};
use sensorhub_storage::{Reading, ReadingStore};

use crate::session::SessionTracker;

/// Decodes, labels, and persists incoming readings.
pub struct Ingestor {
    store: Arc<ReadingStore>,
    sessions: Arc<SessionTracker>,
}

impl Ingestor {
    pub fn new(store: Arc<ReadingStore>, sessions: Arc<SessionTracker>) -> Self {
        Self { store, sessions }
    }

    /// Handle one raw message from the data subscription.
    ///
    /// The sensor id comes from the topic; a differing id in the payload is
    /// logged and ignored. A missing timestamp is replaced with ingest time.
    pub async fn on_message(&self, topic: &str, payload: &[u8]) {
        let Some(topic_id) = topics::parse_data(topic) else {
            warn!(topic = %topic, "ignoring message on unexpected topic");
            return;
        };

        let message = match ReadingMessage::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(topic = %topic, "dropping malformed reading: {}", e);
                return;
            }
        };

        if message.sensor_id != topic_id {
            warn!(
                topic_id = %topic_id,
                payload_id = %message.sensor_id,
                "payload sensor id disagrees with topic, using topic"
            );
        }
        let sensor_id = topic_id.to_string();

        let timestamp = message
            .timestamp
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis() as f64 / 1000.0);

        let state = if self.sessions.is_streaming(&sensor_id).await {
            SensorState::Streaming
        } else {
            SensorState::Idle
        };

        let reading = Reading {
            seq: 0,
            sensor_id,
            timestamp,
            value: message.value,
            kind: message.kind,
        };

        self.persist(reading, state).await;
    }

    /// Write with bounded retries. The store write is blocking, so it runs
    /// off the async worker threads with a timeout around each attempt.
    async fn persist(&self, reading: Reading, state: SensorState) {
        let mut backoff = Duration::from_millis(ingest::RETRY_BACKOFF_MS);

        for attempt in 1..=ingest::WRITE_ATTEMPTS {
            let store = self.store.clone();
            let attempt_reading = reading.clone();
            let write = task::spawn_blocking(move || {
                store.record_reading(&attempt_reading, state)
            });

            match tokio::time::timeout(
                Duration::from_secs(ingest::STORE_TIMEOUT_SECS),
                write,
            )
            .await
            {
                Ok(Ok(Ok(seq))) => {
                    debug!(
                        sensor_id = %reading.sensor_id,
                        seq,
                        value = reading.value,
                        "reading stored"
                    );
                    return;
                }
                Ok(Ok(Err(e))) => {
                    warn!(
                        sensor_id = %reading.sensor_id,
                        attempt,
                        "store write failed: {}",
                        e
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        sensor_id = %reading.sensor_id,
                        attempt,
                        "store write task failed: {}",
                        e
                    );
                }
                Err(_) => {
                    warn!(
                        sensor_id = %reading.sensor_id,
                        attempt,
                        "store write timed out"
                    );
                }
            }

            if attempt < ingest::WRITE_ATTEMPTS {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        error!(
            sensor_id = %reading.sensor_id,
            attempts = ingest::WRITE_ATTEMPTS,
            "dropping reading after repeated write failures"
        );
    }
}
