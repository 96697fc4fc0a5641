//! Ingest pipeline tests against a temp-file backed store.

use std::sync::Arc;

use sensorhub_collector::{Ingestor, SessionTracker};
use sensorhub_storage::ReadingStore;

fn ingestor() -> (Ingestor, Arc<ReadingStore>, Arc<SessionTracker>) {
    let store = Arc::new(ReadingStore::memory().unwrap());
    let sessions = Arc::new(SessionTracker::new());
    let ingestor = Ingestor::new(store.clone(), sessions.clone());
    (ingestor, store, sessions)
}

fn payload(sensor_id: &str, value: f64, timestamp: Option<f64>) -> Vec<u8> {
    let mut body = serde_json::json!({
        "sensor_id": sensor_id,
        "kind": "temperature",
        "value": value,
    });
    if let Some(ts) = timestamp {
        body["timestamp"] = serde_json::json!(ts);
    }
    serde_json::to_vec(&body).unwrap()
}

#[tokio::test]
async fn test_reading_persisted_and_sensor_registered() {
    let (ingestor, store, _) = ingestor();

    ingestor
        .on_message("sensors/temp1/data", &payload("temp1", 23.5, Some(1_700_000_000.0)))
        .await;

    let readings = store.list_readings_for("temp1", 10).unwrap();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].value, 23.5);
    assert_eq!(readings[0].timestamp, 1_700_000_000.0);

    let sensor = store.get_sensor("temp1").unwrap().unwrap();
    assert_eq!(sensor.last_value, 23.5);
    assert_eq!(sensor.kind, "temperature");
}

#[tokio::test]
async fn test_missing_timestamp_uses_ingest_time() {
    let (ingestor, store, _) = ingestor();

    let before = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
    ingestor
        .on_message("sensors/temp1/data", &payload("temp1", 1.0, None))
        .await;
    let after = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;

    let readings = store.list_readings_for("temp1", 1).unwrap();
    assert!(readings[0].timestamp >= before);
    assert!(readings[0].timestamp <= after);
}

#[tokio::test]
async fn test_malformed_payload_leaves_store_unchanged() {
    let (ingestor, store, _) = ingestor();

    ingestor.on_message("sensors/temp1/data", b"not json").await;
    ingestor
        .on_message(
            "sensors/temp1/data",
            br#"{"sensor_id":"temp1","kind":"temperature"}"#,
        )
        .await;

    assert_eq!(store.sensor_count().unwrap(), 0);
    assert!(store.list_readings(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_unrelated_topic_ignored() {
    let (ingestor, store, _) = ingestor();

    ingestor
        .on_message("sensors/temp1/cmd", &payload("temp1", 1.0, None))
        .await;

    assert_eq!(store.sensor_count().unwrap(), 0);
}

#[tokio::test]
async fn test_topic_id_wins_over_payload_id() {
    let (ingestor, store, _) = ingestor();

    ingestor
        .on_message("sensors/temp1/data", &payload("impostor", 9.0, None))
        .await;

    assert!(store.get_sensor("impostor").unwrap().is_none());
    let sensor = store.get_sensor("temp1").unwrap().unwrap();
    assert_eq!(sensor.last_value, 9.0);
}

#[tokio::test]
async fn test_streaming_state_applied_during_session() {
    let (ingestor, store, sessions) = ingestor();

    ingestor
        .on_message("sensors/temp1/data", &payload("temp1", 1.0, None))
        .await;
    assert_eq!(
        store.get_sensor("temp1").unwrap().unwrap().state,
        sensorhub_core::SensorState::Idle
    );

    sessions.open("temp1", 0.5).await;
    ingestor
        .on_message("sensors/temp1/data", &payload("temp1", 2.0, None))
        .await;
    assert_eq!(
        store.get_sensor("temp1").unwrap().unwrap().state,
        sensorhub_core::SensorState::Streaming
    );
}

#[tokio::test]
async fn test_concurrent_ingest_keeps_all_readings() {
    let (ingestor, store, _) = ingestor();
    let ingestor = Arc::new(ingestor);

    let mut handles = Vec::new();
    for i in 0..10 {
        let ingestor = ingestor.clone();
        let (id, value) = if i % 2 == 0 {
            ("temp1", i as f64)
        } else {
            ("hum1", i as f64)
        };
        handles.push(tokio::spawn(async move {
            ingestor
                .on_message(&format!("sensors/{}/data", id), &payload(id, value, None))
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.reading_count("temp1").unwrap(), 5);
    assert_eq!(store.reading_count("hum1").unwrap(), 5);
    assert_eq!(store.sensor_count().unwrap(), 2);
}

#[tokio::test]
async fn test_readings_listed_newest_first() {
    let (ingestor, store, _) = ingestor();

    for i in 0..5 {
        ingestor
            .on_message("sensors/temp1/data", &payload("temp1", i as f64, None))
            .await;
    }

    let readings = store.list_readings_for("temp1", 3).unwrap();
    assert_eq!(readings.len(), 3);
    assert_eq!(readings[0].value, 4.0);
    assert_eq!(readings[1].value, 3.0);
    assert_eq!(readings[2].value, 2.0);
}
