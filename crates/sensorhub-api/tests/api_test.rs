//! End-to-end handler tests over the router, no network involved.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::{Mutex, RwLock};
use tower::ServiceExt;

use sensorhub_api::{create_router, ServerState};
use sensorhub_collector::{BusPublisher, CommandDispatcher, ConnectionStatus, SessionTracker};
use sensorhub_core::{CommandMessage, Operation, SensorState};
use sensorhub_storage::{Reading, ReadingStore};

#[derive(Default)]
struct RecordingBus {
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

#[async_trait]
impl BusPublisher for RecordingBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> sensorhub_core::Result<()> {
        self.published
            .lock()
            .await
            .push((topic.to_string(), payload));
        Ok(())
    }
}

fn test_state() -> (ServerState, Arc<ReadingStore>, Arc<RecordingBus>) {
    let store = Arc::new(ReadingStore::memory().unwrap());
    let bus = Arc::new(RecordingBus::default());
    let sessions = Arc::new(SessionTracker::new());
    let dispatcher = Arc::new(CommandDispatcher::new(bus.clone(), sessions));
    let status = Arc::new(RwLock::new(ConnectionStatus::Connected));
    let state = ServerState::new(store.clone(), dispatcher, status);
    (state, store, bus)
}

fn reading(sensor_id: &str, value: f64) -> Reading {
    Reading {
        seq: 0,
        sensor_id: sensor_id.to_string(),
        timestamp: chrono::Utc::now().timestamp() as f64,
        value,
        kind: "temperature".to_string(),
    }
}

async fn get_json(state: ServerState, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = create_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn post_json(
    state: ServerState,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = create_router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_reports_broker_status() {
    let (state, _, _) = test_state();

    let (status, json) = get_json(state, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["broker"], "connected");
}

#[tokio::test]
async fn test_list_sensors() {
    let (state, store, _) = test_state();

    let (status, json) = get_json(state.clone(), "/api/sensors").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 0);

    store
        .record_reading(&reading("temp1", 23.5), SensorState::Idle)
        .unwrap();

    let (_, json) = get_json(state, "/api/sensors").await;
    let sensors = json.as_array().unwrap();
    assert_eq!(sensors.len(), 1);
    assert_eq!(sensors[0]["sensor_id"], "temp1");
    assert_eq!(sensors[0]["last_value"], 23.5);
    assert_eq!(sensors[0]["online"], true);
    assert_eq!(sensors[0]["state"], "idle");
}

#[tokio::test]
async fn test_get_sensor_not_found() {
    let (state, _, _) = test_state();

    let (status, json) = get_json(state, "/api/sensors/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_readings_default_limit() {
    let (state, store, _) = test_state();

    for i in 0..25 {
        store
            .record_reading(&reading("temp1", i as f64), SensorState::Idle)
            .unwrap();
    }

    let (status, json) = get_json(state, "/api/readings").await;
    assert_eq!(status, StatusCode::OK);
    let readings = json.as_array().unwrap();
    assert_eq!(readings.len(), 20);
    assert_eq!(readings[0]["value"], 24.0);
}

#[tokio::test]
async fn test_readings_filtered_by_sensor() {
    let (state, store, _) = test_state();

    store
        .record_reading(&reading("temp1", 1.0), SensorState::Idle)
        .unwrap();
    store
        .record_reading(&reading("hum1", 50.0), SensorState::Idle)
        .unwrap();

    let (_, json) = get_json(state.clone(), "/api/readings?sensor=hum1").await;
    let readings = json.as_array().unwrap();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0]["sensor_id"], "hum1");

    let (_, json) = get_json(state, "/api/readings?sensor=hum1&limit=0").await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_send_measure_command() {
    let (state, _, bus) = test_state();

    let (status, json) = post_json(
        state,
        "/api/command/temp1",
        serde_json::json!({"operation": "measure", "count": 5, "interval": 0.5}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "sent");
    assert_eq!(json["topic"], "sensors/temp1/cmd");

    let published = bus.published.lock().await;
    assert_eq!(published.len(), 1);
    let decoded = CommandMessage::decode(&published[0].1).unwrap();
    assert_eq!(decoded.operation, Operation::Measure);
    assert_eq!(decoded.count, Some(5));
}

#[tokio::test]
async fn test_broadcast_command_targets_all() {
    let (state, _, bus) = test_state();

    let (status, _) = post_json(
        state,
        "/api/command/all",
        serde_json::json!({"operation": "stop"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(bus.published.lock().await[0].0, "sensors/all/cmd");
}

#[tokio::test]
async fn test_invalid_count_rejected() {
    let (state, _, bus) = test_state();

    let (status, json) = post_json(
        state,
        "/api/command/temp1",
        serde_json::json!({"operation": "measure", "count": 0}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "invalid_request");
    assert!(bus.published.lock().await.is_empty());
}

#[tokio::test]
async fn test_unknown_operation_rejected() {
    let (state, _, bus) = test_state();

    let (status, _) = post_json(
        state,
        "/api/command/temp1",
        serde_json::json!({"operation": "reboot"}),
    )
    .await;

    assert!(status.is_client_error());
    assert!(bus.published.lock().await.is_empty());
}
