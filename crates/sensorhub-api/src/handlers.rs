//! API handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::json;

use sensorhub_collector::CommandParams;
use sensorhub_core::config::api;
use sensorhub_core::Target;

use crate::models::{
    ApiResult, CommandRequest, CommandResponse, ErrorResponse, ReadingInfo, ReadingsQuery,
    SensorInfo,
};
use crate::server::ServerState;

/// Service health, including broker connection status.
pub async fn health_handler(State(state): State<ServerState>) -> Json<serde_json::Value> {
    let broker = *state.broker_status.read().await;
    let uptime = (chrono::Utc::now().timestamp() - state.started_at).max(0);

    Json(json!({
        "status": "ok",
        "service": "sensorhub",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": uptime,
        "broker": broker,
    }))
}

/// All known sensors with derived liveness.
pub async fn list_sensors_handler(
    State(state): State<ServerState>,
) -> ApiResult<Json<Vec<SensorInfo>>> {
    let sensors = state.store.list_sensors()?;
    Ok(Json(sensors.into_iter().map(SensorInfo::from).collect()))
}

/// One sensor by id.
pub async fn get_sensor_handler(
    State(state): State<ServerState>,
    Path(sensor_id): Path<String>,
) -> ApiResult<Json<SensorInfo>> {
    match state.store.get_sensor(&sensor_id)? {
        Some(record) => Ok(Json(SensorInfo::from(record))),
        None => Err(ErrorResponse::not_found(format!(
            "unknown sensor: {}",
            sensor_id
        ))),
    }
}

/// Recent readings, newest first, optionally scoped to one sensor.
pub async fn list_readings_handler(
    State(state): State<ServerState>,
    Query(query): Query<ReadingsQuery>,
) -> ApiResult<Json<Vec<ReadingInfo>>> {
    let limit = query
        .limit
        .unwrap_or(api::DEFAULT_READING_LIMIT)
        .min(api::MAX_READING_LIMIT);

    let readings = match query.sensor.as_deref() {
        Some(sensor_id) => state.store.list_readings_for(sensor_id, limit)?,
        None => state.store.list_readings(limit)?,
    };

    Ok(Json(readings.into_iter().map(ReadingInfo::from).collect()))
}

/// Dispatch a command to one sensor or to all of them.
pub async fn send_command_handler(
    State(state): State<ServerState>,
    Path(target): Path<String>,
    Json(request): Json<CommandRequest>,
) -> ApiResult<Json<CommandResponse>> {
    let target = Target::parse(&target);
    let params = CommandParams {
        count: request.count,
        interval: request.interval,
    };

    let result = state
        .dispatcher
        .dispatch(target.clone(), request.operation, params)
        .await?;

    Ok(Json(CommandResponse {
        status: "sent",
        target: target.to_string(),
        operation: result.operation.to_string(),
        topic: result.topic,
    }))
}
