//! Request and response models for the web API.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use sensorhub_core::{Error, Operation, SensorState};
use sensorhub_storage::{Reading, SensorRecord};

/// Command request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub operation: Operation,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub interval: Option<f64>,
}

/// Command dispatch response.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: &'static str,
    pub target: String,
    pub operation: String,
    pub topic: String,
}

/// A sensor as reported by the API, with derived liveness.
#[derive(Debug, Serialize)]
pub struct SensorInfo {
    pub sensor_id: String,
    pub kind: String,
    /// Unix millis of the last reading.
    pub last_seen: i64,
    pub last_value: f64,
    pub state: SensorState,
    /// False once the sensor passes the stale window without a reading.
    pub online: bool,
}

impl From<SensorRecord> for SensorInfo {
    fn from(record: SensorRecord) -> Self {
        let online = !record.is_stale();
        Self {
            sensor_id: record.sensor_id,
            kind: record.kind,
            last_seen: record.last_seen,
            last_value: record.last_value,
            state: record.state,
            online,
        }
    }
}

/// A stored reading as reported by the API.
#[derive(Debug, Serialize)]
pub struct ReadingInfo {
    pub id: u64,
    pub sensor_id: String,
    /// Unix seconds, sensor-reported or ingest time.
    pub timestamp: f64,
    pub value: f64,
    pub kind: String,
}

impl From<Reading> for ReadingInfo {
    fn from(reading: Reading) -> Self {
        Self {
            id: reading.seq,
            sensor_id: reading.sensor_id,
            timestamp: reading.timestamp,
            value: reading.value,
            kind: reading.kind,
        }
    }
}

/// Query parameters for the readings listing.
#[derive(Debug, Default, Deserialize)]
pub struct ReadingsQuery {
    /// Restrict to one sensor.
    pub sensor: Option<String>,
    /// Maximum rows to return.
    pub limit: Option<usize>,
}

/// Error payload returned by every failing endpoint.
#[derive(Debug)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_request",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal_error",
            message: message.into(),
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            code: "upstream_error",
            message: message.into(),
        }
    }
}

impl From<Error> for ErrorResponse {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidParameter(m) | Error::Malformed(m) => Self::bad_request(m),
            Error::NotFound(m) => Self::not_found(m),
            Error::Transport(m) | Error::Timeout(m) => Self::bad_gateway(m),
            Error::Storage(m) => Self::internal(m),
        }
    }
}

impl From<sensorhub_storage::Error> for ErrorResponse {
    fn from(e: sensorhub_storage::Error) -> Self {
        Self::from(Error::from(e))
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        let body = Json(json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}

/// Result alias used by all handlers.
pub type ApiResult<T> = std::result::Result<T, ErrorResponse>;
