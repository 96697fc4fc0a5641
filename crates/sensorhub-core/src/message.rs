//! Wire message formats and the bus topic scheme.
//!
//! Data flows on `sensors/<id>/data`; commands flow on `sensors/<id>/cmd`
//! with `sensors/all/cmd` as the broadcast channel every sensor subscribes
//! to. Payloads are JSON on both directions.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Topic scheme helpers.
pub mod topics {
    /// Wildcard subscription covering every sensor's data topic.
    pub const DATA_SUBSCRIPTION: &str = "sensors/+/data";

    /// Target segment addressing all sensors at once.
    pub const BROADCAST: &str = "all";

    /// Data topic for a specific sensor.
    pub fn data(sensor_id: &str) -> String {
        format!("sensors/{}/data", sensor_id)
    }

    /// Command topic for a target segment (sensor id or `all`).
    pub fn command(target: &str) -> String {
        format!("sensors/{}/cmd", target)
    }

    /// Extract the sensor id from a data topic.
    ///
    /// Returns `None` when the topic does not match `sensors/<id>/data`.
    pub fn parse_data(topic: &str) -> Option<&str> {
        let mut parts = topic.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("sensors"), Some(id), Some("data"), None) if !id.is_empty() && id != "+" => {
                Some(id)
            }
            _ => None,
        }
    }
}

/// A reading published by a sensor on its data topic.
///
/// `timestamp` is the sensor's own measurement time in unix seconds; when
/// absent the collector substitutes ingest time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadingMessage {
    pub sensor_id: String,
    pub kind: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl ReadingMessage {
    /// Decode a data payload, failing closed on bad JSON or missing fields.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| Error::Malformed(e.to_string()))
    }
}

/// Command operations a sensor understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Emit a fixed number of readings, then return to idle.
    Measure,
    /// Begin continuous emission until stopped.
    Start,
    /// Cease emission.
    Stop,
}

impl Operation {
    pub fn type_name(&self) -> &'static str {
        match self {
            Operation::Measure => "measure",
            Operation::Start => "start",
            Operation::Stop => "stop",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Command target: one sensor or the broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Sensor(String),
    Broadcast,
}

impl Target {
    /// Parse the path/topic segment form (`all` means broadcast).
    pub fn parse(segment: &str) -> Self {
        if segment == topics::BROADCAST {
            Target::Broadcast
        } else {
            Target::Sensor(segment.to_string())
        }
    }

    /// The command topic this target is addressed on.
    pub fn command_topic(&self) -> String {
        match self {
            Target::Sensor(id) => topics::command(id),
            Target::Broadcast => topics::command(topics::BROADCAST),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Sensor(id) => write!(f, "{}", id),
            Target::Broadcast => write!(f, "{}", topics::BROADCAST),
        }
    }
}

/// A command published on a command topic.
///
/// `count` is present only for `measure`; `interval` for `measure` and
/// `start`. Absent fields are omitted from the encoded payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandMessage {
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,
}

impl CommandMessage {
    pub fn measure(count: u32, interval: f64) -> Self {
        Self {
            operation: Operation::Measure,
            count: Some(count),
            interval: Some(interval),
        }
    }

    pub fn start(interval: f64) -> Self {
        Self {
            operation: Operation::Start,
            count: None,
            interval: Some(interval),
        }
    }

    pub fn stop() -> Self {
        Self {
            operation: Operation::Stop,
            count: None,
            interval: None,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| Error::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_topic() {
        assert_eq!(topics::parse_data("sensors/temp1/data"), Some("temp1"));
        assert_eq!(topics::parse_data("sensors/temp1/cmd"), None);
        assert_eq!(topics::parse_data("sensors//data"), None);
        assert_eq!(topics::parse_data("sensors/a/b/data"), None);
        assert_eq!(topics::parse_data("other/temp1/data"), None);
    }

    #[test]
    fn test_target_topics() {
        assert_eq!(
            Target::Sensor("temp1".into()).command_topic(),
            "sensors/temp1/cmd"
        );
        assert_eq!(Target::Broadcast.command_topic(), "sensors/all/cmd");
        assert_eq!(Target::parse("all"), Target::Broadcast);
        assert_eq!(Target::parse("hum2"), Target::Sensor("hum2".into()));
    }

    #[test]
    fn test_reading_decode_missing_value() {
        let payload = br#"{"sensor_id":"temp1","kind":"temperature"}"#;
        assert!(ReadingMessage::decode(payload).is_err());
    }

    #[test]
    fn test_reading_decode_optional_timestamp() {
        let payload = br#"{"sensor_id":"temp1","kind":"temperature","value":23.5}"#;
        let msg = ReadingMessage::decode(payload).unwrap();
        assert_eq!(msg.value, 23.5);
        assert!(msg.timestamp.is_none());
    }

    #[test]
    fn test_command_roundtrip_exact() {
        let cmd = CommandMessage::measure(10, 0.5);
        let decoded = CommandMessage::decode(&cmd.encode().unwrap()).unwrap();
        assert_eq!(decoded.count, Some(10));
        assert_eq!(decoded.interval, Some(0.5));
        assert_eq!(decoded.operation, Operation::Measure);
    }

    #[test]
    fn test_stop_encodes_without_params() {
        let encoded = CommandMessage::stop().encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(json, serde_json::json!({"operation": "stop"}));
    }
}
