//! Sensor operational state.

use serde::{Deserialize, Serialize};

/// Operational state of a sensor as tracked by the collector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SensorState {
    /// Not currently emitting.
    Idle,
    /// Executing a one-shot measure command. The collector cannot observe
    /// this state today: sensors do not report state transitions, and a
    /// measure command carries no session the ingest path could consult.
    /// Kept so stored records can represent it once sensors report it.
    Measuring,
    /// Continuous emission is active.
    Streaming,
    /// No state signal observed yet.
    #[default]
    Unknown,
}

impl SensorState {
    pub fn type_name(&self) -> &'static str {
        match self {
            SensorState::Idle => "idle",
            SensorState::Measuring => "measuring",
            SensorState::Streaming => "streaming",
            SensorState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SensorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}
