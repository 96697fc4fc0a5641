//! Configuration defaults and environment helpers.
//!
//! All tunables live here so the crates that share them do not redefine
//! the same constants.

/// MQTT broker defaults. The broker runs on the same edge node as the
/// collector in the reference deployment.
pub mod broker {
    pub const HOST: &str = "localhost";
    pub const PORT: u16 = 1883;
    pub const KEEP_ALIVE_SECS: u64 = 60;
    /// Capacity of the rumqttc request channel.
    pub const CHANNEL_CAPACITY: usize = 16;
}

/// Ingest pipeline tunables.
pub mod ingest {
    /// Store-write attempts before a message is dropped.
    pub const WRITE_ATTEMPTS: u32 = 3;
    /// Base backoff between attempts; doubles per retry.
    pub const RETRY_BACKOFF_MS: u64 = 100;
    /// Deadline for a single store write.
    pub const STORE_TIMEOUT_SECS: u64 = 5;
}

/// Dispatcher tunables.
pub mod dispatch {
    /// Deadline for a single bus publish.
    pub const PUBLISH_TIMEOUT_SECS: u64 = 5;
}

/// Sensor liveness.
pub mod liveness {
    /// A sensor not seen within this window is reported offline.
    pub const STALE_AFTER_MS: i64 = 300_000;
}

/// HTTP API defaults.
pub mod api {
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 8080;
    /// Readings returned when the query does not specify a limit.
    pub const DEFAULT_READING_LIMIT: usize = 20;
    /// Hard cap on readings per query.
    pub const MAX_READING_LIMIT: usize = 1000;
}

/// Environment variable names.
pub mod env_vars {
    /// Set to "1"/"true" to emit JSON logs (container environments).
    pub const LOG_JSON: &str = "SENSORHUB_LOG_JSON";

    /// Whether JSON logging was requested.
    pub fn log_json() -> bool {
        std::env::var(LOG_JSON)
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}
