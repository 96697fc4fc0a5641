//! Sensor and reading persistence using redb.
//!
//! One database holds three tables: the sensors table (last-seen state per
//! sensor id), the append-only readings table keyed by a global sequence,
//! and a `(sensor_id, seq)` index for per-sensor queries. The sensor upsert
//! and the reading append for one message share a single write transaction,
//! so concurrent ingest cannot lose a last-seen/state update.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};

use sensorhub_core::config::liveness;
use sensorhub_core::SensorState;

use crate::Result;

// Sensors table: key = sensor_id, value = SensorRecord (JSON)
const SENSORS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("sensors");

// Readings table: key = global sequence, value = Reading (JSON), append-only
const READINGS_TABLE: TableDefinition<u64, &str> = TableDefinition::new("sensor_readings");

// Per-sensor index: key = (sensor_id, seq)
const SENSOR_INDEX_TABLE: TableDefinition<(&str, u64), ()> =
    TableDefinition::new("readings_by_sensor");

/// A known sensor with its last observed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorRecord {
    /// Sensor unique identifier
    pub sensor_id: String,
    /// Sensor type/kind (e.g., "temperature")
    pub kind: String,
    /// Last seen timestamp (unix millis)
    pub last_seen: i64,
    /// Last observed value
    pub last_value: f64,
    /// Operational state
    pub state: SensorState,
}

impl SensorRecord {
    /// Create a new sensor record.
    pub fn new(sensor_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            kind: kind.into(),
            last_seen: chrono::Utc::now().timestamp_millis(),
            last_value: 0.0,
            state: SensorState::Unknown,
        }
    }

    /// Set the last observed value.
    pub fn with_value(mut self, value: f64) -> Self {
        self.last_value = value;
        self
    }

    /// Set the operational state.
    pub fn with_state(mut self, state: SensorState) -> Self {
        self.state = state;
        self
    }

    /// Check if the sensor has not been seen within the stale window.
    pub fn is_stale(&self) -> bool {
        let now = chrono::Utc::now().timestamp_millis();
        now - self.last_seen > liveness::STALE_AFTER_MS
    }
}

/// An immutable stored reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    /// Global sequence number (assigned on append)
    #[serde(default)]
    pub seq: u64,
    /// Owning sensor
    pub sensor_id: String,
    /// Measurement time (unix seconds, sensor-reported or ingest time)
    pub timestamp: f64,
    /// Measured value
    pub value: f64,
    /// Unit/kind of the value
    pub kind: String,
}

/// Persistent store for sensors and readings.
pub struct ReadingStore {
    db: Arc<Database>,
    /// Temp file path for throwaway databases (tests), removed on drop.
    temp_path: Option<PathBuf>,
}

impl ReadingStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = if path_ref.exists() {
            tracing::debug!(path = %path_ref.display(), "opening existing database");
            Database::open(path_ref)?
        } else {
            tracing::info!(path = %path_ref.display(), "creating database");
            Database::create(path_ref)?
        };

        let store = Self {
            db: Arc::new(db),
            temp_path: None,
        };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Create a throwaway store backed by a temp file.
    ///
    /// redb has no true in-memory mode, so tests get a uniquely named file
    /// in the system temp directory instead.
    pub fn memory() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("sensorhub_{}.redb", uuid::Uuid::new_v4()));
        let db = Database::create(&path)?;
        let store = Self {
            db: Arc::new(db),
            temp_path: Some(path),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Create all tables so first reads do not fail on a fresh database.
    fn ensure_tables(&self) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let _sensors = write_txn.open_table(SENSORS_TABLE)?;
            let _readings = write_txn.open_table(READINGS_TABLE)?;
            let _index = write_txn.open_table(SENSOR_INDEX_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // ========== Sensors ==========

    /// Insert or replace a sensor record.
    pub fn upsert_sensor(&self, record: &SensorRecord) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SENSORS_TABLE)?;
            let json = serde_json::to_string(record)?;
            table.insert(record.sensor_id.as_str(), json.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Load a sensor record by id.
    pub fn get_sensor(&self, sensor_id: &str) -> Result<Option<SensorRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SENSORS_TABLE)?;

        match table.get(sensor_id)? {
            Some(value) => {
                let record: SensorRecord = serde_json::from_str(value.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all known sensors, ordered by id.
    pub fn list_sensors(&self) -> Result<Vec<SensorRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SENSORS_TABLE)?;

        let mut sensors = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            if let Ok(record) = serde_json::from_str::<SensorRecord>(value.value()) {
                sensors.push(record);
            }
        }

        Ok(sensors)
    }

    /// Number of known sensors.
    pub fn sensor_count(&self) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SENSORS_TABLE)?;
        Ok(table.len()? as usize)
    }

    // ========== Readings ==========

    /// Persist one ingested message: upsert the sensor and append the
    /// reading atomically. Returns the assigned sequence number.
    pub fn record_reading(&self, reading: &Reading, state: SensorState) -> Result<u64> {
        let write_txn = self.db.begin_write()?;
        let seq = {
            let mut readings = write_txn.open_table(READINGS_TABLE)?;
            let seq = match readings.last()? {
                Some((key, _)) => key.value() + 1,
                None => 1,
            };

            let stored = Reading {
                seq,
                ..reading.clone()
            };
            let json = serde_json::to_string(&stored)?;
            readings.insert(seq, json.as_str())?;
            drop(readings);

            let mut index = write_txn.open_table(SENSOR_INDEX_TABLE)?;
            index.insert((reading.sensor_id.as_str(), seq), ())?;
            drop(index);

            let mut sensors = write_txn.open_table(SENSORS_TABLE)?;
            let record = SensorRecord {
                sensor_id: reading.sensor_id.clone(),
                kind: reading.kind.clone(),
                last_seen: chrono::Utc::now().timestamp_millis(),
                last_value: reading.value,
                state,
            };
            let json = serde_json::to_string(&record)?;
            sensors.insert(record.sensor_id.as_str(), json.as_str())?;

            seq
        };
        write_txn.commit()?;
        Ok(seq)
    }

    /// List the most recent readings across all sensors, newest first.
    pub fn list_readings(&self, limit: usize) -> Result<Vec<Reading>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(READINGS_TABLE)?;

        let mut readings = Vec::new();
        for result in table.iter()?.rev() {
            if readings.len() >= limit {
                break;
            }
            let (_key, value) = result?;
            if let Ok(reading) = serde_json::from_str::<Reading>(value.value()) {
                readings.push(reading);
            }
        }

        Ok(readings)
    }

    /// List the most recent readings for one sensor, newest first.
    pub fn list_readings_for(&self, sensor_id: &str, limit: usize) -> Result<Vec<Reading>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(SENSOR_INDEX_TABLE)?;
        let readings_table = read_txn.open_table(READINGS_TABLE)?;

        let mut readings = Vec::new();
        let range = index.range((sensor_id, 0)..=(sensor_id, u64::MAX))?;
        for result in range.rev() {
            if readings.len() >= limit {
                break;
            }
            let (key, _) = result?;
            let (_, seq) = key.value();
            if let Some(value) = readings_table.get(seq)? {
                if let Ok(reading) = serde_json::from_str::<Reading>(value.value()) {
                    readings.push(reading);
                }
            }
        }

        Ok(readings)
    }

    /// Total stored readings for one sensor.
    pub fn reading_count(&self, sensor_id: &str) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(SENSOR_INDEX_TABLE)?;
        let range = index.range((sensor_id, 0)..=(sensor_id, u64::MAX))?;
        Ok(range.count())
    }
}

impl Drop for ReadingStore {
    fn drop(&mut self) {
        if let Some(path) = &self.temp_path {
            let _ = std::fs::remove_file(path);
        }
    }
}
