//! Persistence layer for SensorHub.
//!
//! Provides the redb-backed [`ReadingStore`]: a durable table of sensor
//! readings plus a table of known sensors with last-seen state.

pub mod error;
pub mod store;

pub use error::{Error, Result};
pub use store::{Reading, ReadingStore, SensorRecord};
