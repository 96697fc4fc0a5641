//! Core types for SensorHub.
//!
//! This crate defines the vocabulary shared by the collector, the storage
//! layer, and the HTTP API: wire message formats, the bus topic scheme,
//! sensor state, the common error type, and configuration defaults.

pub mod config;
pub mod error;
pub mod message;
pub mod sensor;

pub use error::{Error, Result};
pub use message::{CommandMessage, Operation, ReadingMessage, Target, topics};
pub use sensor::SensorState;
