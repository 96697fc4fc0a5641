//! Collector runtime: MQTT ingest, command dispatch, session tracking.
//!
//! The collector subscribes to every sensor's data topic, persists each
//! reading through [`Ingestor`], and publishes `measure`/`start`/`stop`
//! commands through [`CommandDispatcher`]. Streaming sessions opened by
//! `start` commands are tracked in [`SessionTracker`] and drive the state
//! recorded alongside each reading.

pub mod bus;
pub mod dispatch;
pub mod ingest;
pub mod session;

pub use bus::{BusPublisher, ConnectionStatus, MqttBus, MqttBusConfig, MqttCollector};
pub use dispatch::{CommandDispatcher, CommandParams, DispatchResult};
pub use ingest::Ingestor;
pub use session::{Session, SessionTracker};
