//! Command dispatch: validation, publishing, and session bookkeeping.

use std::sync::Arc;

use tracing::{info, warn};

use sensorhub_core::{CommandMessage, Error, Operation, Result, Target};

use crate::bus::BusPublisher;
use crate::session::SessionTracker;

/// Default spacing between readings when a command omits one, in seconds.
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

/// Caller-supplied command parameters, before validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandParams {
    pub count: Option<u32>,
    pub interval: Option<f64>,
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    /// Topic the command was published on.
    pub topic: String,
    pub operation: Operation,
}

/// Validates, publishes, and tracks commands sent to sensors.
///
/// Publishing is fire-and-forget at the application level: a dispatch
/// succeeds once the broker accepts the message, whether or not any
/// sensor is listening. Session state is only updated after a successful
/// publish so a broker failure leaves the tracker untouched.
pub struct CommandDispatcher {
    bus: Arc<dyn BusPublisher>,
    sessions: Arc<SessionTracker>,
}

impl CommandDispatcher {
    pub fn new(bus: Arc<dyn BusPublisher>, sessions: Arc<SessionTracker>) -> Self {
        Self { bus, sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionTracker> {
        &self.sessions
    }

    /// Build, validate, and publish a command to the target's topic.
    pub async fn dispatch(
        &self,
        target: Target,
        operation: Operation,
        params: CommandParams,
    ) -> Result<DispatchResult> {
        let message = build_message(operation, params)?;
        let topic = target.command_topic();

        self.bus.publish(&topic, message.encode()?).await?;
        info!(topic = %topic, operation = %operation, "command dispatched");

        // Bookkeeping happens only after the publish succeeded.
        match (operation, &target) {
            (Operation::Start, Target::Sensor(id)) => {
                let interval = message.interval.unwrap_or(DEFAULT_INTERVAL_SECS);
                self.sessions.open(id, interval).await;
            }
            (Operation::Start, Target::Broadcast) => {
                let interval = message.interval.unwrap_or(DEFAULT_INTERVAL_SECS);
                self.sessions.open_broadcast(interval).await;
            }
            (Operation::Stop, Target::Sensor(id)) => {
                if !self.sessions.close(id).await {
                    // Stop without a tracked session still publishes; the
                    // sensor may be streaming from before a restart.
                    warn!(sensor_id = %id, "stop dispatched with no tracked session");
                }
            }
            (Operation::Stop, Target::Broadcast) => {
                let closed = self.sessions.close_all().await;
                info!(closed, "broadcast stop cleared all sessions");
            }
            (Operation::Measure, _) => {}
        }

        Ok(DispatchResult { topic, operation })
    }
}

fn build_message(operation: Operation, params: CommandParams) -> Result<CommandMessage> {
    match operation {
        Operation::Measure => {
            let count = params.count.unwrap_or(1);
            if count < 1 {
                return Err(Error::InvalidParameter(
                    "measure count must be at least 1".to_string(),
                ));
            }
            let interval = params.interval.unwrap_or(DEFAULT_INTERVAL_SECS);
            if !(interval > 0.0) {
                return Err(Error::InvalidParameter(
                    "measure interval must be positive".to_string(),
                ));
            }
            Ok(CommandMessage::measure(count, interval))
        }
        Operation::Start => {
            let interval = params.interval.unwrap_or(DEFAULT_INTERVAL_SECS);
            if !(interval > 0.0) {
                return Err(Error::InvalidParameter(
                    "start interval must be positive".to_string(),
                ));
            }
            Ok(CommandMessage::start(interval))
        }
        // Stop takes no parameters; any supplied are ignored.
        Operation::Stop => Ok(CommandMessage::stop()),
    }
}
