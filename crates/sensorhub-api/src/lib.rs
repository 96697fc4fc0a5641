//! Web API for SensorHub.
//!
//! Read endpoints serve sensors and readings from the store; the command
//! endpoint forwards to the collector's dispatcher.
//!
//! | Method | Path                  |                                   |
//! |--------|-----------------------|-----------------------------------|
//! | GET    | `/api/health`         | service and broker status         |
//! | GET    | `/api/sensors`        | all known sensors                 |
//! | GET    | `/api/sensors/:id`    | one sensor                        |
//! | GET    | `/api/readings`       | recent readings (`sensor`, `limit`) |
//! | POST   | `/api/command/:target`| dispatch a command (`all` = broadcast) |

pub mod handlers;
pub mod models;
pub mod server;

pub use models::{ApiResult, ErrorResponse};
pub use server::{create_router, serve, ServerState};
