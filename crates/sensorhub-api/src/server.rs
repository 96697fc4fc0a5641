//! HTTP server: shared state, router, and startup.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::RwLock;
use tracing::info;

use sensorhub_collector::{CommandDispatcher, ConnectionStatus};
use sensorhub_storage::ReadingStore;

use crate::handlers;

/// State shared by every handler.
#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<ReadingStore>,
    pub dispatcher: Arc<CommandDispatcher>,
    /// Broker connection status, updated by the collector loop.
    pub broker_status: Arc<RwLock<ConnectionStatus>>,
    /// Server start time (unix seconds).
    pub started_at: i64,
}

impl ServerState {
    pub fn new(
        store: Arc<ReadingStore>,
        dispatcher: Arc<CommandDispatcher>,
        broker_status: Arc<RwLock<ConnectionStatus>>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            broker_status,
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Build the application router.
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health_handler))
        .route("/api/sensors", get(handlers::list_sensors_handler))
        .route("/api/sensors/:id", get(handlers::get_sensor_handler))
        .route("/api/readings", get(handlers::list_readings_handler))
        .route("/api/command/:target", post(handlers::send_command_handler))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}

/// Bind and serve until the shutdown future resolves.
pub async fn serve(
    bind: SocketAddr,
    state: ServerState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    info!(addr = %bind, "api server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("api server shutdown complete");
    Ok(())
}
