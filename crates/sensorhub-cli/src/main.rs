//! Command-line interface for SensorHub.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use sensorhub_api::ServerState;
use sensorhub_collector::{
    CommandDispatcher, CommandParams, Ingestor, MqttBus, MqttBusConfig, MqttCollector,
    SessionTracker,
};
use sensorhub_core::config::{api, broker, env_vars};
use sensorhub_core::{Operation, Target};
use sensorhub_storage::ReadingStore;

/// SensorHub - collect sensor readings and drive sensors over MQTT.
#[derive(Parser, Debug)]
#[command(name = "sensorhub")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the collector and the web API.
    Serve {
        /// Host the API binds to.
        #[arg(long, default_value = api::HOST)]
        host: String,
        /// Port the API binds to.
        #[arg(short, long, default_value_t = api::PORT)]
        port: u16,
        /// MQTT broker host.
        #[arg(long, default_value = broker::HOST)]
        broker_host: String,
        /// MQTT broker port.
        #[arg(long, default_value_t = broker::PORT)]
        broker_port: u16,
        /// Database file path.
        #[arg(long, default_value = "data/sensorhub.redb")]
        data: PathBuf,
    },
    /// Send one command to a sensor (or `all`) and exit.
    Send {
        /// Sensor id, or `all` for broadcast.
        target: String,
        /// Operation: measure, start, or stop.
        operation: String,
        /// Number of readings (measure only).
        #[arg(short, long)]
        count: Option<u32>,
        /// Seconds between readings.
        #[arg(short, long)]
        interval: Option<f64>,
        /// MQTT broker host.
        #[arg(long, default_value = broker::HOST)]
        broker_host: String,
        /// MQTT broker port.
        #[arg(long, default_value_t = broker::PORT)]
        broker_port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    match args.command {
        Command::Serve {
            host,
            port,
            broker_host,
            broker_port,
            data,
        } => run_server(host, port, broker_host, broker_port, data).await,
        Command::Send {
            target,
            operation,
            count,
            interval,
            broker_host,
            broker_port,
        } => {
            run_send(
                target,
                operation,
                CommandParams { count, interval },
                broker_host,
                broker_port,
            )
            .await
        }
    }
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "sensorhub=debug"
    } else {
        "sensorhub=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(default_directive)
            .add_directive(tracing::Level::INFO.into())
    });

    if env_vars::log_json() {
        // JSON format for container environments
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}

/// Wire up the store, collector, dispatcher, and API server, then run
/// until interrupted.
async fn run_server(
    host: String,
    port: u16,
    broker_host: String,
    broker_port: u16,
    data: PathBuf,
) -> Result<()> {
    let store = Arc::new(ReadingStore::open(&data)?);
    tracing::info!(path = %data.display(), "store opened");

    let sessions = Arc::new(SessionTracker::new());
    let ingestor = Arc::new(Ingestor::new(store.clone(), sessions.clone()));

    let bus_config = MqttBusConfig::new(broker_host, broker_port);
    let collector = MqttCollector::connect(&bus_config, ingestor);

    let dispatcher = Arc::new(CommandDispatcher::new(
        Arc::new(collector.publisher()),
        sessions,
    ));

    let state = ServerState::new(store, dispatcher, collector.status_handle());

    let bind: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address: {}", e))?;

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };

    sensorhub_api::serve(bind, state, shutdown).await?;
    collector.shutdown().await;

    Ok(())
}

/// One-shot command dispatch over a short-lived broker connection.
async fn run_send(
    target: String,
    operation: String,
    params: CommandParams,
    broker_host: String,
    broker_port: u16,
) -> Result<()> {
    let operation = parse_operation(&operation)?;
    let target = Target::parse(&target);

    let bus_config = MqttBusConfig::new(broker_host, broker_port);
    let (bus, connection) = MqttBus::connect(&bus_config);

    let dispatcher = CommandDispatcher::new(Arc::new(bus.clone()), Arc::new(SessionTracker::new()));
    let result = dispatcher.dispatch(target, operation, params).await?;
    println!("sent {} to {}", result.operation, result.topic);

    bus.disconnect().await;
    let _ = connection.await;
    Ok(())
}

fn parse_operation(s: &str) -> Result<Operation> {
    match s {
        "measure" => Ok(Operation::Measure),
        "start" => Ok(Operation::Start),
        "stop" => Ok(Operation::Stop),
        other => anyhow::bail!("unknown operation: {} (expected measure, start, or stop)", other),
    }
}
