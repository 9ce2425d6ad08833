//! Sensor gateway - occupancy telemetry bridge
//!
//! Polls one ultrasonic sensor gateway over TCP, classifies each reply and
//! publishes the result as a queued job on the message broker.
//!
//! Module structure:
//! - `domain/` - Core types, reply classifier, job envelope encoding
//! - `io/` - External interfaces (gateway wire client, broker, sensor directory)
//! - `services/` - Polling loop and event dispatch
//! - `infra/` - Infrastructure (Config, Metrics, Sections)

use anyhow::Context;
use clap::Parser;
use sensor_gateway::domain::GatewayTarget;
use sensor_gateway::infra::config::BrokerMode;
use sensor_gateway::infra::sections::{prompt_building, resolve_building, Section};
use sensor_gateway::infra::{Config, Metrics};
use sensor_gateway::io::broker::{AmqpChannel, MessageChannel, MqttChannel};
use sensor_gateway::io::directory::StaticDirectory;
use sensor_gateway::io::wire::{GatewayClient, TcpTransport};
use sensor_gateway::services::{Dispatcher, Poller, PollerSettings, Route};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Sensor gateway - polls occupancy sensors and publishes their state
#[derive(Parser, Debug)]
#[command(name = "sensor-gateway", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Gateway IP address
    #[arg(short, long)]
    ip: Option<String>,

    /// Gateway TCP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Application section
    #[arg(short, long, value_enum)]
    section: Option<Section>,

    /// Building name or 1-based index; prompts when absent
    #[arg(short, long)]
    building: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_logging(json: bool) {
    // Default: INFO, use RUST_LOG=debug for per-sensor visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_channel(config: &Config) -> anyhow::Result<Arc<dyn MessageChannel>> {
    let channel: Arc<dyn MessageChannel> = match config.broker_mode() {
        BrokerMode::Amqp => Arc::new(
            AmqpChannel::connect(&config.amqp_settings())
                .await
                .context("failed to open AMQP channel")?,
        ),
        BrokerMode::Mqtt => Arc::new(
            MqttChannel::connect(&config.mqtt_settings())
                .await
                .context("failed to open MQTT channel")?,
        ),
    };
    Ok(channel)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    info!("sensor-gateway starting");

    let config_path = Config::resolve_config_path(args.config.as_deref());
    let mut config = Config::load_from_path(&config_path);
    if let Some(ip) = args.ip {
        config = config.with_gateway_ip(ip);
    }
    if let Some(port) = args.port {
        config = config.with_gateway_port(port);
    }
    if let Some(section) = args.section {
        config = config.with_section(section);
    }
    if let Some(building) = args.building {
        config = config.with_building(building);
    }

    let (ip, port) = match (config.gateway_ip(), config.gateway_port()) {
        (Some(ip), Some(port)) => (ip.to_string(), port),
        _ => anyhow::bail!("Please enter valid ip address, port number, and an application section"),
    };

    let building = match config.building() {
        Some(choice) => resolve_building(config.buildings(), choice)?,
        None => {
            let stdin = std::io::stdin();
            prompt_building(config.buildings(), stdin.lock(), std::io::stdout())?
        }
    };

    let section = config.section();
    info!(
        config_file = %config.config_file(),
        gateway_ip = %ip,
        gateway_port = port,
        building = %building,
        section = section.as_str(),
        broker_host = %config.broker_host(),
        broker_port = config.broker_port(),
        exchange = %config.broker_exchange(),
        queue = %config.broker_queue(),
        pacing_ms = config.pacing_ms(),
        "config_loaded"
    );

    let route = match Route::for_section(section, config.broker_queue()) {
        Some(route) if section.is_pollable() => route,
        _ => {
            info!(section = section.as_str(), "section_not_available");
            return Ok(());
        }
    };

    let directory = StaticDirectory::from_file(config.directory_file())
        .context("failed to load sensor directory")?;

    // Broker auth/connect failures are fatal
    let channel = open_channel(&config).await?;
    let metrics = Arc::new(Metrics::new());
    let dispatcher = Dispatcher::new(
        channel,
        config.broker_exchange(),
        config.publish_retries(),
        Duration::from_millis(config.retry_backoff_ms()),
        metrics.clone(),
    );

    let target = GatewayTarget::new(ip, port, building);
    let client = GatewayClient::new(TcpTransport::new(), target, config.wire_config());
    let settings = PollerSettings {
        pacing: Duration::from_millis(config.pacing_ms()),
        idle_cycle_delay: Duration::from_millis(config.idle_cycle_delay_ms()),
        keep_alive: config.keep_alive(),
    };
    let poller = Poller::new(Arc::new(directory), client, dispatcher, route, settings, metrics.clone());

    // Handle shutdown on Ctrl+C
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    poller.run(shutdown_rx).await;
    metrics.snapshot().log();

    info!("sensor-gateway shutdown complete");
    Ok(())
}
