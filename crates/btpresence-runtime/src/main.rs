//! btpresence: Bluetooth presence telemetry bridge binary.
//! Connects the BlueZ scan backend to the MQTT publisher and runs
//! the supervisor loop until a fatal error stops the process.

use chrono::Utc;
use clap::Parser;

use btpresence_mqtt::{MqttClient, MqttSettings, TelemetryPublisher};
use btpresence_scan::{BluezBackend, SessionManager};

mod cli;
mod error;
mod supervisor;

use supervisor::{REFRESH_INTERVAL, Supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("BTPRESENCE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    tracing::info!("btpresence starting");

    let hostname = cli::local_hostname();
    let prefix = args
        .prefix
        .unwrap_or_else(|| cli::default_prefix(&hostname));

    let settings = MqttSettings::from_url(
        &args.url,
        cli::client_id(&hostname, Utc::now().timestamp()),
    )?;
    let bus = MqttClient::connect(&settings).await?;
    let publisher = TelemetryPublisher::new(bus, prefix);

    let backend = BluezBackend::new().await?;
    tracing::info!(adapter = backend.adapter_name(), "adapter acquired");

    let mut supervisor = Supervisor::new(
        SessionManager::new(backend),
        publisher,
        REFRESH_INTERVAL,
    );
    supervisor.start().await?;
    let result = supervisor.run().await;
    if let Err(ref e) = result {
        tracing::error!("fatal: {e}");
    }
    supervisor.shutdown();
    result?;
    Ok(())
}
