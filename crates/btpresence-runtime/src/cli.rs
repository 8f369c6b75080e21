//! CLI definition using clap derive.

use clap::Parser;

#[derive(Parser)]
#[command(name = "btpresence", about = "Bluetooth presence telemetry bridge")]
pub struct Cli {
    /// MQTT broker URL, e.g. tcp://broker.local:1883
    #[arg(long, env = "BTPRESENCE_URL")]
    pub url: String,

    /// Topic prefix (default: btpresence/<hostname>)
    #[arg(long)]
    pub prefix: Option<String>,
}

/// Local host name, used for the default prefix and the client id.
pub fn local_hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

pub fn default_prefix(hostname: &str) -> String {
    format!("btpresence/{hostname}")
}

/// Client identifier unique per process start.
pub fn client_id(hostname: &str, started_at_epoch: i64) -> String {
    format!("btpresence-{hostname}-{started_at_epoch}")
}
