//! Error types for the bus boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("invalid broker url {url}: {detail}")]
    InvalidUrl { url: String, detail: String },

    #[error("failed to connect to broker: {0}")]
    Connect(String),

    #[error("broker handshake timed out")]
    ConnectTimeout,

    #[error("broker refused connection: {0}")]
    Refused(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),
}
