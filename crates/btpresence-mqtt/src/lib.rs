//! btpresence-mqtt: message-bus IO boundary.
//! Wraps the async MQTT client behind a publish trait and provides
//! the telemetry publisher that emits per-device field messages.

pub mod client;
pub mod error;
pub mod telemetry;

pub use client::{BusClient, MqttClient, MqttSettings};
pub use error::MqttError;
pub use telemetry::TelemetryPublisher;
