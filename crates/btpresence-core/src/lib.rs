//! btpresence-core: pure data model and topic construction.
//! Discovery events, device snapshots, telemetry fields, and the
//! topic/payload encodings. No IO, no clock access.

pub mod topic;
pub mod types;

pub use topic::{TelemetryField, TelemetryMessage, normalize_prefix, topic_for};
pub use types::{DevicePath, DeviceSnapshot, DiscoveryEvent, DiscoveryEventKind, SupervisorEvent};
