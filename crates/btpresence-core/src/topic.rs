//! Topic construction and payload encodings for presence telemetry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::DeviceSnapshot;

// ─── Telemetry fields ─────────────────────────────────────────────

/// The per-device fields published on every sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryField {
    Seen,
    Rssi,
    Name,
}

impl TelemetryField {
    /// Fixed publication order for a snapshot: seen, then rssi, then name.
    pub const PUBLISH_ORDER: [Self; 3] = [Self::Seen, Self::Rssi, Self::Name];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seen => "seen",
            Self::Rssi => "rssi",
            Self::Name => "name",
        }
    }

    /// Decimal/string payload for this field.
    ///
    /// `seen` encodes integer seconds since the epoch as of resolution
    /// time; `rssi` a signed decimal integer; `name` the raw advertised
    /// string with no escaping.
    pub fn payload(self, snapshot: &DeviceSnapshot, seen_at: DateTime<Utc>) -> String {
        match self {
            Self::Seen => seen_at.timestamp().to_string(),
            Self::Rssi => snapshot.rssi.to_string(),
            Self::Name => snapshot.name.clone(),
        }
    }
}

impl fmt::Display for TelemetryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Topic construction ───────────────────────────────────────────

/// Strip any number of trailing `/` from a topic prefix.
pub fn normalize_prefix(prefix: &str) -> &str {
    prefix.trim_end_matches('/')
}

/// Build the topic `<prefix>/<address>/<field>` with the prefix
/// normalized first.
pub fn topic_for(prefix: &str, address: &str, field: TelemetryField) -> String {
    format!("{}/{}/{}", normalize_prefix(prefix), address, field.as_str())
}

// ─── Telemetry message ────────────────────────────────────────────

/// A single topic/payload pair bound for the bus. Always retained,
/// QoS 0. Constructed per field per event and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

impl TelemetryMessage {
    pub fn retained(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: true,
        }
    }

    /// Build the message for one field of a resolved snapshot.
    pub fn for_field(
        prefix: &str,
        snapshot: &DeviceSnapshot,
        field: TelemetryField,
        seen_at: DateTime<Utc>,
    ) -> Self {
        Self::retained(
            topic_for(prefix, &snapshot.address, field),
            field.payload(snapshot, seen_at),
        )
    }
}
