use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Device identity ──────────────────────────────────────────────

/// Opaque identifier for a device object as reported by the adapter
/// event stream. The supervisor never inspects its contents; it is
/// only handed back to the backend for property resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DevicePath(String);

impl DevicePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Discovery events ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DiscoveryEventKind {
    Added,
    Removed,
    PropertyChanged,
}

impl DiscoveryEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::PropertyChanged => "property_changed",
        }
    }
}

impl fmt::Display for DiscoveryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single device-change notification from the active discovery
/// session. Consumed exactly once by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    pub path: DevicePath,
    pub kind: DiscoveryEventKind,
}

impl DiscoveryEvent {
    pub fn new(path: impl Into<String>, kind: DiscoveryEventKind) -> Self {
        Self {
            path: DevicePath::new(path),
            kind,
        }
    }
}

// ─── Device snapshot ──────────────────────────────────────────────

/// Point-in-time read of a device's advertised properties.
///
/// Never cached: properties reported by the radio stack may change
/// between events for the same address, so every event re-resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub address: String,
    pub rssi: i16,
    pub name: String,
}

// ─── Supervisor events ────────────────────────────────────────────

/// The multiplexer's unified event type: either the refresh timer
/// fired or the discovery session produced a device event. Dispatch
/// is a match on this enum; the racing of the two sources happens
/// only when producing the next value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Tick,
    Device(DiscoveryEvent),
}
