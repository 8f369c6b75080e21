//! Error types for the scan backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to acquire adapter: {0}")]
    Adapter(String),

    #[error("device cache flush failed: {0}")]
    Flush(String),

    #[error("discovery start failed: {0}")]
    Discovery(String),

    /// The device object no longer exists, or resolved to an absent
    /// device. The only recoverable error class in the pipeline.
    #[error("device {path} vanished before resolution")]
    DeviceVanished { path: String },

    #[error("invalid device path {path}: {detail}")]
    InvalidPath { path: String, detail: String },
}
