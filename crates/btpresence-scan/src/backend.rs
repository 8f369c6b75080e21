//! ScanBackend trait: the adapter operations the supervisor consumes.
//! Enables fake injection for testing; the production implementation
//! lives in [`crate::bluez`].

use std::sync::Arc;

use async_trait::async_trait;

use btpresence_core::types::{DevicePath, DeviceSnapshot};

use crate::error::ScanError;
use crate::session::ScanSession;

#[async_trait]
pub trait ScanBackend: Send + Sync {
    /// Remove every cached device object from the adapter.
    async fn flush_devices(&self) -> Result<(), ScanError>;

    /// Begin a discovery session, returning its event stream and
    /// cancel guard.
    async fn start_discovery(&self) -> Result<ScanSession, ScanError>;

    /// Point-in-time read of a device's advertised properties.
    /// Fails with [`ScanError::DeviceVanished`] when the device object
    /// cannot be constructed or resolves to an absent device.
    async fn device_snapshot(&self, path: &DevicePath) -> Result<DeviceSnapshot, ScanError>;
}

#[async_trait]
impl<T: ScanBackend + ?Sized> ScanBackend for Arc<T> {
    async fn flush_devices(&self) -> Result<(), ScanError> {
        (**self).flush_devices().await
    }

    async fn start_discovery(&self) -> Result<ScanSession, ScanError> {
        (**self).start_discovery().await
    }

    async fn device_snapshot(&self, path: &DevicePath) -> Result<DeviceSnapshot, ScanError> {
        (**self).device_snapshot(path).await
    }
}
