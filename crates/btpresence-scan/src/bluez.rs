//! BlueZ-backed scan backend.
//! Wraps the session/adapter handles and pumps adapter plus
//! per-device property events into a discovery session channel.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{BoxStream, SelectAll, Stream};
use tokio::sync::mpsc;

use bluer::{Adapter, AdapterEvent, Address, DeviceEvent, Session};

use btpresence_core::types::{DevicePath, DeviceSnapshot, DiscoveryEvent, DiscoveryEventKind};

use crate::backend::ScanBackend;
use crate::error::ScanError;
use crate::session::{ScanSession, SessionGuard};

/// Production backend bound to the system's default adapter.
pub struct BluezBackend {
    adapter: Adapter,
}

impl BluezBackend {
    /// Connect to the bluetooth daemon and claim the default adapter.
    /// The adapter must be powered; there is no retry.
    pub async fn new() -> Result<Self, ScanError> {
        let session = Session::new()
            .await
            .map_err(|e| ScanError::Adapter(e.to_string()))?;
        let adapter = session
            .default_adapter()
            .await
            .map_err(|e| ScanError::Adapter(e.to_string()))?;
        let powered = adapter
            .is_powered()
            .await
            .map_err(|e| ScanError::Adapter(e.to_string()))?;
        if !powered {
            return Err(ScanError::Adapter(format!(
                "adapter {} is not powered",
                adapter.name()
            )));
        }
        Ok(Self { adapter })
    }

    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }
}

#[async_trait]
impl ScanBackend for BluezBackend {
    async fn flush_devices(&self) -> Result<(), ScanError> {
        let addresses = self
            .adapter
            .device_addresses()
            .await
            .map_err(|e| ScanError::Flush(e.to_string()))?;
        for addr in addresses {
            self.adapter
                .remove_device(addr)
                .await
                .map_err(|e| ScanError::Flush(format!("{addr}: {e}")))?;
        }
        Ok(())
    }

    async fn start_discovery(&self) -> Result<ScanSession, ScanError> {
        let discover = self
            .adapter
            .discover_devices()
            .await
            .map_err(|e| ScanError::Discovery(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(pump_events(self.adapter.clone(), discover, tx));
        // Aborting the pump drops the discovery stream, which releases
        // the underlying scan.
        let guard = SessionGuard::new(move || handle.abort());
        Ok(ScanSession::new(rx, guard))
    }

    async fn device_snapshot(&self, path: &DevicePath) -> Result<DeviceSnapshot, ScanError> {
        let addr: Address = path.as_str().parse().map_err(|e| ScanError::InvalidPath {
            path: path.to_string(),
            detail: format!("{e}"),
        })?;
        let device = self
            .adapter
            .device(addr)
            .map_err(|_| ScanError::DeviceVanished {
                path: path.to_string(),
            })?;
        let rssi = device.rssi().await.map_err(|_| ScanError::DeviceVanished {
            path: path.to_string(),
        })?;
        let name = device.name().await.map_err(|_| ScanError::DeviceVanished {
            path: path.to_string(),
        })?;
        Ok(DeviceSnapshot {
            address: addr.to_string(),
            rssi: rssi.unwrap_or(0),
            name: name.unwrap_or_default(),
        })
    }
}

/// Forward adapter events into the session channel, subscribing to
/// per-device property changes as devices appear. Ends when the
/// adapter stream terminates or the session receiver is dropped.
async fn pump_events(
    adapter: Adapter,
    discover: impl Stream<Item = AdapterEvent> + Send,
    tx: mpsc::UnboundedSender<DiscoveryEvent>,
) {
    let mut discover = Box::pin(discover);
    let mut changes: SelectAll<BoxStream<'static, (Address, DeviceEvent)>> = SelectAll::new();

    loop {
        tokio::select! {
            adapter_event = discover.next() => {
                let Some(adapter_event) = adapter_event else { break };
                if let AdapterEvent::DeviceAdded(addr) = adapter_event
                    && let Ok(device) = adapter.device(addr)
                    && let Ok(events) = device.events().await
                {
                    changes.push(events.map(move |e| (addr, e)).boxed());
                }
                let Some(event) = map_adapter_event(adapter_event) else { continue };
                if tx.send(event).is_err() {
                    break;
                }
            }
            Some((addr, DeviceEvent::PropertyChanged(_))) = changes.next() => {
                let event = DiscoveryEvent::new(
                    addr.to_string(),
                    DiscoveryEventKind::PropertyChanged,
                );
                if tx.send(event).is_err() {
                    break;
                }
            }
        }
    }
}

/// Map an adapter event to a discovery event. Adapter-level property
/// changes carry no device path and are not forwarded.
fn map_adapter_event(event: AdapterEvent) -> Option<DiscoveryEvent> {
    match event {
        AdapterEvent::DeviceAdded(addr) => Some(DiscoveryEvent::new(
            addr.to_string(),
            DiscoveryEventKind::Added,
        )),
        AdapterEvent::DeviceRemoved(addr) => Some(DiscoveryEvent::new(
            addr.to_string(),
            DiscoveryEventKind::Removed,
        )),
        AdapterEvent::PropertyChanged(_) => None,
    }
}
