//! Bus client: connection settings, the publish trait, and the
//! rumqttc-backed implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::broadcast;

use btpresence_core::TelemetryMessage;

use crate::error::MqttError;

pub const DEFAULT_PORT: u16 = 1883;

/// Keep-alive ping interval for the broker connection.
pub const KEEP_ALIVE: Duration = Duration::from_secs(2);

/// How long to wait for the broker's connection acknowledgment.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

// ─── Settings ─────────────────────────────────────────────────────

/// Connection settings for the bus. One connection per process
/// lifetime; no reconnect logic lives here.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
}

impl MqttSettings {
    /// Parse a broker URL of the form `tcp://host:port`,
    /// `mqtt://host:port`, or bare `host[:port]`. The port defaults
    /// to 1883.
    pub fn from_url(url: &str, client_id: impl Into<String>) -> Result<Self, MqttError> {
        let rest = match url.split_once("://") {
            Some((scheme, rest)) => {
                if !matches!(scheme, "tcp" | "mqtt") {
                    return Err(MqttError::InvalidUrl {
                        url: url.to_string(),
                        detail: format!("unsupported scheme {scheme}"),
                    });
                }
                rest
            }
            None => url,
        };
        let rest = rest.trim_end_matches('/');
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| MqttError::InvalidUrl {
                    url: url.to_string(),
                    detail: format!("invalid port {port}"),
                })?;
                (host, port)
            }
            None => (rest, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(MqttError::InvalidUrl {
                url: url.to_string(),
                detail: "missing host".to_string(),
            });
        }
        Ok(Self {
            host: host.to_string(),
            port,
            client_id: client_id.into(),
            keep_alive: KEEP_ALIVE,
            connect_timeout: CONNECT_TIMEOUT,
        })
    }
}

// ─── Bus client trait ─────────────────────────────────────────────

/// Synchronous, acknowledged publish of a single telemetry message.
/// Returns once the packet has been handed to the network; any
/// failure is fatal to the caller.
#[async_trait]
pub trait BusClient: Send + Sync {
    async fn publish(&self, message: &TelemetryMessage) -> Result<(), MqttError>;
}

#[async_trait]
impl<T: BusClient + ?Sized> BusClient for Arc<T> {
    async fn publish(&self, message: &TelemetryMessage) -> Result<(), MqttError> {
        (**self).publish(message).await
    }
}

// ─── rumqttc client ───────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Notification {
    PublishSent,
    ConnectionLost(String),
}

/// rumqttc-backed bus client. The event loop runs on a spawned
/// driver task; publishes wait for the loop to report the outgoing
/// packet before returning.
pub struct MqttClient {
    client: AsyncClient,
    notifications: broadcast::Sender<Notification>,
}

impl MqttClient {
    /// Connect and wait for the broker's acknowledgment, bounded by
    /// `settings.connect_timeout`. On success the event-loop driver
    /// task is running for the rest of the process lifetime.
    pub async fn connect(settings: &MqttSettings) -> Result<Self, MqttError> {
        let mut options = MqttOptions::new(
            settings.client_id.clone(),
            settings.host.clone(),
            settings.port,
        );
        options.set_keep_alive(settings.keep_alive);
        let (client, mut event_loop) = AsyncClient::new(options, 16);

        let handshake = async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        return if ack.code == ConnectReturnCode::Success {
                            Ok(())
                        } else {
                            Err(MqttError::Refused(format!("{:?}", ack.code)))
                        };
                    }
                    Ok(_) => {}
                    Err(e) => return Err(MqttError::Connect(e.to_string())),
                }
            }
        };
        tokio::time::timeout(settings.connect_timeout, handshake)
            .await
            .map_err(|_| MqttError::ConnectTimeout)??;

        tracing::info!(
            host = %settings.host,
            port = settings.port,
            client_id = %settings.client_id,
            "connected to broker"
        );

        let (notify_tx, _) = broadcast::channel(64);
        let driver_tx = notify_tx.clone();
        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Publish(_))) => {
                        let _ = driver_tx.send(Notification::PublishSent);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(target: "mqtt", "connection error: {e}");
                        let _ = driver_tx.send(Notification::ConnectionLost(e.to_string()));
                        break;
                    }
                }
            }
        });

        Ok(Self {
            client,
            notifications: notify_tx,
        })
    }
}

#[async_trait]
impl BusClient for MqttClient {
    async fn publish(&self, message: &TelemetryMessage) -> Result<(), MqttError> {
        // Subscribe before enqueueing so the outgoing notification
        // cannot be missed. Publishes are serialized by the caller,
        // so the next outgoing publish is ours.
        let mut events = self.notifications.subscribe();
        self.client
            .publish(
                message.topic.as_str(),
                QoS::AtMostOnce,
                message.retain,
                message.payload.clone(),
            )
            .await
            .map_err(|e| MqttError::Publish(e.to_string()))?;
        loop {
            match events.recv().await {
                Ok(Notification::PublishSent) => return Ok(()),
                Ok(Notification::ConnectionLost(detail)) => {
                    return Err(MqttError::ConnectionLost(detail));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(MqttError::ConnectionLost("event loop terminated".to_string()));
                }
            }
        }
    }
}
