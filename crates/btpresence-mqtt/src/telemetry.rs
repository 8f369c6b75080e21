//! Telemetry publisher: retained per-field publishes for a resolved
//! device snapshot, in fixed field order.

use chrono::{DateTime, Utc};

use btpresence_core::topic::{TelemetryField, TelemetryMessage, normalize_prefix};
use btpresence_core::types::DeviceSnapshot;

use crate::client::BusClient;
use crate::error::MqttError;

/// Publishes device snapshots under `<prefix>/<address>/<field>`.
/// The prefix is normalized once at construction.
pub struct TelemetryPublisher<C: BusClient> {
    bus: C,
    prefix: String,
}

impl<C: BusClient> TelemetryPublisher<C> {
    pub fn new(bus: C, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = normalize_prefix(&prefix).to_string();
        Self { bus, prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Publish a single field of the snapshot, retained, and wait for
    /// the acknowledgment before returning.
    pub async fn publish_field(
        &self,
        snapshot: &DeviceSnapshot,
        field: TelemetryField,
        seen_at: DateTime<Utc>,
    ) -> Result<(), MqttError> {
        let message = TelemetryMessage::for_field(&self.prefix, snapshot, field, seen_at);
        self.bus.publish(&message).await
    }

    /// Publish the full snapshot: seen, then rssi, then name. Each
    /// publish completes before the next begins; the first failure
    /// aborts the sequence.
    pub async fn publish_snapshot(
        &self,
        snapshot: &DeviceSnapshot,
        seen_at: DateTime<Utc>,
    ) -> Result<(), MqttError> {
        for field in TelemetryField::PUBLISH_ORDER {
            self.publish_field(snapshot, field, seen_at).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::TimeZone;

    /// Fake bus recording published messages; can fail from the Nth
    /// publish onward.
    struct FakeBus {
        published: Mutex<Vec<TelemetryMessage>>,
        fail_from: Option<usize>,
    }

    impl FakeBus {
        fn new() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                fail_from: None,
            }
        }

        fn failing_from(n: usize) -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                fail_from: Some(n),
            }
        }

        fn published(&self) -> Vec<TelemetryMessage> {
            self.published.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl BusClient for FakeBus {
        async fn publish(&self, message: &TelemetryMessage) -> Result<(), MqttError> {
            let mut published = self.published.lock().expect("lock");
            if let Some(n) = self.fail_from
                && published.len() >= n
            {
                return Err(MqttError::Publish("injected".into()));
            }
            published.push(message.clone());
            Ok(())
        }
    }

    fn snapshot() -> DeviceSnapshot {
        DeviceSnapshot {
            address: "aa:bb:cc:dd:ee:ff".into(),
            rssi: -70,
            name: "Pixel6".into(),
        }
    }

    fn seen_at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn snapshot_publishes_three_fields_in_order() {
        let bus = Arc::new(FakeBus::new());
        let publisher = TelemetryPublisher::new(Arc::clone(&bus), "btpresence/host1");

        publisher
            .publish_snapshot(&snapshot(), seen_at())
            .await
            .expect("publish");

        let published = bus.published();
        assert_eq!(published.len(), 3);
        assert_eq!(published[0].topic, "btpresence/host1/aa:bb:cc:dd:ee:ff/seen");
        assert_eq!(published[0].payload, "1700000000");
        assert_eq!(published[1].topic, "btpresence/host1/aa:bb:cc:dd:ee:ff/rssi");
        assert_eq!(published[1].payload, "-70");
        assert_eq!(published[2].topic, "btpresence/host1/aa:bb:cc:dd:ee:ff/name");
        assert_eq!(published[2].payload, "Pixel6");
        assert!(published.iter().all(|m| m.retain));
    }

    #[tokio::test]
    async fn trailing_separators_stripped_from_prefix() {
        let bus = Arc::new(FakeBus::new());
        let publisher = TelemetryPublisher::new(Arc::clone(&bus), "btpresence/host1///");
        assert_eq!(publisher.prefix(), "btpresence/host1");

        publisher
            .publish_field(&snapshot(), TelemetryField::Seen, seen_at())
            .await
            .expect("publish");
        assert_eq!(
            bus.published()[0].topic,
            "btpresence/host1/aa:bb:cc:dd:ee:ff/seen"
        );
    }

    #[tokio::test]
    async fn first_failure_aborts_sequence() {
        let bus = Arc::new(FakeBus::failing_from(1));
        let publisher = TelemetryPublisher::new(Arc::clone(&bus), "btpresence/host1");

        let result = publisher.publish_snapshot(&snapshot(), seen_at()).await;
        assert!(matches!(result, Err(MqttError::Publish(_))));
        // seen was accepted, rssi failed, name never attempted
        assert_eq!(bus.published().len(), 1);
        assert!(bus.published()[0].topic.ends_with("/seen"));
    }

    #[tokio::test]
    async fn failure_on_first_field_publishes_nothing() {
        let bus = Arc::new(FakeBus::failing_from(0));
        let publisher = TelemetryPublisher::new(Arc::clone(&bus), "btpresence/host1");

        let result = publisher.publish_snapshot(&snapshot(), seen_at()).await;
        assert!(result.is_err());
        assert!(bus.published().is_empty());
    }
}
