//! Discovery session lifecycle: the session handle itself and the
//! manager that owns start/refresh/resolve.

use tokio::sync::mpsc;

use btpresence_core::types::{DevicePath, DeviceSnapshot, DiscoveryEvent};

use crate::backend::ScanBackend;
use crate::error::ScanError;

// ─── Session guard ────────────────────────────────────────────────

/// Cancel handle for an active discovery session. Fires at most once:
/// explicitly via [`ScanSession::cancel`], or on drop.
pub struct SessionGuard {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl SessionGuard {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ─── Scan session ─────────────────────────────────────────────────

/// An active discovery session: a stream of device events plus the
/// guard that stops the underlying scan. Exactly one session is live
/// at any time; the manager cancels the old one before starting the
/// next.
pub struct ScanSession {
    events: mpsc::UnboundedReceiver<DiscoveryEvent>,
    guard: SessionGuard,
}

impl ScanSession {
    pub fn new(events: mpsc::UnboundedReceiver<DiscoveryEvent>, guard: SessionGuard) -> Self {
        Self { events, guard }
    }

    /// Next device event, or `None` once the session's source has
    /// terminated.
    pub async fn next_event(&mut self) -> Option<DiscoveryEvent> {
        self.events.recv().await
    }

    /// Stop the session. The event stream is inert as soon as this
    /// returns; events still in flight are discarded with the
    /// receiver.
    pub fn cancel(mut self) {
        self.guard.cancel();
    }
}

// ─── Session manager ──────────────────────────────────────────────

/// Owns the discovery-session lifecycle against a scan backend.
/// A refresh is cancel-then-create, never two concurrent sessions.
pub struct SessionManager<B: ScanBackend> {
    backend: B,
}

impl<B: ScanBackend> SessionManager<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Flush the adapter's device cache, then request discovery.
    /// Failure of either step is fatal to the caller; there is no
    /// retry.
    pub async fn start(&self) -> Result<ScanSession, ScanError> {
        tracing::info!("flushing device cache");
        self.backend.flush_devices().await?;
        tracing::info!("starting discovery");
        self.backend.start_discovery().await
    }

    /// Cancel the current session, then perform the same flush +
    /// discovery sequence as [`start`](Self::start).
    pub async fn refresh(&self, current: ScanSession) -> Result<ScanSession, ScanError> {
        tracing::info!("cancelling discovery");
        current.cancel();
        self.start().await
    }

    /// Resolve a device event's path into a property snapshot.
    /// Failure here is the only recoverable error class: the caller
    /// logs and skips the event.
    pub async fn resolve(&self, path: &DevicePath) -> Result<DeviceSnapshot, ScanError> {
        self.backend.device_snapshot(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use btpresence_core::types::DiscoveryEventKind;

    /// Fake scan backend recording the order of adapter operations.
    /// Configurable to fail flush or discovery start.
    struct FakeBackend {
        ops: Arc<Mutex<Vec<String>>>,
        event_tx: Mutex<Option<mpsc::UnboundedSender<DiscoveryEvent>>>,
        fail_flush: bool,
        fail_discovery: bool,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                ops: Arc::new(Mutex::new(Vec::new())),
                event_tx: Mutex::new(None),
                fail_flush: false,
                fail_discovery: false,
            }
        }

        fn with_failing_flush(mut self) -> Self {
            self.fail_flush = true;
            self
        }

        fn with_failing_discovery(mut self) -> Self {
            self.fail_discovery = true;
            self
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().expect("ops lock").clone()
        }

        fn push_event(&self, event: DiscoveryEvent) -> Result<(), ()> {
            let tx = self.event_tx.lock().expect("tx lock");
            match tx.as_ref() {
                Some(tx) => tx.send(event).map_err(|_| ()),
                None => Err(()),
            }
        }
    }

    #[async_trait]
    impl ScanBackend for FakeBackend {
        async fn flush_devices(&self) -> Result<(), ScanError> {
            if self.fail_flush {
                return Err(ScanError::Flush("injected".into()));
            }
            self.ops.lock().expect("ops lock").push("flush".into());
            Ok(())
        }

        async fn start_discovery(&self) -> Result<ScanSession, ScanError> {
            if self.fail_discovery {
                return Err(ScanError::Discovery("injected".into()));
            }
            self.ops.lock().expect("ops lock").push("discover".into());
            let (tx, rx) = mpsc::unbounded_channel();
            *self.event_tx.lock().expect("tx lock") = Some(tx);
            let ops = Arc::clone(&self.ops);
            let guard = SessionGuard::new(move || {
                ops.lock().expect("ops lock").push("cancel".into());
            });
            Ok(ScanSession::new(rx, guard))
        }

        async fn device_snapshot(&self, path: &DevicePath) -> Result<DeviceSnapshot, ScanError> {
            Ok(DeviceSnapshot {
                address: path.as_str().to_string(),
                rssi: -60,
                name: "fake".into(),
            })
        }
    }

    #[tokio::test]
    async fn start_flushes_then_discovers() {
        let backend = Arc::new(FakeBackend::new());
        let manager = SessionManager::new(Arc::clone(&backend));

        let session = manager.start().await.expect("start");
        assert_eq!(backend.ops(), vec!["flush", "discover"]);
        session.cancel();
    }

    #[tokio::test]
    async fn start_fails_when_flush_fails() {
        let backend = Arc::new(FakeBackend::new().with_failing_flush());
        let manager = SessionManager::new(Arc::clone(&backend));

        let result = manager.start().await;
        assert!(matches!(result, Err(ScanError::Flush(_))));
        assert!(backend.ops().is_empty(), "no discovery after failed flush");
    }

    #[tokio::test]
    async fn start_fails_when_discovery_fails() {
        let backend = Arc::new(FakeBackend::new().with_failing_discovery());
        let manager = SessionManager::new(Arc::clone(&backend));

        let result = manager.start().await;
        assert!(matches!(result, Err(ScanError::Discovery(_))));
        assert_eq!(backend.ops(), vec!["flush"]);
    }

    #[tokio::test]
    async fn refresh_cancels_before_restarting() {
        let backend = Arc::new(FakeBackend::new());
        let manager = SessionManager::new(Arc::clone(&backend));

        let session = manager.start().await.expect("start");
        let next = manager.refresh(session).await.expect("refresh");

        assert_eq!(
            backend.ops(),
            vec!["flush", "discover", "cancel", "flush", "discover"],
            "old session cancelled before new flush + discovery"
        );
        next.cancel();
    }

    #[tokio::test]
    async fn cancelled_session_stream_is_inert() {
        let backend = Arc::new(FakeBackend::new());
        let manager = SessionManager::new(Arc::clone(&backend));

        let session = manager.start().await.expect("start");
        backend
            .push_event(DiscoveryEvent::new("dev_0", DiscoveryEventKind::Added))
            .expect("send while live");

        session.cancel();

        // Receiver is gone; events in flight are discarded.
        let result = backend.push_event(DiscoveryEvent::new("dev_1", DiscoveryEventKind::Added));
        assert!(result.is_err(), "send after cancel must fail");
    }

    #[tokio::test]
    async fn session_yields_events_in_order() {
        let backend = Arc::new(FakeBackend::new());
        let manager = SessionManager::new(Arc::clone(&backend));

        let mut session = manager.start().await.expect("start");
        for (i, kind) in [
            DiscoveryEventKind::Added,
            DiscoveryEventKind::PropertyChanged,
            DiscoveryEventKind::Removed,
        ]
        .into_iter()
        .enumerate()
        {
            backend
                .push_event(DiscoveryEvent::new(format!("dev_{i}"), kind))
                .expect("send");
        }

        let first = session.next_event().await.expect("event");
        assert_eq!(first.kind, DiscoveryEventKind::Added);
        let second = session.next_event().await.expect("event");
        assert_eq!(second.kind, DiscoveryEventKind::PropertyChanged);
        let third = session.next_event().await.expect("event");
        assert_eq!(third.kind, DiscoveryEventKind::Removed);

        session.cancel();
    }

    #[tokio::test]
    async fn resolve_delegates_to_backend() {
        let backend = Arc::new(FakeBackend::new());
        let manager = SessionManager::new(Arc::clone(&backend));

        let snapshot = manager
            .resolve(&DevicePath::new("aa:bb:cc:dd:ee:ff"))
            .await
            .expect("resolve");
        assert_eq!(snapshot.address, "aa:bb:cc:dd:ee:ff");
        assert_eq!(snapshot.rssi, -60);
    }

    #[tokio::test]
    async fn guard_fires_once() {
        let fired = Arc::new(Mutex::new(0u32));
        let count = Arc::clone(&fired);
        let mut guard = SessionGuard::new(move || {
            *count.lock().expect("count lock") += 1;
        });
        guard.cancel();
        guard.cancel();
        drop(guard);
        assert_eq!(*fired.lock().expect("count lock"), 1);
    }
}
