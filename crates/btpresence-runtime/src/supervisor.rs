//! Supervisor: the single serialized control loop that owns the
//! discovery-session lifecycle and drives the resolve → publish
//! pipeline. The two event sources (refresh timer, device events)
//! are raced only to produce the next [`SupervisorEvent`]; dispatch
//! is a match on the enum and never runs two events concurrently.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Interval, MissedTickBehavior, interval};

use btpresence_core::types::{DiscoveryEvent, DiscoveryEventKind, SupervisorEvent};
use btpresence_mqtt::{BusClient, TelemetryPublisher};
use btpresence_scan::{ScanBackend, ScanSession, SessionManager};

use crate::error::SupervisorError;

/// Discovery sessions are torn down and restarted on this cadence to
/// avoid stale radio-stack state.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

pub struct Supervisor<B: ScanBackend, C: BusClient> {
    sessions: SessionManager<B>,
    publisher: TelemetryPublisher<C>,
    session: Option<ScanSession>,
    refresh_interval: Duration,
}

impl<B: ScanBackend, C: BusClient> Supervisor<B, C> {
    pub fn new(
        sessions: SessionManager<B>,
        publisher: TelemetryPublisher<C>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            sessions,
            publisher,
            session: None,
            refresh_interval,
        }
    }

    /// Start the initial discovery session (cache flush + discovery).
    pub async fn start(&mut self) -> Result<(), SupervisorError> {
        let session = self.sessions.start().await?;
        self.session = Some(session);
        Ok(())
    }

    /// Run the perpetual multiplexer loop. Starts the initial session
    /// if [`start`](Self::start) was not called; returns only with a
    /// fatal error.
    pub async fn run(&mut self) -> Result<(), SupervisorError> {
        if self.session.is_none() {
            self.start().await?;
        }
        let mut ticker = interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately; consume it so
        // the first refresh happens one full interval after start.
        ticker.tick().await;
        loop {
            let event = self.next_event(&mut ticker).await?;
            self.handle_event(event, Utc::now()).await?;
        }
    }

    /// Wait for exactly one event from either source, in arrival
    /// order. A terminated event stream is fatal: without it the
    /// "exactly one live session" invariant no longer holds.
    async fn next_event(&mut self, ticker: &mut Interval) -> Result<SupervisorEvent, SupervisorError> {
        let session = self.session.as_mut().ok_or(SupervisorError::NotStarted)?;
        tokio::select! {
            _ = ticker.tick() => Ok(SupervisorEvent::Tick),
            event = session.next_event() => match event {
                Some(event) => Ok(SupervisorEvent::Device(event)),
                None => Err(SupervisorError::SessionStreamClosed),
            },
        }
    }

    /// Handle a single event. One step of the loop, visible for
    /// tests; `now` is the wall-clock instant the event is processed.
    pub async fn handle_event(
        &mut self,
        event: SupervisorEvent,
        now: DateTime<Utc>,
    ) -> Result<(), SupervisorError> {
        match event {
            SupervisorEvent::Tick => self.refresh().await,
            SupervisorEvent::Device(event) => self.handle_device_event(event, now).await,
        }
    }

    async fn refresh(&mut self) -> Result<(), SupervisorError> {
        tracing::info!("refreshing discovery session");
        let current = self.session.take().ok_or(SupervisorError::NotStarted)?;
        let next = self.sessions.refresh(current).await?;
        self.session = Some(next);
        Ok(())
    }

    async fn handle_device_event(
        &mut self,
        event: DiscoveryEvent,
        now: DateTime<Utc>,
    ) -> Result<(), SupervisorError> {
        if event.kind == DiscoveryEventKind::Removed {
            // Removals carry no property snapshot; nothing to publish.
            tracing::info!(path = %event.path, "device removed");
            return Ok(());
        }
        let snapshot = match self.sessions.resolve(&event.path).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(path = %event.path, "device resolution failed: {e}");
                return Ok(());
            }
        };
        self.publisher.publish_snapshot(&snapshot, now).await?;
        Ok(())
    }

    /// Cancel the active session, if any. Used on exit paths.
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
        }
    }
}
