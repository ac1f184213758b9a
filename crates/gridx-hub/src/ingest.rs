//! Per-connection ingest logic.
//!
//! `IngestService` implements what each session does at every lifecycle
//! step, independent of the transport:
//!
//! | Session   | Open                                   | Message                              | Closed                         |
//! |-----------|----------------------------------------|--------------------------------------|--------------------------------|
//! | producer  | register, publish                      | merge, recompute alerts, publish     | unregister, publish            |
//! | dashboard | register, send initial snapshot        | forward `set_relay` to house node    | unregister                     |
//!
//! A producer frame is fully applied and published before the session
//! reads the next one. Frames from different producers may interleave;
//! the store resolves that as last write per field wins.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use gridx_core::{
    AlertState, AnalyticsEngine, DashboardCommand, HousePayload, NodeKind, PolePayload,
    StateSection,
};
use gridx_telemetry::Metrics;

use crate::broadcast::{Broadcaster, PublishReport};
use crate::error::HubResult;
use crate::registry::{ConnectionId, ConnectionRegistry, ObserverHandle};
use crate::store::StateStore;

/// Channel label for dashboard frames in metrics and logs.
pub const DASHBOARD_CHANNEL: &str = "dashboard";

/// What happened to a dashboard command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayForward {
    /// Queued for the house node.
    Forwarded,
    /// No house node connected; command dropped.
    NoProducer,
    /// House node queue full or closed; command dropped.
    Failed,
    /// Not a `set_relay` command.
    Ignored,
}

impl RelayForward {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Forwarded => "forwarded",
            Self::NoProducer => "no_producer",
            Self::Failed => "failed",
            Self::Ignored => "ignored",
        }
    }
}

/// Shared ingest pipeline used by every connection session.
#[derive(Debug, Clone)]
pub struct IngestService {
    store: StateStore,
    registry: ConnectionRegistry,
    broadcaster: Broadcaster,
    engine: Arc<AnalyticsEngine>,
}

impl IngestService {
    /// Build a service with a fresh state, registry and broadcaster.
    pub fn new(engine: AnalyticsEngine) -> Self {
        let engine = Arc::new(engine);
        let store = StateStore::new();
        let registry = ConnectionRegistry::new(store.clone(), engine.clone());
        let broadcaster = Broadcaster::new(store.clone(), registry.clone());
        Self {
            store,
            registry,
            broadcaster,
            engine,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    // ------------------------------------------------------------------
    // Producers
    // ------------------------------------------------------------------

    /// Producer session opened: register it and announce the new flag.
    pub fn producer_connected(&self, kind: NodeKind, handle: ObserverHandle) -> PublishReport {
        let id = handle.id();
        self.registry.register_producer(kind, handle);
        Metrics::node_connected(kind.as_str(), true);
        info!(node = %kind, connection = id, "Hardware connected");
        self.broadcaster.publish()
    }

    /// One telemetry frame from a producer.
    ///
    /// On a decode error nothing is applied or published and the error is
    /// returned; the session is expected to log it and keep reading.
    pub fn handle_producer_text(&self, kind: NodeKind, text: &str) -> HubResult<AlertState> {
        let now = Utc::now();
        let parsed = match kind {
            NodeKind::Pole => {
                PolePayload::parse(text).map(|p| StateSection::Pole(p.into_update(now)))
            }
            NodeKind::House => {
                HousePayload::parse(text).map(|p| StateSection::House(p.into_update(now)))
            }
        };
        let section = parsed.map_err(|e| {
            Metrics::malformed_payload(kind.as_str());
            e
        })?;

        let alerts = self.apply_telemetry(&section);
        Metrics::telemetry_received(kind.as_str());
        self.broadcaster.publish();
        Ok(alerts)
    }

    /// Merge a telemetry section and recompute alerts atomically.
    pub fn apply_telemetry(&self, section: &StateSection) -> AlertState {
        let evaluation = self.store.apply_and_evaluate(section, &self.engine);

        let alerts = evaluation.alerts;
        Metrics::alerts(alerts.theft_detected, alerts.maintenance_risk, alerts.risk_score);
        if let Some(loss) = evaluation.theft.loss_watts {
            Metrics::theft_loss(loss);
        }
        if alerts.theft_detected || alerts.maintenance_risk {
            debug!(message = %alerts.message, risk_score = alerts.risk_score, "Alert raised");
        }
        alerts
    }

    pub fn handle_pole_text(&self, text: &str) -> HubResult<AlertState> {
        self.handle_producer_text(NodeKind::Pole, text)
    }

    pub fn handle_house_text(&self, text: &str) -> HubResult<AlertState> {
        self.handle_producer_text(NodeKind::House, text)
    }

    /// Producer session closed.
    ///
    /// Returns whether this connection still owned the slot; only then is
    /// the flag dropped and a broadcast sent.
    pub fn producer_disconnected(&self, kind: NodeKind, id: ConnectionId) -> bool {
        if !self.registry.unregister_producer(kind, id) {
            debug!(node = %kind, connection = id, "Superseded producer disconnected");
            return false;
        }
        Metrics::node_connected(kind.as_str(), false);
        info!(node = %kind, connection = id, "Hardware disconnected");
        self.broadcaster.publish();
        true
    }

    // ------------------------------------------------------------------
    // Dashboards
    // ------------------------------------------------------------------

    /// Dashboard session opened: register it and send the initial snapshot.
    pub fn dashboard_connected(&self, handle: ObserverHandle) -> bool {
        let id = handle.id();
        let (synced, count) = self.broadcaster.attach(handle);
        Metrics::dashboards_set(count);
        info!(connection = id, dashboards = count, "Dashboard connected");
        synced
    }

    /// One frame from a dashboard. Only `set_relay` is acted on.
    pub fn handle_dashboard_text(&self, text: &str) -> HubResult<RelayForward> {
        let command = DashboardCommand::parse(text).map_err(|e| {
            Metrics::malformed_payload(DASHBOARD_CHANNEL);
            e
        })?;

        let outcome = self.forward_command(&command);
        Metrics::relay_command(outcome.as_str());
        Ok(outcome)
    }

    fn forward_command(&self, command: &DashboardCommand) -> RelayForward {
        if !command.is_set_relay() {
            debug!(action = ?command.action, "Ignoring dashboard command");
            return RelayForward::Ignored;
        }

        let Some(house) = self.registry.lookup_producer(NodeKind::House) else {
            debug!("No house node connected, relay command dropped");
            return RelayForward::NoProducer;
        };

        match house.try_send(command.raw.clone()) {
            Ok(()) => {
                info!(command = %command.raw, "Sent command to house");
                RelayForward::Forwarded
            }
            Err(e) => {
                error!(error = %e, "Failed to send command to house");
                RelayForward::Failed
            }
        }
    }

    /// Dashboard session closed.
    pub fn dashboard_disconnected(&self, id: ConnectionId) {
        if self.registry.unregister_dashboard(id) {
            let count = self.registry.dashboard_count();
            Metrics::dashboards_set(count);
            info!(connection = id, dashboards = count, "Dashboard disconnected");
        }
    }
}
