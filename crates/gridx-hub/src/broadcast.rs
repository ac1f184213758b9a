//! Snapshot fan-out to dashboards.
//!
//! `publish` copies the state and the observer list, releases both locks,
//! then queues one serialized frame per observer. A full or closed queue is
//! counted and skipped; it never stops delivery to the rest and never
//! removes the observer (that happens on the observer's own disconnect).
//!
//! Snapshot and enqueue run under a publish lock, so frames reach every
//! queue in the order their snapshots were taken. Queueing never waits,
//! so the lock is never held across network I/O.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use gridx_telemetry::Metrics;

use crate::error::HubResult;
use crate::registry::{ConnectionRegistry, ObserverHandle};
use crate::store::StateStore;
use crate::types::DashboardMessage;

/// Outcome of one publish call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Pushes the current snapshot to every registered dashboard.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    store: StateStore,
    registry: ConnectionRegistry,
    publish_lock: Arc<Mutex<()>>,
}

impl Broadcaster {
    pub fn new(store: StateStore, registry: ConnectionRegistry) -> Self {
        Self {
            store,
            registry,
            publish_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Serialize the current snapshot as a dashboard update frame.
    pub fn render(&self) -> HubResult<String> {
        let msg = DashboardMessage::from(self.store.snapshot());
        Ok(serde_json::to_string(&msg)?)
    }

    /// Send the current snapshot to every dashboard.
    pub fn publish(&self) -> PublishReport {
        let _ordered = self.publish_lock.lock();
        let payload = match self.render() {
            Ok(json) => json,
            Err(e) => {
                debug!(error = %e, "Failed to serialize dashboard update");
                return PublishReport::default();
            }
        };

        let mut report = PublishReport::default();
        for observer in self.registry.dashboards() {
            match observer.try_send(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(observer = observer.id(), error = %e, "Dropped update for dashboard");
                    report.failed += 1;
                }
            }
        }

        trace!(
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast update sent"
        );
        Metrics::broadcast(report.delivered, report.failed);
        report
    }

    /// Register a dashboard and send it the current snapshot.
    ///
    /// Both happen under the publish lock: every later publish includes the
    /// new dashboard and none can slip in between its sync and registration.
    /// Returns whether the sync was queued and the dashboard count.
    pub fn attach(&self, observer: ObserverHandle) -> (bool, usize) {
        let _ordered = self.publish_lock.lock();
        let count = self.registry.register_dashboard(observer.clone());
        let synced = self.sync_one(&observer);
        (synced, count)
    }

    /// Send the current snapshot to a single observer.
    pub fn sync_one(&self, observer: &ObserverHandle) -> bool {
        let payload = match self.render() {
            Ok(json) => json,
            Err(e) => {
                debug!(error = %e, "Failed to serialize initial sync");
                return false;
            }
        };
        match observer.try_send(payload) {
            Ok(()) => true,
            Err(e) => {
                debug!(observer = observer.id(), error = %e, "Initial sync not delivered");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use gridx_core::{AnalyticsEngine, NodeKind};
    use tokio::sync::mpsc;

    fn setup() -> (Broadcaster, ConnectionRegistry, StateStore) {
        let store = StateStore::new();
        let registry = ConnectionRegistry::new(store.clone(), Arc::new(AnalyticsEngine::default()));
        let broadcaster = Broadcaster::new(store.clone(), registry.clone());
        (broadcaster, registry, store)
    }

    fn dashboard(registry: &ConnectionRegistry, capacity: usize) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(capacity);
        registry.register_dashboard(ObserverHandle::new(registry.next_connection_id(), tx));
        rx
    }

    #[tokio::test]
    async fn test_publish_reaches_every_dashboard() {
        let (broadcaster, registry, _) = setup();
        let mut receivers: Vec<_> = (0..3).map(|_| dashboard(&registry, 4)).collect();

        let report = broadcaster.publish();
        assert_eq!(report, PublishReport { delivered: 3, failed: 0 });

        for rx in &mut receivers {
            let text = rx.recv().await.unwrap();
            let json: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(json["type"], "update");
        }
    }

    #[tokio::test]
    async fn test_closed_observer_does_not_block_others() {
        let (broadcaster, registry, _) = setup();
        let mut healthy_a = dashboard(&registry, 4);
        let closed = dashboard(&registry, 4);
        let mut healthy_b = dashboard(&registry, 4);
        drop(closed);

        let report = broadcaster.publish();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert!(healthy_a.recv().await.is_some());
        assert!(healthy_b.recv().await.is_some());

        // Stale observers are only removed by their own disconnect path.
        assert_eq!(registry.dashboard_count(), 3);
    }

    #[tokio::test]
    async fn test_slow_observer_drops_instead_of_blocking() {
        let (broadcaster, registry, _) = setup();
        let mut slow = dashboard(&registry, 1);
        let mut fast = dashboard(&registry, 8);

        broadcaster.publish();
        let second = broadcaster.publish();
        assert_eq!(second, PublishReport { delivered: 1, failed: 1 });

        assert!(slow.recv().await.is_some());
        assert!(fast.recv().await.is_some());
        assert!(fast.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_publish_reflects_current_state() {
        let (broadcaster, registry, store) = setup();
        let mut rx = dashboard(&registry, 4);
        store.set_connected(NodeKind::House, true);

        broadcaster.publish();
        let json: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(json["data"]["house"]["connected"], true);
        assert_eq!(json["data"]["pole"]["connected"], false);
    }

    #[tokio::test]
    async fn test_sync_one_targets_single_observer() {
        let (broadcaster, registry, _) = setup();
        let mut other = dashboard(&registry, 4);
        let (tx, mut rx) = mpsc::channel(4);
        let newcomer = ObserverHandle::new(registry.next_connection_id(), tx);

        assert!(broadcaster.sync_one(&newcomer));
        assert!(rx.recv().await.is_some());
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn test_publish_with_no_dashboards() {
        let (broadcaster, _, _) = setup();
        assert_eq!(broadcaster.publish(), PublishReport::default());
    }

    #[tokio::test]
    async fn test_attach_registers_and_syncs() {
        let (broadcaster, registry, _) = setup();
        let (tx, mut rx) = mpsc::channel(4);
        let observer = ObserverHandle::new(registry.next_connection_id(), tx);

        assert_eq!(broadcaster.attach(observer), (true, 1));
        assert!(rx.recv().await.is_some());

        broadcaster.publish();
        assert!(rx.recv().await.is_some());
    }
}
