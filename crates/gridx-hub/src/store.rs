//! Shared system state.
//!
//! `StateStore` owns the single `SystemState` for the process. Every
//! mutation happens under one write lock, so readers never observe a
//! half-merged section. Snapshots are deep copies, so callers can serialize
//! and send them without holding the lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use gridx_core::{AnalyticsEngine, Evaluation, NodeKind, StateSection, SystemState};

/// Point-in-time copy of the system state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// When the copy was taken.
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: SystemState,
}

/// Handle to the process-wide system state.
///
/// Cheap to clone; all clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<RwLock<SystemState>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with an initial state.
    pub fn with_state(state: SystemState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Merge a partial section update.
    pub fn update(&self, section: &StateSection) {
        self.inner.write().apply(section);
    }

    /// Set a producer's connectivity flag.
    pub fn set_connected(&self, kind: NodeKind, connected: bool) {
        self.inner.write().set_connected(kind, connected);
    }

    /// Merge a section and recompute the alerts from the merged values.
    ///
    /// Both happen under one write lock, so the stored alerts always match
    /// the readings they were derived from.
    pub fn apply_and_evaluate(&self, section: &StateSection, engine: &AnalyticsEngine) -> Evaluation {
        self.update_with(|state| {
            state.apply(section);
            let evaluation = engine.assess(state);
            state.alerts = evaluation.alerts.clone();
            evaluation
        })
    }

    /// Run `f` against the state under a single write lock.
    pub fn update_with<R>(&self, f: impl FnOnce(&mut SystemState) -> R) -> R {
        let mut state = self.inner.write();
        f(&mut state)
    }

    /// Run `f` against the state under a read lock.
    pub fn read_with<R>(&self, f: impl FnOnce(&SystemState) -> R) -> R {
        let state = self.inner.read();
        f(&state)
    }

    /// Take a consistent copy of the whole state.
    pub fn snapshot(&self) -> StateSnapshot {
        let state = self.inner.read().clone();
        StateSnapshot {
            generated_at: Utc::now(),
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridx_core::{AlertUpdate, HouseUpdate, PoleUpdate};

    #[test]
    fn test_clones_share_state() {
        let store = StateStore::new();
        let other = store.clone();
        store.set_connected(NodeKind::Pole, true);
        assert!(other.snapshot().state.pole.connected);
    }

    #[test]
    fn test_update_merges_sections() {
        let store = StateStore::new();
        store.update(&StateSection::Pole(PoleUpdate {
            power: Some(450.0),
            ..Default::default()
        }));
        store.update(&StateSection::House(HouseUpdate {
            temperature: Some(38.0),
            ..Default::default()
        }));
        store.update(&StateSection::Alerts(AlertUpdate {
            message: Some("custom".to_string()),
            ..Default::default()
        }));

        let snap = store.snapshot().state;
        assert_eq!(snap.pole.power, 450.0);
        assert_eq!(snap.house.temperature, 38.0);
        assert_eq!(snap.house.power, 0.0);
        assert_eq!(snap.alerts.message, "custom");
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let store = StateStore::new();
        let before = store.snapshot();
        store.update_with(|s| s.house.current = 12.0);
        assert_eq!(before.state.house.current, 0.0);
        assert_eq!(store.read_with(|s| s.house.current), 12.0);
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let json = serde_json::to_value(StateStore::new().snapshot()).unwrap();
        assert!(json.get("generatedAt").is_some());
        assert!(json.get("pole").is_some());
        assert!(json.get("alerts").is_some());
    }

    #[test]
    fn test_apply_and_evaluate_writes_alerts() {
        let store = StateStore::new();
        let engine = AnalyticsEngine::default();
        let evaluation = store.apply_and_evaluate(
            &StateSection::House(HouseUpdate {
                current: Some(25.0),
                ..Default::default()
            }),
            &engine,
        );

        assert!(evaluation.maintenance.at_risk);
        let alerts = store.snapshot().state.alerts;
        assert_eq!(alerts, evaluation.alerts);
        assert_eq!(alerts.risk_score, 0.9);
    }

    #[test]
    fn test_concurrent_updates_never_tear_sections() {
        let store = StateStore::new();
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for n in 0..500 {
                        let v = f64::from(i * 1000 + n);
                        store.update(&StateSection::Pole(PoleUpdate {
                            power: Some(v),
                            voltage: Some(v),
                            current: Some(v),
                            ..Default::default()
                        }));
                    }
                })
            })
            .collect();

        for _ in 0..500 {
            let pole = store.snapshot().state.pole;
            assert_eq!(pole.power, pole.voltage);
            assert_eq!(pole.power, pole.current);
        }
        for w in writers {
            w.join().unwrap();
        }
    }
}
