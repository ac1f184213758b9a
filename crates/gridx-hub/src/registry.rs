//! Connection registry.
//!
//! Tracks connected dashboard observers and at most one producer per
//! hardware node kind. Each connection is represented by an
//! [`ObserverHandle`]: a bounded queue drained by that connection's own
//! writer task, so pushing a frame never waits on the network.
//!
//! Registering or unregistering a producer also flips the node's
//! `connected` flag in the [`StateStore`] and re-derives the alerts while
//! the registry lock is held, so the flag, the registry entry and the theft
//! signal always change together.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use gridx_core::{AnalyticsEngine, NodeKind};

use crate::store::StateStore;

/// Process-unique connection identifier.
pub type ConnectionId = u64;

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Outbound queue is full (slow consumer).
    #[error("queue full")]
    Full,
    /// Connection's writer has gone away.
    #[error("channel closed")]
    Closed,
}

/// Send side of one connection.
#[derive(Debug, Clone)]
pub struct ObserverHandle {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
}

impl ObserverHandle {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<String>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a text frame without waiting.
    pub fn try_send(&self, text: String) -> Result<(), DeliveryError> {
        self.tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    dashboards: HashMap<ConnectionId, ObserverHandle>,
    producers: HashMap<NodeKind, ObserverHandle>,
}

/// Shared registry of live connections.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    next_id: Arc<AtomicU64>,
    store: StateStore,
    engine: Arc<AnalyticsEngine>,
}

impl ConnectionRegistry {
    pub fn new(store: StateStore, engine: Arc<AnalyticsEngine>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner::default())),
            next_id: Arc::new(AtomicU64::new(1)),
            store,
            engine,
        }
    }

    /// Allocate an identifier for a new connection.
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Add a dashboard observer. Returns the number of dashboards.
    pub fn register_dashboard(&self, handle: ObserverHandle) -> usize {
        let mut inner = self.inner.write();
        inner.dashboards.insert(handle.id(), handle);
        inner.dashboards.len()
    }

    /// Remove a dashboard observer. Returns whether it was registered.
    pub fn unregister_dashboard(&self, id: ConnectionId) -> bool {
        self.inner.write().dashboards.remove(&id).is_some()
    }

    /// Register the producer for `kind`, replacing any previous one.
    ///
    /// The replaced handle is returned but not closed; its session keeps
    /// running until its own transport goes away.
    pub fn register_producer(&self, kind: NodeKind, handle: ObserverHandle) -> Option<ObserverHandle> {
        let mut inner = self.inner.write();
        let previous = inner.producers.insert(kind, handle);
        self.set_connected(kind, true);
        if let Some(prev) = &previous {
            info!(node = %kind, replaced = prev.id(), "Producer replaced by newer connection");
        }
        previous
    }

    /// Unregister the producer for `kind` if `id` still owns the slot.
    ///
    /// A superseded connection closing late leaves the live replacement
    /// (and the `connected` flag) untouched. Returns whether the entry was
    /// removed.
    pub fn unregister_producer(&self, kind: NodeKind, id: ConnectionId) -> bool {
        let mut inner = self.inner.write();
        match inner.producers.get(&kind).map(ObserverHandle::id) {
            Some(current) if current == id => {
                inner.producers.remove(&kind);
                self.set_connected(kind, false);
                true
            }
            Some(current) => {
                debug!(node = %kind, id, current, "Stale producer closed, slot kept");
                false
            }
            None => false,
        }
    }

    /// Current producer for `kind`.
    pub fn lookup_producer(&self, kind: NodeKind) -> Option<ObserverHandle> {
        self.inner.read().producers.get(&kind).cloned()
    }

    /// Copy of every registered dashboard handle.
    pub fn dashboards(&self) -> Vec<ObserverHandle> {
        self.inner.read().dashboards.values().cloned().collect()
    }

    pub fn dashboard_count(&self) -> usize {
        self.inner.read().dashboards.len()
    }

    /// Flip the flag and re-derive alerts in one state transaction.
    fn set_connected(&self, kind: NodeKind, connected: bool) {
        let engine = &self.engine;
        self.store.update_with(|state| {
            state.set_connected(kind, connected);
            state.alerts = engine.evaluate(state);
        });
    }
}
