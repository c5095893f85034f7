//! Awareness channel abstraction and an in-memory implementation.
//!
//! Awareness state is ephemeral per-connection JSON: it is broadcast to
//! everyone connected and disappears when the connection closes. It is never
//! part of the persisted document.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatch::{CallbackRegistry, EventCallback, SubscriptionId};

/// Per-connection identifier assigned by the awareness provider.
pub type ClientId = u64;

/// Which connections changed in one awareness update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwarenessUpdate {
    /// Connections that published state for the first time
    pub added: Vec<ClientId>,
    /// Connections whose state changed
    pub updated: Vec<ClientId>,
    /// Connections that went away
    pub removed: Vec<ClientId>,
}

/// Access to the shared awareness state.
pub trait AwarenessChannel: Send + Sync {
    /// Id of the local connection.
    fn client_id(&self) -> ClientId;

    /// Set one field of the local state object, creating the state if
    /// needed.
    fn set_local_field(&self, field: &str, value: Value);

    /// Every connection's state, including the local one.
    fn states(&self) -> BTreeMap<ClientId, Value>;

    /// Listen for aggregate changes.
    fn subscribe(&self, callback: EventCallback<AwarenessUpdate>) -> SubscriptionId;

    /// Stop listening.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

struct HubInner {
    states: RwLock<BTreeMap<ClientId, Value>>,
    events: CallbackRegistry<AwarenessUpdate>,
    next_client: AtomicU64,
}

/// An in-process awareness provider shared by several connections.
///
/// Used by tests and by hosts that embed several sessions in one process.
#[derive(Clone)]
pub struct MemoryAwarenessHub {
    inner: Arc<HubInner>,
}

impl MemoryAwarenessHub {
    /// Create a hub with no connections.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                states: RwLock::new(BTreeMap::new()),
                events: CallbackRegistry::new(),
                next_client: AtomicU64::new(1),
            }),
        }
    }

    /// Open a new connection. It has no state until it sets a field.
    pub fn connect(&self) -> MemoryAwareness {
        let client_id = self.inner.next_client.fetch_add(1, Ordering::SeqCst);
        log::debug!("Awareness client {} connected", client_id);
        MemoryAwareness {
            hub: Arc::clone(&self.inner),
            client_id,
            closed: AtomicBool::new(false),
        }
    }

    /// Number of connections with published state.
    pub fn connected(&self) -> usize {
        self.inner
            .states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Default for MemoryAwarenessHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryAwarenessHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAwarenessHub")
            .field("connected", &self.connected())
            .finish()
    }
}

/// One connection to a [`MemoryAwarenessHub`]. Disconnects on drop.
pub struct MemoryAwareness {
    hub: Arc<HubInner>,
    client_id: ClientId,
    closed: AtomicBool,
}

impl MemoryAwareness {
    /// Remove this connection's state and notify everyone.
    pub fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let removed = {
            let mut states = self.hub.states.write().unwrap_or_else(|e| e.into_inner());
            states.remove(&self.client_id).is_some()
        };
        log::debug!("Awareness client {} disconnected", self.client_id);
        if removed {
            self.hub.events.emit(&AwarenessUpdate {
                removed: vec![self.client_id],
                ..Default::default()
            });
        }
    }
}

impl AwarenessChannel for MemoryAwareness {
    fn client_id(&self) -> ClientId {
        self.client_id
    }

    fn set_local_field(&self, field: &str, value: Value) {
        if self.closed.load(Ordering::SeqCst) {
            log::warn!("Ignoring awareness update on closed client {}", self.client_id);
            return;
        }
        let added = {
            let mut states = self.hub.states.write().unwrap_or_else(|e| e.into_inner());
            let added = !states.contains_key(&self.client_id);
            let state = states
                .entry(self.client_id)
                .or_insert_with(|| Value::Object(Default::default()));
            if !state.is_object() {
                *state = Value::Object(Default::default());
            }
            if let Value::Object(map) = state {
                map.insert(field.to_string(), value);
            }
            added
        };

        let update = if added {
            AwarenessUpdate {
                added: vec![self.client_id],
                ..Default::default()
            }
        } else {
            AwarenessUpdate {
                updated: vec![self.client_id],
                ..Default::default()
            }
        };
        self.hub.events.emit(&update);
    }

    fn states(&self) -> BTreeMap<ClientId, Value> {
        self.hub
            .states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn subscribe(&self, callback: EventCallback<AwarenessUpdate>) -> SubscriptionId {
        self.hub.events.subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hub.events.unsubscribe(id)
    }
}

impl Drop for MemoryAwareness {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for MemoryAwareness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAwareness")
            .field("client_id", &self.client_id)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_connections_share_state() {
        let hub = MemoryAwarenessHub::new();
        let a = hub.connect();
        let b = hub.connect();
        assert_ne!(a.client_id(), b.client_id());

        a.set_local_field("user", json!({"name": "Ada"}));
        let states = b.states();
        assert_eq!(states[&a.client_id()]["user"]["name"], "Ada");
        assert_eq!(hub.connected(), 1);
    }

    #[test]
    fn test_updates_are_classified() {
        let hub = MemoryAwarenessHub::new();
        let a = hub.connect();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        a.subscribe(Arc::new(move |update: &AwarenessUpdate| {
            sink.lock().unwrap().push(update.clone());
        }));

        a.set_local_field("user", json!({"name": "Ada"}));
        a.set_local_field("cursor", json!(null));
        a.disconnect();
        a.disconnect();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].added, vec![a.client_id()]);
        assert_eq!(seen[1].updated, vec![a.client_id()]);
        assert_eq!(seen[2].removed, vec![a.client_id()]);
    }

    #[test]
    fn test_drop_disconnects() {
        let hub = MemoryAwarenessHub::new();
        let a = hub.connect();
        a.set_local_field("user", json!({}));
        assert_eq!(hub.connected(), 1);
        drop(a);
        assert_eq!(hub.connected(), 0);
    }
}
