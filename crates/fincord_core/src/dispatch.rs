//! Supervising fan-out dispatcher for engine events.
//!
//! Every component that publishes notifications (the workspace store, the
//! in-memory awareness hub, the command bus) owns one [`CallbackRegistry`].
//! The registry is the single place where listener failures are contained:
//! a panicking callback is logged and skipped, and the remaining callbacks
//! still run.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// A unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback function type for events of type `E`.
///
/// Callbacks receive a reference to the event and should not block for extended periods.
pub type EventCallback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Inner<E> {
    /// Map of subscription IDs to callbacks, ordered by subscription time.
    callbacks: RwLock<BTreeMap<SubscriptionId, EventCallback<E>>>,
    /// Counter for generating unique subscription IDs.
    next_id: AtomicU64,
}

/// Thread-safe registry for managing event subscriptions.
///
/// The registry supports:
/// - Subscribing to events with unique IDs (or scoped [`ListenerGuard`]s)
/// - Unsubscribing by ID
/// - Emitting events to all active subscribers, isolating panics
///
/// # Example
///
/// ```
/// use fincord_core::dispatch::CallbackRegistry;
/// use std::sync::Arc;
///
/// let registry: CallbackRegistry<String> = CallbackRegistry::new();
///
/// let id = registry.subscribe(Arc::new(|event: &String| {
///     println!("Event: {}", event);
/// }));
///
/// registry.emit(&"changed".to_string());
///
/// registry.unsubscribe(id);
/// ```
pub struct CallbackRegistry<E> {
    inner: Arc<Inner<E>>,
}

impl<E> CallbackRegistry<E> {
    /// Create a new empty callback registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                callbacks: RwLock::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to events.
    ///
    /// Returns a subscription ID that can be used to unsubscribe later.
    pub fn subscribe(&self, callback: EventCallback<E>) -> SubscriptionId {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let mut callbacks = self
            .inner
            .callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner());
        callbacks.insert(id, callback);
        id
    }

    /// Subscribe and get a guard that unsubscribes when dropped.
    pub fn subscribe_scoped(&self, callback: EventCallback<E>) -> ListenerGuard<E> {
        let id = self.subscribe(callback);
        ListenerGuard {
            registry: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Unsubscribe from events.
    ///
    /// Returns `true` if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        remove(&self.inner, id)
    }

    /// Emit an event to all registered callbacks.
    ///
    /// Callbacks are invoked synchronously in subscription order. The set of
    /// callbacks is snapshotted first, so a callback may subscribe or
    /// unsubscribe without deadlocking. If a callback panics, it does not
    /// affect other callbacks.
    ///
    /// Returns the number of callbacks that failed.
    pub fn emit(&self, event: &E) -> usize {
        let snapshot: Vec<(SubscriptionId, EventCallback<E>)> = {
            let callbacks = self
                .inner
                .callbacks
                .read()
                .unwrap_or_else(|e| e.into_inner());
            callbacks
                .iter()
                .map(|(id, cb)| (*id, Arc::clone(cb)))
                .collect()
        };

        let mut failures = 0;
        for (id, callback) in snapshot {
            // Use catch_unwind to prevent one callback from breaking others
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(event);
            }));
            if let Err(payload) = result {
                failures += 1;
                log::error!(
                    "Listener {} panicked during dispatch: {}",
                    id,
                    panic_message(payload.as_ref())
                );
            }
        }
        failures
    }

    /// Get the number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let callbacks = self
            .inner
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner());
        callbacks.len()
    }

    /// Check if there are any active subscriptions.
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }

    /// Clear all subscriptions.
    pub fn clear(&self) {
        let mut callbacks = self
            .inner
            .callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner());
        callbacks.clear();
    }
}

impl<E> Default for CallbackRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for CallbackRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("subscriber_count", &self.subscriber_count())
            .field("next_id", &self.inner.next_id.load(Ordering::SeqCst))
            .finish()
    }
}

fn remove<E>(inner: &Inner<E>, id: SubscriptionId) -> bool {
    let mut callbacks = inner.callbacks.write().unwrap_or_else(|e| e.into_inner());
    callbacks.remove(&id).is_some()
}

/// Extract a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Scoped subscription; unsubscribes from its registry when dropped.
///
/// Holds only a weak reference, so a guard outliving its registry is harmless.
#[must_use = "dropping the guard unsubscribes the listener"]
pub struct ListenerGuard<E> {
    registry: Weak<Inner<E>>,
    id: SubscriptionId,
}

impl<E> ListenerGuard<E> {
    /// The subscription ID behind this guard.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.registry.upgrade().is_some_and(|inner| {
            inner
                .callbacks
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .contains_key(&self.id)
        })
    }
}

impl<E> Drop for ListenerGuard<E> {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            remove(&inner, self.id);
        }
    }
}

impl<E> std::fmt::Debug for ListenerGuard<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard").field("id", &self.id).finish()
    }
}
