//! Remote peers' identities and cursors, derived from awareness state.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use ts_rs::TS;

use super::channel::{AwarenessChannel, AwarenessUpdate, ClientId};
use crate::config::PresenceConfig;
use crate::dispatch::SubscriptionId;

/// A selection in one file, as byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CursorRange {
    /// File the selection is in
    pub path: String,
    /// Fixed end of the selection
    pub anchor: u32,
    /// Moving end of the selection (the caret)
    pub head: u32,
}

/// A connected remote peer, ready to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PeerPresence {
    /// Awareness connection id
    pub client_id: ClientId,
    /// Display label
    pub label: String,
    /// CSS color
    pub color: String,
    /// Current selection, if published
    pub cursor: Option<CursorRange>,
}

/// Whether a peer arrived or left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// Peer joined
    Joined,
    /// Peer left
    Left,
}

/// A transient join/leave notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PresenceNotice {
    /// Joined or left
    pub kind: NoticeKind,
    /// Peer the notice is about
    pub client_id: ClientId,
    /// Label at the time of the notice
    pub label: String,
    /// Unix timestamp (milliseconds)
    pub at: i64,
}

impl PresenceNotice {
    /// Human-readable message, e.g. "Ada joined".
    pub fn message(&self) -> String {
        match self.kind {
            NoticeKind::Joined => format!("{} joined", self.label),
            NoticeKind::Left => format!("{} left", self.label),
        }
    }
}

/// Undrained notices kept per overlay; older ones are dropped first.
pub const MAX_PENDING_NOTICES: usize = 64;

#[derive(Debug, Default)]
struct OverlayState {
    peers: BTreeMap<ClientId, PeerPresence>,
    notices: Vec<PresenceNotice>,
}

/// Renders-ready view of everyone else connected to the session.
///
/// Subscribes to the channel exactly once, on construction, and unsubscribes
/// on drop. Publishing the local identity or cursor never re-subscribes.
pub struct PresenceOverlay {
    channel: Arc<dyn AwarenessChannel>,
    config: PresenceConfig,
    state: Arc<Mutex<OverlayState>>,
    subscription: SubscriptionId,
}

impl PresenceOverlay {
    /// Start tracking peers on `channel`.
    ///
    /// Peers already connected are picked up silently; only later arrivals
    /// and departures produce notices.
    pub fn new(channel: Arc<dyn AwarenessChannel>, config: PresenceConfig) -> Self {
        let state = Arc::new(Mutex::new(OverlayState::default()));
        {
            let mut guard = lock(&state);
            guard.peers = collect_peers(channel.as_ref(), &config);
        }

        let weak_channel: Weak<dyn AwarenessChannel> = Arc::downgrade(&channel);
        let weak_state = Arc::downgrade(&state);
        let callback_config = config.clone();
        let subscription = channel.subscribe(Arc::new(move |_update: &AwarenessUpdate| {
            let (Some(channel), Some(state)) = (weak_channel.upgrade(), weak_state.upgrade())
            else {
                return;
            };
            let peers = collect_peers(channel.as_ref(), &callback_config);
            apply_peers(&mut lock(&state), peers);
        }));

        Self {
            channel,
            config,
            state,
            subscription,
        }
    }

    /// Publish the local identity. Missing fields fall back to the
    /// configured defaults on other peers.
    pub fn publish_identity(&self, name: &str, color: Option<&str>) {
        let mut identity = json!({ "name": name });
        if let Some(color) = color {
            identity["color"] = Value::String(color.to_string());
        }
        self.channel
            .set_local_field(&self.config.identity_field, identity);
    }

    /// Publish (or clear) the local selection.
    pub fn publish_cursor(&self, cursor: Option<CursorRange>) {
        let value = match cursor {
            Some(cursor) => serde_json::to_value(cursor).unwrap_or(Value::Null),
            None => Value::Null,
        };
        self.channel.set_local_field(&self.config.cursor_field, value);
    }

    /// Remote peers, ordered by client id.
    pub fn peers(&self) -> Vec<PeerPresence> {
        lock(&self.state).peers.values().cloned().collect()
    }

    /// Number of remote peers.
    pub fn peer_count(&self) -> usize {
        lock(&self.state).peers.len()
    }

    /// Remote peers with a cursor in `path`.
    pub fn cursors_in(&self, path: &str) -> Vec<PeerPresence> {
        lock(&self.state)
            .peers
            .values()
            .filter(|peer| peer.cursor.as_ref().is_some_and(|c| c.path == path))
            .cloned()
            .collect()
    }

    /// Take the join/leave notices produced since the last call, oldest
    /// first. At most [`MAX_PENDING_NOTICES`] are kept between calls.
    pub fn drain_notices(&self) -> Vec<PresenceNotice> {
        std::mem::take(&mut lock(&self.state).notices)
    }

    /// Id of the local connection.
    pub fn local_client_id(&self) -> ClientId {
        self.channel.client_id()
    }
}

impl Drop for PresenceOverlay {
    fn drop(&mut self) {
        self.channel.unsubscribe(self.subscription);
    }
}

impl std::fmt::Debug for PresenceOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceOverlay")
            .field("client_id", &self.channel.client_id())
            .field("peers", &self.peer_count())
            .finish()
    }
}

fn lock(state: &Mutex<OverlayState>) -> MutexGuard<'_, OverlayState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Decode every remote connection's state into a peer descriptor.
fn collect_peers(
    channel: &dyn AwarenessChannel,
    config: &PresenceConfig,
) -> BTreeMap<ClientId, PeerPresence> {
    let local = channel.client_id();
    channel
        .states()
        .into_iter()
        .filter(|(client_id, _)| *client_id != local)
        .map(|(client_id, state)| (client_id, peer_from_state(client_id, &state, config)))
        .collect()
}

fn peer_from_state(client_id: ClientId, state: &Value, config: &PresenceConfig) -> PeerPresence {
    let identity = &state[config.identity_field.as_str()];
    let text_field = |key: &str| {
        identity[key]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    let cursor = state
        .get(config.cursor_field.as_str())
        .filter(|value| !value.is_null())
        .and_then(|value| serde_json::from_value(value.clone()).ok());

    PeerPresence {
        client_id,
        label: text_field("name").unwrap_or_else(|| config.default_label.clone()),
        color: text_field("color").unwrap_or_else(|| config.default_color.clone()),
        cursor,
    }
}

/// Replace the peer set, recording joins and departures.
fn apply_peers(state: &mut OverlayState, peers: BTreeMap<ClientId, PeerPresence>) {
    let at = chrono::Utc::now().timestamp_millis();

    for (client_id, peer) in &peers {
        if !state.peers.contains_key(client_id) {
            log::debug!("Peer {} ({}) joined", client_id, peer.label);
            state.notices.push(PresenceNotice {
                kind: NoticeKind::Joined,
                client_id: *client_id,
                label: peer.label.clone(),
                at,
            });
        }
    }
    for (client_id, peer) in &state.peers {
        if !peers.contains_key(client_id) {
            log::debug!("Peer {} ({}) left", client_id, peer.label);
            state.notices.push(PresenceNotice {
                kind: NoticeKind::Left,
                client_id: *client_id,
                label: peer.label.clone(),
                at,
            });
        }
    }
    state.peers = peers;

    let overflow = state.notices.len().saturating_sub(MAX_PENDING_NOTICES);
    if overflow > 0 {
        log::debug!("Dropping {} undrained presence notices", overflow);
        state.notices.drain(..overflow);
    }
}
