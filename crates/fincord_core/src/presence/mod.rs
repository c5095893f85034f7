//! Presence: who else is here and where their cursors are.
//!
//! - `channel` - The [`AwarenessChannel`] seam and [`MemoryAwarenessHub`]
//! - `overlay` - [`PresenceOverlay`], the render-ready peer view

mod channel;
mod overlay;

pub use channel::{
    AwarenessChannel, AwarenessUpdate, ClientId, MemoryAwareness, MemoryAwarenessHub,
};
pub use overlay::{
    CursorRange, MAX_PENDING_NOTICES, NoticeKind, PeerPresence, PresenceNotice, PresenceOverlay,
};
