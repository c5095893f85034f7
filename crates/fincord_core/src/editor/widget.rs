//! The seam to the host's editor widget.

use super::model::SharedModel;

/// A mounted code editor that can display one model at a time.
///
/// Implementations wrap the host's real editor component. The engine only
/// swaps models in and out; rendering and input handling stay in the host.
pub trait EditorWidget: Send + Sync {
    /// Whether the widget has finished initializing and accepts models.
    fn is_ready(&self) -> bool;

    /// Display `model`.
    fn set_model(&self, model: SharedModel);

    /// Display nothing.
    fn clear_model(&self);
}
