//! Editor binding subsystem.
//!
//! Connects the host's editor widget to the shared text of the active file.
//!
//! # Module Structure
//!
//! - `model` - [`EditorModel`], local edits and the per-file [`ModelRegistry`]
//! - `widget` - The [`EditorWidget`] trait implemented by hosts
//! - `binding` - [`TextBinding`], one live model/text synchronization
//! - `manager` - [`EditorBindingManager`], the bind/unbind state machine

mod binding;
mod manager;
mod model;
mod widget;

pub use binding::TextBinding;
pub use manager::{BindingPhase, BindingStats, EditorBindingManager};
pub use model::{EditorModel, ModelEdit, ModelRegistry, OutOfRange, SharedModel};
pub use widget::EditorWidget;
