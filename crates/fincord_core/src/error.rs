use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Unified error type for fincord operations
#[derive(Debug, Error)]
pub enum FincordError {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // Shared document errors
    #[error("CRDT error: {0}")]
    Crdt(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Config errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    // Editor errors
    #[error("Editor widget is not ready")]
    EditorNotReady,

    #[error("Failed to bind editor model for '{path}': {reason}")]
    Binding { path: String, reason: String },
}

/// Result type alias for fincord operations
pub type Result<T> = std::result::Result<T, FincordError>;

/// A serializable representation of FincordError for IPC hosts
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Associated path (if applicable)
    pub path: Option<PathBuf>,
}

impl From<&FincordError> for SerializableError {
    fn from(err: &FincordError) -> Self {
        let kind = match err {
            FincordError::Io(_) => "Io",
            FincordError::FileRead { .. } => "FileRead",
            FincordError::FileWrite { .. } => "FileWrite",
            FincordError::Crdt(_) => "Crdt",
            FincordError::Json(_) => "Json",
            FincordError::ConfigParse(_) => "ConfigParse",
            FincordError::ConfigSerialize(_) => "ConfigSerialize",
            FincordError::EditorNotReady => "EditorNotReady",
            FincordError::Binding { .. } => "Binding",
        }
        .to_string();

        let path = match err {
            FincordError::FileRead { path, .. } => Some(path.clone()),
            FincordError::FileWrite { path, .. } => Some(path.clone()),
            FincordError::Binding { path, .. } => Some(PathBuf::from(path)),
            _ => None,
        };

        Self {
            kind,
            message: err.to_string(),
            path,
        }
    }
}

impl From<FincordError> for SerializableError {
    fn from(err: FincordError) -> Self {
        SerializableError::from(&err)
    }
}

impl FincordError {
    /// Convert to a serializable representation for IPC
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_error_keeps_path() {
        let err = FincordError::Binding {
            path: "src/main.ts".to_string(),
            reason: "model missing".to_string(),
        };
        let ser = err.to_serializable();
        assert_eq!(ser.kind, "Binding");
        assert_eq!(ser.path, Some(PathBuf::from("src/main.ts")));
        assert!(ser.message.contains("model missing"));
    }

    #[test]
    fn test_crdt_error_has_no_path() {
        let ser = SerializableError::from(FincordError::Crdt("bad update".to_string()));
        assert_eq!(ser.kind, "Crdt");
        assert!(ser.path.is_none());
        assert_eq!(ser.message, "CRDT error: bad update");
    }
}
