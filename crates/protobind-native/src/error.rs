//! Native dependency errors.

use std::path::PathBuf;

use protobind_targets::TargetError;
use thiserror::Error;

/// Errors raised while resolving the native bundle or the rename table.
#[derive(Debug, Error)]
pub enum NativeError {
    #[error("configuration error: {0}")]
    Target(#[from] TargetError),

    /// A rename rule whose names are not C identifiers.
    #[error("invalid rename '{name}': {detail}")]
    InvalidRename { name: String, detail: String },

    /// A `NAME[=VALUE]` definition whose name is not a C identifier.
    #[error("invalid definition '{text}': name is not a C identifier")]
    InvalidDefinition { text: String },

    /// Two rules for the same canonical symbol.
    #[error("duplicate rename for '{canonical}'")]
    DuplicateRename { canonical: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NativeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NativeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for native dependency operations.
pub type Result<T> = std::result::Result<T, NativeError>;
