//! Generation pipeline errors.

use std::path::PathBuf;
use std::time::Duration;

use protobind_targets::TargetError;
use thiserror::Error;

/// Errors that abort the generation pipeline.
///
/// Missing inputs are not errors; see [`crate::SkipReason`].
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("configuration error: {0}")]
    Target(#[from] TargetError),

    #[error("{} exited with {}: {stderr}", program.display(), describe_code(*code))]
    CompilerFailed {
        program: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{} did not finish within {timeout:?}", program.display())]
    Timeout { program: PathBuf, timeout: Duration },

    #[error("{} was cancelled", program.display())]
    Cancelled { program: PathBuf },

    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot add {} to the compiler search path", dir.display())]
    SearchPath { dir: PathBuf },

    #[error("post-processing {} failed after {attempts} attempts: {source}", path.display())]
    PostProcess {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid descriptor set {}: {detail}", path.display())]
    InvalidDescriptor { path: PathBuf, detail: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file error: {0}")]
    Json(#[from] serde_json::Error),
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

impl CodegenError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CodegenError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, CodegenError>;
