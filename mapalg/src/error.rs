use std::path::PathBuf;

use thiserror::Error;

/// Every failure the embedding layer can report.
///
/// Public entry points return `anyhow::Result`; the kind is recovered with
/// `err.downcast_ref::<MapError>()`.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("engine library could not be loaded from any of [{}]: {reason}", join_paths(.tried))]
    Binding { tried: Vec<PathBuf>, reason: String },
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error("null node: {0}")]
    NullNode(String),
    #[error("unsupported loop context: {0}")]
    UnsupportedLoopContext(String),
    #[error("malformed loop: {0}")]
    MalformedLoop(String),
    #[error("write of resource '{resource}' failed with status {status}")]
    EngineWriteFailure { resource: String, status: i32 },
    #[error("engine fault: {0}")]
    Engine(String),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl MapError {
    pub fn type_mismatch(msg: impl Into<String>) -> anyhow::Error {
        MapError::TypeMismatch(msg.into()).into()
    }

    pub fn invalid_shape(msg: impl Into<String>) -> anyhow::Error {
        MapError::InvalidShape(msg.into()).into()
    }

    pub fn malformed_loop(msg: impl Into<String>) -> anyhow::Error {
        MapError::MalformedLoop(msg.into()).into()
    }

    pub fn engine(msg: impl Into<String>) -> anyhow::Error {
        MapError::Engine(msg.into()).into()
    }
}

/// Returns the structured kind behind an error, if any.
pub fn error_kind(err: &anyhow::Error) -> Option<&MapError> {
    err.downcast_ref::<MapError>()
}
