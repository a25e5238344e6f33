use thiserror::Error;

use crate::query::errors::{ColumnError, CompileError, ConfigError, PatternError};
use crate::query::executor::ExecutorError;
use crate::result::path::KeyPathError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, QuarryError>;

/// Any failure surfaced by the authoring or display pipeline.
#[derive(Debug, Error)]
pub enum QuarryError {
    /// The editor graph is not a rooted tree.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// A persisted hop list breaks its structural invariants.
    #[error(transparent)]
    Pattern(#[from] PatternError),
    /// A column edit was rejected.
    #[error(transparent)]
    Column(#[from] ColumnError),
    /// A query config failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The execution backend failed.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    /// A flattened payload key could not be parsed.
    #[error(transparent)]
    KeyPath(#[from] KeyPathError),
    /// Payload or metadata (de)serialization failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// A caller supplied an argument outside the accepted range.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

impl QuarryError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            QuarryError::Compile(err) => err.code(),
            QuarryError::Pattern(err) => err.code(),
            QuarryError::Column(err) => err.code(),
            QuarryError::Config(err) => err.code(),
            QuarryError::Executor(err) => err.code(),
            QuarryError::KeyPath(err) => err.code(),
            QuarryError::Json(_) => "Serialization",
            QuarryError::Invalid(_) => "InvalidArgument",
        }
    }
}
