#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

use crate::error::QuarryError;

/// Structural failures raised while compiling an editor graph into hops.
///
/// Compilation is all-or-nothing: any of these aborts before a single hop
/// is emitted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The graph has no nodes at all.
    #[error("graph has no nodes")]
    EmptyGraph,
    /// Two nodes share the same session id.
    #[error("node id '{node}' is declared more than once")]
    DuplicateNode { node: String },
    /// A node was placed without a schema.
    #[error("node '{node}' has an empty schema id")]
    EmptySchema { node: String },
    /// An edge points at a node that does not exist.
    #[error("edge {edge} references unknown {endpoint} node '{node}'")]
    DanglingEdge {
        edge: usize,
        endpoint: Endpoint,
        node: String,
    },
    /// An edge carries no relation name.
    #[error("edge {edge} has an empty relation name")]
    EmptyRelation { edge: usize },
    /// A node is the target of more than one edge.
    #[error("node '{node}' has more than one incoming edge")]
    MultipleParents { node: String },
    /// The graph loops back on itself.
    #[error("graph contains a cycle through node '{node}'")]
    Cycle { node: String },
    /// More than one node has no incoming edge.
    #[error("graph is disconnected; candidate roots: {}", .roots.join(", "))]
    Disconnected { roots: Vec<String> },
}

/// Which end of an edge failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Target,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Source => write!(f, "source"),
            Endpoint::Target => write!(f, "target"),
        }
    }
}

impl CompileError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::EmptyGraph => "EmptyGraph",
            CompileError::DuplicateNode { .. } => "DuplicateNode",
            CompileError::EmptySchema { .. } => "EmptySchema",
            CompileError::DanglingEdge { .. } => "DanglingEdge",
            CompileError::EmptyRelation { .. } => "EmptyRelation",
            CompileError::MultipleParents { .. } => "MultipleParents",
            CompileError::Cycle { .. } => "Cycle",
            CompileError::Disconnected { .. } => "Disconnected",
        }
    }
}

/// Structural failures in a persisted pattern list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// No root hop is present.
    #[error("pattern list requires a root hop")]
    MissingRoot,
    /// More than one root hop is present.
    #[error("pattern list has {count} root hops; exactly one is allowed")]
    MultipleRoots { count: usize },
    /// An edge hop was given only part of its `to`/`edge` pair.
    #[error("edge hop is missing '{missing}'")]
    IncompleteEdgeHop { missing: &'static str },
    /// An edge hop carries no relation name.
    #[error("hop {hop} has an empty relation name")]
    EmptyRelation { hop: usize },
    /// An edge hop starts from an occurrence no earlier hop introduced.
    #[error("hop {hop} starts from '{key}' which no earlier hop introduces")]
    UnknownSource { hop: usize, key: String },
    /// An edge hop introduces an occurrence that already exists.
    #[error("hop {hop} re-introduces occurrence '{key}'")]
    DuplicateOccurrence { hop: usize, key: String },
    /// An occurrence key is used with two different schema ids.
    #[error("hop {hop} uses '{key}' for schema '{found}' but it was introduced as '{expected}'")]
    SchemaMismatch {
        hop: usize,
        key: String,
        expected: String,
        found: String,
    },
}

impl PatternError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            PatternError::MissingRoot => "MissingRoot",
            PatternError::MultipleRoots { .. } => "MultipleRoots",
            PatternError::IncompleteEdgeHop { .. } => "IncompleteEdgeHop",
            PatternError::EmptyRelation { .. } => "EmptyRelation",
            PatternError::UnknownSource { .. } => "UnknownSource",
            PatternError::DuplicateOccurrence { .. } => "DuplicateOccurrence",
            PatternError::SchemaMismatch { .. } => "SchemaMismatch",
        }
    }
}

/// Rejections raised by the column ordering engine.
///
/// A rejected operation leaves the column set untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ColumnError {
    /// The `(fieldId, schemaId)` pair is already selected.
    #[error("column '{field_id}' of '{schema_id}' is already selected")]
    DuplicateColumn { field_id: String, schema_id: String },
    /// No column matches the selector.
    #[error("unknown column '{column}'")]
    UnknownColumn { column: String },
    /// A bare field id matches columns from several schemas.
    #[error("field '{field_id}' matches {candidates} columns; qualify it with a schema id")]
    AmbiguousColumn { field_id: String, candidates: usize },
    /// The same column was listed twice in one request.
    #[error("column '{column}' listed more than once")]
    DuplicateSelector { column: String },
    /// A reorder request did not name every column exactly once.
    #[error("reorder must list all {expected} columns (got {found})")]
    NotAPermutation { expected: usize, found: usize },
    /// Persisted select orders are not exactly `1..N`.
    #[error("selectOrder values must be a dense 1..{expected} sequence")]
    SelectOrderNotDense { expected: usize },
    /// Persisted group orders are not exactly `0..M-1`.
    #[error("groupOrder values must be a dense 0..{expected} sequence")]
    GroupOrderNotDense { expected: usize },
}

impl ColumnError {
    /// Builds an [`ColumnError::UnknownColumn`] for a selector.
    pub fn unknown(column: impl Into<String>) -> Self {
        ColumnError::UnknownColumn {
            column: column.into(),
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ColumnError::DuplicateColumn { .. } => "DuplicateColumn",
            ColumnError::UnknownColumn { .. } => "UnknownColumn",
            ColumnError::AmbiguousColumn { .. } => "AmbiguousColumn",
            ColumnError::DuplicateSelector { .. } => "DuplicateSelector",
            ColumnError::NotAPermutation { .. } => "NotAPermutation",
            ColumnError::SelectOrderNotDense { .. } => "SelectOrderNotDense",
            ColumnError::GroupOrderNotDense { .. } => "GroupOrderNotDense",
        }
    }
}

/// Validation failures for a whole [`QueryConfig`](crate::query::QueryConfig).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The pattern list is structurally invalid.
    #[error(transparent)]
    Pattern(#[from] PatternError),
    /// The column list violates an ordering invariant.
    #[error(transparent)]
    Column(#[from] ColumnError),
    /// Pagination limit must be positive.
    #[error("pagination limit must be greater than zero")]
    InvalidLimit,
    /// A column belongs to a schema occurrence the patterns never introduce.
    #[error("column '{field_id}' references '{schema_id}' which no pattern hop introduces")]
    UnknownColumnSchema { field_id: String, schema_id: String },
}

impl ConfigError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Pattern(err) => err.code(),
            ConfigError::Column(err) => err.code(),
            ConfigError::InvalidLimit => "InvalidLimit",
            ConfigError::UnknownColumnSchema { .. } => "UnknownColumnSchema",
        }
    }
}

/// Convenience wrapper that formats any query error with its code.
pub struct ErrorWithCode<'a, E>(pub &'a E);

macro_rules! display_with_code {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for ErrorWithCode<'_, $ty> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "[{}] {}", self.0.code(), self.0)
                }
            }
        )+
    };
}

display_with_code!(CompileError, PatternError, ColumnError, ConfigError, QuarryError);
