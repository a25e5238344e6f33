#![forbid(unsafe_code)]

//! Query definition authoring.
//!
//! A query is drawn as a graph of schema occurrences, compiled into a
//! canonical multi-hop pattern list and persisted as a [`QueryConfig`]
//! together with its columns, grouping and pagination.

/// Fluent construction of query configs.
///
/// Errors are deferred until `build()`.
pub mod builder;

/// Column selection with dense select and group orders.
pub mod columns;

/// Graph to pattern compilation.
///
/// Validates the drawn graph as a rooted tree and emits canonical hops.
pub mod compile;

/// Error types for every query authoring concern.
pub mod errors;

/// Execution backend contract.
pub mod executor;

/// Pattern to graph expansion and normalization.
pub mod expand;

/// Editor-side graph types.
pub mod graph;

/// Persisted config, patterns and pagination.
pub mod model;

/// Performance profiling for compile and shaping phases.
///
/// Collects timing and count statistics when `QUARRY_PROFILE` is set.
pub mod profile;

pub use builder::QueryConfigBuilder;
pub use columns::{ColumnDef, ColumnSelector, ColumnSet};
pub use compile::{compile, CompileOptions, CompiledPattern};
pub use errors::{ColumnError, CompileError, ConfigError, PatternError};
pub use executor::{run_query, ExecutionRequest, ExecutorError, QueryExecutor, QueryOutcome};
pub use expand::{expand, normalize, LayoutOptions, Normalized};
pub use graph::{GraphEdge, GraphNode, NodeId, Position, QueryGraph};
pub use model::{PaginationSpec, PaginationStrategy, PatternHop, QueryConfig, SchemaRef};
