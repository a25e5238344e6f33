//! Query definition and result shaping for schema-driven admin dashboards.
//!
//! The authoring half turns an editor graph into a persisted
//! [`QueryConfig`](query::QueryConfig) and back. The display half turns a
//! backend payload, nested or flattened, into schema-grouped rows.

#![warn(missing_docs)]

pub mod catalog;
pub mod error;
pub mod query;
pub mod result;

pub use catalog::{FieldDef, InMemoryCatalog, ResultSchema, SchemaRegistry};
pub use error::{QuarryError, Result};
pub use result::{shape_payload, ResultView, ShapeOptions};
