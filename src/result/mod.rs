#![forbid(unsafe_code)]

//! Result shaping for display.
//!
//! Backend payloads arrive either nested or flattened, selected by the
//! `flatten` flag of the request. [`shape_payload`] routes each kind to its
//! parser and returns a render-ready [`ResultView`].

/// Schema-depth attribution and column ordering.
pub mod depth;
/// Flattened payload parsing and shaping.
pub mod flatten;
/// Nested payload assembly.
pub mod nested;
/// Key-path grammar for flattened payloads.
pub mod path;
/// Schema matching strategies.
pub mod resolve;

use serde::Serialize;
use serde_json::Value;

use self::flatten::{parse_flattened, shape_flattened, FlatTable};
use self::nested::{NestedPayload, NestedTable};
use self::resolve::SchemaMatcher;

/// Label used for blocks and groups whose schema could not be resolved.
pub const SCHEMA_NOT_FOUND: &str = "schema not found";

/// Options shared by both shaping paths.
#[derive(Clone, Debug, Default)]
pub struct ShapeOptions {
    /// Keep fields the catalog marks hidden.
    pub include_hidden: bool,
    /// Schema matcher for nested blocks.
    pub matcher: SchemaMatcher,
}

impl ShapeOptions {
    /// Keeps hidden fields.
    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }
}

/// Render-ready view of one payload.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", content = "table", rename_all = "camelCase")]
pub enum ResultView<'a> {
    /// The payload carried no result data.
    NoData,
    /// Rows from a flattened payload.
    Flattened(FlatTable),
    /// Root block of a nested payload.
    Nested(NestedTable<'a>),
}

impl ResultView<'_> {
    /// Returns true for [`ResultView::NoData`].
    pub fn is_empty(&self) -> bool {
        matches!(self, ResultView::NoData)
    }
}

/// Shapes a backend payload according to the request's `flatten` flag.
///
/// Payloads without top-level data never fail; they become
/// [`ResultView::NoData`].
pub fn shape_payload<'a>(
    payload: &'a Value,
    flatten: bool,
    options: &'a ShapeOptions,
) -> ResultView<'a> {
    if flatten {
        let Some(record) = payload.as_object() else {
            return ResultView::NoData;
        };
        let parsed = parse_flattened(record);
        if parsed.is_empty() {
            return ResultView::NoData;
        }
        ResultView::Flattened(shape_flattened(&parsed, &parsed.schemas, options))
    } else {
        match NestedPayload::parse(payload) {
            Some(nested) => ResultView::Nested(nested.assemble(options)),
            None => ResultView::NoData,
        }
    }
}
