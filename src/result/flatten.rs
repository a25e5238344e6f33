//! Flattened payload parsing and table shaping.
//!
//! A flattened backend response is one JSON object whose keys encode the
//! nesting (`data.data.0.children.1.data.2.total`). Keys that do not fit
//! the grammar are skipped and reported; they never abort the parse.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::catalog::ResultSchema;
use crate::query::profile::{profile_timer, record_profile_timer, ProfileKind};
use crate::result::{
    depth::{ColumnGroup, SchemaDepthResolver, ShapedColumn},
    path::{parse_key, FieldPath, ParsedKey},
    ShapeOptions,
};

/// Cells of one root row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlattenedRow {
    /// Root row index from the key prefix.
    pub root_index: u64,
    /// Values keyed by path below the root row.
    pub cells: BTreeMap<FieldPath, Value>,
}

/// Parsed flattened payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlattenedResult {
    /// Rows in numeric root-index order.
    pub rows: Vec<FlattenedRow>,
    /// Every distinct field path seen across all rows.
    pub columns: Vec<FieldPath>,
    /// Keys that did not match the grammar.
    pub skipped: Vec<String>,
    /// Value of `data.schema`, when present.
    pub root_schema: Option<String>,
    /// Depth-ordered schemas from the `schemas` array.
    pub schemas: Vec<ResultSchema>,
}

impl FlattenedResult {
    /// Returns true when the payload carried neither rows nor a root schema.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.root_schema.is_none()
    }
}

/// Splits a flattened record into rows and field paths.
pub fn parse_flattened(record: &Map<String, Value>) -> FlattenedResult {
    let timer = profile_timer();
    let mut rows: BTreeMap<u64, BTreeMap<FieldPath, Value>> = BTreeMap::new();
    let mut columns = BTreeSet::new();
    let mut skipped = Vec::new();

    for (key, value) in record {
        match parse_key(key) {
            Ok(ParsedKey::Field(key)) => {
                columns.insert(key.path.clone());
                rows.entry(key.root).or_default().insert(key.path, value.clone());
            }
            Ok(ParsedKey::Reserved) => {}
            Err(err) => {
                debug!(key = key.as_str(), code = err.code(), "flatten.key_skipped");
                skipped.push(key.clone());
            }
        }
    }

    let root_schema = record
        .get("data.schema")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let schemas = record.get("schemas").map(read_schemas).unwrap_or_default();

    let result = FlattenedResult {
        rows: rows
            .into_iter()
            .map(|(root_index, cells)| FlattenedRow { root_index, cells })
            .collect(),
        columns: columns.into_iter().collect(),
        skipped,
        root_schema,
        schemas,
    };
    record_profile_timer(ProfileKind::Flatten, timer);
    result
}

fn read_schemas(value: &Value) -> Vec<ResultSchema> {
    match Vec::<ResultSchema>::deserialize(value) {
        Ok(schemas) => schemas,
        Err(err) => {
            debug!(%err, "flatten.schemas_unreadable");
            Vec::new()
        }
    }
}

/// One rendered row; `cells` lines up with [`FlatTable::columns`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    /// Root row index.
    pub root_index: u64,
    /// Cell values; `None` where the row has no value for the column.
    pub cells: Vec<Option<Value>>,
}

/// Render-ready flattened result.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatTable {
    /// Column groups per schema.
    pub groups: Vec<ColumnGroup>,
    /// All columns in display order, group by group.
    pub columns: Vec<ShapedColumn>,
    /// Rows in root-index order.
    pub rows: Vec<TableRow>,
    /// Keys that were skipped while parsing.
    pub skipped: Vec<String>,
}

/// Orders columns per schema and lays rows out against them.
///
/// `schemas` must be in depth order; pass `&result.schemas` to use the
/// list carried by the payload.
pub fn shape_flattened(
    result: &FlattenedResult,
    schemas: &[ResultSchema],
    options: &ShapeOptions,
) -> FlatTable {
    let resolver = SchemaDepthResolver::new(schemas, options.include_hidden);
    let groups = resolver.group_columns(&result.columns);
    let columns: Vec<ShapedColumn> = groups
        .iter()
        .flat_map(|group| group.columns.iter().cloned())
        .collect();
    let rows = result
        .rows
        .iter()
        .map(|row| TableRow {
            root_index: row.root_index,
            cells: columns
                .iter()
                .map(|column| row.cells.get(&column.path).cloned())
                .collect(),
        })
        .collect();
    FlatTable {
        groups,
        columns,
        rows,
        skipped: result.skipped.clone(),
    }
}
