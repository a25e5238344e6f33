//! Nested result assembly.
//!
//! A nested payload is `{ schema, data: [row], schemas: [ResultSchema] }`
//! where a row may carry `children: [{ schema, data }]`. Each block is
//! resolved against the catalog through the [`SchemaMatcher`]; child blocks
//! stay unassembled until asked for, borrowing straight from the payload.
//!
//! [`SchemaMatcher`]: crate::result::resolve::SchemaMatcher

use std::sync::Arc;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::catalog::ResultSchema;
use crate::query::profile::{profile_timer, record_profile_timer, ProfileKind};
use crate::result::{ShapeOptions, SCHEMA_NOT_FOUND};

const CHILDREN: &str = "children";

/// How a block's schema was resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockSchema {
    /// Matched a catalog entry.
    Resolved {
        /// Position in the payload's schema list.
        index: usize,
        /// Id of the matched schema.
        schema_id: String,
        /// Strategy that produced the match.
        strategy: &'static str,
    },
    /// Nothing in the catalog answered to the requested id.
    NotFound {
        /// Id the payload asked for.
        requested: String,
    },
}

impl BlockSchema {
    /// Returns true for unresolved blocks.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, BlockSchema::NotFound { .. })
    }
}

/// Borrowed view of a nested payload's top level.
#[derive(Clone, Debug)]
pub struct NestedPayload<'a> {
    /// Requested root schema id.
    pub schema: &'a str,
    /// Root rows.
    pub data: &'a [Value],
    /// Catalog shipped with the payload.
    pub schemas: Arc<[ResultSchema]>,
}

impl<'a> NestedPayload<'a> {
    /// Reads the top level; `None` when `schema` or `data` is missing.
    pub fn parse(payload: &'a Value) -> Option<Self> {
        let object = payload.as_object()?;
        let schema = object.get("schema")?.as_str()?;
        let data = object.get("data")?.as_array()?;
        let schemas: Vec<ResultSchema> = match object.get("schemas") {
            Some(value) => match Vec::<ResultSchema>::deserialize(value) {
                Ok(schemas) => schemas,
                Err(err) => {
                    debug!(%err, "nested.schemas_unreadable");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        Some(Self {
            schema,
            data,
            schemas: schemas.into(),
        })
    }

    /// Assembles the root block.
    pub fn assemble(&self, options: &'a ShapeOptions) -> NestedTable<'a> {
        ChildBlock {
            requested: self.schema,
            data: self.data,
            schemas: Arc::clone(&self.schemas),
            options,
        }
        .assemble()
    }
}

/// Header of one nested table column.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedColumn {
    /// Field name looked up in each row.
    pub field: String,
    /// Header text.
    pub label: String,
    #[serde(skip)]
    fallback: Option<String>,
}

impl NestedColumn {
    /// Cell for this column: the field name, else the field id.
    fn cell<'a>(&self, row: &'a Map<String, Value>) -> Option<&'a Value> {
        row.get(&self.field)
            .or_else(|| self.fallback.as_ref().and_then(|id| row.get(id)))
    }
}

/// A block of rows belonging to one schema.
#[derive(Clone, Debug)]
pub struct NestedTable<'a> {
    /// Resolution outcome.
    pub schema: BlockSchema,
    /// Block header; [`SCHEMA_NOT_FOUND`] for placeholders.
    pub label: String,
    /// Columns in schema field order.
    pub columns: Vec<NestedColumn>,
    /// Rows in payload order.
    pub rows: Vec<NestedRow<'a>>,
}

/// One row of a [`NestedTable`].
#[derive(Clone, Debug)]
pub struct NestedRow<'a> {
    /// Cells aligned with the table columns.
    pub cells: Vec<Option<&'a Value>>,
    /// Child blocks, not yet assembled.
    pub children: Vec<ChildBlock<'a>>,
}

/// An unassembled child block.
#[derive(Clone)]
pub struct ChildBlock<'a> {
    requested: &'a str,
    data: &'a [Value],
    schemas: Arc<[ResultSchema]>,
    options: &'a ShapeOptions,
}

impl std::fmt::Debug for ChildBlock<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildBlock")
            .field("requested", &self.requested)
            .field("rows", &self.data.len())
            .finish()
    }
}

impl<'a> ChildBlock<'a> {
    /// Schema id the block asked for.
    pub fn requested_schema(&self) -> &'a str {
        self.requested
    }

    /// Number of rows in the block.
    pub fn row_count(&self) -> usize {
        self.data.len()
    }

    /// Resolves the block schema and lays out its rows.
    pub fn assemble(&self) -> NestedTable<'a> {
        let timer = profile_timer();
        let table = self.assemble_inner();
        record_profile_timer(ProfileKind::Nested, timer);
        table
    }

    fn assemble_inner(&self) -> NestedTable<'a> {
        let rows: Vec<&'a Map<String, Value>> = self
            .data
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| {
                let object = row.as_object();
                if object.is_none() {
                    debug!(schema = self.requested, row = idx, "nested.row_skipped");
                }
                object
            })
            .collect();

        let resolution = self.options.matcher.resolve(self.requested, &self.schemas);
        let (schema, label, columns) = match resolution {
            Some(hit) => {
                let resolved = &self.schemas[hit.index];
                debug!(
                    requested = self.requested,
                    schema = resolved.id.as_str(),
                    strategy = hit.strategy,
                    "nested.schema_resolved"
                );
                let columns: Vec<NestedColumn> = resolved
                    .fields
                    .iter()
                    .filter(|field| self.options.include_hidden || !field.hidden)
                    .map(|field| {
                        let by_name = !field.name.is_empty() && field.name != field.id;
                        NestedColumn {
                            field: if field.name.is_empty() {
                                field.id.clone()
                            } else {
                                field.name.clone()
                            },
                            label: field.display_label().to_owned(),
                            fallback: by_name.then(|| field.id.clone()),
                        }
                    })
                    .collect();
                (
                    BlockSchema::Resolved {
                        index: hit.index,
                        schema_id: resolved.id.clone(),
                        strategy: hit.strategy,
                    },
                    resolved.display_label().to_owned(),
                    columns,
                )
            }
            None => {
                warn!(requested = self.requested, "nested.schema_unresolved");
                (
                    BlockSchema::NotFound {
                        requested: self.requested.to_owned(),
                    },
                    SCHEMA_NOT_FOUND.to_owned(),
                    observed_columns(&rows),
                )
            }
        };

        let rows = rows
            .into_iter()
            .map(|row| NestedRow {
                cells: columns.iter().map(|column| column.cell(row)).collect(),
                children: self.children_of(row),
            })
            .collect();

        NestedTable {
            schema,
            label,
            columns,
            rows,
        }
    }

    fn children_of(&self, row: &'a Map<String, Value>) -> Vec<ChildBlock<'a>> {
        let Some(blocks) = row.get(CHILDREN).and_then(Value::as_array) else {
            return Vec::new();
        };
        blocks
            .iter()
            .filter_map(|block| {
                let requested = block.get("schema").and_then(Value::as_str);
                let data = block.get("data").and_then(Value::as_array);
                match (requested, data) {
                    (Some(requested), Some(data)) => Some(ChildBlock {
                        requested,
                        data,
                        schemas: Arc::clone(&self.schemas),
                        options: self.options,
                    }),
                    _ => {
                        debug!(parent = self.requested, "nested.child_skipped");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Keys seen across rows in first-seen order, for blocks without a schema.
fn observed_columns(rows: &[&Map<String, Value>]) -> Vec<NestedColumn> {
    let mut columns: Vec<NestedColumn> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if key != CHILDREN && !columns.iter().any(|column| &column.field == key) {
                columns.push(NestedColumn {
                    field: key.clone(),
                    label: key.clone(),
                    fallback: None,
                });
            }
        }
    }
    columns
}

impl Serialize for BlockSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BlockSchema::Resolved {
                schema_id,
                strategy,
                ..
            } => {
                let mut state = serializer.serialize_struct("BlockSchema", 2)?;
                state.serialize_field("schemaId", schema_id)?;
                state.serialize_field("strategy", strategy)?;
                state.end()
            }
            BlockSchema::NotFound { requested } => {
                let mut state = serializer.serialize_struct("BlockSchema", 2)?;
                state.serialize_field("requested", requested)?;
                state.serialize_field("placeholder", &true)?;
                state.end()
            }
        }
    }
}

impl Serialize for NestedTable<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("NestedTable", 4)?;
        state.serialize_field("schema", &self.schema)?;
        state.serialize_field("label", &self.label)?;
        state.serialize_field("columns", &self.columns)?;
        state.serialize_field("rows", &self.rows)?;
        state.end()
    }
}

impl Serialize for NestedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let include_children = !self.children.is_empty();
        let mut state =
            serializer.serialize_struct("NestedRow", 1 + usize::from(include_children))?;
        state.serialize_field("cells", &self.cells)?;
        if include_children {
            state.serialize_field(CHILDREN, &self.children)?;
        } else {
            state.skip_field(CHILDREN)?;
        }
        state.end()
    }
}

impl Serialize for ChildBlock<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.assemble().serialize(serializer)
    }
}
