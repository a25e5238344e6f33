//! Maps flattened field paths back to the schema they came from.
//!
//! Depth `d` belongs to `schemas[d]`; paths nested deeper than the schema
//! list reaches are clamped to the last schema. Within a schema, columns
//! follow the schema's field order.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::ResultSchema;
use crate::result::{path::FieldPath, SCHEMA_NOT_FOUND};

/// Natural position of a field within its schema.
///
/// Unresolved fields sort after every resolved one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldOrder {
    /// Index into the schema's field list.
    Resolved(usize),
    /// The schema has no such field.
    Unresolved,
}

/// Nesting depth of a path.
pub fn depth_of(path: &FieldPath) -> usize {
    path.depth()
}

/// A rendered column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapedColumn {
    /// Path of the cell below each root row.
    pub path: FieldPath,
    /// Header text.
    pub label: String,
    /// Schema the column was attributed to.
    pub schema_id: Option<String>,
    /// Position within that schema.
    pub order: FieldOrder,
}

/// Columns attributed to one schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnGroup {
    /// Schema id; `None` when the payload carried no schemas.
    pub schema_id: Option<String>,
    /// Group header.
    pub label: String,
    /// Columns in display order.
    pub columns: Vec<ShapedColumn>,
}

/// Resolves depths and field order against a depth-ordered schema list.
#[derive(Clone, Copy, Debug)]
pub struct SchemaDepthResolver<'a> {
    schemas: &'a [ResultSchema],
    include_hidden: bool,
}

impl<'a> SchemaDepthResolver<'a> {
    /// Creates a resolver; `include_hidden` keeps fields marked hidden.
    pub fn new(schemas: &'a [ResultSchema], include_hidden: bool) -> Self {
        Self {
            schemas,
            include_hidden,
        }
    }

    /// Schema for `depth`, clamped to the last one.
    pub fn schema_for_depth(&self, depth: usize) -> Option<&'a ResultSchema> {
        self.index_for_depth(depth).map(|idx| &self.schemas[idx])
    }

    /// Position of `name` among the schema's fields, by id or name.
    pub fn field_order_of(schema: &ResultSchema, name: &str) -> FieldOrder {
        schema
            .field_position(name)
            .map_or(FieldOrder::Unresolved, FieldOrder::Resolved)
    }

    /// Groups `paths` per schema, groups in schema-list order.
    ///
    /// Within a group columns sort by field order, then field name, then
    /// full path. Hidden fields are dropped unless the resolver keeps them.
    pub fn group_columns<'p, I>(&self, paths: I) -> Vec<ColumnGroup>
    where
        I: IntoIterator<Item = &'p FieldPath>,
    {
        // `None` keys the group used when there are no schemas at all.
        let mut groups: BTreeMap<Option<usize>, Vec<ShapedColumn>> = BTreeMap::new();
        for path in paths {
            let index = self.index_for_depth(depth_of(path));
            let schema = index.map(|idx| &self.schemas[idx]);
            let field = schema.and_then(|schema| schema.field(&path.field));
            if field.is_some_and(|field| field.hidden) && !self.include_hidden {
                continue;
            }
            let column = ShapedColumn {
                path: path.clone(),
                label: field.map_or_else(|| path.field.clone(), |f| f.display_label().to_owned()),
                schema_id: schema.map(|schema| schema.id.clone()),
                order: schema.map_or(FieldOrder::Unresolved, |schema| {
                    Self::field_order_of(schema, &path.field)
                }),
            };
            groups.entry(index).or_default().push(column);
        }

        groups
            .into_iter()
            .map(|(index, mut columns)| {
                columns.sort_by(|a, b| {
                    (a.order, &a.path.field, &a.path).cmp(&(b.order, &b.path.field, &b.path))
                });
                let schema = index.map(|idx| &self.schemas[idx]);
                ColumnGroup {
                    schema_id: schema.map(|schema| schema.id.clone()),
                    label: schema.map_or(SCHEMA_NOT_FOUND, ResultSchema::display_label).to_owned(),
                    columns,
                }
            })
            .collect()
    }

    fn index_for_depth(&self, depth: usize) -> Option<usize> {
        let last = self.schemas.len().checked_sub(1)?;
        Some(depth.min(last))
    }
}
