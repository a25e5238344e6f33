//! Column ordering engine.
//!
//! [`ColumnSet`] owns the selected result columns and keeps two invariants:
//! `selectOrder` is always a dense `1..N` sequence, and `groupOrder`, where
//! present, a dense `0..M-1` sequence over exactly the grouped columns.
//! Every operation validates its whole request before touching the list.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::errors::ColumnError;

/// One selected result column.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    /// Field identifier within its schema.
    pub field_id: String,
    /// Occurrence key of the schema the field belongs to.
    pub schema_id: String,
    /// Display position, starting at 1.
    pub select_order: u32,
    /// Position among grouping keys, starting at 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_order: Option<u32>,
}

impl ColumnDef {
    /// Returns true when the column is `(field_id, schema_id)`.
    pub fn is(&self, field_id: &str, schema_id: &str) -> bool {
        self.field_id == field_id && self.schema_id == schema_id
    }
}

/// Names a column either by bare field id or by `(fieldId, schemaId)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnSelector {
    /// Bare field id; must match exactly one column.
    Field(String),
    /// Fully qualified column identity.
    Qualified {
        /// Field identifier.
        field_id: String,
        /// Schema occurrence key.
        schema_id: String,
    },
}

impl ColumnSelector {
    /// Qualified selector.
    pub fn qualified(field_id: impl Into<String>, schema_id: impl Into<String>) -> Self {
        ColumnSelector::Qualified {
            field_id: field_id.into(),
            schema_id: schema_id.into(),
        }
    }
}

impl fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSelector::Field(field_id) => f.write_str(field_id),
            ColumnSelector::Qualified {
                field_id,
                schema_id,
            } => write!(f, "{schema_id}.{field_id}"),
        }
    }
}

impl From<&str> for ColumnSelector {
    fn from(value: &str) -> Self {
        ColumnSelector::Field(value.to_owned())
    }
}

impl From<String> for ColumnSelector {
    fn from(value: String) -> Self {
        ColumnSelector::Field(value)
    }
}

impl From<(&str, &str)> for ColumnSelector {
    fn from((field_id, schema_id): (&str, &str)) -> Self {
        ColumnSelector::qualified(field_id, schema_id)
    }
}

impl From<&ColumnDef> for ColumnSelector {
    fn from(column: &ColumnDef) -> Self {
        ColumnSelector::qualified(column.field_id.clone(), column.schema_id.clone())
    }
}

/// Ordered, invariant-preserving list of selected columns.
///
/// The backing list is kept sorted by `selectOrder`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ColumnDef>", into = "Vec<ColumnDef>")]
pub struct ColumnSet {
    columns: Vec<ColumnDef>,
}

impl TryFrom<Vec<ColumnDef>> for ColumnSet {
    type Error = ColumnError;

    fn try_from(columns: Vec<ColumnDef>) -> Result<Self, Self::Error> {
        ColumnSet::from_columns(columns)
    }
}

impl From<ColumnSet> for Vec<ColumnDef> {
    fn from(set: ColumnSet) -> Self {
        set.columns
    }
}

impl ColumnSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts a persisted column list after checking its invariants.
    pub fn from_columns(mut columns: Vec<ColumnDef>) -> Result<Self, ColumnError> {
        columns.sort_by_key(|column| column.select_order);
        let set = Self { columns };
        set.check_invariants()?;
        Ok(set)
    }

    /// Columns in select order.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Iterates columns in select order.
    pub fn iter(&self) -> std::slice::Iter<'_, ColumnDef> {
        self.columns.iter()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true when nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns true when `(field_id, schema_id)` is selected.
    pub fn contains(&self, field_id: &str, schema_id: &str) -> bool {
        self.columns
            .iter()
            .any(|column| column.is(field_id, schema_id))
    }

    /// Looks up a column.
    pub fn get(&self, selector: impl Into<ColumnSelector>) -> Result<&ColumnDef, ColumnError> {
        let idx = self.resolve(&selector.into())?;
        Ok(&self.columns[idx])
    }

    /// Columns in select order, as references.
    pub fn ordered(&self) -> Vec<&ColumnDef> {
        self.columns.iter().collect()
    }

    /// Grouped columns in group order.
    pub fn grouped(&self) -> Vec<&ColumnDef> {
        let mut grouped: Vec<&ColumnDef> = self
            .columns
            .iter()
            .filter(|column| column.group_order.is_some())
            .collect();
        grouped.sort_by_key(|column| column.group_order);
        grouped
    }

    /// Appends a column at the end of the select order.
    pub fn add(
        &mut self,
        field_id: impl Into<String>,
        schema_id: impl Into<String>,
    ) -> Result<u32, ColumnError> {
        let field_id = field_id.into();
        let schema_id = schema_id.into();
        if self.contains(&field_id, &schema_id) {
            return Err(ColumnError::DuplicateColumn {
                field_id,
                schema_id,
            });
        }
        let select_order = self
            .columns
            .iter()
            .map(|column| column.select_order)
            .max()
            .unwrap_or(0)
            + 1;
        self.columns.push(ColumnDef {
            field_id,
            schema_id,
            select_order,
            group_order: None,
        });
        Ok(select_order)
    }

    /// Removes a column and closes the gaps it leaves in both orders.
    pub fn remove(&mut self, selector: impl Into<ColumnSelector>) -> Result<ColumnDef, ColumnError> {
        let idx = self.resolve(&selector.into())?;
        let removed = self.columns.remove(idx);
        self.densify();
        Ok(removed)
    }

    /// Reassigns `selectOrder` by position; the request must name every
    /// column exactly once.
    pub fn reorder_select<I, S>(&mut self, selectors: I) -> Result<(), ColumnError>
    where
        I: IntoIterator<Item = S>,
        S: Into<ColumnSelector>,
    {
        let order = self.resolve_all(selectors)?;
        if order.len() != self.columns.len() {
            return Err(ColumnError::NotAPermutation {
                expected: self.columns.len(),
                found: order.len(),
            });
        }
        for (position, idx) in order.into_iter().enumerate() {
            self.columns[idx].select_order = position as u32 + 1;
        }
        self.columns.sort_by_key(|column| column.select_order);
        Ok(())
    }

    /// Groups by exactly the listed columns, in the listed order.
    pub fn set_group<I, S>(&mut self, selectors: I) -> Result<(), ColumnError>
    where
        I: IntoIterator<Item = S>,
        S: Into<ColumnSelector>,
    {
        let order = self.resolve_all(selectors)?;
        self.clear_group();
        for (position, idx) in order.into_iter().enumerate() {
            self.columns[idx].group_order = Some(position as u32);
        }
        Ok(())
    }

    /// Removes every grouping key.
    pub fn clear_group(&mut self) {
        for column in &mut self.columns {
            column.group_order = None;
        }
    }

    /// Verifies both density invariants and column uniqueness.
    pub fn check_invariants(&self) -> Result<(), ColumnError> {
        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if !seen.insert((column.field_id.as_str(), column.schema_id.as_str())) {
                return Err(ColumnError::DuplicateColumn {
                    field_id: column.field_id.clone(),
                    schema_id: column.schema_id.clone(),
                });
            }
        }

        let mut select: Vec<u32> = self.columns.iter().map(|c| c.select_order).collect();
        select.sort_unstable();
        if !is_dense_from(&select, 1) {
            return Err(ColumnError::SelectOrderNotDense {
                expected: self.columns.len(),
            });
        }

        let mut group: Vec<u32> = self.columns.iter().filter_map(|c| c.group_order).collect();
        group.sort_unstable();
        if !is_dense_from(&group, 0) {
            return Err(ColumnError::GroupOrderNotDense {
                expected: group.len(),
            });
        }
        Ok(())
    }

    fn resolve(&self, selector: &ColumnSelector) -> Result<usize, ColumnError> {
        match selector {
            ColumnSelector::Qualified {
                field_id,
                schema_id,
            } => self
                .columns
                .iter()
                .position(|column| column.is(field_id, schema_id))
                .ok_or_else(|| ColumnError::unknown(selector.to_string())),
            ColumnSelector::Field(field_id) => {
                let mut matches = self
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(_, column)| &column.field_id == field_id)
                    .map(|(idx, _)| idx);
                let first = matches
                    .next()
                    .ok_or_else(|| ColumnError::unknown(field_id.clone()))?;
                let extra = matches.count();
                if extra > 0 {
                    return Err(ColumnError::AmbiguousColumn {
                        field_id: field_id.clone(),
                        candidates: extra + 1,
                    });
                }
                Ok(first)
            }
        }
    }

    fn resolve_all<I, S>(&self, selectors: I) -> Result<Vec<usize>, ColumnError>
    where
        I: IntoIterator<Item = S>,
        S: Into<ColumnSelector>,
    {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for selector in selectors {
            let selector = selector.into();
            let idx = self.resolve(&selector)?;
            if !seen.insert(idx) {
                return Err(ColumnError::DuplicateSelector {
                    column: selector.to_string(),
                });
            }
            resolved.push(idx);
        }
        Ok(resolved)
    }

    fn densify(&mut self) {
        self.columns.sort_by_key(|column| column.select_order);
        for (position, column) in self.columns.iter_mut().enumerate() {
            column.select_order = position as u32 + 1;
        }

        let mut grouped: Vec<(u32, usize)> = self
            .columns
            .iter()
            .enumerate()
            .filter_map(|(idx, column)| column.group_order.map(|order| (order, idx)))
            .collect();
        grouped.sort_unstable();
        for (position, (_, idx)) in grouped.into_iter().enumerate() {
            self.columns[idx].group_order = Some(position as u32);
        }
    }
}

impl<'a> IntoIterator for &'a ColumnSet {
    type Item = &'a ColumnDef;
    type IntoIter = std::slice::Iter<'a, ColumnDef>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

fn is_dense_from(sorted: &[u32], start: u32) -> bool {
    sorted
        .iter()
        .enumerate()
        .all(|(position, &value)| value == start + position as u32)
}
