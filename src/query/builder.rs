//! Fluent query config builder.

use crate::error::{QuarryError, Result};
use crate::query::{
    columns::{ColumnSelector, ColumnSet},
    model::{PaginationSpec, PaginationStrategy, PatternHop, QueryConfig, SchemaRef},
};

/// Assembles a [`QueryConfig`] one hop and column at a time.
///
/// The first failing step is remembered and returned from [`build`](Self::build);
/// later steps become no-ops.
#[derive(Debug, Default)]
pub struct QueryConfigBuilder {
    patterns: Vec<PatternHop>,
    columns: ColumnSet,
    group: Option<Vec<ColumnSelector>>,
    apply_rbac: bool,
    pagination: PaginationSpec,
    error: Option<QuarryError>,
}

impl QueryConfigBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root occurrence.
    pub fn root(mut self, schema: impl Into<SchemaRef>) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.patterns.iter().any(PatternHop::is_root) {
            self.error = Some(QuarryError::Invalid("root is already set"));
            return self;
        }
        self.patterns.insert(0, PatternHop::root(schema));
        self
    }

    /// Adds a required edge hop.
    pub fn hop(
        self,
        from: impl Into<SchemaRef>,
        edge: impl Into<String>,
        to: impl Into<SchemaRef>,
    ) -> Self {
        self.push_hop(PatternHop::edge(from, edge, to, false))
    }

    /// Adds an optional edge hop.
    pub fn optional_hop(
        self,
        from: impl Into<SchemaRef>,
        edge: impl Into<String>,
        to: impl Into<SchemaRef>,
    ) -> Self {
        self.push_hop(PatternHop::edge(from, edge, to, true))
    }

    /// Selects a column at the end of the current select order.
    pub fn column(mut self, field_id: impl Into<String>, schema_id: impl Into<String>) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Err(err) = self.columns.add(field_id, schema_id) {
            self.error = Some(err.into());
        }
        self
    }

    /// Groups by the listed columns, in order. Applied at build time so
    /// columns may be added afterwards.
    pub fn group_by<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ColumnSelector>,
    {
        if self.error.is_some() {
            return self;
        }
        self.group = Some(selectors.into_iter().map(Into::into).collect());
        self
    }

    /// Enables or disables access control in the executor.
    pub fn apply_rbac(mut self, apply_rbac: bool) -> Self {
        self.apply_rbac = apply_rbac;
        self
    }

    /// Sets the page size.
    pub fn limit(mut self, limit: u32) -> Self {
        self.pagination.limit = limit;
        self
    }

    /// Sets the number of rows to skip.
    pub fn offset(mut self, offset: u64) -> Self {
        self.pagination.offset = offset;
        self
    }

    /// Switches to cursor pagination.
    pub fn cursor(mut self) -> Self {
        self.pagination.strategy = PaginationStrategy::Cursor;
        self
    }

    /// Replaces the whole page window.
    pub fn pagination(mut self, pagination: PaginationSpec) -> Self {
        self.pagination = pagination;
        self
    }

    /// Validates and returns the config.
    pub fn build(self) -> Result<QueryConfig> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut columns = self.columns;
        if let Some(group) = self.group {
            columns.set_group(group)?;
        }
        Ok(QueryConfig::new(
            columns,
            self.patterns,
            self.apply_rbac,
            self.pagination,
        )?)
    }

    fn push_hop(mut self, hop: PatternHop) -> Self {
        if self.error.is_some() {
            return self;
        }
        self.patterns.push(hop);
        self
    }
}
