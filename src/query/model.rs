//! Persisted query definition consumed by the execution backend.
//!
//! A [`QueryConfig`] is stored as the query entity's metadata. It is checked
//! when constructed and when deserialized, and it is never patched in place:
//! every `with_*` edit consumes the value and returns a newly validated one.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::{
    columns::{ColumnDef, ColumnSet},
    errors::{ConfigError, PatternError},
};

/// Page size used when a config does not specify one.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// One occurrence of a schema inside a traversal pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRef {
    /// Registry id of the schema.
    pub schema_id: String,
    /// Distinguishes repeated occurrences of the same schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl SchemaRef {
    /// Creates an unaliased reference.
    pub fn new(schema_id: impl Into<String>) -> Self {
        Self {
            schema_id: schema_id.into(),
            alias: None,
        }
    }

    /// Creates an aliased reference.
    pub fn aliased(schema_id: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            schema_id: schema_id.into(),
            alias: Some(alias.into()),
        }
    }

    /// Occurrence key: the alias when present, otherwise the schema id.
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.schema_id)
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl From<&str> for SchemaRef {
    fn from(value: &str) -> Self {
        SchemaRef::new(value)
    }
}

impl From<String> for SchemaRef {
    fn from(value: String) -> Self {
        SchemaRef::new(value)
    }
}

/// One hop of a multi-hop traversal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HopRecord", into = "HopRecord")]
pub enum PatternHop {
    /// Starting point of the traversal.
    Root {
        /// Root occurrence.
        from: SchemaRef,
    },
    /// Relation followed from an already introduced occurrence.
    Edge {
        /// Occurrence the hop starts from.
        from: SchemaRef,
        /// Occurrence the hop introduces.
        to: SchemaRef,
        /// Relation name.
        edge: String,
        /// Whether rows without a match are kept.
        optional: bool,
    },
}

impl PatternHop {
    /// Builds a root hop.
    pub fn root(from: impl Into<SchemaRef>) -> Self {
        PatternHop::Root { from: from.into() }
    }

    /// Builds an edge hop.
    pub fn edge(
        from: impl Into<SchemaRef>,
        edge: impl Into<String>,
        to: impl Into<SchemaRef>,
        optional: bool,
    ) -> Self {
        PatternHop::Edge {
            from: from.into(),
            to: to.into(),
            edge: edge.into(),
            optional,
        }
    }

    /// Source occurrence.
    pub fn from(&self) -> &SchemaRef {
        match self {
            PatternHop::Root { from } | PatternHop::Edge { from, .. } => from,
        }
    }

    /// Target occurrence for edge hops.
    pub fn to(&self) -> Option<&SchemaRef> {
        match self {
            PatternHop::Root { .. } => None,
            PatternHop::Edge { to, .. } => Some(to),
        }
    }

    /// Relation name for edge hops.
    pub fn relation(&self) -> Option<&str> {
        match self {
            PatternHop::Root { .. } => None,
            PatternHop::Edge { edge, .. } => Some(edge),
        }
    }

    /// Optionality; root hops are never optional.
    pub fn is_optional(&self) -> bool {
        matches!(self, PatternHop::Edge { optional: true, .. })
    }

    /// Returns true for the root hop.
    pub fn is_root(&self) -> bool {
        matches!(self, PatternHop::Root { .. })
    }

    /// Occurrence this hop introduces.
    pub fn introduces(&self) -> &SchemaRef {
        match self {
            PatternHop::Root { from } => from,
            PatternHop::Edge { to, .. } => to,
        }
    }
}

/// Wire shape shared by both hop kinds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HopRecord {
    from: SchemaRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<SchemaRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    edge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    optional: Option<bool>,
}

impl TryFrom<HopRecord> for PatternHop {
    type Error = PatternError;

    fn try_from(record: HopRecord) -> Result<Self, Self::Error> {
        match (record.to, record.edge) {
            (None, None) => Ok(PatternHop::Root { from: record.from }),
            (Some(to), Some(edge)) => Ok(PatternHop::Edge {
                from: record.from,
                to,
                edge,
                optional: record.optional.unwrap_or(false),
            }),
            (Some(_), None) => Err(PatternError::IncompleteEdgeHop { missing: "edge" }),
            (None, Some(_)) => Err(PatternError::IncompleteEdgeHop { missing: "to" }),
        }
    }
}

impl From<PatternHop> for HopRecord {
    fn from(hop: PatternHop) -> Self {
        match hop {
            PatternHop::Root { from } => HopRecord {
                from,
                to: None,
                edge: None,
                optional: None,
            },
            PatternHop::Edge {
                from,
                to,
                edge,
                optional,
            } => HopRecord {
                from,
                to: Some(to),
                edge: Some(edge),
                optional: Some(optional),
            },
        }
    }
}

/// Checks the tree invariants of a pattern list.
///
/// Exactly one root hop; each edge hop starts from an occurrence introduced
/// by an earlier hop and introduces a fresh one.
pub fn validate_patterns(hops: &[PatternHop]) -> Result<(), PatternError> {
    let roots = hops.iter().filter(|hop| hop.is_root()).count();
    match roots {
        0 => return Err(PatternError::MissingRoot),
        1 => {}
        count => return Err(PatternError::MultipleRoots { count }),
    }

    let mut introduced: HashMap<&str, &str> = HashMap::with_capacity(hops.len());
    for (idx, hop) in hops.iter().enumerate() {
        if let PatternHop::Edge { from, edge, .. } = hop {
            if edge.trim().is_empty() {
                return Err(PatternError::EmptyRelation { hop: idx });
            }
            match introduced.get(from.key()) {
                None => {
                    return Err(PatternError::UnknownSource {
                        hop: idx,
                        key: from.key().to_owned(),
                    })
                }
                Some(&schema_id) if schema_id != from.schema_id => {
                    return Err(PatternError::SchemaMismatch {
                        hop: idx,
                        key: from.key().to_owned(),
                        expected: schema_id.to_owned(),
                        found: from.schema_id.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        let target = hop.introduces();
        if introduced
            .insert(target.key(), target.schema_id.as_str())
            .is_some()
        {
            return Err(PatternError::DuplicateOccurrence {
                hop: idx,
                key: target.key().to_owned(),
            });
        }
    }
    Ok(())
}

/// Pagination strategy understood by the executor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationStrategy {
    /// Classic limit/offset paging.
    #[default]
    Offset,
    /// Opaque cursor paging.
    Cursor,
}

impl fmt::Display for PaginationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaginationStrategy::Offset => write!(f, "offset"),
            PaginationStrategy::Cursor => write!(f, "cursor"),
        }
    }
}

/// Page window requested from the executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationSpec {
    /// Maximum rows per page; must be positive.
    pub limit: u32,
    /// Rows to skip.
    #[serde(default)]
    pub offset: u64,
    /// Paging strategy.
    #[serde(default)]
    pub strategy: PaginationStrategy,
}

impl Default for PaginationSpec {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
            strategy: PaginationStrategy::Offset,
        }
    }
}

impl PaginationSpec {
    /// Offset pagination starting at the first row.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Checks `limit > 0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::InvalidLimit);
        }
        Ok(())
    }
}

/// Executor-facing query definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConfigRecord", into = "ConfigRecord")]
pub struct QueryConfig {
    columns: ColumnSet,
    patterns: Vec<PatternHop>,
    apply_rbac: bool,
    pagination: PaginationSpec,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigRecord {
    #[serde(default)]
    columns: ColumnSet,
    patterns: Vec<PatternHop>,
    #[serde(rename = "applyRBAC", default)]
    apply_rbac: bool,
    #[serde(default)]
    pagination: PaginationSpec,
}

impl TryFrom<ConfigRecord> for QueryConfig {
    type Error = ConfigError;

    fn try_from(record: ConfigRecord) -> Result<Self, Self::Error> {
        QueryConfig::new(
            record.columns,
            record.patterns,
            record.apply_rbac,
            record.pagination,
        )
    }
}

impl From<QueryConfig> for ConfigRecord {
    fn from(config: QueryConfig) -> Self {
        ConfigRecord {
            columns: config.columns,
            patterns: config.patterns,
            apply_rbac: config.apply_rbac,
            pagination: config.pagination,
        }
    }
}

impl QueryConfig {
    /// Validates and assembles a config.
    pub fn new(
        columns: ColumnSet,
        patterns: Vec<PatternHop>,
        apply_rbac: bool,
        pagination: PaginationSpec,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            columns,
            patterns,
            apply_rbac,
            pagination,
        };
        config.validate()?;
        Ok(config)
    }

    /// Config selecting nothing yet, built over a pattern list.
    pub fn from_patterns(patterns: Vec<PatternHop>) -> Result<Self, ConfigError> {
        Self::new(
            ColumnSet::new(),
            patterns,
            false,
            PaginationSpec::default(),
        )
    }

    /// Re-checks every invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_patterns(&self.patterns)?;
        self.columns.check_invariants()?;
        self.pagination.validate()?;
        let keys: HashSet<&str> = self.occurrences().map(SchemaRef::key).collect();
        if let Some(column) = self
            .columns
            .iter()
            .find(|column| !keys.contains(column.schema_id.as_str()))
        {
            return Err(ConfigError::UnknownColumnSchema {
                field_id: column.field_id.clone(),
                schema_id: column.schema_id.clone(),
            });
        }
        Ok(())
    }

    /// Columns in select order.
    pub fn columns(&self) -> &[ColumnDef] {
        self.columns.columns()
    }

    /// A copy of the column set for editing.
    pub fn column_set(&self) -> ColumnSet {
        self.columns.clone()
    }

    /// Traversal hops.
    pub fn patterns(&self) -> &[PatternHop] {
        &self.patterns
    }

    /// Whether the executor applies access control.
    pub fn apply_rbac(&self) -> bool {
        self.apply_rbac
    }

    /// Page window.
    pub fn pagination(&self) -> PaginationSpec {
        self.pagination
    }

    /// Occurrences in hop order, root first.
    pub fn occurrences(&self) -> impl Iterator<Item = &SchemaRef> {
        self.patterns.iter().map(PatternHop::introduces)
    }

    /// Copy with a new column set. `self` is untouched either way.
    pub fn with_columns(&self, columns: ColumnSet) -> Result<Self, ConfigError> {
        Self::new(columns, self.patterns.clone(), self.apply_rbac, self.pagination)
    }

    /// Copy with a new pattern list.
    pub fn with_patterns(&self, patterns: Vec<PatternHop>) -> Result<Self, ConfigError> {
        Self::new(self.columns.clone(), patterns, self.apply_rbac, self.pagination)
    }

    /// Copy with a new page window.
    pub fn with_pagination(&self, pagination: PaginationSpec) -> Result<Self, ConfigError> {
        Self::new(self.columns.clone(), self.patterns.clone(), self.apply_rbac, pagination)
    }

    /// Toggles the access-control flag.
    pub fn with_apply_rbac(self, apply_rbac: bool) -> Self {
        Self { apply_rbac, ..self }
    }

    /// Serializes into the entity metadata value.
    pub fn to_metadata(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Loads from entity metadata, validating every invariant.
    pub fn from_metadata(metadata: &Value) -> serde_json::Result<Self> {
        QueryConfig::deserialize(metadata)
    }

    /// Like [`from_metadata`](Self::from_metadata), but keeps validation
    /// failures typed instead of folding them into a serde error.
    pub fn load_metadata(metadata: &Value) -> crate::Result<Self> {
        let record = ConfigRecord::deserialize(metadata)?;
        Ok(QueryConfig::try_from(record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_and_edge_hops_use_wire_shape() {
        let hops = vec![
            PatternHop::root("Customer"),
            PatternHop::edge("Customer", "placed", "Order", false),
        ];
        let value = serde_json::to_value(&hops).unwrap();
        assert_eq!(
            value,
            json!([
                {"from": {"schemaId": "Customer"}},
                {"from": {"schemaId": "Customer"}, "to": {"schemaId": "Order"}, "edge": "placed", "optional": false}
            ])
        );
        let back: Vec<PatternHop> = serde_json::from_value(value).unwrap();
        assert_eq!(back, hops);
    }

    #[test]
    fn half_edge_hop_is_rejected() {
        let err = serde_json::from_value::<PatternHop>(json!({
            "from": {"schemaId": "Customer"},
            "to": {"schemaId": "Order"}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("missing 'edge'"));
    }

    #[test]
    fn pattern_validation_rejects_unknown_source() {
        let hops = vec![
            PatternHop::root("Customer"),
            PatternHop::edge("Invoice", "billed", "Order", false),
        ];
        assert_eq!(
            validate_patterns(&hops),
            Err(PatternError::UnknownSource {
                hop: 1,
                key: "Invoice".into()
            })
        );
    }

    #[test]
    fn pattern_validation_rejects_reintroduced_occurrence() {
        let hops = vec![
            PatternHop::root("Customer"),
            PatternHop::edge("Customer", "placed", "Order", false),
            PatternHop::edge("Customer", "returned", "Order", false),
        ];
        assert!(matches!(
            validate_patterns(&hops),
            Err(PatternError::DuplicateOccurrence { hop: 2, .. })
        ));
    }

    #[test]
    fn pattern_validation_counts_roots() {
        assert_eq!(validate_patterns(&[]), Err(PatternError::MissingRoot));
        let hops = vec![PatternHop::root("A"), PatternHop::root(SchemaRef::aliased("A", "A#2"))];
        assert_eq!(
            validate_patterns(&hops),
            Err(PatternError::MultipleRoots { count: 2 })
        );
    }

    #[test]
    fn config_deserialization_validates() {
        let value = json!({
            "columns": [
                {"fieldId": "name", "schemaId": "Customer", "selectOrder": 1},
                {"fieldId": "total", "schemaId": "Order", "selectOrder": 3}
            ],
            "patterns": [
                {"from": {"schemaId": "Customer"}},
                {"from": {"schemaId": "Customer"}, "to": {"schemaId": "Order"}, "edge": "placed", "optional": false}
            ],
            "applyRBAC": true,
            "pagination": {"limit": 25, "offset": 0, "strategy": "cursor"}
        });
        let err = QueryConfig::from_metadata(&value).unwrap_err();
        assert!(err.to_string().contains("selectOrder"));
    }

    #[test]
    fn config_metadata_round_trips() {
        let value = json!({
            "columns": [
                {"fieldId": "name", "schemaId": "Customer", "selectOrder": 1, "groupOrder": 0},
                {"fieldId": "total", "schemaId": "Order", "selectOrder": 2}
            ],
            "patterns": [
                {"from": {"schemaId": "Customer"}},
                {"from": {"schemaId": "Customer"}, "to": {"schemaId": "Order"}, "edge": "placed", "optional": true}
            ],
            "applyRBAC": true,
            "pagination": {"limit": 25, "offset": 50, "strategy": "cursor"}
        });
        let config = QueryConfig::from_metadata(&value).unwrap();
        assert!(config.apply_rbac());
        assert_eq!(config.pagination().strategy, PaginationStrategy::Cursor);
        assert_eq!(config.columns()[0].group_order, Some(0));
        assert_eq!(config.to_metadata().unwrap(), value);
    }

    #[test]
    fn typed_load_keeps_error_code() {
        let value = json!({
            "columns": [{"fieldId": "total", "schemaId": "Order", "selectOrder": 1}],
            "patterns": [{"from": {"schemaId": "Customer"}}],
            "pagination": {"limit": 10}
        });
        let err = QueryConfig::load_metadata(&value).unwrap_err();
        assert_eq!(err.code(), "UnknownColumnSchema");

        let err = QueryConfig::load_metadata(&json!({"columns": []})).unwrap_err();
        assert_eq!(err.code(), "Serialization");
    }

    #[test]
    fn column_must_reference_an_occurrence() {
        let mut columns = ColumnSet::new();
        columns.add("total", "Invoice").unwrap();
        let err = QueryConfig::new(
            columns,
            vec![PatternHop::root("Customer")],
            false,
            PaginationSpec::default(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "UnknownColumnSchema");
    }

    #[test]
    fn edits_produce_new_values() {
        let config = QueryConfig::from_patterns(vec![PatternHop::root("Customer")]).unwrap();
        let original = config.clone();
        let mut columns = config.column_set();
        columns.add("name", "Customer").unwrap();
        let edited = config.with_columns(columns).unwrap();
        assert!(original.columns().is_empty());
        assert_eq!(edited.columns().len(), 1);

        let err = edited
            .with_pagination(PaginationSpec::new(0))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidLimit);
        assert_eq!(edited.columns().len(), 1);
    }

    #[test]
    fn rejected_edits_keep_the_current_value() {
        let mut columns = ColumnSet::new();
        columns.add("name", "Customer").unwrap();
        let config = QueryConfig::new(
            columns,
            vec![PatternHop::root("Customer")],
            true,
            PaginationSpec::new(25),
        )
        .unwrap();
        let before = config.clone();

        let err = config
            .with_patterns(vec![PatternHop::root("Invoice")])
            .unwrap_err();
        assert_eq!(err.code(), "UnknownColumnSchema");

        let mut stray = ColumnSet::new();
        stray.add("total", "Order").unwrap();
        assert!(config.with_columns(stray).is_err());
        assert!(config.with_pagination(PaginationSpec::new(0)).is_err());

        assert_eq!(config, before);
        assert_eq!(config.pagination().limit, 25);
        assert!(config.apply_rbac());
    }
}
