#![forbid(unsafe_code)]

//! Pattern to graph expansion, used when a saved query is opened for editing.
//!
//! Nodes are laid out in columns by hop depth. Schemas the catalog does not
//! know yet become placeholder nodes; catalog loading is asynchronous and
//! expansion never waits on it.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::catalog::SchemaRegistry;
use crate::error::Result;
use crate::query::{
    compile::{compile, CompileOptions},
    columns::ColumnSet,
    errors::PatternError,
    graph::{GraphEdge, GraphNode, NodeId, Position, QueryGraph},
    model::{validate_patterns, PatternHop, QueryConfig},
    profile::{profile_timer, record_profile_timer, ProfileKind},
};

/// Horizontal distance between depth columns.
pub const DEFAULT_COLUMN_SPACING: f64 = 280.0;
/// Vertical distance between nodes of the same depth.
pub const DEFAULT_ROW_SPACING: f64 = 120.0;

/// Layout settings for expanded graphs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutOptions {
    /// Distance between depth columns.
    pub column_spacing: f64,
    /// Distance between siblings in one column.
    pub row_spacing: f64,
    /// Position of the root node.
    pub origin: Position,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            column_spacing: DEFAULT_COLUMN_SPACING,
            row_spacing: DEFAULT_ROW_SPACING,
            origin: Position::default(),
        }
    }
}

/// Rebuilds an editor graph from a hop list.
///
/// Node ids are `n0, n1, ...` in the order hops introduce occurrences.
pub fn expand<R>(
    hops: &[PatternHop],
    catalog: &R,
    layout: &LayoutOptions,
) -> std::result::Result<QueryGraph, PatternError>
where
    R: SchemaRegistry + ?Sized,
{
    let timer = profile_timer();
    let result = expand_inner(hops, catalog, layout);
    record_profile_timer(ProfileKind::Expand, timer);
    result
}

fn expand_inner<R>(
    hops: &[PatternHop],
    catalog: &R,
    layout: &LayoutOptions,
) -> std::result::Result<QueryGraph, PatternError>
where
    R: SchemaRegistry + ?Sized,
{
    validate_patterns(hops)?;

    let mut graph = QueryGraph::new();
    // occurrence key -> (node id, depth)
    let mut placed: HashMap<&str, (NodeId, usize)> = HashMap::with_capacity(hops.len());
    let mut rows_per_depth: Vec<usize> = Vec::new();

    for hop in hops {
        let depth = match hop.to() {
            None => 0,
            Some(_) => placed[hop.from().key()].1 + 1,
        };
        if rows_per_depth.len() <= depth {
            rows_per_depth.resize(depth + 1, 0);
        }
        let row = rows_per_depth[depth];
        rows_per_depth[depth] += 1;

        let occurrence = hop.introduces();
        let id = NodeId(format!("n{}", graph.nodes.len()));
        let mut node = GraphNode::new(id.clone(), occurrence.schema_id.clone()).at(
            layout.origin.x + depth as f64 * layout.column_spacing,
            layout.origin.y + row as f64 * layout.row_spacing,
        );
        match catalog.lookup(&occurrence.schema_id) {
            Some(schema) => node.label = Some(schema.display_label().to_owned()),
            None => {
                debug!(schema = occurrence.schema_id.as_str(), "expand.placeholder");
                node.label = Some(occurrence.schema_id.clone());
                node.placeholder = true;
            }
        }
        graph.nodes.push(node);

        if let PatternHop::Edge {
            from,
            edge,
            optional,
            ..
        } = hop
        {
            let source = placed[from.key()].0.clone();
            graph
                .edges
                .push(GraphEdge::new(source, id.clone(), edge.clone()).optional(*optional));
        }
        placed.insert(occurrence.key(), (id, depth));
    }
    Ok(graph)
}

/// Result of [`normalize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Normalized {
    /// Hops in canonical order with canonical aliases.
    pub hops: Vec<PatternHop>,
    /// Old occurrence key to canonical occurrence key, for every occurrence.
    pub key_map: BTreeMap<String, String>,
}

/// Canonicalizes an arbitrary valid hop list by expanding and recompiling it.
///
/// Canonical input comes back unchanged.
pub fn normalize(hops: &[PatternHop]) -> Result<Normalized> {
    let empty: &[crate::catalog::ResultSchema] = &[];
    let graph = expand(hops, empty, &LayoutOptions::default())?;
    let compiled = compile(&graph, &CompileOptions::default())?;
    let key_map = hops
        .iter()
        .map(PatternHop::introduces)
        .zip(graph.nodes.iter())
        .filter_map(|(old, node)| {
            compiled
                .binding(&node.id)
                .map(|new| (old.key().to_owned(), new.key().to_owned()))
        })
        .collect();
    Ok(Normalized {
        hops: compiled.hops,
        key_map,
    })
}

impl QueryConfig {
    /// Canonicalizes the patterns and rewrites column schema keys to match.
    pub fn normalized(self) -> Result<QueryConfig> {
        let normalized = normalize(self.patterns())?;
        let remapped = self
            .columns()
            .iter()
            .map(|column| {
                let mut column = column.clone();
                if let Some(key) = normalized.key_map.get(&column.schema_id) {
                    column.schema_id = key.clone();
                }
                column
            })
            .collect();
        let columns = ColumnSet::from_columns(remapped)?;
        Ok(QueryConfig::new(
            columns,
            normalized.hops,
            self.apply_rbac(),
            self.pagination(),
        )?)
    }
}
