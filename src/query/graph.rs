//! Editor-side traversal graph.
//!
//! Node ids here are session-local and never persisted; the compiler maps
//! them onto [`SchemaRef`](crate::query::SchemaRef) occurrences through an
//! explicit binding table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Session-local node identifier assigned by the editor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId(value.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId(value)
    }
}

/// Canvas coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// Creates a position.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A schema placed on the canvas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Session-local id.
    pub id: NodeId,
    /// Schema this node stands for.
    pub schema_id: String,
    /// Display label, usually the schema label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Layout position.
    #[serde(default)]
    pub position: Position,
    /// Set when the schema could not be resolved against the catalog.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl GraphNode {
    /// Creates a node at the origin.
    pub fn new(id: impl Into<NodeId>, schema_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            schema_id: schema_id.into(),
            label: None,
            position: Position::default(),
            placeholder: false,
        }
    }

    /// Moves the node.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    /// Sets the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A relation drawn between two nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Parent node.
    pub source: NodeId,
    /// Child node.
    pub target: NodeId,
    /// Relation name.
    pub relation: String,
    /// Explicit optionality; `None` defers to the compiler default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

impl GraphEdge {
    /// Creates an edge with default optionality.
    pub fn new(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            optional: None,
        }
    }

    /// Sets explicit optionality.
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }
}

/// Nodes and edges as drawn in the editor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryGraph {
    /// Placed schemas.
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    /// Drawn relations.
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl QueryGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node.
    pub fn with_node(mut self, node: GraphNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Adds an edge.
    pub fn with_edge(mut self, edge: GraphEdge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Finds a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    /// Edges leaving `id`.
    pub fn outgoing<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |edge| &edge.source == id)
    }

    /// Returns true when nothing has been placed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
