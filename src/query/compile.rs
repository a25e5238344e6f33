#![forbid(unsafe_code)]

//! Graph to pattern compilation.
//!
//! The editor graph is validated as a rooted tree, then walked breadth-first
//! with every node's children visited in a canonical order. Hops come out in
//! that walk order, so two graphs that differ only in node ids, layout or
//! drawing order compile to the same hop list.
//!
//! Children are ordered by target schema id, then relation, then
//! optionality, then the canonical shape of the subtree below them.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tracing::{debug, trace};

use crate::query::{
    errors::{CompileError, Endpoint},
    graph::{NodeId, QueryGraph},
    model::{PatternHop, SchemaRef},
    profile::{profile_timer, record_profile_timer, ProfileKind},
};

/// Compiler settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Optionality for edges that do not set one explicitly.
    pub default_optional: bool,
}

/// Output of [`compile`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledPattern {
    /// Canonical hop list, root first.
    pub hops: Vec<PatternHop>,
    /// Total mapping from editor node ids to persisted occurrences.
    pub bindings: BTreeMap<NodeId, SchemaRef>,
}

impl CompiledPattern {
    /// Occurrence a node compiled to.
    pub fn binding(&self, node: &NodeId) -> Option<&SchemaRef> {
        self.bindings.get(node)
    }

    /// Drops the bindings.
    pub fn into_hops(self) -> Vec<PatternHop> {
        self.hops
    }
}

/// Canonical shape of a subtree, compared structurally.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
struct Shape(Vec<Branch>);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Branch {
    target: String,
    relation: String,
    optional: bool,
    shape: Shape,
}

/// Compiles an editor graph into a canonical hop list.
pub fn compile(graph: &QueryGraph, options: &CompileOptions) -> Result<CompiledPattern, CompileError> {
    let timer = profile_timer();
    let result = compile_inner(graph, options);
    record_profile_timer(ProfileKind::Compile, timer);
    result
}

fn compile_inner(graph: &QueryGraph, options: &CompileOptions) -> Result<CompiledPattern, CompileError> {
    let nodes = &graph.nodes;
    if nodes.is_empty() {
        return Err(CompileError::EmptyGraph);
    }

    let mut index: HashMap<&NodeId, usize> = HashMap::with_capacity(nodes.len());
    for (idx, node) in nodes.iter().enumerate() {
        if node.schema_id.trim().is_empty() {
            return Err(CompileError::EmptySchema {
                node: node.id.to_string(),
            });
        }
        if index.insert(&node.id, idx).is_some() {
            return Err(CompileError::DuplicateNode {
                node: node.id.to_string(),
            });
        }
    }

    // children[n] holds (target node, edge index) pairs.
    let mut parent: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut children: Vec<Vec<(usize, usize)>> = vec![Vec::new(); nodes.len()];
    for (edge_idx, edge) in graph.edges.iter().enumerate() {
        let lookup = |id: &NodeId, endpoint: Endpoint| {
            index
                .get(id)
                .copied()
                .ok_or_else(|| CompileError::DanglingEdge {
                    edge: edge_idx,
                    endpoint,
                    node: id.to_string(),
                })
        };
        let source = lookup(&edge.source, Endpoint::Source)?;
        let target = lookup(&edge.target, Endpoint::Target)?;
        if edge.relation.trim().is_empty() {
            return Err(CompileError::EmptyRelation { edge: edge_idx });
        }
        if source == target {
            return Err(CompileError::Cycle {
                node: edge.source.to_string(),
            });
        }
        if parent[target].is_some() {
            return Err(CompileError::MultipleParents {
                node: edge.target.to_string(),
            });
        }
        parent[target] = Some(source);
        children[source].push((target, edge_idx));
    }

    let roots: Vec<usize> = (0..nodes.len()).filter(|&n| parent[n].is_none()).collect();
    let root = match roots.as_slice() {
        [] => {
            return Err(CompileError::Cycle {
                node: nodes[0].id.to_string(),
            })
        }
        [root] => *root,
        _ => {
            return Err(CompileError::Disconnected {
                roots: roots.iter().map(|&n| nodes[n].id.to_string()).collect(),
            })
        }
    };

    // With a single root and at most one parent per node, anything the root
    // cannot reach sits on a parent cycle.
    let reach = bfs(root, |n| children[n].iter().map(|&(target, _)| target));
    if reach.len() != nodes.len() {
        let reached: HashSet<usize> = reach.iter().copied().collect();
        let stray = (0..nodes.len())
            .find(|n| !reached.contains(n))
            .unwrap_or(root);
        return Err(CompileError::Cycle {
            node: nodes[stray].id.to_string(),
        });
    }

    let optional_of = |edge_idx: usize| {
        graph.edges[edge_idx]
            .optional
            .unwrap_or(options.default_optional)
    };

    // Leaves first: reverse BFS order sees every child before its parent.
    let mut shapes: Vec<Shape> = vec![Shape::default(); nodes.len()];
    let mut ordered_children: Vec<Vec<(usize, usize)>> = vec![Vec::new(); nodes.len()];
    for &node in reach.iter().rev() {
        let mut branches: Vec<(Branch, (usize, usize))> = children[node]
            .iter()
            .map(|&(target, edge_idx)| {
                let branch = Branch {
                    target: nodes[target].schema_id.clone(),
                    relation: graph.edges[edge_idx].relation.clone(),
                    optional: optional_of(edge_idx),
                    shape: std::mem::take(&mut shapes[target]),
                };
                (branch, (target, edge_idx))
            })
            .collect();
        branches.sort_by(|a, b| a.0.cmp(&b.0));
        ordered_children[node] = branches.iter().map(|(_, pair)| *pair).collect();
        shapes[node] = Shape(branches.into_iter().map(|(branch, _)| branch).collect());
    }

    let walk = bfs(root, |n| ordered_children[n].iter().map(|&(target, _)| target));
    let refs = assign_aliases(graph, &walk);

    let mut hops = Vec::with_capacity(nodes.len());
    hops.push(PatternHop::root(refs[root].clone()));
    for &node in &walk {
        for &(target, edge_idx) in &ordered_children[node] {
            let edge = &graph.edges[edge_idx];
            trace!(
                from = refs[node].key(),
                to = refs[target].key(),
                relation = edge.relation.as_str(),
                "compile.hop"
            );
            hops.push(PatternHop::edge(
                refs[node].clone(),
                edge.relation.clone(),
                refs[target].clone(),
                optional_of(edge_idx),
            ));
        }
    }

    let bindings = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.id.clone(), refs[idx].clone()))
        .collect();
    debug!(
        nodes = nodes.len(),
        hops = hops.len(),
        root = refs[root].key(),
        "compile.done"
    );
    Ok(CompiledPattern { hops, bindings })
}

fn bfs<F, I>(root: usize, mut next: F) -> Vec<usize>
where
    F: FnMut(usize) -> I,
    I: Iterator<Item = usize>,
{
    let mut order = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        order.push(node);
        queue.extend(next(node));
    }
    order
}

/// Gives repeated schemas distinct aliases in walk order: `id`, `id#2`, ...
fn assign_aliases(graph: &QueryGraph, walk: &[usize]) -> Vec<SchemaRef> {
    let nodes = &graph.nodes;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for node in nodes {
        *counts.entry(node.schema_id.as_str()).or_default() += 1;
    }
    let mut taken: HashSet<String> = counts
        .iter()
        .filter(|(_, &count)| count == 1)
        .map(|(schema, _)| (*schema).to_owned())
        .collect();

    let mut refs: Vec<SchemaRef> = nodes
        .iter()
        .map(|node| SchemaRef::new(node.schema_id.clone()))
        .collect();
    let mut next_suffix: HashMap<&str, usize> = HashMap::new();
    for &node in walk {
        let schema = nodes[node].schema_id.as_str();
        if counts[schema] < 2 {
            continue;
        }
        let suffix = next_suffix.entry(schema).or_insert(1);
        let alias = loop {
            let candidate = if *suffix == 1 {
                schema.to_owned()
            } else {
                format!("{schema}#{suffix}")
            };
            *suffix += 1;
            if taken.insert(candidate.clone()) {
                break candidate;
            }
        };
        refs[node] = SchemaRef::aliased(schema, alias);
    }
    refs
}
