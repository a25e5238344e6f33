#![allow(missing_docs)]

use proptest::prelude::*;
use quarry::{
    query::{
        compile, expand, normalize, CompileOptions, GraphEdge, GraphNode, LayoutOptions,
        NodeId, PatternHop, QueryGraph,
    },
    InMemoryCatalog, ResultSchema,
};

const SCHEMAS: &[&str] = &["Customer", "Order", "Invoice", "LineItem"];
const RELATIONS: &[&str] = &["placed", "billed", "contains"];

#[derive(Debug, Clone)]
struct TreeSpec {
    root_schema: usize,
    // (parent index, schema, relation, optional)
    children: Vec<(usize, usize, usize, bool)>,
}

fn arb_tree() -> impl Strategy<Value = TreeSpec> {
    (
        0..SCHEMAS.len(),
        prop::collection::vec(
            (any::<prop::sample::Index>(), 0..SCHEMAS.len(), 0..RELATIONS.len(), any::<bool>()),
            0..8,
        ),
    )
        .prop_map(|(root_schema, raw)| TreeSpec {
            root_schema,
            children: raw
                .into_iter()
                .enumerate()
                .map(|(idx, (parent, schema, relation, optional))| {
                    (parent.index(idx + 1), schema, relation, optional)
                })
                .collect(),
        })
}

/// Draws the tree with node ids derived from `salt` and nodes and edges
/// listed in forward or reverse order.
fn draw(tree: &TreeSpec, salt: &str, reversed: bool) -> QueryGraph {
    let id = |idx: usize| format!("{salt}-{idx}");
    let mut nodes = vec![GraphNode::new(id(0), SCHEMAS[tree.root_schema])];
    let mut edges = Vec::new();
    for (offset, &(parent, schema, relation, optional)) in tree.children.iter().enumerate() {
        let child = offset + 1;
        nodes.push(GraphNode::new(id(child), SCHEMAS[schema]).at(child as f64, 3.0));
        edges.push(GraphEdge::new(id(parent), id(child), RELATIONS[relation]).optional(optional));
    }
    if reversed {
        nodes.reverse();
        edges.reverse();
    }
    QueryGraph { nodes, edges }
}

fn edge_multiset(graph: &QueryGraph) -> Vec<(String, String, String, Option<bool>)> {
    let schema_of = |id: &NodeId| {
        graph
            .node(id)
            .map(|node| node.schema_id.clone())
            .unwrap_or_default()
    };
    let mut edges: Vec<_> = graph
        .edges
        .iter()
        .map(|edge| {
            (
                schema_of(&edge.source),
                edge.relation.clone(),
                schema_of(&edge.target),
                edge.optional,
            )
        })
        .collect();
    edges.sort();
    edges
}

fn schema_multiset(graph: &QueryGraph) -> Vec<String> {
    let mut schemas: Vec<String> = graph.nodes.iter().map(|n| n.schema_id.clone()).collect();
    schemas.sort();
    schemas
}

fn catalog() -> InMemoryCatalog {
    SCHEMAS
        .iter()
        .map(|id| ResultSchema::new(*id, id.to_lowercase()))
        .collect()
}

proptest! {
    #[test]
    fn expanding_compiled_hops_recompiles_identically(tree in arb_tree()) {
        let graph = draw(&tree, "node", false);
        let hops = compile(&graph, &CompileOptions::default()).unwrap().hops;
        let expanded = expand(&hops, &catalog(), &LayoutOptions::default()).unwrap();

        prop_assert_eq!(schema_multiset(&expanded), schema_multiset(&graph));
        prop_assert_eq!(edge_multiset(&expanded), edge_multiset(&graph));
        prop_assert!(expanded.nodes.iter().all(|node| !node.placeholder));

        let recompiled = compile(&expanded, &CompileOptions::default()).unwrap().hops;
        prop_assert_eq!(recompiled, hops);
    }

    #[test]
    fn drawing_order_and_ids_do_not_change_hops(tree in arb_tree()) {
        let forward = compile(&draw(&tree, "a", false), &CompileOptions::default()).unwrap();
        let backward = compile(&draw(&tree, "zz", true), &CompileOptions::default()).unwrap();
        prop_assert_eq!(forward.hops, backward.hops);
        prop_assert_eq!(forward.bindings.len(), tree.children.len() + 1);
    }

    #[test]
    fn canonical_hops_survive_normalization(tree in arb_tree()) {
        let hops = compile(&draw(&tree, "n", true), &CompileOptions::default()).unwrap().hops;
        let normalized = normalize(&hops).unwrap();
        prop_assert!(normalized.key_map.iter().all(|(old, new)| old == new));
        prop_assert_eq!(normalized.hops, hops);
    }

    #[test]
    fn every_hop_after_the_root_refers_back(tree in arb_tree()) {
        let hops = compile(&draw(&tree, "n", false), &CompileOptions::default()).unwrap().hops;
        let rooted = matches!(hops.first(), Some(PatternHop::Root { .. }));
        prop_assert!(rooted, "first hop must be the root");
        let mut introduced = vec![hops[0].introduces().key().to_owned()];
        for hop in &hops[1..] {
            prop_assert!(introduced.iter().any(|key| key == hop.from().key()));
            let key = hop.introduces().key().to_owned();
            prop_assert!(!introduced.contains(&key));
            introduced.push(key);
        }
    }
}

#[test]
fn repeated_schemas_get_numbered_aliases() {
    let graph = QueryGraph::new()
        .with_node(GraphNode::new("p", "Person"))
        .with_node(GraphNode::new("f", "Person"))
        .with_edge(GraphEdge::new("p", "f", "follows"));
    let hops = compile(&graph, &CompileOptions::default()).unwrap().hops;
    let keys: Vec<&str> = hops.iter().map(|hop| hop.introduces().key()).collect();
    assert_eq!(keys, ["Person", "Person#2"]);

    let expanded = expand(&hops, &InMemoryCatalog::new(), &LayoutOptions::default()).unwrap();
    assert!(expanded.nodes.iter().all(|node| node.placeholder));
    assert_eq!(
        compile(&expanded, &CompileOptions::default()).unwrap().hops,
        hops
    );
}
