// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end traversal behavior on a small shading network.

use proptest::prelude::*;
use shadegraph_core::{Document, Edge, ElementId, ElementKind, PortType};

struct Network {
    doc: Document,
    graph: ElementId,
    image2: ElementId,
    constant: ElementId,
    multiply: ElementId,
    contrast: ElementId,
    mix: ElementId,
    output: ElementId,
}

// [image1] [constant]     [image2]
//        \ /                 |
//    [multiply]          [contrast]         [noise3d]
//             \____________  |  ____________/
//                          [mix]
//                            |
//                         [output]
fn network() -> Network {
    let mut doc = Document::new();
    let graph = doc.add_node_graph(None).unwrap();
    let image1 = doc.add_node(graph, "image", None).unwrap();
    let image2 = doc.add_node(graph, "image", None).unwrap();
    let constant = doc.add_node(graph, "constant", None).unwrap();
    let multiply = doc.add_node(graph, "multiply", None).unwrap();
    let contrast = doc.add_node(graph, "contrast", None).unwrap();
    let noise3d = doc.add_node(graph, "noise3d", None).unwrap();
    let mix = doc.add_node(graph, "mix", None).unwrap();
    let output = doc.add_output(graph, None).unwrap();
    doc.set_connected_node(multiply, "in1", Some(image1)).unwrap();
    doc.set_connected_node(multiply, "in2", Some(constant)).unwrap();
    doc.set_connected_node(contrast, "in", Some(image2)).unwrap();
    doc.set_connected_node(mix, "fg", Some(multiply)).unwrap();
    doc.set_connected_node(mix, "bg", Some(contrast)).unwrap();
    doc.set_connected_node(mix, "mask", Some(noise3d)).unwrap();
    doc.set_port_connected_node(output, Some(mix)).unwrap();

    Network { doc, graph, image2, constant, multiply, contrast, mix, output }
}

fn is_node(doc: &Document, id: ElementId) -> bool {
    doc.kind(id).unwrap() == ElementKind::Node
}

#[test]
fn test_tree_traversal() {
    let net = network();
    let doc = &net.doc;
    assert!(doc.validate().is_valid());

    let count = doc
        .traverse_tree(doc.root())
        .map(Result::unwrap)
        .filter(|&id| is_node(doc, id))
        .count();
    assert_eq!(count, 7);

    let mut iter = doc.traverse_tree(doc.root());
    let mut count = 0;
    let mut max_depth = 0;
    while let Some(id) = iter.next() {
        if is_node(doc, id.unwrap()) {
            count += 1;
        }
        max_depth = max_depth.max(iter.element_depth());
    }
    assert_eq!(count, 7);
    assert_eq!(max_depth, 3);

    let mut iter = doc.traverse_tree(doc.root());
    let mut count = 0;
    while let Some(id) = iter.next() {
        let id = id.unwrap();
        match doc.kind(id).unwrap() {
            ElementKind::Node => count += 1,
            ElementKind::NodeGraph => iter.set_prune_subtree(true),
            _ => {}
        }
    }
    assert_eq!(count, 0);
}

#[test]
fn test_graph_traversal() {
    let net = network();
    let doc = &net.doc;

    let mut count = 0;
    for edge in doc.traverse_graph(net.output) {
        let edge = edge.unwrap();
        if is_node(doc, edge.upstream_element()) {
            count += 1;
            if is_node(doc, edge.downstream_element()) {
                let connecting = edge.connecting_element().unwrap();
                assert_eq!(doc.kind(connecting).unwrap(), ElementKind::Input);
            }
        }
    }
    assert_eq!(count, 7);

    let mut iter = doc.traverse_graph(net.output);
    let (mut count, mut max_element_depth, mut max_node_depth) = (0, 0, 0);
    while let Some(edge) = iter.next() {
        if is_node(doc, edge.unwrap().upstream_element()) {
            count += 1;
        }
        max_element_depth = max_element_depth.max(iter.element_depth());
        max_node_depth = max_node_depth.max(iter.node_depth());
    }
    assert_eq!(count, 7);
    assert_eq!(max_element_depth, 3);
    assert_eq!(max_node_depth, 3);

    let mut iter = doc.traverse_graph(net.output);
    let mut count = 0;
    while let Some(edge) = iter.next() {
        let upstream = edge.unwrap().upstream_element();
        if is_node(doc, upstream) {
            count += 1;
        }
        if doc.element(upstream).unwrap().category() == "multiply" {
            iter.set_prune_subgraph(true);
        }
    }
    assert_eq!(count, 5);
}

#[test]
fn test_cycles_are_detected_and_cleared() {
    let mut net = network();

    net.doc.set_connected_node(net.multiply, "in2", Some(net.mix)).unwrap();
    assert!(net.doc.has_upstream_cycle(net.output).unwrap());
    assert!(!net.doc.validate().is_valid());
    net.doc.set_connected_node(net.multiply, "in2", Some(net.constant)).unwrap();
    assert!(!net.doc.has_upstream_cycle(net.output).unwrap());
    assert!(net.doc.validate().is_valid());

    net.doc.set_connected_node(net.contrast, "in", Some(net.contrast)).unwrap();
    assert!(net.doc.has_upstream_cycle(net.output).unwrap());
    assert!(!net.doc.validate().is_valid());
    net.doc.set_connected_node(net.contrast, "in", Some(net.image2)).unwrap();
    assert!(!net.doc.has_upstream_cycle(net.output).unwrap());
    assert!(net.doc.validate().is_valid());
}

#[test]
fn test_diamond_is_not_a_cycle() {
    let mut net = network();
    // image2 now feeds mix through both contrast and the mask input
    net.doc.set_connected_node(net.mix, "mask", Some(net.image2)).unwrap();
    assert!(!net.doc.has_upstream_cycle(net.output).unwrap());

    let visits = net
        .doc
        .traverse_graph(net.output)
        .map(Result::unwrap)
        .filter(|edge| edge.upstream_element() == net.image2)
        .count();
    assert_eq!(visits, 2);
}

#[test]
fn test_traversals_are_repeatable() {
    let net = network();
    let doc = &net.doc;

    let tree: Vec<ElementId> = doc.traverse_tree(doc.root()).map(Result::unwrap).collect();
    let again: Vec<ElementId> = doc.traverse_tree(doc.root()).map(Result::unwrap).collect();
    assert_eq!(tree, again);

    let edges: Vec<Edge> = doc.traverse_graph(net.output).map(Result::unwrap).collect();
    let again: Vec<Edge> = doc.traverse_graph(net.output).map(Result::unwrap).collect();
    assert_eq!(edges, again);
    assert_eq!(edges.len(), 7);
}

#[test]
fn test_topological_order_of_network() {
    let net = network();
    let order = net.doc.topological_sort(net.graph).unwrap();
    let position = |id| order.iter().position(|&x| x == id).unwrap();
    assert_eq!(order.len(), 8);
    assert!(position(net.constant) < position(net.multiply));
    assert!(position(net.multiply) < position(net.mix));
    assert!(position(net.mix) < position(net.output));
}

// [noise] -> [blur] -> inner/out -> [tint] -> out, with inner nested in graph
#[test]
fn test_depths_through_nested_graph_output() {
    let mut doc = Document::new();
    let graph = doc.add_node_graph(Some("graph")).unwrap();
    let inner = doc.add_child(graph, ElementKind::NodeGraph, "nodegraph", Some("inner")).unwrap();
    let noise = doc.add_node(inner, "noise2d", Some("noise")).unwrap();
    let blur = doc.add_node(inner, "blur", Some("blur")).unwrap();
    doc.set_connected_node(blur, "in", Some(noise)).unwrap();
    let inner_out = doc.add_output(inner, Some("out")).unwrap();
    doc.set_port_connected_node(inner_out, Some(blur)).unwrap();

    let tint = doc.add_node(graph, "multiply", Some("tint")).unwrap();
    let input = doc.add_input(tint, Some("in1"), &PortType::DEFAULT).unwrap();
    doc.set_connected_output(input, Some(inner_out)).unwrap();
    let out = doc.add_output(graph, Some("out")).unwrap();
    doc.set_port_connected_node(out, Some(tint)).unwrap();

    let mut iter = doc.traverse_graph(out);
    let mut seen = Vec::new();
    while let Some(edge) = iter.next() {
        let edge = edge.unwrap();
        seen.push((edge.upstream_element(), iter.element_depth(), iter.node_depth()));
    }
    assert_eq!(
        seen,
        vec![(tint, 1, 1), (inner_out, 2, 1), (blur, 3, 2), (noise, 4, 3)]
    );
    assert!(!iter.found_cycle());

    let crossing = doc.traverse_graph(tint).next().unwrap().unwrap();
    assert_eq!(crossing.connecting_element(), Some(input));
    assert_eq!(crossing.upstream_element(), inner_out);
}

fn inheritance_chain() -> (Document, ElementId) {
    let mut doc = Document::new();
    let base = doc.add_node_def(Some("BaseClass"), "thing").unwrap();
    let level1 = doc.add_node_def(Some("InheritanceLevel1"), "thing").unwrap();
    let level2 = doc.add_node_def(Some("InheritanceLevel2"), "thing").unwrap();
    doc.set_inherits_from(level2, Some(level1)).unwrap();
    doc.set_inherits_from(level1, Some(base)).unwrap();
    (doc, level2)
}

#[test]
fn test_inheritance_for_loop() {
    let (doc, level2) = inheritance_chain();
    let mut length = 0;
    for def in doc.traverse_inheritance(level2) {
        if doc.kind(def.unwrap()).unwrap() == ElementKind::NodeDef {
            length += 1;
        }
    }
    assert_eq!(length, 2);
}

#[test]
fn test_inheritance_manual_next() {
    let (doc, level2) = inheritance_chain();
    let mut iter = doc.traverse_inheritance(level2);
    let mut length = 0;
    let mut def = iter.next();
    while let Some(current) = def {
        if doc.kind(current.unwrap()).unwrap() == ElementKind::NodeDef {
            length += 1;
        }
        def = iter.next();
    }
    assert_eq!(length, 2);
    assert!(iter.next().is_none());

    let names: Vec<String> = doc
        .traverse_inheritance(level2)
        .map(|def| doc.element(def.unwrap()).unwrap().name().to_string())
        .collect();
    assert_eq!(names, ["InheritanceLevel1", "BaseClass"]);
}

#[test]
fn test_inheritance_traversal_is_idempotent() {
    let (doc, level2) = inheritance_chain();
    let first: Vec<ElementId> = doc.traverse_inheritance(level2).map(Result::unwrap).collect();
    let second: Vec<ElementId> = doc.traverse_inheritance(level2).map(Result::unwrap).collect();
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert!(!doc.has_inheritance_cycle(level2).unwrap());
    assert!(!doc.has_inheritance_cycle(level2).unwrap());
}

#[test]
fn test_inheritance_cycle_terminates() {
    let mut doc = Document::new();
    let a = doc.add_node_def(Some("A"), "thing").unwrap();
    let b = doc.add_node_def(Some("B"), "thing").unwrap();
    doc.set_inherits_from(a, Some(b)).unwrap();
    doc.set_inherits_from(b, Some(a)).unwrap();

    assert!(doc.has_inheritance_cycle(a).unwrap());
    let visited: Vec<ElementId> = doc.traverse_inheritance(a).map(Result::unwrap).collect();
    assert_eq!(visited, vec![b]);
}

/// Build a document from generated shapes: each graph entry nests under the
/// previous graph when its flag is set, and holds nodes with the given input counts.
fn generated(shapes: &[(bool, Vec<usize>)]) -> Document {
    let mut doc = Document::new();
    let mut previous: Option<ElementId> = None;
    for (nested, nodes) in shapes {
        let graph = match previous {
            Some(parent) if *nested => doc
                .add_child(parent, ElementKind::NodeGraph, "nodegraph", None)
                .unwrap(),
            _ => doc.add_node_graph(None).unwrap(),
        };
        for &inputs in nodes {
            let node = doc.add_node(graph, "constant", None).unwrap();
            for _ in 0..inputs {
                doc.add_input(node, None, &shadegraph_core::PortType::Float).unwrap();
            }
        }
        previous = Some(graph);
    }
    doc
}

fn count_nodes(doc: &Document, id: ElementId) -> usize {
    let own = usize::from(is_node(doc, id));
    own + doc
        .children(id)
        .unwrap()
        .iter()
        .map(|&child| count_nodes(doc, child))
        .sum::<usize>()
}

proptest! {
    #[test]
    fn test_tree_visits_every_node_once(
        shapes in prop::collection::vec(
            (any::<bool>(), prop::collection::vec(0usize..3, 0..6)),
            0..5,
        )
    ) {
        let doc = generated(&shapes);
        let visited: Vec<ElementId> = doc.traverse_tree(doc.root()).map(Result::unwrap).collect();
        let nodes = visited.iter().filter(|&&id| is_node(&doc, id)).count();
        prop_assert_eq!(nodes, count_nodes(&doc, doc.root()));
        prop_assert_eq!(visited.len(), doc.element_count());
    }
}
