// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dataflow ordering and DOT export for graph elements.

use crate::document::{Document, DocumentError};
use crate::element::{increment_name, ElementId, ElementKind};
use crate::traversal::{Edge, TraversalError};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Topology errors
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The graph's children cannot be ordered
    #[error("Cycle detected in graph '{graph}'")]
    Cycle {
        /// Name path of the graph
        graph: String,
    },

    /// Document error
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Traversal error
    #[error(transparent)]
    Traversal(#[from] TraversalError),
}

/// Result type for topology operations
pub type Result<T> = std::result::Result<T, TopologyError>;

impl Document {
    /// Children of a graph ordered so that every element follows its upstream elements.
    ///
    /// Only connections between children of the same graph constrain the order.
    /// Elements without constraints keep their declaration order.
    pub fn topological_sort(&self, graph: ElementId) -> Result<Vec<ElementId>> {
        let children = self.children(graph)?;
        let members: HashSet<ElementId> = children.iter().copied().collect();

        let mut in_degree: HashMap<ElementId, usize> = HashMap::with_capacity(children.len());
        let mut dependents: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
        for &child in children {
            let mut count = 0;
            for index in 0..self.upstream_edge_count(child)? {
                let Some(edge) = self.upstream_edge(child, index)? else {
                    continue;
                };
                let upstream = edge.upstream_element();
                if members.contains(&upstream) {
                    count += 1;
                    dependents.entry(upstream).or_default().push(child);
                }
            }
            in_degree.insert(child, count);
        }

        let mut queue: VecDeque<ElementId> = children
            .iter()
            .copied()
            .filter(|child| in_degree.get(child) == Some(&0))
            .collect();
        let mut order = Vec::with_capacity(children.len());
        while let Some(child) = queue.pop_front() {
            order.push(child);
            for &dependent in dependents.get(&child).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if order.len() < children.len() {
            return Err(TopologyError::Cycle { graph: self.name_path(graph)? });
        }
        Ok(order)
    }

    /// Render the dataflow of a graph in DOT format.
    ///
    /// Nodes are labelled by category, made unique with a trailing number.
    /// Each edge reachable from a graph output is written once, labelled with
    /// the connecting input.
    pub fn to_dot(&self, graph: ElementId) -> Result<String> {
        let order = self.topological_sort(graph)?;

        let mut labels: IndexMap<ElementId, String> = IndexMap::new();
        let mut taken = HashSet::new();
        for &child in &order {
            let mut label = self.element(child)?.category().to_string();
            while taken.contains(&label) {
                label = increment_name(&label);
            }
            taken.insert(label.clone());
            labels.insert(child, label);
        }

        let mut dot = String::from("digraph {\n");
        for (&child, label) in &labels {
            if self.kind(child)? == ElementKind::Node {
                dot.push_str(&format!("    \"{label}\" [shape=box];\n"));
            }
        }

        let mut written: HashSet<Edge> = HashSet::new();
        for output in self.outputs(graph)? {
            for edge in self.traverse_graph(output) {
                let edge = edge?;
                if !written.insert(edge) {
                    continue;
                }
                let label_of = |id: ElementId| -> Result<String> {
                    match labels.get(&id) {
                        Some(label) => Ok(label.clone()),
                        None => Ok(self.element(id)?.name().to_string()),
                    }
                };
                let connecting = match edge.connecting_element() {
                    Some(connecting) => self.element(connecting)?.name().to_string(),
                    None => String::new(),
                };
                dot.push_str(&format!(
                    "    \"{}\" -> \"{}\" [label=\"{}\"];\n",
                    label_of(edge.upstream_element())?,
                    label_of(edge.downstream_element())?,
                    connecting
                ));
            }
        }
        dot.push('}');
        dot.push('\n');
        Ok(dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topological_sort() {
        let mut doc = Document::new();
        let graph = doc.add_node_graph(Some("graph")).unwrap();
        let out = doc.add_output(graph, Some("out")).unwrap();
        let mix = doc.add_node(graph, "mix", None).unwrap();
        let a = doc.add_node(graph, "constant", Some("a")).unwrap();
        let b = doc.add_node(graph, "constant", Some("b")).unwrap();
        doc.set_connected_node(mix, "fg", Some(a)).unwrap();
        doc.set_connected_node(mix, "bg", Some(b)).unwrap();
        doc.set_port_connected_node(out, Some(mix)).unwrap();

        assert_eq!(doc.topological_sort(graph).unwrap(), vec![a, b, mix, out]);

        doc.set_connected_node(a, "in", Some(mix)).unwrap();
        assert!(matches!(
            doc.topological_sort(graph),
            Err(TopologyError::Cycle { graph }) if graph == "graph"
        ));
    }

    #[test]
    fn test_to_dot() {
        let mut doc = Document::new();
        let graph = doc.add_node_graph(Some("graph")).unwrap();
        let a = doc.add_node(graph, "constant", Some("a")).unwrap();
        let b = doc.add_node(graph, "constant", Some("b")).unwrap();
        let add = doc.add_node(graph, "add", None).unwrap();
        doc.set_connected_node(add, "in1", Some(a)).unwrap();
        doc.set_connected_node(add, "in2", Some(b)).unwrap();
        let out = doc.add_output(graph, Some("out")).unwrap();
        doc.set_port_connected_node(out, Some(add)).unwrap();

        let dot = doc.to_dot(graph).unwrap();
        let expected = "digraph {\n    \"constant\" [shape=box];\n    \"constant2\" [shape=box];\n    \"add\" [shape=box];\n    \"add\" -> \"output\" [label=\"\"];\n    \"constant\" -> \"add\" [label=\"in1\"];\n    \"constant2\" -> \"add\" [label=\"in2\"];\n}\n";
        assert_eq!(dot, expected);
    }
}
