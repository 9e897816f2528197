// SPDX-License-Identifier: MIT OR Apache-2.0
//! Inspection report assembly and rendering.

use crate::config::InspectConfig;
use crate::error::Result;
use serde::Serialize;
use shadegraph_core::{Document, ElementId, ElementKind, TopologyError};
use std::fmt::Write as _;

/// One validation problem
#[derive(Debug, Clone, Serialize)]
pub struct IssueEntry {
    /// Name path of the element
    pub path: String,
    /// Problem kind
    pub kind: String,
    /// Full message
    pub message: String,
}

/// One element of the document tree
#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
    /// Name path of the element
    pub path: String,
    /// Element category
    pub category: String,
    /// Depth below the document root
    pub depth: usize,
}

/// One upstream edge
#[derive(Debug, Clone, Serialize)]
pub struct EdgeEntry {
    /// Upstream element name
    pub upstream: String,
    /// Connecting input name
    pub connecting: Option<String>,
    /// Downstream element name
    pub downstream: String,
    /// Edges from the start of the walk
    pub element_depth: usize,
    /// Nodes on the current path
    pub node_depth: usize,
}

/// Upstream dataflow of one output
#[derive(Debug, Clone, Serialize)]
pub struct GraphEntry {
    /// Name path of the output
    pub output: String,
    /// Edges in traversal order
    pub edges: Vec<EdgeEntry>,
    /// Whether the walk ran into a cycle
    pub cycle: bool,
    /// Fault that ended the walk early
    pub error: Option<String>,
}

/// Inheritance chain of one definition
#[derive(Debug, Clone, Serialize)]
pub struct InheritanceEntry {
    /// Definition name
    pub definition: String,
    /// Ancestors, nearest first
    pub chain: Vec<String>,
    /// Whether the chain loops
    pub cycle: bool,
    /// Fault that ended the walk early
    pub error: Option<String>,
}

/// DOT rendering of one node graph
#[derive(Debug, Clone, Serialize)]
pub struct DotEntry {
    /// Name path of the graph
    pub graph: String,
    /// DOT source
    pub dot: String,
}

/// Everything the inspector found in a document
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Whether validation passed
    pub valid: bool,
    /// Validation problems
    pub issues: Vec<IssueEntry>,
    /// Document tree
    pub tree: Vec<TreeEntry>,
    /// Upstream dataflow per output
    pub graphs: Vec<GraphEntry>,
    /// Inheritance chains per definition
    pub inheritance: Vec<InheritanceEntry>,
    /// DOT renderings
    pub dot: Vec<DotEntry>,
}

impl Report {
    /// Inspect a document
    pub fn build(doc: &Document, config: &InspectConfig) -> Result<Self> {
        let validation = doc.validate();
        let issues = validation
            .issues()
            .iter()
            .map(|issue| -> Result<IssueEntry> {
                Ok(IssueEntry {
                    path: doc.name_path(issue.element)?,
                    kind: format!("{:?}", issue.kind),
                    message: issue.message.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let tree = if config.show_tree { tree_entries(doc, config)? } else { Vec::new() };
        let graphs = if config.show_graph { graph_entries(doc, config)? } else { Vec::new() };
        let inheritance = if config.show_inheritance {
            inheritance_entries(doc)?
        } else {
            Vec::new()
        };
        let dot = if config.emit_dot { dot_entries(doc)? } else { Vec::new() };

        Ok(Self {
            valid: validation.is_valid(),
            issues,
            tree,
            graphs,
            inheritance,
            dot,
        })
    }

    /// Render as indented text
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let status = if self.valid { "valid" } else { "invalid" };
        let _ = writeln!(out, "Document is {status}");
        for issue in &self.issues {
            let _ = writeln!(out, "  {}", issue.message);
        }

        if !self.tree.is_empty() {
            let _ = writeln!(out, "\nTree:");
            for entry in &self.tree {
                let indent = "  ".repeat(entry.depth + 1);
                let _ = writeln!(out, "{indent}{} ({})", entry.path, entry.category);
            }
        }

        for graph in &self.graphs {
            let _ = writeln!(out, "\nUpstream of {}:", graph.output);
            for edge in &graph.edges {
                let indent = "  ".repeat(edge.element_depth);
                let via = edge.connecting.as_deref().map(|c| format!(" via {c}")).unwrap_or_default();
                let _ = writeln!(
                    out,
                    "{indent}{} <- {}{via} [nodes {}]",
                    edge.downstream, edge.upstream, edge.node_depth
                );
            }
            if graph.cycle {
                let _ = writeln!(out, "  (cycle)");
            }
            if let Some(error) = &graph.error {
                let _ = writeln!(out, "  error: {error}");
            }
        }

        if !self.inheritance.is_empty() {
            let _ = writeln!(out, "\nInheritance:");
            for entry in &self.inheritance {
                let mut line = entry.definition.clone();
                for ancestor in &entry.chain {
                    line.push_str(" -> ");
                    line.push_str(ancestor);
                }
                if entry.cycle {
                    line.push_str(" (cycle)");
                }
                if let Some(error) = &entry.error {
                    let _ = write!(line, " error: {error}");
                }
                let _ = writeln!(out, "  {line}");
            }
        }

        for entry in &self.dot {
            let _ = writeln!(out, "\n// {}", entry.graph);
            out.push_str(&entry.dot);
        }
        out
    }

    /// Render as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn name(doc: &Document, id: ElementId) -> Result<String> {
    Ok(doc.element(id)?.name().to_string())
}

fn tree_entries(doc: &Document, config: &InspectConfig) -> Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    let mut iter = doc.traverse_tree(doc.root());
    while let Some(id) = iter.next() {
        let id = id?;
        let element = doc.element(id)?;
        let depth = iter.element_depth();
        if config.prunes(element.category(), depth) {
            iter.set_prune_subtree(true);
        }
        entries.push(TreeEntry {
            path: doc.name_path(id)?,
            category: element.category().to_string(),
            depth,
        });
    }
    Ok(entries)
}

/// Outputs of node graphs and of the document itself
/// Node graphs at any nesting level, in document order
fn nested_node_graphs(doc: &Document) -> Result<Vec<ElementId>> {
    let mut graphs = Vec::new();
    for element in doc.traverse_tree(doc.root()) {
        let element = element?;
        if doc.kind(element)? == ElementKind::NodeGraph {
            graphs.push(element);
        }
    }
    Ok(graphs)
}

fn graph_outputs(doc: &Document) -> Result<Vec<ElementId>> {
    let mut outputs = doc.outputs(doc.root())?;
    for graph in nested_node_graphs(doc)? {
        outputs.extend(doc.outputs(graph)?);
    }
    Ok(outputs)
}

fn graph_entries(doc: &Document, config: &InspectConfig) -> Result<Vec<GraphEntry>> {
    let mut entries = Vec::new();
    for output in graph_outputs(doc)? {
        let mut edges = Vec::new();
        let mut error = None;
        let mut iter = doc.traverse_graph(output);
        while let Some(edge) = iter.next() {
            let edge = match edge {
                Ok(edge) => edge,
                Err(err) => {
                    tracing::warn!("Graph walk from {} stopped: {}", output, err);
                    error = Some(err.to_string());
                    break;
                }
            };
            let upstream = doc.element(edge.upstream_element())?;
            if config.prunes(upstream.category(), iter.element_depth()) {
                iter.set_prune_subgraph(true);
            }
            edges.push(EdgeEntry {
                upstream: upstream.name().to_string(),
                connecting: edge.connecting_element().map(|c| name(doc, c)).transpose()?,
                downstream: name(doc, edge.downstream_element())?,
                element_depth: iter.element_depth(),
                node_depth: iter.node_depth(),
            });
        }
        entries.push(GraphEntry {
            output: doc.name_path(output)?,
            edges,
            cycle: iter.found_cycle(),
            error,
        });
    }
    Ok(entries)
}

fn inheritance_entries(doc: &Document) -> Result<Vec<InheritanceEntry>> {
    let mut entries = Vec::new();
    for def in doc.node_defs()? {
        let mut chain = Vec::new();
        let mut error = None;
        let mut iter = doc.traverse_inheritance(def);
        for ancestor in iter.by_ref() {
            match ancestor {
                Ok(ancestor) => chain.push(name(doc, ancestor)?),
                Err(err) => {
                    error = Some(err.to_string());
                    break;
                }
            }
        }
        entries.push(InheritanceEntry {
            definition: name(doc, def)?,
            chain,
            cycle: iter.found_cycle(),
            error,
        });
    }
    Ok(entries)
}

fn dot_entries(doc: &Document) -> Result<Vec<DotEntry>> {
    let mut entries = Vec::new();
    for graph in nested_node_graphs(doc)? {
        match doc.to_dot(graph) {
            Ok(dot) => entries.push(DotEntry { graph: doc.name_path(graph)?, dot }),
            Err(TopologyError::Cycle { graph }) => {
                tracing::warn!("Skipping DOT export of '{}': graph has a cycle", graph);
            }
            Err(TopologyError::Document(err)) => return Err(err.into()),
            Err(TopologyError::Traversal(err)) => return Err(err.into()),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportFormat;

    fn sample() -> Document {
        let mut doc = Document::new();
        let graph = doc.add_node_graph(Some("graph")).unwrap();
        let a = doc.add_node(graph, "constant", Some("a")).unwrap();
        let b = doc.add_node(graph, "multiply", Some("b")).unwrap();
        let c = doc.add_node(graph, "mix", Some("c")).unwrap();
        doc.set_connected_node(b, "in1", Some(a)).unwrap();
        doc.set_connected_node(c, "fg", Some(b)).unwrap();
        let out = doc.add_output(graph, Some("out")).unwrap();
        doc.set_port_connected_node(out, Some(c)).unwrap();

        let base = doc.add_node_def(Some("ND_base"), "thing").unwrap();
        let derived = doc.add_node_def(Some("ND_derived"), "thing").unwrap();
        doc.set_inherits_from(derived, Some(base)).unwrap();
        doc
    }

    #[test]
    fn test_build_default_report() {
        let doc = sample();
        let report = Report::build(&doc, &InspectConfig::default()).unwrap();
        assert!(report.valid);
        assert!(report.issues.is_empty());
        assert_eq!(report.tree.len(), doc.element_count());
        assert_eq!(report.graphs.len(), 1);

        let graph = &report.graphs[0];
        assert_eq!(graph.output, "graph/out");
        let upstream: Vec<&str> = graph.edges.iter().map(|e| e.upstream.as_str()).collect();
        assert_eq!(upstream, ["c", "b", "a"]);
        assert_eq!(graph.edges[1].connecting.as_deref(), Some("fg"));
        assert_eq!(graph.edges[2].node_depth, 3);

        let derived = report.inheritance.iter().find(|e| e.definition == "ND_derived").unwrap();
        assert_eq!(derived.chain, vec!["ND_base".to_string()]);
        assert!(report.dot.is_empty());
    }

    #[test]
    fn test_pruning_options() {
        let doc = sample();
        let config = InspectConfig {
            prune_categories: vec!["multiply".to_string()],
            max_depth: Some(1),
            emit_dot: true,
            ..Default::default()
        };
        let report = Report::build(&doc, &config).unwrap();
        // Depth 1 elements are listed but not descended
        assert!(report.tree.iter().all(|e| e.depth <= 1));
        // Every walk is cut at its first edge
        assert_eq!(report.graphs[0].edges.len(), 1);
        assert_eq!(report.dot.len(), 1);
        assert!(report.dot[0].dot.starts_with("digraph {"));
    }

    #[test]
    fn test_dot_covers_nested_graphs() {
        let mut doc = sample();
        let graph = doc.child(doc.root(), "graph").unwrap().unwrap();
        let inner = doc.add_child(graph, ElementKind::NodeGraph, "nodegraph", Some("inner")).unwrap();
        let noise = doc.add_node(inner, "noise2d", Some("noise")).unwrap();
        let inner_out = doc.add_output(inner, Some("out")).unwrap();
        doc.set_port_connected_node(inner_out, Some(noise)).unwrap();

        let config = InspectConfig { emit_dot: true, ..Default::default() };
        let report = Report::build(&doc, &config).unwrap();
        let graphs: Vec<&str> = report.dot.iter().map(|e| e.graph.as_str()).collect();
        assert_eq!(graphs, ["graph", "graph/inner"]);
        assert!(report.dot[1].dot.contains("\"noise2d\" [shape=box]"));

        let outputs: Vec<&str> = report.graphs.iter().map(|g| g.output.as_str()).collect();
        assert_eq!(outputs, ["graph/out", "graph/inner/out"]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut doc = sample();
        let graph = doc.child(doc.root(), "graph").unwrap().unwrap();
        let a = doc.child(graph, "a").unwrap().unwrap();
        let c = doc.child(graph, "c").unwrap().unwrap();
        doc.set_connected_node(a, "in", Some(c)).unwrap();

        let config = InspectConfig { emit_dot: true, ..Default::default() };
        let report = Report::build(&doc, &config).unwrap();
        assert!(!report.valid);
        assert!(report.graphs[0].cycle);
        assert!(report.dot.is_empty());
        assert!(report.to_text().contains("(cycle)"));
    }

    #[test]
    fn test_render() {
        let doc = sample();
        let config = InspectConfig { format: ReportFormat::Json, ..Default::default() };
        let report = Report::build(&doc, &config).unwrap();

        let text = report.to_text();
        assert!(text.starts_with("Document is valid"));
        assert!(text.contains("ND_derived -> ND_base"));
        assert!(text.contains("c <- b via fg [nodes 2]"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["valid"], serde_json::Value::Bool(true));
        assert_eq!(json["graphs"][0]["edges"][2]["upstream"], "a");
    }
}
