// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node ports and their connections.
//!
//! Connections are stored by name on the downstream port and resolved
//! against the port's graph scope whenever they are read, so renaming or
//! removing an upstream node is observed by the next lookup.

use crate::document::{Document, DocumentError, Result};
use crate::element::{ElementId, ElementKind};
use crate::port::{PortBinding, PortType, PortValue};

impl Document {
    /// Graph element whose children a port's connection names are resolved against.
    ///
    /// Ports on a node resolve against the node's graph. Interface ports on a
    /// graph, and graph outputs, resolve against that graph.
    pub fn connection_scope(&self, port: ElementId) -> Result<ElementId> {
        let element = self.element(port)?;
        if !element.kind().is_port() {
            return Err(DocumentError::WrongKind { element: port, expected: ElementKind::Input });
        }
        let parent = element.parent().ok_or(DocumentError::StaleElement(port))?;
        let parent_element = self.element(parent)?;
        match parent_element.kind() {
            ElementKind::Node => parent_element.parent().ok_or(DocumentError::StaleElement(parent)),
            _ => Ok(parent),
        }
    }

    /// Input ports of an element in declaration order
    pub fn inputs(&self, id: ElementId) -> Result<Vec<ElementId>> {
        self.children_of_kind(id, ElementKind::Input)
    }

    /// Output ports of an element in declaration order
    pub fn outputs(&self, id: ElementId) -> Result<Vec<ElementId>> {
        self.children_of_kind(id, ElementKind::Output)
    }

    /// Find an input port by name
    pub fn input(&self, id: ElementId, name: &str) -> Result<Option<ElementId>> {
        self.child_of_kind(id, name, ElementKind::Input)
    }

    /// Find an output port by name
    pub fn output(&self, id: ElementId, name: &str) -> Result<Option<ElementId>> {
        self.child_of_kind(id, name, ElementKind::Output)
    }

    fn port_binding(&self, port: ElementId) -> Result<&PortBinding> {
        let element = self.element(port)?;
        if !element.kind().is_port() {
            return Err(DocumentError::WrongKind { element: port, expected: ElementKind::Input });
        }
        Ok(element.binding())
    }

    fn set_binding(&mut self, port: ElementId, binding: PortBinding) -> Result<()> {
        self.port_binding(port)?;
        self.element_mut(port)?.binding = binding;
        Ok(())
    }

    /// Find a node input by name, adding it with the given type when missing
    fn input_or_insert(&mut self, node: ElementId, name: &str, port_type: &PortType) -> Result<ElementId> {
        self.element_of_kind(node, ElementKind::Node)?;
        match self.input(node, name)? {
            Some(input) => Ok(input),
            None => self.add_input(node, Some(name), port_type),
        }
    }

    /// Connect a node input to an upstream node, or clear it with `None`.
    ///
    /// The input is created when missing, typed like the upstream node.
    /// Existing inputs keep their declaration position.
    pub fn set_connected_node(
        &mut self,
        node: ElementId,
        input_name: &str,
        upstream: Option<ElementId>,
    ) -> Result<ElementId> {
        let port_type = match upstream {
            Some(upstream) => self.port_type(upstream)?,
            None => PortType::DEFAULT,
        };
        let input = self.input_or_insert(node, input_name, &port_type)?;
        self.set_port_connected_node(input, upstream)?;
        Ok(input)
    }

    /// Connect any port to an upstream node in its scope, or clear it with `None`
    pub fn set_port_connected_node(&mut self, port: ElementId, upstream: Option<ElementId>) -> Result<()> {
        let binding = match upstream {
            Some(upstream) => {
                let scope = self.connection_scope(port)?;
                let element = self.element_of_kind(upstream, ElementKind::Node)?;
                if element.parent() != Some(scope) {
                    return Err(DocumentError::OutOfScope { port, target: upstream });
                }
                PortBinding::Node { node: element.name().to_string(), output: None }
            }
            None => PortBinding::Unbound,
        };
        self.set_binding(port, binding)
    }

    /// Connect a port to a graph output, or clear it with `None`.
    ///
    /// The output may be a sibling in the port's scope or an output of a
    /// sibling node graph.
    pub fn set_connected_output(&mut self, port: ElementId, output: Option<ElementId>) -> Result<()> {
        let binding = match output {
            Some(output) => {
                let scope = self.connection_scope(port)?;
                let element = self.element_of_kind(output, ElementKind::Output)?;
                let owner = element.parent().ok_or(DocumentError::StaleElement(output))?;
                let name = element.name().to_string();
                if owner == scope {
                    PortBinding::Output { graph: None, output: name }
                } else {
                    let graph = self.element(owner)?;
                    if graph.kind() != ElementKind::NodeGraph || graph.parent() != Some(scope) {
                        return Err(DocumentError::OutOfScope { port, target: output });
                    }
                    PortBinding::Output { graph: Some(graph.name().to_string()), output: name }
                }
            }
            None => PortBinding::Unbound,
        };
        self.set_binding(port, binding)
    }

    /// Select a named output of the connected multi-output node
    pub fn set_connected_output_name(&mut self, port: ElementId, output_name: Option<&str>) -> Result<()> {
        let binding = match self.port_binding(port)? {
            PortBinding::Node { node, .. } => PortBinding::Node {
                node: node.clone(),
                output: output_name.map(str::to_string),
            },
            other => other.clone(),
        };
        self.set_binding(port, binding)
    }

    /// Give a node input a literal value, creating the input when missing
    pub fn set_input_value(&mut self, node: ElementId, input_name: &str, value: PortValue) -> Result<ElementId> {
        let input = self.input_or_insert(node, input_name, &value.port_type())?;
        self.set_binding(input, PortBinding::Value(value))?;
        Ok(input)
    }

    /// Give any port a literal value, replacing its connection
    pub fn set_port_value(&mut self, port: ElementId, value: PortValue) -> Result<()> {
        self.set_binding(port, PortBinding::Value(value))
    }

    /// Literal value of a port, if it holds one
    pub fn port_value(&self, port: ElementId) -> Result<Option<&PortValue>> {
        Ok(self.port_binding(port)?.value())
    }

    /// Upstream node a port is connected to
    pub fn connected_node(&self, port: ElementId) -> Result<Option<ElementId>> {
        match self.port_binding(port)? {
            PortBinding::Node { .. } => self.connected_element(port),
            _ => Ok(None),
        }
    }

    /// Upstream graph output a port is connected to
    pub fn connected_output(&self, port: ElementId) -> Result<Option<ElementId>> {
        match self.port_binding(port)? {
            PortBinding::Output { .. } => self.connected_element(port),
            _ => Ok(None),
        }
    }

    /// Resolve a port's connection to the upstream node or output.
    ///
    /// Returns `Ok(None)` for unconnected ports and
    /// [`DocumentError::UnresolvedConnection`] when a stored name does not
    /// resolve in the port's scope.
    pub fn connected_element(&self, port: ElementId) -> Result<Option<ElementId>> {
        let unresolved = |target: String| -> Result<Option<ElementId>> {
            Err(DocumentError::UnresolvedConnection { port: self.name_path(port)?, target })
        };

        match self.port_binding(port)? {
            PortBinding::Unbound | PortBinding::Value(_) => Ok(None),
            PortBinding::Node { node, .. } => {
                let scope = self.connection_scope(port)?;
                match self.child_of_kind(scope, node, ElementKind::Node)? {
                    Some(upstream) => Ok(Some(upstream)),
                    None => unresolved(format!("node '{node}'")),
                }
            }
            PortBinding::Output { graph, output } => {
                let scope = self.connection_scope(port)?;
                let owner = match graph {
                    Some(graph) => match self.child_of_kind(scope, graph, ElementKind::NodeGraph)? {
                        Some(owner) => owner,
                        None => return unresolved(format!("node graph '{graph}'")),
                    },
                    None => scope,
                };
                match self.output(owner, output)? {
                    Some(upstream) => Ok(Some(upstream)),
                    None => unresolved(format!("output '{output}'")),
                }
            }
        }
    }

    /// Ports whose connection resolves to the given node or output.
    ///
    /// Searches the element's own scope and, for outputs of a node graph,
    /// the scope that owns the graph. Dangling connections are skipped.
    pub fn downstream_ports(&self, target: ElementId) -> Result<Vec<ElementId>> {
        let element = self.element(target)?;
        let mut scopes = Vec::new();
        if let Some(parent) = element.parent() {
            scopes.push(parent);
            if element.kind() == ElementKind::Output && self.kind(parent)? == ElementKind::NodeGraph {
                if let Some(grandparent) = self.parent(parent)? {
                    scopes.push(grandparent);
                }
            }
        }

        let mut ports = Vec::new();
        for scope in scopes {
            for &child in self.children(scope)? {
                let candidates = match self.kind(child)? {
                    ElementKind::Node => self.inputs(child)?,
                    ElementKind::Input | ElementKind::Output => vec![child],
                    _ => Vec::new(),
                };
                for port in candidates {
                    if matches!(self.connected_element(port), Ok(Some(up)) if up == target) {
                        ports.push(port);
                    }
                }
            }
        }
        Ok(ports)
    }
}
