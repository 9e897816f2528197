// SPDX-License-Identifier: MIT OR Apache-2.0
//! Document storage: an arena of elements forming a single tree.
//!
//! Ownership flows strictly from parent to child. Children are listed by
//! handle in their parent, and each child keeps a non-owning handle back to
//! its parent for path and depth queries.

use crate::element::{
    create_valid_name, increment_name, Element, ElementId, ElementKind, TYPE_ATTRIBUTE,
    VERSION_ATTRIBUTE,
};
use crate::port::PortType;
use crate::traversal::AncestorIterator;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Format version written into new documents
pub const DOCUMENT_VERSION: (u32, u32) = (1, 39);

/// Separator used in element name paths
pub const NAME_PATH_SEPARATOR: &str = "/";

/// Document errors
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Handle refers to an element that no longer exists
    #[error("Element not found: {0}")]
    StaleElement(ElementId),

    /// Sibling with the same name already exists
    #[error("Duplicate child name '{name}' under {parent}")]
    DuplicateName {
        /// Parent element
        parent: ElementId,
        /// Conflicting name
        name: String,
    },

    /// Parent kind does not accept the child kind
    #[error("A {child:?} element cannot be a child of a {parent:?} element")]
    InvalidChild {
        /// Parent kind
        parent: ElementKind,
        /// Rejected child kind
        child: ElementKind,
    },

    /// Named child does not exist
    #[error("Child not found: {0}")]
    ChildNotFound(String),

    /// Element is not of the kind the operation requires
    #[error("Element {element} is not a {expected:?}")]
    WrongKind {
        /// Offending element
        element: ElementId,
        /// Kind the operation requires
        expected: ElementKind,
    },

    /// Connection target is not reachable from the port's graph scope
    #[error("Element {target} is outside the graph scope of port {port}")]
    OutOfScope {
        /// Port being connected
        port: ElementId,
        /// Requested upstream element
        target: ElementId,
    },

    /// Stored connection names an element that does not resolve
    #[error("Unresolved connection on '{port}': {target}")]
    UnresolvedConnection {
        /// Name path of the port
        port: String,
        /// Description of the missing target
        target: String,
    },

    /// Stored inheritance names an element that does not resolve
    #[error("Unresolved inheritance on '{element}': {target}")]
    UnresolvedInheritance {
        /// Name path of the inheriting element
        element: String,
        /// Name of the missing parent definition
        target: String,
    },

    /// The document root cannot be removed
    #[error("Cannot remove the document root")]
    RootRemoval,

    /// Loaded document has no root element
    #[error("Document has no root element")]
    MissingRoot,

    /// Loaded document does not form a single consistent tree
    #[error("Malformed document: {0}")]
    Malformed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialize(#[from] ron::error::SpannedError),
}

/// Result type for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Slot {
    generation: u32,
    element: Option<Element>,
}

/// A shading graph document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: ElementId,
}

impl Document {
    /// Create a new document holding only its root element
    pub fn new() -> Self {
        let mut root = Element::new(
            ElementKind::Document,
            ElementKind::Document.default_category(),
            "",
            None,
        );
        root.attributes.insert(
            VERSION_ATTRIBUTE.to_string(),
            format!("{}.{}", DOCUMENT_VERSION.0, DOCUMENT_VERSION.1),
        );
        Self {
            slots: vec![Slot { generation: 0, element: Some(root) }],
            free: Vec::new(),
            root: ElementId::new(0, 0),
        }
    }

    /// Document root element
    pub fn root(&self) -> ElementId {
        self.root
    }

    /// Check if a handle refers to a live element
    pub fn contains(&self, id: ElementId) -> bool {
        self.element(id).is_ok()
    }

    /// Get an element by handle
    pub fn element(&self, id: ElementId) -> Result<&Element> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.element.as_ref())
            .ok_or(DocumentError::StaleElement(id))
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> Result<&mut Element> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.element.as_mut())
            .ok_or(DocumentError::StaleElement(id))
    }

    /// Get an element, requiring a specific kind
    pub(crate) fn element_of_kind(&self, id: ElementId, expected: ElementKind) -> Result<&Element> {
        let element = self.element(id)?;
        if element.kind() != expected {
            return Err(DocumentError::WrongKind { element: id, expected });
        }
        Ok(element)
    }

    /// Kind of an element
    pub fn kind(&self, id: ElementId) -> Result<ElementKind> {
        Ok(self.element(id)?.kind())
    }

    /// Parent of an element
    pub fn parent(&self, id: ElementId) -> Result<Option<ElementId>> {
        Ok(self.element(id)?.parent())
    }

    /// Children of an element in declaration order
    pub fn children(&self, id: ElementId) -> Result<&[ElementId]> {
        Ok(self.element(id)?.children())
    }

    /// Find a child by name
    pub fn child(&self, parent: ElementId, name: &str) -> Result<Option<ElementId>> {
        let parent = self.element(parent)?;
        Ok(parent
            .children()
            .iter()
            .copied()
            .find(|&child| self.element(child).is_ok_and(|c| c.name() == name)))
    }

    /// Find a child by name, requiring a specific kind
    pub(crate) fn child_of_kind(
        &self,
        parent: ElementId,
        name: &str,
        kind: ElementKind,
    ) -> Result<Option<ElementId>> {
        Ok(self
            .child(parent, name)?
            .filter(|&child| self.kind(child).is_ok_and(|k| k == kind)))
    }

    /// Number of live elements, root included
    pub fn element_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.element.is_some()).count()
    }

    /// Turn a requested name into a valid name not used by any child of `parent`
    pub fn create_valid_child_name(&self, parent: ElementId, name: &str) -> Result<String> {
        let mut name = create_valid_name(name);
        while self.child(parent, &name)?.is_some() {
            name = increment_name(&name);
        }
        Ok(name)
    }

    /// Add a child element.
    ///
    /// Without a name the child is called after its category with a numeric
    /// suffix, the first free one among its siblings.
    pub fn add_child(
        &mut self,
        parent: ElementId,
        kind: ElementKind,
        category: &str,
        name: Option<&str>,
    ) -> Result<ElementId> {
        let parent_kind = self.kind(parent)?;
        if !parent_kind.accepts_child(kind) {
            return Err(DocumentError::InvalidChild { parent: parent_kind, child: kind });
        }

        let name = match name {
            Some(name) => {
                if self.child(parent, name)?.is_some() {
                    return Err(DocumentError::DuplicateName {
                        parent,
                        name: name.to_string(),
                    });
                }
                name.to_string()
            }
            None => self.create_valid_child_name(parent, &format!("{category}1"))?,
        };

        let element = Element::new(kind, category, name, Some(parent));
        let id = self.insert(element);
        self.element_mut(parent)?.children.push(id);
        tracing::trace!("Added {:?} {} under {}", kind, id, parent);
        Ok(id)
    }

    fn insert(&mut self, element: Element) -> ElementId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.element = Some(element);
            return ElementId::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, element: Some(element) });
        ElementId::new(index, 0)
    }

    /// Add a node graph under the document root
    pub fn add_node_graph(&mut self, name: Option<&str>) -> Result<ElementId> {
        let category = ElementKind::NodeGraph.default_category();
        self.add_child(self.root, ElementKind::NodeGraph, category, name)
    }

    /// Add a node with the given category to a graph.
    ///
    /// The node gets the default data type.
    pub fn add_node(&mut self, graph: ElementId, category: &str, name: Option<&str>) -> Result<ElementId> {
        let id = self.add_child(graph, ElementKind::Node, category, name)?;
        self.set_type(id, &PortType::DEFAULT)?;
        Ok(id)
    }

    /// Add an output port to a graph or node
    pub fn add_output(&mut self, parent: ElementId, name: Option<&str>) -> Result<ElementId> {
        let category = ElementKind::Output.default_category();
        let id = self.add_child(parent, ElementKind::Output, category, name)?;
        self.set_type(id, &PortType::DEFAULT)?;
        Ok(id)
    }

    /// Add a typed input port
    pub fn add_input(&mut self, parent: ElementId, name: Option<&str>, port_type: &PortType) -> Result<ElementId> {
        let category = ElementKind::Input.default_category();
        let id = self.add_child(parent, ElementKind::Input, category, name)?;
        self.set_type(id, port_type)?;
        Ok(id)
    }

    /// Remove a named child together with its whole subtree
    pub fn remove_child(&mut self, parent: ElementId, name: &str) -> Result<()> {
        let child = self
            .child(parent, name)?
            .ok_or_else(|| DocumentError::ChildNotFound(name.to_string()))?;
        self.remove_element(child)
    }

    /// Remove an element and its subtree, invalidating every handle to them
    pub fn remove_element(&mut self, id: ElementId) -> Result<()> {
        if id == self.root {
            return Err(DocumentError::RootRemoval);
        }
        if let Some(parent) = self.element(id)?.parent() {
            self.element_mut(parent)?.children.retain(|&c| c != id);
        }

        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(slot) = self.slots.get_mut(current.index()) else {
                continue;
            };
            if slot.generation != current.generation() {
                continue;
            }
            if let Some(element) = slot.element.take() {
                pending.extend(element.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index() as u32);
            }
        }
        tracing::trace!("Removed {} and its descendants", id);
        Ok(())
    }

    /// Rename an element, keeping sibling names unique
    pub fn set_name(&mut self, id: ElementId, name: &str) -> Result<()> {
        let element = self.element(id)?;
        if element.name() == name {
            return Ok(());
        }
        if let Some(parent) = element.parent() {
            if self.child(parent, name)?.is_some() {
                return Err(DocumentError::DuplicateName { parent, name: name.to_string() });
            }
        }
        self.element_mut(id)?.name = name.to_string();
        Ok(())
    }

    /// Set an attribute value
    pub fn set_attribute(&mut self, id: ElementId, name: &str, value: impl Into<String>) -> Result<()> {
        self.element_mut(id)?.attributes.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Get an attribute value
    pub fn attribute(&self, id: ElementId, name: &str) -> Result<Option<&str>> {
        Ok(self.element(id)?.attribute(name))
    }

    /// Remove an attribute, returning its previous value
    pub fn remove_attribute(&mut self, id: ElementId, name: &str) -> Result<Option<String>> {
        Ok(self.element_mut(id)?.attributes.shift_remove(name))
    }

    /// Set the data type of an element
    pub fn set_type(&mut self, id: ElementId, port_type: &PortType) -> Result<()> {
        self.set_attribute(id, TYPE_ATTRIBUTE, port_type.as_str())
    }

    /// Data type of an element, the default type when none is declared
    pub fn port_type(&self, id: ElementId) -> Result<PortType> {
        Ok(self
            .element(id)?
            .type_name()
            .map_or(PortType::DEFAULT, PortType::parse))
    }

    /// Declared format version, the current version when the attribute is absent
    pub fn version(&self) -> Option<(u32, u32)> {
        let Ok(Some(version)) = self.attribute(self.root, VERSION_ATTRIBUTE) else {
            return Some(DOCUMENT_VERSION);
        };
        let (major, minor) = version.split_once('.')?;
        Some((major.trim().parse().ok()?, minor.trim().parse().ok()?))
    }

    /// Iterate an element and its ancestors up to the document root
    pub fn ancestors(&self, id: ElementId) -> Result<AncestorIterator<'_>> {
        self.element(id)?;
        Ok(AncestorIterator::new(self, id))
    }

    /// Path of names from the document root down to the element
    pub fn name_path(&self, id: ElementId) -> Result<String> {
        let mut names: Vec<&str> = Vec::new();
        for ancestor in self.ancestors(id)? {
            if ancestor == self.root {
                break;
            }
            names.push(self.element(ancestor)?.name());
        }
        names.reverse();
        Ok(names.join(NAME_PATH_SEPARATOR))
    }

    /// Find an element by name path relative to the document root
    pub fn descendant(&self, path: &str) -> Result<Option<ElementId>> {
        let mut current = self.root;
        for name in path.split(NAME_PATH_SEPARATOR).filter(|n| !n.is_empty()) {
            match self.child(current, name)? {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Node graphs owned by the document root
    pub fn node_graphs(&self) -> Result<Vec<ElementId>> {
        self.children_of_kind(self.root, ElementKind::NodeGraph)
    }

    /// Children of a given kind in declaration order
    pub fn children_of_kind(&self, parent: ElementId, kind: ElementKind) -> Result<Vec<ElementId>> {
        Ok(self
            .children(parent)?
            .iter()
            .copied()
            .filter(|&child| self.kind(child).is_ok_and(|k| k == kind))
            .collect())
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Load a document from RON, rejecting anything that is not a single tree
    pub fn from_ron(source: &str) -> Result<Self> {
        let document: Document = ron::from_str(source)?;
        match document.element(document.root) {
            Ok(root) if root.kind() == ElementKind::Document && root.parent().is_none() => {}
            _ => return Err(DocumentError::MissingRoot),
        }
        document.check_structure()?;
        Ok(document)
    }

    /// Verify parent links, tree shape, sibling names and the free list
    fn check_structure(&self) -> Result<()> {
        let malformed = |message: String| Err(DocumentError::Malformed(message));

        let mut visited = HashSet::new();
        visited.insert(self.root);
        let mut pending = vec![self.root];
        while let Some(current) = pending.pop() {
            let element = self.element(current)?;
            let mut names = HashSet::new();
            for &child in element.children() {
                let Ok(data) = self.element(child) else {
                    return malformed(format!("{current} lists missing child {child}"));
                };
                if data.parent() != Some(current) {
                    return malformed(format!("{child} is listed under {current} but names another parent"));
                }
                if !visited.insert(child) {
                    return malformed(format!("{child} is reached more than once"));
                }
                if !element.kind().accepts_child(data.kind()) {
                    return malformed(format!(
                        "a {:?} element cannot be a child of a {:?} element",
                        data.kind(),
                        element.kind()
                    ));
                }
                if !names.insert(data.name()) {
                    return malformed(format!("duplicate child name '{}' under {current}", data.name()));
                }
                pending.push(child);
            }
        }

        if visited.len() != self.element_count() {
            return malformed(format!(
                "{} element(s) are not reachable from the root",
                self.element_count() - visited.len()
            ));
        }

        let mut free = HashSet::new();
        for &index in &self.free {
            let empty = self
                .slots
                .get(index as usize)
                .is_some_and(|slot| slot.element.is_none());
            if !empty || !free.insert(index) {
                return malformed(format!("free list entry {index} is not a single empty slot"));
            }
        }
        if free.len() != self.slots.len() - self.element_count() {
            return malformed("free list does not cover every empty slot".to_string());
        }
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
