// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions and their single-parent inheritance chain.

use crate::document::{Document, DocumentError, Result};
use crate::element::{ElementId, ElementKind, INHERIT_ATTRIBUTE, NODE_ATTRIBUTE};
use std::collections::HashSet;

impl Document {
    /// Add a node definition for the given node category under the document root
    pub fn add_node_def(&mut self, name: Option<&str>, node_category: &str) -> Result<ElementId> {
        let category = ElementKind::NodeDef.default_category();
        let id = self.add_child(self.root(), ElementKind::NodeDef, category, name)?;
        self.set_attribute(id, NODE_ATTRIBUTE, node_category)?;
        Ok(id)
    }

    /// Node definitions in declaration order
    pub fn node_defs(&self) -> Result<Vec<ElementId>> {
        self.children_of_kind(self.root(), ElementKind::NodeDef)
    }

    /// Node definitions describing a node category
    pub fn node_defs_for(&self, node_category: &str) -> Result<Vec<ElementId>> {
        Ok(self
            .node_defs()?
            .into_iter()
            .filter(|&def| matches!(self.attribute(def, NODE_ATTRIBUTE), Ok(Some(c)) if c == node_category))
            .collect())
    }

    /// Make a definition inherit from another, or clear it with `None`
    pub fn set_inherits_from(&mut self, def: ElementId, parent: Option<ElementId>) -> Result<()> {
        self.element_of_kind(def, ElementKind::NodeDef)?;
        match parent {
            Some(parent) => {
                let name = self.element_of_kind(parent, ElementKind::NodeDef)?.name().to_string();
                self.set_attribute(def, INHERIT_ATTRIBUTE, name)
            }
            None => self.remove_attribute(def, INHERIT_ATTRIBUTE).map(|_| ()),
        }
    }

    /// Resolve the element a definition inherits from.
    ///
    /// The parent is looked up among the document's children. A parent of a
    /// different kind is not followed. A name that does not resolve at all is
    /// [`DocumentError::UnresolvedInheritance`].
    pub fn inherits_from(&self, id: ElementId) -> Result<Option<ElementId>> {
        let element = self.element(id)?;
        let Some(name) = element.attribute(INHERIT_ATTRIBUTE) else {
            return Ok(None);
        };
        let Some(parent) = self.child(self.root(), name)? else {
            return Err(DocumentError::UnresolvedInheritance {
                element: self.name_path(id)?,
                target: name.to_string(),
            });
        };
        if self.kind(parent)? != element.kind() {
            return Ok(None);
        }
        Ok(Some(parent))
    }

    /// Inputs of a definition and its ancestors, the nearest definition winning name clashes
    pub fn active_inputs(&self, def: ElementId) -> Result<Vec<ElementId>> {
        let mut seen = HashSet::new();
        let mut active = Vec::new();
        let mut current = Some(def);
        let mut visited = HashSet::new();
        while let Some(element) = current {
            if !visited.insert(element) {
                break;
            }
            for input in self.inputs(element)? {
                if seen.insert(self.element(input)?.name().to_string()) {
                    active.push(input);
                }
            }
            current = self.inherits_from(element)?;
        }
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortType;

    #[test]
    fn test_inheritance_link() {
        let mut doc = Document::new();
        let base = doc.add_node_def(Some("ND_base"), "base").unwrap();
        let child = doc.add_node_def(Some("ND_child"), "base").unwrap();
        assert_eq!(doc.inherits_from(child).unwrap(), None);

        doc.set_inherits_from(child, Some(base)).unwrap();
        assert_eq!(doc.inherits_from(child).unwrap(), Some(base));
        assert_eq!(doc.attribute(child, INHERIT_ATTRIBUTE).unwrap(), Some("ND_base"));

        doc.set_inherits_from(child, None).unwrap();
        assert_eq!(doc.inherits_from(child).unwrap(), None);
        assert_eq!(doc.node_defs_for("base").unwrap(), vec![base, child]);
    }

    #[test]
    fn test_unresolved_inheritance() {
        let mut doc = Document::new();
        let def = doc.add_node_def(Some("ND_child"), "thing").unwrap();
        doc.set_attribute(def, INHERIT_ATTRIBUTE, "ND_missing").unwrap();
        assert!(matches!(
            doc.inherits_from(def),
            Err(DocumentError::UnresolvedInheritance { .. })
        ));
    }

    #[test]
    fn test_other_kind_not_followed() {
        let mut doc = Document::new();
        let def = doc.add_node_def(Some("ND_child"), "thing").unwrap();
        doc.add_node_graph(Some("graph")).unwrap();
        doc.set_attribute(def, INHERIT_ATTRIBUTE, "graph").unwrap();
        assert_eq!(doc.inherits_from(def).unwrap(), None);
    }

    #[test]
    fn test_active_inputs() {
        let mut doc = Document::new();
        let base = doc.add_node_def(Some("ND_base"), "thing").unwrap();
        let base_in = doc.add_input(base, Some("in"), &PortType::Float).unwrap();
        let base_amount = doc.add_input(base, Some("amount"), &PortType::Float).unwrap();
        let child = doc.add_node_def(Some("ND_child"), "thing").unwrap();
        let child_in = doc.add_input(child, Some("in"), &PortType::Color3).unwrap();
        doc.set_inherits_from(child, Some(base)).unwrap();

        assert_eq!(doc.active_inputs(child).unwrap(), vec![child_in, base_amount]);
        assert_eq!(doc.active_inputs(base).unwrap(), vec![base_in, base_amount]);

        // A cycle ends the walk instead of looping
        doc.set_inherits_from(base, Some(child)).unwrap();
        assert_eq!(doc.active_inputs(child).unwrap(), vec![child_in, base_amount]);
    }
}
