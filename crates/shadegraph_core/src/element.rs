// SPDX-License-Identifier: MIT OR Apache-2.0
//! Element definitions for the document tree.

use crate::port::PortBinding;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute holding an element's data type
pub const TYPE_ATTRIBUTE: &str = "type";
/// Attribute holding the document format version
pub const VERSION_ATTRIBUTE: &str = "version";
/// Attribute naming the definition an element inherits from
pub const INHERIT_ATTRIBUTE: &str = "inherit";
/// Attribute naming the node category a definition describes
pub const NODE_ATTRIBUTE: &str = "node";
/// Attribute holding a port's unit
pub const UNIT_ATTRIBUTE: &str = "unit";
/// Attribute holding a port's unit type
pub const UNIT_TYPE_ATTRIBUTE: &str = "unittype";

/// Handle to an element stored in a [`Document`](crate::Document).
///
/// Handles do not own anything. The generation guards against a handle
/// outliving the element it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId {
    index: u32,
    generation: u32,
}

impl ElementId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot of this element
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Generation of the arena slot when this handle was issued
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Closed set of element kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// Document root
    Document,
    /// Container of nodes that also exposes ports
    NodeGraph,
    /// Operation node
    Node,
    /// Input port
    Input,
    /// Output port
    Output,
    /// Reusable node definition
    NodeDef,
}

impl ElementKind {
    /// Category given to elements of this kind when none is supplied
    pub fn default_category(&self) -> &'static str {
        match self {
            Self::Document => "materialx",
            Self::NodeGraph => "nodegraph",
            Self::Node => "node",
            Self::Input => "input",
            Self::Output => "output",
            Self::NodeDef => "nodedef",
        }
    }

    /// Input or output port
    pub fn is_port(&self) -> bool {
        matches!(self, Self::Input | Self::Output)
    }

    /// Element that owns nodes
    pub fn is_graph(&self) -> bool {
        matches!(self, Self::Document | Self::NodeGraph)
    }

    /// Check if an element of this kind may own a child of another kind
    pub fn accepts_child(&self, child: ElementKind) -> bool {
        match self {
            Self::Document => !matches!(child, Self::Document),
            Self::NodeGraph => matches!(child, Self::Node | Self::NodeGraph | Self::Input | Self::Output),
            Self::Node | Self::NodeDef => child.is_port(),
            Self::Input | Self::Output => false,
        }
    }
}

/// An element in the document tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub(crate) kind: ElementKind,
    pub(crate) category: String,
    pub(crate) name: String,
    pub(crate) parent: Option<ElementId>,
    pub(crate) children: Vec<ElementId>,
    pub(crate) attributes: IndexMap<String, String>,
    pub(crate) binding: PortBinding,
}

impl Element {
    pub(crate) fn new(
        kind: ElementKind,
        category: impl Into<String>,
        name: impl Into<String>,
        parent: Option<ElementId>,
    ) -> Self {
        Self {
            kind,
            category: category.into(),
            name: name.into(),
            parent,
            children: Vec::new(),
            attributes: IndexMap::new(),
            binding: PortBinding::Unbound,
        }
    }

    /// Element kind
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Category string, the operation name for nodes
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Name, unique among siblings
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning element, `None` for the document root
    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    /// Children in declaration order
    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    /// Attributes in declaration order
    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    /// Get an attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Check if an attribute is present
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Declared data type, if any
    pub fn type_name(&self) -> Option<&str> {
        self.attribute(TYPE_ATTRIBUTE)
    }

    /// Port binding, always [`PortBinding::Unbound`] for non-port elements
    pub fn binding(&self) -> &PortBinding {
        &self.binding
    }

    /// Single-line description with category, name, attributes and binding
    pub fn as_string(&self) -> String {
        let mut res = format!("<{}", self.category);
        if !self.name.is_empty() {
            res.push_str(&format!(" name=\"{}\"", self.name));
        }
        for (key, value) in &self.attributes {
            res.push_str(&format!(" {key}=\"{value}\""));
        }
        for (key, value) in self.binding.attribute_pairs() {
            res.push_str(&format!(" {key}=\"{value}\""));
        }
        res.push('>');
        res
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

/// Check that a name only uses letters, digits, `_` and `:`
pub fn is_valid_name(name: &str) -> bool {
    name.chars().all(is_name_char)
}

/// Replace every character not allowed in names with `_`
pub fn create_valid_name(name: &str) -> String {
    name.chars()
        .map(|c| if is_name_char(c) { c } else { '_' })
        .collect()
}

/// Bump the trailing integer of a name, or append `2` when there is none
pub fn increment_name(name: &str) -> String {
    let split = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map_or(name.len(), |(i, _)| i);
    let (prefix, suffix) = name.split_at(split);
    match suffix.parse::<u64>() {
        Ok(n) => format!("{prefix}{}", n.saturating_add(1)),
        Err(_) => format!("{name}2"),
    }
}
