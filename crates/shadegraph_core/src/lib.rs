// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shading node graph documents and their traversals.
//!
//! A [`Document`] is a single tree of elements: node graphs holding nodes,
//! nodes holding input and output ports, and node definitions that may
//! inherit from one another. Three traversals view the same document:
//!
//! - [`TreeIterator`] walks the ownership tree depth-first in pre-order
//! - [`GraphIterator`] follows dataflow connections upstream from an element
//! - [`InheritanceIterator`] follows the definition inheritance chain
//!
//! ## Architecture
//!
//! Elements live in an arena addressed by [`ElementId`] handles. Connections
//! are stored by name and resolved against the document on every step, so a
//! traversal reflects edits made between steps. The `*Walk` types hold the
//! traversal state without borrowing the document for that purpose.

pub mod definition;
pub mod document;
pub mod element;
pub mod node;
pub mod port;
pub mod topology;
pub mod traversal;
pub mod validation;

pub use document::{Document, DocumentError, DOCUMENT_VERSION};
pub use element::{Element, ElementId, ElementKind};
pub use port::{PortBinding, PortType, PortValue};
pub use topology::TopologyError;
pub use traversal::{
    AncestorIterator, Edge, GraphIterator, GraphWalk, InheritanceIterator, InheritanceWalk,
    TraversalError, TreeIterator, TreeWalk,
};
pub use validation::{IssueKind, ValidationIssue, ValidationReport};
