// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tree, dataflow and inheritance traversal.
//!
//! Each traversal comes in two layers:
//! - a *walk* ([`TreeWalk`], [`GraphWalk`], [`InheritanceWalk`]) holding only
//!   traversal state, advanced with an explicit `&Document`. Nothing is
//!   snapshotted, so the document may be edited between steps and each step
//!   observes the current state.
//! - a borrowing iterator ([`TreeIterator`], [`GraphIterator`],
//!   [`InheritanceIterator`]) yielding `Result<T, TraversalError>`.
//!
//! Exhaustion is `None`. A `Some(Err(..))` is a structural fault (removed
//! element, dangling connection) and ends the traversal.

use crate::document::{Document, DocumentError};
use crate::element::{ElementId, ElementKind};
use std::collections::{HashMap, HashSet};
use std::iter::FusedIterator;
use thiserror::Error;

/// Traversal errors
#[derive(Debug, Error)]
pub enum TraversalError {
    /// The starting element is not part of the document
    #[error("Traversal root {0} is not in the document")]
    DetachedRoot(ElementId),

    /// An element on the traversal stack was removed between steps
    #[error("Element {0} was removed during traversal")]
    ElementRemoved(ElementId),

    /// A connection or inheritance reference could not be resolved
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Result type for traversal steps
pub type Result<T> = std::result::Result<T, TraversalError>;

fn removed(id: ElementId) -> impl FnOnce(DocumentError) -> TraversalError {
    move |err| match err {
        DocumentError::StaleElement(_) => TraversalError::ElementRemoved(id),
        other => TraversalError::Document(other),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    Pending,
    Active,
    Finished,
}

/// One hop of a dataflow traversal.
///
/// The connecting element is the input through which the upstream element
/// is reached, absent when the downstream element is itself a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    downstream: ElementId,
    connecting: Option<ElementId>,
    upstream: ElementId,
}

impl Edge {
    /// Create an edge
    pub fn new(downstream: ElementId, connecting: Option<ElementId>, upstream: ElementId) -> Self {
        Self { downstream, connecting, upstream }
    }

    /// Downstream element of the edge
    pub fn downstream_element(&self) -> ElementId {
        self.downstream
    }

    /// Connecting element of the edge, if any
    pub fn connecting_element(&self) -> Option<ElementId> {
        self.connecting
    }

    /// Upstream element of the edge
    pub fn upstream_element(&self) -> ElementId {
        self.upstream
    }
}

impl Document {
    /// Number of upstream edge slots of an element.
    ///
    /// Nodes have one slot per input. Ports have a single slot for their own
    /// connection. Other elements have none.
    pub fn upstream_edge_count(&self, id: ElementId) -> std::result::Result<usize, DocumentError> {
        Ok(match self.kind(id)? {
            ElementKind::Node => self.inputs(id)?.len(),
            ElementKind::Input | ElementKind::Output => 1,
            _ => 0,
        })
    }

    /// Resolve one upstream edge slot, `None` when the slot is unconnected
    pub fn upstream_edge(&self, id: ElementId, index: usize) -> std::result::Result<Option<Edge>, DocumentError> {
        match self.kind(id)? {
            ElementKind::Node => {
                let Some(input) = self.inputs(id)?.get(index).copied() else {
                    return Ok(None);
                };
                Ok(self
                    .connected_element(input)?
                    .map(|upstream| Edge::new(id, Some(input), upstream)))
            }
            ElementKind::Input | ElementKind::Output if index == 0 => Ok(self
                .connected_element(id)?
                .map(|upstream| Edge::new(id, None, upstream))),
            _ => Ok(None),
        }
    }

    /// Pre-order traversal of an element and its descendants
    pub fn traverse_tree(&self, root: ElementId) -> TreeIterator<'_> {
        TreeIterator { doc: self, walk: TreeWalk::new(root) }
    }

    /// Depth-first traversal of the dataflow upstream of an element
    pub fn traverse_graph(&self, root: ElementId) -> GraphIterator<'_> {
        GraphIterator { doc: self, walk: GraphWalk::new(root) }
    }

    /// Walk of the definitions an element inherits from, nearest first
    pub fn traverse_inheritance(&self, root: ElementId) -> InheritanceIterator<'_> {
        InheritanceIterator { doc: self, walk: InheritanceWalk::new(root) }
    }

    /// Check if any upstream path from an element revisits an element already on it
    pub fn has_upstream_cycle(&self, id: ElementId) -> Result<bool> {
        let mut walk = GraphWalk::new(id);
        while walk.advance(self)?.is_some() {}
        Ok(walk.found_cycle())
    }

    /// Check if an element's inheritance chain loops back on itself
    pub fn has_inheritance_cycle(&self, id: ElementId) -> Result<bool> {
        let mut walk = InheritanceWalk::new(id);
        while walk.advance(self)?.is_some() {}
        Ok(walk.found_cycle())
    }
}

/// State of a pre-order tree traversal
#[derive(Debug, Clone)]
pub struct TreeWalk {
    root: ElementId,
    current: Option<ElementId>,
    stack: Vec<(ElementId, usize)>,
    prune: bool,
    state: WalkState,
}

impl TreeWalk {
    /// Create a walk positioned before `root`
    pub fn new(root: ElementId) -> Self {
        Self {
            root,
            current: None,
            stack: Vec::new(),
            prune: false,
            state: WalkState::Pending,
        }
    }

    /// Move to the next element in pre-order
    pub fn advance(&mut self, doc: &Document) -> Result<Option<ElementId>> {
        let step = self.step(doc);
        match &step {
            Ok(None) | Err(_) => self.finish(),
            Ok(Some(_)) => {}
        }
        step
    }

    fn finish(&mut self) {
        self.state = WalkState::Finished;
        self.current = None;
        self.stack.clear();
    }

    fn step(&mut self, doc: &Document) -> Result<Option<ElementId>> {
        match self.state {
            WalkState::Finished => return Ok(None),
            WalkState::Pending => {
                if !doc.contains(self.root) {
                    return Err(TraversalError::DetachedRoot(self.root));
                }
                // A prune request made before the first step has no subtree to apply to.
                self.prune = false;
                self.state = WalkState::Active;
                self.current = Some(self.root);
                return Ok(self.current);
            }
            WalkState::Active => {}
        }

        if let Some(current) = self.current {
            if self.prune {
                self.prune = false;
                tracing::trace!("Pruned subtree at {}", current);
            } else {
                let element = doc.element(current).map_err(removed(current))?;
                if let Some(&first) = element.children().first() {
                    self.stack.push((current, 0));
                    self.current = Some(first);
                    return Ok(self.current);
                }
            }
        }

        while let Some((parent, index)) = self.stack.last_mut() {
            let siblings = doc.element(*parent).map_err(removed(*parent))?.children();
            if *index + 1 < siblings.len() {
                *index += 1;
                self.current = Some(siblings[*index]);
                return Ok(self.current);
            }
            self.stack.pop();
        }
        Ok(None)
    }

    /// Element returned by the last step
    pub fn element(&self) -> Option<ElementId> {
        self.current
    }

    /// Depth of the current element, the root being at depth zero
    pub fn element_depth(&self) -> usize {
        self.stack.len()
    }

    /// Skip the children of the current element on the next step
    pub fn set_prune_subtree(&mut self, prune: bool) {
        self.prune = prune;
    }

    /// Whether the current subtree will be skipped
    pub fn prune_subtree(&self) -> bool {
        self.prune
    }
}

/// State of an upstream dataflow traversal
#[derive(Debug, Clone)]
pub struct GraphWalk {
    root: ElementId,
    edge: Option<Edge>,
    path: HashMap<ElementId, ElementKind>,
    stack: Vec<(ElementId, usize)>,
    prune: bool,
    state: WalkState,
    cycle: Option<Edge>,
}

impl GraphWalk {
    /// Create a walk positioned before the first upstream edge of `root`
    pub fn new(root: ElementId) -> Self {
        Self {
            root,
            edge: None,
            path: HashMap::new(),
            stack: Vec::new(),
            prune: false,
            state: WalkState::Pending,
            cycle: None,
        }
    }

    /// Move to the next upstream edge
    pub fn advance(&mut self, doc: &Document) -> Result<Option<Edge>> {
        let step = self.step(doc);
        match &step {
            Ok(None) | Err(_) => self.finish(),
            Ok(Some(_)) => {}
        }
        step
    }

    fn finish(&mut self) {
        self.state = WalkState::Finished;
        self.edge = None;
        self.path.clear();
        self.stack.clear();
    }

    fn step(&mut self, doc: &Document) -> Result<Option<Edge>> {
        let current = match self.state {
            WalkState::Finished => return Ok(None),
            WalkState::Pending => {
                let kind = doc
                    .kind(self.root)
                    .map_err(|_| TraversalError::DetachedRoot(self.root))?;
                self.prune = false;
                self.state = WalkState::Active;
                self.path.insert(self.root, kind);
                self.root
            }
            WalkState::Active => match self.edge.take() {
                Some(edge) => edge.upstream_element(),
                None => return Ok(None),
            },
        };

        // Descend from the element reached last, unless its subgraph is pruned.
        if self.prune {
            self.prune = false;
            self.path.remove(&current);
            tracing::trace!("Pruned subgraph at {}", current);
        } else {
            self.stack.push((current, 0));
        }

        while let Some(&mut (downstream, ref mut next_index)) = self.stack.last_mut() {
            let count = doc.upstream_edge_count(downstream).map_err(removed(downstream))?;
            while *next_index < count {
                let index = *next_index;
                *next_index += 1;
                let Some(edge) = doc.upstream_edge(downstream, index).map_err(removed(downstream))? else {
                    continue;
                };
                let upstream = edge.upstream_element();
                if self.path.contains_key(&upstream) {
                    tracing::debug!("Found cycle at {} upstream of {}", upstream, downstream);
                    self.cycle.get_or_insert(edge);
                    continue;
                }
                let kind = doc.kind(upstream).map_err(removed(upstream))?;
                self.path.insert(upstream, kind);
                self.edge = Some(edge);
                return Ok(Some(edge));
            }

            // Every upstream edge of this element is done; return downstream.
            self.stack.pop();
            self.path.remove(&downstream);
        }
        Ok(None)
    }

    /// Edge returned by the last step
    pub fn edge(&self) -> Option<Edge> {
        self.edge
    }

    /// Index of the current edge among the downstream element's edge slots
    pub fn upstream_index(&self) -> usize {
        self.stack.last().map_or(0, |&(_, next)| next.saturating_sub(1))
    }

    /// Number of edges between the root and the current upstream element
    pub fn element_depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of nodes on the path from the root to the current upstream element
    pub fn node_depth(&self) -> usize {
        self.path.values().filter(|&&kind| kind == ElementKind::Node).count()
    }

    /// Skip everything upstream of the current edge's upstream element on the next step
    pub fn set_prune_subgraph(&mut self, prune: bool) {
        self.prune = prune;
    }

    /// Whether the current subgraph will be skipped
    pub fn prune_subgraph(&self) -> bool {
        self.prune
    }

    /// Check if an edge closing a cycle has been met so far
    pub fn found_cycle(&self) -> bool {
        self.cycle.is_some()
    }

    /// First edge met that leads back onto the current path
    pub fn cycle_edge(&self) -> Option<Edge> {
        self.cycle
    }
}

/// State of an inheritance chain walk
#[derive(Debug, Clone)]
pub struct InheritanceWalk {
    root: ElementId,
    current: ElementId,
    visited: HashSet<ElementId>,
    state: WalkState,
    cycle: Option<ElementId>,
}

impl InheritanceWalk {
    /// Create a walk positioned at `root`, which is not itself returned
    pub fn new(root: ElementId) -> Self {
        Self {
            root,
            current: root,
            visited: HashSet::new(),
            state: WalkState::Pending,
            cycle: None,
        }
    }

    /// Move to the next ancestor definition
    pub fn advance(&mut self, doc: &Document) -> Result<Option<ElementId>> {
        let step = self.step(doc);
        match &step {
            Ok(None) | Err(_) => self.state = WalkState::Finished,
            Ok(Some(_)) => {}
        }
        step
    }

    fn step(&mut self, doc: &Document) -> Result<Option<ElementId>> {
        match self.state {
            WalkState::Finished => return Ok(None),
            WalkState::Pending => {
                if !doc.contains(self.root) {
                    return Err(TraversalError::DetachedRoot(self.root));
                }
                self.state = WalkState::Active;
                self.visited.insert(self.root);
            }
            WalkState::Active => {}
        }

        let Some(parent) = doc.inherits_from(self.current).map_err(removed(self.current))? else {
            return Ok(None);
        };
        if !self.visited.insert(parent) {
            tracing::debug!("Found inheritance cycle at {} from {}", parent, self.current);
            self.cycle = Some(parent);
            return Ok(None);
        }
        self.current = parent;
        Ok(Some(parent))
    }

    /// Check if the chain was found to loop back on itself
    pub fn found_cycle(&self) -> bool {
        self.cycle.is_some()
    }

    /// Element that was about to be revisited when the cycle was found
    pub fn cycle_element(&self) -> Option<ElementId> {
        self.cycle
    }
}

/// Iterator over a pre-order tree traversal
#[derive(Debug)]
pub struct TreeIterator<'a> {
    doc: &'a Document,
    walk: TreeWalk,
}

impl<'a> TreeIterator<'a> {
    /// Depth of the current element, the root being at depth zero
    pub fn element_depth(&self) -> usize {
        self.walk.element_depth()
    }

    /// Skip the children of the current element
    pub fn set_prune_subtree(&mut self, prune: bool) {
        self.walk.set_prune_subtree(prune);
    }

    /// Whether the current subtree will be skipped
    pub fn prune_subtree(&self) -> bool {
        self.walk.prune_subtree()
    }

    /// Release the document borrow, keeping the traversal state
    pub fn into_walk(self) -> TreeWalk {
        self.walk
    }
}

impl Iterator for TreeIterator<'_> {
    type Item = Result<ElementId>;

    fn next(&mut self) -> Option<Self::Item> {
        self.walk.advance(self.doc).transpose()
    }
}

impl FusedIterator for TreeIterator<'_> {}

/// Iterator over the upstream edges of a dataflow traversal
#[derive(Debug)]
pub struct GraphIterator<'a> {
    doc: &'a Document,
    walk: GraphWalk,
}

impl<'a> GraphIterator<'a> {
    /// Number of edges between the root and the current upstream element
    pub fn element_depth(&self) -> usize {
        self.walk.element_depth()
    }

    /// Number of nodes on the path from the root to the current upstream element
    pub fn node_depth(&self) -> usize {
        self.walk.node_depth()
    }

    /// Index of the current edge among the downstream element's edge slots
    pub fn upstream_index(&self) -> usize {
        self.walk.upstream_index()
    }

    /// Skip everything upstream of the current edge's upstream element
    pub fn set_prune_subgraph(&mut self, prune: bool) {
        self.walk.set_prune_subgraph(prune);
    }

    /// Whether the current subgraph will be skipped
    pub fn prune_subgraph(&self) -> bool {
        self.walk.prune_subgraph()
    }

    /// Check if a cycle has been met so far
    pub fn found_cycle(&self) -> bool {
        self.walk.found_cycle()
    }

    /// First edge met that leads back onto the current path
    pub fn cycle_edge(&self) -> Option<Edge> {
        self.walk.cycle_edge()
    }

    /// Release the document borrow, keeping the traversal state
    pub fn into_walk(self) -> GraphWalk {
        self.walk
    }
}

impl Iterator for GraphIterator<'_> {
    type Item = Result<Edge>;

    fn next(&mut self) -> Option<Self::Item> {
        self.walk.advance(self.doc).transpose()
    }
}

impl FusedIterator for GraphIterator<'_> {}

/// Iterator over the ancestors in an inheritance chain
#[derive(Debug)]
pub struct InheritanceIterator<'a> {
    doc: &'a Document,
    walk: InheritanceWalk,
}

impl<'a> InheritanceIterator<'a> {
    /// Check if the chain was found to loop back on itself
    pub fn found_cycle(&self) -> bool {
        self.walk.found_cycle()
    }

    /// Release the document borrow, keeping the traversal state
    pub fn into_walk(self) -> InheritanceWalk {
        self.walk
    }
}

impl Iterator for InheritanceIterator<'_> {
    type Item = Result<ElementId>;

    fn next(&mut self) -> Option<Self::Item> {
        self.walk.advance(self.doc).transpose()
    }
}

impl FusedIterator for InheritanceIterator<'_> {}

/// Iterator over an element and its ancestors up to the document root
#[derive(Debug)]
pub struct AncestorIterator<'a> {
    doc: &'a Document,
    next: Option<ElementId>,
}

impl<'a> AncestorIterator<'a> {
    pub(crate) fn new(doc: &'a Document, start: ElementId) -> Self {
        Self { doc, next: Some(start) }
    }
}

impl Iterator for AncestorIterator<'_> {
    type Item = ElementId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.parent(current).ok().flatten();
        Some(current)
    }
}

impl FusedIterator for AncestorIterator<'_> {}
