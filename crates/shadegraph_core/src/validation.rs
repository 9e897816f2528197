// SPDX-License-Identifier: MIT OR Apache-2.0
//! Document consistency checks.

use crate::document::{Document, DOCUMENT_VERSION};
use crate::element::{
    is_valid_name, Element, ElementId, ElementKind, INHERIT_ATTRIBUTE, UNIT_ATTRIBUTE,
    UNIT_TYPE_ATTRIBUTE, VERSION_ATTRIBUTE,
};
use crate::port::{PortBinding, PortType};

/// Kind of problem found by validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// Name uses characters outside letters, digits, `_` and `:`
    InvalidName,
    /// Document version older than the supported one
    UnsupportedVersion,
    /// Document version newer than the supported one
    FutureVersion,
    /// Node graph carrying its own version
    GraphVersion,
    /// Node without a category
    MissingCategory,
    /// Node without a type
    MissingType,
    /// Connection that does not resolve
    InvalidConnection,
    /// Connection to a named output that does not exist
    MissingOutput,
    /// Connection whose upstream type differs from the port type
    MismatchedTypes,
    /// Unit given without a unit type
    MissingUnitType,
    /// Upstream dataflow loops back on itself
    UpstreamCycle,
    /// Inheritance from a missing element or one of another kind
    InvalidInheritance,
    /// Inheritance chain loops back on itself
    InheritanceCycle,
    /// Traversal could not complete
    TraversalFault,
}

impl IssueKind {
    /// Short human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidName => "Invalid element name",
            Self::UnsupportedVersion => "Unsupported document version",
            Self::FutureVersion => "Future document version",
            Self::GraphVersion => "NodeGraph elements do not support version strings",
            Self::MissingCategory => "Node element is missing a category",
            Self::MissingType => "Node element is missing a type",
            Self::InvalidConnection => "Invalid port connection",
            Self::MissingOutput => "No output found for port connection",
            Self::MismatchedTypes => "Mismatched types in port connection",
            Self::MissingUnitType => "Unit attribute without a unit type",
            Self::UpstreamCycle => "Cycle in upstream path",
            Self::InvalidInheritance => "Invalid element inheritance",
            Self::InheritanceCycle => "Cycle in element inheritance chain",
            Self::TraversalFault => "Traversal failed",
        }
    }
}

/// A single validation problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Element the problem was found on
    pub element: ElementId,
    /// Problem kind
    pub kind: IssueKind,
    /// Description followed by the element
    pub message: String,
}

/// Every problem found in one validation pass
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Check if no problem was found
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Problems in the order they were found
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// First problem found
    pub fn first(&self) -> Option<&ValidationIssue> {
        self.issues.first()
    }

    /// Check if a problem of the given kind was found
    pub fn has(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|issue| issue.kind == kind)
    }

    /// All messages, one per line
    pub fn message(&self) -> String {
        self.issues
            .iter()
            .map(|issue| issue.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn require(&mut self, expression: bool, element: ElementId, data: &Element, kind: IssueKind) {
        if !expression {
            self.push(element, data, kind, None);
        }
    }

    fn push(&mut self, element: ElementId, data: &Element, kind: IssueKind, detail: Option<String>) {
        let mut message = format!("{}: {}", kind.description(), data.as_string());
        if let Some(detail) = detail {
            message.push_str(&format!(" ({detail})"));
        }
        tracing::debug!("{}", message);
        self.issues.push(ValidationIssue { element, kind, message });
    }
}

impl Document {
    /// Check the whole document, collecting every problem in one pass
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        for element in self.traverse_tree(self.root()) {
            let id = match element {
                Ok(id) => id,
                Err(err) => {
                    tracing::warn!("Validation traversal failed: {}", err);
                    if let Ok(root) = self.element(self.root()) {
                        report.push(self.root(), root, IssueKind::TraversalFault, Some(err.to_string()));
                    }
                    break;
                }
            };
            let Ok(data) = self.element(id) else {
                continue;
            };

            report.require(is_valid_name(data.name()), id, data, IssueKind::InvalidName);
            match data.kind() {
                ElementKind::Document => self.validate_version(id, data, &mut report),
                ElementKind::NodeGraph => {
                    report.require(!data.has_attribute(VERSION_ATTRIBUTE), id, data, IssueKind::GraphVersion);
                }
                ElementKind::Node => {
                    report.require(!data.category().is_empty(), id, data, IssueKind::MissingCategory);
                    report.require(data.type_name().is_some(), id, data, IssueKind::MissingType);
                }
                ElementKind::Input | ElementKind::Output => self.validate_port(id, data, &mut report),
                ElementKind::NodeDef => self.validate_inheritance(id, data, &mut report),
            }
        }

        if report.is_valid() {
            tracing::info!("Document is valid");
        } else {
            tracing::warn!("Document has {} validation issue(s)", report.issues.len());
        }
        report
    }

    fn validate_version(&self, id: ElementId, data: &Element, report: &mut ValidationReport) {
        match self.version() {
            Some(version) => {
                report.require(version >= DOCUMENT_VERSION, id, data, IssueKind::UnsupportedVersion);
                report.require(version <= DOCUMENT_VERSION, id, data, IssueKind::FutureVersion);
            }
            None => report.push(id, data, IssueKind::UnsupportedVersion, None),
        }
    }

    fn validate_port(&self, id: ElementId, data: &Element, report: &mut ValidationReport) {
        report.require(
            !data.has_attribute(UNIT_ATTRIBUTE) || data.has_attribute(UNIT_TYPE_ATTRIBUTE),
            id,
            data,
            IssueKind::MissingUnitType,
        );

        if data.binding().is_connected() {
            match self.connected_element(id) {
                Ok(Some(upstream)) => self.validate_connection_type(id, data, upstream, report),
                Ok(None) => {}
                Err(err) => {
                    let kind = match data.binding() {
                        PortBinding::Output { .. } => IssueKind::MissingOutput,
                        _ => IssueKind::InvalidConnection,
                    };
                    report.push(id, data, kind, Some(err.to_string()));
                }
            }
        }

        // Node inputs are covered by the graph outputs and interface ports downstream of them
        let on_node = data
            .parent()
            .and_then(|parent| self.kind(parent).ok())
            .is_some_and(|kind| matches!(kind, ElementKind::Node | ElementKind::NodeDef));
        if !on_node {
            if let Ok(true) = self.has_upstream_cycle(id) {
                report.push(id, data, IssueKind::UpstreamCycle, None);
            }
        }
    }

    fn validate_connection_type(
        &self,
        id: ElementId,
        data: &Element,
        upstream: ElementId,
        report: &mut ValidationReport,
    ) {
        let Ok(port_type) = self.port_type(id) else {
            return;
        };
        let Ok(mut upstream_type) = self.port_type(upstream) else {
            return;
        };

        if let PortBinding::Node { output: Some(output), .. } = data.binding() {
            if upstream_type == PortType::MultiOutput {
                match self.output(upstream, output) {
                    Ok(Some(output)) => {
                        if let Ok(output_type) = self.port_type(output) {
                            upstream_type = output_type;
                        }
                    }
                    _ => {
                        report.push(id, data, IssueKind::MissingOutput, Some(format!("output '{output}'")));
                        return;
                    }
                }
            }
        }

        if !port_type.can_connect_to(&upstream_type) {
            report.push(
                id,
                data,
                IssueKind::MismatchedTypes,
                Some(format!("{port_type} fed by {upstream_type}")),
            );
        }
    }

    fn validate_inheritance(&self, id: ElementId, data: &Element, report: &mut ValidationReport) {
        if !data.has_attribute(INHERIT_ATTRIBUTE) {
            return;
        }
        match self.inherits_from(id) {
            Ok(Some(_)) => {}
            Ok(None) => report.push(id, data, IssueKind::InvalidInheritance, None),
            Err(err) => {
                report.push(id, data, IssueKind::InvalidInheritance, Some(err.to_string()));
                return;
            }
        }
        match self.has_inheritance_cycle(id) {
            Ok(true) => report.push(id, data, IssueKind::InheritanceCycle, None),
            Ok(false) => {}
            Err(err) => report.push(id, data, IssueKind::TraversalFault, Some(err.to_string())),
        }
    }
}
