// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port data types, literal values and connection bindings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data type that can flow through ports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// Boolean value
    Boolean,
    /// Integer value
    Integer,
    /// Floating point value
    Float,
    /// RGB color
    Color3,
    /// RGBA color
    Color4,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// 3x3 matrix
    Matrix33,
    /// 4x4 matrix
    Matrix44,
    /// String value
    String,
    /// File path
    Filename,
    /// Surface shader closure
    Surfaceshader,
    /// Material
    Material,
    /// Node with several outputs
    MultiOutput,
    /// Custom type
    Custom(String),
}

impl PortType {
    /// Type assigned to nodes and ports that do not declare one
    pub const DEFAULT: PortType = PortType::Color3;

    /// Parse a type string such as `color3` or `vector2`
    pub fn parse(name: &str) -> Self {
        match name {
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "float" => Self::Float,
            "color3" => Self::Color3,
            "color4" => Self::Color4,
            "vector2" => Self::Vector2,
            "vector3" => Self::Vector3,
            "vector4" => Self::Vector4,
            "matrix33" => Self::Matrix33,
            "matrix44" => Self::Matrix44,
            "string" => Self::String,
            "filename" => Self::Filename,
            "surfaceshader" => Self::Surfaceshader,
            "material" => Self::Material,
            "multioutput" => Self::MultiOutput,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Get the type string
    pub fn as_str(&self) -> &str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Color3 => "color3",
            Self::Color4 => "color4",
            Self::Vector2 => "vector2",
            Self::Vector3 => "vector3",
            Self::Vector4 => "vector4",
            Self::Matrix33 => "matrix33",
            Self::Matrix44 => "matrix44",
            Self::String => "string",
            Self::Filename => "filename",
            Self::Surfaceshader => "surfaceshader",
            Self::Material => "material",
            Self::MultiOutput => "multioutput",
            Self::Custom(name) => name,
        }
    }

    /// Check if a port of this type can be fed by an upstream element of another type
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        // Multi-output nodes are checked per output, not per node
        if matches!(self, Self::MultiOutput) || matches!(other, Self::MultiOutput) {
            return true;
        }
        self == other
    }
}

impl Default for PortType {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<&str> for PortType {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value that can be stored in a port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    /// Boolean
    Boolean(bool),
    /// Integer
    Integer(i32),
    /// Float
    Float(f32),
    /// RGB color
    Color3([f32; 3]),
    /// RGBA color
    Color4([f32; 4]),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// String
    String(String),
    /// File path
    Filename(String),
}

impl PortValue {
    /// Get the port type for this value
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Boolean(_) => PortType::Boolean,
            Self::Integer(_) => PortType::Integer,
            Self::Float(_) => PortType::Float,
            Self::Color3(_) => PortType::Color3,
            Self::Color4(_) => PortType::Color4,
            Self::Vector2(_) => PortType::Vector2,
            Self::Vector3(_) => PortType::Vector3,
            Self::Vector4(_) => PortType::Vector4,
            Self::String(_) => PortType::String,
            Self::Filename(_) => PortType::Filename,
        }
    }
}

fn write_components(f: &mut fmt::Formatter<'_>, components: &[f32]) -> fmt::Result {
    for (i, c) in components.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Color3(v) | Self::Vector3(v) => write_components(f, v),
            Self::Color4(v) | Self::Vector4(v) => write_components(f, v),
            Self::Vector2(v) => write_components(f, v),
            Self::String(v) | Self::Filename(v) => f.write_str(v),
        }
    }
}

/// What a port is bound to.
///
/// A port holds either a literal value or a single upstream connection,
/// never both. Connections are stored by name and resolved against the
/// port's graph scope each time they are read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum PortBinding {
    /// Neither a value nor a connection
    #[default]
    Unbound,
    /// Literal value
    Value(PortValue),
    /// Connected to a sibling node, optionally to one of its named outputs
    Node {
        /// Upstream node name
        node: String,
        /// Output of a multi-output node
        output: Option<String>,
    },
    /// Connected to a graph output, either a sibling or one owned by a sibling node graph
    Output {
        /// Sibling node graph owning the output, if not in the same scope
        graph: Option<String>,
        /// Output name
        output: String,
    },
}

impl PortBinding {
    /// Check if this binding refers to an upstream element
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Node { .. } | Self::Output { .. })
    }

    /// Get the literal value, if any
    pub fn value(&self) -> Option<&PortValue> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Describe the binding as attribute pairs for display
    pub(crate) fn attribute_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Unbound => Vec::new(),
            Self::Value(value) => vec![("value", value.to_string())],
            Self::Node { node, output } => {
                let mut pairs = vec![("nodename", node.clone())];
                if let Some(output) = output {
                    pairs.push(("output", output.clone()));
                }
                pairs
            }
            Self::Output { graph, output } => {
                let mut pairs = Vec::new();
                if let Some(graph) = graph {
                    pairs.push(("nodegraph", graph.clone()));
                }
                pairs.push(("output", output.clone()));
                pairs
            }
        }
    }
}
