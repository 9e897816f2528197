// SPDX-License-Identifier: MIT OR Apache-2.0
//! Inspector settings and command line.

use crate::error::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory
pub const CONFIG_FILE_NAME: &str = "shadegraph.ron";

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Inspector settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    /// List the document tree
    pub show_tree: bool,
    /// List upstream edges of every graph output
    pub show_graph: bool,
    /// List inheritance chains of node definitions
    pub show_inheritance: bool,
    /// Render each node graph in DOT format
    pub emit_dot: bool,
    /// Prune tree and graph walks below this element depth
    pub max_depth: Option<usize>,
    /// Categories whose subtrees and upstream subgraphs are not descended
    pub prune_categories: Vec<String>,
    /// Output format
    pub format: ReportFormat,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            show_tree: true,
            show_graph: true,
            show_inheritance: true,
            emit_dot: false,
            max_depth: None,
            prune_categories: Vec::new(),
            format: ReportFormat::Text,
        }
    }
}

impl InspectConfig {
    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&content)?)
    }

    /// Load the explicit config, else the one in `dir`, else defaults
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::debug!("Loading config from {}", path.display());
            return Self::load(path);
        }
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            tracing::debug!("Loading config from {}", candidate.display());
            return Self::load(&candidate);
        }
        Ok(Self::default())
    }

    /// Check whether walks should not descend past an element
    pub fn prunes(&self, category: &str, depth: usize) -> bool {
        self.max_depth.is_some_and(|max| depth >= max)
            || self.prune_categories.iter().any(|c| c == category)
    }
}

/// Inspect a shading graph document
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "shadegraph-inspect")]
#[command(version)]
#[command(about = "Validate a shading graph document and report its traversals")]
pub struct Args {
    /// Document to inspect (RON)
    pub document: PathBuf,

    /// Settings file, instead of `shadegraph.ron` in the working directory
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Include a DOT rendering of every node graph
    #[arg(long)]
    pub dot: bool,
}

impl Args {
    /// Apply command line overrides to loaded settings
    pub fn apply(&self, config: &mut InspectConfig) {
        if self.json {
            config.format = ReportFormat::Json;
        }
        if self.dot {
            config.emit_dot = true;
        }
    }
}
