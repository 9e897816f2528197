// SPDX-License-Identifier: MIT OR Apache-2.0
//! Inspector errors.

use shadegraph_core::{DocumentError, TraversalError};
use thiserror::Error;

/// Inspector errors
#[derive(Debug, Error)]
pub enum InspectError {
    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("Invalid config: {0}")]
    Config(#[from] ron::error::SpannedError),

    /// Document could not be loaded or queried
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Traversal failed while building the report
    #[error(transparent)]
    Traversal(#[from] TraversalError),

    /// Report could not be written as JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for inspector operations
pub type Result<T> = std::result::Result<T, InspectError>;
