//! Error types for the core tree crate.

use crate::op::NodeId;
use thiserror::Error;

/// Errors that can occur when editing the tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Unknown parent: {0}")]
    UnknownParent(NodeId),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),
}

pub type Result<T> = std::result::Result<T, TreeError>;
