//! Structural node operations
//!
//! Core node manipulation: unlink, add child, add sibling, free.

use crate::{DocId, NodeId, NsId};

/// Result type for heap operations
pub type XmlResult<T> = Result<T, XmlError>;

/// Heap operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XmlError {
    /// Node handle refers to a freed slot
    #[error("Stale node handle: {0}")]
    StaleNode(NodeId),

    /// Namespace handle refers to a freed declaration
    #[error("Stale namespace handle: {0}")]
    StaleNamespace(NsId),

    /// Document handle refers to a freed document
    #[error("Stale document handle: {0}")]
    StaleDocument(DocId),

    /// A required allocation failed
    #[error("Out of memory allocating {what}")]
    OutOfMemory { what: &'static str },

    /// The prefix is already declared on this element
    #[error("Prefix {prefix:?} already declared on {node}")]
    DuplicatePrefix { node: NodeId, prefix: Option<String> },

    /// Node must be unlinked from its parent first
    #[error("Node {0} is still linked into a tree")]
    StillLinked(NodeId),

    /// Hierarchy error (e.g., a text node as parent)
    #[error("Hierarchy request error")]
    HierarchyRequest,

    /// Invalid node type for this operation
    #[error("Invalid node type")]
    InvalidNodeType,
}

/// Node operations trait
pub trait TreeOperations {
    /// Detach a node from its parent and siblings. The subtree stays intact.
    fn unlink(&mut self, node: NodeId) -> XmlResult<()>;

    /// Append `node` as the last child of `parent`
    fn add_child(&mut self, parent: NodeId, node: NodeId) -> XmlResult<()>;

    /// Insert `node` directly after `cur`
    fn add_next_sibling(&mut self, cur: NodeId, node: NodeId) -> XmlResult<()>;

    /// Insert `node` directly before `cur`
    fn add_prev_sibling(&mut self, cur: NodeId, node: NodeId) -> XmlResult<()>;

    /// Release a parentless node and its whole subtree.
    /// Returns the number of nodes freed.
    fn free_node(&mut self, node: NodeId) -> XmlResult<usize>;
}
