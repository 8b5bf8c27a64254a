//! Proxy layer errors

use fos_xml::{NodeId, XmlError};

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Proxy layer errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    /// The node already has a proxy, or the proxy already represents a node
    #[error("Double registering proxy for {node}")]
    DoubleRegistration { node: NodeId },

    /// The node's slot does not hold this proxy
    #[error("Tried to unregister unknown proxy {proxy:#x}")]
    UnknownProxy { proxy: usize },

    /// The proxy no longer represents a live node
    #[error("Invalid proxy: no live node")]
    InvalidProxy,

    /// A required allocation failed
    #[error("Out of memory allocating {what}")]
    OutOfMemory { what: &'static str },

    /// The operation would create a cycle or an invalid tree shape
    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(&'static str),

    /// The prefix format is reserved for generated prefixes
    #[error("Prefix format reserved for internal use: {0}")]
    ReservedPrefix(String),

    #[error(transparent)]
    Tree(XmlError),
}

impl From<XmlError> for ProxyError {
    fn from(err: XmlError) -> Self {
        match err {
            XmlError::OutOfMemory { what } => ProxyError::OutOfMemory { what },
            XmlError::HierarchyRequest => ProxyError::HierarchyRequest("invalid parent"),
            other => ProxyError::Tree(other),
        }
    }
}
