//! Heap Configuration

use serde::{Deserialize, Serialize};

/// Heap configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// Maximum live nodes (None = unbounded)
    pub max_nodes: Option<usize>,

    /// Maximum live namespace declarations (None = unbounded)
    pub max_namespaces: Option<usize>,

    /// Text and attribute values up to this many bytes are interned in the
    /// document dictionary; longer ones get a private allocation
    pub intern_content_max_len: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            max_nodes: None,
            max_namespaces: None,
            intern_content_max_len: 16,
        }
    }
}
