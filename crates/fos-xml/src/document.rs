//! Document - per-document state held by the heap

use std::sync::Arc;

use crate::{Dict, NodeId, NsId};

/// Document record
#[derive(Debug)]
pub struct DocumentData {
    /// The document node (type Document or HtmlDocument)
    pub(crate) node: NodeId,
    /// Interning table, possibly shared with other documents
    pub(crate) dict: Arc<Dict>,
    /// Implicit declaration of the `xml` prefix
    pub(crate) xml_ns: NsId,
    pub(crate) prefixes: PrefixCounter,
}

impl DocumentData {
    /// The document node
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn dict(&self) -> &Arc<Dict> {
        &self.dict
    }

    /// Declaration every node of this document sees for the `xml` prefix
    pub fn xml_ns(&self) -> NsId {
        self.xml_ns
    }

    pub fn prefix_counter(&self) -> &PrefixCounter {
        &self.prefixes
    }
}

/// Generator for synthetic namespace prefixes (`ns0`, `ns1`, ...)
///
/// When the counter wraps, an `A` is appended to every later prefix so
/// previously issued names are not repeated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixCounter {
    counter: u32,
    tail: String,
}

impl PrefixCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a given counter value
    pub fn starting_at(counter: u32) -> Self {
        Self {
            counter,
            tail: String::new(),
        }
    }

    /// Produce the next prefix
    pub fn next_prefix(&mut self) -> String {
        let prefix = format!("ns{}{}", self.counter, self.tail);
        match self.counter.checked_add(1) {
            Some(next) => self.counter = next,
            None => {
                self.counter = 0;
                self.tail.push('A');
            }
        }
        prefix
    }
}
