//! String dictionary - Deduplicate names and short content
//!
//! Element names, attribute names, namespace strings and short text are
//! stored once per dictionary and handed out as `Arc<str>`. Equal strings
//! from the same dictionary share one allocation, so "does this dictionary
//! own that string" is a pointer comparison, not a content comparison.
//!
//! A dictionary may be shared by several documents (`Arc<Dict>`). Entries
//! are only ever added, never changed, so readers proceed concurrently while
//! insertions are serialised by the table's lock.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{XmlError, XmlResult};

/// Interning table shared by one or more documents
#[derive(Debug, Default)]
pub struct Dict {
    entries: RwLock<HashSet<Arc<str>>>,
    /// Maximum number of entries (None = unbounded)
    limit: Option<usize>,
}

impl Dict {
    /// Create an empty, unbounded dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dictionary that refuses to grow past `limit` entries
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(HashSet::new()),
            limit,
        }
    }

    /// Convenience constructor for the shared form
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Intern a string, returning the dictionary's copy.
    /// If the string is already interned, returns the existing entry.
    pub fn intern(&self, s: &str) -> XmlResult<Arc<str>> {
        if let Some(existing) = self.entries.read().get(s) {
            return Ok(Arc::clone(existing));
        }

        let mut entries = self.entries.write();
        // Another writer may have won the race between the two locks
        if let Some(existing) = entries.get(s) {
            return Ok(Arc::clone(existing));
        }
        if self.limit.is_some_and(|limit| entries.len() >= limit) {
            return Err(XmlError::OutOfMemory { what: "dictionary entry" });
        }
        entries
            .try_reserve(1)
            .map_err(|_| XmlError::OutOfMemory { what: "dictionary entry" })?;

        let interned: Arc<str> = Arc::from(s);
        entries.insert(Arc::clone(&interned));
        Ok(interned)
    }

    /// Look up a string without interning it
    pub fn lookup(&self, s: &str) -> Option<Arc<str>> {
        self.entries.read().get(s).cloned()
    }

    /// Check whether this exact allocation came from this dictionary
    pub fn owns(&self, s: &Arc<str>) -> bool {
        self.entries
            .read()
            .get(&**s)
            .is_some_and(|entry| Arc::ptr_eq(entry, s))
    }

    /// Number of interned strings
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
