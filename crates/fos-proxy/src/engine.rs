//! Proxy engine
//!
//! Owns the node heap and the configuration and exposes the proxy-level
//! operations higher layers call. Everything here is a thin wrapper that
//! resolves proxies to nodes and threads the configuration through.

use std::sync::Arc;

use fos_xml::{Dict, DocId, NodeId};

use crate::proxy::{self, ProxyHeap};
use crate::{Proxy, ProxyConfig, ProxyRegistry, ProxyResult};
use crate::{dealloc, edit, reconcile, tail};

/// Proxy engine
#[derive(Debug)]
pub struct ProxyEngine {
    heap: ProxyHeap,
    config: ProxyConfig,
}

impl Default for ProxyEngine {
    fn default() -> Self {
        Self::new(ProxyConfig::default())
    }
}

impl ProxyEngine {
    /// Create an engine with the given configuration
    pub fn new(config: ProxyConfig) -> Self {
        tracing::debug!(
            "Creating proxy engine (max nodes {:?}, {} default prefixes)",
            config.heap.max_nodes,
            config.default_prefixes.len()
        );
        Self {
            heap: ProxyHeap::with_config(config.heap.clone()),
            config,
        }
    }

    pub fn heap(&self) -> &ProxyHeap {
        &self.heap
    }

    /// Direct heap access for building trees
    pub fn heap_mut(&mut self) -> &mut ProxyHeap {
        &mut self.heap
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Register a preferred prefix for a namespace URI
    pub fn register_namespace(&mut self, prefix: &str, uri: &str) -> ProxyResult<()> {
        self.config.register_namespace(prefix, uri)
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// A fresh dictionary with the configured entry limit
    pub fn new_dict(&self) -> Arc<Dict> {
        Arc::new(Dict::with_limit(self.config.dict_entry_limit))
    }

    /// Create a document with its own dictionary
    pub fn new_document(&mut self) -> ProxyResult<DocId> {
        let dict = self.new_dict();
        self.new_document_with_dict(dict)
    }

    /// Create a document using `dict`, which may be shared
    pub fn new_document_with_dict(&mut self, dict: Arc<Dict>) -> ProxyResult<DocId> {
        Ok(self.heap.new_document(dict)?)
    }

    /// Create a document that shares `other`'s dictionary
    pub fn new_document_sharing_dict(&mut self, other: DocId) -> ProxyResult<DocId> {
        let dict = self.heap.dict(other)?.clone();
        self.new_document_with_dict(dict)
    }

    /// Release a whole document
    ///
    /// Proxies of its nodes stay usable as values but no longer represent
    /// a node. Returns the number of nodes freed.
    pub fn free_document(&mut self, doc: DocId) -> ProxyResult<usize> {
        let top = self.heap.doc_node(doc)?;
        let proxies: Vec<Proxy> = self
            .heap
            .walk_all(top)
            .filter_map(|id| self.heap.get_proxy(id))
            .collect();
        for proxy in &proxies {
            proxy::detach_proxy(&mut self.heap, proxy)?;
        }
        Ok(self.heap.free_document(doc)?)
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    pub fn register_proxy(&mut self, proxy: &Proxy, node: NodeId) -> ProxyResult<()> {
        self.heap.register_proxy(proxy, node)
    }

    pub fn unregister_proxy(&mut self, proxy: &Proxy) -> ProxyResult<()> {
        self.heap.unregister_proxy(proxy)
    }

    pub fn get_proxy(&self, node: NodeId) -> Option<Proxy> {
        self.heap.get_proxy(node)
    }

    /// The proxy of `node`, creating and registering one if needed
    pub fn proxy_for(&mut self, node: NodeId) -> ProxyResult<Proxy> {
        if let Some(proxy) = self.heap.get_proxy(node) {
            return Ok(proxy);
        }
        let proxy = Proxy::new();
        self.heap.register_proxy(&proxy, node)?;
        Ok(proxy)
    }

    /// Drop a proxy's claim on its node and free what it kept alive
    pub fn release_proxy(&mut self, proxy: &Proxy) -> ProxyResult<bool> {
        proxy::release_proxy(&mut self.heap, proxy)
    }

    /// Whether `proxy` still represents a live node
    pub fn is_valid(&self, proxy: &Proxy) -> bool {
        proxy::is_valid(&self.heap, proxy)
    }

    // ------------------------------------------------------------------
    // Core operations
    // ------------------------------------------------------------------

    pub fn attempt_deallocation(&mut self, node: Option<NodeId>) -> bool {
        dealloc::attempt_deallocation(&mut self.heap, node)
    }

    pub fn move_node_to_document(
        &mut self,
        dest_doc: DocId,
        source_doc: DocId,
        node: NodeId,
    ) -> ProxyResult<()> {
        reconcile::move_node_to_document(&mut self.heap, &self.config, dest_doc, source_doc, node)
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    pub fn append_child(&mut self, parent: &Proxy, child: &Proxy) -> ProxyResult<()> {
        let (parent, child) = (self.live(parent)?, self.live(child)?);
        edit::append_child(&mut self.heap, &self.config, parent, child)
    }

    pub fn prepend_child(&mut self, parent: &Proxy, child: &Proxy) -> ProxyResult<()> {
        let (parent, child) = (self.live(parent)?, self.live(child)?);
        edit::prepend_child(&mut self.heap, &self.config, parent, child)
    }

    pub fn add_next_sibling(&mut self, element: &Proxy, sibling: &Proxy) -> ProxyResult<()> {
        let (element, sibling) = (self.live(element)?, self.live(sibling)?);
        edit::add_next_sibling(&mut self.heap, &self.config, element, sibling)
    }

    pub fn add_previous_sibling(&mut self, element: &Proxy, sibling: &Proxy) -> ProxyResult<()> {
        let (element, sibling) = (self.live(element)?, self.live(sibling)?);
        edit::add_previous_sibling(&mut self.heap, &self.config, element, sibling)
    }

    pub fn replace(&mut self, old: &Proxy, new: &Proxy) -> ProxyResult<()> {
        let (old, new) = (self.live(old)?, self.live(new)?);
        edit::replace_node(&mut self.heap, &self.config, old, new)
    }

    /// Remove a node from its tree; returns whether memory was freed
    pub fn remove(&mut self, proxy: &Proxy) -> ProxyResult<bool> {
        let node = self.live(proxy)?;
        edit::remove_node(&mut self.heap, &self.config, node)
    }

    /// Leading text of an element
    pub fn text(&self, proxy: &Proxy) -> ProxyResult<Option<String>> {
        let node = self.live(proxy)?;
        let first = self.heap.node(node)?.first_child();
        Ok(tail::collect_text(&self.heap, first)?)
    }

    /// Tail text of an element
    pub fn tail(&self, proxy: &Proxy) -> ProxyResult<Option<String>> {
        let node = self.live(proxy)?;
        let next = self.heap.node(node)?.next_sibling();
        Ok(tail::collect_text(&self.heap, next)?)
    }

    fn live(&self, proxy: &Proxy) -> ProxyResult<NodeId> {
        proxy::live_node(&self.heap, proxy)
    }
}
