//! XML heap (arena-based allocation)
//!
//! One heap holds the nodes, namespace declarations and documents of any
//! number of documents. Moving a subtree between documents only rewrites
//! links and owning-document fields; node handles stay valid.

use std::sync::Arc;

use crate::document::PrefixCounter;
use crate::generation::Arena;
use crate::namespace::{NsDecl, XML_NAMESPACE};
use crate::node::{Node, NodeType};
use crate::{
    Dict, DocId, DocumentData, HeapConfig, NodeId, NsId, TreeOperations, XmlError, XmlResult,
};

/// Allocation statistics
///
/// Counters only grow, so the difference between two snapshots tells
/// exactly how many nodes and declarations an operation allocated or freed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub nodes_allocated: usize,
    pub nodes_freed: usize,
    pub namespaces_allocated: usize,
    pub namespaces_freed: usize,
}

impl HeapStats {
    pub fn live_nodes(&self) -> usize {
        self.nodes_allocated - self.nodes_freed
    }

    pub fn live_namespaces(&self) -> usize {
        self.namespaces_allocated - self.namespaces_freed
    }
}

/// Arena-based XML heap
///
/// `P` is the type stored in every node's opaque slot.
#[derive(Debug)]
pub struct XmlHeap<P = ()> {
    pub(crate) nodes: Arena<Node<P>>,
    pub(crate) namespaces: Arena<NsDecl>,
    pub(crate) documents: Arena<DocumentData>,
    config: HeapConfig,
    stats: HeapStats,
}

impl<P> Default for XmlHeap<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> XmlHeap<P> {
    /// Create an empty heap with default limits
    pub fn new() -> Self {
        Self::with_config(HeapConfig::default())
    }

    pub fn with_config(config: HeapConfig) -> Self {
        Self {
            nodes: Arena::new(config.max_nodes),
            namespaces: Arena::new(config.max_namespaces),
            documents: Arena::new(None),
            config,
            stats: HeapStats::default(),
        }
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Allocation counters
    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Get a node by ID
    pub fn node(&self, id: NodeId) -> XmlResult<&Node<P>> {
        self.nodes.get(id.0).ok_or(XmlError::StaleNode(id))
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, id: NodeId) -> XmlResult<&mut Node<P>> {
        self.nodes.get_mut(id.0).ok_or(XmlError::StaleNode(id))
    }

    /// Check whether a node handle is still live
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    /// Get a namespace declaration
    pub fn ns(&self, id: NsId) -> XmlResult<&NsDecl> {
        self.namespaces.get(id.0).ok_or(XmlError::StaleNamespace(id))
    }

    pub fn ns_mut(&mut self, id: NsId) -> XmlResult<&mut NsDecl> {
        self.namespaces
            .get_mut(id.0)
            .ok_or(XmlError::StaleNamespace(id))
    }

    pub fn contains_ns(&self, id: NsId) -> bool {
        self.namespaces.contains(id.0)
    }

    pub fn document(&self, doc: DocId) -> XmlResult<&DocumentData> {
        self.documents.get(doc.0).ok_or(XmlError::StaleDocument(doc))
    }

    pub fn contains_document(&self, doc: DocId) -> bool {
        self.documents.contains(doc.0)
    }

    /// The document node of `doc`
    pub fn doc_node(&self, doc: DocId) -> XmlResult<NodeId> {
        Ok(self.document(doc)?.node)
    }

    /// The dictionary of `doc`
    pub fn dict(&self, doc: DocId) -> XmlResult<&Arc<Dict>> {
        Ok(&self.document(doc)?.dict)
    }

    /// First element child of the document node
    pub fn root_element(&self, doc: DocId) -> XmlResult<Option<NodeId>> {
        let mut current = self.node(self.doc_node(doc)?)?.first_child;
        while let Some(id) = current {
            let node = self.node(id)?;
            if node.is_element() {
                return Ok(Some(id));
            }
            current = node.next_sibling;
        }
        Ok(None)
    }

    /// Direct children of a node, in order
    pub fn children(&self, id: NodeId) -> XmlResult<Vec<NodeId>> {
        let mut children = Vec::new();
        let mut current = self.node(id)?.first_child;
        while let Some(child) = current {
            children.push(child);
            current = self.node(child)?.next_sibling;
        }
        Ok(children)
    }

    /// Pre-order walk of `top` and its descendants
    pub fn walk(&self, top: NodeId, attributes: bool) -> Walk<'_, P> {
        Walk {
            heap: self,
            stack: vec![top],
            attributes,
            enter_opaque: false,
        }
    }

    /// Pre-order walk that also enters document-type and entity-reference
    /// children. Used when releasing memory.
    pub fn walk_all(&self, top: NodeId) -> Walk<'_, P> {
        Walk {
            heap: self,
            stack: vec![top],
            attributes: true,
            enter_opaque: true,
        }
    }

    /// Walk from `node` to the root of its tree, starting with `node`
    pub fn ancestors_or_self(&self, node: NodeId) -> XmlResult<Vec<NodeId>> {
        let mut chain = vec![node];
        let mut current = self.node(node)?.parent;
        while let Some(id) = current {
            chain.push(id);
            current = self.node(id)?.parent;
        }
        Ok(chain)
    }

    /// Check whether `ancestor` is `node` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> XmlResult<bool> {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            current = self.node(id)?.parent;
        }
        Ok(false)
    }

    // ------------------------------------------------------------------
    // Opaque slot
    // ------------------------------------------------------------------

    /// Contents of a node's opaque slot
    pub fn private(&self, id: NodeId) -> XmlResult<Option<&P>> {
        Ok(self.node(id)?.private.as_ref())
    }

    /// Replace a node's opaque slot, returning the previous contents
    pub fn set_private(&mut self, id: NodeId, value: Option<P>) -> XmlResult<Option<P>> {
        let node = self.node_mut(id)?;
        Ok(std::mem::replace(&mut node.private, value))
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Create an XML document using `dict` as its interning table
    pub fn new_document(&mut self, dict: Arc<Dict>) -> XmlResult<DocId> {
        self.new_document_of_type(dict, NodeType::Document)
    }

    /// Create an HTML document using `dict` as its interning table
    pub fn new_html_document(&mut self, dict: Arc<Dict>) -> XmlResult<DocId> {
        self.new_document_of_type(dict, NodeType::HtmlDocument)
    }

    fn new_document_of_type(&mut self, dict: Arc<Dict>, node_type: NodeType) -> XmlResult<DocId> {
        // The document node and the xml declaration both need the DocId
        // before the document record exists.
        let doc = DocId(
            self.documents
                .next_handle()
                .ok_or(XmlError::OutOfMemory { what: "document" })?,
        );
        let prefix = dict.intern("xml")?;
        let href = dict.intern(XML_NAMESPACE)?;

        let node = self.alloc_node(Node::new(node_type, doc))?;
        let xml_ns = match self.alloc_ns(NsDecl::new(Some(prefix), href, None)) {
            Ok(ns) => ns,
            Err(e) => {
                self.release_node_slot(node);
                return Err(e);
            }
        };

        let data = DocumentData {
            node,
            dict,
            xml_ns,
            prefixes: PrefixCounter::new(),
        };
        match self.documents.insert(data) {
            Some(handle) => {
                debug_assert_eq!(handle, doc.0);
                Ok(doc)
            }
            None => {
                self.release_node_slot(node);
                self.release_ns_slot(xml_ns);
                Err(XmlError::OutOfMemory { what: "document" })
            }
        }
    }

    /// Replace the root element of a document
    pub fn set_root_element(&mut self, doc: DocId, element: NodeId) -> XmlResult<Option<NodeId>> {
        if !self.node(element)?.is_element() {
            return Err(XmlError::InvalidNodeType);
        }
        let doc_node = self.doc_node(doc)?;
        let old = self.root_element(doc)?;
        match old {
            Some(old) if old == element => return Ok(None),
            Some(old) => {
                self.add_prev_sibling(old, element)?;
                self.unlink(old)?;
            }
            None => self.add_child(doc_node, element)?,
        }
        Ok(old)
    }

    /// Generate a fresh `nsN` prefix from the document's counter
    pub fn build_new_prefix(&mut self, doc: DocId) -> XmlResult<String> {
        let data = self
            .documents
            .get_mut(doc.0)
            .ok_or(XmlError::StaleDocument(doc))?;
        Ok(data.prefixes.next_prefix())
    }

    /// Hand a parentless subtree over to `doc` without linking it anywhere
    pub fn set_document(&mut self, top: NodeId, doc: DocId) -> XmlResult<()> {
        self.document(doc)?;
        if self.node(top)?.parent.is_some() {
            return Err(XmlError::StillLinked(top));
        }
        self.adopt(top, doc)
    }

    /// Release a document: its whole tree, its `xml` declaration and the
    /// document record. Returns the number of nodes freed.
    pub fn free_document(&mut self, doc: DocId) -> XmlResult<usize> {
        let (node, xml_ns) = {
            let data = self.document(doc)?;
            (data.node, data.xml_ns)
        };
        let freed = self.free_subtree(node)?;
        self.free_ns(xml_ns)?;
        self.documents.remove(doc.0);
        tracing::debug!("Freed document {} ({} nodes)", doc, freed);
        Ok(freed)
    }

    // ------------------------------------------------------------------
    // Node creation
    // ------------------------------------------------------------------

    fn alloc_node(&mut self, node: Node<P>) -> XmlResult<NodeId> {
        let handle = self
            .nodes
            .insert(node)
            .ok_or(XmlError::OutOfMemory { what: "node" })?;
        self.stats.nodes_allocated += 1;
        Ok(NodeId(handle))
    }

    fn release_node_slot(&mut self, id: NodeId) {
        if self.nodes.remove(id.0).is_some() {
            self.stats.nodes_freed += 1;
        }
    }

    pub(crate) fn alloc_ns(&mut self, decl: NsDecl) -> XmlResult<NsId> {
        let handle = self
            .namespaces
            .insert(decl)
            .ok_or(XmlError::OutOfMemory {
                what: "namespace declaration",
            })?;
        self.stats.namespaces_allocated += 1;
        Ok(NsId(handle))
    }

    pub(crate) fn release_ns_slot(&mut self, id: NsId) -> bool {
        let released = self.namespaces.remove(id.0).is_some();
        if released {
            self.stats.namespaces_freed += 1;
        }
        released
    }

    /// Intern `s` in the dictionary of `doc`
    pub fn intern(&self, doc: DocId, s: &str) -> XmlResult<Arc<str>> {
        self.dict(doc)?.intern(s)
    }

    /// Text-like content: interned when short, private otherwise
    fn content_string(&self, doc: DocId, s: &str) -> XmlResult<Arc<str>> {
        if s.len() <= self.config.intern_content_max_len {
            self.intern(doc, s)
        } else {
            Ok(Arc::from(s))
        }
    }

    fn new_named(&mut self, doc: DocId, node_type: NodeType, name: &str) -> XmlResult<NodeId> {
        let name = self.intern(doc, name)?;
        let mut node = Node::new(node_type, doc);
        node.name = Some(name);
        self.alloc_node(node)
    }

    /// Create a detached element in `doc`
    pub fn new_element(&mut self, doc: DocId, name: &str) -> XmlResult<NodeId> {
        self.new_named(doc, NodeType::Element, name)
    }

    /// Create a detached text node
    pub fn new_text(&mut self, doc: DocId, content: &str) -> XmlResult<NodeId> {
        let content = self.content_string(doc, content)?;
        let mut node = Node::new(NodeType::Text, doc);
        node.content = Some(content);
        self.alloc_node(node)
    }

    /// Create a detached CDATA section
    pub fn new_cdata(&mut self, doc: DocId, content: &str) -> XmlResult<NodeId> {
        let mut node = Node::new(NodeType::CData, doc);
        node.content = Some(Arc::from(content));
        self.alloc_node(node)
    }

    /// Create a detached comment
    pub fn new_comment(&mut self, doc: DocId, content: &str) -> XmlResult<NodeId> {
        let mut node = Node::new(NodeType::Comment, doc);
        node.content = Some(Arc::from(content));
        self.alloc_node(node)
    }

    /// Create a detached processing instruction
    pub fn new_pi(&mut self, doc: DocId, target: &str, data: &str) -> XmlResult<NodeId> {
        let id = self.new_named(doc, NodeType::ProcessingInstruction, target)?;
        self.node_mut(id)?.content = Some(Arc::from(data));
        Ok(id)
    }

    /// Create a detached entity reference
    pub fn new_entity_ref(&mut self, doc: DocId, name: &str) -> XmlResult<NodeId> {
        self.new_named(doc, NodeType::EntityRef, name)
    }

    /// Create a detached document type node
    pub fn new_dtd(&mut self, doc: DocId, name: &str) -> XmlResult<NodeId> {
        self.new_named(doc, NodeType::DocumentType, name)
    }

    /// Create an XInclude start or end boundary marker
    pub fn new_xinclude_marker(&mut self, doc: DocId, start: bool) -> XmlResult<NodeId> {
        let node_type = if start {
            NodeType::XIncludeStart
        } else {
            NodeType::XIncludeEnd
        };
        self.new_named(doc, node_type, "include")
    }

    /// Add an attribute to an element
    pub fn new_attribute(&mut self, element: NodeId, name: &str, value: &str) -> XmlResult<NodeId> {
        let doc = {
            let owner = self.node(element)?;
            if !owner.is_element() {
                return Err(XmlError::InvalidNodeType);
            }
            owner.doc
        };
        let name = self.intern(doc, name)?;
        let value = self.content_string(doc, value)?;
        let mut node = Node::new(NodeType::Attribute, doc);
        node.name = Some(name);
        node.content = Some(value);
        node.parent = Some(element);
        let id = self.alloc_node(node)?;
        self.node_mut(element)?.attributes.push(id);
        Ok(id)
    }

    /// Find an attribute of `element` by local name and namespace href
    pub fn find_attribute(
        &self,
        element: NodeId,
        name: &str,
        href: Option<&str>,
    ) -> XmlResult<Option<NodeId>> {
        for &attr in &self.node(element)?.attributes {
            let node = self.node(attr)?;
            let attr_href = match node.ns {
                Some(ns) => Some(self.ns(ns)?.href()),
                None => None,
            };
            if node.name() == Some(name) && attr_href == href {
                return Ok(Some(attr));
            }
        }
        Ok(None)
    }

    /// Copy a text-like node into `doc` (detached)
    pub fn copy_text(&mut self, node: NodeId, doc: DocId) -> XmlResult<NodeId> {
        let (node_type, content) = {
            let source = self.node(node)?;
            if !source.node_type.is_text_like() {
                return Err(XmlError::InvalidNodeType);
            }
            (source.node_type, source.content.clone())
        };
        let content = content.unwrap_or_else(|| Arc::from(""));
        match node_type {
            NodeType::Text => self.new_text(doc, &content),
            _ => self.new_cdata(doc, &content),
        }
    }

    // ------------------------------------------------------------------
    // Linking internals
    // ------------------------------------------------------------------

    /// Rewrite the owning document of `top`'s whole subtree
    fn set_tree_doc(&mut self, top: NodeId, doc: DocId) -> XmlResult<()> {
        let ids: Vec<NodeId> = self.walk_all(top).collect();
        for id in ids {
            self.node_mut(id)?.doc = doc;
        }
        Ok(())
    }

    fn check_linkable(&self, node: NodeId) -> XmlResult<()> {
        let node_type = self.node(node)?.node_type;
        if node_type == NodeType::Attribute || node_type.is_document() {
            return Err(XmlError::InvalidNodeType);
        }
        Ok(())
    }

    fn adopt(&mut self, node: NodeId, doc: DocId) -> XmlResult<()> {
        if self.node(node)?.doc != doc {
            self.set_tree_doc(node, doc)?;
        }
        Ok(())
    }

    /// Unlink and free a subtree regardless of its attachment
    fn free_subtree(&mut self, top: NodeId) -> XmlResult<usize> {
        self.unlink(top)?;
        let ids: Vec<NodeId> = self.walk_all(top).collect();
        let mut freed = 0;
        for id in ids {
            if let Some(node) = self.nodes.remove(id.0) {
                for ns in node.ns_def {
                    self.release_ns_slot(ns);
                }
                self.stats.nodes_freed += 1;
                freed += 1;
            }
        }
        Ok(freed)
    }
}

impl<P> TreeOperations for XmlHeap<P> {
    fn unlink(&mut self, node: NodeId) -> XmlResult<()> {
        let (node_type, parent, prev, next) = {
            let n = self.node(node)?;
            (n.node_type, n.parent, n.prev_sibling, n.next_sibling)
        };

        if node_type == NodeType::Attribute {
            if let Some(owner) = parent {
                self.node_mut(owner)?.attributes.retain(|&a| a != node);
            }
            self.node_mut(node)?.parent = None;
            return Ok(());
        }

        match prev {
            Some(p) => self.node_mut(p)?.next_sibling = next,
            None => {
                if let Some(par) = parent {
                    self.node_mut(par)?.first_child = next;
                }
            }
        }
        match next {
            Some(n) => self.node_mut(n)?.prev_sibling = prev,
            None => {
                if let Some(par) = parent {
                    self.node_mut(par)?.last_child = prev;
                }
            }
        }

        let n = self.node_mut(node)?;
        n.parent = None;
        n.prev_sibling = None;
        n.next_sibling = None;
        Ok(())
    }

    fn add_child(&mut self, parent: NodeId, node: NodeId) -> XmlResult<()> {
        if parent == node {
            return Err(XmlError::HierarchyRequest);
        }
        let (accepts, doc) = {
            let p = self.node(parent)?;
            (p.node_type.accepts_children(), p.doc)
        };
        if !accepts {
            return Err(XmlError::HierarchyRequest);
        }
        self.check_linkable(node)?;
        self.unlink(node)?;

        let last = self.node(parent)?.last_child;
        {
            let n = self.node_mut(node)?;
            n.parent = Some(parent);
            n.prev_sibling = last;
            n.next_sibling = None;
        }
        match last {
            Some(l) => self.node_mut(l)?.next_sibling = Some(node),
            None => self.node_mut(parent)?.first_child = Some(node),
        }
        self.node_mut(parent)?.last_child = Some(node);
        self.adopt(node, doc)
    }

    fn add_next_sibling(&mut self, cur: NodeId, node: NodeId) -> XmlResult<()> {
        if cur == node {
            return Ok(());
        }
        self.check_linkable(cur)?;
        self.check_linkable(node)?;
        self.unlink(node)?;

        let (parent, next, doc) = {
            let c = self.node(cur)?;
            (c.parent, c.next_sibling, c.doc)
        };
        {
            let n = self.node_mut(node)?;
            n.parent = parent;
            n.prev_sibling = Some(cur);
            n.next_sibling = next;
        }
        match next {
            Some(nx) => self.node_mut(nx)?.prev_sibling = Some(node),
            None => {
                if let Some(par) = parent {
                    self.node_mut(par)?.last_child = Some(node);
                }
            }
        }
        self.node_mut(cur)?.next_sibling = Some(node);
        self.adopt(node, doc)
    }

    fn add_prev_sibling(&mut self, cur: NodeId, node: NodeId) -> XmlResult<()> {
        if cur == node {
            return Ok(());
        }
        self.check_linkable(cur)?;
        self.check_linkable(node)?;
        self.unlink(node)?;

        let (parent, prev, doc) = {
            let c = self.node(cur)?;
            (c.parent, c.prev_sibling, c.doc)
        };
        {
            let n = self.node_mut(node)?;
            n.parent = parent;
            n.prev_sibling = prev;
            n.next_sibling = Some(cur);
        }
        match prev {
            Some(pv) => self.node_mut(pv)?.next_sibling = Some(node),
            None => {
                if let Some(par) = parent {
                    self.node_mut(par)?.first_child = Some(node);
                }
            }
        }
        self.node_mut(cur)?.prev_sibling = Some(node);
        self.adopt(node, doc)
    }

    fn free_node(&mut self, node: NodeId) -> XmlResult<usize> {
        let n = self.node(node)?;
        if n.parent.is_some() && n.node_type != NodeType::Attribute {
            return Err(XmlError::StillLinked(node));
        }
        if n.node_type.is_document() {
            return Err(XmlError::InvalidNodeType);
        }
        let freed = self.free_subtree(node)?;
        tracing::trace!("Freed {} ({} nodes)", node, freed);
        Ok(freed)
    }
}

/// Pre-order subtree iterator
///
/// Yields the top node first, then (optionally) its attributes, then its
/// children depth-first. Document-type and entity-reference children are
/// skipped unless the walk was created with [`XmlHeap::walk_all`].
pub struct Walk<'a, P> {
    heap: &'a XmlHeap<P>,
    stack: Vec<NodeId>,
    attributes: bool,
    enter_opaque: bool,
}

impl<P> Iterator for Walk<'_, P> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.stack.pop()?;
            let Ok(node) = self.heap.node(id) else {
                continue;
            };

            if self.enter_opaque || !node.node_type.is_opaque() {
                let mut child = node.last_child;
                while let Some(c) = child {
                    self.stack.push(c);
                    child = self.heap.node(c).ok().and_then(|n| n.prev_sibling);
                }
            }
            if self.attributes {
                self.stack.extend(node.attributes.iter().rev().copied());
            }
            return Some(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap_with_doc() -> (XmlHeap, DocId) {
        let mut heap = XmlHeap::new();
        let doc = heap.new_document(Dict::shared()).unwrap();
        (heap, doc)
    }

    #[test]
    fn test_new_document_has_document_node() {
        let (heap, doc) = heap_with_doc();
        let node = heap.doc_node(doc).unwrap();
        assert_eq!(heap.node(node).unwrap().node_type(), NodeType::Document);
        assert_eq!(heap.node(node).unwrap().doc(), doc);
        assert_eq!(heap.root_element(doc).unwrap(), None);
    }

    #[test]
    fn test_append_and_walk_order() {
        let (mut heap, doc) = heap_with_doc();
        let root = heap.new_element(doc, "root").unwrap();
        let a = heap.new_element(doc, "a").unwrap();
        let b = heap.new_element(doc, "b").unwrap();
        let a1 = heap.new_element(doc, "a1").unwrap();
        heap.set_root_element(doc, root).unwrap();
        heap.add_child(root, a).unwrap();
        heap.add_child(root, b).unwrap();
        heap.add_child(a, a1).unwrap();
        let attr = heap.new_attribute(a, "id", "x").unwrap();

        let order: Vec<NodeId> = heap.walk(root, true).collect();
        assert_eq!(order, vec![root, a, attr, a1, b]);
        let order: Vec<NodeId> = heap.walk(root, false).collect();
        assert_eq!(order, vec![root, a, a1, b]);
    }

    #[test]
    fn test_unlink_keeps_siblings_consistent() {
        let (mut heap, doc) = heap_with_doc();
        let root = heap.new_element(doc, "root").unwrap();
        let kids: Vec<NodeId> = (0..3)
            .map(|i| heap.new_element(doc, &format!("c{i}")).unwrap())
            .collect();
        for &k in &kids {
            heap.add_child(root, k).unwrap();
        }

        heap.unlink(kids[1]).unwrap();
        assert_eq!(heap.children(root).unwrap(), vec![kids[0], kids[2]]);
        assert_eq!(heap.node(kids[0]).unwrap().next_sibling(), Some(kids[2]));
        assert_eq!(heap.node(kids[2]).unwrap().prev_sibling(), Some(kids[0]));
        assert_eq!(heap.node(kids[1]).unwrap().parent(), None);

        heap.unlink(kids[2]).unwrap();
        assert_eq!(heap.node(root).unwrap().last_child(), Some(kids[0]));
    }

    #[test]
    fn test_add_child_moves_between_documents() {
        let mut heap: XmlHeap = XmlHeap::new();
        let doc_a = heap.new_document(Dict::shared()).unwrap();
        let doc_b = heap.new_document(Dict::shared()).unwrap();
        let root_b = heap.new_element(doc_b, "root").unwrap();
        heap.set_root_element(doc_b, root_b).unwrap();

        let moved = heap.new_element(doc_a, "moved").unwrap();
        let inner = heap.new_text(doc_a, "text").unwrap();
        heap.add_child(moved, inner).unwrap();
        let attr = heap.new_attribute(moved, "k", "v").unwrap();

        heap.add_child(root_b, moved).unwrap();
        for id in [moved, inner, attr] {
            assert_eq!(heap.node(id).unwrap().doc(), doc_b);
        }
    }

    #[test]
    fn test_parentless_siblings() {
        let (mut heap, doc) = heap_with_doc();
        let elem = heap.new_element(doc, "e").unwrap();
        let tail = heap.new_text(doc, "tail").unwrap();
        heap.add_next_sibling(elem, tail).unwrap();

        assert_eq!(heap.node(elem).unwrap().next_sibling(), Some(tail));
        assert_eq!(heap.node(tail).unwrap().parent(), None);

        // Freeing the tail splices it out of the run
        heap.free_node(tail).unwrap();
        assert_eq!(heap.node(elem).unwrap().next_sibling(), None);
    }

    #[test]
    fn test_set_document_on_detached_subtree() {
        let (mut heap, doc_a) = heap_with_doc();
        let doc_b = heap.new_document(Dict::shared()).unwrap();
        let elem = heap.new_element(doc_a, "e").unwrap();
        let text = heap.new_text(doc_a, "t").unwrap();
        heap.add_child(elem, text).unwrap();

        heap.set_document(elem, doc_b).unwrap();
        assert_eq!(heap.node(elem).unwrap().doc(), doc_b);
        assert_eq!(heap.node(text).unwrap().doc(), doc_b);
        assert_eq!(heap.set_document(text, doc_a), Err(XmlError::StillLinked(text)));
    }

    #[test]
    fn test_free_node_requires_detached() {
        let (mut heap, doc) = heap_with_doc();
        let root = heap.new_element(doc, "root").unwrap();
        let child = heap.new_element(doc, "child").unwrap();
        heap.add_child(root, child).unwrap();

        assert_eq!(heap.free_node(child), Err(XmlError::StillLinked(child)));
        heap.unlink(child).unwrap();
        assert_eq!(heap.free_node(child), Ok(1));
        assert_eq!(heap.free_node(child), Err(XmlError::StaleNode(child)));
    }

    #[test]
    fn test_free_subtree_counts_attributes_and_namespaces() {
        let (mut heap, doc) = heap_with_doc();
        let top = heap.new_element(doc, "top").unwrap();
        let child = heap.new_element(doc, "child").unwrap();
        heap.add_child(top, child).unwrap();
        heap.new_attribute(child, "a", "1").unwrap();
        heap.new_ns(top, "urn:x", Some("x")).unwrap();

        let before = heap.stats();
        assert_eq!(heap.free_node(top).unwrap(), 3);
        let after = heap.stats();
        assert_eq!(after.nodes_freed - before.nodes_freed, 3);
        assert_eq!(after.namespaces_freed - before.namespaces_freed, 1);
    }

    #[test]
    fn test_add_child_rejects_text_parent() {
        let (mut heap, doc) = heap_with_doc();
        let text = heap.new_text(doc, "t").unwrap();
        let elem = heap.new_element(doc, "e").unwrap();
        assert_eq!(heap.add_child(text, elem), Err(XmlError::HierarchyRequest));
    }

    #[test]
    fn test_short_content_is_interned() {
        let (mut heap, doc) = heap_with_doc();
        let short = heap.new_text(doc, "  ").unwrap();
        let long = heap.new_text(doc, "a considerably longer text node").unwrap();
        let dict = heap.dict(doc).unwrap().clone();

        assert!(dict.owns(heap.node(short).unwrap().content_ref().unwrap()));
        assert!(!dict.owns(heap.node(long).unwrap().content_ref().unwrap()));
    }

    #[test]
    fn test_node_limit() {
        let mut heap: XmlHeap = XmlHeap::with_config(HeapConfig {
            max_nodes: Some(2),
            ..HeapConfig::default()
        });
        let doc = heap.new_document(Dict::shared()).unwrap();
        heap.new_element(doc, "one").unwrap();
        assert_eq!(
            heap.new_element(doc, "two"),
            Err(XmlError::OutOfMemory { what: "node" })
        );
    }

    #[test]
    fn test_free_document() {
        let (mut heap, doc) = heap_with_doc();
        let root = heap.new_element(doc, "root").unwrap();
        heap.set_root_element(doc, root).unwrap();
        let text = heap.new_text(doc, "x").unwrap();
        heap.add_child(root, text).unwrap();

        assert_eq!(heap.free_document(doc).unwrap(), 3);
        assert!(!heap.contains(root));
        assert!(!heap.contains_document(doc));
        assert_eq!(heap.stats().live_nodes(), 0);
        assert_eq!(heap.stats().live_namespaces(), 0);
    }
}
