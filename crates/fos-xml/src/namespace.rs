//! Namespace declarations and scope lookup

use std::sync::Arc;

use crate::node::NodeType;
use crate::{NodeId, NsId, XmlError, XmlHeap, XmlResult};

/// URI bound to the reserved `xml` prefix
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A (prefix, href) declaration
#[derive(Debug, Clone)]
pub struct NsDecl {
    prefix: Option<Arc<str>>,
    href: Arc<str>,
    /// Element whose declaration list holds this entry
    owner: Option<NodeId>,
}

impl NsDecl {
    pub(crate) fn new(prefix: Option<Arc<str>>, href: Arc<str>, owner: Option<NodeId>) -> Self {
        Self {
            prefix,
            href,
            owner,
        }
    }

    /// Prefix, `None` for a default namespace declaration
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn prefix_ref(&self) -> Option<&Arc<str>> {
        self.prefix.as_ref()
    }

    pub fn set_prefix_ref(&mut self, prefix: Arc<str>) {
        self.prefix = Some(prefix);
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn href_ref(&self) -> &Arc<str> {
        &self.href
    }

    pub fn set_href_ref(&mut self, href: Arc<str>) {
        self.href = href;
    }

    /// Declaring element, `None` once the declaration was taken off its
    /// element or for a document's implicit `xml` declaration
    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }
}

impl<P> XmlHeap<P> {
    /// Declare `prefix` → `href` on an element
    pub fn new_ns(&mut self, node: NodeId, href: &str, prefix: Option<&str>) -> XmlResult<NsId> {
        let (doc, existing) = {
            let n = self.node(node)?;
            if !n.is_element() {
                return Err(XmlError::InvalidNodeType);
            }
            (n.doc, n.ns_def.clone())
        };
        for ns in existing {
            if self.ns(ns)?.prefix() == prefix {
                return Err(XmlError::DuplicatePrefix {
                    node,
                    prefix: prefix.map(str::to_owned),
                });
            }
        }

        let href = self.intern(doc, href)?;
        let prefix = prefix.map(|p| self.intern(doc, p)).transpose()?;
        let ns = self.alloc_ns(NsDecl::new(prefix, href, Some(node)))?;
        self.node_mut(node)?.ns_def.push(ns);
        Ok(ns)
    }

    /// Set the namespace reference of an element or attribute
    pub fn set_ns(&mut self, node: NodeId, ns: Option<NsId>) -> XmlResult<()> {
        if let Some(ns) = ns {
            self.ns(ns)?;
        }
        self.node_mut(node)?.ns = ns;
        Ok(())
    }

    /// Take a declaration off its element without freeing it
    pub fn remove_ns_def(&mut self, node: NodeId, ns: NsId) -> XmlResult<()> {
        let n = self.node_mut(node)?;
        let before = n.ns_def.len();
        n.ns_def.retain(|&d| d != ns);
        if n.ns_def.len() == before {
            return Err(XmlError::StaleNamespace(ns));
        }
        self.ns_mut(ns)?.owner = None;
        Ok(())
    }

    /// Put a declaration taken off with [`remove_ns_def`](Self::remove_ns_def)
    /// back at `index` in the element's declaration list
    pub fn insert_ns_def(&mut self, node: NodeId, index: usize, ns: NsId) -> XmlResult<()> {
        if self.ns(ns)?.owner.is_some() {
            return Err(XmlError::StaleNamespace(ns));
        }
        let n = self.node_mut(node)?;
        if !n.is_element() {
            return Err(XmlError::InvalidNodeType);
        }
        let index = index.min(n.ns_def.len());
        n.ns_def.insert(index, ns);
        self.ns_mut(ns)?.owner = Some(node);
        Ok(())
    }

    /// Release a declaration that is no longer listed on any element
    pub fn free_ns(&mut self, ns: NsId) -> XmlResult<()> {
        let owner = self.ns(ns)?.owner;
        if let Some(owner) = owner {
            if let Ok(n) = self.node_mut(owner) {
                n.ns_def.retain(|&d| d != ns);
            }
        }
        self.release_ns_slot(ns);
        Ok(())
    }

    /// Release a list of declarations
    pub fn free_ns_list(&mut self, list: Vec<NsId>) -> XmlResult<()> {
        list.into_iter().try_for_each(|ns| self.free_ns(ns))
    }

    /// Find the declaration in scope at `node` for `prefix`
    ///
    /// Walks the element ancestors of `node`, checking each element's own
    /// declarations and, above the start node, the namespace the element
    /// itself uses. `xml` always resolves to the document's implicit
    /// declaration.
    pub fn search_ns(&self, node: NodeId, prefix: Option<&str>) -> XmlResult<Option<NsId>> {
        let start = self.node(node)?;
        if prefix == Some("xml") {
            return Ok(Some(self.document(start.doc)?.xml_ns));
        }

        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.node(id)?;
            match n.node_type {
                NodeType::EntityRef | NodeType::DocumentType => return Ok(None),
                NodeType::Element => {
                    for &ns in &n.ns_def {
                        if self.ns(ns)?.prefix() == prefix {
                            return Ok(Some(ns));
                        }
                    }
                    if id != node {
                        if let Some(ns) = n.ns {
                            if self.ns(ns)?.prefix() == prefix {
                                return Ok(Some(ns));
                            }
                        }
                    }
                }
                _ => {}
            }
            current = n.parent;
        }
        Ok(None)
    }

    /// Check that `ns` is what its prefix resolves to at `node`
    pub fn ns_in_scope(&self, node: NodeId, ns: NsId) -> XmlResult<bool> {
        let prefix = self.ns(ns)?.prefix();
        Ok(self.search_ns(node, prefix)? == Some(ns))
    }

    /// Find an in-scope declaration for `href`
    ///
    /// For attributes (or when `is_attribute` is set) a prefixed declaration
    /// is preferred: a default declaration only matches if nothing prefixed
    /// is found and it is itself in scope.
    pub fn search_ns_by_href(
        &self,
        node: NodeId,
        href: &str,
        is_attribute: bool,
    ) -> XmlResult<Option<NsId>> {
        let start = self.node(node)?;
        if start.node_type == NodeType::EntityRef {
            return Ok(None);
        }
        if href == XML_NAMESPACE {
            return Ok(Some(self.document(start.doc)?.xml_ns));
        }
        let is_attribute = is_attribute || start.node_type == NodeType::Attribute;

        // Scope is evaluated at the nearest element
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.node(id)?;
            if n.node_type == NodeType::Element {
                break;
            }
            current = n.parent;
        }
        let Some(element) = current else {
            return Ok(None);
        };

        let mut default_ns = None;
        while let Some(id) = current {
            let n = self.node(id)?;
            if n.node_type == NodeType::Element {
                let candidates = n
                    .ns_def
                    .iter()
                    .copied()
                    .chain(n.ns.filter(|_| id != element));
                for ns in candidates {
                    let decl = self.ns(ns)?;
                    if decl.href() != href {
                        continue;
                    }
                    if decl.prefix().is_none() && is_attribute {
                        default_ns.get_or_insert(ns);
                    } else if self.search_ns(element, decl.prefix())? == Some(ns) {
                        return Ok(Some(ns));
                    }
                }
            }
            current = n.parent;
        }

        match default_ns {
            Some(ns) if self.search_ns(element, None)? == Some(ns) => Ok(Some(ns)),
            _ => Ok(None),
        }
    }
}
