//! Proxy objects and the node ↔ proxy registry
//!
//! A node's opaque slot holds at most one [`Proxy`]. The slot keeps the
//! proxy's shared state alive; the proxy in turn records which node and
//! document it stands for. Nothing else tracks "is this node observed".

use std::sync::Arc;

use fos_xml::{DocId, NodeId, XmlHeap};
use parking_lot::Mutex;

use crate::{ProxyError, ProxyResult, dealloc};

/// Node heap whose opaque slots hold proxies
pub type ProxyHeap = XmlHeap<Proxy>;

#[derive(Debug, Default)]
struct Binding {
    node: Option<NodeId>,
    doc: Option<DocId>,
}

#[derive(Debug, Default)]
struct ProxyInner {
    binding: Mutex<Binding>,
}

/// Managed handle representing one node
///
/// Clones share identity: two `Proxy` values are the same proxy iff
/// [`Proxy::ptr_eq`] holds.
#[derive(Debug, Clone, Default)]
pub struct Proxy(Arc<ProxyInner>);

impl Proxy {
    /// Create an unbound proxy
    pub fn new() -> Self {
        Self::default()
    }

    /// Node this proxy represents
    pub fn node(&self) -> ProxyResult<NodeId> {
        self.try_node().ok_or(ProxyError::InvalidProxy)
    }

    pub fn try_node(&self) -> Option<NodeId> {
        self.0.binding.lock().node
    }

    /// Document the proxy was last bound to
    pub fn document(&self) -> ProxyResult<DocId> {
        self.0.binding.lock().doc.ok_or(ProxyError::InvalidProxy)
    }

    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Identity key, stable for the proxy's lifetime
    pub fn key(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub(crate) fn bind(&self, node: NodeId, doc: DocId) {
        let mut binding = self.0.binding.lock();
        binding.node = Some(node);
        binding.doc = Some(doc);
    }

    pub(crate) fn set_document(&self, doc: DocId) {
        self.0.binding.lock().doc = Some(doc);
    }

    pub(crate) fn clear_node(&self) {
        self.0.binding.lock().node = None;
    }
}

/// Node ↔ proxy association stored in the node's opaque slot
pub trait ProxyRegistry {
    /// Bind `proxy` to `node`
    fn register_proxy(&mut self, proxy: &Proxy, node: NodeId) -> ProxyResult<()>;

    /// Clear the slot of the node `proxy` represents
    fn unregister_proxy(&mut self, proxy: &Proxy) -> ProxyResult<()>;

    /// Proxy registered for `node`, if any
    fn get_proxy(&self, node: NodeId) -> Option<Proxy>;

    fn has_proxy(&self, node: NodeId) -> bool {
        self.get_proxy(node).is_some()
    }
}

impl ProxyRegistry for ProxyHeap {
    fn register_proxy(&mut self, proxy: &Proxy, node: NodeId) -> ProxyResult<()> {
        let doc = {
            let n = self.node(node)?;
            if n.private().is_some() {
                return Err(ProxyError::DoubleRegistration { node });
            }
            n.doc()
        };
        // A proxy stands for one node at a time
        if let Some(bound) = proxy.try_node() {
            if self.get_proxy(bound).is_some_and(|p| p.ptr_eq(proxy)) {
                return Err(ProxyError::DoubleRegistration { node: bound });
            }
        }

        self.set_private(node, Some(proxy.clone()))?;
        proxy.bind(node, doc);
        tracing::trace!("Registered proxy {:#x} for {}", proxy.key(), node);
        Ok(())
    }

    fn unregister_proxy(&mut self, proxy: &Proxy) -> ProxyResult<()> {
        let unknown = ProxyError::UnknownProxy { proxy: proxy.key() };
        let node = proxy.try_node().ok_or_else(|| unknown.clone())?;
        match self.private(node) {
            Ok(Some(current)) if current.ptr_eq(proxy) => {}
            _ => return Err(unknown),
        }
        self.set_private(node, None)?;
        tracing::trace!("Unregistered proxy {:#x} from {}", proxy.key(), node);
        Ok(())
    }

    fn get_proxy(&self, node: NodeId) -> Option<Proxy> {
        self.private(node).ok().flatten().cloned()
    }
}

/// Unregister `proxy` and drop its node reference
pub fn detach_proxy(heap: &mut ProxyHeap, proxy: &Proxy) -> ProxyResult<()> {
    heap.unregister_proxy(proxy)?;
    proxy.clear_node();
    Ok(())
}

/// Release a proxy that is going away
///
/// Detaches the proxy, then tries to free the subtree it kept alive.
/// Returns whether memory was freed.
pub fn release_proxy(heap: &mut ProxyHeap, proxy: &Proxy) -> ProxyResult<bool> {
    let node = proxy.node()?;
    detach_proxy(heap, proxy)?;
    Ok(dealloc::attempt_deallocation(heap, Some(node)))
}

/// Whether the proxy still stands for a live node of `heap`
pub fn is_valid(heap: &ProxyHeap, proxy: &Proxy) -> bool {
    proxy
        .try_node()
        .and_then(|node| heap.get_proxy(node))
        .is_some_and(|p| p.ptr_eq(proxy))
}

/// Node of a proxy, checked against the heap
pub(crate) fn live_node(heap: &ProxyHeap, proxy: &Proxy) -> ProxyResult<NodeId> {
    if is_valid(heap, proxy) {
        proxy.node()
    } else {
        Err(ProxyError::InvalidProxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_xml::{Dict, TreeOperations};

    fn setup() -> (ProxyHeap, DocId, NodeId) {
        let mut heap = ProxyHeap::new();
        let doc = heap.new_document(Dict::shared()).unwrap();
        let root = heap.new_element(doc, "root").unwrap();
        heap.set_root_element(doc, root).unwrap();
        (heap, doc, root)
    }

    #[test]
    fn test_register_and_lookup() {
        let (mut heap, doc, root) = setup();
        let proxy = Proxy::new();
        assert!(proxy.node().is_err());

        heap.register_proxy(&proxy, root).unwrap();
        assert_eq!(proxy.node().unwrap(), root);
        assert_eq!(proxy.document().unwrap(), doc);
        assert!(heap.get_proxy(root).unwrap().ptr_eq(&proxy));
        assert!(is_valid(&heap, &proxy));
    }

    #[test]
    fn test_double_registration() {
        let (mut heap, doc, root) = setup();
        let first = Proxy::new();
        let second = Proxy::new();
        heap.register_proxy(&first, root).unwrap();

        assert_eq!(
            heap.register_proxy(&second, root),
            Err(ProxyError::DoubleRegistration { node: root })
        );

        // Same proxy for a second node
        let other = heap.new_element(doc, "other").unwrap();
        assert_eq!(
            heap.register_proxy(&first, other),
            Err(ProxyError::DoubleRegistration { node: root })
        );
        assert!(!heap.has_proxy(other));
    }

    #[test]
    fn test_unregister_unknown() {
        let (mut heap, _doc, root) = setup();
        let proxy = Proxy::new();
        assert_eq!(
            heap.unregister_proxy(&proxy),
            Err(ProxyError::UnknownProxy { proxy: proxy.key() })
        );

        heap.register_proxy(&proxy, root).unwrap();
        heap.unregister_proxy(&proxy).unwrap();
        assert!(!heap.has_proxy(root));
        // Slot is empty now, a second unregister is a usage error
        assert!(matches!(
            heap.unregister_proxy(&proxy),
            Err(ProxyError::UnknownProxy { .. })
        ));
    }

    #[test]
    fn test_reregister_after_unregister() {
        let (mut heap, _doc, root) = setup();
        let old = Proxy::new();
        heap.register_proxy(&old, root).unwrap();
        detach_proxy(&mut heap, &old).unwrap();
        assert_eq!(old.node(), Err(ProxyError::InvalidProxy));

        let new = Proxy::new();
        heap.register_proxy(&new, root).unwrap();
        assert!(heap.get_proxy(root).unwrap().ptr_eq(&new));
    }

    #[test]
    fn test_release_frees_detached_node() {
        let (mut heap, doc, root) = setup();
        let child = heap.new_element(doc, "child").unwrap();
        heap.add_child(root, child).unwrap();
        let proxy = Proxy::new();
        heap.register_proxy(&proxy, child).unwrap();

        heap.unlink(child).unwrap();
        assert!(heap.contains(child));
        assert_eq!(release_proxy(&mut heap, &proxy), Ok(true));
        assert!(!heap.contains(child));
        assert!(!is_valid(&heap, &proxy));
    }

    #[test]
    fn test_release_keeps_attached_node() {
        let (mut heap, _doc, root) = setup();
        let proxy = Proxy::new();
        heap.register_proxy(&proxy, root).unwrap();
        assert_eq!(release_proxy(&mut heap, &proxy), Ok(false));
        assert!(heap.contains(root));
    }

    #[test]
    fn test_clones_share_identity() {
        let a = Proxy::new();
        let b = a.clone();
        let c = Proxy::new();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.key(), b.key());
        assert!(!a.ptr_eq(&c));
    }
}
