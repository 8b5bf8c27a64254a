//! Tree edits that keep proxies, namespaces and tails consistent
//!
//! Each edit relinks a node, carries its tail text along and then repairs
//! the moved subtree for its new position with
//! [`move_node_to_document`](crate::reconcile::move_node_to_document).
//! If the repair fails the edit puts every node it moved back where it was,
//! so a failed edit leaves the tree as it found it.

use fos_xml::{DocId, NodeId, TreeOperations, XmlResult};

use crate::reconcile::{self, move_node_to_document};
use crate::{ProxyConfig, ProxyError, ProxyHeap, ProxyResult, dealloc, tail};

fn check_not_ancestor(
    heap: &ProxyHeap,
    node: NodeId,
    target: NodeId,
    msg: &'static str,
) -> ProxyResult<()> {
    if heap.is_ancestor_or_self(node, target)? {
        return Err(ProxyError::HierarchyRequest(msg));
    }
    Ok(())
}

/// Where a node sat before it was moved
#[derive(Debug, Clone, Copy)]
enum Place {
    After(NodeId),
    FirstChildOf(NodeId),
    Before(NodeId),
    Alone(DocId),
}

/// Nodes moved by one edit, with the place each one left
#[derive(Debug, Default)]
struct Relinks {
    undo: Vec<(NodeId, Place)>,
}

impl Relinks {
    fn record(&mut self, heap: &ProxyHeap, node: NodeId) -> XmlResult<()> {
        let n = heap.node(node)?;
        let place = match (n.prev_sibling(), n.parent(), n.next_sibling()) {
            (Some(prev), _, _) => Place::After(prev),
            (None, Some(parent), _) => Place::FirstChildOf(parent),
            (None, None, Some(next)) => Place::Before(next),
            (None, None, None) => Place::Alone(n.doc()),
        };
        self.undo.push((node, place));
        Ok(())
    }

    /// Move `node` with `link` and bring its tail along
    fn carry<F>(&mut self, heap: &mut ProxyHeap, node: NodeId, link: F) -> ProxyResult<()>
    where
        F: FnOnce(&mut ProxyHeap) -> XmlResult<()>,
    {
        let next = heap.node(node)?.next_sibling();
        self.record(heap, node)?;
        link(heap)?;
        tail::move_tail_with(heap, next, node, |heap, text| self.record(heap, text))?;
        Ok(())
    }

    /// Pass `result` through, undoing the moves first if it is an error
    fn finish<T>(self, heap: &mut ProxyHeap, result: ProxyResult<T>) -> ProxyResult<T> {
        if let Err(e) = &result {
            tracing::debug!("Edit failed, restoring {} nodes: {}", self.undo.len(), e);
            self.restore(heap);
        }
        result
    }

    fn restore(self, heap: &mut ProxyHeap) {
        let mut restored = Vec::with_capacity(self.undo.len());
        for (node, place) in self.undo.into_iter().rev() {
            match put_back(heap, node, place) {
                Ok(()) => restored.push(node),
                Err(e) => tracing::error!("Could not put {} back: {}", node, e),
            }
        }
        for node in restored {
            let Ok(doc) = heap.node(node).map(|n| n.doc()) else {
                continue;
            };
            let count = reconcile::count_proxies(heap, node);
            if count > 0 {
                reconcile::fix_element_document(heap, node, doc, count);
            }
        }
    }
}

fn put_back(heap: &mut ProxyHeap, node: NodeId, place: Place) -> XmlResult<()> {
    match place {
        Place::After(prev) => heap.add_next_sibling(prev, node),
        Place::FirstChildOf(parent) => match heap.node(parent)?.first_child() {
            Some(first) => heap.add_prev_sibling(first, node),
            None => heap.add_child(parent, node),
        },
        Place::Before(next) => heap.add_prev_sibling(next, node),
        Place::Alone(doc) => {
            heap.unlink(node)?;
            heap.set_document(node, doc)
        }
    }
}

/// Append `child` as the last child of `parent`
pub fn append_child(
    heap: &mut ProxyHeap,
    config: &ProxyConfig,
    parent: NodeId,
    child: NodeId,
) -> ProxyResult<()> {
    check_not_ancestor(heap, child, parent, "cannot append parent to itself")?;
    let source_doc = heap.node(child)?.doc();

    let mut relinks = Relinks::default();
    let result = relinks
        .carry(heap, child, |heap| heap.add_child(parent, child))
        .and_then(|()| {
            let dest_doc = heap.node(parent)?.doc();
            move_node_to_document(heap, config, dest_doc, source_doc, child)
        });
    relinks.finish(heap, result)
}

/// Insert `child` before the first element-like child of `parent`
pub fn prepend_child(
    heap: &mut ProxyHeap,
    config: &ProxyConfig,
    parent: NodeId,
    child: NodeId,
) -> ProxyResult<()> {
    check_not_ancestor(heap, child, parent, "cannot append parent to itself")?;
    let source_doc = heap.node(child)?.doc();

    let mut first = None;
    for id in heap.children(parent)? {
        if heap.node(id)?.node_type().is_element_like() {
            first = Some(id);
            break;
        }
    }

    let mut relinks = Relinks::default();
    let result = relinks
        .carry(heap, child, |heap| match first {
            Some(first) => heap.add_prev_sibling(first, child),
            None => heap.add_child(parent, child),
        })
        .and_then(|()| {
            let dest_doc = heap.node(parent)?.doc();
            move_node_to_document(heap, config, dest_doc, source_doc, child)
        });
    relinks.finish(heap, result)
}

/// Move `sibling` to directly after `element`
pub fn add_next_sibling(
    heap: &mut ProxyHeap,
    config: &ProxyConfig,
    element: NodeId,
    sibling: NodeId,
) -> ProxyResult<()> {
    add_sibling(heap, config, element, sibling, true)
}

/// Move `sibling` to directly before `element`
pub fn add_previous_sibling(
    heap: &mut ProxyHeap,
    config: &ProxyConfig,
    element: NodeId,
    sibling: NodeId,
) -> ProxyResult<()> {
    add_sibling(heap, config, element, sibling, false)
}

fn add_sibling(
    heap: &mut ProxyHeap,
    config: &ProxyConfig,
    element: NodeId,
    sibling: NodeId,
    after: bool,
) -> ProxyResult<()> {
    if element == sibling {
        return Ok(());
    }
    check_not_ancestor(heap, sibling, element, "cannot add ancestor as sibling")?;
    let source_doc = heap.node(sibling)?.doc();
    // after the element's own tail, which stays with the element
    let anchor = if after { Some(tail::tail_end(heap, element)?) } else { None };

    let mut relinks = Relinks::default();
    let result = relinks
        .carry(heap, sibling, |heap| match anchor {
            Some(anchor) => heap.add_next_sibling(anchor, sibling),
            None => heap.add_prev_sibling(element, sibling),
        })
        .and_then(|()| {
            let dest_doc = heap.node(element)?.doc();
            move_node_to_document(heap, config, dest_doc, source_doc, sibling)
        });
    relinks.finish(heap, result)
}

/// Put `new` where `old` is
///
/// `old` keeps its tail and stays alive as a self-contained fragment.
pub fn replace_node(
    heap: &mut ProxyHeap,
    config: &ProxyConfig,
    old: NodeId,
    new: NodeId,
) -> ProxyResult<()> {
    if old == new {
        return Ok(());
    }
    check_not_ancestor(heap, new, old, "cannot replace a node by its ancestor")?;
    let dest_doc = heap.node(old)?.doc();
    let source_doc = heap.node(new)?.doc();

    let mut relinks = Relinks::default();
    let result = relinks
        .carry(heap, new, |heap| heap.add_prev_sibling(old, new))
        // old's tail is read only now, `new` may have been part of it
        .and_then(|()| relinks.carry(heap, old, |heap| heap.unlink(old)))
        // old first: its repair only declares on itself, so undoing the
        // links afterwards keeps its references valid
        .and_then(|()| move_node_to_document(heap, config, dest_doc, dest_doc, old))
        .and_then(|()| move_node_to_document(heap, config, dest_doc, source_doc, new));
    relinks.finish(heap, result)
}

/// Unlink `node` with its tail and free it if nothing observes it
///
/// A fragment that survives is made self-contained: namespaces it used
/// from its former ancestors are declared on its top. Returns whether
/// memory was freed.
pub fn remove_node(heap: &mut ProxyHeap, config: &ProxyConfig, node: NodeId) -> ProxyResult<bool> {
    let mut relinks = Relinks::default();
    let result = relinks
        .carry(heap, node, |heap| heap.unlink(node))
        .and_then(|()| {
            if dealloc::attempt_deallocation(heap, Some(node)) {
                return Ok(true);
            }
            let doc = heap.node(node)?.doc();
            move_node_to_document(heap, config, doc, doc, node).map(|()| false)
        });
    relinks.finish(heap, result)
}
