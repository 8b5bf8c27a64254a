//! Deallocation of detached subtrees
//!
//! A proxy anywhere in a detached fragment keeps the whole fragment alive,
//! so the decision to free looks at every ancestor and every descendant of
//! the node that was released. Not freeing is the normal outcome, not an
//! error.

use fos_xml::{NodeId, TreeOperations, XmlHeap, XmlResult};

use crate::tail;

/// Free the detached subtree around `node` if nothing observes it
///
/// Returns whether memory was freed.
pub fn attempt_deallocation<P>(heap: &mut XmlHeap<P>, node: Option<NodeId>) -> bool {
    let Some(node) = node else {
        return false;
    };
    match try_deallocate(heap, node) {
        Ok(freed) => freed,
        Err(e) => {
            tracing::debug!("Not freeing {}: {}", node, e);
            false
        }
    }
}

fn try_deallocate<P>(heap: &mut XmlHeap<P>, node: NodeId) -> XmlResult<bool> {
    let Some(top) = deallocation_top(heap, node)? else {
        return Ok(false);
    };
    let tail = heap.node(top)?.next_sibling();
    let tail_freed = tail::remove_text(heap, tail)?;
    let freed = heap.free_node(top)?;
    tracing::debug!(
        "Deallocated {} ({} nodes, {} tail nodes)",
        top,
        freed,
        tail_freed
    );
    Ok(true)
}

/// Top of the largest unobserved detached subtree containing `node`
///
/// `None` while the node is attached to a document or observed anywhere
/// in its ancestor chain or below the candidate top.
pub fn deallocation_top<P>(heap: &XmlHeap<P>, node: NodeId) -> XmlResult<Option<NodeId>> {
    let start = heap.node(node)?;
    if start.private().is_some() {
        tracing::trace!("Not freeing {}: proxy still exists", node);
        return Ok(None);
    }
    if start.node_type().is_document() {
        return Ok(None);
    }

    let mut top = node;
    let mut current = start.parent();
    while let Some(id) = current {
        let n = heap.node(id)?;
        if n.node_type().is_document() {
            tracing::trace!("Not freeing {}: still in document", node);
            return Ok(None);
        }
        if n.private().is_some() {
            tracing::trace!("Not freeing {}: ancestor {} has a proxy", node, id);
            return Ok(None);
        }
        top = id;
        current = n.parent();
    }

    if can_deallocate_child_nodes(heap, top)? {
        Ok(Some(top))
    } else {
        tracing::trace!("Not freeing {}: proxy below {}", node, top);
        Ok(None)
    }
}

/// Check that no node below `parent` (attributes included) has a proxy
///
/// Document-type and entity-reference subtrees are not entered.
pub fn can_deallocate_child_nodes<P>(heap: &XmlHeap<P>, parent: NodeId) -> XmlResult<bool> {
    heap.node(parent)?;
    for id in heap.walk(parent, true).skip(1) {
        if heap.node(id)?.private().is_some() {
            return Ok(false);
        }
    }
    Ok(true)
}
