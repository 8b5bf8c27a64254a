//! Tail text handling
//!
//! Text and CDATA siblings that directly follow an element are its "tail".
//! XInclude boundary markers inside such a run are skipped, not treated as
//! the end of the run.

use fos_xml::{NodeId, TreeOperations, XmlHeap, XmlResult};

/// First text-like node at or after `node`, skipping XInclude markers
///
/// `None` as soon as any other node type is met.
pub fn text_node_or_skip<P>(heap: &XmlHeap<P>, node: Option<NodeId>) -> XmlResult<Option<NodeId>> {
    let mut current = node;
    while let Some(id) = current {
        let n = heap.node(id)?;
        if n.node_type().is_text_like() {
            return Ok(Some(id));
        }
        if !n.node_type().is_xinclude_marker() {
            return Ok(None);
        }
        current = n.next_sibling();
    }
    Ok(None)
}

/// Last node of `node`'s tail run, or `node` itself if it has no tail
pub fn tail_end<P>(heap: &XmlHeap<P>, node: NodeId) -> XmlResult<NodeId> {
    let mut end = node;
    let mut current = text_node_or_skip(heap, heap.node(node)?.next_sibling())?;
    while let Some(text) = current {
        end = text;
        current = text_node_or_skip(heap, heap.node(text)?.next_sibling())?;
    }
    Ok(end)
}

/// Move the text run starting at `tail` to directly after `target`
pub fn move_tail<P>(heap: &mut XmlHeap<P>, tail: Option<NodeId>, target: NodeId) -> XmlResult<()> {
    move_tail_with(heap, tail, target, |_, _| Ok(()))
}

/// [`move_tail`], calling `before_move` on each text node before it moves
pub fn move_tail_with<P, F>(
    heap: &mut XmlHeap<P>,
    tail: Option<NodeId>,
    target: NodeId,
    mut before_move: F,
) -> XmlResult<()>
where
    F: FnMut(&XmlHeap<P>, NodeId) -> XmlResult<()>,
{
    let mut target = target;
    let mut current = text_node_or_skip(heap, tail)?;
    while let Some(text) = current {
        let next = heap.node(text)?.next_sibling();
        let next = text_node_or_skip(heap, next)?;
        before_move(heap, text)?;
        heap.add_next_sibling(target, text)?;
        target = text;
        current = next;
    }
    Ok(())
}

/// Copy the text run starting at `tail` to directly after `target`
///
/// Copies are created in `target`'s document.
pub fn copy_tail<P>(heap: &mut XmlHeap<P>, tail: Option<NodeId>, target: NodeId) -> XmlResult<()> {
    let doc = heap.node(target)?.doc();
    let mut target = target;
    let mut current = text_node_or_skip(heap, tail)?;
    while let Some(text) = current {
        let copy = heap.copy_text(text, doc)?;
        heap.add_next_sibling(target, copy)?;
        target = copy;
        let next = heap.node(text)?.next_sibling();
        current = text_node_or_skip(heap, next)?;
    }
    Ok(())
}

/// Unlink and free the text run starting at `node`
///
/// Returns the number of nodes freed.
pub fn remove_text<P>(heap: &mut XmlHeap<P>, node: Option<NodeId>) -> XmlResult<usize> {
    let mut freed = 0;
    let mut current = text_node_or_skip(heap, node)?;
    while let Some(text) = current {
        let next = heap.node(text)?.next_sibling();
        let next = text_node_or_skip(heap, next)?;
        heap.unlink(text)?;
        freed += heap.free_node(text)?;
        current = next;
    }
    Ok(freed)
}

/// Concatenated content of the text run starting at `node`
///
/// `None` if there is no text node in the run at all.
pub fn collect_text<P>(heap: &XmlHeap<P>, node: Option<NodeId>) -> XmlResult<Option<String>> {
    let mut current = text_node_or_skip(heap, node)?;
    if current.is_none() {
        return Ok(None);
    }
    let mut text = String::new();
    while let Some(id) = current {
        let n = heap.node(id)?;
        text.push_str(n.content().unwrap_or_default());
        current = text_node_or_skip(heap, n.next_sibling())?;
    }
    Ok(Some(text))
}
