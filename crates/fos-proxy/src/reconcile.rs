//! Document migration and namespace reconciliation
//!
//! After a subtree was relinked (possibly under another document) its
//! namespace references may point at declarations that are no longer in
//! scope, some of its declarations may duplicate ones its new ancestors
//! already make, and its interned strings may belong to the source
//! document's dictionary. [`move_node_to_document`] repairs all three and
//! finally rebinds the proxies of the moved nodes to the new document.

use std::sync::Arc;

use fos_xml::{Dict, DocId, NodeId, NodeType, NsId};

use crate::{ProxyConfig, ProxyHeap, ProxyRegistry, ProxyResult};

/// Old declaration → replacement, in insertion order
#[derive(Debug, Default)]
pub struct NsCache {
    entries: Vec<(NsId, NsId)>,
}

impl NsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, old: NsId, new: NsId) {
        self.entries.push((old, new));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replacement for `old`
    ///
    /// For attributes a mapping that would drop the prefix of a prefixed
    /// declaration is skipped.
    fn lookup(&self, heap: &ProxyHeap, old: NsId, is_attribute: bool) -> ProxyResult<Option<NsId>> {
        for &(from, to) in &self.entries {
            if from != old {
                continue;
            }
            if is_attribute
                && heap.ns(from)?.prefix().is_some()
                && heap.ns(to)?.prefix().is_none()
            {
                continue;
            }
            return Ok(Some(to));
        }
        Ok(None)
    }
}

/// Namespace changes made while repairing a moved subtree
///
/// Until [`commit`](Self::commit) every change can be undone with
/// [`roll_back`](Self::roll_back), which puts the subtree's declarations and
/// references back exactly as they were.
#[derive(Debug, Default)]
pub struct NsJournal {
    /// (element, index in its declaration list, declaration)
    stripped: Vec<(NodeId, usize, NsId)>,
    /// (element or attribute, previous reference)
    rewritten: Vec<(NodeId, Option<NsId>)>,
    declared: Vec<NsId>,
}

impl NsJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declarations taken off their element so far
    pub fn stripped(&self) -> impl Iterator<Item = NsId> + '_ {
        self.stripped.iter().map(|&(_, _, ns)| ns)
    }

    /// Free the stripped declarations; nothing refers to them any more
    pub fn commit(self, heap: &mut ProxyHeap) -> ProxyResult<()> {
        if !self.stripped.is_empty() {
            tracing::debug!("Freeing {} redundant declarations", self.stripped.len());
        }
        let garbage = self.stripped.into_iter().map(|(_, _, ns)| ns).collect();
        heap.free_ns_list(garbage)?;
        Ok(())
    }

    /// Undo every recorded change, newest first
    pub fn roll_back(self, heap: &mut ProxyHeap) {
        let mut failed = 0;
        for (target, ns) in self.rewritten.into_iter().rev() {
            failed += usize::from(heap.set_ns(target, ns).is_err());
        }
        for ns in self.declared.into_iter().rev() {
            failed += usize::from(heap.free_ns(ns).is_err());
        }
        for (element, index, ns) in self.stripped.into_iter().rev() {
            failed += usize::from(heap.insert_ns_def(element, index, ns).is_err());
        }
        if failed > 0 {
            tracing::error!("Namespace rollback left {} changes in place", failed);
        }
    }
}

/// Take declarations off `element` that its ancestors already make
///
/// Every declaration is recorded in `cache`: stripped ones map to the
/// ancestor's equivalent, kept ones to themselves. Stripped declarations
/// are recorded in `journal`, not freed.
pub fn strip_redundant_namespace_declarations(
    heap: &mut ProxyHeap,
    element: NodeId,
    cache: &mut NsCache,
    journal: &mut NsJournal,
) -> ProxyResult<()> {
    let (parent, ns_def) = {
        let n = heap.node(element)?;
        (n.parent(), n.ns_def().to_vec())
    };

    for ns in ns_def {
        let equivalent = match parent {
            Some(parent) => {
                let href = heap.ns(ns)?.href_ref().clone();
                heap.search_ns_by_href(parent, &href, false)?
            }
            None => None,
        };
        let equivalent = match equivalent {
            Some(eq) if !shadowed_on(heap, element, ns, eq)? => Some(eq),
            _ => None,
        };

        match equivalent {
            Some(eq) => {
                let index = heap
                    .node(element)?
                    .ns_def()
                    .iter()
                    .position(|&d| d == ns)
                    .unwrap_or_default();
                cache.push(ns, eq);
                heap.remove_ns_def(element, ns)?;
                journal.stripped.push((element, index, ns));
                tracing::trace!("Stripped redundant {} from {} (now {})", ns, element, eq);
            }
            None => cache.push(ns, ns),
        }
    }
    Ok(())
}

/// Whether another declaration on `element` hides `candidate`'s prefix
fn shadowed_on(heap: &ProxyHeap, element: NodeId, own: NsId, candidate: NsId) -> ProxyResult<bool> {
    let prefix = heap.ns(candidate)?.prefix();
    for &ns in heap.node(element)?.ns_def() {
        if ns != own && heap.ns(ns)?.prefix() == prefix {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Find a declaration for `href` in scope at `element`, or declare one there
///
/// Attributes never get a default namespace. A new declaration uses
/// `prefix` if given, else the configured prefix for `href`, else a
/// generated one, and skips any prefix that is already in scope.
pub fn find_or_build_node_ns(
    heap: &mut ProxyHeap,
    config: &ProxyConfig,
    element: NodeId,
    href: &str,
    prefix: Option<&str>,
    is_attribute: bool,
) -> ProxyResult<NsId> {
    find_or_build(heap, config, element, href, prefix, is_attribute).map(|(ns, _)| ns)
}

/// Like [`find_or_build_node_ns`], also telling whether it declared
fn find_or_build(
    heap: &mut ProxyHeap,
    config: &ProxyConfig,
    element: NodeId,
    href: &str,
    prefix: Option<&str>,
    is_attribute: bool,
) -> ProxyResult<(NsId, bool)> {
    if let Some(ns) = heap.search_ns_by_href(element, href, is_attribute)? {
        if !(is_attribute && heap.ns(ns)?.prefix().is_none()) {
            return Ok((ns, false));
        }
    }

    let doc = heap.node(element)?.doc();
    let mut prefix = match prefix.filter(|p| !p.is_empty()) {
        Some(p) => p.to_owned(),
        None => match config.default_prefix(href) {
            Some(p) => p.to_owned(),
            None => heap.build_new_prefix(doc)?,
        },
    };
    while heap.search_ns(element, Some(&prefix))?.is_some() {
        prefix = heap.build_new_prefix(doc)?;
    }

    let ns = heap.new_ns(element, href, Some(&prefix))?;
    tracing::debug!("Declared {}={} on {}", prefix, href, element);
    Ok((ns, true))
}

/// Repair a subtree after it was relinked into `dest_doc`
///
/// `source_doc` is the document the subtree belonged to before the move;
/// it may equal `dest_doc`. The subtree's owning-document fields must
/// already point at `dest_doc`.
///
/// Either every repair is made or none is: on error the subtree's
/// declarations, references and strings are as they were on entry. The
/// proxies of the subtree follow its owning document in both cases.
pub fn move_node_to_document(
    heap: &mut ProxyHeap,
    config: &ProxyConfig,
    dest_doc: DocId,
    source_doc: DocId,
    node: NodeId,
) -> ProxyResult<()> {
    let result = reconcile(heap, config, dest_doc, source_doc, node);

    // 5) proxies follow their nodes
    let proxy_count = count_proxies(heap, node);
    if proxy_count > 0 {
        let doc = heap.node(node).map(|n| n.doc()).unwrap_or(dest_doc);
        fix_element_document(heap, node, doc, proxy_count);
    }
    result
}

fn reconcile(
    heap: &mut ProxyHeap,
    config: &ProxyConfig,
    dest_doc: DocId,
    source_doc: DocId,
    node: NodeId,
) -> ProxyResult<()> {
    let mut journal = NsJournal::new();
    let planned = fix_namespaces(heap, config, node, &mut journal).and_then(|()| {
        let source_dict = heap.dict(source_doc)?.clone();
        let dest_dict = heap.dict(dest_doc)?.clone();
        plan_dict_names(heap, node, &source_dict, &dest_dict)
    });
    let names = match planned {
        Ok(names) => names,
        Err(e) => {
            tracing::debug!("Rolling back move of {}: {}", node, e);
            journal.roll_back(heap);
            return Err(e);
        }
    };

    // 3) nothing refers to the stripped declarations any more
    journal.commit(heap)?;

    // 4) strings interned in another dictionary
    if !names.is_empty() {
        tracing::debug!("Re-interning {} strings below {}", names.len(), node);
        apply_dict_names(heap, names)?;
    }
    Ok(())
}

/// Steps 1 and 2 for every element below `node`
fn fix_namespaces(
    heap: &mut ProxyHeap,
    config: &ProxyConfig,
    node: NodeId,
    journal: &mut NsJournal,
) -> ProxyResult<()> {
    if !heap.node(node)?.node_type().is_element_or_xinclude() {
        return Ok(());
    }
    let mut cache = NsCache::new();

    let ids: Vec<NodeId> = heap.walk(node, false).collect();
    for id in ids {
        let n = heap.node(id)?;
        if !n.node_type().is_element_or_xinclude() {
            continue;
        }
        let attributes = n.attributes().to_vec();
        let has_ns_def = !n.ns_def().is_empty();

        // 1) declarations already made by the new ancestors
        if has_ns_def {
            strip_redundant_namespace_declarations(heap, id, &mut cache, journal)?;
        }

        // 2) references of the element, then of its attributes
        fix_ns_reference(heap, config, node, id, id, &mut cache, journal)?;
        for attr in attributes {
            fix_ns_reference(heap, config, node, id, attr, &mut cache, journal)?;
        }
    }
    Ok(())
}

/// Proxies registered on `top`'s subtree, attributes included
pub(crate) fn count_proxies(heap: &ProxyHeap, top: NodeId) -> usize {
    heap.walk(top, true).filter(|&id| heap.has_proxy(id)).count()
}

/// Point `target`'s namespace reference at a declaration in scope
fn fix_ns_reference(
    heap: &mut ProxyHeap,
    config: &ProxyConfig,
    start: NodeId,
    element: NodeId,
    target: NodeId,
    cache: &mut NsCache,
    journal: &mut NsJournal,
) -> ProxyResult<()> {
    let (old, is_attribute) = {
        let n = heap.node(target)?;
        match n.ns() {
            Some(ns) => (ns, n.node_type() == NodeType::Attribute),
            None => return Ok(()),
        }
    };

    let cached = match cache.lookup(heap, old, is_attribute)? {
        Some(ns) if heap.ns_in_scope(target, ns)? => Some(ns),
        _ => None,
    };
    let new = match cached {
        Some(ns) => ns,
        None => {
            let (href, prefix) = {
                let decl = heap.ns(old)?;
                (decl.href_ref().clone(), decl.prefix_ref().cloned())
            };
            let (mut ns, declared) =
                find_or_build(heap, config, start, &href, prefix.as_deref(), is_attribute)?;
            if declared {
                journal.declared.push(ns);
            }
            if !heap.ns_in_scope(target, ns)? {
                // hidden below the top by a declaration inside the subtree
                let (inner, declared) =
                    find_or_build(heap, config, element, &href, prefix.as_deref(), is_attribute)?;
                if declared {
                    journal.declared.push(inner);
                }
                ns = inner;
            }
            cache.push(old, ns);
            ns
        }
    };
    if new != old {
        heap.set_ns(target, Some(new))?;
        journal.rewritten.push((target, Some(old)));
    }
    Ok(())
}

/// A string slot of a node or declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictSlot {
    Name(NodeId),
    Content(NodeId),
    Href(NsId),
    Prefix(NsId),
}

/// Intern into `dest` every string below `top` owned by `source`
///
/// Covers node names, text and attribute values, and namespace
/// declarations. Only `dest` is touched; the tree is left as it is, so a
/// failure here leaves nothing half done.
pub fn plan_dict_names(
    heap: &ProxyHeap,
    top: NodeId,
    source: &Arc<Dict>,
    dest: &Arc<Dict>,
) -> ProxyResult<Vec<(DictSlot, Arc<str>)>> {
    let mut plan = Vec::new();
    if Arc::ptr_eq(source, dest) {
        return Ok(plan);
    }

    for id in heap.walk(top, true) {
        let n = heap.node(id)?;
        if let Some(name) = n.name_ref().filter(|s| source.owns(s)) {
            plan.push((DictSlot::Name(id), dest.intern(name)?));
        }
        if let Some(content) = n.content_ref().filter(|s| source.owns(s)) {
            plan.push((DictSlot::Content(id), dest.intern(content)?));
        }
        for &ns in n.ns_def() {
            let decl = heap.ns(ns)?;
            if source.owns(decl.href_ref()) {
                plan.push((DictSlot::Href(ns), dest.intern(decl.href_ref())?));
            }
            if let Some(prefix) = decl.prefix_ref().filter(|s| source.owns(s)) {
                plan.push((DictSlot::Prefix(ns), dest.intern(prefix)?));
            }
        }
    }
    Ok(plan)
}

/// Swap in the strings produced by [`plan_dict_names`]
pub fn apply_dict_names(heap: &mut ProxyHeap, plan: Vec<(DictSlot, Arc<str>)>) -> ProxyResult<()> {
    for (slot, interned) in plan {
        match slot {
            DictSlot::Name(id) => heap.node_mut(id)?.set_name_ref(interned),
            DictSlot::Content(id) => heap.node_mut(id)?.set_content_ref(interned),
            DictSlot::Href(ns) => heap.ns_mut(ns)?.set_href_ref(interned),
            DictSlot::Prefix(ns) => heap.ns_mut(ns)?.set_prefix_ref(interned),
        }
    }
    Ok(())
}

/// Re-intern every string below `top` owned by `source` into `dest`
///
/// Returns the number of strings replaced.
pub fn fix_thread_dict_names(
    heap: &mut ProxyHeap,
    top: NodeId,
    source: &Arc<Dict>,
    dest: &Arc<Dict>,
) -> ProxyResult<usize> {
    let plan = plan_dict_names(heap, top, source, dest)?;
    let replaced = plan.len();
    apply_dict_names(heap, plan)?;
    Ok(replaced)
}

/// Rebind the proxies of `top`'s subtree to `doc`
///
/// Stops once `proxy_count` proxies were rebound.
pub fn fix_element_document(heap: &ProxyHeap, top: NodeId, doc: DocId, proxy_count: usize) {
    if proxy_count == 1 {
        if let Some(proxy) = heap.get_proxy(top) {
            proxy.set_document(doc);
            return;
        }
    }

    let mut remaining = proxy_count;
    for id in heap.walk(top, true) {
        if let Some(proxy) = heap.get_proxy(id) {
            proxy.set_document(doc);
            remaining -= 1;
            if remaining == 0 {
                return;
            }
        }
    }
}
