//! Comprehensive tests for fos-proxy
//!
//! End-to-end scenarios through the engine: registration, moves between
//! documents, removal and deallocation.

use std::sync::Arc;

use fos_proxy::xml::{Dict, DocId, NodeId, TreeOperations};
use fos_proxy::{Proxy, ProxyConfig, ProxyEngine, ProxyError, ProxyRegistry};

fn document(engine: &mut ProxyEngine) -> (DocId, NodeId) {
    let doc = engine.new_document().unwrap();
    let heap = engine.heap_mut();
    let root = heap.new_element(doc, "root").unwrap();
    heap.set_root_element(doc, root).unwrap();
    (doc, root)
}

fn resolved_href(engine: &ProxyEngine, node: NodeId) -> Option<String> {
    let heap = engine.heap();
    let ns = heap.node(node).unwrap().ns()?;
    let prefix = heap.ns(ns).unwrap().prefix();
    let resolved = heap.search_ns(node, prefix).unwrap()?;
    assert_eq!(resolved, ns, "namespace reference out of scope");
    Some(heap.ns(resolved).unwrap().href().to_owned())
}

// ============================================================================
// REGISTRY
// ============================================================================

#[test]
fn test_one_proxy_per_node() {
    let mut engine = ProxyEngine::default();
    let (_doc, root) = document(&mut engine);
    let first = engine.proxy_for(root).unwrap();
    let second = Proxy::new();

    assert_eq!(
        engine.register_proxy(&second, root),
        Err(ProxyError::DoubleRegistration { node: root })
    );
    engine.unregister_proxy(&first).unwrap();
    engine.register_proxy(&second, root).unwrap();
    assert!(engine.get_proxy(root).unwrap().ptr_eq(&second));
}

#[test]
fn test_get_proxy_on_empty_slot() {
    let mut engine = ProxyEngine::default();
    let (_doc, root) = document(&mut engine);
    assert!(engine.get_proxy(root).is_none());
    assert!(!engine.heap().has_proxy(root));
}

// ============================================================================
// MOVING BETWEEN DOCUMENTS
// ============================================================================

#[test]
fn test_move_declares_namespace_in_destination() {
    // A: <root xmlns:a="urn:x"><a:child/></root>, B: <root/>
    let mut engine = ProxyEngine::default();
    let (doc_a, root_a) = document(&mut engine);
    let (doc_b, root_b) = document(&mut engine);
    let heap = engine.heap_mut();
    let a = heap.new_ns(root_a, "urn:x", Some("a")).unwrap();
    let child = heap.new_element(doc_a, "child").unwrap();
    heap.add_child(root_a, child).unwrap();
    heap.set_ns(child, Some(a)).unwrap();
    let dict_a = heap.dict(doc_a).unwrap().clone();
    let dict_b = heap.dict(doc_b).unwrap().clone();
    let entries_a = dict_a.len();

    let parent = engine.proxy_for(root_b).unwrap();
    let moved = engine.proxy_for(child).unwrap();
    engine.append_child(&parent, &moved).unwrap();

    let heap = engine.heap();
    let ns = heap.node(child).unwrap().ns().unwrap();
    let decl = heap.ns(ns).unwrap();
    assert_ne!(ns, a);
    assert_eq!(decl.href(), "urn:x");
    assert_eq!(decl.prefix(), Some("a"));
    assert_eq!(decl.owner(), Some(child));
    assert_eq!(resolved_href(&engine, child).as_deref(), Some("urn:x"));

    // each dictionary owns exactly its own strings
    let heap = engine.heap();
    assert!(dict_b.owns(heap.node(child).unwrap().name_ref().unwrap()));
    assert!(dict_b.owns(heap.ns(ns).unwrap().href_ref()));
    assert!(dict_a.owns(heap.node(root_a).unwrap().name_ref().unwrap()));
    assert!(dict_a.owns(heap.ns(a).unwrap().href_ref()));
    assert_eq!(dict_a.len(), entries_a);

    assert_eq!(moved.document().unwrap(), doc_b);
    assert_eq!(heap.node(child).unwrap().doc(), doc_b);
}

#[test]
fn test_move_uses_generated_prefix_when_taken() {
    let mut engine = ProxyEngine::default();
    let (doc_a, root_a) = document(&mut engine);
    let (_doc_b, root_b) = document(&mut engine);
    let heap = engine.heap_mut();
    heap.new_ns(root_b, "urn:taken", Some("a")).unwrap();
    let a = heap.new_ns(root_a, "urn:x", Some("a")).unwrap();
    let child = heap.new_element(doc_a, "child").unwrap();
    heap.add_child(root_a, child).unwrap();
    heap.set_ns(child, Some(a)).unwrap();

    let parent = engine.proxy_for(root_b).unwrap();
    let moved = engine.proxy_for(child).unwrap();
    engine.append_child(&parent, &moved).unwrap();

    let heap = engine.heap();
    let ns = heap.node(child).unwrap().ns().unwrap();
    let prefix = heap.ns(ns).unwrap().prefix().unwrap();
    assert!(prefix.starts_with("ns"), "generated prefix, got {prefix}");
    assert_eq!(resolved_href(&engine, child).as_deref(), Some("urn:x"));
}

#[test]
fn test_move_reuses_destination_declaration() {
    let mut engine = ProxyEngine::default();
    let (doc_a, root_a) = document(&mut engine);
    let (_doc_b, root_b) = document(&mut engine);
    let heap = engine.heap_mut();
    let in_b = heap.new_ns(root_b, "urn:x", Some("b")).unwrap();
    let a = heap.new_ns(root_a, "urn:x", Some("a")).unwrap();
    let child = heap.new_element(doc_a, "child").unwrap();
    heap.add_child(root_a, child).unwrap();
    heap.set_ns(child, Some(a)).unwrap();

    let parent = engine.proxy_for(root_b).unwrap();
    let moved = engine.proxy_for(child).unwrap();
    let before = engine.heap().stats();
    engine.append_child(&parent, &moved).unwrap();

    let heap = engine.heap();
    assert_eq!(heap.node(child).unwrap().ns(), Some(in_b));
    assert!(heap.node(child).unwrap().ns_def().is_empty());
    assert_eq!(heap.stats().namespaces_allocated, before.namespaces_allocated);
}

#[test]
fn test_move_subtree_with_own_declarations() {
    // <x:top xmlns:x="urn:x"><x:mid><x:leaf x:attr="1"/></x:mid></x:top>
    let mut engine = ProxyEngine::default();
    let (doc_a, root_a) = document(&mut engine);
    let (_doc_b, root_b) = document(&mut engine);
    let heap = engine.heap_mut();
    let top = heap.new_element(doc_a, "top").unwrap();
    let mid = heap.new_element(doc_a, "mid").unwrap();
    let leaf = heap.new_element(doc_a, "leaf").unwrap();
    heap.add_child(root_a, top).unwrap();
    heap.add_child(top, mid).unwrap();
    heap.add_child(mid, leaf).unwrap();
    let x = heap.new_ns(top, "urn:x", Some("x")).unwrap();
    let attr = heap.new_attribute(leaf, "attr", "1").unwrap();
    for id in [top, mid, leaf, attr] {
        heap.set_ns(id, Some(x)).unwrap();
    }

    let parent = engine.proxy_for(root_b).unwrap();
    let moved = engine.proxy_for(top).unwrap();
    let leaf_proxy = engine.proxy_for(leaf).unwrap();
    engine.append_child(&parent, &moved).unwrap();

    let heap = engine.heap();
    // the declaration travels with the subtree, nothing new is declared
    assert_eq!(heap.node(top).unwrap().ns_def(), &[x]);
    for id in [top, mid, leaf, attr] {
        assert_eq!(heap.node(id).unwrap().ns(), Some(x));
    }
    assert_eq!(leaf_proxy.document().unwrap(), engine.heap().node(root_b).unwrap().doc());
}

#[test]
fn test_move_into_scope_strips_duplicate() {
    let mut engine = ProxyEngine::default();
    let (doc, root) = document(&mut engine);
    let heap = engine.heap_mut();
    let outer = heap.new_ns(root, "urn:x", Some("x")).unwrap();
    let holder = heap.new_element(doc, "holder").unwrap();
    heap.add_child(root, holder).unwrap();

    let detached = heap.new_element(doc, "item").unwrap();
    let own = heap.new_ns(detached, "urn:x", Some("x")).unwrap();
    heap.set_ns(detached, Some(own)).unwrap();

    let parent = engine.proxy_for(holder).unwrap();
    let item = engine.proxy_for(detached).unwrap();
    let before = engine.heap().stats();
    engine.append_child(&parent, &item).unwrap();

    let heap = engine.heap();
    assert!(heap.node(detached).unwrap().ns_def().is_empty());
    assert_eq!(heap.node(detached).unwrap().ns(), Some(outer));
    assert_eq!(heap.stats().namespaces_freed - before.namespaces_freed, 1);
}

#[test]
fn test_shared_dictionary_move_is_pointer_stable() {
    let mut engine = ProxyEngine::default();
    let dict = Dict::shared();
    let doc_a = engine.new_document_with_dict(dict.clone()).unwrap();
    let doc_b = engine.new_document_with_dict(dict.clone()).unwrap();
    let heap = engine.heap_mut();
    let root_b = heap.new_element(doc_b, "root").unwrap();
    heap.set_root_element(doc_b, root_b).unwrap();
    let child = heap.new_element(doc_a, "child").unwrap();
    let text = heap.new_text(doc_a, "\n  ").unwrap();
    heap.add_child(child, text).unwrap();
    let name = heap.node(child).unwrap().name_ref().unwrap().clone();
    let content = heap.node(text).unwrap().content_ref().unwrap().clone();
    let entries = dict.len();

    heap.add_child(root_b, child).unwrap();
    engine.move_node_to_document(doc_b, doc_a, child).unwrap();

    let heap = engine.heap();
    assert!(Arc::ptr_eq(heap.node(child).unwrap().name_ref().unwrap(), &name));
    assert!(Arc::ptr_eq(heap.node(text).unwrap().content_ref().unwrap(), &content));
    assert_eq!(dict.len(), entries);
}

#[test]
fn test_repeated_moves_do_not_accumulate_declarations() {
    let mut engine = ProxyEngine::default();
    let (doc_a, root_a) = document(&mut engine);
    let (doc_b, root_b) = document(&mut engine);
    let heap = engine.heap_mut();
    let a = heap.new_ns(root_a, "urn:x", Some("a")).unwrap();
    let child = heap.new_element(doc_a, "child").unwrap();
    heap.add_child(root_a, child).unwrap();
    heap.set_ns(child, Some(a)).unwrap();
    let holder = heap.new_element(doc_b, "holder").unwrap();
    heap.add_child(root_b, holder).unwrap();

    let moved = engine.proxy_for(child).unwrap();
    let in_b = engine.proxy_for(root_b).unwrap();
    let holder = engine.proxy_for(holder).unwrap();
    let in_a = engine.proxy_for(root_a).unwrap();

    engine.append_child(&in_b, &moved).unwrap();
    assert_eq!(engine.heap().node(child).unwrap().ns_def().len(), 1);

    // same scope, the declaration is reused rather than duplicated
    engine.append_child(&holder, &moved).unwrap();
    assert_eq!(engine.heap().node(child).unwrap().ns_def().len(), 1);
    assert_eq!(resolved_href(&engine, child).as_deref(), Some("urn:x"));

    // back home the original declaration covers it again
    engine.append_child(&in_a, &moved).unwrap();
    assert!(engine.heap().node(child).unwrap().ns_def().is_empty());
    assert_eq!(engine.heap().node(child).unwrap().ns(), Some(a));
    assert_eq!(moved.document().unwrap(), doc_a);
    assert_ne!(doc_a, doc_b);
}

// ============================================================================
// REMOVAL AND DEALLOCATION
// ============================================================================

#[test]
fn test_remove_unobserved_subtree() {
    let mut engine = ProxyEngine::default();
    let (doc, root) = document(&mut engine);
    let heap = engine.heap_mut();
    let branch = heap.new_element(doc, "branch").unwrap();
    let leaf = heap.new_element(doc, "leaf").unwrap();
    let tail = heap.new_text(doc, "tail").unwrap();
    heap.add_child(root, branch).unwrap();
    heap.add_child(branch, leaf).unwrap();
    heap.add_child(root, tail).unwrap();

    let proxy = engine.proxy_for(branch).unwrap();
    let before = engine.heap().stats();
    // the proxy itself keeps the node alive until it is released
    assert!(!engine.remove(&proxy).unwrap());
    assert_eq!(engine.heap().stats(), before);

    assert!(engine.release_proxy(&proxy).unwrap());
    let after = engine.heap().stats();
    assert_eq!(after.nodes_freed - before.nodes_freed, 3);
    assert!(!engine.heap().contains(leaf));
    assert!(engine.heap().children(root).unwrap().is_empty());
}

#[test]
fn test_inner_proxy_keeps_fragment_alive() {
    let mut engine = ProxyEngine::default();
    let (doc, root) = document(&mut engine);
    let heap = engine.heap_mut();
    let branch = heap.new_element(doc, "branch").unwrap();
    let leaf = heap.new_element(doc, "leaf").unwrap();
    heap.add_child(root, branch).unwrap();
    heap.add_child(branch, leaf).unwrap();

    let branch_proxy = engine.proxy_for(branch).unwrap();
    let leaf_proxy = engine.proxy_for(leaf).unwrap();
    engine.remove(&branch_proxy).unwrap();

    // releasing the top does not free: the leaf is still observed
    assert!(!engine.release_proxy(&branch_proxy).unwrap());
    assert!(engine.heap().contains(branch));
    let parent = engine.heap().node(leaf).unwrap().parent();
    assert_eq!(parent, Some(branch));

    // the last proxy going away frees the whole fragment
    assert!(engine.release_proxy(&leaf_proxy).unwrap());
    assert!(!engine.heap().contains(branch));
    assert!(!engine.heap().contains(leaf));
}

#[test]
fn test_attached_nodes_are_never_freed() {
    let mut engine = ProxyEngine::default();
    let (doc, root) = document(&mut engine);
    let heap = engine.heap_mut();
    let child = heap.new_element(doc, "child").unwrap();
    heap.add_child(root, child).unwrap();

    assert!(!engine.attempt_deallocation(Some(child)));
    assert!(!engine.attempt_deallocation(Some(root)));
    let doc_node = engine.heap().doc_node(doc).unwrap();
    assert!(!engine.attempt_deallocation(Some(doc_node)));
    assert!(engine.heap().contains(child));
}

#[test]
fn test_replace_keeps_old_observed() {
    let mut engine = ProxyEngine::default();
    let (doc, root) = document(&mut engine);
    let heap = engine.heap_mut();
    let ns = heap.new_ns(root, "urn:x", Some("x")).unwrap();
    let old = heap.new_element(doc, "old").unwrap();
    heap.add_child(root, old).unwrap();
    heap.set_ns(old, Some(ns)).unwrap();
    let new = heap.new_element(doc, "new").unwrap();

    let old_proxy = engine.proxy_for(old).unwrap();
    let new_proxy = engine.proxy_for(new).unwrap();
    engine.replace(&old_proxy, &new_proxy).unwrap();

    assert_eq!(engine.heap().children(root).unwrap(), vec![new]);
    // the detached node declares what it uses
    assert_eq!(resolved_href(&engine, old).as_deref(), Some("urn:x"));
    assert!(engine.release_proxy(&old_proxy).unwrap());
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
fn test_registered_prefix_is_used() {
    let mut engine = ProxyEngine::new(ProxyConfig::default());
    engine.register_namespace("inv", "urn:invoice").unwrap();
    let (doc_a, _root_a) = document(&mut engine);
    let (_doc_b, root_b) = document(&mut engine);
    let heap = engine.heap_mut();
    let carrier = heap.new_element(doc_a, "carrier").unwrap();
    let default = heap.new_ns(carrier, "urn:invoice", None).unwrap();
    let item = heap.new_element(doc_a, "item").unwrap();
    heap.add_child(carrier, item).unwrap();
    heap.set_ns(item, Some(default)).unwrap();
    heap.unlink(item).unwrap();

    let parent = engine.proxy_for(root_b).unwrap();
    let moved = engine.proxy_for(item).unwrap();
    engine.append_child(&parent, &moved).unwrap();

    let heap = engine.heap();
    let ns = heap.node(item).unwrap().ns().unwrap();
    assert_eq!(heap.ns(ns).unwrap().prefix(), Some("inv"));
}

#[test]
fn test_config_defaults() {
    let config = ProxyConfig::default();
    assert_eq!(config.default_prefix("http://www.w3.org/1999/xhtml"), Some("html"));
    assert_eq!(config.heap.max_nodes, None);
    assert_eq!(config.dict_entry_limit, None);
}
