//! Example: moving a namespaced element between two documents
//!
//! Run with `RUST_LOG=fos_proxy=debug` to see the reconciliation steps.

use fos_proxy::{ProxyConfig, ProxyEngine};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut engine = ProxyEngine::new(ProxyConfig::default());
    let doc_a = engine.new_document()?;
    let doc_b = engine.new_document()?;

    // A: <root xmlns:a="urn:example"><a:child/></root>
    let heap = engine.heap_mut();
    let root_a = heap.new_element(doc_a, "root")?;
    heap.set_root_element(doc_a, root_a)?;
    let ns = heap.new_ns(root_a, "urn:example", Some("a"))?;
    let child = heap.new_element(doc_a, "child")?;
    heap.set_ns(child, Some(ns))?;

    // B: <root/>
    let root_b = heap.new_element(doc_b, "root")?;
    heap.set_root_element(doc_b, root_b)?;

    let parent = engine.proxy_for(root_b)?;
    let moved = engine.proxy_for(child)?;
    engine.append_child(&parent, &moved)?;

    let heap = engine.heap();
    let node = heap.node(moved.node()?)?;
    if let Some(ns) = node.ns() {
        let decl = heap.ns(ns)?;
        println!(
            "{} now lives in {} as {}:{} ({})",
            moved.node()?,
            moved.document()?,
            decl.prefix().unwrap_or_default(),
            node.name().unwrap_or_default(),
            decl.href()
        );
    }

    // Dropping the proxy of a detached node frees it
    engine.remove(&moved)?;
    let freed = engine.release_proxy(&moved)?;
    println!("Freed after release: {freed}");
    println!("{:?}", engine.heap().stats());
    Ok(())
}
