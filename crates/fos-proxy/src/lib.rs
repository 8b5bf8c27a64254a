//! fOS Proxy - node ownership across managed proxies and the XML heap
//!
//! Keeps one proxy per node, frees detached subtrees once nothing observes
//! them, and repairs namespaces, dictionary strings and proxy documents
//! when a subtree moves between positions or documents.
//!
//! # Example
//! ```rust
//! use fos_proxy::{ProxyEngine, ProxyConfig};
//!
//! let mut engine = ProxyEngine::new(ProxyConfig::default());
//! let doc_a = engine.new_document().unwrap();
//! let doc_b = engine.new_document().unwrap();
//!
//! let heap = engine.heap_mut();
//! let root_a = heap.new_element(doc_a, "root").unwrap();
//! heap.set_root_element(doc_a, root_a).unwrap();
//! let root_b = heap.new_element(doc_b, "root").unwrap();
//! heap.set_root_element(doc_b, root_b).unwrap();
//! let ns = heap.new_ns(root_a, "urn:x", Some("a")).unwrap();
//! let child = heap.new_element(doc_a, "child").unwrap();
//! heap.set_ns(child, Some(ns)).unwrap();
//!
//! let parent = engine.proxy_for(root_b).unwrap();
//! let child = engine.proxy_for(child).unwrap();
//! engine.append_child(&parent, &child).unwrap();
//!
//! assert_eq!(child.document().unwrap(), doc_b);
//! ```

mod config;
mod error;
mod proxy;

pub mod dealloc;
pub mod edit;
pub mod engine;
pub mod reconcile;
pub mod tail;

pub use config::ProxyConfig;
pub use dealloc::attempt_deallocation;
pub use engine::ProxyEngine;
pub use error::{ProxyError, ProxyResult};
pub use proxy::{Proxy, ProxyHeap, ProxyRegistry, detach_proxy, is_valid, release_proxy};
pub use reconcile::move_node_to_document;

// Re-export the heap crate for callers building trees
pub use fos_xml as xml;
