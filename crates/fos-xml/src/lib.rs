//! fOS XML - native node heap
//!
//! Arena-allocated XML tree: nodes, namespace declarations and documents
//! live in one heap and are addressed by generation-checked handles, so a
//! subtree can be unlinked from one document and relinked into another
//! without its handles changing, and a handle to a freed node is an error
//! rather than a dangling reference.

mod config;
mod dict;
mod document;
mod generation;
mod namespace;
mod node;
mod operations;
mod tree;

pub use config::HeapConfig;
pub use dict::Dict;
pub use document::{DocumentData, PrefixCounter};
pub use generation::{Arena, Generation, RawHandle};
pub use namespace::{NsDecl, XML_NAMESPACE};
pub use node::{Node, NodeType};
pub use operations::{TreeOperations, XmlError, XmlResult};
pub use tree::{HeapStats, Walk, XmlHeap};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) RawHandle);

        impl $name {
            /// Arena slot index
            #[inline]
            pub fn index(self) -> u32 {
                self.0.index()
            }

            /// Generation the handle was issued with
            #[inline]
            pub fn generation(self) -> Generation {
                self.0.generation()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}.{}", $tag, self.index(), self.generation().value())
            }
        }
    };
}

arena_id!(
    /// Node identifier (generation-checked index into the node arena)
    NodeId,
    "node#"
);
arena_id!(
    /// Namespace declaration identifier
    NsId,
    "ns#"
);
arena_id!(
    /// Document identifier
    DocId,
    "doc#"
);
