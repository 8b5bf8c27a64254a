//! XML Node - arena representation
//!
//! Links are `NodeId` handles into the heap's arena instead of pointers.
//! Names and short content are `Arc<str>` that usually come from the owning
//! document's [`Dict`](crate::Dict); longer content is a private allocation.

use std::sync::Arc;

use crate::{DocId, NodeId, NsId};

/// Node type tag. Numeric codes follow the native engine's constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Element,
    Attribute,
    Text,
    CData,
    EntityRef,
    ProcessingInstruction,
    Comment,
    Document,
    DocumentType,
    HtmlDocument,
    XIncludeStart,
    XIncludeEnd,
}

impl NodeType {
    pub fn from_code(value: u32) -> Option<Self> {
        match value {
            1 => Some(NodeType::Element),
            2 => Some(NodeType::Attribute),
            3 => Some(NodeType::Text),
            4 => Some(NodeType::CData),
            5 => Some(NodeType::EntityRef),
            7 => Some(NodeType::ProcessingInstruction),
            8 => Some(NodeType::Comment),
            9 => Some(NodeType::Document),
            10 => Some(NodeType::DocumentType),
            13 => Some(NodeType::HtmlDocument),
            19 => Some(NodeType::XIncludeStart),
            20 => Some(NodeType::XIncludeEnd),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            NodeType::Element => 1,
            NodeType::Attribute => 2,
            NodeType::Text => 3,
            NodeType::CData => 4,
            NodeType::EntityRef => 5,
            NodeType::ProcessingInstruction => 7,
            NodeType::Comment => 8,
            NodeType::Document => 9,
            NodeType::DocumentType => 10,
            NodeType::HtmlDocument => 13,
            NodeType::XIncludeStart => 19,
            NodeType::XIncludeEnd => 20,
        }
    }

    /// Document or HTML document node
    #[inline]
    pub fn is_document(self) -> bool {
        matches!(self, NodeType::Document | NodeType::HtmlDocument)
    }

    /// Nodes the tree API exposes as "elements": elements, comments,
    /// processing instructions and entity references
    #[inline]
    pub fn is_element_like(self) -> bool {
        matches!(
            self,
            NodeType::Element
                | NodeType::Comment
                | NodeType::EntityRef
                | NodeType::ProcessingInstruction
        )
    }

    /// Element-like node or an XInclude boundary marker
    #[inline]
    pub fn is_element_or_xinclude(self) -> bool {
        self.is_element_like() || self.is_xinclude_marker()
    }

    /// Text or CDATA
    #[inline]
    pub fn is_text_like(self) -> bool {
        matches!(self, NodeType::Text | NodeType::CData)
    }

    /// XInclude start/end boundary
    #[inline]
    pub fn is_xinclude_marker(self) -> bool {
        matches!(self, NodeType::XIncludeStart | NodeType::XIncludeEnd)
    }

    /// Children of these nodes are not part of the node's own subtree
    #[inline]
    pub fn is_opaque(self) -> bool {
        matches!(self, NodeType::DocumentType | NodeType::EntityRef)
    }

    /// Whether nodes of this type may have children
    #[inline]
    pub fn accepts_children(self) -> bool {
        matches!(
            self,
            NodeType::Element
                | NodeType::Document
                | NodeType::HtmlDocument
                | NodeType::DocumentType
                | NodeType::EntityRef
        )
    }
}

/// A node in the heap
///
/// `P` is the type stored in the opaque per-node slot; exactly one external
/// subsystem owns that slot at a time.
#[derive(Debug)]
pub struct Node<P> {
    pub(crate) node_type: NodeType,
    pub(crate) name: Option<Arc<str>>,
    pub(crate) content: Option<Arc<str>>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) prev_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    /// Attribute nodes, in document order (elements only)
    pub(crate) attributes: Vec<NodeId>,
    /// Namespace governing this node's qualified name
    pub(crate) ns: Option<NsId>,
    /// Namespace declarations made on this node
    pub(crate) ns_def: Vec<NsId>,
    pub(crate) doc: DocId,
    pub(crate) private: Option<P>,
}

impl<P> Node<P> {
    pub(crate) fn new(node_type: NodeType, doc: DocId) -> Self {
        Self {
            node_type,
            name: None,
            content: None,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            attributes: Vec::new(),
            ns: None,
            ns_def: Vec::new(),
            doc,
            private: None,
        }
    }

    #[inline]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.node_type.is_text_like()
    }

    /// Local name (tag, attribute, PI target or entity name)
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The name's backing allocation, for dictionary ownership checks
    pub fn name_ref(&self) -> Option<&Arc<str>> {
        self.name.as_ref()
    }

    pub fn set_name_ref(&mut self, name: Arc<str>) {
        self.name = Some(name);
    }

    /// Text content, attribute value, comment or PI data
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn content_ref(&self) -> Option<&Arc<str>> {
        self.content.as_ref()
    }

    pub fn set_content_ref(&mut self, content: Arc<str>) {
        self.content = Some(content);
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    #[inline]
    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    #[inline]
    pub fn prev_sibling(&self) -> Option<NodeId> {
        self.prev_sibling
    }

    #[inline]
    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    pub fn attributes(&self) -> &[NodeId] {
        &self.attributes
    }

    #[inline]
    pub fn ns(&self) -> Option<NsId> {
        self.ns
    }

    pub fn ns_def(&self) -> &[NsId] {
        &self.ns_def
    }

    /// Owning document
    #[inline]
    pub fn doc(&self) -> DocId {
        self.doc
    }

    /// Contents of the opaque slot
    #[inline]
    pub fn private(&self) -> Option<&P> {
        self.private.as_ref()
    }
}
