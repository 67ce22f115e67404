//! Arc-backed document tree.
//!
//! A [`Document`] is the sole owner of its nodes. Every [`Node`] keeps a weak
//! reference to its parent and to the owning document, so a node outliving its
//! document is still safe to hold but reports no document and no parent.
//!
//! Trees are assembled with the builder helpers and sealed into a document,
//! which assigns the document-order index used for node-set sorting:
//!
//! ```
//! use xpath_bridge::tree::{Document, elem, attr, text};
//!
//! // <staff><employee id="1"><name>Ann</name></employee></staff>
//! let doc = Document::new(
//!     elem("staff").child(
//!         elem("employee")
//!             .attr(attr("id", "1"))
//!             .child(elem("name").child(text("Ann"))),
//!     ),
//! );
//! let staff = doc.root_element().unwrap();
//! assert_eq!(staff.name(), Some("staff"));
//! assert_eq!(staff.children()[0].attribute("id"), Some("1"));
//! assert_eq!(staff.children()[0].attribute("nope"), None);
//! ```
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};

use tracing::debug;

use crate::bridge::Handler;
use crate::decoration::{Decoration, Decorations};
use crate::node_set::NodeSet;
use crate::runtime::Error;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
}

pub(crate) struct NodeInner {
    kind: NodeKind,
    name: Option<String>,
    value: Option<String>,
    attributes: Vec<Node>,
    children: Vec<Node>,
    parent: OnceLock<Weak<NodeInner>>,
    document: OnceLock<Weak<DocumentInner>>,
    order: OnceLock<usize>,
}

/// Handle to a node of a [`Document`]. Equality and hashing are by identity.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Node {}
impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name)
            .field("value", &self.0.value)
            .finish()
    }
}

impl Node {
    fn new(kind: NodeKind, name: Option<String>, value: Option<String>) -> Self {
        Node(Arc::new(NodeInner {
            kind,
            name,
            value,
            attributes: Vec::new(),
            children: Vec::new(),
            parent: OnceLock::new(),
            document: OnceLock::new(),
            order: OnceLock::new(),
        }))
    }

    pub fn kind(&self) -> NodeKind {
        self.0.kind
    }

    /// Tag name for elements, attribute name for attributes.
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// Local part of the name (text after the last `:`).
    pub fn local_name(&self) -> Option<&str> {
        self.name().map(|n| n.rsplit(':').next().unwrap_or(n))
    }

    /// Raw content of attribute, text and comment nodes.
    pub fn value(&self) -> Option<&str> {
        self.0.value.as_deref()
    }

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.get().and_then(Weak::upgrade).map(Node)
    }

    pub fn children(&self) -> &[Node] {
        &self.0.children
    }

    pub fn attributes(&self) -> &[Node] {
        &self.0.attributes
    }

    /// Attribute value by name; `None` when the attribute does not exist.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.0
            .attributes
            .iter()
            .find(|a| a.name() == Some(name))
            .and_then(Node::value)
    }

    pub fn is_element(&self) -> bool {
        self.0.kind == NodeKind::Element
    }

    /// XPath string-value: concatenated descendant text for elements and documents.
    pub fn string_value(&self) -> String {
        match self.0.kind {
            NodeKind::Element | NodeKind::Document => {
                fn collect(n: &Node, out: &mut String) {
                    for c in n.children() {
                        match c.kind() {
                            NodeKind::Text => out.push_str(c.value().unwrap_or_default()),
                            NodeKind::Element => collect(c, out),
                            _ => {}
                        }
                    }
                }
                let mut out = String::new();
                collect(self, &mut out);
                out
            }
            _ => self.0.value.clone().unwrap_or_default(),
        }
    }

    /// The owning document, or `None` once it has been dropped (or was never sealed).
    pub fn document(&self) -> Option<Document> {
        self.0.document.get().and_then(Weak::upgrade).map(Document)
    }

    /// Topmost ancestor (the document node for attached nodes).
    pub fn root(&self) -> Node {
        let mut cur = self.clone();
        while let Some(p) = cur.parent() {
            cur = p;
        }
        cur
    }

    /// Position in document order. Nodes that were never sealed sort last.
    pub(crate) fn order(&self) -> usize {
        self.0.order.get().copied().unwrap_or(usize::MAX)
    }

    /// Whether the owning document currently registers a decoration named `op`.
    pub fn responds_to(&self, op: &str) -> bool {
        self.document().is_some_and(|d| d.decorations().get(op).is_some())
    }

    /// Evaluate a path query with this node as the context node.
    pub fn xpath(&self, expression: &str, handler: Option<&dyn Handler>) -> Result<Value, Error> {
        crate::evaluator::evaluate(expression, Some(self), handler)
    }

    /// Select nodes below this node with a selector.
    pub fn css(&self, selector: &str, handler: Option<&dyn Handler>) -> Result<NodeSet, Error> {
        crate::css::select(selector, self, handler)
    }
}

/// Builder for element and document nodes.
pub struct NodeBuilder {
    kind: NodeKind,
    name: Option<String>,
    attributes: Vec<Node>,
    children: Vec<Node>,
}

pub enum NodeOrBuilder {
    Built(Node),
    Builder(NodeBuilder),
}

impl From<Node> for NodeOrBuilder {
    fn from(n: Node) -> Self {
        NodeOrBuilder::Built(n)
    }
}
impl From<NodeBuilder> for NodeOrBuilder {
    fn from(b: NodeBuilder) -> Self {
        NodeOrBuilder::Builder(b)
    }
}

impl NodeOrBuilder {
    fn into_node(self) -> Node {
        match self {
            NodeOrBuilder::Built(n) => n,
            NodeOrBuilder::Builder(b) => b.build(),
        }
    }
}

impl NodeBuilder {
    fn new(kind: NodeKind, name: Option<String>) -> Self {
        Self { kind, name, attributes: Vec::new(), children: Vec::new() }
    }

    pub fn child(mut self, child: impl Into<NodeOrBuilder>) -> Self {
        self.children.push(child.into().into_node());
        self
    }

    pub fn children<I, C>(mut self, it: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<NodeOrBuilder>,
    {
        self.children.extend(it.into_iter().map(|c| c.into().into_node()));
        self
    }

    pub fn attr(mut self, attr: Node) -> Self {
        debug_assert!(attr.kind() == NodeKind::Attribute);
        self.attributes.push(attr);
        self
    }

    /// Finalize: wires parent links of attributes and children.
    ///
    /// A node can be attached once; attaching an already parented node keeps its
    /// first parent link.
    pub fn build(self) -> Node {
        let node = Node(Arc::new(NodeInner {
            kind: self.kind,
            name: self.name,
            value: None,
            attributes: self.attributes,
            children: self.children,
            parent: OnceLock::new(),
            document: OnceLock::new(),
            order: OnceLock::new(),
        }));
        for n in node.0.attributes.iter().chain(node.0.children.iter()) {
            let _ = n.0.parent.set(Arc::downgrade(&node.0));
        }
        node
    }
}

pub fn elem(name: &str) -> NodeBuilder {
    NodeBuilder::new(NodeKind::Element, Some(name.to_string()))
}
pub fn doc() -> NodeBuilder {
    NodeBuilder::new(NodeKind::Document, None)
}
pub fn attr(name: &str, value: &str) -> Node {
    Node::new(NodeKind::Attribute, Some(name.to_string()), Some(value.to_string()))
}
pub fn text(value: &str) -> Node {
    Node::new(NodeKind::Text, None, Some(value.to_string()))
}
pub fn comment(value: &str) -> Node {
    Node::new(NodeKind::Comment, None, Some(value.to_string()))
}

pub(crate) struct DocumentInner {
    root: Node,
    decorations: RwLock<Decorations>,
}

/// Owner of a sealed tree and of its decoration registry.
#[derive(Clone)]
pub struct Document(pub(crate) Arc<DocumentInner>);

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Document {}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root_element", &self.root_element().and_then(|r| r.name().map(str::to_owned)))
            .field("decorations", &self.decorations())
            .finish()
    }
}

impl Document {
    /// Seal a tree into a document. A non-document root is wrapped into a
    /// document node.
    pub fn new(root: impl Into<NodeOrBuilder>) -> Self {
        let mut root = root.into().into_node();
        if root.kind() != NodeKind::Document {
            root = doc().child(root).build();
        }
        let inner = Arc::new(DocumentInner { root, decorations: RwLock::new(Decorations::default()) });
        let weak = Arc::downgrade(&inner);
        let mut next = 0usize;
        seal(&inner.root, &weak, &mut next);
        Document(inner)
    }

    /// The document node.
    pub fn root(&self) -> Node {
        self.0.root.clone()
    }

    pub fn root_element(&self) -> Option<Node> {
        self.0.root.children().iter().find(|c| c.is_element()).cloned()
    }

    pub(crate) fn downgrade(&self) -> Weak<DocumentInner> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn from_weak(weak: &Weak<DocumentInner>) -> Option<Document> {
        weak.upgrade().map(Document)
    }

    /// Register a capability on this document. Node-sets decorated afterwards expose it.
    pub fn decorate(&self, decoration: Arc<dyn Decoration>) {
        debug!(decoration = decoration.name(), "registering document decoration");
        let mut guard = self.0.decorations.write().unwrap_or_else(PoisonError::into_inner);
        *guard = guard.with(decoration);
    }

    /// Snapshot of the currently registered decorations.
    pub fn decorations(&self) -> Decorations {
        self.0.decorations.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn xpath(&self, expression: &str) -> Result<Value, Error> {
        self.root().xpath(expression, None)
    }

    pub fn xpath_with(&self, expression: &str, handler: &dyn Handler) -> Result<Value, Error> {
        self.root().xpath(expression, Some(handler))
    }

    pub fn css(&self, selector: &str, handler: Option<&dyn Handler>) -> Result<NodeSet, Error> {
        self.root().css(selector, handler)
    }
}

// Preorder walk: node, attributes, children.
fn seal(node: &Node, doc: &Weak<DocumentInner>, next: &mut usize) {
    let _ = node.0.document.set(doc.clone());
    let _ = node.0.order.set(*next);
    *next += 1;
    for a in node.attributes() {
        let _ = a.0.document.set(doc.clone());
        let _ = a.0.order.set(*next);
        *next += 1;
    }
    for c in node.children() {
        seal(c, doc, next);
    }
}
