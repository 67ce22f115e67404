use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::sync::Weak;

use crate::decoration::Decorations;
use crate::runtime::Error;
use crate::tree::{Document, DocumentInner, Node};
use crate::value::HostValue;

/// Ordered, identity-deduplicated collection of nodes.
///
/// A node-set holds a weak reference to its document: it stays valid for as long as
/// the document is alive, independent of the evaluation that produced it.
#[derive(Clone, Default)]
pub struct NodeSet {
    nodes: Vec<Node>,
    document: Weak<DocumentInner>,
    decorations: Option<Decorations>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the given order; later duplicates are dropped.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut seen = HashSet::new();
        let nodes: Vec<Node> = nodes.into_iter().filter(|n| seen.insert(n.clone())).collect();
        let document = nodes
            .first()
            .and_then(Node::document)
            .map(|d| d.downgrade())
            .unwrap_or_default();
        Self { nodes, document, decorations: None }
    }

    /// Sort into document order and drop duplicates.
    pub(crate) fn in_document_order(mut nodes: Vec<Node>) -> Self {
        nodes.sort_by_key(Node::order);
        nodes.dedup();
        Self::from_nodes(nodes)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `None` for out-of-range indexes, including any index into an empty set.
    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn first(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    /// Owning document while it is alive.
    pub fn document(&self) -> Option<Document> {
        Document::from_weak(&self.document)
    }

    pub fn is_decorated(&self) -> bool {
        self.decorations.is_some()
    }

    pub fn decorations(&self) -> Option<&Decorations> {
        self.decorations.as_ref()
    }

    pub fn responds_to(&self, op: &str) -> bool {
        self.decorations.as_ref().is_some_and(|d| d.get(op).is_some())
    }

    /// Run a decoration capability on this set.
    pub fn call_decoration(&self, op: &str, args: &[HostValue]) -> Result<HostValue, Error> {
        let decoration = self
            .decorations
            .as_ref()
            .and_then(|d| d.get(op))
            .ok_or_else(|| Error::UndefinedFunction(op.to_string()))?;
        decoration
            .call(self, args)
            .map_err(|source| Error::Handler { function: op.to_string(), source })
    }

    pub(crate) fn attach(&mut self, document: &Document, decorations: Decorations) {
        self.document = document.downgrade();
        self.decorations = Some(decorations);
    }
}

impl Deref for NodeSet {
    type Target = [Node];
    fn deref(&self) -> &[Node] {
        &self.nodes
    }
}

impl PartialEq for NodeSet {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl fmt::Debug for NodeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSet")
            .field("nodes", &self.nodes)
            .field("decorations", &self.decorations)
            .finish()
    }
}

impl FromIterator<Node> for NodeSet {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        NodeSet::from_nodes(iter)
    }
}

impl IntoIterator for NodeSet {
    type Item = Node;
    type IntoIter = std::vec::IntoIter<Node>;
    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl<'a> IntoIterator for &'a NodeSet {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;
    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
