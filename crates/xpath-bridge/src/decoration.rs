//! Document-scoped decorations for node-sets.
//!
//! A [`Decoration`] is a named capability registered on a [`Document`]. Node-sets
//! pick up a snapshot of the registry when they are decorated, which happens
//! wherever the evaluator or the function bridge hands a node-set out: as an
//! evaluation result, as a handler argument, and when converting a handler's
//! return value.
use std::fmt;
use std::sync::Arc;

use crate::bridge::HandlerError;
use crate::node_set::NodeSet;
use crate::tree::{Document, Node};
use crate::value::HostValue;

pub trait Decoration: Send + Sync {
    fn name(&self) -> &str;
    fn call(&self, set: &NodeSet, args: &[HostValue]) -> Result<HostValue, HandlerError>;
}

type DecorationFn =
    dyn Fn(&NodeSet, &[HostValue]) -> Result<HostValue, HandlerError> + Send + Sync;

struct FnDecoration {
    name: String,
    f: Box<DecorationFn>,
}

impl Decoration for FnDecoration {
    fn name(&self) -> &str {
        &self.name
    }
    fn call(&self, set: &NodeSet, args: &[HostValue]) -> Result<HostValue, HandlerError> {
        (self.f)(set, args)
    }
}

/// Build a decoration from a closure.
pub fn from_fn<F>(name: &str, f: F) -> Arc<dyn Decoration>
where
    F: Fn(&NodeSet, &[HostValue]) -> Result<HostValue, HandlerError> + Send + Sync + 'static,
{
    Arc::new(FnDecoration { name: name.to_string(), f: Box::new(f) })
}

/// Immutable snapshot of a document's registered decorations.
#[derive(Clone)]
pub struct Decorations(Arc<[Arc<dyn Decoration>]>);

impl Default for Decorations {
    fn default() -> Self {
        Decorations(Arc::from(Vec::<Arc<dyn Decoration>>::new()))
    }
}

impl fmt::Debug for Decorations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl Decorations {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Most recently registered decoration with this name wins.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Decoration>> {
        self.0.iter().rev().find(|d| d.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|d| d.name())
    }

    pub(crate) fn with(&self, decoration: Arc<dyn Decoration>) -> Self {
        let mut all: Vec<Arc<dyn Decoration>> = self.0.iter().cloned().collect();
        all.push(decoration);
        Decorations(Arc::from(all))
    }
}

/// Attach the document's decorations to `set`.
///
/// The document is the owner of the first node; `fallback` names it for sets
/// whose nodes cannot (empty sets). Already decorated sets are returned
/// unchanged, sets with no resolvable document stay undecorated.
pub fn decorate(mut set: NodeSet, fallback: Option<&Document>) -> NodeSet {
    if set.is_decorated() {
        return set;
    }
    let owner = set.first().and_then(Node::document).or_else(|| fallback.cloned());
    if let Some(doc) = owner {
        set.attach(&doc, doc.decorations());
    }
    set
}
