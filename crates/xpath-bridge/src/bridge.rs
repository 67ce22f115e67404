//! Routing of custom function calls to a caller-supplied handler.
//!
//! Any function name that is not a builtin is looked up on the [`Handler`] at
//! evaluation time. Arguments are marshalled into [`HostValue`]s (node-sets
//! decorated), the handler's return is converted back into a [`Value`].
use std::collections::HashMap;
use std::fmt;

use tracing::trace;

use crate::decoration::decorate;
use crate::node_set::NodeSet;
use crate::runtime::Error;
use crate::tree::Document;
use crate::value::{HostValue, Value};

/// Failure raised by handler code. Propagated to the caller unchanged as the
/// source of [`Error::Handler`].
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Caller-supplied object whose members are callable from expressions.
pub trait Handler {
    /// Whether `name` is a member of this handler.
    fn responds_to(&self, name: &str) -> bool;

    /// Invoke member `name`. Only called when `responds_to(name)` holds.
    fn call(&self, name: &str, args: &[HostValue]) -> Result<HostValue, HandlerError>;
}

/// A fixed-arity [`FunctionTable`] member was called with the wrong number of arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name}() takes {expected} argument(s) but {given} were given")]
pub struct ArgumentCountError {
    pub name: String,
    pub expected: usize,
    pub given: usize,
}

type TableFn<'a> = Box<dyn Fn(&[HostValue]) -> Result<HostValue, HandlerError> + 'a>;

/// Handler built from closures keyed by name.
///
/// ```
/// use xpath_bridge::bridge::FunctionTable;
/// use xpath_bridge::value::HostValue;
///
/// let table = FunctionTable::new()
///     .with("shout", |args: &[HostValue]| {
///         Ok(HostValue::Text(args[0].as_str().unwrap_or_default().to_uppercase()))
///     });
/// assert_eq!(table.names(), vec!["shout"]);
/// ```
#[derive(Default)]
pub struct FunctionTable<'a> {
    members: HashMap<String, (Option<usize>, TableFn<'a>)>,
}

impl<'a> FunctionTable<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member taking any number of arguments.
    pub fn register<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[HostValue]) -> Result<HostValue, HandlerError> + 'a,
    {
        self.members.insert(name.to_string(), (None, Box::new(f)));
    }

    /// Register a member that must be called with exactly `arity` arguments.
    pub fn register_fixed<F>(&mut self, name: &str, arity: usize, f: F)
    where
        F: Fn(&[HostValue]) -> Result<HostValue, HandlerError> + 'a,
    {
        self.members.insert(name.to_string(), (Some(arity), Box::new(f)));
    }

    pub fn with<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&[HostValue]) -> Result<HostValue, HandlerError> + 'a,
    {
        self.register(name, f);
        self
    }

    /// Member names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.members.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for FunctionTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTable").field("members", &self.names()).finish()
    }
}

impl Handler for FunctionTable<'_> {
    fn responds_to(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    fn call(&self, name: &str, args: &[HostValue]) -> Result<HostValue, HandlerError> {
        let Some((arity, f)) = self.members.get(name) else {
            return Err(format!("no member named {name}").into());
        };
        if let Some(expected) = *arity
            && expected != args.len()
        {
            return Err(Box::new(ArgumentCountError {
                name: name.to_string(),
                expected,
                given: args.len(),
            }));
        }
        f(args)
    }
}

/// Invoke custom function `name` on `handler`.
///
/// `document` is used to decorate node-set arguments and results whose nodes
/// cannot name their document themselves (empty sets).
pub fn invoke(
    handler: Option<&dyn Handler>,
    name: &str,
    args: Vec<Value>,
    document: Option<&Document>,
) -> Result<Value, Error> {
    let handler = match handler {
        Some(h) if h.responds_to(name) => h,
        _ => return Err(Error::UndefinedFunction(name.to_string())),
    };
    trace!(function = name, argc = args.len(), "invoking handler function");
    let host_args: Vec<HostValue> = args.into_iter().map(|a| marshal(a, document)).collect();
    let ret = handler
        .call(name, &host_args)
        .map_err(|source| Error::Handler { function: name.to_string(), source })?;
    trace!(function = name, returned = ret.type_name(), "handler function returned");
    let value = ret.into_value().map_err(|e| Error::InvalidReturnType {
        function: name.to_string(),
        found: e.found,
    })?;
    Ok(match value {
        // handlers may return nodes in any order
        Value::NodeSet(set) => {
            Value::NodeSet(decorate(NodeSet::in_document_order(set.into_nodes()), document))
        }
        other => other,
    })
}

fn marshal(value: Value, document: Option<&Document>) -> HostValue {
    match value {
        Value::NodeSet(set) => HostValue::NodeSet(decorate(set, document)),
        other => other.into(),
    }
}
