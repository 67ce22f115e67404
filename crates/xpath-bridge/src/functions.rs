//! Builtin function library.
//!
//! Builtins are resolved before the handler: a handler member sharing a name
//! with a builtin is never called.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use crate::node_set::NodeSet;
use crate::runtime::Error;
use crate::tree::{Document, Node, NodeKind};
use crate::value::Value;

pub type Arity = usize;

/// Focus and owner visible to a builtin.
pub struct CallCtx<'a> {
    pub node: Option<&'a Node>,
    pub position: usize,
    pub last: usize,
    pub document: Option<&'a Document>,
}

pub type FunctionImpl = Arc<dyn Fn(&CallCtx, &[Value]) -> Result<Value, Error> + Send + Sync>;

// (min_arity, max_arity, impl); `None` max means variadic.
type FunctionOverload = (Arity, Option<Arity>, FunctionImpl);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    Unknown(String),
    /// Known name, but no registration accepts this many arguments.
    WrongArity { name: String, available: Vec<Arity> },
}

#[derive(Default)]
pub struct FunctionRegistry {
    fns: HashMap<String, Vec<FunctionOverload>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, arity: Arity, f: F)
    where
        F: Fn(&CallCtx, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.register_range(name, arity, Some(arity), f);
    }

    pub fn register_variadic<F>(&mut self, name: &str, min_arity: Arity, f: F)
    where
        F: Fn(&CallCtx, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.register_range(name, min_arity, None, f);
    }

    /// Later registrations take precedence over earlier overlapping ones.
    pub fn register_range<F>(&mut self, name: &str, min_arity: Arity, max_arity: Option<Arity>, f: F)
    where
        F: Fn(&CallCtx, &[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        let f: FunctionImpl = Arc::new(f);
        self.fns.entry(name.to_string()).or_default().insert(0, (min_arity, max_arity, f));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fns.contains_key(name)
    }

    pub fn resolve(&self, name: &str, arity: Arity) -> Result<&FunctionImpl, ResolveError> {
        let Some(cands) = self.fns.get(name) else {
            return Err(ResolveError::Unknown(name.to_string()));
        };
        if let Some((_, _, f)) = cands
            .iter()
            .find(|(min, max, _)| arity >= *min && max.is_none_or(|m| arity <= m))
        {
            return Ok(f);
        }
        let mut available: Vec<Arity> = vec![];
        for (min, max, _) in cands {
            if let Some(m) = max {
                available.extend(*min..=*m);
            }
        }
        available.sort_unstable();
        available.dedup();
        Err(ResolveError::WrongArity { name: name.to_string(), available })
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.fns.keys().collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}

/// Names registered by [`default_function_registry`].
pub const CORE_FUNCTIONS: &[&str] = &[
    "true",
    "false",
    "not",
    "boolean",
    "number",
    "string",
    "concat",
    "count",
    "position",
    "last",
    "name",
    "local-name",
    "contains",
    "starts-with",
    "string-length",
    "normalize-space",
    "substring",
    "id",
];

static DEFAULT_REGISTRY: OnceLock<Arc<FunctionRegistry>> = OnceLock::new();

/// Lazily built default registry, shared by every context that does not override it.
pub(crate) fn shared_default_registry() -> Arc<FunctionRegistry> {
    DEFAULT_REGISTRY.get_or_init(|| Arc::new(default_function_registry())).clone()
}

#[allow(clippy::cast_precision_loss)]
pub fn default_function_registry() -> FunctionRegistry {
    let mut reg = FunctionRegistry::new();

    // ===== Booleans =====
    reg.register("true", 0, |_ctx, _args| Ok(Value::Boolean(true)));
    reg.register("false", 0, |_ctx, _args| Ok(Value::Boolean(false)));
    reg.register("not", 1, |_ctx, args| Ok(Value::Boolean(!args[0].to_boolean())));
    reg.register("boolean", 1, |_ctx, args| Ok(Value::Boolean(args[0].to_boolean())));

    // ===== Conversions =====
    reg.register_range("number", 0, Some(1), |ctx, args| {
        Ok(Value::Number(match args.first() {
            Some(v) => v.to_number(),
            None => context_value(ctx).to_number(),
        }))
    });
    reg.register_range("string", 0, Some(1), |ctx, args| {
        Ok(Value::String(string_arg(ctx, args)))
    });

    // ===== Strings =====
    reg.register_variadic("concat", 2, |_ctx, args| {
        Ok(Value::String(args.iter().map(Value::to_xpath_string).collect()))
    });
    reg.register("contains", 2, |_ctx, args| {
        Ok(Value::Boolean(args[0].to_xpath_string().contains(&args[1].to_xpath_string())))
    });
    reg.register("starts-with", 2, |_ctx, args| {
        Ok(Value::Boolean(args[0].to_xpath_string().starts_with(&args[1].to_xpath_string())))
    });
    reg.register_range("string-length", 0, Some(1), |ctx, args| {
        Ok(Value::Number(string_arg(ctx, args).chars().count() as f64))
    });
    reg.register_range("normalize-space", 0, Some(1), |ctx, args| {
        Ok(Value::String(collapse_whitespace(&string_arg(ctx, args))))
    });
    reg.register_range("substring", 2, Some(3), |_ctx, args| {
        let s = args[0].to_xpath_string();
        let start = args[1].to_number();
        let len = args.get(2).map(Value::to_number);
        Ok(Value::String(substring(&s, start, len)))
    });

    // ===== Node-sets =====
    reg.register("count", 1, |_ctx, args| {
        let set = node_set_arg("count", &args[0])?;
        Ok(Value::Number(set.len() as f64))
    });
    reg.register("position", 0, |ctx, _args| Ok(Value::Number(ctx.position as f64)));
    reg.register("last", 0, |ctx, _args| Ok(Value::Number(ctx.last as f64)));
    reg.register_range("name", 0, Some(1), |ctx, args| {
        let node = node_arg("name", ctx, args)?;
        Ok(Value::String(node.and_then(|n| n.name().map(str::to_owned)).unwrap_or_default()))
    });
    reg.register_range("local-name", 0, Some(1), |ctx, args| {
        let node = node_arg("local-name", ctx, args)?;
        Ok(Value::String(node.and_then(|n| n.local_name().map(str::to_owned)).unwrap_or_default()))
    });
    reg.register("id", 1, id_fn);

    reg
}

fn context_value(ctx: &CallCtx) -> Value {
    Value::NodeSet(ctx.node.cloned().into_iter().collect())
}

fn string_arg(ctx: &CallCtx, args: &[Value]) -> String {
    match args.first() {
        Some(v) => v.to_xpath_string(),
        None => ctx.node.map(Node::string_value).unwrap_or_default(),
    }
}

fn node_set_arg<'v>(function: &str, v: &'v Value) -> Result<&'v NodeSet, Error> {
    v.as_node_set().ok_or_else(|| {
        Error::Type(format!("{function}() expects a node-set, got {}", v.type_name()))
    })
}

// First node of the argument, or the context node when called without one.
fn node_arg(function: &str, ctx: &CallCtx, args: &[Value]) -> Result<Option<Node>, Error> {
    match args.first() {
        Some(v) => Ok(node_set_arg(function, v)?.first().cloned()),
        None => Ok(ctx.node.cloned()),
    }
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() { n } else { (n + 0.5).floor() }
}

#[allow(clippy::cast_precision_loss)]
fn substring(s: &str, start: f64, len: Option<f64>) -> String {
    let first = xpath_round(start);
    let end = len.map_or(f64::INFINITY, |l| first + xpath_round(l));
    s.chars()
        .enumerate()
        .filter(|(i, _)| {
            let p = (*i + 1) as f64;
            p >= first && p < end
        })
        .map(|(_, c)| c)
        .collect()
}

fn id_fn(ctx: &CallCtx, args: &[Value]) -> Result<Value, Error> {
    let mut tokens: HashSet<String> = HashSet::new();
    let sources: Vec<String> = match &args[0] {
        Value::NodeSet(set) => set.iter().map(Node::string_value).collect(),
        other => vec![other.to_xpath_string()],
    };
    for s in &sources {
        tokens.extend(s.split_ascii_whitespace().map(str::to_owned));
    }
    let root = match (ctx.node, ctx.document) {
        (Some(n), _) => n.root(),
        (None, Some(d)) => d.root(),
        (None, None) => return Ok(Value::NodeSet(NodeSet::new())),
    };
    if tokens.is_empty() {
        return Ok(Value::NodeSet(NodeSet::new()));
    }
    // Preorder walk yields document order.
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == NodeKind::Element
            && node.attribute("id").is_some_and(|v| tokens.contains(v))
        {
            out.push(node.clone());
        }
        stack.extend(node.children().iter().rev().cloned());
    }
    Ok(Value::NodeSet(NodeSet::from_nodes(out)))
}
