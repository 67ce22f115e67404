//! Values exchanged between the evaluator and handler functions.
//!
//! [`Value`] is the evaluator's vocabulary (boolean, number, string, node-set).
//! [`HostValue`] is what handler functions receive and return; converting a
//! `HostValue` back into a `Value` is the only fallible direction.
use core::fmt;

use crate::node_set::NodeSet;
use crate::tree::Node;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Number(f64),
    String(String),
    NodeSet(NodeSet),
}

impl Value {
    /// XPath `boolean()` semantics.
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::NodeSet(set) => !set.is_empty(),
        }
    }

    /// XPath `number()` semantics.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::NodeSet(set) => set.first().map_or(f64::NAN, |n| parse_number(&n.string_value())),
        }
    }

    /// XPath `string()` semantics; a node-set yields the string-value of its first node.
    pub fn to_xpath_string(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::NodeSet(set) => set.first().map(Node::string_value).unwrap_or_default(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::NodeSet(_) => "node-set",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node_set(&self) -> Option<&NodeSet> {
        match self {
            Value::NodeSet(set) => Some(set),
            _ => None,
        }
    }

    pub fn into_node_set(self) -> Option<NodeSet> {
        match self {
            Value::NodeSet(set) => Some(set),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
impl From<NodeSet> for Value {
    fn from(set: NodeSet) -> Self {
        Value::NodeSet(set)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xpath_string())
    }
}

/// XPath number lexical form: optional `-`, digits with at most one `.`;
/// surrounding whitespace is ignored. Anything else is NaN.
pub(crate) fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    let body = t.strip_prefix('-').unwrap_or(t);
    let mut digits = 0usize;
    let mut dots = 0usize;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return f64::NAN,
        }
    }
    if digits == 0 || dots > 1 {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{n}")
    }
}

/// Handler-side value.
///
/// Arguments arrive as `Bool`, `Float`, `Text` or `NodeSet`. Handlers may return
/// any variant; `Nil`, a lone `Node`, and lists holding anything but nodes have no
/// engine representation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Node(Node),
    NodeSet(NodeSet),
    List(Vec<HostValue>),
}

/// A `HostValue` with no engine representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    pub found: &'static str,
}

impl HostValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Nil => "nil",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "integer",
            HostValue::Float(_) => "float",
            HostValue::Text(_) => "text",
            HostValue::Node(_) => "node",
            HostValue::NodeSet(_) => "node-set",
            HostValue::List(_) => "list",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view of `Int` and `Float`.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Int(i) => Some(*i as f64),
            HostValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node_set(&self) -> Option<&NodeSet> {
        match self {
            HostValue::NodeSet(set) => Some(set),
            _ => None,
        }
    }

    /// Nodes carried by a `NodeSet`, a `Node` or a list of nodes.
    pub fn nodes(&self) -> Vec<Node> {
        match self {
            HostValue::NodeSet(set) => set.nodes().to_vec(),
            HostValue::Node(n) => vec![n.clone()],
            HostValue::List(items) => items.iter().flat_map(HostValue::nodes).collect(),
            _ => Vec::new(),
        }
    }

    /// Convert into an engine value. Node-sets come back undecorated; the bridge
    /// decorates them.
    #[allow(clippy::cast_precision_loss)]
    pub fn into_value(self) -> Result<Value, ConversionError> {
        match self {
            HostValue::Bool(b) => Ok(Value::Boolean(b)),
            HostValue::Int(i) => Ok(Value::Number(i as f64)),
            HostValue::Float(f) => Ok(Value::Number(f)),
            HostValue::Text(s) => Ok(Value::String(s)),
            HostValue::NodeSet(set) => Ok(Value::NodeSet(set)),
            HostValue::List(items) => {
                let mut nodes = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        HostValue::Node(n) => nodes.push(n),
                        other => return Err(ConversionError { found: list_of(&other) }),
                    }
                }
                Ok(Value::NodeSet(NodeSet::from_nodes(nodes)))
            }
            other => Err(ConversionError { found: other.type_name() }),
        }
    }
}

fn list_of(item: &HostValue) -> &'static str {
    match item {
        HostValue::Nil => "list of nil",
        HostValue::Bool(_) => "list of bool",
        HostValue::Int(_) => "list of integer",
        HostValue::Float(_) => "list of float",
        HostValue::Text(_) => "list of text",
        HostValue::Node(_) => "list of node",
        HostValue::NodeSet(_) => "list of node-set",
        HostValue::List(_) => "list of list",
    }
}

impl From<Value> for HostValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Boolean(b) => HostValue::Bool(b),
            Value::Number(n) => HostValue::Float(n),
            Value::String(s) => HostValue::Text(s),
            Value::NodeSet(set) => HostValue::NodeSet(set),
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}
impl From<i32> for HostValue {
    fn from(i: i32) -> Self {
        HostValue::Int(i64::from(i))
    }
}
impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        HostValue::Int(i)
    }
}
impl From<u32> for HostValue {
    fn from(i: u32) -> Self {
        HostValue::Int(i64::from(i))
    }
}
impl From<f32> for HostValue {
    fn from(f: f32) -> Self {
        HostValue::Float(f64::from(f))
    }
}
impl From<f64> for HostValue {
    fn from(f: f64) -> Self {
        HostValue::Float(f)
    }
}
impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Text(s.to_string())
    }
}
impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Text(s)
    }
}
impl From<Node> for HostValue {
    fn from(n: Node) -> Self {
        HostValue::Node(n)
    }
}
impl From<Vec<Node>> for HostValue {
    fn from(nodes: Vec<Node>) -> Self {
        HostValue::List(nodes.into_iter().map(HostValue::Node).collect())
    }
}
impl From<NodeSet> for HostValue {
    fn from(set: NodeSet) -> Self {
        HostValue::NodeSet(set)
    }
}
impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(HostValue::Nil, Into::into)
    }
}
