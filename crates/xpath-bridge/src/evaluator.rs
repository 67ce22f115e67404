use smallvec::SmallVec;

use crate::bridge::{self, Handler};
use crate::compiler::compile_xpath;
use crate::compiler::ir::{CompiledXPath, InstrSeq, OpCode, Predicate};
use crate::decoration::decorate;
use crate::functions::{CallCtx, ResolveError};
use crate::node_set::NodeSet;
use crate::parser::ast::{Axis, GeneralComp, NodeTest};
use crate::runtime::{Error, EvaluationContext, EvaluationContextBuilder};
use crate::tree::{Document, Node, NodeKind};
use crate::value::{Value, parse_number};

/// Evaluate `expression` against `context`, routing custom function calls to `handler`.
///
/// Location paths evaluated without a context node yield an empty node-set.
pub fn evaluate(
    expression: &str,
    context: Option<&Node>,
    handler: Option<&dyn Handler>,
) -> Result<Value, Error> {
    let mut builder = EvaluationContextBuilder::new();
    if let Some(node) = context {
        builder = builder.with_context_node(node.clone());
    }
    if let Some(h) = handler {
        builder = builder.with_handler(h);
    }
    evaluate_with(expression, &builder.build())
}

/// Compile and evaluate with a fully configured context.
pub fn evaluate_with(expression: &str, ctx: &EvaluationContext) -> Result<Value, Error> {
    let compiled = compile_xpath(expression)?;
    evaluate_compiled(&compiled, ctx)
}

/// Evaluate a program compiled earlier with [`compile_xpath`].
pub fn evaluate_compiled(compiled: &CompiledXPath, ctx: &EvaluationContext) -> Result<Value, Error> {
    let vm = Vm { ctx, document: ctx.context_node.as_ref().and_then(Node::document) };
    let focus = Focus { node: ctx.context_node.clone(), position: 1, last: 1 };
    Ok(match vm.run(&compiled.instrs, &focus)? {
        Value::NodeSet(set) => Value::NodeSet(decorate(set, vm.document.as_ref())),
        other => other,
    })
}

struct Vm<'a, 'h> {
    ctx: &'a EvaluationContext<'h>,
    document: Option<Document>,
}

// position()/last() frame for the expression being evaluated
struct Focus {
    node: Option<Node>,
    position: usize,
    last: usize,
}

type Stack = SmallVec<[Value; 8]>;

impl Vm<'_, '_> {
    fn run(&self, code: &InstrSeq, focus: &Focus) -> Result<Value, Error> {
        let mut stack: Stack = SmallVec::new();
        let ops = &code.0;
        let mut pc = 0usize;
        while pc < ops.len() {
            match &ops[pc] {
                OpCode::PushNumber(n) => stack.push(Value::Number(*n)),
                OpCode::PushString(s) => stack.push(Value::String(s.clone())),
                OpCode::LoadVar(name) => {
                    let v = self
                        .ctx
                        .variables
                        .get(name)
                        .cloned()
                        .ok_or_else(|| Error::UndefinedVariable(name.clone()))?;
                    stack.push(v);
                }
                OpCode::LoadContextItem => {
                    stack.push(Value::NodeSet(focus.node.iter().cloned().collect()));
                }
                OpCode::ToRoot => {
                    let set = pop_node_set(&mut stack, "'/'")?;
                    stack.push(Value::NodeSet(set.iter().map(Node::root).collect()));
                }
                OpCode::AxisStep(axis, test, preds) => {
                    let input = pop_node_set(&mut stack, "a path step")?;
                    let mut out = Vec::new();
                    for node in &input {
                        let candidates: Vec<Node> = axis_iter(node, *axis)
                            .into_iter()
                            .filter(|n| matches_test(n, *axis, test))
                            .collect();
                        out.extend(self.filter_predicates(candidates, preds)?);
                    }
                    stack.push(Value::NodeSet(NodeSet::in_document_order(out)));
                }
                OpCode::ApplyPredicates(preds) => {
                    let input = pop_node_set(&mut stack, "a predicate")?;
                    let kept = self.filter_predicates(input.into_nodes(), preds)?;
                    stack.push(Value::NodeSet(NodeSet::in_document_order(kept)));
                }
                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Mod => {
                    let b = pop(&mut stack)?.to_number();
                    let a = pop(&mut stack)?.to_number();
                    stack.push(Value::Number(match &ops[pc] {
                        OpCode::Add => a + b,
                        OpCode::Sub => a - b,
                        OpCode::Mul => a * b,
                        OpCode::Div => a / b,
                        _ => a % b,
                    }));
                }
                OpCode::Negate => {
                    let a = pop(&mut stack)?.to_number();
                    stack.push(Value::Number(-a));
                }
                OpCode::ToBoolean => {
                    let v = pop(&mut stack)?;
                    stack.push(Value::Boolean(v.to_boolean()));
                }
                OpCode::JumpIfFalse(skip) => {
                    if !stack.last().is_some_and(Value::to_boolean) {
                        pc += skip;
                    }
                }
                OpCode::JumpIfTrue(skip) => {
                    if stack.last().is_some_and(Value::to_boolean) {
                        pc += skip;
                    }
                }
                OpCode::Pop => {
                    pop(&mut stack)?;
                }
                OpCode::CompareGeneral(op) => {
                    let r = pop(&mut stack)?;
                    let l = pop(&mut stack)?;
                    stack.push(Value::Boolean(compare(&l, &r, *op)));
                }
                OpCode::Union => {
                    let b = pop_node_set(&mut stack, "'|'")?;
                    let a = pop_node_set(&mut stack, "'|'")?;
                    let mut all = a.into_nodes();
                    all.extend(b);
                    stack.push(Value::NodeSet(NodeSet::in_document_order(all)));
                }
                OpCode::CallByName(name, argc) => {
                    if stack.len() < *argc {
                        return Err(underflow());
                    }
                    let args: Vec<Value> = stack.drain(stack.len() - argc..).collect();
                    stack.push(self.call(name, args, focus)?);
                }
            }
            pc += 1;
        }
        pop(&mut stack)
    }

    fn call(&self, name: &str, args: Vec<Value>, focus: &Focus) -> Result<Value, Error> {
        match self.ctx.functions.resolve(name, args.len()) {
            Ok(f) => {
                let call_ctx = CallCtx {
                    node: focus.node.as_ref(),
                    position: focus.position,
                    last: focus.last,
                    document: self.document.as_ref(),
                };
                f(&call_ctx, &args)
            }
            Err(ResolveError::WrongArity { .. }) => {
                Err(Error::Arity { name: name.to_string(), given: args.len() })
            }
            Err(ResolveError::Unknown(_)) => {
                bridge::invoke(self.ctx.handler, name, args, self.document.as_ref())
            }
        }
    }

    /// Apply predicates in turn; each one sees positions within the survivors of the previous.
    fn filter_predicates(&self, mut nodes: Vec<Node>, preds: &[Predicate]) -> Result<Vec<Node>, Error> {
        for pred in preds {
            let last = nodes.len();
            let mut kept = Vec::with_capacity(last);
            for (i, node) in nodes.into_iter().enumerate() {
                let focus = Focus { node: Some(node.clone()), position: i + 1, last };
                let v = self.run(&pred.code, &focus)?;
                if self.predicate_truth_value(pred, &v, i + 1) {
                    kept.push(node);
                }
            }
            nodes = kept;
        }
        Ok(nodes)
    }

    #[allow(clippy::cast_precision_loss)]
    fn predicate_truth_value(&self, pred: &Predicate, result: &Value, position: usize) -> bool {
        let handler_call = pred
            .top_call
            .as_deref()
            .is_some_and(|name| !self.ctx.functions.contains(name));
        match result {
            // Numeric predicate: position match (NaN never matches)
            Value::Number(n) if !handler_call => (n - position as f64).abs() < f64::EPSILON,
            other => other.to_boolean(),
        }
    }
}

fn underflow() -> Error {
    Error::Type("evaluation stack underflow".to_string())
}

fn pop(stack: &mut Stack) -> Result<Value, Error> {
    stack.pop().ok_or_else(underflow)
}

fn pop_node_set(stack: &mut Stack, what: &str) -> Result<NodeSet, Error> {
    match pop(stack)? {
        Value::NodeSet(set) => Ok(set),
        other => Err(Error::Type(format!("{what} requires a node-set, got {}", other.type_name()))),
    }
}

/// Nodes along `axis` in proximity order (reverse axes nearest first).
fn axis_iter(node: &Node, axis: Axis) -> Vec<Node> {
    match axis {
        Axis::SelfAxis => vec![node.clone()],
        Axis::Child => node.children().to_vec(),
        Axis::Attribute => node.attributes().to_vec(),
        Axis::Parent => node.parent().into_iter().collect(),
        Axis::Ancestor => {
            let mut out = Vec::new();
            let mut cur = node.parent();
            while let Some(p) = cur {
                cur = p.parent();
                out.push(p);
            }
            out
        }
        Axis::AncestorOrSelf => {
            let mut v = axis_iter(node, Axis::Ancestor);
            v.insert(0, node.clone());
            v
        }
        Axis::Descendant => collect_descendants(node, false),
        Axis::DescendantOrSelf => collect_descendants(node, true),
        Axis::FollowingSibling => siblings(node, false),
        Axis::PrecedingSibling => siblings(node, true),
        Axis::Following => {
            let mut out = Vec::new();
            let start = if node.kind() == NodeKind::Attribute {
                let Some(owner) = node.parent() else {
                    return out;
                };
                out.extend(collect_descendants(&owner, false));
                owner
            } else {
                node.clone()
            };
            for anchor in axis_iter(&start, Axis::AncestorOrSelf) {
                for sib in siblings(&anchor, false) {
                    out.extend(collect_descendants(&sib, true));
                }
            }
            out
        }
        Axis::Preceding => {
            let ancestors = axis_iter(node, Axis::Ancestor);
            let mut out: Vec<Node> = collect_descendants(&node.root(), false)
                .into_iter()
                .filter(|n| n.order() < node.order() && !ancestors.contains(n))
                .collect();
            out.reverse();
            out
        }
    }
}

fn collect_descendants(node: &Node, include_self: bool) -> Vec<Node> {
    let mut out = Vec::new();
    if include_self {
        out.push(node.clone());
    }
    let mut stack: Vec<Node> = node.children().iter().rev().cloned().collect();
    while let Some(n) = stack.pop() {
        stack.extend(n.children().iter().rev().cloned());
        out.push(n);
    }
    out
}

fn siblings(node: &Node, preceding: bool) -> Vec<Node> {
    if node.kind() == NodeKind::Attribute {
        return Vec::new();
    }
    let Some(parent) = node.parent() else {
        return Vec::new();
    };
    let all = parent.children();
    let Some(idx) = all.iter().position(|c| c == node) else {
        return Vec::new();
    };
    if preceding {
        all[..idx].iter().rev().cloned().collect()
    } else {
        all[idx + 1..].to_vec()
    }
}

fn matches_test(node: &Node, axis: Axis, test: &NodeTest) -> bool {
    let principal = if axis == Axis::Attribute { NodeKind::Attribute } else { NodeKind::Element };
    match test {
        NodeTest::Node => true,
        NodeTest::Text => node.kind() == NodeKind::Text,
        NodeTest::Comment => node.kind() == NodeKind::Comment,
        NodeTest::Wildcard => node.kind() == principal,
        NodeTest::PrefixWildcard(prefix) => {
            node.kind() == principal
                && node
                    .name()
                    .and_then(|n| n.split_once(':'))
                    .is_some_and(|(p, _)| p == prefix)
        }
        NodeTest::Name(name) => node.kind() == principal && node.name() == Some(name.as_str()),
    }
}

/// XPath 1.0 general comparison; comparisons involving node-sets are existential.
fn compare(l: &Value, r: &Value, op: GeneralComp) -> bool {
    match (l, r) {
        (Value::NodeSet(a), Value::NodeSet(b)) => {
            let right: Vec<String> = b.iter().map(Node::string_value).collect();
            a.iter().any(|x| {
                let left = x.string_value();
                right.iter().any(|y| compare_strings(&left, y, op))
            })
        }
        (Value::NodeSet(a), Value::Boolean(_)) => compare_scalars(&Value::Boolean(!a.is_empty()), r, op),
        (Value::Boolean(_), Value::NodeSet(b)) => compare_scalars(l, &Value::Boolean(!b.is_empty()), op),
        (Value::NodeSet(a), _) => a
            .iter()
            .any(|x| compare_scalars(&Value::String(x.string_value()), r, op)),
        (_, Value::NodeSet(b)) => b
            .iter()
            .any(|y| compare_scalars(l, &Value::String(y.string_value()), op)),
        _ => compare_scalars(l, r, op),
    }
}

fn compare_strings(a: &str, b: &str, op: GeneralComp) -> bool {
    match op {
        GeneralComp::Eq => a == b,
        GeneralComp::Ne => a != b,
        _ => compare_numbers(parse_number(a), parse_number(b), op),
    }
}

#[allow(clippy::float_cmp)]
fn compare_scalars(l: &Value, r: &Value, op: GeneralComp) -> bool {
    match op {
        GeneralComp::Eq | GeneralComp::Ne => {
            let eq = if matches!(l, Value::Boolean(_)) || matches!(r, Value::Boolean(_)) {
                l.to_boolean() == r.to_boolean()
            } else if matches!(l, Value::Number(_)) || matches!(r, Value::Number(_)) {
                l.to_number() == r.to_number()
            } else {
                l.to_xpath_string() == r.to_xpath_string()
            };
            if op == GeneralComp::Eq { eq } else { !eq }
        }
        _ => compare_numbers(l.to_number(), r.to_number(), op),
    }
}

#[allow(clippy::float_cmp)]
fn compare_numbers(a: f64, b: f64, op: GeneralComp) -> bool {
    match op {
        GeneralComp::Eq => a == b,
        GeneralComp::Ne => a != b,
        GeneralComp::Lt => a < b,
        GeneralComp::Le => a <= b,
        GeneralComp::Gt => a > b,
        GeneralComp::Ge => a >= b,
    }
}
