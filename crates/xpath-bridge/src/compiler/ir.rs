use crate::parser::ast::{Axis, GeneralComp, NodeTest};

#[derive(Debug, Clone, PartialEq)]
pub enum OpCode {
    // Data and variables
    PushNumber(f64),
    PushString(String),
    LoadVar(String),
    LoadContextItem,
    /// Replace the focus with the root of the context node's tree.
    ToRoot,

    // Steps and filters; operate on the node-set on top of the stack
    AxisStep(Axis, NodeTest, Vec<Predicate>),
    ApplyPredicates(Vec<Predicate>),

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Negate,

    // Logic and control flow; jumps are relative to the next instruction
    ToBoolean,
    JumpIfFalse(usize),
    JumpIfTrue(usize),
    Pop,

    CompareGeneral(GeneralComp),
    Union,

    /// Call a builtin or, failing that, a handler member with this many arguments.
    CallByName(String, usize),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstrSeq(pub Vec<OpCode>);

impl InstrSeq {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub code: InstrSeq,
    /// Set when the whole predicate is a single function call. If that call is
    /// routed to the handler, its result is tested for truth, never as a position.
    pub top_call: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompiledXPath {
    pub instrs: InstrSeq,
    pub source: String,
}
