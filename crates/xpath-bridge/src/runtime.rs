use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use crate::bridge::{Handler, HandlerError};
use crate::functions::{FunctionRegistry, shared_default_registry};
use crate::tree::Node;
use crate::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No builtin and no handler member with this name.
    #[error("undefined function: {0}")]
    UndefinedFunction(String),

    /// A handler returned something with no engine representation.
    #[error("function {function}() returned a value of type {found}, which is not a valid expression result")]
    InvalidReturnType { function: String, found: &'static str },

    #[error("invalid expression '{expression}': {message}")]
    ExpressionSyntax { expression: String, message: String },

    #[error("invalid selector '{selector}': {message}")]
    SelectorSyntax { selector: String, message: String },

    /// Handler code failed; `source` is the handler's own error.
    #[error("function {function}() failed")]
    Handler {
        function: String,
        #[source]
        source: HandlerError,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("function {name}() cannot be called with {given} argument(s)")]
    Arity { name: String, given: usize },

    #[error("undefined variable: ${0}")]
    UndefinedVariable(String),
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::UndefinedFunction(_) | Error::Arity { .. } => ErrorCode::XPST0017,
            Error::InvalidReturnType { .. } | Error::Type(_) => ErrorCode::XPTY0004,
            Error::ExpressionSyntax { .. } => ErrorCode::XPST0003,
            Error::SelectorSyntax { .. } => ErrorCode::SEL0001,
            Error::Handler { .. } => ErrorCode::FOER0000,
            Error::UndefinedVariable(_) => ErrorCode::XPST0008,
        }
    }

    /// The handler's error, if this is a handler failure.
    pub fn handler_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Error::Handler { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FOER0000, // host function failure
    XPTY0004, // type error (incl. unusable handler return)
    XPST0003, // expression syntax
    XPST0008, // undeclared variable
    XPST0017, // unknown function / wrong arity
    SEL0001,  // project specific: selector syntax
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FOER0000 => "err:FOER0000",
            ErrorCode::XPTY0004 => "err:XPTY0004",
            ErrorCode::XPST0003 => "err:XPST0003",
            ErrorCode::XPST0008 => "err:XPST0008",
            ErrorCode::XPST0017 => "err:XPST0017",
            ErrorCode::SEL0001 => "err:SEL0001",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one evaluation needs besides the expression.
#[derive(Clone)]
pub struct EvaluationContext<'h> {
    pub context_node: Option<Node>,
    pub handler: Option<&'h dyn Handler>,
    pub variables: HashMap<String, Value>,
    pub functions: Arc<FunctionRegistry>,
}

impl Default for EvaluationContext<'_> {
    fn default() -> Self {
        Self {
            context_node: None,
            handler: None,
            variables: HashMap::new(),
            functions: shared_default_registry(),
        }
    }
}

impl fmt::Debug for EvaluationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("context_node", &self.context_node)
            .field("handler", &self.handler.is_some())
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct EvaluationContextBuilder<'h> {
    ctx: EvaluationContext<'h>,
}

impl<'h> EvaluationContextBuilder<'h> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context_node(mut self, node: Node) -> Self {
        self.ctx.context_node = Some(node);
        self
    }

    pub fn with_handler(mut self, handler: &'h dyn Handler) -> Self {
        self.ctx.handler = Some(handler);
        self
    }

    /// Bind `$name`.
    pub fn with_variable(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.ctx.variables.insert(name.to_string(), value.into());
        self
    }

    pub fn with_functions(mut self, reg: Arc<FunctionRegistry>) -> Self {
        self.ctx.functions = reg;
        self
    }

    pub fn build(self) -> EvaluationContext<'h> {
        self.ctx
    }
}
