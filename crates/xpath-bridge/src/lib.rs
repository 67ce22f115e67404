pub mod bridge;
pub mod compiler;
pub mod css;
pub mod decoration;
pub mod evaluator;
pub mod functions;
pub mod node_set;
pub mod parser;
pub mod runtime;
pub mod tree;
pub mod value;

pub use bridge::{ArgumentCountError, FunctionTable, Handler, HandlerError, invoke};
pub use compiler::compile_xpath;
pub use decoration::{Decoration, Decorations, decorate};
pub use evaluator::{evaluate, evaluate_compiled, evaluate_with};
pub use node_set::NodeSet;
pub use parser::{XPathParser, parse_xpath};
pub use runtime::{Error, ErrorCode, EvaluationContext, EvaluationContextBuilder};
pub use tree::{Document, Node, NodeKind, attr, comment, doc, elem, text};
pub use value::{ConversionError, HostValue, Value};
