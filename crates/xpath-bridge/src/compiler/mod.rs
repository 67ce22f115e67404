use tracing::debug;

use crate::parser::{ast, parse_xpath};
use crate::runtime::Error;

pub mod ir;

/// Parse and lower `expr` into stack IR.
pub fn compile_xpath(expr: &str) -> Result<ir::CompiledXPath, Error> {
    let ast = parse_xpath(expr).map_err(|e| Error::ExpressionSyntax {
        expression: expr.to_string(),
        message: syntax_message(&*e),
    })?;
    let mut c = Compiler::default();
    c.lower_expr(&ast);
    debug!(expression = expr, ops = c.code.len(), "compiled expression");
    Ok(ir::CompiledXPath { instrs: ir::InstrSeq(c.code), source: expr.to_string() })
}

pub(crate) fn syntax_message<R: pest::RuleType>(e: &pest::error::Error<R>) -> String {
    let col = match e.line_col {
        pest::error::LineColLocation::Pos((_, c)) | pest::error::LineColLocation::Span((_, c), _) => c,
    };
    format!("{} at column {col}", e.variant.message())
}

#[derive(Default)]
struct Compiler {
    code: Vec<ir::OpCode>,
}

impl Compiler {
    fn emit(&mut self, op: ir::OpCode) {
        self.code.push(op);
    }

    fn lower_expr(&mut self, e: &ast::Expr) {
        use ast::Expr as E;
        match e {
            E::Literal(ast::Literal::Number(n)) => self.emit(ir::OpCode::PushNumber(*n)),
            E::Literal(ast::Literal::String(s)) => self.emit(ir::OpCode::PushString(s.clone())),
            E::VarRef(name) => self.emit(ir::OpCode::LoadVar(name.clone())),
            E::ContextItem => self.emit(ir::OpCode::LoadContextItem),
            E::FunctionCall { name, args } => {
                for a in args {
                    self.lower_expr(a);
                }
                self.emit(ir::OpCode::CallByName(name.clone(), args.len()));
            }
            E::Binary { left, op, right } => {
                let arith = match op {
                    ast::BinaryOp::And => return self.lower_logic(left, right, false),
                    ast::BinaryOp::Or => return self.lower_logic(left, right, true),
                    ast::BinaryOp::Add => ir::OpCode::Add,
                    ast::BinaryOp::Sub => ir::OpCode::Sub,
                    ast::BinaryOp::Mul => ir::OpCode::Mul,
                    ast::BinaryOp::Div => ir::OpCode::Div,
                    ast::BinaryOp::Mod => ir::OpCode::Mod,
                };
                self.lower_expr(left);
                self.lower_expr(right);
                self.emit(arith);
            }
            E::GeneralComparison { left, op, right } => {
                self.lower_expr(left);
                self.lower_expr(right);
                self.emit(ir::OpCode::CompareGeneral(*op));
            }
            E::Negate(inner) => {
                self.lower_expr(inner);
                self.emit(ir::OpCode::Negate);
            }
            E::Union(a, b) => {
                self.lower_expr(a);
                self.lower_expr(b);
                self.emit(ir::OpCode::Union);
            }
            E::Filter { primary, predicates } => {
                self.lower_expr(primary);
                let preds = lower_predicates(predicates);
                self.emit(ir::OpCode::ApplyPredicates(preds));
            }
            E::Path(path) => self.lower_path(path),
        }
    }

    // a and b => a, bool, jf(end), pop, b, bool
    // a or b  => a, bool, jt(end), pop, b, bool
    fn lower_logic(&mut self, left: &ast::Expr, right: &ast::Expr, is_or: bool) {
        self.lower_expr(left);
        self.emit(ir::OpCode::ToBoolean);
        let jump_at = self.code.len();
        self.emit(ir::OpCode::Pop);
        self.emit(ir::OpCode::Pop);
        self.lower_expr(right);
        self.emit(ir::OpCode::ToBoolean);
        let skip = self.code.len() - jump_at - 1;
        self.code[jump_at] = if is_or { ir::OpCode::JumpIfTrue(skip) } else { ir::OpCode::JumpIfFalse(skip) };
    }

    fn lower_path(&mut self, path: &ast::PathExpr) {
        match &path.start {
            ast::PathStart::Root => {
                self.emit(ir::OpCode::LoadContextItem);
                self.emit(ir::OpCode::ToRoot);
            }
            ast::PathStart::Relative => self.emit(ir::OpCode::LoadContextItem),
            ast::PathStart::Expr(e) => self.lower_expr(e),
        }
        for step in &path.steps {
            let preds = lower_predicates(&step.predicates);
            self.emit(ir::OpCode::AxisStep(step.axis, step.test.clone(), preds));
        }
    }
}

fn lower_predicates(predicates: &[ast::Expr]) -> Vec<ir::Predicate> {
    predicates
        .iter()
        .map(|p| {
            let mut c = Compiler::default();
            c.lower_expr(p);
            let top_call = match p {
                ast::Expr::FunctionCall { name, .. } => Some(name.clone()),
                _ => None,
            };
            ir::Predicate { code: ir::InstrSeq(c.code), top_call }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir::OpCode;

    #[test]
    fn and_short_circuits_over_right_operand() {
        let compiled = compile_xpath("1 and 2").unwrap();
        assert_eq!(
            compiled.instrs.0,
            vec![
                OpCode::PushNumber(1.0),
                OpCode::ToBoolean,
                OpCode::JumpIfFalse(3),
                OpCode::Pop,
                OpCode::PushNumber(2.0),
                OpCode::ToBoolean,
            ]
        );
    }

    #[test]
    fn function_call_predicate_records_callee() {
        let compiled = compile_xpath("a[thing(.)]").unwrap();
        let OpCode::AxisStep(_, _, preds) = &compiled.instrs.0[1] else {
            panic!("expected a step, got {:?}", compiled.instrs.0);
        };
        assert_eq!(preds[0].top_call.as_deref(), Some("thing"));
    }

    #[test]
    fn syntax_error_carries_expression() {
        let err = compile_xpath("//a[").unwrap_err();
        assert!(matches!(err, Error::ExpressionSyntax { ref expression, .. } if expression == "//a["));
    }
}
