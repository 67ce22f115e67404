use pest::Parser;
use pest::error::{Error, ErrorVariant};
use pest::iterators::Pair;

pub mod ast;

#[derive(pest_derive::Parser)]
#[grammar = "xpath.pest"]
pub struct XPathParser;

impl XPathParser {
    /// Build the AST for `input`.
    pub fn parse_to_ast(input: &str) -> Result<ast::Expr, Box<Error<Rule>>> {
        let mut pairs = Self::parse(Rule::xpath, input).map_err(Box::new)?;
        let root = pairs.next().and_then(|p| p.into_inner().next());
        let Some(inner) = root else {
            return Err(Box::new(Error::new_from_pos(
                ErrorVariant::CustomError { message: "empty expression".into() },
                pest::Position::from_start(input),
            )));
        };
        Self::build_expr(&inner).ok_or_else(|| {
            Box::new(Error::new_from_span(
                ErrorVariant::CustomError { message: "unsupported expression".into() },
                inner.as_span(),
            ))
        })
    }

    /// Walk down a pair to the first terminal token rule (e.g. `OP_EQ` below `equality_op`).
    fn first_token_rule(pair: &Pair<Rule>) -> Rule {
        let mut current = pair.clone();
        while let Some(next) = current.clone().into_inner().next() {
            current = next;
        }
        current.as_rule()
    }

    fn build_expr(pair: &Pair<Rule>) -> Option<ast::Expr> {
        match pair.as_rule() {
            Rule::expr | Rule::paren_expr | Rule::predicate | Rule::primary_expr | Rule::path_expr => {
                Self::build_expr(&pair.clone().into_inner().next()?)
            }
            Rule::or_expr
            | Rule::and_expr
            | Rule::equality_expr
            | Rule::relational_expr
            | Rule::additive_expr
            | Rule::multiplicative_expr => Self::build_binary_chain(pair),
            Rule::unary_expr => {
                let mut minus = 0usize;
                let mut operand = None;
                for p in pair.clone().into_inner() {
                    match p.as_rule() {
                        Rule::OP_MINUS => minus += 1,
                        _ => operand = Self::build_expr(&p),
                    }
                }
                let mut e = operand?;
                for _ in 0..minus {
                    e = ast::Expr::Negate(Box::new(e));
                }
                Some(e)
            }
            Rule::union_expr => {
                let mut inn = pair.clone().into_inner().filter(|p| p.as_rule() != Rule::OP_PIPE);
                let mut expr = Self::build_expr(&inn.next()?)?;
                for right in inn {
                    expr = ast::Expr::Union(Box::new(expr), Box::new(Self::build_expr(&right)?));
                }
                Some(expr)
            }
            Rule::absolute_path => {
                let mut steps = Vec::new();
                for p in pair.clone().into_inner() {
                    match p.as_rule() {
                        Rule::OP_DSLASH => steps.push(ast::Step::descendant_or_self()),
                        Rule::relative_path => Self::push_relative_steps(&p, &mut steps)?,
                        _ => {}
                    }
                }
                Some(ast::Expr::Path(ast::PathExpr { start: ast::PathStart::Root, steps }))
            }
            Rule::relative_path => {
                let mut steps = Vec::new();
                Self::push_relative_steps(pair, &mut steps)?;
                if let [only] = steps.as_slice()
                    && only.axis == ast::Axis::SelfAxis
                    && only.test == ast::NodeTest::Node
                    && only.predicates.is_empty()
                {
                    return Some(ast::Expr::ContextItem);
                }
                Some(ast::Expr::Path(ast::PathExpr { start: ast::PathStart::Relative, steps }))
            }
            Rule::filter_path => {
                let mut inn = pair.clone().into_inner();
                let primary = Self::build_expr(&inn.next()?)?;
                let Some(sep) = inn.next() else {
                    return Some(primary);
                };
                let mut steps = Vec::new();
                if Self::first_token_rule(&sep) == Rule::OP_DSLASH {
                    steps.push(ast::Step::descendant_or_self());
                }
                Self::push_relative_steps(&inn.next()?, &mut steps)?;
                Some(ast::Expr::Path(ast::PathExpr {
                    start: ast::PathStart::Expr(Box::new(primary)),
                    steps,
                }))
            }
            Rule::filter_expr => {
                let mut inn = pair.clone().into_inner();
                let primary = Self::build_expr(&inn.next()?)?;
                let predicates: Vec<ast::Expr> = inn.map(|p| Self::build_expr(&p)).collect::<Option<_>>()?;
                if predicates.is_empty() {
                    Some(primary)
                } else {
                    Some(ast::Expr::Filter { primary: Box::new(primary), predicates })
                }
            }
            Rule::var_ref => {
                let q = pair.clone().into_inner().next()?;
                Some(ast::Expr::VarRef(q.as_str().to_string()))
            }
            Rule::function_call => {
                let mut inn = pair.clone().into_inner();
                let name = inn.next()?.as_str().to_string();
                let args = inn.map(|a| Self::build_expr(&a)).collect::<Option<Vec<_>>>()?;
                Some(ast::Expr::FunctionCall { name, args })
            }
            Rule::string_literal => {
                let s = pair.clone().into_inner().next().map(|p| p.as_str().to_string()).unwrap_or_default();
                Some(ast::Expr::Literal(ast::Literal::String(s)))
            }
            Rule::number => {
                let v = pair.as_str().parse::<f64>().ok()?;
                Some(ast::Expr::Literal(ast::Literal::Number(v)))
            }
            _ => None,
        }
    }

    // operand (op operand)*
    fn build_binary_chain(pair: &Pair<Rule>) -> Option<ast::Expr> {
        let mut inn = pair.clone().into_inner();
        let mut left = Self::build_expr(&inn.next()?)?;
        while let Some(op) = inn.next() {
            let right = Self::build_expr(&inn.next()?)?;
            let (l, r) = (Box::new(left), Box::new(right));
            left = match Self::first_token_rule(&op) {
                Rule::K_OR => ast::Expr::Binary { left: l, op: ast::BinaryOp::Or, right: r },
                Rule::K_AND => ast::Expr::Binary { left: l, op: ast::BinaryOp::And, right: r },
                Rule::OP_PLUS => ast::Expr::Binary { left: l, op: ast::BinaryOp::Add, right: r },
                Rule::OP_MINUS => ast::Expr::Binary { left: l, op: ast::BinaryOp::Sub, right: r },
                Rule::OP_STAR => ast::Expr::Binary { left: l, op: ast::BinaryOp::Mul, right: r },
                Rule::K_DIV => ast::Expr::Binary { left: l, op: ast::BinaryOp::Div, right: r },
                Rule::K_MOD => ast::Expr::Binary { left: l, op: ast::BinaryOp::Mod, right: r },
                token => {
                    let op = match token {
                        Rule::OP_EQ => ast::GeneralComp::Eq,
                        Rule::OP_NE => ast::GeneralComp::Ne,
                        Rule::OP_LT => ast::GeneralComp::Lt,
                        Rule::OP_LE => ast::GeneralComp::Le,
                        Rule::OP_GT => ast::GeneralComp::Gt,
                        Rule::OP_GE => ast::GeneralComp::Ge,
                        _ => return None,
                    };
                    ast::Expr::GeneralComparison { left: l, op, right: r }
                }
            };
        }
        Some(left)
    }

    fn push_relative_steps(pair: &Pair<Rule>, steps: &mut Vec<ast::Step>) -> Option<()> {
        for p in pair.clone().into_inner() {
            match p.as_rule() {
                Rule::step => steps.push(Self::build_step(&p)?),
                Rule::path_sep => {
                    if Self::first_token_rule(&p) == Rule::OP_DSLASH {
                        steps.push(ast::Step::descendant_or_self());
                    }
                }
                _ => return None,
            }
        }
        Some(())
    }

    fn build_step(pair: &Pair<Rule>) -> Option<ast::Step> {
        let mut inn = pair.clone().into_inner();
        let first = inn.next()?;
        if first.as_rule() == Rule::abbrev_step {
            return Some(match Self::first_token_rule(&first) {
                Rule::OP_DOTDOT => ast::Step::new(ast::Axis::Parent, ast::NodeTest::Node),
                _ => ast::Step::new(ast::Axis::SelfAxis, ast::NodeTest::Node),
            });
        }
        let mut axis = ast::Axis::Child;
        let mut test = None;
        for p in first.into_inner() {
            match p.as_rule() {
                Rule::axis_spec => axis = ast::Axis::from_name(p.into_inner().next()?.as_str())?,
                Rule::OP_AT => axis = ast::Axis::Attribute,
                Rule::node_test => test = Some(Self::build_node_test(&p)?),
                _ => return None,
            }
        }
        let mut step = ast::Step::new(axis, test?);
        step.predicates = inn.map(|p| Self::build_expr(&p)).collect::<Option<_>>()?;
        Some(step)
    }

    fn build_node_test(pair: &Pair<Rule>) -> Option<ast::NodeTest> {
        let inner = pair.clone().into_inner().next()?;
        let leaf = inner.clone().into_inner().next()?;
        Some(match leaf.as_rule() {
            Rule::node_kind_test => ast::NodeTest::Node,
            Rule::text_kind_test => ast::NodeTest::Text,
            Rule::comment_kind_test => ast::NodeTest::Comment,
            Rule::wildcard => ast::NodeTest::Wildcard,
            Rule::prefix_wildcard => {
                ast::NodeTest::PrefixWildcard(leaf.into_inner().next()?.as_str().to_string())
            }
            Rule::qname => ast::NodeTest::Name(leaf.as_str().to_string()),
            _ => return None,
        })
    }
}

/// Parse an XPath expression into the AST.
pub fn parse_xpath(input: &str) -> Result<ast::Expr, Box<Error<Rule>>> {
    XPathParser::parse_to_ast(input)
}
