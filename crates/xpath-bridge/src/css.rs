//! Selector to XPath translation.
//!
//! Standard selectors compile to plain location paths. Any pseudo-class the
//! translator does not know is a custom pseudo-class: `:name(args)` becomes the
//! predicate `[name(., args)]` and is resolved like any other function call at
//! evaluation time.
//!
//! ```
//! use xpath_bridge::css::compile;
//!
//! assert_eq!(
//!     compile(r#"employee > address:my_filter("domestic", "Yes")"#).unwrap(),
//!     r#"//employee/address[my_filter(., "domestic", "Yes")]"#,
//! );
//! ```
use pest::Parser;
use pest::iterators::Pair;
use tracing::debug;

use crate::bridge::Handler;
use crate::compiler::syntax_message;
use crate::evaluator::evaluate;
use crate::node_set::NodeSet;
use crate::runtime::Error;
use crate::tree::Node;
use crate::value::Value;

#[derive(pest_derive::Parser)]
#[grammar = "css.pest"]
struct SelectorParser;

/// Compile `selector` into an expression matching anywhere in the document.
pub fn compile(selector: &str) -> Result<String, Error> {
    translate(selector, "//")
}

/// Select the nodes below `context` matching `selector`.
pub fn select(selector: &str, context: &Node, handler: Option<&dyn Handler>) -> Result<NodeSet, Error> {
    let expression = translate(selector, ".//")?;
    match evaluate(&expression, Some(context), handler)? {
        Value::NodeSet(set) => Ok(set),
        other => Err(Error::Type(format!(
            "selector '{selector}' produced a {} instead of a node-set",
            other.type_name()
        ))),
    }
}

fn translate(selector: &str, prefix: &str) -> Result<String, Error> {
    let syntax = |message: String| Error::SelectorSyntax { selector: selector.to_string(), message };
    let mut pairs =
        SelectorParser::parse(Rule::selector_group, selector).map_err(|e| syntax(syntax_message(&e)))?;
    let group = pairs.next().ok_or_else(|| syntax("empty selector".into()))?;
    let mut alternatives = Vec::new();
    for p in group.into_inner().filter(|p| p.as_rule() == Rule::selector) {
        let path = selector_path(&p, prefix).ok_or_else(|| syntax("unsupported selector".into()))?;
        alternatives.push(path);
    }
    let expression = alternatives.join(" | ");
    debug!(selector, expression = expression.as_str(), "compiled selector");
    Ok(expression)
}

fn selector_path(pair: &Pair<Rule>, prefix: &str) -> Option<String> {
    let mut out = String::from(prefix);
    for p in pair.clone().into_inner() {
        match p.as_rule() {
            Rule::compound => out.push_str(&compound_step(&p)?),
            Rule::combinator => {
                let kind = p.into_inner().next().map_or(Rule::descendant_comb, |c| c.as_rule());
                out.push_str(match kind {
                    Rule::child_comb => "/",
                    Rule::adjacent_comb => "/following-sibling::*[1]/self::",
                    Rule::sibling_comb => "/following-sibling::",
                    _ => "//",
                });
            }
            _ => return None,
        }
    }
    Some(out)
}

// element name followed by one predicate per simple selector
fn compound_step(pair: &Pair<Rule>) -> Option<String> {
    let mut element = String::from("*");
    let mut predicates = String::new();
    for p in pair.clone().into_inner() {
        match p.as_rule() {
            Rule::type_sel => element = p.as_str().to_string(),
            Rule::simple => {
                let cond = condition(&p.into_inner().next()?)?;
                predicates.push('[');
                predicates.push_str(&cond);
                predicates.push(']');
            }
            _ => return None,
        }
    }
    Some(element + &predicates)
}

/// Predicate body for one simple selector.
fn condition(pair: &Pair<Rule>) -> Option<String> {
    match pair.as_rule() {
        Rule::id_sel => {
            let id = pair.clone().into_inner().next()?.as_str();
            Some(format!("@id = {}", xpath_literal(id)))
        }
        Rule::class_sel => {
            let class = pair.clone().into_inner().next()?.as_str();
            Some(contains_word("@class", class))
        }
        Rule::attrib => attribute_condition(pair),
        Rule::pseudo => pseudo_condition(&pair.clone().into_inner().next()?),
        Rule::type_sel => Some(format!("self::{}", pair.as_str())),
        _ => None,
    }
}

fn attribute_condition(pair: &Pair<Rule>) -> Option<String> {
    let mut inn = pair.clone().into_inner();
    let attr = format!("@{}", inn.next()?.as_str());
    let Some(op) = inn.next() else {
        return Some(attr);
    };
    let value = literal_value(&inn.next()?)?;
    let v = xpath_literal(&value);
    Some(match op.into_inner().next()?.as_rule() {
        Rule::op_eq => format!("{attr} = {v}"),
        Rule::op_includes => contains_word(&attr, &value),
        Rule::op_prefix => format!("starts-with({attr}, {v})"),
        Rule::op_suffix => {
            format!("substring({attr}, string-length({attr}) - string-length({v}) + 1) = {v}")
        }
        Rule::op_substring => format!("contains({attr}, {v})"),
        Rule::op_dash => {
            format!("{attr} = {v} or starts-with({attr}, {})", xpath_literal(&format!("{value}-")))
        }
        _ => return None,
    })
}

fn pseudo_condition(pair: &Pair<Rule>) -> Option<String> {
    match pair.as_rule() {
        Rule::negation => {
            let arg = pair.clone().into_inner().next()?.into_inner().next()?;
            Some(format!("not({})", condition(&arg)?))
        }
        Rule::bare_pseudo => {
            let name = pair.as_str();
            Some(match name {
                "first-child" => "not(preceding-sibling::*)".to_string(),
                "last-child" => "not(following-sibling::*)".to_string(),
                "only-child" => "not(preceding-sibling::*) and not(following-sibling::*)".to_string(),
                "empty" => "not(node())".to_string(),
                "root" => "not(parent::*)".to_string(),
                n if is_structural_nth(n) => return None,
                custom => format!("{custom}(.)"),
            })
        }
        Rule::functional_pseudo => {
            let mut inn = pair.clone().into_inner();
            let name = inn.next()?.as_str();
            let args: Vec<String> = inn.map(|a| pseudo_argument(&a)).collect::<Option<_>>()?;
            if is_structural_nth(name) {
                return structural_nth(name, &args);
            }
            let mut call = format!("{name}(.");
            for a in &args {
                call.push_str(", ");
                call.push_str(a);
            }
            call.push(')');
            Some(call)
        }
        _ => None,
    }
}

fn is_structural_nth(name: &str) -> bool {
    matches!(name, "nth-child" | "nth-last-child")
}

// :nth-child(n) / :nth-last-child(n) with a plain positive integer
fn structural_nth(name: &str, args: &[String]) -> Option<String> {
    let axis = match name {
        "nth-child" => "preceding-sibling",
        "nth-last-child" => "following-sibling",
        _ => return None,
    };
    let [n] = args else {
        return None;
    };
    let n: usize = n.parse().ok().filter(|n| *n > 0)?;
    Some(format!("count({axis}::*) = {}", n - 1))
}

// Literals are copied verbatim: selector strings have no escapes, so their
// quoting is already valid XPath.
fn pseudo_argument(pair: &Pair<Rule>) -> Option<String> {
    let inner = pair.clone().into_inner().next()?;
    match inner.as_rule() {
        Rule::number | Rule::string => Some(inner.as_str().to_string()),
        _ => None,
    }
}

fn literal_value(pair: &Pair<Rule>) -> Option<String> {
    let inner = pair.clone().into_inner().next()?;
    match inner.as_rule() {
        Rule::string => Some(inner.into_inner().next().map(|p| p.as_str().to_string()).unwrap_or_default()),
        Rule::ident | Rule::number => Some(inner.as_str().to_string()),
        _ => None,
    }
}

fn contains_word(attr: &str, word: &str) -> String {
    format!(
        "contains(concat(' ', normalize-space({attr}), ' '), {})",
        xpath_literal(&format!(" {word} "))
    )
}

/// Quote `s` as an XPath string literal.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
