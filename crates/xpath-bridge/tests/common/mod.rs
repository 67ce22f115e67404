#![allow(dead_code)]

use std::cell::RefCell;

use xpath_bridge::bridge::{Handler, HandlerError};
use xpath_bridge::tree::{Document, attr, comment, elem, text};
use xpath_bridge::{HostValue, NodeSet, Value};

// (employeeId, name, position, salary, gender, domestic)
pub const EMPLOYEES: [(&str, &str, &str, &str, &str, &str); 5] = [
    ("EMP0001", "Margaret Martin", "Accountant", "56,000", "Female", "Yes"),
    ("EMP0002", "Martha Raynolds", "Secretary", "35,000", "Female", "Yes"),
    ("EMP0003", "Roger Jones", "Employee", "100,000", "Male", "No"),
    ("EMP0004", "Jeny Oconnor", "Personnel Director", "95,000", "Female", "Yes"),
    ("EMP0005", "Robert Myers", "Computer Specialist", "90,000", "Male", "No"),
];

/// `<staff>` with a leading comment and five `<employee>` records.
pub fn staff_document() -> Document {
    let mut staff = elem("staff").child(comment(" roster "));
    for (i, (id, name, position, salary, gender, domestic)) in EMPLOYEES.iter().enumerate() {
        staff = staff.child(
            elem("employee")
                .attr(attr("id", id))
                .child(elem("employeeId").child(text(id)))
                .child(elem("name").child(text(name)))
                .child(elem("position").child(text(position)))
                .child(elem("salary").child(text(salary)))
                .child(elem("gender").child(text(gender)))
                .child(
                    elem("address")
                        .attr(attr("domestic", domestic))
                        .attr(attr("street", &format!("{} Main St.", i + 1)))
                        .child(text(&format!("Building {}", i + 1))),
                ),
        );
    }
    Document::new(staff)
}

/// Small HTML-like page for selector tests.
///
/// ```text
/// <html><body>
///   <div id="foo" class="box main"><foo>one</foo><p lang="en-US">hi</p></div>
///   <div class="box"><foo>two</foo></div>
///   <span/>
/// </body></html>
/// ```
pub fn html_document() -> Document {
    Document::new(
        elem("html").child(
            elem("body")
                .child(
                    elem("div")
                        .attr(attr("id", "foo"))
                        .attr(attr("class", "box main"))
                        .child(elem("foo").child(text("one")))
                        .child(elem("p").attr(attr("lang", "en-US")).child(text("hi"))),
                )
                .child(elem("div").attr(attr("class", "box")).child(elem("foo").child(text("two"))))
                .child(elem("span")),
        ),
    )
}

#[derive(Debug)]
pub struct Boom;

impl std::fmt::Display for Boom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("boom")
    }
}

impl std::error::Error for Boom {}

/// Handler recording what it receives.
///
/// * `thing(args..)` records its arguments and returns the first one
/// * `returns_array(set)` returns the nodes as a plain list
/// * `my_filter(set, attr, value)` tests an attribute of the first node
/// * `saves_node_set(set)` keeps the set and returns it
/// * `value()` returns `2.5`, `nothing()` nil, `single_node(set)` a bare node
/// * `fails()` raises [`Boom`]
#[derive(Default)]
pub struct RecordingHandler {
    pub things: RefCell<Vec<Vec<HostValue>>>,
    pub saved: RefCell<Option<NodeSet>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.things.borrow().len()
    }

    /// All nodes passed to `thing`, in call order.
    pub fn flattened_nodes(&self) -> Vec<xpath_bridge::Node> {
        self.things.borrow().iter().flatten().flat_map(HostValue::nodes).collect()
    }
}

impl Handler for RecordingHandler {
    fn responds_to(&self, name: &str) -> bool {
        matches!(
            name,
            "thing" | "returns_array" | "my_filter" | "saves_node_set" | "value" | "nothing" | "single_node" | "fails"
        )
    }

    fn call(&self, name: &str, args: &[HostValue]) -> Result<HostValue, HandlerError> {
        match name {
            "thing" => {
                self.things.borrow_mut().push(args.to_vec());
                Ok(args.first().cloned().unwrap_or(HostValue::Bool(true)))
            }
            "returns_array" => Ok(HostValue::from(args[0].nodes())),
            "my_filter" => {
                let node = args[0].nodes().into_iter().next();
                let (Some(name), Some(value)) = (args[1].as_str(), args[2].as_str()) else {
                    return Err("my_filter expects two strings".into());
                };
                Ok(HostValue::Bool(node.is_some_and(|n| n.attribute(name) == Some(value))))
            }
            "saves_node_set" => {
                let set = args[0].as_node_set().cloned().unwrap_or_default();
                *self.saved.borrow_mut() = Some(set.clone());
                Ok(HostValue::NodeSet(set))
            }
            "value" => Ok(HostValue::Float(2.5)),
            "nothing" => Ok(HostValue::Nil),
            "single_node" => Ok(args[0].nodes().into_iter().next().map_or(HostValue::Nil, HostValue::Node)),
            "fails" => Err(Box::new(Boom)),
            other => Err(format!("unexpected member {other}").into()),
        }
    }
}

pub fn node_set(v: Value) -> NodeSet {
    match v {
        Value::NodeSet(set) => set,
        other => panic!("expected node-set, got {other:?}"),
    }
}

pub fn strings(set: &NodeSet) -> Vec<String> {
    set.iter().map(xpath_bridge::Node::string_value).collect()
}
