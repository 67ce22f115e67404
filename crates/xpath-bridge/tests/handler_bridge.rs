mod common;

use std::sync::Arc;

use common::{Boom, EMPLOYEES, RecordingHandler, node_set, staff_document, strings};
use rstest::{fixture, rstest};
use xpath_bridge::functions::FunctionRegistry;
use xpath_bridge::runtime::EvaluationContextBuilder;
use xpath_bridge::{
    ArgumentCountError, Document, Error, ErrorCode, FunctionTable, HostValue, Value, evaluate_with,
};

#[fixture]
fn staff() -> Document {
    staff_document()
}

#[fixture]
fn handler() -> RecordingHandler {
    RecordingHandler::new()
}

#[rstest]
fn custom_predicate_is_called_once_per_candidate(staff: Document, handler: RecordingHandler) {
    let set = node_set(staff.xpath_with(r#"//employee[thing("asdf")]"#, &handler).unwrap());
    assert_eq!(set.len(), 5);
    assert_eq!(handler.calls(), 5);
    for call in handler.things.borrow().iter() {
        assert_eq!(call.as_slice(), &[HostValue::Text("asdf".into())]);
    }
}

#[rstest]
#[case("//employee[thing(true())]", 5)]
#[case("//employee[thing(false())]", 0)]
#[case("//employee[thing(10)]", 5)]
#[case("//employee[thing(0)]", 0)]
#[case("//employee[thing('')]", 0)]
#[case("//employee[thing()]", 5)]
fn custom_predicate_results_are_coerced_to_boolean(
    staff: Document,
    handler: RecordingHandler,
    #[case] expr: &str,
    #[case] expected: usize,
) {
    let set = node_set(staff.xpath_with(expr, &handler).unwrap());
    assert_eq!(set.len(), expected, "{expr}");
    assert_eq!(handler.calls(), 5);
}

#[rstest]
fn scalar_arguments_are_marshalled(staff: Document, handler: RecordingHandler) {
    staff.xpath_with("thing(10, 'a', true(), 1 div 0)", &handler).unwrap();
    let calls = handler.things.borrow();
    assert_eq!(
        calls[0],
        vec![
            HostValue::Float(10.0),
            HostValue::Text("a".into()),
            HostValue::Bool(true),
            HostValue::Float(f64::INFINITY),
        ]
    );
}

#[rstest]
fn nested_calls_run_left_to_right(staff: Document, handler: RecordingHandler) {
    staff.xpath_with("thing(thing(1), thing('b'), 3)", &handler).unwrap();
    assert_eq!(
        *handler.things.borrow(),
        vec![
            vec![HostValue::Float(1.0)],
            vec![HostValue::Text("b".into())],
            vec![HostValue::Float(1.0), HostValue::Text("b".into()), HostValue::Float(3.0)],
        ]
    );
}

#[rstest]
fn node_set_arguments_are_passed_per_context_node(staff: Document, handler: RecordingHandler) {
    let set = node_set(staff.xpath_with("//employee[thing(name)]", &handler).unwrap());
    assert_eq!(set.len(), 5);
    let expected = node_set(staff.xpath("//employee/name").unwrap()).into_nodes();
    assert_eq!(handler.flattened_nodes(), expected);
    for call in handler.things.borrow().iter() {
        let arg = call[0].as_node_set().unwrap();
        assert_eq!(arg.len(), 1);
        assert_eq!(arg.document(), Some(staff.clone()));
        assert!(arg.is_decorated());
    }
}

#[rstest]
fn node_list_return_is_a_node_set(staff: Document, handler: RecordingHandler) {
    let set = node_set(staff.xpath_with("//employee[returns_array(name)]", &handler).unwrap());
    assert_eq!(set.len(), 5);
    let names = node_set(staff.xpath_with("returns_array(//name)", &handler).unwrap());
    assert_eq!(strings(&names)[0], "Margaret Martin");
    assert!(names.is_decorated());
    assert_eq!(names.document(), Some(staff));
}

#[rstest]
fn returned_nodes_are_put_in_document_order(staff: Document) {
    let table = FunctionTable::new()
        .with("rev", |args: &[HostValue]| {
            let mut nodes = args[0].nodes();
            nodes.reverse();
            Ok(HostValue::from(nodes))
        })
        .with("doubled", |args: &[HostValue]| {
            let nodes = args[0].nodes();
            Ok(HostValue::from(nodes.iter().rev().chain(&nodes).cloned().collect::<Vec<_>>()))
        });
    let names = node_set(staff.xpath_with("rev(//name)", &table).unwrap());
    assert_eq!(strings(&names), EMPLOYEES.map(|e| e.1));
    let first = node_set(staff.xpath_with("(rev(//name))[1]", &table).unwrap());
    assert_eq!(strings(&first), ["Margaret Martin"]);
    let doubled = node_set(staff.xpath_with("doubled(//name)", &table).unwrap());
    assert_eq!(strings(&doubled), EMPLOYEES.map(|e| e.1));
}

#[rstest]
fn filter_function_receives_context_and_literals(staff: Document, handler: RecordingHandler) {
    let set = node_set(
        staff
            .xpath_with(r#"//employee/address[my_filter(., "domestic", "Yes")]"#, &handler)
            .unwrap(),
    );
    assert_eq!(strings(&set), ["Building 1", "Building 2", "Building 4"]);
}

#[rstest]
fn handler_results_take_part_in_expressions(staff: Document, handler: RecordingHandler) {
    assert_eq!(staff.xpath_with("value() * 2", &handler).unwrap(), Value::Number(5.0));
    assert_eq!(
        staff.xpath_with("count(thing(//employee))", &handler).unwrap(),
        Value::Number(5.0)
    );
    assert_eq!(
        staff.xpath_with("thing(//employee)/name = 'Roger Jones'", &handler).unwrap(),
        Value::Boolean(true)
    );
}

#[rstest]
fn calls_without_handler_are_undefined(staff: Document) {
    let err = staff.xpath(r#"//employee[thing("asdf")]"#).unwrap_err();
    assert!(matches!(err, Error::UndefinedFunction(ref n) if n == "thing"));
    assert_eq!(err.code(), ErrorCode::XPST0017);
}

#[rstest]
fn unknown_member_is_undefined(staff: Document, handler: RecordingHandler) {
    let err = staff.xpath_with("//employee[bogus(.)]", &handler).unwrap_err();
    assert!(matches!(err, Error::UndefinedFunction(ref n) if n == "bogus"));
    assert_eq!(handler.calls(), 0);
}

#[rstest]
#[case("nothing()", "nil")]
#[case("single_node(//employee)", "node")]
fn unusable_return_values_are_rejected(
    staff: Document,
    handler: RecordingHandler,
    #[case] expr: &str,
    #[case] found: &str,
) {
    let err = staff.xpath_with(expr, &handler).unwrap_err();
    match &err {
        Error::InvalidReturnType { function, found: got } => {
            assert!(expr.starts_with(function.as_str()));
            assert_eq!(*got, found);
        }
        other => panic!("expected InvalidReturnType, got {other:?}"),
    }
    assert_eq!(err.code(), ErrorCode::XPTY0004);
}

#[rstest]
fn handler_failures_keep_their_source(staff: Document, handler: RecordingHandler) {
    let err = staff.xpath_with("//employee[fails()]", &handler).unwrap_err();
    assert!(matches!(err, Error::Handler { ref function, .. } if function == "fails"));
    assert_eq!(err.code(), ErrorCode::FOER0000);
    assert!(err.handler_source().unwrap().downcast_ref::<Boom>().is_some());
    assert_eq!(std::error::Error::source(&err).map(ToString::to_string), Some("boom".into()));
}

#[rstest]
fn builtins_win_over_handler_members(staff: Document) {
    let table = FunctionTable::new()
        .with("count", |_args: &[HostValue]| Ok(HostValue::Int(99)))
        .with("twice", |args: &[HostValue]| Ok(HostValue::Float(args[0].as_f64().unwrap_or(0.0) * 2.0)));
    assert_eq!(staff.xpath_with("count(//employee)", &table).unwrap(), Value::Number(5.0));
    assert_eq!(staff.xpath_with("twice(count(//employee))", &table).unwrap(), Value::Number(10.0));
}

#[rstest]
fn registry_without_a_builtin_routes_it_to_the_handler(staff: Document) {
    let table = FunctionTable::new().with("count", |_args: &[HostValue]| Ok(HostValue::Int(99)));
    let ctx = EvaluationContextBuilder::new()
        .with_context_node(staff.root())
        .with_handler(&table)
        .with_functions(Arc::new(FunctionRegistry::new()))
        .build();
    assert_eq!(evaluate_with("count(//employee)", &ctx).unwrap(), Value::Number(99.0));
}

#[rstest]
fn fixed_arity_member_reports_argument_count(staff: Document) {
    let mut table = FunctionTable::new();
    table.register_fixed("pair", 2, |_args: &[HostValue]| Ok(HostValue::Bool(true)));
    assert_eq!(staff.xpath_with("pair(1, 2)", &table).unwrap(), Value::Boolean(true));

    let err = staff.xpath_with("pair(1)", &table).unwrap_err();
    let count = err.handler_source().and_then(|e| e.downcast_ref::<ArgumentCountError>()).unwrap();
    assert_eq!((count.expected, count.given), (2, 1));
}

#[rstest]
fn handlers_may_evaluate_reentrantly(staff: Document) {
    let table = FunctionTable::new().with("first_name", |args: &[HostValue]| {
        let Some(node) = args[0].nodes().into_iter().next() else {
            return Ok(HostValue::Text(String::new()));
        };
        let name = node.xpath("string(name)", None)?;
        Ok(HostValue::Text(name.to_xpath_string()))
    });
    let set = node_set(
        staff
            .xpath_with("//employee[starts-with(first_name(.), 'Ro')]/employeeId", &table)
            .unwrap(),
    );
    assert_eq!(strings(&set), ["EMP0003", "EMP0005"]);
}
