mod common;

use common::{RecordingHandler, node_set, staff_document};
use rstest::{fixture, rstest};
use xpath_bridge::decoration::from_fn;
use xpath_bridge::{Document, Error, HostValue, NodeSet, decorate};

#[fixture]
fn staff() -> Document {
    let doc = staff_document();
    doc.decorate(from_fn("awesome!", |set: &NodeSet, _args: &[HostValue]| {
        Ok(HostValue::Int(set.len() as i64))
    }));
    doc
}

#[rstest]
fn evaluation_results_carry_document_decorations(staff: Document) {
    let set = node_set(staff.xpath("//employee").unwrap());
    assert!(set.responds_to("awesome!"));
    assert!(!set.responds_to("dull"));
    assert_eq!(set.call_decoration("awesome!", &[]).unwrap(), HostValue::Int(5));
}

#[rstest]
fn node_set_saved_by_a_handler_stays_usable(staff: Document) {
    let handler = RecordingHandler::new();
    staff.xpath_with("//employee[saves_node_set(name)][1]", &handler).unwrap();
    let saved = handler.saved.borrow_mut().take().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved.document(), Some(staff.clone()));
    assert!(saved.responds_to("awesome!"));
    assert_eq!(saved.call_decoration("awesome!", &[]).unwrap(), HostValue::Int(1));
}

#[rstest]
fn decorations_are_a_snapshot(staff: Document) {
    let before = node_set(staff.xpath("//employee").unwrap());
    staff.decorate(from_fn("later", |_set: &NodeSet, _args: &[HostValue]| Ok(HostValue::Bool(true))));

    assert!(!before.responds_to("later"));
    let err = before.call_decoration("later", &[]).unwrap_err();
    assert!(matches!(err, Error::UndefinedFunction(ref n) if n == "later"));

    // already decorated: left as is
    let again = decorate(before.clone(), Some(&staff));
    assert!(!again.responds_to("later"));

    let after = node_set(staff.xpath("//employee").unwrap());
    assert!(after.responds_to("later"));
    assert!(after.responds_to("awesome!"));
}

#[rstest]
fn node_responds_to_the_live_registry(staff: Document) {
    let employee = staff.root_element().unwrap().children()[1].clone();
    assert!(employee.responds_to("awesome!"));
    assert!(!employee.responds_to("later"));
    staff.decorate(from_fn("later", |_set: &NodeSet, _args: &[HostValue]| Ok(HostValue::Nil)));
    assert!(employee.responds_to("later"));
}

#[rstest]
fn latest_registration_wins(staff: Document) {
    staff.decorate(from_fn("awesome!", |_set: &NodeSet, _args: &[HostValue]| {
        Ok(HostValue::Text("replaced".into()))
    }));
    let set = node_set(staff.xpath("//employee").unwrap());
    assert_eq!(set.call_decoration("awesome!", &[]).unwrap(), HostValue::Text("replaced".into()));
    assert_eq!(staff.decorations().len(), 2);
}

#[rstest]
fn decoration_failures_surface_as_handler_errors(staff: Document) {
    staff.decorate(from_fn("broken", |_set: &NodeSet, _args: &[HostValue]| Err("nope".into())));
    let set = node_set(staff.xpath("//employee").unwrap());
    let err = set.call_decoration("broken", &[]).unwrap_err();
    assert!(matches!(err, Error::Handler { ref function, .. } if function == "broken"));
}

#[rstest]
fn decorate_resolves_the_owner(staff: Document) {
    let nodes = staff.root_element().unwrap().children().to_vec();
    let plain = NodeSet::from_nodes(nodes);
    assert!(!plain.is_decorated());
    let decorated = decorate(plain, None);
    assert!(decorated.responds_to("awesome!"));

    // an empty set has no node to name its document
    assert!(!decorate(NodeSet::new(), None).is_decorated());
    let empty = decorate(NodeSet::new(), Some(&staff));
    assert!(empty.responds_to("awesome!"));
    assert_eq!(empty.document(), Some(staff));
}

#[rstest]
fn sets_outliving_their_document_lose_it() {
    let set = {
        let doc = staff_document();
        node_set(doc.xpath("//employee").unwrap())
    };
    assert_eq!(set.len(), 5);
    assert!(set.document().is_none());
    assert!(set[0].document().is_none());
    assert!(set[0].parent().is_none());
}
