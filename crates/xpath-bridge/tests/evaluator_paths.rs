mod common;

use common::{EMPLOYEES, html_document, node_set, staff_document, strings};
use rstest::{fixture, rstest};
use xpath_bridge::{Document, NodeKind, Value};

#[fixture]
fn staff() -> Document {
    staff_document()
}

fn select(doc: &Document, expr: &str) -> Vec<String> {
    strings(&node_set(doc.xpath(expr).unwrap()))
}

#[rstest]
fn child_paths_follow_document_order(staff: Document) {
    let names: Vec<String> = EMPLOYEES.iter().map(|e| e.1.to_string()).collect();
    assert_eq!(select(&staff, "//employee/name"), names);
    assert_eq!(select(&staff, "/staff/employee/name"), names);
    assert_eq!(staff.xpath("count(//employee)").unwrap(), Value::Number(5.0));
}

#[rstest]
fn unmatched_attribute_is_an_empty_set(staff: Document) {
    let set = node_set(staff.xpath(r#"//employee[@id="asdfasdf"]/@fooo"#).unwrap());
    assert_eq!(set.len(), 0);
    assert!(set.get(0).is_none());
    assert!(set.first().is_none());
}

#[rstest]
#[case("//employee[2]/name", &["Martha Raynolds"])]
#[case("//employee[last()]/name", &["Robert Myers"])]
#[case("//employee[position() > 3]/employeeId", &["EMP0004", "EMP0005"])]
#[case("//employee[address/@domestic = 'No']/employeeId", &["EMP0003", "EMP0005"])]
#[case("//employee[address[@domestic='Yes']][2]/employeeId", &["EMP0002"])]
#[case("(//employee)[2]/position", &["Secretary"])]
#[case("(//name)[last()]", &["Robert Myers"])]
#[case("//employee[3]/preceding-sibling::employee[1]/employeeId", &["EMP0002"])]
#[case("//employee[3]/following-sibling::employee/employeeId", &["EMP0004", "EMP0005"])]
#[case("//employee[2]/preceding::name", &["Margaret Martin"])]
#[case("//name[. = 'Roger Jones']/ancestor::*[1]/employeeId", &["EMP0003"])]
#[case("id('EMP0004')/name", &["Jeny Oconnor"])]
#[case("id('EMP0001 EMP0005')/employeeId", &["EMP0001", "EMP0005"])]
#[case("//address[@street = '2 Main St.']", &["Building 2"])]
#[case("/staff/comment()", &[" roster "])]
fn location_paths(staff: Document, #[case] expr: &str, #[case] expected: &[&str]) {
    assert_eq!(select(&staff, expr), expected, "{expr}");
}

#[rstest]
#[case("/staff/node()", 6)]
#[case("//name/text()", 5)]
#[case("//salary/..", 5)]
#[case("//address[@domestic = 'Yes']", 3)]
#[case("//employee[1]/following::address", 4)]
#[case("//name[. = 'Roger Jones']/ancestor::*", 2)]
#[case("//name[. = 'Roger Jones']/ancestor-or-self::*", 3)]
#[case("//address/@street", 5)]
#[case("//employee/@*", 5)]
#[case("//employee[1]/descendant::*", 6)]
#[case("//employee[1]/descendant-or-self::node()", 13)]
#[case("/descendant::employee/self::employee", 5)]
#[case("//employee[1]/child::*[self::name or self::gender]", 2)]
fn location_path_counts(staff: Document, #[case] expr: &str, #[case] expected: usize) {
    assert_eq!(node_set(staff.xpath(expr).unwrap()).len(), expected, "{expr}");
}

#[rstest]
fn union_is_sorted_and_distinct(staff: Document) {
    let got = select(&staff, "//gender | //name | //name");
    assert_eq!(got.len(), 10);
    assert_eq!(&got[..4], &["Margaret Martin", "Female", "Martha Raynolds", "Female"]);
}

#[rstest]
fn repeated_evaluation_is_stable(staff: Document) {
    let expr = "//address | //employee[position() mod 2 = 1]/name";
    let first = node_set(staff.xpath(expr).unwrap());
    let second = node_set(staff.xpath(expr).unwrap());
    assert_eq!(first, second);
    assert_eq!(first.len(), 8);
}

#[rstest]
fn name_functions(staff: Document) {
    assert_eq!(staff.xpath("name(//employee[1]/*[2])").unwrap(), Value::String("name".into()));
    assert_eq!(staff.xpath("local-name(/staff)").unwrap(), Value::String("staff".into()));
    assert_eq!(staff.xpath("name(//nothing)").unwrap(), Value::String(String::new()));
    assert_eq!(
        staff.xpath("string(//employee[1]/address)").unwrap(),
        Value::String("Building 1".into())
    );
    assert_eq!(
        staff.xpath("//employee[1]/salary = '56,000'").unwrap(),
        Value::Boolean(true)
    );
}

#[rstest]
fn relative_paths_use_the_context_node(staff: Document) {
    let employee = node_set(staff.xpath("//employee[4]").unwrap()).into_nodes().remove(0);
    let name = node_set(employee.xpath("name", None).unwrap());
    assert_eq!(strings(&name), ["Jeny Oconnor"]);
    assert_eq!(node_set(employee.xpath("../employee", None).unwrap()).len(), 5);
    let itself = node_set(employee.xpath(".", None).unwrap());
    assert_eq!(itself.nodes(), std::slice::from_ref(&employee));
    assert_eq!(employee.xpath("string(@id)", None).unwrap(), Value::String("EMP0004".into()));
    let root = node_set(employee.xpath("/", None).unwrap());
    assert_eq!(root.first().map(xpath_bridge::Node::kind), Some(NodeKind::Document));
}

#[rstest]
fn results_know_their_document(staff: Document) {
    let set = node_set(staff.xpath("//employee").unwrap());
    assert_eq!(set.document(), Some(staff.clone()));
    assert!(set.is_decorated());
    let empty = node_set(staff.xpath("//nothing").unwrap());
    assert_eq!(empty.document(), Some(staff));
}

#[rstest]
fn id_followed_by_descendant_path() {
    let html = html_document();
    let set = node_set(html.xpath(r#"id("foo")//foo"#).unwrap());
    assert_eq!(set.len(), 1);
    assert_eq!(strings(&set), ["one"]);
}
