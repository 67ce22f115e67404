use xpath_bridge::tree::{Document, attr, elem, text};
use xpath_bridge::{FunctionTable, HostValue, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let doc = Document::new(
        elem("staff")
            .child(
                elem("employee")
                    .child(elem("name").child(text("Margaret Martin")))
                    .child(elem("address").attr(attr("domestic", "Yes")).child(text("1230 North Ave."))),
            )
            .child(
                elem("employee")
                    .child(elem("name").child(text("Roger Jones")))
                    .child(elem("address").attr(attr("domestic", "No")).child(text("PO Box 27 Irving"))),
            ),
    );

    let functions = FunctionTable::new().with("my_filter", |args: &[HostValue]| {
        let nodes = args[0].nodes();
        let (Some(name), Some(value)) = (args[1].as_str(), args[2].as_str()) else {
            return Err("my_filter(set, attribute, value) expects two strings".into());
        };
        Ok(HostValue::Bool(nodes.iter().any(|n| n.attribute(name) == Some(value))))
    });

    let query = r#"//employee/address[my_filter(., "domestic", "Yes")]"#;
    if let Value::NodeSet(set) = doc.xpath_with(query, &functions)? {
        for node in &set {
            println!("xpath: {}", node.string_value());
        }
    }

    let set = doc.css(r#"employee > address:my_filter("domestic", "No")"#, Some(&functions))?;
    for node in &set {
        println!("css:   {}", node.string_value());
    }

    match doc.xpath("//employee[unknown(.)]") {
        Ok(v) => println!("unexpected: {v:?}"),
        Err(e) => println!("error: {e} ({})", e.code()),
    }
    Ok(())
}
