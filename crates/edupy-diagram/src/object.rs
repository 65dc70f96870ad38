use edupy_inspect::{AttributeRecord, AttributeValue, Identity, ObjectGraph, ObjectNode, Visibility};
use indexmap::IndexMap;

use crate::markup::{quoted, Markup};
use crate::DiagramSettings;

/// PlantUML alias of the node for `identity`, e.g. `o140234`.
pub fn object_alias(identity: &Identity) -> String {
    let sanitized: String = identity
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("o{sanitized}")
}

/// One standalone document per node, keyed by identity in graph order.
pub fn object_cards(graph: &ObjectGraph, settings: &DiagramSettings) -> IndexMap<Identity, String> {
    graph
        .nodes()
        .map(|node| {
            let mut markup = Markup::start(settings);
            write_node(&mut markup, node, settings);
            (node.identity.clone(), markup.finish())
        })
        .collect()
}

/// Every node once, followed by one association per reference attribute.
pub fn object_diagram(graph: &ObjectGraph, settings: &DiagramSettings) -> String {
    let mut markup = Markup::start(settings);
    for node in graph.nodes() {
        write_node(&mut markup, node, settings);
        let alias = object_alias(&node.identity);
        for target in node.references() {
            markup.line(format_args!("{alias} --> {}", object_alias(target)));
        }
    }
    markup.finish()
}

fn write_node(markup: &mut Markup, node: &ObjectNode, settings: &DiagramSettings) {
    markup.line(format_args!(
        "object \"{}\" as {} {{",
        quoted(node.primary_label()),
        object_alias(&node.identity)
    ));
    for attribute in &node.attributes {
        markup.line(format_args!("{}", attribute_line(attribute, settings)));
    }
    markup.line(format_args!("}}"));
}

fn attribute_line(attribute: &AttributeRecord, settings: &DiagramSettings) -> String {
    let modifier = if attribute.visibility == Visibility::Static {
        "{static} "
    } else {
        ""
    };
    match &attribute.value {
        AttributeValue::Literal(text) => format!("{modifier}{} = {text}", attribute.name),
        AttributeValue::Reference(target) => format!(
            "{modifier}{} = {target} [[[{}/{target}]]]",
            attribute.name,
            settings.locator_base.trim_end_matches('/')
        ),
    }
}
