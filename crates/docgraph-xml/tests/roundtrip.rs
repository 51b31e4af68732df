//! Integration tests for writing graphs and reading them back.
//!
//! These tests verify that every kind of field value, shared and cyclic references,
//! subtypes and inverse fields survive a write/read cycle.

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;

use docgraph_model::{
    DefinedType, EntityId, EntityType, EnumType, FieldDescriptor, Graph, Placement, Scalar,
    ScalarKind, Schema, Value,
};
use docgraph_xml::{
    DocumentHeader, XmlError, XmlReader, XmlReaderOptions, XmlWriter, XmlWriterOptions,
};

fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::builder()
            .entity(
                EntityType::new("Project")
                    .with_key_field("GlobalId")
                    .with_name_field("Name")
                    .field(FieldDescriptor::scalar("GlobalId", ScalarKind::String))
                    .field(FieldDescriptor::scalar("Name", ScalarKind::String))
                    .field(FieldDescriptor::enumeration(
                        "Status",
                        EnumType::new("Status", ["Draft", "Final"]),
                    ))
                    .field(FieldDescriptor::scalar("Created", ScalarKind::Timestamp))
                    .field(FieldDescriptor::scalar("Payload", ScalarKind::Binary))
                    .field(FieldDescriptor::list(
                        "Weights",
                        DefinedType::primitive(ScalarKind::Real),
                    ))
                    .field(FieldDescriptor::list(
                        "Tags",
                        DefinedType::primitive(ScalarKind::String),
                    ))
                    .field(FieldDescriptor::matrix(
                        "Grid",
                        DefinedType::primitive(ScalarKind::Integer),
                        2,
                    ))
                    .field(FieldDescriptor::matrix(
                        "Cells",
                        DefinedType::primitive(ScalarKind::String),
                        2,
                    ))
                    .field(FieldDescriptor::select(
                        "Measure",
                        vec![
                            DefinedType::new("Length", ScalarKind::Real),
                            DefinedType::new("Label", ScalarKind::String),
                        ],
                    ))
                    .field(FieldDescriptor::entity("Lead", "Item").with_placement(Placement::Attribute))
                    .field(FieldDescriptor::entities("Items", "Item"))
                    .field(FieldDescriptor::inverse("Children", "Item", "Parent")),
            )
            .entity(
                EntityType::new("Element")
                    .abstract_type()
                    .with_key_field("Name")
                    .field(FieldDescriptor::scalar("Name", ScalarKind::String)),
            )
            .entity(
                EntityType::new("Item")
                    .extends("Element")
                    .field(FieldDescriptor::entity("Parent", "Project"))
                    .field(FieldDescriptor::entity("Next", "Item"))
                    .field(FieldDescriptor::entities("Related", "Item")),
            )
            .entity(
                EntityType::new("SpecialItem")
                    .extends("Item")
                    .field(FieldDescriptor::scalar("Extra", ScalarKind::Integer)),
            )
            .root("Project")
            .build()
            .unwrap(),
    )
}

/// Helper to write a graph and read it back.
fn roundtrip(graph: &Graph, options: XmlWriterOptions) -> (String, Graph) {
    let mut buffer = Vec::new();
    XmlWriter::with_options(&mut buffer, options)
        .write_graph(graph)
        .unwrap();
    let text = String::from_utf8(buffer).unwrap();
    let read_back = XmlReader::new(text.as_bytes())
        .read(Arc::clone(graph.schema()))
        .unwrap();
    (text, read_back)
}

fn item(graph: &mut Graph, type_name: &str, name: &str) -> EntityId {
    let id = graph.create(type_name).unwrap();
    graph.set(id, "Name", name).unwrap();
    id
}

fn project(graph: &mut Graph) -> EntityId {
    let project = graph.create("Project").unwrap();
    graph.set_root(project).unwrap();
    graph.set(project, "GlobalId", "P-1").unwrap();
    graph.set(project, "Name", "Demo").unwrap();
    project
}

#[test]
fn test_full_graph_roundtrip() {
    let mut graph = Graph::new(schema());
    let p = project(&mut graph);
    let created = NaiveDate::from_ymd_opt(2024, 5, 17)
        .unwrap()
        .and_hms_milli_opt(9, 30, 0, 250)
        .unwrap();
    graph.set(p, "Status", Value::Enum("Final".to_string())).unwrap();
    graph.set(p, "Created", created).unwrap();
    graph.set(p, "Payload", vec![0xDE_u8, 0xAD, 0x00, 0x7F]).unwrap();
    graph
        .set(p, "Weights", Value::List(vec![Scalar::Real(1.5), Scalar::Real(-2.0)]))
        .unwrap();
    graph
        .set(
            p,
            "Tags",
            Value::List(vec![Scalar::from("alpha beta"), Scalar::from("<gamma>")]),
        )
        .unwrap();
    graph
        .set(
            p,
            "Grid",
            Value::Matrix(vec![
                vec![Scalar::Integer(1), Scalar::Integer(2)],
                vec![Scalar::Integer(3), Scalar::Integer(4)],
            ]),
        )
        .unwrap();
    graph
        .set(
            p,
            "Cells",
            Value::Matrix(vec![vec![Scalar::from("top left"), Scalar::from("")]]),
        )
        .unwrap();
    graph
        .set(
            p,
            "Measure",
            Value::Selected {
                type_name: "Length".to_string(),
                value: Scalar::Real(2.5),
            },
        )
        .unwrap();

    let a = item(&mut graph, "Item", "A");
    let b = item(&mut graph, "SpecialItem", "B & \"b\"");
    let c = item(&mut graph, "Item", "C");
    graph.set(b, "Extra", 7).unwrap();
    graph.push(p, "Items", a).unwrap();
    graph.push(p, "Items", b).unwrap();
    graph.set(p, "Lead", b).unwrap();
    for child in [a, b, c] {
        graph.set(child, "Parent", p).unwrap();
    }
    graph.set(a, "Next", b).unwrap();
    graph.push(b, "Related", a).unwrap();
    graph.push(b, "Related", b).unwrap();

    let (text, read_back) = roundtrip(&graph, XmlWriterOptions::default());
    assert!(
        graph.equivalent(&read_back),
        "{:?}\n{text}",
        graph.difference(&read_back)
    );

    let root = read_back.root().unwrap();
    let lead = read_back.reference(root, "Lead").unwrap();
    assert_eq!(read_back.type_name(lead), "SpecialItem");
    assert_eq!(read_back.value(lead, "Extra"), Some(&Value::from(7)));
    assert_eq!(read_back.members(root, "Children").len(), 3);
}

#[test]
fn test_items_define_children() {
    let mut graph = Graph::new(schema());
    let p = project(&mut graph);
    let a = item(&mut graph, "Item", "A");
    let b = item(&mut graph, "Item", "B");
    graph.push(p, "Items", a).unwrap();
    graph.push(p, "Items", b).unwrap();
    graph.set(a, "Parent", p).unwrap();
    graph.set(b, "Parent", p).unwrap();

    let (_, read_back) = roundtrip(&graph, XmlWriterOptions::default());
    let root = read_back.root().unwrap();
    let mut names: Vec<_> = read_back
        .members(root, "Children")
        .iter()
        .map(|&child| read_back.text(child, "Name").unwrap())
        .collect();
    names.sort_unstable();
    assert_eq!(names, ["A", "B"]);
}

#[test]
fn test_single_reference_has_no_identifier() {
    let mut graph = Graph::new(schema());
    let p = project(&mut graph);
    let a = item(&mut graph, "Item", "A");
    graph.push(p, "Items", a).unwrap();

    let (text, read_back) = roundtrip(&graph, XmlWriterOptions::default());
    assert!(!text.contains(" id=\""), "{text}");
    assert!(!text.contains("href="), "{text}");
    assert!(graph.equivalent(&read_back));
}

#[test]
fn test_natural_key_identifiers() {
    let mut graph = Graph::new(schema());
    let p = project(&mut graph);
    graph.set(p, "GlobalId", "1abc").unwrap();
    let a = item(&mut graph, "Item", "A");
    graph.push(p, "Items", a).unwrap();
    graph.set(a, "Parent", p).unwrap();

    let (text, _) = roundtrip(&graph, XmlWriterOptions::default());
    assert!(text.contains("id=\"x1abc\""), "{text}");
    assert!(text.contains("href=\"x1abc\""), "{text}");

    let (text, read_back) = roundtrip(&graph, XmlWriterOptions::new().synthesized_ids());
    assert!(text.contains("id=\"i1\""), "{text}");
    assert!(graph.equivalent(&read_back));
}

#[test]
fn test_subtypes_use_inherited_key() {
    let mut graph = Graph::new(schema());
    let p = project(&mut graph);
    let a = item(&mut graph, "SpecialItem", "door");
    graph.push(p, "Items", a).unwrap();
    graph.set(p, "Lead", a).unwrap();

    let (text, read_back) = roundtrip(&graph, XmlWriterOptions::default());
    assert!(text.contains("id=\"door\""), "{text}");
    assert!(text.contains("href=\"door\""), "{text}");
    assert!(graph.equivalent(&read_back));
}

#[test]
fn test_header_roundtrip() {
    let mut graph = Graph::new(schema());
    project(&mut graph);
    let header = DocumentHeader::new("demo")
        .with_author("Ann")
        .with_organization("Example Org");

    let mut buffer = Vec::new();
    XmlWriter::with_options(&mut buffer, XmlWriterOptions::new().with_header(header.clone()))
        .write_graph(&graph)
        .unwrap();
    let document = XmlReader::new(buffer.as_slice())
        .read_document(schema())
        .unwrap();
    assert_eq!(document.header, Some(header));
    assert!(graph.equivalent(&document.graph));
}

fn chain(length: usize) -> Graph {
    let mut graph = Graph::new(schema());
    let p = project(&mut graph);
    let mut previous = item(&mut graph, "Item", "0");
    graph.push(p, "Items", previous).unwrap();
    for n in 1..length {
        let next = item(&mut graph, "Item", &n.to_string());
        graph.set(previous, "Next", next).unwrap();
        previous = next;
    }
    graph
}

#[test]
fn test_long_chain_roundtrip() {
    let graph = chain(300);
    let (text, read_back) = roundtrip(&graph, XmlWriterOptions::default());
    assert!(
        graph.equivalent(&read_back),
        "{:?}\n{text}",
        graph.difference(&read_back)
    );
    assert_eq!(read_back.len(), 301);
}

#[test]
fn test_deep_entities_moved_to_top_level() {
    let graph = chain(12);
    let (text, read_back) = roundtrip(
        &graph,
        XmlWriterOptions::new().with_max_depth(4).with_indent(None),
    );
    assert!(graph.equivalent(&read_back), "{:?}\n{text}", graph.difference(&read_back));
    // Items is depth 1, so the fifth link is the first one written as a reference.
    assert!(text.contains("<Next><Item xsi:nil=\"true\" href=\"x4\"/></Next>"), "{text}");
    assert!(text.contains("</Items><Item id=\"x4\" Name=\"4\">"), "{text}");
}

#[test]
fn test_depth_limit_on_read() {
    let mut graph = Graph::new(schema());
    let p = project(&mut graph);
    let mut previous = item(&mut graph, "Item", "0");
    graph.push(p, "Items", previous).unwrap();
    for n in 1..10 {
        let next = item(&mut graph, "Item", &n.to_string());
        graph.set(previous, "Next", next).unwrap();
        previous = next;
    }

    let mut buffer = Vec::new();
    XmlWriter::new(&mut buffer).write_graph(&graph).unwrap();
    let err = XmlReader::with_options(
        buffer.as_slice(),
        XmlReaderOptions::new().with_max_depth(5),
    )
    .read(schema())
    .unwrap_err();
    assert!(matches!(err, XmlError::DepthLimitExceeded { limit: 5, .. }));
}

#[derive(Debug, Clone)]
struct Shape {
    in_items: Vec<bool>,
    parented: Vec<bool>,
    next: Vec<Option<usize>>,
    related: Vec<Vec<usize>>,
}

fn shapes() -> impl Strategy<Value = Shape> {
    (1usize..10).prop_flat_map(|n| {
        (
            prop::collection::vec(any::<bool>(), n),
            prop::collection::vec(any::<bool>(), n),
            prop::collection::vec(prop::option::of(0..n), n),
            prop::collection::vec(prop::collection::vec(0..n, 0..4), n),
        )
            .prop_map(|(in_items, parented, next, related)| Shape {
                in_items,
                parented,
                next,
                related,
            })
    })
}

proptest! {
    #[test]
    fn arbitrary_graphs_survive_roundtrip(shape in shapes(), natural in any::<bool>()) {
        let mut graph = Graph::new(schema());
        let p = project(&mut graph);
        let items: Vec<EntityId> = (0..shape.in_items.len())
            .map(|n| item(&mut graph, if n % 3 == 0 { "SpecialItem" } else { "Item" }, &n.to_string()))
            .collect();
        for (n, &id) in items.iter().enumerate() {
            if shape.in_items[n] {
                graph.push(p, "Items", id).unwrap();
            }
            if shape.parented[n] {
                graph.set(id, "Parent", p).unwrap();
            }
            if let Some(target) = shape.next[n] {
                graph.set(id, "Next", items[target]).unwrap();
            }
            for &target in &shape.related[n] {
                graph.push(id, "Related", items[target]).unwrap();
            }
        }

        let options = if natural {
            XmlWriterOptions::default()
        } else {
            XmlWriterOptions::new().synthesized_ids().with_indent(None)
        };
        let (text, read_back) = roundtrip(&graph, options);
        prop_assert!(graph.equivalent(&read_back), "{:?}\n{}", graph.difference(&read_back), text);
    }
}
