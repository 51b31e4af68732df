//! Integration tests for the folder codec.
//!
//! These tests write graphs to temporary directories and read them back, covering
//! member folders, grouping of large collections, sibling leaf files and the
//! errors raised for malformed folder trees.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use docgraph_folder::{
    FolderError, FolderOptions, FolderReader, FolderWriter, read_folder, write_folder,
};
use docgraph_model::{
    ContentHint, EntityId, EntityType, FieldDescriptor, Graph, ScalarKind, Schema, Value,
};
use docgraph_xml::{XmlError, XmlReader, XmlWriter};

fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::builder()
            .entity(
                EntityType::new("Project")
                    .with_key_field("GlobalId")
                    .with_name_field("Name")
                    .field(FieldDescriptor::scalar("GlobalId", ScalarKind::String))
                    .field(FieldDescriptor::scalar("Name", ScalarKind::String))
                    .field(
                        FieldDescriptor::scalar("Notes", ScalarKind::String)
                            .with_content(ContentHint::LongText),
                    )
                    .field(
                        FieldDescriptor::scalar("Body", ScalarKind::String)
                            .with_content(ContentHint::Markup),
                    )
                    .field(
                        FieldDescriptor::scalar("Payload", ScalarKind::Binary)
                            .with_content(ContentHint::Blob),
                    )
                    .field(FieldDescriptor::entities("Items", "Item"))
                    .field(FieldDescriptor::entities("Members", "Member"))
                    .field(FieldDescriptor::entities("Assets", "Asset"))
                    .field(FieldDescriptor::entity("Main", "Asset"))
                    .field(FieldDescriptor::inverse("Children", "Item", "Parent")),
            )
            .entity(
                EntityType::new("Item")
                    .with_key_field("Tag")
                    .with_name_field("Name")
                    .field(FieldDescriptor::scalar("Tag", ScalarKind::String))
                    .field(FieldDescriptor::scalar("Name", ScalarKind::String))
                    .field(FieldDescriptor::entity("Parent", "Project"))
                    .field(FieldDescriptor::entity("Next", "Item"))
                    .field(FieldDescriptor::entities("Related", "Item")),
            )
            .entity(
                EntityType::new("Member")
                    .with_key_field("Id")
                    .field(FieldDescriptor::scalar("Id", ScalarKind::String)),
            )
            .entity(
                EntityType::new("Asset")
                    .abstract_type()
                    .with_key_field("Code")
                    .field(FieldDescriptor::scalar("Code", ScalarKind::String)),
            )
            .entity(
                EntityType::new("Pump")
                    .extends("Asset")
                    .field(FieldDescriptor::scalar("Flow", ScalarKind::Real))
                    .field(FieldDescriptor::entity("Spare", "Asset")),
            )
            .root("Project")
            .build()
            .unwrap(),
    )
}

fn project(graph: &mut Graph) -> EntityId {
    let project = graph.create("Project").unwrap();
    graph.set_root(project).unwrap();
    graph.set(project, "GlobalId", "P-1").unwrap();
    graph.set(project, "Name", "Demo").unwrap();
    project
}

fn item(graph: &mut Graph, tag: Option<&str>, name: &str) -> EntityId {
    let item = graph.create("Item").unwrap();
    if let Some(tag) = tag {
        graph.set(item, "Tag", tag).unwrap();
    }
    graph.set(item, "Name", name).unwrap();
    item
}

/// Project with items referring to each other across documents.
fn linked_graph() -> Graph {
    let mut graph = Graph::new(schema());
    let p = project(&mut graph);
    let door = item(&mut graph, Some("door"), "Door");
    let window = item(&mut graph, Some("window"), "Window");
    let wall = item(&mut graph, None, "Wall");
    let orphan = item(&mut graph, None, "Orphan");
    for member in [door, window] {
        graph.push(p, "Items", member).unwrap();
    }
    for child in [door, window, orphan] {
        graph.set(child, "Parent", p).unwrap();
    }
    graph.set(door, "Next", window).unwrap();
    graph.set(window, "Next", wall).unwrap();
    graph.push(door, "Related", wall).unwrap();
    graph.push(wall, "Related", door).unwrap();
    graph
}

fn members(count: usize) -> Graph {
    let mut graph = Graph::new(schema());
    let p = project(&mut graph);
    for n in 1..=count {
        let member = graph.create("Member").unwrap();
        graph.set(member, "Id", format!("m{n}")).unwrap();
        graph.push(p, "Members", member).unwrap();
    }
    graph
}

fn member_ids(graph: &Graph) -> Vec<String> {
    let root = graph.root().unwrap();
    graph
        .members(root, "Members")
        .iter()
        .map(|&m| graph.text(m, "Id").unwrap().to_string())
        .collect()
}

fn pump(graph: &mut Graph, code: &str) -> EntityId {
    let pump = graph.create("Pump").unwrap();
    graph.set(pump, "Code", code).unwrap();
    graph.set(pump, "Flow", 2.5).unwrap();
    pump
}

fn stream_roundtrip(graph: &Graph) -> Graph {
    let mut buffer = Vec::new();
    XmlWriter::new(&mut buffer).write_graph(graph).unwrap();
    XmlReader::new(buffer.as_slice())
        .read(Arc::clone(graph.schema()))
        .unwrap()
}

#[test]
fn test_folder_layout() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out");
    write_folder(&target, &linked_graph()).unwrap();

    assert!(target.join("P-1.xml").is_file());
    assert!(target.join("Items/door/door.xml").is_file());
    assert!(target.join("Items/window/window.xml").is_file());

    let root = fs::read_to_string(target.join("P-1.xml")).unwrap();
    assert!(root.contains("href=\"door\""), "{root}");
    assert!(root.contains("Name=\"Orphan\""), "{root}");
    let door = fs::read_to_string(target.join("Items/door/door.xml")).unwrap();
    assert!(door.contains("id=\"door\""), "{door}");
    assert!(door.contains("href=\"P-1\""), "{door}");
}

#[test]
fn test_folder_and_stream_agree() {
    let graph = linked_graph();
    let dir = tempfile::tempdir().unwrap();
    write_folder(dir.path(), &graph).unwrap();

    let from_folder = read_folder(dir.path(), schema()).unwrap();
    let from_stream = stream_roundtrip(&graph);
    assert!(
        from_folder.equivalent(&from_stream),
        "{:?}",
        from_folder.difference(&from_stream)
    );
    assert!(graph.equivalent(&from_folder), "{:?}", graph.difference(&from_folder));

    let root = from_folder.root().unwrap();
    assert_eq!(from_folder.members(root, "Children").len(), 3);
}

#[test]
fn test_large_collection_grouped_by_first_character() {
    let graph = members(600);
    let dir = tempfile::tempdir().unwrap();
    let options = FolderOptions::new().with_group_prefix("Member", "m");
    FolderWriter::with_options(options.clone())
        .write(dir.path(), &graph)
        .unwrap();

    assert!(dir.path().join("Members/1/m1/m1.xml").is_file());
    assert!(dir.path().join("Members/6/m600/m600.xml").is_file());
    assert_eq!(fs::read_dir(dir.path().join("Members")).unwrap().count(), 9);

    let read_back = FolderReader::with_options(options)
        .read(dir.path(), schema())
        .unwrap();
    let expected: Vec<String> = (1..=600).map(|n| format!("m{n}")).collect();
    assert_eq!(member_ids(&read_back), expected);
}

#[test]
fn test_grouping_does_not_change_graph() {
    let graph = members(600);
    let dir = tempfile::tempdir().unwrap();
    let flat = dir.path().join("flat");
    let grouped = dir.path().join("grouped");

    // every id starts with "m", so without a prefix there is a single group
    write_folder(&flat, &graph).unwrap();
    assert!(flat.join("Members/m1/m1.xml").is_file());
    FolderWriter::with_options(FolderOptions::new().with_group_prefix("Member", "m"))
        .write(&grouped, &graph)
        .unwrap();
    assert!(grouped.join("Members/2/m2/m2.xml").is_file());

    let flat = read_folder(&flat, schema()).unwrap();
    let grouped = read_folder(&grouped, schema()).unwrap();
    assert!(flat.equivalent(&grouped), "{:?}", flat.difference(&grouped));
    assert!(graph.equivalent(&grouped));
}

#[test]
fn test_leaf_fields_stored_as_files() {
    let mut graph = Graph::new(schema());
    let p = project(&mut graph);
    graph.set(p, "Notes", "  first line\nsecond line\n").unwrap();
    graph.set(p, "Body", "<p>Hello</p>").unwrap();
    graph.set(p, "Payload", vec![0_u8, 159, 146, 150]).unwrap();

    let dir = tempfile::tempdir().unwrap();
    write_folder(dir.path(), &graph).unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("Notes.txt")).unwrap(),
        "  first line\nsecond line\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("Body.html")).unwrap(),
        "<p>Hello</p>"
    );
    assert_eq!(
        fs::read(dir.path().join("Payload.bin")).unwrap(),
        [0_u8, 159, 146, 150]
    );
    let document = fs::read_to_string(dir.path().join("P-1.xml")).unwrap();
    assert!(!document.contains("Notes"), "{document}");
    assert!(!document.contains("Payload"), "{document}");

    let read_back = read_folder(dir.path(), schema()).unwrap();
    assert!(graph.equivalent(&read_back), "{:?}", graph.difference(&read_back));
}

#[test]
fn test_unlisted_member_folder_is_appended() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("demo.xml"), r#"<Project Name="Demo"/>"#).unwrap();
    let extra = dir.path().join("Items").join("extra");
    fs::create_dir_all(&extra).unwrap();
    fs::write(extra.join("extra.xml"), r#"<Item Name="Extra"/>"#).unwrap();
    let grouped = dir.path().join("Items").join("z").join("zed");
    fs::create_dir_all(&grouped).unwrap();
    fs::write(grouped.join("zed.xml"), r#"<Item Name="Zed"/>"#).unwrap();

    let graph = read_folder(dir.path(), schema()).unwrap();
    let root = graph.root().unwrap();
    let names: Vec<_> = graph
        .members(root, "Items")
        .iter()
        .map(|&m| graph.text(m, "Name").unwrap())
        .collect();
    assert_eq!(names, ["Extra", "Zed"]);
}

#[test]
fn test_collection_without_distinct_names_stays_inline() {
    let mut graph = Graph::new(schema());
    let p = project(&mut graph);
    for _ in 0..2 {
        let twin = item(&mut graph, None, "Twin");
        graph.push(p, "Items", twin).unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    write_folder(dir.path(), &graph).unwrap();
    assert!(!dir.path().join("Items").exists());

    let read_back = read_folder(dir.path(), schema()).unwrap();
    assert!(graph.equivalent(&read_back));
}

#[test]
fn test_reference_across_documents_must_resolve() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("demo.xml"),
        r#"<Project><Items><Item xsi:nil="true" href="ghost"/></Items></Project>"#,
    )
    .unwrap();

    let err = read_folder(dir.path(), schema()).unwrap_err();
    assert!(
        matches!(err, FolderError::Xml(XmlError::DanglingReference { ref id, .. }) if id == "ghost"),
        "{err}"
    );
}

#[test]
fn test_folder_errors() {
    let dir = tempfile::tempdir().unwrap();

    let missing = read_folder(&dir.path().join("missing"), schema()).unwrap_err();
    assert!(matches!(missing, FolderError::Filesystem { .. }), "{missing}");

    let file = dir.path().join("plain.txt");
    fs::write(&file, b"text").unwrap();
    assert!(matches!(
        read_folder(&file, schema()),
        Err(FolderError::NotADirectory { .. })
    ));

    let empty = dir.path().join("empty");
    fs::create_dir(&empty).unwrap();
    assert!(matches!(
        read_folder(&empty, schema()),
        Err(FolderError::MissingDocument { .. })
    ));

    let two = dir.path().join("two");
    fs::create_dir(&two).unwrap();
    fs::write(two.join("a.xml"), r#"<Project/>"#).unwrap();
    fs::write(two.join("b.xml"), r#"<Project/>"#).unwrap();
    assert!(matches!(
        read_folder(&two, schema()),
        Err(FolderError::MultipleDocuments { count: 2, .. })
    ));

    assert!(matches!(
        write_folder(&two, &linked_graph()),
        Err(FolderError::InvalidTarget { .. })
    ));
    assert!(matches!(
        write_folder(&dir.path().join("none"), &Graph::new(schema())),
        Err(FolderError::Xml(XmlError::NoRoot))
    ));
}

#[test]
fn test_mismatched_leaf_file_skipped() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("demo.xml"), r#"<Project Name="Demo"/>"#).unwrap();
    fs::write(dir.path().join("Payload.txt"), "not binary").unwrap();
    fs::write(dir.path().join("Unknown.txt"), "ignored").unwrap();

    let graph = read_folder(dir.path(), schema()).unwrap();
    let root = graph.root().unwrap();
    assert_eq!(graph.value(root, "Payload"), None);
    assert_eq!(graph.value(root, "Name"), Some(&Value::from("Demo")));
}

#[test]
fn test_written_folder_readable_twice() {
    let graph = linked_graph();
    let dir = tempfile::tempdir().unwrap();
    write_folder(dir.path(), &graph).unwrap();
    let first = read_folder(dir.path(), schema()).unwrap();
    let second = read_folder(Path::new(dir.path()), schema()).unwrap();
    assert!(first.equivalent(&second));
}

#[test]
fn test_subtype_members_named_by_inherited_key() {
    let mut graph = Graph::new(schema());
    let p = project(&mut graph);
    for code in ["p1", "p2"] {
        let member = pump(&mut graph, code);
        graph.push(p, "Assets", member).unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    write_folder(dir.path(), &graph).unwrap();
    assert!(dir.path().join("Assets/p1/p1.xml").is_file());
    assert!(dir.path().join("Assets/p2/p2.xml").is_file());

    let read_back = read_folder(dir.path(), schema()).unwrap();
    assert!(graph.equivalent(&read_back), "{:?}", graph.difference(&read_back));
}

#[test]
fn test_single_references_get_field_folders() {
    let mut graph = Graph::new(schema());
    let p = project(&mut graph);
    let listed = pump(&mut graph, "p1");
    graph.push(p, "Assets", listed).unwrap();
    let main = pump(&mut graph, "main");
    graph.set(p, "Main", main).unwrap();
    let spare = pump(&mut graph, "spare");
    graph.set(listed, "Spare", spare).unwrap();
    graph.set(main, "Spare", spare).unwrap();

    let dir = tempfile::tempdir().unwrap();
    write_folder(dir.path(), &graph).unwrap();
    assert!(dir.path().join("Main/main.xml").is_file());
    assert!(dir.path().join("Assets/p1/Spare/spare.xml").is_file());
    assert!(!dir.path().join("Main/Spare").exists());
    let root = fs::read_to_string(dir.path().join("P-1.xml")).unwrap();
    assert!(root.contains("href=\"main\""), "{root}");

    let read_back = read_folder(dir.path(), schema()).unwrap();
    assert!(graph.equivalent(&read_back), "{:?}", graph.difference(&read_back));
    let from_stream = stream_roundtrip(&graph);
    assert!(read_back.equivalent(&from_stream));
}

#[test]
fn test_unreferenced_field_folder_is_assigned() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("demo.xml"), r#"<Project Name="Demo"/>"#).unwrap();
    let main = dir.path().join("Main");
    fs::create_dir_all(&main).unwrap();
    fs::write(main.join("x.xml"), r#"<Pump Code="x"/>"#).unwrap();

    let graph = read_folder(dir.path(), schema()).unwrap();
    let root = graph.root().unwrap();
    let main = graph.reference(root, "Main").unwrap();
    assert_eq!(graph.type_name(main), "Pump");
    assert_eq!(graph.text(main, "Code"), Some("x"));
}
