//! Inverse synchronization tests.
//!
//! Every assignment sequence must leave each inverse collection listing exactly the
//! entities whose direct field currently points at its owner.

use std::sync::Arc;

use docgraph_model::{EntityId, EntityType, FieldDescriptor, Graph, ScalarKind, Schema};
use proptest::prelude::*;

fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::builder()
            .entity(
                EntityType::new("Project")
                    .field(FieldDescriptor::scalar("Name", ScalarKind::String))
                    .field(FieldDescriptor::inverse("Children", "Item", "Parent"))
                    .field(FieldDescriptor::inverse("Tagged", "Item", "Tags")),
            )
            .entity(
                EntityType::new("Item")
                    .field(FieldDescriptor::entity("Parent", "Project"))
                    .field(FieldDescriptor::entities("Tags", "Project")),
            )
            .root("Project")
            .build()
            .unwrap(),
    )
}

#[derive(Debug, Clone)]
enum Op {
    SetParent(usize, usize),
    ClearParent(usize),
    Tag(usize, usize),
    Untag(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..4usize, 0..3usize).prop_map(|(i, p)| Op::SetParent(i, p)),
        (0..4usize).prop_map(Op::ClearParent),
        (0..4usize, 0..3usize).prop_map(|(i, p)| Op::Tag(i, p)),
        (0..4usize, 0..3usize).prop_map(|(i, p)| Op::Untag(i, p)),
    ]
}

fn check_consistent(graph: &Graph, projects: &[EntityId], items: &[EntityId]) {
    for &project in projects {
        for &item in items {
            let points = graph.reference(item, "Parent") == Some(project);
            let listed = graph.members(project, "Children").contains(&item);
            assert_eq!(points, listed, "Children of {project} vs Parent of {item}");

            let tags = graph.members(item, "Tags").contains(&project);
            let tagged = graph.members(project, "Tagged");
            assert_eq!(tags, tagged.contains(&item), "Tagged of {project}");
            assert!(tagged.iter().filter(|&&m| m == item).count() <= 1);
        }
    }
}

proptest! {
    #[test]
    fn inverse_tracks_direct_fields(ops in prop::collection::vec(op(), 0..40)) {
        let mut graph = Graph::new(schema());
        let projects: Vec<_> = (0..3).map(|_| graph.create("Project").unwrap()).collect();
        let items: Vec<_> = (0..4).map(|_| graph.create("Item").unwrap()).collect();

        for op in ops {
            match op {
                Op::SetParent(i, p) => graph.set(items[i], "Parent", projects[p]).unwrap(),
                Op::ClearParent(i) => graph.clear(items[i], "Parent").unwrap(),
                Op::Tag(i, p) => graph.push(items[i], "Tags", projects[p]).unwrap(),
                Op::Untag(i, p) => {
                    graph.remove_member(items[i], "Tags", projects[p]).unwrap();
                }
            }
            check_consistent(&graph, &projects, &items);
        }
    }
}

#[test]
fn test_duplicate_tag_keeps_single_backlink() {
    let mut graph = Graph::new(schema());
    let project = graph.create("Project").unwrap();
    let item = graph.create("Item").unwrap();

    graph.push(item, "Tags", project).unwrap();
    graph.push(item, "Tags", project).unwrap();
    assert_eq!(graph.members(project, "Tagged"), &[item]);

    // One occurrence remains, so the backlink stays.
    graph.remove_member(item, "Tags", project).unwrap();
    assert_eq!(graph.members(project, "Tagged"), &[item]);

    graph.remove_member(item, "Tags", project).unwrap();
    assert!(graph.members(project, "Tagged").is_empty());
}

#[test]
fn test_replacing_collection_relinks() {
    let mut graph = Graph::new(schema());
    let p1 = graph.create("Project").unwrap();
    let p2 = graph.create("Project").unwrap();
    let item = graph.create("Item").unwrap();

    graph.set(item, "Tags", vec![p1, p2]).unwrap();
    graph.set(item, "Tags", vec![p2]).unwrap();
    assert!(graph.members(p1, "Tagged").is_empty());
    assert_eq!(graph.members(p2, "Tagged"), &[item]);
}
