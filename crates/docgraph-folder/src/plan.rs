//! Layout of a graph on disk.
//!
//! The plan walks the graph breadth-first from the root and decides which entities get
//! their own folder and document (anchors), which collections are spread over member
//! folders, which single references get a folder named after the field, and which
//! fields go to sibling files.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use docgraph_model::{
    ContentHint, EntityId, FieldDescriptor, FieldKind, Graph, Placement, Scalar, Value,
};

use crate::naming::{document_stem, group_name, leaf_extension, member_names, sanitize};
use crate::options::FolderOptions;

/// Documents to write, in breadth-first order from the root.
#[derive(Debug)]
pub(crate) struct Plan<'g> {
    pub documents: Vec<DocumentPlan<'g>>,
}

/// One anchor: its folder, document stem and externalized fields.
#[derive(Debug)]
pub(crate) struct DocumentPlan<'g> {
    pub entity: EntityId,
    /// Folder relative to the target directory.
    pub dir: PathBuf,
    pub stem: String,
    pub leaves: Vec<Leaf<'g>>,
}

impl DocumentPlan<'_> {
    pub fn file_name(&self) -> String {
        format!("{}.xml", self.stem)
    }
}

/// Field content stored in a sibling file.
#[derive(Debug)]
pub(crate) struct Leaf<'g> {
    pub slot: usize,
    pub file_name: String,
    pub contents: &'g [u8],
}

pub(crate) fn plan<'g>(graph: &'g Graph, root: EntityId, options: &FolderOptions) -> Plan<'g> {
    let mut anchors = HashSet::from([root]);
    let mut queue = VecDeque::from([(root, PathBuf::new(), document_stem(graph, root))]);
    let mut documents = Vec::new();

    while let Some((entity, dir, stem)) = queue.pop_front() {
        let entity_type = graph.schema().entity_type(graph.type_of(entity));
        let mut leaves = Vec::new();

        for (slot, field) in entity_type.fields().iter().enumerate() {
            if let Some(leaf) = leaf(graph, entity, slot, field) {
                leaves.push(leaf);
                continue;
            }
            let target = match (&field.kind, graph.value_at(entity, slot)) {
                (FieldKind::Entity(_), Some(Value::Entity(target))) => {
                    if field.placement != Placement::Hidden && anchors.insert(*target) {
                        let field_dir = dir.join(sanitize(&field.wire_name));
                        queue.push_back((*target, field_dir, document_stem(graph, *target)));
                    }
                    continue;
                }
                (FieldKind::EntityList(target), _) => target,
                _ => continue,
            };
            let members = graph.members_at(entity, slot);
            if members.is_empty() || members.iter().any(|m| anchors.contains(m)) {
                continue;
            }
            let Some(names) = member_names(graph, members) else {
                tracing::debug!(
                    field = %field.name,
                    members = members.len(),
                    "collection stays inline, members lack distinct names"
                );
                continue;
            };

            let field_dir = dir.join(sanitize(&field.wire_name));
            let groups = (members.len() > options.group_threshold)
                .then(|| {
                    members
                        .iter()
                        .zip(&names)
                        .map(|(&member, name)| {
                            let prefix = options
                                .group_prefixes
                                .get(graph.type_name(member))
                                .or_else(|| options.group_prefixes.get(target.as_str()));
                            group_name(name, prefix.map(String::as_str))
                        })
                        .collect::<Vec<_>>()
                })
                .filter(|groups| groups.iter().collect::<HashSet<_>>().len() > 2);

            for (index, (&member, name)) in members.iter().zip(&names).enumerate() {
                anchors.insert(member);
                let stem = sanitize(name);
                let member_dir = match &groups {
                    Some(groups) => field_dir.join(&groups[index]).join(&stem),
                    None => field_dir.join(&stem),
                };
                queue.push_back((member, member_dir, stem));
            }
        }

        documents.push(DocumentPlan {
            entity,
            dir,
            stem,
            leaves,
        });
    }

    Plan { documents }
}

fn leaf<'g>(graph: &'g Graph, entity: EntityId, slot: usize, field: &FieldDescriptor) -> Option<Leaf<'g>> {
    let extension = leaf_extension(field.content)?;
    let contents = match (field.content, graph.value_at(entity, slot)?) {
        (ContentHint::Blob, Value::Scalar(Scalar::Binary(bytes))) => bytes.as_slice(),
        (ContentHint::LongText | ContentHint::Markup, Value::Scalar(Scalar::String(text))) => {
            text.as_bytes()
        }
        _ => return None,
    };
    Some(Leaf {
        slot,
        file_name: format!("{}.{extension}", sanitize(&field.wire_name)),
        contents,
    })
}
