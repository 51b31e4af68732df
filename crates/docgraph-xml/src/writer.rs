//! Graph document writer.
//!
//! Writing is two passes over the same traversal. The discovery pass renders into
//! [`std::io::sink`] and only records which entities are met more than once; the write
//! pass renders for real, giving an `id` to exactly those entities and writing every
//! later sighting as a reference.

use std::collections::{HashSet, VecDeque};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use docgraph_model::{
    EntityId, FieldDescriptor, FieldKind, Graph, Placement, Scalar, Schema, TypeKey, Value,
};

use crate::error::{Result, XmlError};
use crate::identity::IdentityStore;
use crate::options::XmlWriterOptions;
use crate::value_codec::{encode_enum, encode_list, encode_matrix, encode_scalar, wrapper_tag};

/// Namespace of the `xsi:` attributes.
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Graph document writer.
pub struct XmlWriter<W: Write> {
    writer: BufWriter<W>,
    options: XmlWriterOptions,
}

impl<W: Write> XmlWriter<W> {
    /// Create a new writer with default options.
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, XmlWriterOptions::default())
    }

    /// Create a new writer with options.
    pub fn with_options(writer: W, options: XmlWriterOptions) -> Self {
        Self {
            writer: BufWriter::new(writer),
            options,
        }
    }

    /// Write the graph starting at its root.
    pub fn write_graph(self, graph: &Graph) -> Result<()> {
        let root = graph.root().ok_or(XmlError::NoRoot)?;
        self.write_entity(graph, root)
    }

    /// Write the part of the graph reachable from `root`.
    pub fn write_entity(mut self, graph: &Graph, root: EntityId) -> Result<()> {
        let mut session = WriteSession::new(graph, self.options.clone());
        session.begin_discovery();
        session.write_document(io::sink(), root)?;
        session.begin_write();
        session.write_document(&mut self.writer, root)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl XmlWriter<File> {
    /// Create a document file for writing.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(file))
    }

    /// Create a document file with options.
    pub fn create_with_options(path: &Path, options: XmlWriterOptions) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::with_options(file, options))
    }
}

/// Write a graph to a document file.
pub fn write_xml(path: &Path, graph: &Graph) -> Result<()> {
    XmlWriter::create(path)?.write_graph(graph)
}

/// Write a graph to a document file with options.
pub fn write_xml_with_options(path: &Path, graph: &Graph, options: &XmlWriterOptions) -> Result<()> {
    XmlWriter::create_with_options(path, options.clone())?.write_graph(graph)
}

/// State shared by the documents of one write.
///
/// A single-document write runs one discovery and one write pass. The folder codec runs
/// discovery over all of its documents before writing any of them, so that references
/// between documents get identifiers.
pub struct WriteSession<'g> {
    graph: &'g Graph,
    options: XmlWriterOptions,
    store: IdentityStore,
    anchors: Vec<EntityId>,
    skipped: HashSet<(EntityId, usize)>,
    queue: VecDeque<EntityId>,
    document_type: Option<TypeKey>,
    discovery: bool,
}

impl<'g> WriteSession<'g> {
    pub fn new(graph: &'g Graph, options: XmlWriterOptions) -> Self {
        let store = IdentityStore::new(options.prefer_natural_keys);
        Self {
            graph,
            options,
            store,
            anchors: Vec::new(),
            skipped: HashSet::new(),
            queue: VecDeque::new(),
            document_type: None,
            discovery: true,
        }
    }

    /// Declare an entity that is written as the root of its own document.
    ///
    /// Everywhere else it only appears as a reference.
    pub fn pin(&mut self, entity: EntityId) -> String {
        self.anchors.push(entity);
        self.store
            .mark_encountered(entity, self.graph.natural_key(entity))
    }

    /// Leave a field out of the documents; its content is stored elsewhere.
    pub fn skip_field(&mut self, entity: EntityId, slot: usize) {
        self.skipped.insert((entity, slot));
    }

    pub fn begin_discovery(&mut self) {
        self.discovery = true;
    }

    /// Switch to the write pass.
    pub fn begin_write(&mut self) {
        self.store.clear_encountered();
        for &anchor in &self.anchors {
            self.store
                .mark_encountered(anchor, self.graph.natural_key(anchor));
        }
        self.discovery = false;
    }

    pub fn store(&self) -> &IdentityStore {
        &self.store
    }

    /// Render one document with `root` as its root element.
    pub fn write_document<O: Write>(&mut self, out: O, root: EntityId) -> Result<()> {
        let mut xml = match self.options.indent {
            Some(width) => Writer::new_with_indent(out, b' ', width),
            None => Writer::new(out),
        };
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut start = BytesStart::new(self.graph.type_name(root));
        start.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
        if let Some(namespace) = &self.options.namespace {
            start.push_attribute(("xmlns", namespace.as_str()));
        }
        if let Some(location) = &self.options.schema_location {
            start.push_attribute(("xsi:schemaLocation", location.as_str()));
        }
        self.queue.clear();
        self.document_type = Some(self.graph.type_of(root));
        self.emit_body(&mut xml, root, start, 0, true)?;
        xml.into_inner().flush()?;
        Ok(())
    }

    /// Element for an entity in field content: its content on first sighting, a
    /// reference afterwards.
    ///
    /// `tag` names the element when it is not the concrete type name, together with the
    /// type the element name implies; a different concrete type is given by `xsi:type`.
    fn emit_entity<O: Write>(
        &mut self,
        xml: &mut Writer<O>,
        entity: EntityId,
        tag: Option<(&str, TypeKey)>,
        depth: usize,
    ) -> Result<()> {
        let graph = self.graph;
        let type_name = graph.type_name(entity);
        let start = match tag {
            Some((name, implied)) => {
                let mut start = BytesStart::new(name);
                if graph.type_of(entity) != implied {
                    start.push_attribute(("xsi:type", type_name));
                }
                start
            }
            None => BytesStart::new(type_name),
        };

        if self.store.is_encountered(entity) {
            let key = graph.natural_key(entity);
            let id = self
                .store
                .identify_for_reference(entity, self.discovery, key)
                .unwrap_or_else(|| self.store.mark_encountered(entity, key));
            return write_reference(xml, start, &id);
        }
        if depth > self.options.max_depth {
            let key = graph.natural_key(entity);
            if let Some(id) = self.store.identify_for_reference(entity, self.discovery, key) {
                return self.defer(xml, entity, start, &id);
            }
        }
        self.emit_body(xml, entity, start, depth, false)
    }

    /// Write a reference in place of a too deeply nested entity and queue its content
    /// for the top level of the document.
    fn defer<O: Write>(
        &mut self,
        xml: &mut Writer<O>,
        entity: EntityId,
        start: BytesStart<'_>,
        id: &str,
    ) -> Result<()> {
        let graph = self.graph;
        let type_name = graph.type_name(entity);
        // A top-level element named like a field of the root would be read as that field.
        let shadowed = self.document_type.is_some_and(|root| {
            let ty = graph.schema().entity_type(root);
            ty.find_field(type_name)
                .and_then(|slot| ty.field_at(slot))
                .is_some_and(|field| !field.kind.is_inverse())
        });
        if shadowed {
            return Err(XmlError::DepthLimitExceeded {
                limit: self.options.max_depth,
                type_name: type_name.to_string(),
            });
        }
        tracing::trace!(type_name, id, "moving nested entity to the top level");
        self.queue.push_back(entity);
        write_reference(xml, start, id)
    }

    fn emit_body<O: Write>(
        &mut self,
        xml: &mut Writer<O>,
        entity: EntityId,
        mut start: BytesStart<'_>,
        depth: usize,
        document_root: bool,
    ) -> Result<()> {
        let graph = self.graph;
        if !self.discovery {
            if let Some(id) =
                self.store
                    .identify_for_reference(entity, false, graph.natural_key(entity))
            {
                start.push_attribute(("id", id.as_str()));
            }
        }
        self.store.mark_seen(entity);

        let schema: &'g Schema = graph.schema();
        let fields = schema.entity_type(graph.type_of(entity)).fields();
        for (slot, field) in fields.iter().enumerate() {
            if self.skipped.contains(&(entity, slot)) {
                continue;
            }
            if let Some(text) = graph
                .value_at(entity, slot)
                .and_then(|value| attribute_text(field, value))
            {
                start.push_attribute((field.wire_name.as_str(), text.as_str()));
            }
            if field.kind.is_inverse() && field.placement == Placement::Hidden {
                self.queue.extend(graph.members_at(entity, slot));
            }
        }

        let has_elements = fields
            .iter()
            .enumerate()
            .any(|(slot, field)| self.element_value(entity, slot, field).is_some());
        if !document_root && !has_elements {
            xml.write_event(Event::Empty(start))?;
            return Ok(());
        }

        let end = start.to_end().into_owned();
        xml.write_event(Event::Start(start))?;
        if document_root {
            if let Some(header) = &self.options.header {
                header.write_to(xml)?;
            }
        }
        for (slot, field) in fields.iter().enumerate() {
            if let Some(value) = self.element_value(entity, slot, field) {
                self.emit_field(xml, field, value, depth)?;
            }
        }
        if document_root {
            while let Some(next) = self.queue.pop_front() {
                if !self.store.is_encountered(next) {
                    self.emit_entity(xml, next, None, 1)?;
                }
            }
        }
        xml.write_event(Event::End(end))?;
        Ok(())
    }

    /// The value of a field written as a child element, if it produces one.
    fn element_value(&self, entity: EntityId, slot: usize, field: &FieldDescriptor) -> Option<&'g Value> {
        if self.skipped.contains(&(entity, slot)) {
            return None;
        }
        let writes_element = match (&field.kind, field.placement) {
            (_, Placement::Hidden) => false,
            (FieldKind::Entity(_), _) => true,
            (_, Placement::Attribute) => false,
            (_, Placement::Element) => true,
        };
        if !writes_element {
            return None;
        }
        let value = self.graph.value_at(entity, slot)?;
        if value.is_empty_collection() {
            let unwrapped = field.kind.is_entity() && unwrapped_type(self.graph.schema(), field).is_some();
            return (field.required && !unwrapped).then_some(value);
        }
        Some(value)
    }

    fn emit_field<O: Write>(
        &mut self,
        xml: &mut Writer<O>,
        field: &FieldDescriptor,
        value: &'g Value,
        depth: usize,
    ) -> Result<()> {
        let wire = field.wire_name.as_str();
        match (&field.kind, value) {
            (FieldKind::Entity(_), Value::Entity(target)) => {
                match (field.placement, field.target()) {
                    (Placement::Attribute, Some(declared)) => {
                        self.emit_entity(xml, *target, Some((wire, declared)), depth + 1)
                    }
                    _ => self.emit_members(xml, field, std::slice::from_ref(target), depth),
                }
            }
            (_, Value::Entities(members)) => self.emit_members(xml, field, members, depth),
            (FieldKind::ScalarList(item), Value::List(items)) => {
                write_wrapped_items(xml, wire, &item.name, items)
            }
            (FieldKind::ScalarMatrix { item, .. }, Value::Matrix(rows)) => {
                let items: Vec<Scalar> = rows.iter().flatten().cloned().collect();
                write_wrapped_items(xml, wire, &item.name, &items)
            }
            (_, Value::Selected { type_name, value }) => {
                xml.write_event(Event::Start(BytesStart::new(wire)))?;
                write_text_element(xml, &wrapper_tag(type_name), &encode_scalar(value))?;
                xml.write_event(Event::End(BytesEnd::new(wire)))?;
                Ok(())
            }
            (_, other) => match scalar_text(other) {
                Some(text) => write_text_element(xml, wire, &text),
                None => Ok(()),
            },
        }
    }

    fn emit_members<O: Write>(
        &mut self,
        xml: &mut Writer<O>,
        field: &FieldDescriptor,
        members: &[EntityId],
        depth: usize,
    ) -> Result<()> {
        let wire = field.wire_name.as_str();
        if let Some(implied) = unwrapped_type(self.graph.schema(), field) {
            for &member in members {
                self.emit_entity(xml, member, Some((wire, implied)), depth + 1)?;
            }
            return Ok(());
        }
        if members.is_empty() {
            xml.write_event(Event::Empty(BytesStart::new(wire)))?;
            return Ok(());
        }
        xml.write_event(Event::Start(BytesStart::new(wire)))?;
        for &member in members {
            self.emit_entity(xml, member, None, depth + 1)?;
        }
        xml.write_event(Event::End(BytesEnd::new(wire)))?;
        Ok(())
    }
}

/// The type named by a field's wire name, when entities can be written under it
/// without a wrapper element.
pub(crate) fn unwrapped_type(schema: &Schema, field: &FieldDescriptor) -> Option<TypeKey> {
    let target = field.target()?;
    schema
        .type_key(&field.wire_name)
        .filter(|&named| schema.is_subtype(named, target))
}

fn write_reference<O: Write>(xml: &mut Writer<O>, mut start: BytesStart<'_>, id: &str) -> Result<()> {
    start.push_attribute(("xsi:nil", "true"));
    start.push_attribute(("href", id));
    xml.write_event(Event::Empty(start))?;
    Ok(())
}

fn attribute_text(field: &FieldDescriptor, value: &Value) -> Option<String> {
    if field.placement != Placement::Attribute || field.kind.is_entity() {
        return None;
    }
    if value.is_empty_collection() && !field.required {
        return None;
    }
    scalar_text(value)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Scalar(scalar) => Some(encode_scalar(scalar)),
        Value::Enum(symbol) => Some(encode_enum(symbol)),
        Value::List(items) => Some(encode_list(items)),
        Value::Matrix(rows) => Some(encode_matrix(rows)),
        _ => None,
    }
}

/// Element form of a list or flattened matrix, one wrapper per item.
fn write_wrapped_items<O: Write>(
    xml: &mut Writer<O>,
    wire: &str,
    type_name: &str,
    items: &[Scalar],
) -> Result<()> {
    if items.is_empty() {
        xml.write_event(Event::Empty(BytesStart::new(wire)))?;
        return Ok(());
    }
    let item_tag = wrapper_tag(type_name);
    xml.write_event(Event::Start(BytesStart::new(wire)))?;
    for item in items {
        write_text_element(xml, &item_tag, &encode_scalar(item))?;
    }
    xml.write_event(Event::End(BytesEnd::new(wire)))?;
    Ok(())
}

fn write_text_element<O: Write>(xml: &mut Writer<O>, tag: &str, text: &str) -> Result<()> {
    xml.write_event(Event::Start(BytesStart::new(tag)))?;
    xml.write_event(Event::Text(BytesText::new(text)))?;
    xml.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
