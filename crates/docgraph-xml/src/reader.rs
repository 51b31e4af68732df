//! Graph document reader.
//!
//! Documents are read in a single streaming pass. Entities are allocated as their
//! elements open; a reference to an identifier that has not been declared yet is parked
//! in the [`ForwardReferenceQueue`] and applied when the declaration arrives.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};

use docgraph_model::{
    DefinedType, EntityId, FieldDescriptor, FieldKind, Graph, ModelError, Placement, Scalar,
    ScalarKind, Schema, TypeKey, Value,
};

use crate::error::{Result, XmlError};
use crate::header::{DocumentHeader, HEADER_TAG};
use crate::options::XmlReaderOptions;
use crate::pending::{ForwardReferenceQueue, apply_assignment};
use crate::value_codec::{
    chunk_rows, decode_enum, decode_list, decode_matrix, decode_scalar, strip_wrapper,
};
use crate::writer::unwrapped_type;

/// Graph document reader.
pub struct XmlReader<R: Read> {
    reader: BufReader<R>,
    options: XmlReaderOptions,
}

impl<R: Read> XmlReader<R> {
    /// Create a new reader with default options.
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, XmlReaderOptions::default())
    }

    /// Create a new reader with options.
    pub fn with_options(reader: R, options: XmlReaderOptions) -> Self {
        Self {
            reader: BufReader::new(reader),
            options,
        }
    }

    /// Read the document into a new graph.
    pub fn read(self, schema: Arc<Schema>) -> Result<Graph> {
        Ok(self.read_document(schema)?.graph)
    }

    /// Read the document, also returning the identifier of every declared entity.
    pub fn read_with_ids(self, schema: Arc<Schema>) -> Result<(Graph, HashMap<String, EntityId>)> {
        let document = self.read_document(schema)?;
        Ok((document.graph, document.ids))
    }

    /// Read the document with its header.
    pub fn read_document(self, schema: Arc<Schema>) -> Result<XmlDocument> {
        let mut session = ReadSession::new(schema, self.options);
        session.read_document(self.reader)?;
        session.finish()
    }
}

impl XmlReader<File> {
    /// Open a document file for reading.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(open_file(path)?))
    }

    /// Open a document file with options.
    pub fn open_with_options(path: &Path, options: XmlReaderOptions) -> Result<Self> {
        Ok(Self::with_options(open_file(path)?, options))
    }
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            XmlError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            XmlError::Io(e)
        }
    })
}

/// Read a graph from a document file.
pub fn read_xml(path: &Path, schema: Arc<Schema>) -> Result<Graph> {
    XmlReader::open(path)?.read(schema)
}

/// Read a graph from a document file with options.
pub fn read_xml_with_options(
    path: &Path,
    schema: Arc<Schema>,
    options: XmlReaderOptions,
) -> Result<Graph> {
    XmlReader::open_with_options(path, options)?.read(schema)
}

/// A fully read document.
#[derive(Debug)]
pub struct XmlDocument {
    pub graph: Graph,
    /// Declared identifiers and the entities they name.
    pub ids: HashMap<String, EntityId>,
    pub header: Option<DocumentHeader>,
}

/// Reading state that spans documents.
///
/// Identifiers and pending references are shared, so a reference in one document can
/// be satisfied by a declaration in another one read later through the same session.
#[derive(Debug)]
pub struct ReadSession {
    graph: Graph,
    ids: HashMap<String, EntityId>,
    queue: ForwardReferenceQueue,
    options: XmlReaderOptions,
    header: Option<DocumentHeader>,
}

impl ReadSession {
    pub fn new(schema: Arc<Schema>, options: XmlReaderOptions) -> Self {
        Self {
            graph: Graph::new(schema),
            ids: HashMap::new(),
            queue: ForwardReferenceQueue::new(),
            options,
            header: None,
        }
    }

    /// Read one document; returns the entity of its root element.
    pub fn read_document<R: BufRead>(&mut self, source: R) -> Result<EntityId> {
        let schema = Arc::clone(self.graph.schema());
        let mut parser = DocumentParser {
            session: self,
            schema,
            reader: Reader::from_reader(source),
            buf: Vec::new(),
        };
        parser.parse_document()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Entity declared with this identifier so far.
    pub fn lookup(&self, id: &str) -> Option<EntityId> {
        self.ids.get(id).copied()
    }

    pub fn header(&self) -> Option<&DocumentHeader> {
        self.header.as_ref()
    }

    /// Number of identifiers still awaited.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Append `member` to a collection of `owner` as the next member in reading order.
    pub fn attach(&mut self, owner: EntityId, slot: usize, member: EntityId) -> Result<()> {
        self.assign(owner, slot, Parsed::Entity(member))
    }

    /// Check that every reference resolved and hand out the graph.
    pub fn finish(mut self) -> Result<XmlDocument> {
        if !self.queue.is_empty() {
            if self.options.allow_dangling {
                for (id, waiting) in self.queue.unresolved() {
                    tracing::warn!(id, count = waiting.len(), "dropping unresolved reference");
                }
                self.queue.clear();
            } else {
                let count = self.queue.len();
                if let Some((id, waiting)) = self.queue.unresolved().next() {
                    let field = waiting
                        .first()
                        .map(|a| {
                            let field = self
                                .graph
                                .field(a.target, a.slot)
                                .map_or("?", |f| f.name.as_str());
                            format!("{}.{field}", self.graph.type_name(a.target))
                        })
                        .unwrap_or_default();
                    return Err(XmlError::DanglingReference {
                        id: id.to_string(),
                        field,
                        count,
                    });
                }
            }
        }
        if self.graph.root().is_none() {
            let schema = self.graph.schema();
            return Err(XmlError::MissingRoot {
                expected: schema.type_name(schema.root_type()).to_string(),
            });
        }
        tracing::debug!(
            entities = self.graph.len(),
            ids = self.ids.len(),
            "finished reading graph"
        );
        Ok(XmlDocument {
            graph: self.graph,
            ids: self.ids,
            header: self.header,
        })
    }

    fn register(&mut self, id: String, entity: EntityId, position: u64) -> Result<()> {
        if self.ids.contains_key(&id) {
            return Err(XmlError::DuplicateId { id, position });
        }
        let strict = self.options.strict;
        self.queue
            .resolve(&id, entity, &mut self.graph, |err| tolerate(err, strict))?;
        self.ids.insert(id, entity);
        Ok(())
    }

    fn assign(&mut self, owner: EntityId, slot: usize, parsed: Parsed) -> Result<()> {
        let is_list = self
            .graph
            .field(owner, slot)
            .is_some_and(|f| matches!(f.kind, FieldKind::EntityList(_)));
        let token = is_list.then(|| self.queue.reserve(owner, slot));
        match parsed {
            Parsed::Pending(id) => self.queue.enqueue(&id, owner, slot, token),
            Parsed::Entity(member) => {
                let position = token.map(|t| self.queue.position(owner, slot, t));
                if let Err(err) = apply_assignment(&mut self.graph, owner, slot, member, position) {
                    if let Some(t) = token {
                        self.queue.leave_gap(owner, slot, t);
                    }
                    tolerate(err, self.options.strict)?;
                }
            }
        }
        Ok(())
    }

    fn set_value(&mut self, entity: EntityId, slot: usize, value: Value) -> Result<()> {
        if let Err(err) = self.graph.set_at(entity, slot, value) {
            tolerate(err, self.options.strict)?;
        }
        Ok(())
    }
}

/// Skip schema mismatches with a warning unless reading strictly.
fn tolerate(err: ModelError, strict: bool) -> std::result::Result<(), ModelError> {
    if err.is_mismatch() && !strict {
        tracing::warn!(error = %err, "skipping value the schema does not accept");
        Ok(())
    } else {
        Err(err)
    }
}

/// Outcome of an entity element.
enum Parsed {
    Entity(EntityId),
    /// A reference to an identifier not declared yet.
    Pending(String),
}

enum Token {
    Open(BytesStart<'static>, bool),
    Text(String),
    Close,
    Eof,
}

struct DocumentParser<'s, R> {
    session: &'s mut ReadSession,
    schema: Arc<Schema>,
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> DocumentParser<'_, R> {
    fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn next_token(&mut self) -> Result<Token> {
        loop {
            self.buf.clear();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .map_err(XmlError::xml)?;
            let token = match event {
                Event::Start(e) => Token::Open(e.into_owned(), false),
                Event::Empty(e) => Token::Open(e.into_owned(), true),
                Event::End(_) => Token::Close,
                Event::Text(e) => Token::Text(e.decode().map_err(XmlError::xml)?.into_owned()),
                Event::CData(e) => Token::Text(e.decode().map_err(XmlError::xml)?.into_owned()),
                Event::GeneralRef(e) => {
                    Token::Text(resolve_reference(&e, self.reader.buffer_position() as u64)?)
                }
                Event::Eof => Token::Eof,
                _ => continue,
            };
            return Ok(token);
        }
    }

    fn unexpected_eof(&self) -> XmlError {
        XmlError::format("unexpected end of document", self.position())
    }

    fn parse_document(&mut self) -> Result<EntityId> {
        let (start, empty) = loop {
            match self.next_token()? {
                Token::Open(start, empty) => break (start, empty),
                Token::Text(text) if text.trim().is_empty() => {}
                Token::Text(_) | Token::Close => {
                    return Err(XmlError::format("content before the root element", self.position()));
                }
                Token::Eof => {
                    return Err(XmlError::format("document has no root element", self.position()));
                }
            }
        };
        let name = local_name(&start);
        let key = self
            .schema
            .type_key(&name)
            .ok_or_else(|| XmlError::unknown_type(&name, self.position()))?;
        let Parsed::Entity(root) = self.parse_entity(start, empty, key, 0, true)? else {
            return Err(XmlError::format("document root is a reference", self.position()));
        };
        loop {
            match self.next_token()? {
                Token::Eof => return Ok(root),
                Token::Text(text) if text.trim().is_empty() => {}
                _ => {
                    return Err(XmlError::format("content after the root element", self.position()));
                }
            }
        }
    }

    /// Parse an entity element whose start tag was just read.
    fn parse_entity(
        &mut self,
        start: BytesStart<'static>,
        empty: bool,
        implied: TypeKey,
        depth: usize,
        document_root: bool,
    ) -> Result<Parsed> {
        let position = self.position();
        let mut id = None;
        let mut href = None;
        let mut xsi_type = None;
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(XmlError::xml)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(XmlError::xml)?.into_owned();
            match key.as_str() {
                "id" => id = Some(value),
                "href" => href = Some(value),
                "xsi:type" => xsi_type = Some(value),
                k if k == "xmlns" || k.starts_with("xmlns:") || k.starts_with("xsi:") => {}
                _ => {
                    let local = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                    attributes.push((local, value));
                }
            }
        }

        if let Some(href) = href {
            if !empty {
                self.skip_element()?;
            }
            return Ok(match self.session.lookup(&href) {
                Some(entity) => Parsed::Entity(entity),
                None => Parsed::Pending(href),
            });
        }

        let type_key = self.resolve_type(implied, xsi_type.as_deref(), position)?;
        if depth > self.session.options.max_depth {
            return Err(XmlError::DepthLimitExceeded {
                limit: self.session.options.max_depth,
                type_name: self.schema.type_name(type_key).to_string(),
            });
        }

        let entity = self.session.graph.allocate(type_key);
        if let Some(id) = id {
            self.session.register(id, entity, position)?;
        }
        if self.session.graph.root().is_none()
            && self.schema.is_subtype(type_key, self.schema.root_type())
        {
            self.session.graph.set_root(entity)?;
        }
        for (key, text) in attributes {
            self.apply_attribute(entity, type_key, &key, &text)?;
        }
        if !empty {
            self.parse_children(entity, type_key, depth, document_root)?;
        }
        Ok(Parsed::Entity(entity))
    }

    /// Element type, refined by `xsi:type` when it names a subtype.
    fn resolve_type(&self, implied: TypeKey, xsi_type: Option<&str>, position: u64) -> Result<TypeKey> {
        let mut key = implied;
        if let Some(declared) = xsi_type {
            let name = declared.rsplit(':').next().unwrap_or(declared);
            match self.schema.type_key(name) {
                Some(named) if self.schema.is_subtype(named, implied) => key = named,
                Some(_) => tracing::warn!(
                    xsi_type = declared,
                    element_type = self.schema.type_name(implied),
                    "ignoring xsi:type that is not a subtype"
                ),
                None if self.session.options.strict => {
                    return Err(XmlError::unknown_type(name, position));
                }
                None => tracing::warn!(xsi_type = declared, "ignoring unknown xsi:type"),
            }
        }
        if self.schema.entity_type(key).is_abstract() {
            return Err(XmlError::format(
                format!("cannot instantiate abstract type {}", self.schema.type_name(key)),
                position,
            ));
        }
        Ok(key)
    }

    fn apply_attribute(&mut self, entity: EntityId, type_key: TypeKey, key: &str, text: &str) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let ty = schema.entity_type(type_key);
        let Some((slot, field)) = ty.find_field(key).and_then(|s| ty.field_at(s).map(|f| (s, f))) else {
            tracing::warn!(type_name = ty.name(), attribute = key, "ignoring unknown attribute");
            return Ok(());
        };
        let context = format!("{}.{}", ty.name(), field.name);
        match decode_text(field, text, self.session.options.trim_strings, &context) {
            Some(value) => self.session.set_value(entity, slot, value),
            None => Ok(()),
        }
    }

    fn parse_children(
        &mut self,
        entity: EntityId,
        type_key: TypeKey,
        depth: usize,
        document_root: bool,
    ) -> Result<()> {
        loop {
            match self.next_token()? {
                Token::Close => return Ok(()),
                Token::Eof => return Err(self.unexpected_eof()),
                Token::Text(_) => {}
                Token::Open(start, empty) => {
                    self.parse_child(entity, type_key, start, empty, depth, document_root)?;
                }
            }
        }
    }

    fn parse_child(
        &mut self,
        entity: EntityId,
        type_key: TypeKey,
        start: BytesStart<'static>,
        empty: bool,
        depth: usize,
        document_root: bool,
    ) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let name = local_name(&start);
        let ty = schema.entity_type(type_key);

        if let Some((slot, field)) = ty.find_field(&name).and_then(|s| ty.field_at(s).map(|f| (s, f))) {
            if !field.kind.is_entity() {
                return self.parse_value_element(entity, slot, field, empty);
            }
            if let Some(named) = unwrapped_type(&schema, field) {
                let parsed = self.parse_entity(start, empty, named, depth + 1, false)?;
                return self.session.assign(entity, slot, parsed);
            }
            if let (FieldKind::Entity(_), Placement::Attribute, Some(declared)) =
                (&field.kind, field.placement, field.target())
            {
                let parsed = self.parse_entity(start, empty, declared, depth + 1, false)?;
                return self.session.assign(entity, slot, parsed);
            }
            if empty {
                return Ok(());
            }
            return self.parse_members(entity, slot, field, depth);
        }

        if document_root && name == HEADER_TAG {
            return self.parse_header(empty);
        }
        if document_root {
            let Some(key) = schema.type_key(&name) else {
                return Err(XmlError::unknown_type(name, self.position()));
            };
            // Top-level entities: their own fields and references link them.
            self.parse_entity(start, empty, key, depth + 1, false)?;
            return Ok(());
        }
        tracing::warn!(type_name = ty.name(), element = %name, "skipping unknown element");
        if !empty {
            self.skip_element()?;
        }
        Ok(())
    }

    /// Entities inside a wrapper element of an entity field.
    fn parse_members(
        &mut self,
        owner: EntityId,
        slot: usize,
        field: &FieldDescriptor,
        depth: usize,
    ) -> Result<()> {
        loop {
            match self.next_token()? {
                Token::Close => return Ok(()),
                Token::Eof => return Err(self.unexpected_eof()),
                Token::Text(_) => {}
                Token::Open(start, empty) => {
                    let name = local_name(&start);
                    match self.schema.type_key(&name) {
                        Some(key) => {
                            let parsed = self.parse_entity(start, empty, key, depth + 1, false)?;
                            self.session.assign(owner, slot, parsed)?;
                        }
                        None if field.required && !field.kind.is_collection() => {
                            return Err(XmlError::unknown_type(name, self.position()));
                        }
                        None => {
                            tracing::warn!(field = %field.name, element = %name, "skipping element of unknown type");
                            if !empty {
                                self.skip_element()?;
                            }
                        }
                    }
                }
            }
        }
    }

    /// A non-entity field written as an element.
    fn parse_value_element(
        &mut self,
        entity: EntityId,
        slot: usize,
        field: &FieldDescriptor,
        empty: bool,
    ) -> Result<()> {
        let context = format!("{}.{}", self.session.graph.type_name(entity), field.name);
        let trim = self.session.options.trim_strings;
        let value = match &field.kind {
            FieldKind::ScalarList(_) | FieldKind::ScalarMatrix { .. } | FieldKind::Select(_) if empty => {
                None
            }
            FieldKind::ScalarList(item) => {
                Some(Value::List(self.read_list_items(item.scalar, &context)?))
            }
            FieldKind::ScalarMatrix { item, columns } => {
                let flat = self.read_list_items(item.scalar, &context)?;
                Some(Value::Matrix(chunk_rows(flat, *columns, &context)))
            }
            FieldKind::Select(options) => self.read_selected(options, &context)?,
            _ => {
                let text = if empty { String::new() } else { self.read_text()? };
                decode_text(field, &text, trim, &context)
            }
        };
        match value {
            Some(value) => self.session.set_value(entity, slot, value),
            None => Ok(()),
        }
    }

    fn read_list_items(&mut self, kind: ScalarKind, context: &str) -> Result<Vec<Scalar>> {
        let trim = self.session.options.trim_strings;
        let mut items = Vec::new();
        let mut loose = String::new();
        loop {
            match self.next_token()? {
                Token::Close => break,
                Token::Eof => return Err(self.unexpected_eof()),
                Token::Text(text) => loose.push_str(&text),
                Token::Open(start, empty) => {
                    let name = local_name(&start);
                    let text = if empty { String::new() } else { self.read_text()? };
                    if strip_wrapper(&name).is_some() {
                        items.extend(decode_scalar(kind, &text, trim, context));
                    } else {
                        tracing::warn!(field = context, element = %name, "skipping non-wrapper list item");
                    }
                }
            }
        }
        if items.is_empty() && !loose.trim().is_empty() {
            items = decode_list(kind, &loose, context);
        }
        Ok(items)
    }

    fn read_selected(&mut self, options: &[DefinedType], context: &str) -> Result<Option<Value>> {
        let trim = self.session.options.trim_strings;
        let mut selected = None;
        loop {
            match self.next_token()? {
                Token::Close => return Ok(selected),
                Token::Eof => return Err(self.unexpected_eof()),
                Token::Text(_) => {}
                Token::Open(start, empty) => {
                    let name = local_name(&start);
                    let text = if empty { String::new() } else { self.read_text()? };
                    let option = strip_wrapper(&name)
                        .and_then(|type_name| options.iter().find(|o| o.name == type_name));
                    match option {
                        Some(defined) => {
                            if let Some(value) = decode_scalar(defined.scalar, &text, trim, context) {
                                selected = Some(Value::Selected {
                                    type_name: defined.name.clone(),
                                    value,
                                });
                            }
                        }
                        None => tracing::warn!(field = context, element = %name, "skipping unknown selected type"),
                    }
                }
            }
        }
    }

    fn parse_header(&mut self, empty: bool) -> Result<()> {
        let mut header = DocumentHeader::default();
        if !empty {
            loop {
                match self.next_token()? {
                    Token::Close => break,
                    Token::Eof => return Err(self.unexpected_eof()),
                    Token::Text(_) => {}
                    Token::Open(start, empty) => {
                        let tag = local_name(&start);
                        let text = if empty { String::new() } else { self.read_text()? };
                        header.set_field(&tag, text.trim().to_string());
                    }
                }
            }
        }
        if self.session.header.is_none() {
            self.session.header = Some(header);
        }
        Ok(())
    }

    /// Text content up to the end of the current element.
    fn read_text(&mut self) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next_token()? {
                Token::Text(chunk) => text.push_str(&chunk),
                Token::Close => return Ok(text),
                Token::Eof => return Err(self.unexpected_eof()),
                Token::Open(start, empty) => {
                    tracing::warn!(element = %local_name(&start), "ignoring markup inside a value");
                    if !empty {
                        self.skip_element()?;
                    }
                }
            }
        }
    }

    /// Skip the rest of an element whose start tag was just read.
    fn skip_element(&mut self) -> Result<()> {
        let mut open = 1usize;
        while open > 0 {
            match self.next_token()? {
                Token::Open(_, false) => open += 1,
                Token::Close => open -= 1,
                Token::Eof => return Err(self.unexpected_eof()),
                Token::Open(_, true) | Token::Text(_) => {}
            }
        }
        Ok(())
    }
}

/// Decode a field's textual form.
fn decode_text(field: &FieldDescriptor, text: &str, trim: bool, context: &str) -> Option<Value> {
    match &field.kind {
        FieldKind::Scalar(kind) => decode_scalar(*kind, text, trim, context).map(Value::Scalar),
        FieldKind::Defined(defined) => {
            decode_scalar(defined.scalar, text, trim, context).map(Value::Scalar)
        }
        FieldKind::Enum(enumeration) => decode_enum(enumeration, text, context).map(Value::Enum),
        FieldKind::ScalarList(item) => Some(Value::List(decode_list(item.scalar, text, context))),
        FieldKind::ScalarMatrix { item, columns } => Some(Value::Matrix(decode_matrix(
            item.scalar,
            *columns,
            text,
            context,
        ))),
        _ => {
            tracing::warn!(field = context, "field has no textual form, skipping");
            None
        }
    }
}

fn resolve_reference(reference: &BytesRef<'_>, position: u64) -> Result<String> {
    if let Some(ch) = reference.resolve_char_ref().map_err(XmlError::xml)? {
        return Ok(ch.to_string());
    }
    let name = reference.decode().map_err(XmlError::xml)?;
    resolve_predefined_entity(&name)
        .map(str::to_string)
        .ok_or_else(|| XmlError::format(format!("undeclared entity &{name};"), position))
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}
