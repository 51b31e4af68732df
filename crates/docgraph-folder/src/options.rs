//! Folder codec options.

use std::collections::HashMap;

use docgraph_xml::{XmlReaderOptions, XmlWriterOptions};

/// Default number of members above which a collection folder is split into groups.
pub const DEFAULT_GROUP_THRESHOLD: usize = 500;

/// Options for reading and writing graph folders.
#[derive(Debug, Clone)]
pub struct FolderOptions {
    /// Collections with more members than this are grouped by first character.
    pub group_threshold: usize,
    /// Name prefix to ignore when grouping members, per entity type.
    pub group_prefixes: HashMap<String, String>,
    /// Options for the documents written.
    pub writer: XmlWriterOptions,
    /// Options for the documents read.
    pub reader: XmlReaderOptions,
}

impl Default for FolderOptions {
    fn default() -> Self {
        Self {
            group_threshold: DEFAULT_GROUP_THRESHOLD,
            group_prefixes: HashMap::new(),
            writer: XmlWriterOptions::default(),
            reader: XmlReaderOptions::default(),
        }
    }
}

impl FolderOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_group_threshold(mut self, threshold: usize) -> Self {
        self.group_threshold = threshold;
        self
    }

    /// Ignore `prefix` at the start of member names of `type_name` when grouping.
    #[must_use]
    pub fn with_group_prefix(mut self, type_name: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.group_prefixes.insert(type_name.into(), prefix.into());
        self
    }

    #[must_use]
    pub fn with_writer_options(mut self, writer: XmlWriterOptions) -> Self {
        self.writer = writer;
        self
    }

    #[must_use]
    pub fn with_reader_options(mut self, reader: XmlReaderOptions) -> Self {
        self.reader = reader;
        self
    }
}
