//! Reader and writer options.

use crate::header::DocumentHeader;

/// Default nesting limit for inline entity content.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Options for reading graph documents.
#[derive(Debug, Clone)]
pub struct XmlReaderOptions {
    /// Fail on schema mismatches instead of skipping the offending item.
    pub strict: bool,
    /// Trim surrounding whitespace from string values (default: true).
    pub trim_strings: bool,
    /// Drop references that never resolve instead of failing (default: false).
    pub allow_dangling: bool,
    /// Maximum element nesting depth.
    pub max_depth: usize,
}

impl Default for XmlReaderOptions {
    fn default() -> Self {
        Self {
            strict: false,
            trim_strings: true,
            allow_dangling: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl XmlReaderOptions {
    /// Create reader options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable strict validation.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Keep string values exactly as written.
    #[must_use]
    pub fn keep_whitespace(mut self) -> Self {
        self.trim_strings = false;
        self
    }

    /// Log and drop unresolved references at end of input.
    #[must_use]
    pub fn allow_dangling(mut self) -> Self {
        self.allow_dangling = true;
        self
    }

    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// Options for writing graph documents.
#[derive(Debug, Clone)]
pub struct XmlWriterOptions {
    /// Use an entity's natural key as its identifier when it has one (default: true).
    pub prefer_natural_keys: bool,
    /// Indentation width; `None` writes everything on one line.
    pub indent: Option<usize>,
    /// Default namespace declared on the root element.
    pub namespace: Option<String>,
    /// `xsi:schemaLocation` declared on the root element.
    pub schema_location: Option<String>,
    /// Header block written before the root's content.
    pub header: Option<DocumentHeader>,
    /// Maximum nesting depth of inline entity content. Deeper entities are written as
    /// references and their content moves to the top level of the document.
    pub max_depth: usize,
}

impl Default for XmlWriterOptions {
    fn default() -> Self {
        Self {
            prefer_natural_keys: true,
            indent: Some(2),
            namespace: None,
            schema_location: None,
            header: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl XmlWriterOptions {
    /// Create writer options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Always synthesize identifiers.
    #[must_use]
    pub fn synthesized_ids(mut self) -> Self {
        self.prefer_natural_keys = false;
        self
    }

    #[must_use]
    pub fn with_indent(mut self, indent: Option<usize>) -> Self {
        self.indent = indent;
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_schema_location(mut self, location: impl Into<String>) -> Self {
        self.schema_location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, header: DocumentHeader) -> Self {
        self.header = Some(header);
        self
    }

    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}
