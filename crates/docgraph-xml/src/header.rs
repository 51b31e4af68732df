//! Document header block.
//!
//! An optional `<header>` element, written as the first child of the root element,
//! records provenance of the exchange file. It is not part of the graph.

use std::io::Write;

use chrono::NaiveDateTime;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::Result;
use crate::value_codec::{format_timestamp, parse_timestamp};

/// Element name of the header block.
pub const HEADER_TAG: &str = "header";

/// Provenance information carried by a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentHeader {
    pub name: Option<String>,
    pub time_stamp: Option<NaiveDateTime>,
    pub author: Vec<String>,
    pub organization: Vec<String>,
    pub preprocessor_version: Option<String>,
    pub originating_system: Option<String>,
    pub authorization: Option<String>,
    pub documentation: Option<String>,
}

impl DocumentHeader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_time_stamp(mut self, time_stamp: NaiveDateTime) -> Self {
        self.time_stamp = Some(time_stamp);
        self
    }

    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author.push(author.into());
        self
    }

    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization.push(organization.into());
        self
    }

    #[must_use]
    pub fn with_originating_system(mut self, system: impl Into<String>) -> Self {
        self.originating_system = Some(system.into());
        self
    }

    /// Write the `<header>` element.
    pub(crate) fn write_to<W: Write>(&self, xml: &mut Writer<W>) -> Result<()> {
        xml.write_event(Event::Start(BytesStart::new(HEADER_TAG)))?;
        let time_stamp = self.time_stamp.map(format_timestamp);
        let single = [
            ("name", self.name.as_deref()),
            ("time_stamp", time_stamp.as_deref()),
        ];
        for (tag, value) in single {
            write_text(xml, tag, value)?;
        }
        for author in &self.author {
            write_text(xml, "author", Some(author))?;
        }
        for organization in &self.organization {
            write_text(xml, "organization", Some(organization))?;
        }
        let trailing = [
            ("preprocessor_version", self.preprocessor_version.as_deref()),
            ("originating_system", self.originating_system.as_deref()),
            ("authorization", self.authorization.as_deref()),
            ("documentation", self.documentation.as_deref()),
        ];
        for (tag, value) in trailing {
            write_text(xml, tag, value)?;
        }
        xml.write_event(Event::End(BytesEnd::new(HEADER_TAG)))?;
        Ok(())
    }

    /// Store the text of one header child element; unknown tags are ignored.
    pub(crate) fn set_field(&mut self, tag: &str, text: String) {
        match tag {
            "name" => self.name = Some(text),
            "time_stamp" => match parse_timestamp(&text) {
                Some(stamp) => self.time_stamp = Some(stamp),
                None => tracing::warn!(value = %text, "ignoring unparsable header time_stamp"),
            },
            "author" => self.author.push(text),
            "organization" => self.organization.push(text),
            "preprocessor_version" => self.preprocessor_version = Some(text),
            "originating_system" => self.originating_system = Some(text),
            "authorization" => self.authorization = Some(text),
            "documentation" => self.documentation = Some(text),
            other => tracing::debug!(tag = other, "ignoring unknown header element"),
        }
    }
}

fn write_text<W: Write>(xml: &mut Writer<W>, tag: &str, value: Option<&str>) -> Result<()> {
    if let Some(value) = value {
        xml.write_event(Event::Start(BytesStart::new(tag)))?;
        xml.write_event(Event::Text(BytesText::new(value)))?;
        xml.write_event(Event::End(BytesEnd::new(tag)))?;
    }
    Ok(())
}
