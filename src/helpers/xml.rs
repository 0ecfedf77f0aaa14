//! XML parsing utilities for the Office Open XML parts of an .xlsx workbook.
//! Wraps quick-xml with the reader configuration the workbook parts need and adds
//! small helpers for attribute lookup and text accumulation.

use crate::error::RustyIntakeError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesCData;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),

    #[error("Parse attribute '{0}' value '{1}' failed")]
    ParseAttributeValueError(String, String),
}

/// XML reader that owns its event buffer
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Creates a reader configured for workbook parts: empty elements are expanded into
    /// start/end pairs and text is kept verbatim (cell text may carry meaningful spaces).
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        XmlReader { reader, buffer: Vec::with_capacity(1024) }
    }

    /// Reads the next XML event, None at end of document
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, RustyIntakeError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

/// Attribute access on start tags
pub(crate) trait XmlNodeHelper<'a> {
    /// Gets the unescaped value of an attribute, matched by its full (possibly prefixed) name
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustyIntakeError>;

    /// Parses an attribute value into `T`
    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, RustyIntakeError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, RustyIntakeError> {
        self.try_get_attribute(name)?
            .map(|attribute| unescape(&attribute))
            .transpose()
    }

    fn parse_attribute_value<T: FromStr>(&'a self, name: &str) -> Result<Option<T>, RustyIntakeError> {
        match self.get_attribute_value(name)? {
            Some(value) => value
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| XmlError::ParseAttributeValueError(name.to_owned(), value.to_string()).into()),
            None => Ok(None),
        }
    }
}

/// Gets the unescaped value of an attribute
pub(crate) fn unescape<'a>(attribute: &Attribute<'a>) -> Result<Cow<'a, str>, RustyIntakeError> {
    Ok(attribute.unescape_value()?)
}

/// Text accumulation from XML events
pub(crate) trait XmlTextContextHelper {
    /// Appends a text node
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), RustyIntakeError>;

    /// Appends a CDATA section
    fn push_bytes_cdata(&mut self, text: &BytesCData) -> Result<(), RustyIntakeError>;

    /// Appends an entity or character reference (`&amp;`, `&#10;`, `&#x41;`)
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), RustyIntakeError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), RustyIntakeError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_cdata(&mut self, text: &BytesCData) -> Result<(), RustyIntakeError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), RustyIntakeError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16)?,
                None => number.parse::<u32>()?,
            };
            let character = char::from_u32(code)
                .ok_or_else(|| XmlError::ParseEntityError(raw.to_string()))?;
            self.push(character);
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }
        Ok(())
    }
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}
