use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    name: String,
    namespace: Option<String>,
    attributes: Vec<(String, String)>,
}

impl StartTag {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved namespace, inherited from ancestors when not declared here.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is(&self, name: &str, namespace: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    pub fn required_attribute(&self, name: &str) -> Result<&str, ParseError> {
        self.attribute(name)
            .ok_or_else(|| ParseError::MissingAttribute {
                element: self.name.clone(),
                attribute: name.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndTag {
    name: String,
    namespace: Option<String>,
}

impl EndTag {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    StartTag(StartTag),
    EndTag(EndTag),
    Text(String),
    EndDocument,
}

/// Pull cursor over an XML document.
///
/// Empty elements are reported as a start tag immediately followed by its end
/// tag. A document that stops with elements still open ends in
/// `EndDocument` instead of an error.
pub struct XmlCursor<'a> {
    reader: NsReader<&'a [u8]>,
    current: XmlEvent,
    depth: usize,
    finished: bool,
}

impl<'a> XmlCursor<'a> {
    /// Create a cursor positioned on the first event of `xml`.
    pub fn new(xml: &'a str) -> Result<Self, ParseError> {
        let mut reader = NsReader::from_str(xml);
        reader.config_mut().expand_empty_elements = true;

        let mut cursor = Self {
            reader,
            current: XmlEvent::EndDocument,
            depth: 0,
            finished: false,
        };
        cursor.advance()?;
        Ok(cursor)
    }

    pub fn event(&self) -> &XmlEvent {
        &self.current
    }

    /// Nesting depth of the current event. A start tag and its matching end
    /// tag report the same depth; the root element is at depth 1.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn next(&mut self) -> Result<&XmlEvent, ParseError> {
        self.advance()?;
        Ok(&self.current)
    }

    /// Advance until a start tag is current. Returns `false` at end of
    /// document.
    pub fn next_start_tag(&mut self) -> Result<bool, ParseError> {
        loop {
            match self.current {
                XmlEvent::StartTag(_) => return Ok(true),
                XmlEvent::EndDocument => return Ok(false),
                _ => self.advance()?,
            }
        }
    }

    /// Collect the text directly inside the current element and leave the
    /// cursor on its end tag. Nested elements are skipped.
    pub fn read_text(&mut self) -> Result<String, ParseError> {
        if !matches!(self.current, XmlEvent::StartTag(_)) {
            return Ok(String::new());
        }
        let depth = self.depth;
        let mut text = String::new();
        loop {
            self.advance()?;
            match &self.current {
                XmlEvent::Text(t) if self.depth == depth => text.push_str(t),
                XmlEvent::EndTag(_) if self.depth == depth => break,
                XmlEvent::EndDocument => break,
                _ => {}
            }
        }
        Ok(text)
    }

    /// Move from the current start tag to its matching end tag.
    pub fn skip_element(&mut self) -> Result<(), ParseError> {
        if !matches!(self.current, XmlEvent::StartTag(_)) {
            return Ok(());
        }
        let depth = self.depth;
        loop {
            self.advance()?;
            match &self.current {
                XmlEvent::EndTag(_) if self.depth == depth => return Ok(()),
                XmlEvent::EndDocument => return Ok(()),
                _ => {}
            }
        }
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        if matches!(self.current, XmlEvent::EndTag(_)) {
            self.depth = self.depth.saturating_sub(1);
        }
        if self.finished {
            self.current = XmlEvent::EndDocument;
            return Ok(());
        }

        let event = self.read_event()?;
        match &event {
            XmlEvent::StartTag(_) => self.depth += 1,
            XmlEvent::EndDocument => self.finished = true,
            _ => {}
        }
        self.current = event;
        Ok(())
    }

    fn read_event(&mut self) -> Result<XmlEvent, ParseError> {
        loop {
            let (resolved, event) = match self.reader.read_resolved_event() {
                Ok(pair) => pair,
                Err(quick_xml::Error::IllFormed(IllFormedError::MissingEndTag(_))) => {
                    return Ok(XmlEvent::EndDocument);
                }
                Err(e) => return Err(ParseError::Xml(e.to_string())),
            };
            let namespace = match resolved {
                ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
                _ => None,
            };

            match event {
                Event::Start(start) => return start_tag(&start, namespace).map(XmlEvent::StartTag),
                Event::End(end) => {
                    return Ok(XmlEvent::EndTag(EndTag {
                        name: utf8(end.local_name().as_ref())?,
                        namespace,
                    }));
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| ParseError::Xml(e.to_string()))?;
                    return Ok(XmlEvent::Text(text.into_owned()));
                }
                Event::CData(data) => {
                    return Ok(XmlEvent::Text(utf8(&data.into_inner())?));
                }
                Event::Eof => return Ok(XmlEvent::EndDocument),
                _ => continue,
            }
        }
    }
}

fn start_tag(start: &BytesStart<'_>, namespace: Option<String>) -> Result<StartTag, ParseError> {
    let name = utf8(start.local_name().as_ref())?;
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| ParseError::Xml(e.to_string()))?;
        if attribute.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = utf8(attribute.key.as_ref())?;
        let value = attribute
            .unescape_value()
            .map_err(|e| ParseError::Xml(e.to_string()))?;
        attributes.push((key, value.into_owned()));
    }
    Ok(StartTag {
        name,
        namespace,
        attributes,
    })
}

fn utf8(bytes: &[u8]) -> Result<String, ParseError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| ParseError::Xml(format!("invalid UTF-8: {e}")))
}
