use std::fmt;
use std::str::FromStr;

use jid::Jid;
use uuid::Uuid;

use crate::error::ParseError;
use crate::ns;
use crate::xml::{XmlBuilder, XmlCursor, XmlEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IqType {
    Get,
    Set,
    Result,
    Error,
}

impl IqType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IqType::Get => "get",
            IqType::Set => "set",
            IqType::Result => "result",
            IqType::Error => "error",
        }
    }

    /// `get` and `set` expect a reply; `result` and `error` are replies.
    pub fn is_request(&self) -> bool {
        matches!(self, IqType::Get | IqType::Set)
    }
}

impl FromStr for IqType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(IqType::Get),
            "set" => Ok(IqType::Set),
            "result" => Ok(IqType::Result),
            "error" => Ok(IqType::Error),
            other => Err(ParseError::InvalidValue {
                field: "iq@type".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for IqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addressing and correlation attributes shared by every IQ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IqHeader {
    pub id: String,
    pub from: Option<Jid>,
    pub to: Option<Jid>,
    pub iq_type: IqType,
}

impl IqHeader {
    /// A header with a freshly generated id.
    pub fn new(iq_type: IqType, to: Jid) -> Self {
        Self {
            id: new_stanza_id(),
            from: None,
            to: Some(to),
            iq_type,
        }
    }

    pub(crate) fn parse(tag: &crate::xml::StartTag) -> Result<Self, ParseError> {
        let iq_type = tag.required_attribute("type")?.parse::<IqType>()?;
        Ok(Self {
            id: tag.required_attribute("id")?.to_string(),
            from: tag.attribute("from").map(parse_jid).transpose()?,
            to: tag.attribute("to").map(parse_jid).transpose()?,
            iq_type,
        })
    }
}

pub fn new_stanza_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub(crate) fn parse_jid(value: &str) -> Result<Jid, ParseError> {
    value.parse::<Jid>().map_err(|e| ParseError::InvalidJid {
        value: value.to_string(),
        message: e.to_string(),
    })
}

/// A typed outgoing IQ.
///
/// Implementors fix the child element name and namespace and write the child's
/// attributes and content; the envelope is rendered by `to_xml`.
pub trait IqRequest {
    const ELEMENT: &'static str;
    const NAMESPACE: &'static str;

    fn header(&self) -> &IqHeader;

    fn header_mut(&mut self) -> &mut IqHeader;

    /// Called with the child start tag open (`<ELEMENT xmlns='NAMESPACE'`).
    /// Leaving it untouched renders an empty child element.
    fn write_child(&self, xml: &mut XmlBuilder);

    fn element_name(&self) -> &'static str {
        Self::ELEMENT
    }

    fn namespace(&self) -> &'static str {
        Self::NAMESPACE
    }

    fn id(&self) -> &str {
        &self.header().id
    }

    fn set_id(&mut self, id: impl Into<String>)
    where
        Self: Sized,
    {
        self.header_mut().id = id.into();
    }

    fn to_xml(&self) -> String {
        let header = self.header();
        let to = header.to.as_ref().map(|jid| jid.to_string());
        let from = header.from.as_ref().map(|jid| jid.to_string());

        let mut xml = XmlBuilder::new();
        xml.open_element("iq")
            .opt_attribute("to", to.as_deref())
            .opt_attribute("from", from.as_deref())
            .attribute("id", &header.id)
            .attribute("type", header.iq_type.as_str());
        xml.open_element(Self::ELEMENT).xmlns(Self::NAMESPACE);
        self.write_child(&mut xml);
        xml.close_element();
        xml.finish()
    }
}

/// A namespaced payload that can be embedded in any stanza.
pub trait ExtensionElement {
    fn element_name(&self) -> &'static str;

    fn namespace(&self) -> &'static str;

    fn write_xml(&self, xml: &mut XmlBuilder);

    fn to_xml(&self) -> String {
        let mut xml = XmlBuilder::new();
        self.write_xml(&mut xml);
        xml.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Auth,
    Cancel,
    Continue,
    Modify,
    Wait,
}

impl FromStr for ErrorType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" => Ok(ErrorType::Auth),
            "cancel" => Ok(ErrorType::Cancel),
            "continue" => Ok(ErrorType::Continue),
            "modify" => Ok(ErrorType::Modify),
            "wait" => Ok(ErrorType::Wait),
            other => Err(ParseError::InvalidValue {
                field: "error@type".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Protocol-level error detail carried by an `error` IQ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StanzaError {
    pub error_type: ErrorType,
    /// Defined condition element name, e.g. `item-not-found`.
    pub condition: String,
    pub text: Option<String>,
}

impl StanzaError {
    /// Parse `<error/>` with the cursor on its start tag; leaves the cursor on
    /// the matching end tag.
    pub(crate) fn parse(cursor: &mut XmlCursor<'_>) -> Result<Self, ParseError> {
        let XmlEvent::StartTag(tag) = cursor.event() else {
            return Err(ParseError::MissingChild {
                element: "iq".to_string(),
                child: "error".to_string(),
            });
        };
        let error_type = tag.required_attribute("type")?.parse::<ErrorType>()?;
        let depth = cursor.depth();
        let mut condition = None;
        let mut text = None;

        loop {
            cursor.next()?;
            match cursor.event() {
                XmlEvent::StartTag(child) if child.namespace() == Some(ns::STANZAS) => {
                    if child.name() == "text" {
                        text = Some(cursor.read_text()?);
                    } else {
                        condition.get_or_insert_with(|| child.name().to_string());
                        cursor.skip_element()?;
                    }
                }
                XmlEvent::StartTag(_) => cursor.skip_element()?,
                XmlEvent::EndTag(_) if cursor.depth() == depth => break,
                XmlEvent::EndDocument => break,
                _ => {}
            }
        }

        Ok(Self {
            error_type,
            condition: condition.unwrap_or_else(|| "undefined-condition".to_string()),
            text,
        })
    }
}

impl fmt::Display for StanzaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => write!(f, "{} ({text})", self.condition),
            None => f.write_str(&self.condition),
        }
    }
}
