//! Dispatch of incoming payloads to typed parsers, keyed by namespace and
//! element name.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::error::ParseError;
use crate::groups::{
    BlockList, GroupDefaultRestrictionsResult, GroupExtension, GroupMemberRightsResult, GroupPayload, Invite,
    InviteList, InviteMessageExtension, PinnedMessage,
};
use crate::ns;
use crate::stanza::{IqHeader, IqType, StanzaError};
use crate::xml::{XmlCursor, XmlEvent};

/// Parses an IQ child. Called with the cursor on the child's start tag and
/// must leave it on the matching end tag.
pub type IqProvider = fn(&mut XmlCursor<'_>) -> Result<GroupPayload, ParseError>;

/// Parses a message extension element, under the same cursor contract as
/// [`IqProvider`].
pub type ExtensionProvider = fn(&mut XmlCursor<'_>) -> Result<GroupExtension, ParseError>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderKey {
    pub namespace: String,
    pub element: String,
}

impl ProviderKey {
    pub fn new(namespace: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            element: element.into(),
        }
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.element)
    }
}

/// Read-only lookup table from [`ProviderKey`] to parser.
///
/// Built once through [`ProviderRegistryBuilder`] and never mutated
/// afterwards, so it can be shared freely between receive tasks.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    iq: HashMap<ProviderKey, IqProvider>,
    extensions: HashMap<ProviderKey, ExtensionProvider>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// Registry with every group-chat provider, created on first use.
    pub fn global() -> &'static ProviderRegistry {
        static GLOBAL: OnceLock<ProviderRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| ProviderRegistry::builder().with_group_providers().build())
    }

    pub fn iq_provider(&self, namespace: &str, element: &str) -> Option<IqProvider> {
        self.iq.get(&ProviderKey::new(namespace, element)).copied()
    }

    pub fn extension_provider(&self, namespace: &str, element: &str) -> Option<ExtensionProvider> {
        self.extensions
            .get(&ProviderKey::new(namespace, element))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.iq.len() + self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct ProviderRegistryBuilder {
    registry: ProviderRegistry,
}

impl ProviderRegistryBuilder {
    /// Register an IQ child parser. A later registration for the same key
    /// replaces the earlier one.
    pub fn iq(mut self, namespace: &str, element: &str, provider: IqProvider) -> Self {
        let key = ProviderKey::new(namespace, element);
        if self.registry.iq.insert(key.clone(), provider).is_some() {
            warn!(%key, "Replacing IQ provider");
        }
        self
    }

    pub fn extension(mut self, namespace: &str, element: &str, provider: ExtensionProvider) -> Self {
        let key = ProviderKey::new(namespace, element);
        if self.registry.extensions.insert(key.clone(), provider).is_some() {
            warn!(%key, "Replacing extension provider");
        }
        self
    }

    pub fn with_group_providers(self) -> Self {
        self.iq(ns::GROUPS_DEFAULT_RIGHTS, "query", |cursor| {
            GroupDefaultRestrictionsResult::parse(cursor).map(GroupPayload::DefaultRestrictions)
        })
        .iq(ns::GROUPS_RIGHTS, "query", |cursor| {
            GroupMemberRightsResult::parse(cursor).map(GroupPayload::MemberRights)
        })
        .iq(ns::GROUPS_INVITE, "invite", |cursor| {
            Invite::parse(cursor).map(GroupPayload::Invite)
        })
        .iq(ns::GROUPS_INVITE, "query", |cursor| {
            InviteList::parse(cursor).map(GroupPayload::InviteList)
        })
        .iq(ns::GROUPS, "update", |cursor| {
            PinnedMessage::parse(cursor).map(GroupPayload::PinnedMessage)
        })
        .iq(ns::GROUPS_BLOCK, "query", |cursor| {
            BlockList::parse(cursor).map(GroupPayload::BlockList)
        })
        .extension(ns::GROUPS_INVITE, "invite", |cursor| {
            InviteMessageExtension::parse(cursor).map(GroupExtension::Invite)
        })
    }

    pub fn build(self) -> ProviderRegistry {
        self.registry
    }
}

/// What an incoming IQ carried, as far as this layer understands it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IqBody {
    Payload(GroupPayload),
    /// No child element, as in a bare acknowledgement.
    Empty,
    Error(StanzaError),
    /// A child no provider is registered for.
    Unhandled { namespace: String, element: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingIq {
    pub header: IqHeader,
    pub body: IqBody,
}

impl IncomingIq {
    pub fn parse(xml: &str, registry: &ProviderRegistry) -> Result<Self, ParseError> {
        let (header, body) = Self::parse_envelope(xml, registry)?;
        Ok(Self {
            header,
            body: body?,
        })
    }

    /// Parse the `<iq/>` header and its body separately, so a reply whose
    /// payload is malformed can still be matched to its request by id.
    ///
    /// The outer error covers anything that prevents reading the header.
    pub fn parse_envelope(
        xml: &str,
        registry: &ProviderRegistry,
    ) -> Result<(IqHeader, Result<IqBody, ParseError>), ParseError> {
        let mut cursor = XmlCursor::new(xml)?;
        let header = match cursor.event() {
            XmlEvent::StartTag(tag) if tag.name() == "iq" => IqHeader::parse(tag)?,
            XmlEvent::StartTag(tag) => {
                return Err(ParseError::UnexpectedElement {
                    expected: "iq".to_string(),
                    found: tag.name().to_string(),
                })
            }
            _ => return Err(ParseError::EmptyDocument),
        };

        let body = if header.iq_type == IqType::Error {
            parse_error_body(&mut cursor)
        } else {
            parse_payload_body(&mut cursor, registry)
        };

        Ok((header, body))
    }

    pub fn is_reply(&self) -> bool {
        !self.header.iq_type.is_request()
    }
}

fn parse_payload_body(
    cursor: &mut XmlCursor<'_>,
    registry: &ProviderRegistry,
) -> Result<IqBody, ParseError> {
    if !advance_to_child(cursor)? {
        return Ok(IqBody::Empty);
    }
    let XmlEvent::StartTag(tag) = cursor.event() else {
        return Ok(IqBody::Empty);
    };
    let namespace = tag.namespace().unwrap_or_default().to_string();
    let element = tag.name().to_string();

    match registry.iq_provider(&namespace, &element) {
        Some(provider) => provider(cursor).map(IqBody::Payload),
        None => {
            debug!(%namespace, %element, "No provider registered, leaving IQ unhandled");
            Ok(IqBody::Unhandled { namespace, element })
        }
    }
}

/// An `error` IQ may echo the original request before `<error/>`.
fn parse_error_body(cursor: &mut XmlCursor<'_>) -> Result<IqBody, ParseError> {
    while advance_to_child(cursor)? {
        let is_error = matches!(cursor.event(), XmlEvent::StartTag(tag) if tag.name() == "error");
        if is_error {
            return StanzaError::parse(cursor).map(IqBody::Error);
        }
        cursor.skip_element()?;
    }
    Err(ParseError::MissingChild {
        element: "iq".to_string(),
        child: "error".to_string(),
    })
}

/// Move to the next direct child of the root element. Returns `false` once
/// the root closes or the document ends.
fn advance_to_child(cursor: &mut XmlCursor<'_>) -> Result<bool, ParseError> {
    loop {
        cursor.next()?;
        match cursor.event() {
            XmlEvent::StartTag(_) if cursor.depth() == 2 => return Ok(true),
            XmlEvent::EndTag(_) if cursor.depth() == 1 => return Ok(false),
            XmlEvent::EndDocument => return Ok(false),
            _ => {}
        }
    }
}

/// Parse a standalone message extension element. Unknown elements yield
/// `None`.
pub fn parse_extension(
    xml: &str,
    registry: &ProviderRegistry,
) -> Result<Option<GroupExtension>, ParseError> {
    let mut cursor = XmlCursor::new(xml)?;
    let (namespace, element) = match cursor.event() {
        XmlEvent::StartTag(tag) => (
            tag.namespace().unwrap_or_default().to_string(),
            tag.name().to_string(),
        ),
        _ => return Err(ParseError::EmptyDocument),
    };

    match registry.extension_provider(&namespace, &element) {
        Some(provider) => provider(&mut cursor).map(Some),
        None => {
            debug!(%namespace, %element, "No extension provider registered");
            Ok(None)
        }
    }
}
