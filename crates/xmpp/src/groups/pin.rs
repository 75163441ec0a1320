use jid::FullJid;
use xabber_core::GroupChat;

use crate::error::ParseError;
use crate::ns;
use crate::stanza::{IqHeader, IqRequest, IqType};
use crate::xml::{XmlBuilder, XmlCursor, XmlEvent};

/// Pins a message in a group, or clears the pinned message.
///
/// ```xml
/// <iq to='group@domain/resource' id='…' type='set'>
///   <update xmlns='https://xabber.com/protocol/groups'><pinned>stanza-id</pinned></update>
/// </iq>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPinMessageIq {
    header: IqHeader,
    message_id: String,
}

impl GroupPinMessageIq {
    pub fn new(group: &GroupChat, message_id: impl Into<String>) -> Self {
        Self {
            header: IqHeader::new(IqType::Set, group.destination()),
            message_id: message_id.into(),
        }
    }

    /// Request with an empty `<pinned/>` value, which clears the pin.
    pub fn unpin(group: &GroupChat) -> Self {
        Self::new(group, "")
    }

    pub fn with_from(mut self, from: FullJid) -> Self {
        self.header.from = Some(from.into());
        self
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}

impl IqRequest for GroupPinMessageIq {
    const ELEMENT: &'static str = "update";
    const NAMESPACE: &'static str = ns::GROUPS;

    fn header(&self) -> &IqHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut IqHeader {
        &mut self.header
    }

    fn write_child(&self, xml: &mut XmlBuilder) {
        xml.element("pinned", &self.message_id);
    }
}

/// The pinned message announced by an `update` element; `None` when cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedMessage {
    pub message_id: Option<String>,
}

impl PinnedMessage {
    pub(crate) fn parse(cursor: &mut XmlCursor<'_>) -> Result<Self, ParseError> {
        let depth = cursor.depth();
        let mut message_id = None;

        loop {
            cursor.next()?;
            let is_pinned = match cursor.event() {
                XmlEvent::StartTag(tag) => tag.name() == "pinned",
                XmlEvent::EndTag(_) if cursor.depth() == depth => break,
                XmlEvent::EndDocument => break,
                _ => continue,
            };
            if is_pinned {
                let text = cursor.read_text()?;
                message_id = Some(text).filter(|id| !id.is_empty());
            } else {
                cursor.skip_element()?;
            }
        }

        Ok(Self { message_id })
    }
}
