use std::fmt;

use xabber_core::GroupChat;

use crate::error::ParseError;
use crate::ns;
use crate::stanza::{IqHeader, IqRequest, IqType};
use crate::xml::{XmlBuilder, XmlCursor, XmlEvent};

/// What a block list entry matches: a member id, a single JID or a whole
/// domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockedKind {
    Id,
    Jid,
    Domain,
}

impl BlockedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockedKind::Id => "id",
            BlockedKind::Jid => "jid",
            BlockedKind::Domain => "domain",
        }
    }

    fn from_element(name: &str) -> Option<Self> {
        match name {
            "id" => Some(BlockedKind::Id),
            "jid" => Some(BlockedKind::Jid),
            "domain" => Some(BlockedKind::Domain),
            _ => None,
        }
    }
}

impl fmt::Display for BlockedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockedItem {
    pub kind: BlockedKind,
    pub value: String,
}

impl BlockedItem {
    pub fn new(kind: BlockedKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl fmt::Display for BlockedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Fetches the entries a group refuses to admit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBlockListQueryIq {
    header: IqHeader,
}

impl GroupBlockListQueryIq {
    pub fn new(group: &GroupChat) -> Self {
        Self {
            header: IqHeader::new(IqType::Get, group.destination()),
        }
    }
}

impl IqRequest for GroupBlockListQueryIq {
    const ELEMENT: &'static str = "query";
    const NAMESPACE: &'static str = ns::GROUPS_BLOCK;

    fn header(&self) -> &IqHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut IqHeader {
        &mut self.header
    }

    fn write_child(&self, _xml: &mut XmlBuilder) {}
}

/// `<query xmlns='…#block'><jid/>|<domain/>|<id/>…</query>`, in document
/// order. Unknown children are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockList {
    pub items: Vec<BlockedItem>,
}

impl BlockList {
    pub(crate) fn parse(cursor: &mut XmlCursor<'_>) -> Result<Self, ParseError> {
        let depth = cursor.depth();
        let mut items = Vec::new();

        loop {
            cursor.next()?;
            let kind = match cursor.event() {
                XmlEvent::StartTag(tag) => BlockedKind::from_element(tag.name()),
                XmlEvent::EndTag(_) if cursor.depth() == depth => break,
                XmlEvent::EndDocument => break,
                _ => continue,
            };
            match kind {
                Some(kind) => items.push(BlockedItem::new(kind, cursor.read_text()?)),
                None => cursor.skip_element()?,
            }
        }

        Ok(Self { items })
    }
}

/// Lifts blocks from the given entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupUnblockIq {
    header: IqHeader,
    items: Vec<BlockedItem>,
}

impl GroupUnblockIq {
    pub fn new(group: &GroupChat, items: impl IntoIterator<Item = BlockedItem>) -> Self {
        Self {
            header: IqHeader::new(IqType::Set, group.destination()),
            items: items.into_iter().collect(),
        }
    }

    pub fn items(&self) -> &[BlockedItem] {
        &self.items
    }
}

impl IqRequest for GroupUnblockIq {
    const ELEMENT: &'static str = "unblock";
    const NAMESPACE: &'static str = ns::GROUPS_BLOCK;

    fn header(&self) -> &IqHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut IqHeader {
        &mut self.header
    }

    fn write_child(&self, xml: &mut XmlBuilder) {
        for item in &self.items {
            xml.element(item.kind.as_str(), &item.value);
        }
    }
}
