use jid::BareJid;
use xabber_core::{ContactJid, GroupChat};

use crate::error::ParseError;
use crate::ns;
use crate::stanza::{ExtensionElement, IqHeader, IqRequest, IqType};
use crate::xml::{XmlBuilder, XmlCursor, XmlEvent};

/// Body of an invite request: who is invited, why, and whether the group
/// itself should message the invitee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    pub jid: BareJid,
    pub reason: Option<String>,
    pub send: bool,
}

impl Invite {
    pub fn new(jid: BareJid) -> Self {
        Self {
            jid,
            reason: None,
            send: false,
        }
    }

    fn write_children(&self, xml: &mut XmlBuilder) {
        xml.element("jid", self.jid.as_str())
            .opt_element("reason", self.reason.as_deref())
            .bool_element("send", self.send);
    }

    /// Parse `<invite><jid/><reason/>?<send/>?</invite>` with the cursor on
    /// the start tag. A missing `send` reads as `false`.
    pub(crate) fn parse(cursor: &mut XmlCursor<'_>) -> Result<Self, ParseError> {
        let depth = cursor.depth();
        let mut jid = None;
        let mut reason = None;
        let mut send = false;

        loop {
            cursor.next()?;
            let child = match cursor.event() {
                XmlEvent::StartTag(tag) => tag.name().to_string(),
                XmlEvent::EndTag(_) if cursor.depth() == depth => break,
                XmlEvent::EndDocument => break,
                _ => continue,
            };
            match child.as_str() {
                "jid" => jid = Some(parse_bare_jid(&cursor.read_text()?)?),
                "reason" => reason = Some(cursor.read_text()?),
                "send" => send = parse_bool("send", &cursor.read_text()?)?,
                _ => cursor.skip_element()?,
            }
        }

        let jid = jid.ok_or_else(|| ParseError::MissingChild {
            element: "invite".to_string(),
            child: "jid".to_string(),
        })?;
        Ok(Self { jid, reason, send })
    }
}

/// Invites a contact into a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInviteRequestIq {
    header: IqHeader,
    invite: Invite,
}

impl GroupInviteRequestIq {
    pub fn new(group: &GroupChat, invitee: &ContactJid) -> Self {
        Self {
            header: IqHeader::new(IqType::Set, group.destination()),
            invite: Invite::new(invitee.bare().clone()),
        }
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.invite.reason = Some(reason.into());
    }

    /// Ask the group to deliver its own invitation message to the invitee.
    pub fn set_let_group_send_invite_message(&mut self, send: bool) {
        self.invite.send = send;
    }

    pub fn invite(&self) -> &Invite {
        &self.invite
    }
}

impl IqRequest for GroupInviteRequestIq {
    const ELEMENT: &'static str = "invite";
    const NAMESPACE: &'static str = ns::GROUPS_INVITE;

    fn header(&self) -> &IqHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut IqHeader {
        &mut self.header
    }

    fn write_child(&self, xml: &mut XmlBuilder) {
        self.invite.write_children(xml);
    }
}

/// Invitation carried inside a chat message sent to the invitee.
///
/// ```xml
/// <invite xmlns='https://xabber.com/protocol/groups#invite' jid='group@domain'>
///   <reason>…</reason>
/// </invite>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteMessageExtension {
    pub group: BareJid,
    pub reason: Option<String>,
}

impl InviteMessageExtension {
    pub const ELEMENT: &'static str = "invite";
    pub const NAMESPACE: &'static str = ns::GROUPS_INVITE;

    pub fn new(group: &ContactJid, reason: Option<String>) -> Self {
        Self {
            group: group.bare().clone(),
            reason,
        }
    }

    pub(crate) fn parse(cursor: &mut XmlCursor<'_>) -> Result<Self, ParseError> {
        let group = match cursor.event() {
            XmlEvent::StartTag(tag) => parse_bare_jid(tag.required_attribute("jid")?)?,
            _ => return Err(ParseError::EmptyDocument),
        };
        let depth = cursor.depth();
        let mut reason = None;

        loop {
            cursor.next()?;
            let is_reason = match cursor.event() {
                XmlEvent::StartTag(tag) => tag.name() == "reason",
                XmlEvent::EndTag(_) if cursor.depth() == depth => break,
                XmlEvent::EndDocument => break,
                _ => continue,
            };
            if is_reason {
                reason = Some(cursor.read_text()?);
            } else {
                cursor.skip_element()?;
            }
        }

        Ok(Self { group, reason })
    }
}

impl ExtensionElement for InviteMessageExtension {
    fn element_name(&self) -> &'static str {
        Self::ELEMENT
    }

    fn namespace(&self) -> &'static str {
        Self::NAMESPACE
    }

    fn write_xml(&self, xml: &mut XmlBuilder) {
        xml.open_element(Self::ELEMENT)
            .xmlns(Self::NAMESPACE)
            .attribute("jid", self.group.as_str())
            .opt_element("reason", self.reason.as_deref())
            .close_element();
    }
}

/// Lists the invitations a group still has outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInviteListQueryIq {
    header: IqHeader,
}

impl GroupInviteListQueryIq {
    pub fn new(group: &GroupChat) -> Self {
        Self {
            header: IqHeader::new(IqType::Get, group.destination()),
        }
    }
}

impl IqRequest for GroupInviteListQueryIq {
    const ELEMENT: &'static str = "query";
    const NAMESPACE: &'static str = ns::GROUPS_INVITE;

    fn header(&self) -> &IqHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut IqHeader {
        &mut self.header
    }

    fn write_child(&self, _xml: &mut XmlBuilder) {}
}

/// Pending invitations: `<query xmlns='…#invite'><user jid='…'/>…</query>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InviteList {
    pub invited: Vec<BareJid>,
}

impl InviteList {
    pub(crate) fn parse(cursor: &mut XmlCursor<'_>) -> Result<Self, ParseError> {
        let depth = cursor.depth();
        let mut invited = Vec::new();

        loop {
            cursor.next()?;
            let user = match cursor.event() {
                XmlEvent::StartTag(tag) if tag.name() == "user" => {
                    Some(parse_bare_jid(tag.required_attribute("jid")?)?)
                }
                XmlEvent::StartTag(_) => None,
                XmlEvent::EndTag(_) if cursor.depth() == depth => break,
                XmlEvent::EndDocument => break,
                _ => continue,
            };
            invited.extend(user);
            cursor.skip_element()?;
        }

        Ok(Self { invited })
    }
}

/// Withdraws invitations for the given contacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInviteRevokeIq {
    header: IqHeader,
    jids: Vec<BareJid>,
}

impl GroupInviteRevokeIq {
    pub fn new(group: &GroupChat, jids: impl IntoIterator<Item = BareJid>) -> Self {
        Self {
            header: IqHeader::new(IqType::Set, group.destination()),
            jids: jids.into_iter().collect(),
        }
    }

    pub fn jids(&self) -> &[BareJid] {
        &self.jids
    }
}

impl IqRequest for GroupInviteRevokeIq {
    const ELEMENT: &'static str = "revoke";
    const NAMESPACE: &'static str = ns::GROUPS_INVITE;

    fn header(&self) -> &IqHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut IqHeader {
        &mut self.header
    }

    fn write_child(&self, xml: &mut XmlBuilder) {
        for jid in &self.jids {
            xml.element("jid", jid.as_str());
        }
    }
}

fn parse_bare_jid(value: &str) -> Result<BareJid, ParseError> {
    value.parse::<BareJid>().map_err(|e| ParseError::InvalidJid {
        value: value.to_string(),
        message: e.to_string(),
    })
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ParseError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ParseError::InvalidValue {
            field: field.to_string(),
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use xabber_core::AccountJid;

    fn bare_group() -> GroupChat {
        GroupChat::new(
            "me@server.domain".parse::<AccountJid>().unwrap(),
            "localpart@group.domain".parse::<ContactJid>().unwrap(),
        )
    }

    fn parse_invite(xml: &str) -> Result<Invite, ParseError> {
        let mut cursor = XmlCursor::new(xml).unwrap();
        Invite::parse(&mut cursor)
    }

    #[test]
    fn invite_without_full_jid_goes_to_bare_group() {
        let invitee = "alice@server.domain".parse::<ContactJid>().unwrap();
        let mut iq = GroupInviteRequestIq::new(&bare_group(), &invitee);
        iq.set_id("i1");
        assert_eq!(
            iq.header().to.as_ref().map(ToString::to_string).as_deref(),
            Some("localpart@group.domain")
        );
        assert_eq!(
            iq.to_xml(),
            "<iq to='localpart@group.domain' id='i1' type='set'>\
             <invite xmlns='https://xabber.com/protocol/groups#invite'>\
             <jid>alice@server.domain</jid><send>false</send></invite></iq>"
        );
    }

    #[test]
    fn invite_payload_requires_jid() {
        assert_matches!(
            parse_invite("<invite xmlns='https://xabber.com/protocol/groups#invite'><send>true</send></invite>"),
            Err(ParseError::MissingChild { child, .. }) if child == "jid"
        );
    }

    #[test]
    fn invite_payload_rejects_unknown_send_value() {
        assert_matches!(
            parse_invite("<invite xmlns='https://xabber.com/protocol/groups#invite'><jid>a@b</jid><send>maybe</send></invite>"),
            Err(ParseError::InvalidValue { value, .. }) if value == "maybe"
        );
    }

    #[test]
    fn invite_payload_defaults_send_to_false() {
        let invite =
            parse_invite("<invite xmlns='https://xabber.com/protocol/groups#invite'><jid>a@b</jid></invite>")
                .unwrap();
        assert!(!invite.send);
        assert!(invite.reason.is_none());
    }

    #[test]
    fn extension_without_reason_is_self_closing() {
        let group = "localpart@group.domain".parse::<ContactJid>().unwrap();
        assert_eq!(
            InviteMessageExtension::new(&group, None).to_xml(),
            "<invite xmlns='https://xabber.com/protocol/groups#invite' jid='localpart@group.domain'/>"
        );
    }

    #[test]
    fn revoke_lists_each_jid() {
        let jids = ["a@server.domain", "b@server.domain"]
            .into_iter()
            .map(|s| s.parse::<BareJid>().unwrap());
        let mut iq = GroupInviteRevokeIq::new(&bare_group(), jids);
        iq.set_id("rv");
        assert_eq!(
            iq.to_xml(),
            "<iq to='localpart@group.domain' id='rv' type='set'>\
             <revoke xmlns='https://xabber.com/protocol/groups#invite'>\
             <jid>a@server.domain</jid><jid>b@server.domain</jid></revoke></iq>"
        );
    }

    #[test]
    fn invite_list_collects_user_jids() {
        let xml = "<query xmlns='https://xabber.com/protocol/groups#invite'>\
            <user jid='a@server.domain'/><user jid='b@server.domain'><note/></user></query>";
        let mut cursor = XmlCursor::new(xml).unwrap();
        let list = InviteList::parse(&mut cursor).unwrap();
        let jids: Vec<_> = list.invited.iter().map(|j| j.as_str()).collect();
        assert_eq!(jids, ["a@server.domain", "b@server.domain"]);
    }
}
