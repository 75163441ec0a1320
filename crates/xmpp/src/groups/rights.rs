use xabber_core::{GroupChat, GroupMember};

use crate::error::ParseError;
use crate::forms::{self, DataForm};
use crate::ns;
use crate::stanza::{IqHeader, IqRequest, IqType};
use crate::xml::{XmlBuilder, XmlCursor};

/// Form field naming the member a rights form describes.
pub const USER_ID_FIELD: &str = "user-id";

/// Requests the rights form of a single member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMemberRightsQueryIq {
    header: IqHeader,
    member_id: String,
}

impl GroupMemberRightsQueryIq {
    pub fn new(group: &GroupChat, member: &GroupMember) -> Self {
        Self {
            header: IqHeader::new(IqType::Get, group.destination()),
            member_id: member.id().to_string(),
        }
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }
}

impl IqRequest for GroupMemberRightsQueryIq {
    const ELEMENT: &'static str = "query";
    const NAMESPACE: &'static str = ns::GROUPS_RIGHTS;

    fn header(&self) -> &IqHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut IqHeader {
        &mut self.header
    }

    fn write_child(&self, xml: &mut XmlBuilder) {
        xml.open_element("user")
            .xmlns(ns::GROUPS)
            .attribute("id", &self.member_id)
            .close_element();
    }
}

/// A member's rights form as returned by the group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMemberRightsResult {
    pub form: Option<DataForm>,
}

impl GroupMemberRightsResult {
    pub(crate) fn parse(cursor: &mut XmlCursor<'_>) -> Result<Self, ParseError> {
        Ok(Self {
            form: forms::scan_for_form(cursor)?,
        })
    }

    pub fn member_id(&self) -> Option<&str> {
        self.form
            .as_ref()?
            .field(USER_ID_FIELD)?
            .first_value()
    }

    /// Whether this form describes `member_id`. Replies for other members
    /// can arrive on the same account and must be ignored.
    pub fn is_for_member(&self, member_id: &str) -> bool {
        self.member_id() == Some(member_id)
    }
}

/// Submits a member's changed rights, normally built by
/// [`FormEdit::submission`](crate::forms::FormEdit::submission).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRequestMemberRightsChangeIq {
    header: IqHeader,
    form: DataForm,
}

impl GroupRequestMemberRightsChangeIq {
    pub fn new(group: &GroupChat, form: DataForm) -> Self {
        Self {
            header: IqHeader::new(IqType::Set, group.destination()),
            form,
        }
    }

    pub fn form(&self) -> &DataForm {
        &self.form
    }
}

impl IqRequest for GroupRequestMemberRightsChangeIq {
    const ELEMENT: &'static str = "query";
    const NAMESPACE: &'static str = ns::GROUPS_RIGHTS;

    fn header(&self) -> &IqHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut IqHeader {
        &mut self.header
    }

    fn write_child(&self, xml: &mut XmlBuilder) {
        xml.append_extension(&self.form);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xabber_core::{AccountJid, ContactJid};

    fn group() -> GroupChat {
        GroupChat::new(
            "me@server.domain".parse::<AccountJid>().unwrap(),
            "localpart@group.domain".parse::<ContactJid>().unwrap(),
        )
        .with_full_jid("localpart@group.domain/resource".parse().unwrap())
    }

    #[test]
    fn query_names_the_member() {
        let member = GroupMember::new("x7kq2").unwrap();
        let mut iq = GroupMemberRightsQueryIq::new(&group(), &member);
        iq.set_id("q1");
        assert_eq!(
            iq.to_xml(),
            "<iq to='localpart@group.domain/resource' id='q1' type='get'>\
             <query xmlns='https://xabber.com/protocol/groups#rights'>\
             <user xmlns='https://xabber.com/protocol/groups' id='x7kq2'/>\
             </query></iq>"
        );
    }

    #[test]
    fn result_reports_the_member_it_describes() {
        let xml = "<query xmlns='https://xabber.com/protocol/groups#rights'>\
            <x xmlns='jabber:x:data' type='form'>\
            <field var='user-id' type='hidden'><value>x7kq2</value></field>\
            </x></query>";
        let mut cursor = XmlCursor::new(xml).unwrap();
        let result = GroupMemberRightsResult::parse(&mut cursor).unwrap();
        assert_eq!(result.member_id(), Some("x7kq2"));
        assert!(result.is_for_member("x7kq2"));
        assert!(!result.is_for_member("other"));
    }

    #[test]
    fn absent_form_matches_no_member() {
        let result = GroupMemberRightsResult { form: None };
        assert_eq!(result.member_id(), None);
        assert!(!result.is_for_member("x7kq2"));
    }
}
