//! Wire format of the group-chat stanzas, checked byte for byte.

mod common;

use assert_matches::assert_matches;
use common::{bare_group, full_group, group_contact};
use xabber_core::ContactJid;
use xabber_xmpp::ns;
use xabber_xmpp::{
    parse_extension, ExtensionElement, GroupDefaultRestrictionsQueryIq, GroupExtension,
    GroupInviteListQueryIq, GroupInviteRequestIq, GroupInviteRevokeIq, GroupMemberRightsQueryIq,
    GroupPayload, GroupPinMessageIq, GroupRequestMemberRightsChangeIq,
    GroupSetDefaultRestrictionsIq, DataForm, FormType, IncomingIq, InviteMessageExtension,
    IqBody, IqRequest, IqType, ProviderRegistry,
};

fn base_invite() -> GroupInviteRequestIq {
    let invitee = "membertoinvite@server.domain"
        .parse::<ContactJid>()
        .expect("invitee jid");
    let mut iq = GroupInviteRequestIq::new(&full_group(), &invitee);
    iq.set_id("iqId");
    iq
}

#[test]
fn invite_request_namespace_and_element() {
    let iq = base_invite();
    assert_eq!(iq.namespace(), "https://xabber.com/protocol/groups#invite");
    assert_eq!(iq.element_name(), "invite");
}

#[test]
fn invite_request_default_does_not_ask_group_to_send() {
    assert_eq!(
        base_invite().to_xml(),
        "<iq to='localpart@group.domain/resource' id='iqId' type='set'>\
         <invite xmlns='https://xabber.com/protocol/groups#invite'>\
         <jid>membertoinvite@server.domain</jid>\
         <send>false</send>\
         </invite>\
         </iq>"
    );
}

#[test]
fn invite_request_send_flag_renders_literally() {
    let mut iq = base_invite();
    iq.set_let_group_send_invite_message(true);
    assert_eq!(
        iq.to_xml(),
        "<iq to='localpart@group.domain/resource' id='iqId' type='set'>\
         <invite xmlns='https://xabber.com/protocol/groups#invite'>\
         <jid>membertoinvite@server.domain</jid>\
         <send>true</send>\
         </invite>\
         </iq>"
    );

    iq.set_let_group_send_invite_message(false);
    assert_eq!(
        iq.to_xml(),
        "<iq to='localpart@group.domain/resource' id='iqId' type='set'>\
         <invite xmlns='https://xabber.com/protocol/groups#invite'>\
         <jid>membertoinvite@server.domain</jid>\
         <send>false</send>\
         </invite>\
         </iq>"
    );
}

#[test]
fn invite_request_reason_sits_between_jid_and_send() {
    let mut iq = base_invite();
    iq.set_reason("This is reason to get invite to group chat");
    assert_eq!(
        iq.to_xml(),
        "<iq to='localpart@group.domain/resource' id='iqId' type='set'>\
         <invite xmlns='https://xabber.com/protocol/groups#invite'>\
         <jid>membertoinvite@server.domain</jid>\
         <reason>This is reason to get invite to group chat</reason>\
         <send>false</send>\
         </invite>\
         </iq>"
    );

    let mut iq = base_invite();
    iq.set_reason("New reason!");
    iq.set_let_group_send_invite_message(true);
    assert_eq!(
        iq.to_xml(),
        "<iq to='localpart@group.domain/resource' id='iqId' type='set'>\
         <invite xmlns='https://xabber.com/protocol/groups#invite'>\
         <jid>membertoinvite@server.domain</jid>\
         <reason>New reason!</reason>\
         <send>true</send>\
         </invite>\
         </iq>"
    );
}

#[test]
fn invitee_localpart_is_normalized() {
    let invitee = "memberToInvite@server.domain"
        .parse::<ContactJid>()
        .expect("invitee jid");
    let iq = GroupInviteRequestIq::new(&full_group(), &invitee);
    assert!(iq.to_xml().contains("<jid>membertoinvite@server.domain</jid>"));
}

#[test]
fn invite_to_bare_group_uses_bare_address() {
    let invitee = "alice@server.domain".parse::<ContactJid>().expect("jid");
    let mut iq = GroupInviteRequestIq::new(&bare_group(), &invitee);
    iq.set_id("iqId");

    let to = iq.header().to.as_ref().expect("addressed").to_string();
    assert_eq!(to, "localpart@group.domain");
    assert!(iq.to_xml().starts_with("<iq to='localpart@group.domain' id='iqId' type='set'>"));
    assert!(iq.to_xml().contains("<send>false</send>"));
}

#[test]
fn invite_request_reason_then_send_keeps_child_order() {
    let mut iq = base_invite();
    iq.set_reason("x");
    iq.set_let_group_send_invite_message(true);
    let xml = iq.to_xml();

    let jid = xml.find("<jid>").expect("jid child");
    let reason = xml.find("<reason>x</reason>").expect("reason child");
    let send = xml.find("<send>true</send>").expect("send child");
    assert!(jid < reason && reason < send);
}

#[test]
fn invite_message_extension_reference() {
    let extension = InviteMessageExtension::new(&group_contact(), Some("Reason to invite".to_string()));
    assert_eq!(
        extension.to_xml(),
        "<invite xmlns='https://xabber.com/protocol/groups#invite' jid='localpart@group.domain'>\
         <reason>Reason to invite</reason>\
         </invite>"
    );
    assert_eq!(extension.namespace(), "https://xabber.com/protocol/groups#invite");
    assert_eq!(extension.element_name(), "invite");
}

#[test]
fn invite_message_extension_round_trips() {
    for reason in [None, Some("Reason to invite".to_string()), Some(String::new())] {
        let extension = InviteMessageExtension::new(&group_contact(), reason);
        let xml = extension.to_xml();
        let parsed = parse_extension(&xml, ProviderRegistry::global()).expect("parses");
        assert_eq!(parsed, Some(GroupExtension::Invite(extension.clone())));
        assert_eq!(extension.to_xml(), xml);
    }
}

#[test]
fn invite_payload_round_trips_through_the_registry() {
    for reason in [None, Some("Join us")] {
        for send in [false, true] {
            let mut iq = base_invite();
            if let Some(reason) = reason {
                iq.set_reason(reason);
            }
            iq.set_let_group_send_invite_message(send);

            let xml = iq.to_xml();
            let incoming = IncomingIq::parse(&xml, ProviderRegistry::global()).expect("parses");
            assert_eq!(incoming.header.id, "iqId");
            assert_eq!(incoming.header.iq_type, IqType::Set);
            assert_matches!(
                incoming.body,
                IqBody::Payload(GroupPayload::Invite(invite)) if &invite == iq.invite()
            );
        }
    }
}

#[test]
fn every_request_declares_its_element_and_namespace() {
    let group = full_group();
    let member = xabber_core::GroupMember::new("x7kq2").expect("member");
    let form = DataForm::new(FormType::Submit);

    let pin = GroupPinMessageIq::new(&group, "1");
    assert_eq!((pin.element_name(), pin.namespace()), ("update", ns::GROUPS));

    let query = GroupDefaultRestrictionsQueryIq::new(&group);
    assert_eq!((query.element_name(), query.namespace()), ("query", ns::GROUPS_DEFAULT_RIGHTS));
    assert_eq!(query.header().iq_type, IqType::Get);

    let set = GroupSetDefaultRestrictionsIq::new(&group, form.clone());
    assert_eq!((set.element_name(), set.namespace()), ("query", ns::GROUPS_DEFAULT_RIGHTS));
    assert_eq!(set.header().iq_type, IqType::Set);

    let rights = GroupMemberRightsQueryIq::new(&group, &member);
    assert_eq!((rights.element_name(), rights.namespace()), ("query", ns::GROUPS_RIGHTS));

    let change = GroupRequestMemberRightsChangeIq::new(&group, form);
    assert_eq!((change.element_name(), change.namespace()), ("query", ns::GROUPS_RIGHTS));
    assert_eq!(change.header().iq_type, IqType::Set);

    let list = GroupInviteListQueryIq::new(&group);
    assert_eq!((list.element_name(), list.namespace()), ("query", ns::GROUPS_INVITE));

    let revoke = GroupInviteRevokeIq::new(&group, Vec::new());
    assert_eq!((revoke.element_name(), revoke.namespace()), ("revoke", ns::GROUPS_INVITE));
}

#[test]
fn generated_ids_differ_between_requests() {
    let group = full_group();
    assert_ne!(
        GroupPinMessageIq::new(&group, "1").id(),
        GroupPinMessageIq::new(&group, "1").id()
    );
}

#[test]
fn serialization_is_stable() {
    let iq = base_invite();
    assert_eq!(iq.to_xml(), iq.to_xml());
    assert_eq!(iq.to_xml(), iq.clone().to_xml());
}
