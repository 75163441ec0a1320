//! Typed IQs of the Xabber group-chat protocol.

mod block;
mod invite;
mod pin;
mod restrictions;
mod rights;

pub use block::{BlockList, BlockedItem, BlockedKind, GroupBlockListQueryIq, GroupUnblockIq};
pub use invite::{
    GroupInviteListQueryIq, GroupInviteRequestIq, GroupInviteRevokeIq, Invite, InviteList,
    InviteMessageExtension,
};
pub use pin::{GroupPinMessageIq, PinnedMessage};
pub use restrictions::{
    GroupDefaultRestrictionsQueryIq, GroupDefaultRestrictionsResult, GroupSetDefaultRestrictionsIq,
};
pub use rights::{
    GroupMemberRightsQueryIq, GroupMemberRightsResult, GroupRequestMemberRightsChangeIq,
    USER_ID_FIELD,
};

/// Decoded child of an incoming group-chat IQ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupPayload {
    DefaultRestrictions(GroupDefaultRestrictionsResult),
    MemberRights(GroupMemberRightsResult),
    Invite(Invite),
    InviteList(InviteList),
    PinnedMessage(PinnedMessage),
    BlockList(BlockList),
}

/// Decoded extension element of an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupExtension {
    Invite(InviteMessageExtension),
}
