//! Namespaces used by the group-chat protocol layer.

/// Xabber group chats, base namespace.
pub const GROUPS: &str = "https://xabber.com/protocol/groups";

/// Group invitations.
pub const GROUPS_INVITE: &str = "https://xabber.com/protocol/groups#invite";

/// Group block lists.
pub const GROUPS_BLOCK: &str = "https://xabber.com/protocol/groups#block";

/// Per-member rights and restrictions.
pub const GROUPS_RIGHTS: &str = "https://xabber.com/protocol/groups#rights";

/// Restrictions applied to new members by default.
pub const GROUPS_DEFAULT_RIGHTS: &str = "https://xabber.com/protocol/groups#default-rights";

/// XEP-0004: Data Forms
pub const DATA_FORMS: &str = "jabber:x:data";

/// RFC 6120 stanza error conditions.
pub const STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";
