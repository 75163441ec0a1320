//! Opaque identifiers handed to the protocol layer by the account, contact and
//! group domain model.

use std::fmt;
use std::str::FromStr;

use jid::{BareJid, FullJid, Jid};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum EntityError {
    #[error("invalid JID {input:?}: {message}")]
    InvalidJid { input: String, message: String },

    #[error("member id must not be empty")]
    EmptyMemberId,
}

fn parse_bare(input: &str) -> Result<BareJid, EntityError> {
    input.parse::<BareJid>().map_err(|e| EntityError::InvalidJid {
        input: input.to_string(),
        message: e.to_string(),
    })
}

/// The local account a request is issued from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountJid(BareJid);

impl AccountJid {
    pub fn new(jid: BareJid) -> Self {
        Self(jid)
    }

    pub fn bare(&self) -> &BareJid {
        &self.0
    }
}

impl FromStr for AccountJid {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_bare(s).map(Self)
    }
}

impl fmt::Display for AccountJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A roster contact, always addressed by its bare JID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContactJid(BareJid);

impl ContactJid {
    pub fn new(jid: BareJid) -> Self {
        Self(jid)
    }

    pub fn bare(&self) -> &BareJid {
        &self.0
    }
}

impl FromStr for ContactJid {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_bare(s).map(Self)
    }
}

impl fmt::Display for ContactJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A group chat as seen from one account.
///
/// `full_jid` is only known once the group has sent presence from a
/// resource; until then requests go to the bare contact JID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupChat {
    account: AccountJid,
    contact: ContactJid,
    full_jid: Option<FullJid>,
}

impl GroupChat {
    pub fn new(account: AccountJid, contact: ContactJid) -> Self {
        Self {
            account,
            contact,
            full_jid: None,
        }
    }

    pub fn with_full_jid(mut self, full_jid: FullJid) -> Self {
        self.full_jid = Some(full_jid);
        self
    }

    pub fn account(&self) -> &AccountJid {
        &self.account
    }

    pub fn contact(&self) -> &ContactJid {
        &self.contact
    }

    pub fn full_jid_if_possible(&self) -> Option<&FullJid> {
        self.full_jid.as_ref()
    }

    /// Address for group-targeted stanzas: the full JID when known, else the
    /// bare contact JID. Some servers only route to the full address.
    pub fn destination(&self) -> Jid {
        match &self.full_jid {
            Some(full) => Jid::from(full.clone()),
            None => Jid::from(self.contact.bare().clone()),
        }
    }
}

/// A member of a group, identified by the server-assigned member id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    id: String,
    jid: Option<BareJid>,
    nickname: Option<String>,
}

impl GroupMember {
    pub fn new(id: impl Into<String>) -> Result<Self, EntityError> {
        let id = id.into();
        if id.is_empty() {
            return Err(EntityError::EmptyMemberId);
        }
        Ok(Self {
            id,
            jid: None,
            nickname: None,
        })
    }

    pub fn with_jid(mut self, jid: BareJid) -> Self {
        self.jid = Some(jid);
        self
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn jid(&self) -> Option<&BareJid> {
        self.jid.as_ref()
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn group() -> GroupChat {
        GroupChat::new(
            "user@example.com".parse().unwrap(),
            "localpart@group.domain".parse().unwrap(),
        )
    }

    #[test]
    fn destination_falls_back_to_bare_contact() {
        let group = group();
        assert!(group.full_jid_if_possible().is_none());
        assert_eq!(group.destination().to_string(), "localpart@group.domain");
    }

    #[test]
    fn destination_prefers_full_jid() {
        let full: FullJid = "localpart@group.domain/resource".parse().unwrap();
        let group = group().with_full_jid(full);
        assert_eq!(
            group.destination().to_string(),
            "localpart@group.domain/resource"
        );
    }

    #[test]
    fn contact_rejects_invalid_jid() {
        let err = "@group.domain".parse::<ContactJid>().unwrap_err();
        assert_matches!(err, EntityError::InvalidJid { input, .. } if input == "@group.domain");
    }

    #[test]
    fn member_requires_id() {
        assert_eq!(GroupMember::new("").unwrap_err(), EntityError::EmptyMemberId);
        let member = GroupMember::new("m1").unwrap().with_nickname("alice");
        assert_eq!(member.id(), "m1");
        assert_eq!(member.nickname(), Some("alice"));
        assert!(member.jid().is_none());
    }
}
