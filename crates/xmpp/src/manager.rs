use std::sync::Arc;

use dashmap::DashSet;
use jid::{BareJid, FullJid, Jid};
use tracing::{debug, info, instrument, warn};
use xabber_core::config::{Config, GroupchatConfig};
use xabber_core::{AccountJid, ContactJid, GroupChat, GroupMember};

use crate::correlation::{IqReply, ListenerRegistry, RequestContext};
use crate::error::{ParseError, RequestError};
use crate::forms::{DataForm, FormEdit};
use crate::groups::{
    BlockedItem, GroupBlockListQueryIq, GroupDefaultRestrictionsQueryIq, GroupInviteListQueryIq,
    GroupInviteRequestIq, GroupInviteRevokeIq, GroupMemberRightsQueryIq, GroupPayload,
    GroupPinMessageIq, GroupRequestMemberRightsChangeIq, GroupSetDefaultRestrictionsIq,
    GroupUnblockIq,
};
use crate::provider::{IncomingIq, IqBody};
use crate::session::{Dispatch, GroupchatSession, IqTransport};
use crate::stanza::{IqRequest, IqType};
use crate::xml::XmlBuilder;

/// Published to listeners attached through [`GroupchatManager::listeners`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupchatEvent {
    DefaultRestrictionsReceived {
        context: RequestContext,
        form: Option<DataForm>,
    },
    MemberRightsFormReceived {
        context: RequestContext,
        member_id: String,
        form: DataForm,
    },
    InvitesReceived {
        context: RequestContext,
        invited: Vec<BareJid>,
    },
    InvitesRevoked {
        context: RequestContext,
        jids: Vec<BareJid>,
    },
    PinnedMessageChanged {
        context: RequestContext,
        message_id: Option<String>,
    },
    BlockListReceived {
        context: RequestContext,
        items: Vec<BlockedItem>,
    },
    BlockedItemsUnblocked {
        context: RequestContext,
        unblocked: Vec<BlockedItem>,
        failed: Vec<BlockedItem>,
    },
    RequestFailed {
        context: RequestContext,
        operation: &'static str,
        reason: String,
    },
}

/// Result of [`GroupchatManager::unblock`]. Each entry is unblocked by its
/// own request, so some may succeed while others fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnblockOutcome {
    pub unblocked: Vec<BlockedItem>,
    pub failed: Vec<BlockedItem>,
}

impl UnblockOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Group-chat operations for one account.
///
/// Every operation returns its outcome to the caller and also publishes it
/// as a [`GroupchatEvent`].
pub struct GroupchatManager<T> {
    session: Arc<GroupchatSession<T>>,
    account: AccountJid,
    own_jid: Option<FullJid>,
    listeners: ListenerRegistry<GroupchatEvent>,
    /// Groups this account has addressed or watches; pushes from anyone
    /// else are not acted on.
    groups: DashSet<BareJid>,
}

impl<T: IqTransport> GroupchatManager<T> {
    pub fn new(
        session: Arc<GroupchatSession<T>>,
        account: AccountJid,
        config: &GroupchatConfig,
    ) -> Self {
        Self {
            session,
            account,
            own_jid: None,
            listeners: ListenerRegistry::new(config.listener_capacity),
            groups: DashSet::new(),
        }
    }

    /// Manager for the configured account. The own full JID is set when a
    /// resource is configured.
    pub fn from_config(
        session: Arc<GroupchatSession<T>>,
        config: &Config,
    ) -> xabber_core::Result<Self> {
        let mut manager = Self::new(session, config.account.account_jid()?, &config.groupchat);
        manager.own_jid = config.account.own_jid()?;
        Ok(manager)
    }

    /// Our bound resource, used as `from` where the group expects one.
    pub fn with_own_jid(mut self, jid: FullJid) -> Self {
        self.own_jid = Some(jid);
        self
    }

    pub fn account(&self) -> &AccountJid {
        &self.account
    }

    pub fn own_jid(&self) -> Option<&FullJid> {
        self.own_jid.as_ref()
    }

    /// Accept pushes from `group` before any request has been sent to it.
    pub fn watch_group(&self, group: &GroupChat) {
        self.groups.insert(group.contact().bare().clone());
    }

    pub fn listeners(&self) -> &ListenerRegistry<GroupchatEvent> {
        &self.listeners
    }

    #[instrument(skip(self, group), fields(group = %group.contact()))]
    pub async fn pin_message(&self, group: &GroupChat, message_id: &str) -> Result<(), RequestError> {
        let mut request = GroupPinMessageIq::new(group, message_id);
        if let Some(own_jid) = &self.own_jid {
            request = request.with_from(own_jid.clone());
        }
        self.send_pin(group, request).await
    }

    #[instrument(skip(self, group), fields(group = %group.contact()))]
    pub async fn unpin_message(&self, group: &GroupChat) -> Result<(), RequestError> {
        let mut request = GroupPinMessageIq::unpin(group);
        if let Some(own_jid) = &self.own_jid {
            request = request.with_from(own_jid.clone());
        }
        self.send_pin(group, request).await
    }

    async fn send_pin(&self, group: &GroupChat, request: GroupPinMessageIq) -> Result<(), RequestError> {
        let message_id = Some(request.message_id().to_string()).filter(|id| !id.is_empty());
        let reply = self.request(group, &request, "pin_message").await?;
        self.publish(GroupchatEvent::PinnedMessageChanged {
            context: reply.context,
            message_id,
        });
        Ok(())
    }

    /// Fetch the restrictions new members get. `None` means the group sent
    /// no form at all.
    #[instrument(skip(self, group), fields(group = %group.contact()))]
    pub async fn request_default_restrictions(
        &self,
        group: &GroupChat,
    ) -> Result<Option<DataForm>, RequestError> {
        let request = GroupDefaultRestrictionsQueryIq::new(group);
        let reply = self
            .request(group, &request, "request_default_restrictions")
            .await?;

        let form = match reply.iq.body {
            IqBody::Payload(GroupPayload::DefaultRestrictions(result)) => result.form,
            IqBody::Empty => None,
            _ => return Err(RequestError::UnexpectedPayload { id: reply.iq.header.id }),
        };
        if form.is_none() {
            debug!("Default restrictions reply carried no form");
        }
        self.publish(GroupchatEvent::DefaultRestrictionsReceived {
            context: reply.context,
            form: form.clone(),
        });
        Ok(form)
    }

    #[instrument(skip(self, group, edit), fields(group = %group.contact(), changes = edit.change_count()))]
    pub async fn set_default_restrictions(
        &self,
        group: &GroupChat,
        edit: &FormEdit,
    ) -> Result<(), RequestError> {
        let request = GroupSetDefaultRestrictionsIq::new(group, edit.submission());
        self.request(group, &request, "set_default_restrictions")
            .await?;
        info!("Default restrictions updated");
        Ok(())
    }

    /// Fetch a member's rights form. A form describing a different member is
    /// rejected as an unexpected payload.
    #[instrument(skip(self, group, member), fields(group = %group.contact(), member = member.id()))]
    pub async fn request_member_rights_form(
        &self,
        group: &GroupChat,
        member: &GroupMember,
    ) -> Result<Option<DataForm>, RequestError> {
        let request = GroupMemberRightsQueryIq::new(group, member);
        let reply = self
            .request(group, &request, "request_member_rights_form")
            .await?;

        let result = match reply.iq.body {
            IqBody::Payload(GroupPayload::MemberRights(result)) => result,
            IqBody::Empty => return Ok(None),
            _ => return Err(RequestError::UnexpectedPayload { id: reply.iq.header.id }),
        };
        if result.form.is_none() {
            return Ok(None);
        }
        if !result.is_for_member(member.id()) {
            warn!(received = ?result.member_id(), "Rights form is for another member, ignoring");
            return Err(RequestError::UnexpectedPayload { id: reply.iq.header.id });
        }

        let form = result.form;
        if let Some(form) = &form {
            self.publish(GroupchatEvent::MemberRightsFormReceived {
                context: reply.context,
                member_id: member.id().to_string(),
                form: form.clone(),
            });
        }
        Ok(form)
    }

    /// Submit edited member rights. Nothing is sent when the edit has no net
    /// changes.
    #[instrument(skip(self, group, edit), fields(group = %group.contact(), changes = edit.change_count()))]
    pub async fn change_member_rights(
        &self,
        group: &GroupChat,
        edit: &FormEdit,
    ) -> Result<bool, RequestError> {
        if edit.change_count() == 0 {
            debug!("No rights changed, nothing to submit");
            return Ok(false);
        }
        let request = GroupRequestMemberRightsChangeIq::new(group, edit.submission());
        self.request(group, &request, "change_member_rights").await?;
        info!("Member rights updated");
        Ok(true)
    }

    #[instrument(skip(self, group, reason), fields(group = %group.contact(), invitee = %invitee))]
    pub async fn invite(
        &self,
        group: &GroupChat,
        invitee: &ContactJid,
        reason: Option<String>,
        let_group_send_message: bool,
    ) -> Result<(), RequestError> {
        let mut request = GroupInviteRequestIq::new(group, invitee);
        if let Some(reason) = reason {
            request.set_reason(reason);
        }
        request.set_let_group_send_invite_message(let_group_send_message);
        self.request(group, &request, "invite").await?;
        info!("Invitation sent");
        Ok(())
    }

    #[instrument(skip(self, group), fields(group = %group.contact()))]
    pub async fn request_invites(&self, group: &GroupChat) -> Result<Vec<BareJid>, RequestError> {
        let request = GroupInviteListQueryIq::new(group);
        let reply = self.request(group, &request, "request_invites").await?;

        let invited = match reply.iq.body {
            IqBody::Payload(GroupPayload::InviteList(list)) => list.invited,
            IqBody::Empty => Vec::new(),
            _ => return Err(RequestError::UnexpectedPayload { id: reply.iq.header.id }),
        };
        self.publish(GroupchatEvent::InvitesReceived {
            context: reply.context,
            invited: invited.clone(),
        });
        Ok(invited)
    }

    #[instrument(skip(self, group, jids), fields(group = %group.contact(), count = jids.len()))]
    pub async fn revoke_invites(
        &self,
        group: &GroupChat,
        jids: Vec<BareJid>,
    ) -> Result<(), RequestError> {
        let request = GroupInviteRevokeIq::new(group, jids);
        let reply = self.request(group, &request, "revoke_invites").await?;
        self.publish(GroupchatEvent::InvitesRevoked {
            context: reply.context,
            jids: request.jids().to_vec(),
        });
        Ok(())
    }

    #[instrument(skip(self, group), fields(group = %group.contact()))]
    pub async fn request_block_list(
        &self,
        group: &GroupChat,
    ) -> Result<Vec<BlockedItem>, RequestError> {
        let request = GroupBlockListQueryIq::new(group);
        let reply = self.request(group, &request, "request_block_list").await?;

        let items = match reply.iq.body {
            IqBody::Payload(GroupPayload::BlockList(list)) => list.items,
            IqBody::Empty => Vec::new(),
            _ => return Err(RequestError::UnexpectedPayload { id: reply.iq.header.id }),
        };
        self.publish(GroupchatEvent::BlockListReceived {
            context: reply.context,
            items: items.clone(),
        });
        Ok(items)
    }

    /// Lift the block on each entry with its own request and report which
    /// ones the group accepted.
    #[instrument(skip(self, group, items), fields(group = %group.contact(), count = items.len()))]
    pub async fn unblock(&self, group: &GroupChat, items: Vec<BlockedItem>) -> UnblockOutcome {
        let context = self.context(group);
        let mut outcome = UnblockOutcome::default();

        for item in items {
            let request = GroupUnblockIq::new(group, [item.clone()]);
            match self.session.send_and_await(&request, context.clone()).await {
                Ok(_) => outcome.unblocked.push(item),
                Err(error) => {
                    warn!(%item, %error, "Unblock failed");
                    outcome.failed.push(item);
                }
            }
        }

        info!(
            unblocked = outcome.unblocked.len(),
            failed = outcome.failed.len(),
            "Unblock finished"
        );
        self.publish(GroupchatEvent::BlockedItemsUnblocked {
            context,
            unblocked: outcome.unblocked.clone(),
            failed: outcome.failed.clone(),
        });
        outcome
    }

    /// Route an incoming IQ. Replies go to their waiting request; a pinned
    /// message push from a known group is acknowledged and published.
    pub async fn handle_incoming(&self, raw: &[u8]) -> Result<Dispatch, ParseError> {
        let dispatch = self.session.handle_incoming(raw)?;
        let Dispatch::Unsolicited(iq) = &dispatch else {
            return Ok(dispatch);
        };

        if let IqBody::Payload(GroupPayload::PinnedMessage(pinned)) = &iq.body {
            let Some(group) = iq.header.from.as_ref().map(Jid::to_bare) else {
                debug!("Pinned message push without sender, ignoring");
                return Ok(dispatch);
            };
            if !self.groups.contains(&group) {
                warn!(from = %group, "Pinned message push from unknown group, ignoring");
                return Ok(dispatch);
            }
            self.acknowledge(iq).await;
            self.publish(GroupchatEvent::PinnedMessageChanged {
                context: RequestContext {
                    account: self.account.clone(),
                    group: ContactJid::new(group),
                },
                message_id: pinned.message_id.clone(),
            });
        } else {
            debug!(id = %iq.header.id, "Unsolicited IQ not handled here");
        }
        Ok(dispatch)
    }

    async fn acknowledge(&self, iq: &IncomingIq) {
        if iq.header.iq_type != IqType::Set {
            return;
        }
        let to = iq.header.from.as_ref().map(ToString::to_string);
        let mut xml = XmlBuilder::new();
        xml.open_element("iq")
            .opt_attribute("to", to.as_deref())
            .attribute("id", &iq.header.id)
            .attribute("type", IqType::Result.as_str());
        if let Err(e) = self.session.transport().send(xml.finish().into_bytes()).await {
            warn!(id = %iq.header.id, error = %e, "Failed to acknowledge push");
        }
    }

    async fn request<R: IqRequest>(
        &self,
        group: &GroupChat,
        request: &R,
        operation: &'static str,
    ) -> Result<IqReply, RequestError> {
        let context = self.context(group);
        match self.session.send_and_await(request, context.clone()).await {
            Ok(reply) => Ok(reply),
            Err(error) => {
                warn!(operation, error = %error, "Group request failed");
                self.publish(GroupchatEvent::RequestFailed {
                    context,
                    operation,
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }

    fn context(&self, group: &GroupChat) -> RequestContext {
        self.groups.insert(group.contact().bare().clone());
        RequestContext {
            account: group.account().clone(),
            group: group.contact().clone(),
        }
    }

    fn publish(&self, event: GroupchatEvent) {
        self.listeners.dispatch(event);
    }
}
