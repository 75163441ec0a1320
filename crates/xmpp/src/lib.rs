pub mod correlation;
pub mod error;
pub mod forms;
pub mod groups;
pub mod manager;
pub mod ns;
pub mod provider;
pub mod session;
pub mod stanza;
pub mod xml;

pub use correlation::{
    IqReply, ListenerId, ListenerRegistry, PendingRequests, RequestContext, Resolution,
    Subscription,
};
pub use error::{ConnectionError, FormError, ParseError, RequestError};
pub use forms::{DataForm, FieldType, FormEdit, FormField, FormOption, FormType, Pick};
pub use groups::{
    BlockList, BlockedItem, BlockedKind, GroupBlockListQueryIq, GroupUnblockIq,
    GroupDefaultRestrictionsQueryIq, GroupDefaultRestrictionsResult, GroupExtension,
    GroupInviteListQueryIq, GroupInviteRequestIq, GroupInviteRevokeIq, GroupMemberRightsQueryIq,
    GroupMemberRightsResult, GroupPayload, GroupPinMessageIq, GroupRequestMemberRightsChangeIq,
    GroupSetDefaultRestrictionsIq, Invite, InviteList, InviteMessageExtension, PinnedMessage,
};
pub use manager::{GroupchatEvent, GroupchatManager, UnblockOutcome};
pub use provider::{parse_extension, IncomingIq, IqBody, ProviderKey, ProviderRegistry};
pub use session::{Dispatch, GroupchatSession, IqTransport};
pub use stanza::{ErrorType, ExtensionElement, IqHeader, IqRequest, IqType, StanzaError};
pub use xml::{XmlBuilder, XmlCursor, XmlEvent};
