//! Matching replies to in-flight requests, and fan-out of events to
//! attached listeners.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jid::Jid;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, warn};
use xabber_core::{AccountJid, ContactJid};

use crate::error::{ParseError, RequestError};
use crate::provider::IncomingIq;
use crate::stanza::IqHeader;

/// Who a request was made for, handed back with its reply so the receiver
/// can ignore replies that do not concern it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub account: AccountJid,
    pub group: ContactJid,
}

/// A reply matched to its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IqReply {
    pub context: RequestContext,
    pub iq: IncomingIq,
}

/// What a waiting requester receives: its reply, or the reason the reply
/// could not be decoded.
pub type ReplyOutcome = Result<IqReply, ParseError>;

#[derive(Debug)]
struct PendingRequest {
    to: Option<Jid>,
    context: RequestContext,
    reply: oneshot::Sender<ReplyOutcome>,
}

/// Outcome of offering an incoming IQ to [`PendingRequests::resolve`].
#[derive(Debug)]
pub enum Resolution {
    /// Handed to the waiting requester.
    Delivered,
    /// A `get` or `set` addressed to us; not a reply at all.
    NotReply(IncomingIq),
    /// A reply nobody is waiting for, or one from the wrong sender.
    Dropped,
}

/// In-flight requests keyed by stanza id. Each reply is delivered at most
/// once.
#[derive(Debug, Default)]
pub struct PendingRequests {
    pending: DashMap<String, PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, context), fields(group = %context.group))]
    pub fn register(
        &self,
        id: &str,
        to: Option<Jid>,
        context: RequestContext,
    ) -> Result<oneshot::Receiver<ReplyOutcome>, RequestError> {
        match self.pending.entry(id.to_string()) {
            Entry::Occupied(_) => Err(RequestError::DuplicateId(id.to_string())),
            Entry::Vacant(slot) => {
                let (reply, receiver) = oneshot::channel();
                slot.insert(PendingRequest { to, context, reply });
                debug!("Registered pending request");
                Ok(receiver)
            }
        }
    }

    #[instrument(skip(self, iq), fields(id = %iq.header.id, iq_type = %iq.header.iq_type))]
    pub fn resolve(&self, iq: IncomingIq) -> Resolution {
        if !iq.is_reply() {
            return Resolution::NotReply(iq);
        }
        let Some(pending) = self.take(&iq.header) else {
            return Resolution::Dropped;
        };
        let reply = IqReply {
            context: pending.context,
            iq,
        };
        deliver(pending.reply, Ok(reply))
    }

    /// Fail the request a reply was meant for when its payload could not be
    /// decoded. Requests (`get`/`set`) are never matched.
    #[instrument(skip(self, header), fields(id = %header.id, iq_type = %header.iq_type))]
    pub fn reject(&self, header: &IqHeader, error: ParseError) -> Resolution {
        if header.iq_type.is_request() {
            return Resolution::Dropped;
        }
        let Some(pending) = self.take(header) else {
            return Resolution::Dropped;
        };
        warn!(%error, "Reply payload could not be decoded");
        deliver(pending.reply, Err(error))
    }

    fn take(&self, header: &IqHeader) -> Option<PendingRequest> {
        let taken = self.pending.remove_if(&header.id, |_, pending| {
            sender_matches(pending.to.as_ref(), header.from.as_ref())
        });
        if taken.is_none() {
            if self.pending.contains_key(&header.id) {
                warn!(from = ?header.from, "Dropping reply from unexpected sender");
            } else {
                debug!("Dropping reply with no pending request");
            }
        }
        taken.map(|(_, pending)| pending)
    }

    /// Forget a request, e.g. after its timeout. A reply arriving later is
    /// dropped.
    pub fn cancel(&self, id: &str) -> bool {
        self.pending.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn deliver(reply: oneshot::Sender<ReplyOutcome>, outcome: ReplyOutcome) -> Resolution {
    match reply.send(outcome) {
        Ok(()) => {
            debug!("Reply delivered");
            Resolution::Delivered
        }
        Err(_) => {
            debug!("Requester went away, dropping late reply");
            Resolution::Dropped
        }
    }
}

/// A reply must come from the entity the request went to, or from that
/// entity's bare JID. Replies without `from` come from our own server.
fn sender_matches(to: Option<&Jid>, from: Option<&Jid>) -> bool {
    match (to, from) {
        (_, None) | (None, _) => true,
        (Some(to), Some(from)) => from == to || from.to_bare() == to.to_bare(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Receiving end of [`ListenerRegistry::attach`]. Dropping it detaches.
#[derive(Debug)]
pub struct Subscription<E> {
    id: ListenerId,
    receiver: mpsc::Receiver<E>,
}

impl<E> Subscription<E> {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<E> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<E> {
        self.receiver.try_recv().ok()
    }
}

/// Fan-out of events to any number of listeners.
///
/// Listeners consume their [`Subscription`] on their own task, so dispatch
/// never runs listener code. Events for detached listeners are dropped.
#[derive(Debug)]
pub struct ListenerRegistry<E> {
    next_id: AtomicU64,
    capacity: usize,
    listeners: DashMap<ListenerId, mpsc::Sender<E>>,
}

impl<E: Clone> ListenerRegistry<E> {
    /// `capacity` bounds each listener's queue; events for a full queue are
    /// dropped.
    pub fn new(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            listeners: DashMap::new(),
        }
    }

    pub fn attach(&self) -> Subscription<E> {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.listeners.insert(id, sender);
        debug!(listener = id.0, "Listener attached");
        Subscription { id, receiver }
    }

    pub fn detach(&self, id: ListenerId) -> bool {
        let removed = self.listeners.remove(&id).is_some();
        if removed {
            debug!(listener = id.0, "Listener detached");
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver `event` to every attached listener and return how many
    /// accepted it.
    pub fn dispatch(&self, event: E) -> usize {
        let mut delivered = 0;
        self.listeners.retain(|id, sender| match sender.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(listener = id.0, "Listener queue full, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(listener = id.0, "Listener gone, removing");
                false
            }
        });
        if delivered == 0 {
            debug!("No listener accepted event");
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::IqBody;
    use crate::stanza::{IqHeader, IqType};
    use assert_matches::assert_matches;
    use tracing_test::traced_test;

    fn context() -> RequestContext {
        RequestContext {
            account: "me@server.domain".parse().unwrap(),
            group: "localpart@group.domain".parse().unwrap(),
        }
    }

    fn reply(id: &str, from: Option<&str>, iq_type: IqType) -> IncomingIq {
        IncomingIq {
            header: IqHeader {
                id: id.to_string(),
                from: from.map(|f| f.parse().unwrap()),
                to: None,
                iq_type,
            },
            body: IqBody::Empty,
        }
    }

    fn group_jid() -> Option<Jid> {
        Some("localpart@group.domain/resource".parse().unwrap())
    }

    #[tokio::test]
    async fn delivers_reply_exactly_once() {
        let pending = PendingRequests::new();
        let receiver = pending.register("r1", group_jid(), context()).unwrap();

        let first = pending.resolve(reply("r1", Some("localpart@group.domain/resource"), IqType::Result));
        assert_matches!(first, Resolution::Delivered);
        let second = pending.resolve(reply("r1", Some("localpart@group.domain/resource"), IqType::Result));
        assert_matches!(second, Resolution::Dropped);

        let delivered = receiver.await.unwrap().unwrap();
        assert_eq!(delivered.context, context());
        assert_eq!(delivered.iq.header.id, "r1");
        assert!(pending.is_empty());
    }

    #[test]
    fn waiter_stays_pending_until_resolved() {
        let pending = PendingRequests::new();
        let mut waiter = tokio_test::task::spawn(pending.register("r1", None, context()).unwrap());
        tokio_test::assert_pending!(waiter.poll());

        pending.resolve(reply("r2", None, IqType::Result));
        tokio_test::assert_pending!(waiter.poll());

        pending.resolve(reply("r1", None, IqType::Result));
        assert!(waiter.is_woken());
        let delivered = tokio_test::assert_ready_ok!(waiter.poll()).unwrap();
        assert_eq!(delivered.iq.header.id, "r1");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let pending = PendingRequests::new();
        let _receiver = pending.register("r1", None, context()).unwrap();
        assert_matches!(
            pending.register("r1", None, context()),
            Err(RequestError::DuplicateId(id)) if id == "r1"
        );
    }

    #[test]
    fn bare_sender_answers_full_address() {
        let pending = PendingRequests::new();
        let _receiver = pending.register("r1", group_jid(), context()).unwrap();
        assert_matches!(
            pending.resolve(reply("r1", Some("localpart@group.domain"), IqType::Error)),
            Resolution::Delivered
        );
    }

    #[traced_test]
    #[test]
    fn reply_from_other_entity_is_dropped_and_request_kept() {
        let pending = PendingRequests::new();
        let _receiver = pending.register("r1", group_jid(), context()).unwrap();
        assert_matches!(
            pending.resolve(reply("r1", Some("mallory@evil.domain"), IqType::Result)),
            Resolution::Dropped
        );
        assert_eq!(pending.len(), 1);
        assert!(logs_contain("Dropping reply from unexpected sender"));
    }

    #[traced_test]
    #[test]
    fn late_reply_after_cancel_is_dropped() {
        let pending = PendingRequests::new();
        let _receiver = pending.register("r1", group_jid(), context()).unwrap();
        assert!(pending.cancel("r1"));
        assert_matches!(
            pending.resolve(reply("r1", None, IqType::Result)),
            Resolution::Dropped
        );
        assert!(logs_contain("Dropping reply with no pending request"));
    }

    #[traced_test]
    #[test]
    fn reply_after_requester_gave_up_is_dropped() {
        let pending = PendingRequests::new();
        let receiver = pending.register("r1", None, context()).unwrap();
        drop(receiver);
        assert_matches!(
            pending.resolve(reply("r1", None, IqType::Result)),
            Resolution::Dropped
        );
        assert!(logs_contain("Requester went away"));
    }

    #[tokio::test]
    async fn undecodable_reply_fails_its_requester() {
        let pending = PendingRequests::new();
        let receiver = pending.register("bad1", group_jid(), context()).unwrap();
        let error = ParseError::InvalidValue {
            field: "field@type".to_string(),
            value: "slider".to_string(),
        };

        let header = reply("bad1", Some("localpart@group.domain"), IqType::Result).header;
        assert_matches!(pending.reject(&header, error.clone()), Resolution::Delivered);
        assert_eq!(receiver.await.unwrap(), Err(error));
        assert!(pending.is_empty());
    }

    #[test]
    fn undecodable_request_is_not_matched() {
        let pending = PendingRequests::new();
        let _receiver = pending.register("r1", None, context()).unwrap();
        let header = reply("r1", None, IqType::Set).header;
        assert_matches!(
            pending.reject(&header, ParseError::EmptyDocument),
            Resolution::Dropped
        );
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn requests_are_not_replies() {
        let pending = PendingRequests::new();
        assert_matches!(
            pending.resolve(reply("push", None, IqType::Set)),
            Resolution::NotReply(iq) if iq.header.id == "push"
        );
    }

    #[tokio::test]
    async fn dispatch_reaches_every_attached_listener() {
        let registry = ListenerRegistry::new(4);
        let mut a = registry.attach();
        let mut b = registry.attach();
        assert_ne!(a.id(), b.id());

        assert_eq!(registry.dispatch("pinned".to_string()), 2);
        assert_eq!(a.recv().await.as_deref(), Some("pinned"));
        assert_eq!(b.recv().await.as_deref(), Some("pinned"));
    }

    #[test]
    fn detached_listener_receives_nothing() {
        let registry = ListenerRegistry::new(4);
        let mut subscription = registry.attach();
        assert!(registry.detach(subscription.id()));
        assert!(!registry.detach(subscription.id()));

        assert_eq!(registry.dispatch(1u32), 0);
        assert_eq!(subscription.try_recv(), None);
    }

    #[test]
    fn dropped_subscriptions_are_pruned() {
        let registry = ListenerRegistry::new(4);
        let subscription = registry.attach();
        drop(subscription);
        assert_eq!(registry.listener_count(), 1);
        assert_eq!(registry.dispatch(1u32), 0);
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn full_queue_drops_event_but_keeps_listener() {
        let registry = ListenerRegistry::new(1);
        let mut subscription = registry.attach();
        assert_eq!(registry.dispatch(1u32), 1);
        assert_eq!(registry.dispatch(2u32), 0);
        assert_eq!(registry.listener_count(), 1);
        assert_eq!(subscription.try_recv(), Some(1));
        assert_eq!(subscription.try_recv(), None);
    }
}
