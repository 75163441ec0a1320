use std::future::Future;
use std::time::Duration;

use tracing::{debug, instrument, warn};
use xabber_core::config::GroupchatConfig;

use crate::correlation::{IqReply, PendingRequests, RequestContext, Resolution};
use crate::error::{ConnectionError, ParseError, RequestError};
use crate::provider::{IncomingIq, IqBody, ProviderRegistry};
use crate::stanza::IqRequest;

/// Delivery of serialized stanzas to the server.
///
/// Incoming stanzas are not read through this trait; whoever owns the stream
/// hands them to [`GroupchatSession::handle_incoming`].
pub trait IqTransport: Send + Sync + 'static {
    fn send(&self, stanza: Vec<u8>) -> impl Future<Output = Result<(), ConnectionError>> + Send;
}

/// What happened to an incoming stanza.
#[derive(Debug)]
pub enum Dispatch {
    /// Matched a pending request and handed to it.
    Correlated,
    /// A request or push from the server that no one asked for.
    Unsolicited(IncomingIq),
    /// A stale or unexpected reply.
    Dropped,
}

/// Request/reply plumbing for one account's connection.
pub struct GroupchatSession<T> {
    transport: T,
    registry: &'static ProviderRegistry,
    pending: PendingRequests,
    reply_timeout: Duration,
}

impl<T: IqTransport> GroupchatSession<T> {
    pub fn new(transport: T, config: &GroupchatConfig) -> Self {
        Self {
            transport,
            registry: ProviderRegistry::global(),
            pending: PendingRequests::new(),
            reply_timeout: config.reply_timeout(),
        }
    }

    pub fn with_registry(mut self, registry: &'static ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Send `request` and wait for its reply.
    ///
    /// An `error` reply is returned as [`RequestError::Stanza`] and a reply
    /// whose payload cannot be decoded as [`RequestError::Parse`]. After a
    /// timeout, or if this future is dropped, the request is forgotten and a
    /// late reply is dropped.
    #[instrument(skip(self, request, context), fields(id = %request.id(), element = R::ELEMENT))]
    pub async fn send_and_await<R: IqRequest>(
        &self,
        request: &R,
        context: RequestContext,
    ) -> Result<IqReply, RequestError> {
        let id = request.id().to_string();
        let receiver = self
            .pending
            .register(&id, request.header().to.clone(), context)?;
        let mut guard = PendingGuard {
            pending: &self.pending,
            id: &id,
            armed: true,
        };

        debug!(namespace = R::NAMESPACE, "Sending request");
        self.transport.send(request.to_xml().into_bytes()).await?;

        let outcome = match tokio::time::timeout(self.reply_timeout, receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => return Err(RequestError::Cancelled { id: id.clone() }),
            Err(_) => {
                warn!(timeout_ms = self.reply_timeout.as_millis() as u64, "Request timed out");
                return Err(RequestError::Timeout { id: id.clone() });
            }
        };
        guard.armed = false;
        let reply = outcome?;

        if let IqBody::Error(error) = &reply.iq.body {
            debug!(condition = %error.condition, "Request failed");
            return Err(RequestError::Stanza(error.clone()));
        }
        Ok(reply)
    }

    /// Forget a pending request; its waiter fails with
    /// [`RequestError::Cancelled`].
    pub fn cancel(&self, id: &str) -> bool {
        self.pending.cancel(id)
    }

    /// Decode a raw incoming IQ and route it to its waiting request.
    ///
    /// A reply whose payload cannot be decoded still fails its requester
    /// with that error and counts as correlated. Undecodable stanzas nobody
    /// waits for are returned as errors.
    pub fn handle_incoming(&self, raw: &[u8]) -> Result<Dispatch, ParseError> {
        let xml = std::str::from_utf8(raw)
            .map_err(|e| ParseError::Xml(format!("invalid UTF-8: {e}")))?;
        let (header, body) = IncomingIq::parse_envelope(xml, self.registry)?;

        let resolution = match body {
            Ok(body) => self.pending.resolve(IncomingIq { header, body }),
            Err(error) => match self.pending.reject(&header, error.clone()) {
                Resolution::Delivered => Resolution::Delivered,
                _ => return Err(error),
            },
        };
        Ok(match resolution {
            Resolution::Delivered => Dispatch::Correlated,
            Resolution::NotReply(iq) => Dispatch::Unsolicited(iq),
            Resolution::Dropped => Dispatch::Dropped,
        })
    }
}

/// Forgets a registered request unless its reply arrived, whether the
/// awaiting future returned early or was dropped.
struct PendingGuard<'a> {
    pending: &'a PendingRequests,
    id: &'a str,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.pending.cancel(self.id) {
            debug!(id = self.id, "Forgetting unanswered request");
        }
    }
}
