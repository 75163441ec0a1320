#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use xabber_core::config::GroupchatConfig;
use xabber_core::{AccountJid, ContactJid, GroupChat};
use xabber_xmpp::{
    ConnectionError, Dispatch, GroupchatManager, GroupchatSession, IqTransport, XmlCursor,
    XmlEvent,
};

/// Transport that keeps every outgoing stanza for inspection.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<String>>,
    notify: Notify,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("transport lock").clone()
    }

    /// Wait until at least `index + 1` stanzas went out and return that one.
    pub async fn wait_for(&self, index: usize) -> String {
        loop {
            let notified = self.notify.notified();
            if let Some(stanza) = self.sent.lock().expect("transport lock").get(index) {
                return stanza.clone();
            }
            notified.await;
        }
    }
}

impl IqTransport for RecordingTransport {
    async fn send(&self, stanza: Vec<u8>) -> Result<(), ConnectionError> {
        let stanza = String::from_utf8(stanza).expect("stanzas are UTF-8");
        self.sent.lock().expect("transport lock").push(stanza);
        self.notify.notify_waiters();
        Ok(())
    }
}

pub type TestManager = GroupchatManager<RecordingTransport>;

pub fn account() -> AccountJid {
    "me@server.domain".parse().expect("account jid")
}

pub fn group_contact() -> ContactJid {
    "localpart@group.domain".parse().expect("group jid")
}

/// Group whose full JID is known.
pub fn full_group() -> GroupChat {
    GroupChat::new(account(), group_contact())
        .with_full_jid("localpart@group.domain/resource".parse().expect("full jid"))
}

/// Group known only by its bare JID.
pub fn bare_group() -> GroupChat {
    GroupChat::new(account(), group_contact())
}

pub fn manager() -> (Arc<GroupchatSession<RecordingTransport>>, TestManager) {
    let config = GroupchatConfig::default();
    let session = Arc::new(GroupchatSession::new(RecordingTransport::default(), &config));
    let manager = GroupchatManager::new(Arc::clone(&session), account(), &config)
        .with_own_jid("me@server.domain/android".parse().expect("own jid"));
    (session, manager)
}

pub fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {path}: {e}"))
}

/// `id` attribute of a serialized stanza's root element.
pub fn stanza_id(xml: &str) -> String {
    let cursor = XmlCursor::new(xml).expect("well-formed stanza");
    match cursor.event() {
        XmlEvent::StartTag(tag) => tag.attribute("id").expect("stanza id").to_string(),
        other => panic!("expected a start tag, got {other:?}"),
    }
}

/// Wait for outgoing stanza `index` and answer it with `fixture_name`,
/// with `{id}` replaced by the request's id.
pub async fn reply_with(manager: &TestManager, transport: &RecordingTransport, index: usize, fixture_name: &str) -> Dispatch {
    let request = transport.wait_for(index).await;
    let reply = fixture(fixture_name).replace("{id}", &stanza_id(&request));
    manager
        .handle_incoming(reply.as_bytes())
        .await
        .expect("fixture parses")
}
