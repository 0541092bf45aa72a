//! External collaborator interfaces (`spec.md` §6).
//!
//! The hard part of an RFC 6665 implementation is state-machine
//! correctness, not message serialization or transport — those live in a
//! surrounding SIP stack. This module is the narrow seam between the two:
//! everything a `Subscriber`/`Notifier` needs from the outside world is
//! named here, and nothing else. A host implements these traits once over
//! its own dialog/transaction/timer layer and the core never needs to know
//! how a byte reaches the wire.
//!
//! Outcomes of outbound sends are not returned from `send_*` — per
//! `spec.md` §5, requests are fire-and-forget to the transaction layer and
//! their outcome arrives later as a callback. In this crate that callback
//! is simply a further method call back into the owning [`crate::subscriber::Subscriber`]
//! or [`crate::notifier::Notifier`] (`on_subscribe_response`, `on_timer_fired`, …),
//! which keeps the whole state machine reachable through ordinary `&mut self`
//! methods rather than boxed closures.

use async_trait::async_trait;
use std::time::Duration;

/// Stable identity for an in-dialog SIP request/response exchange: opaque to
/// the core, compared only for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Stable identity for a dialog: Call-ID + local tag + remote tag
/// (`spec.md` §3, "identified by (Call-ID, from-tag, to-tag)").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DialogId {
    pub call_id: String,
    pub local_tag: String,
    pub remote_tag: String,
}

impl DialogId {
    pub fn new(call_id: impl Into<String>, local_tag: impl Into<String>, remote_tag: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), local_tag: local_tag.into(), remote_tag: remote_tag.into() }
    }
}

impl std::fmt::Display for DialogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.call_id, self.local_tag, self.remote_tag)
    }
}

/// A single SIP header, as delivered by the surrounding stack's parser.
pub type HeaderPair = (String, String);

/// Read-only view over an inbound SIP request (SUBSCRIBE or NOTIFY).
///
/// Grammar parsing of individual header values (e.g. the `Event` header)
/// happens upstream; this trait only exposes raw accessors plus `reply`,
/// mirroring `spec.md` §6's `Request.parseHeader`/`getHeader`/`reply` triad.
#[async_trait]
pub trait InboundRequest: Send + Sync {
    fn method(&self) -> &str;
    fn body(&self) -> &[u8];
    fn call_id(&self) -> &str;
    fn cseq(&self) -> u32;
    /// The remote tag this request carries on `To` (set once a dialog is
    /// established; absent on the very first SUBSCRIBE of a new dialog).
    fn to_tag(&self) -> Option<&str>;
    fn get_header(&self, name: &str) -> Option<String>;
    fn get_headers(&self, name: &str) -> Vec<String>;
    fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }
    /// Reply to this request with a final response.
    async fn reply(&self, status_code: u16, reason: Option<&str>, extra_headers: &[HeaderPair]);
}

/// Read-only view over a SIP response to an outbound SUBSCRIBE or NOTIFY.
pub trait InboundResponse: Send + Sync {
    fn status_code(&self) -> u16;
    fn get_header(&self, name: &str) -> Option<String>;
    fn get_headers(&self, name: &str) -> Vec<String>;
    /// The remote tag this response carries on `To`.
    fn to_tag(&self) -> Option<&str>;
    /// `Record-Route` values in wire order (not yet reversed).
    fn record_route(&self) -> Vec<String>;
}

/// Sends a dialog-forming request (the very first SUBSCRIBE, before a
/// dialog exists) and authenticates it against a supplied credential.
///
/// Maps to `spec.md` §6's top-level `sendRequest(method, target, ...)`.
#[async_trait]
pub trait TransactionSink: Send + Sync {
    /// Send the initial SUBSCRIBE. Fire-and-forget: the outcome reaches the
    /// caller later via [`crate::subscriber::Subscriber::on_subscribe_authenticated`],
    /// [`crate::subscriber::Subscriber::on_subscribe_timeout`],
    /// [`crate::subscriber::Subscriber::on_subscribe_transport_error`], or
    /// [`crate::subscriber::Subscriber::on_subscribe_response`].
    async fn send_subscribe(
        &self,
        target: &str,
        headers: &[HeaderPair],
        body: Option<Vec<u8>>,
        credential: Option<&Credential>,
    );
}

/// A stored credential used to authenticate a request after a 401/407
/// challenge. Opaque to the core — the transaction layer owns the digest
/// exchange; this crate only needs to know one exists to pass along.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub realm: Option<String>,
}

/// A bound SIP dialog: stable identity, route set, and in-dialog send.
///
/// Maps to `spec.md` §6's `Dialog.sendRequest` plus the Call-ID/tag/route-set
/// accessors the core needs for refresh SUBSCRIBE, unsubscribe, and NOTIFY.
#[async_trait]
pub trait DialogHandle: Send + Sync {
    fn id(&self) -> &DialogId;

    /// Ordered proxy list used to route in-dialog requests (built by
    /// reversing `Record-Route` from the first 2xx, per `spec.md` §6).
    fn route_set(&self) -> Vec<String>;
    fn set_route_set(&self, route_set: Vec<String>);

    /// Send an in-dialog request (refresh/unsubscribe SUBSCRIBE, or NOTIFY).
    /// Fire-and-forget; outcome arrives via the owning state machine's
    /// `on_*_response`/`on_*_timeout`/`on_*_transport_error` methods.
    async fn send_request(&self, method: &str, body: Option<Vec<u8>>, extra_headers: &[HeaderPair]);

    /// Tear down this dialog's transport/transaction resources immediately.
    /// Does not unregister from the UA dialog table — see [`UserAgentDialogs`].
    async fn terminate(&self);
}

/// The User Agent's dialog table (`spec.md` §6's `UA.newDialog`/`destroyDialog`).
///
/// `spec.md` invariant 3: a dialog id is registered exactly once and
/// destroyed exactly once, and only once a to-tag has been established.
#[async_trait]
pub trait UserAgentDialogs: Send + Sync {
    async fn register_dialog(&self, id: &DialogId);
    async fn destroy_dialog(&self, id: &DialogId);
}

/// One-shot, cancellable timers (`spec.md` §6, "Timer service").
///
/// Firing is not delivered through this trait — the host's event loop owns
/// observing elapsed timers and calls back into the relevant state machine's
/// `on_timer_fired(TimerId)`, keeping with the "no suspension inside a
/// transition" rule in `spec.md` §5.
#[async_trait]
pub trait TimerService: Send + Sync {
    async fn schedule(&self, delay: Duration) -> TimerId;
    async fn cancel(&self, id: TimerId);
}
