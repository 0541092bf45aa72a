//! Application-facing events (`spec.md` §6).
//!
//! Modeled as narrow listener traits with one method per event rather than
//! a stringly-typed `emit("name", ...)` dispatch, per the design note in
//! `spec.md` §9. Default bodies are no-ops so an application only overrides
//! the events it cares about.

use crate::subscription_state::TerminationReason;
use crate::termination::{NotifierTerminationCode, SubscriberTerminationCode};
use crate::traits::InboundRequest;

/// What a [`NotifierListener::subscribe`] handler wants the notifier to do
/// once it returns.
///
/// `spec.md` §4.2 allows the application to call `terminate()` from inside
/// its `subscribe` handler — typically for a fetch-subscribe or an
/// unsubscribe it wants to answer immediately with a final NOTIFY. Since the
/// listener callback itself runs synchronously (`spec.md` §5), that request
/// is expressed as a return value instead of a re-entrant async call; the
/// notifier actions it right after the listener returns, preserving the
/// "emit subscribe, then terminate" ordering from `spec.md` §9's open
/// question #1.
#[derive(Debug, Clone, Default)]
pub enum SubscribeAction {
    /// Take no special action; the notifier proceeds with its own default
    /// handling (e.g. terminating with `RECEIVE_UNSUBSCRIBE` if `Expires: 0`).
    #[default]
    None,
    /// Send a final NOTIFY with this body and terminate with `SEND_FINAL_NOTIFY`.
    Terminate { body: Option<Vec<u8>>, reason: Option<TerminationReason>, retry_after: Option<u32> },
}

/// Listener for [`crate::subscriber::Subscriber`] events.
///
/// Called synchronously from inside a state transition (`spec.md` §5: "no
/// suspension points inside state transitions") — an implementation that
/// needs to do async work in response should hand it off (e.g. `tokio::spawn`)
/// rather than block here.
pub trait SubscriberListener: Send + Sync {
    /// Fired once when the to-tag is first bound and a dialog id exists.
    fn dialog_created(&self) {}

    /// Fired once on the first transition into `active`.
    fn active(&self) {}

    /// Fired for every NOTIFY that carries a body.
    fn notify(&self, is_final: bool, request: &dyn InboundRequest, body: &[u8], content_type: &str) {
        let _ = (is_final, request, body, content_type);
    }

    /// Fired exactly once, when the subscription reaches `terminated`.
    fn terminated(&self, code: SubscriberTerminationCode, reason: Option<&str>, retry_after: Option<u32>) {
        let _ = (code, reason, retry_after);
    }
}

/// Listener for [`crate::notifier::Notifier`] events.
pub trait NotifierListener: Send + Sync {
    /// Fired for every inbound SUBSCRIBE, including the initial one that
    /// constructed this notifier (see [`crate::notifier::Notifier::start`]).
    fn subscribe(&self, is_unsubscribe: bool, request: &dyn InboundRequest, body: &[u8], content_type: &str) -> SubscribeAction {
        let _ = (is_unsubscribe, request, body, content_type);
        SubscribeAction::None
    }

    /// Fired exactly once, when the subscription reaches `terminated`.
    ///
    /// `send_final_notify` is true iff `code == SUBSCRIPTION_EXPIRED`
    /// (`spec.md` §4.2) — the one path left for the application to still
    /// deliver a final NOTIFY itself.
    fn terminated(&self, code: NotifierTerminationCode, send_final_notify: bool) {
        let _ = (code, send_final_notify);
    }
}
