//! Termination codes (`spec.md` §3).
//!
//! The subscriber and notifier enums are kept disjoint on purpose — per
//! `spec.md` §9's design note, merging them invites a match arm written for
//! one side to silently compile against a code that can only occur on the
//! other.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a [`crate::subscriber::Subscriber`] reached `terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriberTerminationCode {
    /// No response to the SUBSCRIBE within the transaction's timeout.
    SubscribeResponseTimeout,
    /// Transport layer failed to deliver the SUBSCRIBE.
    SubscribeTransportError,
    /// SUBSCRIBE answered with a non-2xx, non-401/407 final response.
    SubscribeNonOkResponse,
    /// SUBSCRIBE authentication was exhausted by the transaction layer.
    SubscribeFailedAuthentication,
    /// `unsubscribe()` sent but no final NOTIFY arrived within 30 s.
    UnsubscribeTimeout,
    /// A NOTIFY carrying `Subscription-State: terminated` was received.
    ReceiveFinalNotify,
    /// A NOTIFY failed validation (method, Event match, or Subscription-State presence).
    ReceiveBadNotify,
}

impl fmt::Display for SubscriberTerminationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SubscribeResponseTimeout => "SUBSCRIBE_RESPONSE_TIMEOUT",
            Self::SubscribeTransportError => "SUBSCRIBE_TRANSPORT_ERROR",
            Self::SubscribeNonOkResponse => "SUBSCRIBE_NON_OK_RESPONSE",
            Self::SubscribeFailedAuthentication => "SUBSCRIBE_FAILED_AUTHENTICATION",
            Self::UnsubscribeTimeout => "UNSUBSCRIBE_TIMEOUT",
            Self::ReceiveFinalNotify => "RECEIVE_FINAL_NOTIFY",
            Self::ReceiveBadNotify => "RECEIVE_BAD_NOTIFY",
        };
        write!(f, "{s}")
    }
}

/// Why a [`crate::notifier::Notifier`] reached `terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotifierTerminationCode {
    /// No response to an outbound NOTIFY within the transaction's timeout.
    NotifyResponseTimeout,
    /// Transport layer failed to deliver a NOTIFY.
    NotifyTransportError,
    /// A NOTIFY was answered with a non-2xx, non-401/407 final response.
    NotifyNonOkResponse,
    /// NOTIFY authentication was exhausted by the transaction layer.
    NotifyFailedAuthentication,
    /// The application called `terminate()`, sending the final NOTIFY itself.
    SendFinalNotify,
    /// The peer sent a SUBSCRIBE with `Expires: 0`.
    ReceiveUnsubscribe,
    /// The expiry timer fired with no refresh SUBSCRIBE received.
    SubscriptionExpired,
}

impl NotifierTerminationCode {
    /// True only for [`Self::SubscriptionExpired`] — the one path where the
    /// notifier itself is still on the hook to deliver a final NOTIFY after
    /// emitting `terminated` (`spec.md` §4.2 "send_final_notify flag").
    pub fn send_final_notify(&self) -> bool {
        matches!(self, Self::SubscriptionExpired)
    }
}

impl fmt::Display for NotifierTerminationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotifyResponseTimeout => "NOTIFY_RESPONSE_TIMEOUT",
            Self::NotifyTransportError => "NOTIFY_TRANSPORT_ERROR",
            Self::NotifyNonOkResponse => "NOTIFY_NON_OK_RESPONSE",
            Self::NotifyFailedAuthentication => "NOTIFY_FAILED_AUTHENTICATION",
            Self::SendFinalNotify => "SEND_FINAL_NOTIFY",
            Self::ReceiveUnsubscribe => "RECEIVE_UNSUBSCRIBE",
            Self::SubscriptionExpired => "SUBSCRIPTION_EXPIRED",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_final_notify_is_true_only_for_subscription_expired() {
        for code in [
            NotifierTerminationCode::NotifyResponseTimeout,
            NotifierTerminationCode::NotifyTransportError,
            NotifierTerminationCode::NotifyNonOkResponse,
            NotifierTerminationCode::NotifyFailedAuthentication,
            NotifierTerminationCode::SendFinalNotify,
            NotifierTerminationCode::ReceiveUnsubscribe,
        ] {
            assert!(!code.send_final_notify(), "{code} should not request final notify");
        }
        assert!(NotifierTerminationCode::SubscriptionExpired.send_final_notify());
    }

    #[test]
    fn display_matches_wire_style_constants() {
        assert_eq!(SubscriberTerminationCode::ReceiveBadNotify.to_string(), "RECEIVE_BAD_NOTIFY");
        assert_eq!(NotifierTerminationCode::SubscriptionExpired.to_string(), "SUBSCRIPTION_EXPIRED");
    }
}
