//! `Subscription-State` header value (RFC 6665 §4.1.3, §4.2.4).
//!
//! This is a pure formatting/parsing type: `to_header_value` composes the
//! value the notifier attaches to an outbound NOTIFY, and `from_header_value`
//! recovers the fields a subscriber needs from an inbound one. Neither
//! direction drives a state transition by itself — `Subscriber`/`Notifier`
//! own that.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three subscription-state tokens the header can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionState {
    /// Subscription accepted, awaiting the resource to become available.
    Pending,
    /// Subscription is live; `expires` is the remaining seconds, if present.
    Active { expires: Option<u32> },
    /// Subscription has ended; carries an optional machine reason and an
    /// optional `retry-after` hint (only meaningful with some reasons).
    Terminated { reason: Option<TerminationReason>, retry_after: Option<u32> },
}

/// The `reason` parameter on a `terminated` Subscription-State (RFC 6665 §4.1.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    Deactivated,
    Probation,
    Rejected,
    Timeout,
    Giveup,
    NoResource,
    Invariant,
}

impl TerminationReason {
    fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Deactivated => "deactivated",
            TerminationReason::Probation => "probation",
            TerminationReason::Rejected => "rejected",
            TerminationReason::Timeout => "timeout",
            TerminationReason::Giveup => "giveup",
            TerminationReason::NoResource => "noresource",
            TerminationReason::Invariant => "invariant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "deactivated" => TerminationReason::Deactivated,
            "probation" => TerminationReason::Probation,
            "rejected" => TerminationReason::Rejected,
            "timeout" => TerminationReason::Timeout,
            "giveup" => TerminationReason::Giveup,
            "noresource" => TerminationReason::NoResource,
            "invariant" => TerminationReason::Invariant,
            _ => return None,
        })
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl SubscriptionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionState::Active { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SubscriptionState::Pending)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, SubscriptionState::Terminated { .. })
    }

    /// Parse a `Subscription-State` header value, e.g. `"active;expires=60"`
    /// or `"terminated;reason=timeout"`.
    ///
    /// Unknown leading tokens are treated as `pending` so an unrecognized
    /// extension state does not panic the subscriber; `spec.md` §4.1 only
    /// requires presence of the header, not a closed set of tokens.
    pub fn from_header_value(value: &str) -> Self {
        let mut parts = value.split(';').map(str::trim);
        let state = parts.next().unwrap_or("").to_lowercase();
        let params: Vec<(&str, &str)> = parts
            .filter_map(|p| {
                let mut kv = p.splitn(2, '=');
                let k = kv.next()?.trim();
                let v = kv.next().unwrap_or("").trim();
                Some((k, v))
            })
            .collect();

        match state.as_str() {
            "active" | "refreshing" => {
                let expires = params
                    .iter()
                    .find(|(k, _)| *k == "expires")
                    .and_then(|(_, v)| v.parse::<u32>().ok());
                SubscriptionState::Active { expires }
            }
            "terminated" => {
                let reason = params
                    .iter()
                    .find(|(k, _)| *k == "reason")
                    .and_then(|(_, v)| TerminationReason::from_str(v));
                let retry_after = params
                    .iter()
                    .find(|(k, _)| *k == "retry-after")
                    .and_then(|(_, v)| v.parse::<u32>().ok());
                SubscriptionState::Terminated { reason, retry_after }
            }
            _ => SubscriptionState::Pending,
        }
    }

    /// Compose the `Subscription-State` header value for an outbound NOTIFY.
    pub fn to_header_value(&self) -> String {
        match self {
            SubscriptionState::Pending => "pending".to_string(),
            SubscriptionState::Active { expires: Some(e) } => format!("active;expires={}", e),
            SubscriptionState::Active { expires: None } => "active".to_string(),
            SubscriptionState::Terminated { reason, retry_after } => {
                let mut s = "terminated".to_string();
                if let Some(r) = reason {
                    s.push_str(&format!(";reason={}", r));
                }
                if let Some(ra) = retry_after {
                    s.push_str(&format!(";retry-after={}", ra));
                }
                s
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pending() {
        assert!(SubscriptionState::from_header_value("pending").is_pending());
    }

    #[test]
    fn parses_active_with_expires() {
        let s = SubscriptionState::from_header_value("active;expires=60");
        assert!(s.is_active());
        assert_eq!(s, SubscriptionState::Active { expires: Some(60) });
    }

    #[test]
    fn parses_terminated_with_reason_and_retry_after() {
        let s = SubscriptionState::from_header_value("terminated;reason=probation;retry-after=30");
        match s {
            SubscriptionState::Terminated { reason, retry_after } => {
                assert_eq!(reason, Some(TerminationReason::Probation));
                assert_eq!(retry_after, Some(30));
            }
            _ => panic!("expected terminated"),
        }
    }

    #[test]
    fn unknown_leading_token_defaults_to_pending() {
        assert!(SubscriptionState::from_header_value("bogus-token").is_pending());
    }

    #[test]
    fn composes_active_header() {
        let s = SubscriptionState::Active { expires: Some(3600) };
        assert_eq!(s.to_header_value(), "active;expires=3600");
    }

    #[test]
    fn composes_terminated_header_with_reason_only() {
        let s = SubscriptionState::Terminated { reason: Some(TerminationReason::Timeout), retry_after: None };
        assert_eq!(s.to_header_value(), "terminated;reason=timeout");
    }

    #[test]
    fn composes_bare_terminated_header() {
        let s = SubscriptionState::Terminated { reason: None, retry_after: None };
        assert_eq!(s.to_header_value(), "terminated");
    }

    #[test]
    fn round_trips_active() {
        let original = "active;expires=120";
        let parsed = SubscriptionState::from_header_value(original);
        assert_eq!(parsed.to_header_value(), original);
    }
}
