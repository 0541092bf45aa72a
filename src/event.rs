//! Event identity: the (name, id) pair carried by the Event header (RFC 6665 §7.2.1).
//!
//! Grammar parsing of the raw `Event:` header value is out of scope for this
//! crate (`spec.md` §1) — the surrounding SIP stack hands us an already
//! parsed [`EventHeader`]. This module owns only the *comparison* semantics:
//! two Event headers identify the same subscription iff their names match
//! and their ids match, where an absent id on both sides counts as equal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A parsed `Event:` header value, reduced to the two fields the core
/// needs to match a NOTIFY against the SUBSCRIBE that established it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventHeader {
    /// Event package name, e.g. `presence`, `dialog`, `message-summary`.
    pub name: String,
    /// Optional `id` parameter used to disambiguate multiple subscriptions
    /// to the same package between the same two endpoints.
    pub id: Option<String>,
}

impl EventHeader {
    /// Construct an Event header with no `id` parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), id: None }
    }

    /// Construct an Event header carrying an `id` parameter.
    pub fn with_id(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self { name: name.into(), id: Some(id.into()) }
    }

    /// Whether `other` identifies the same subscription as `self`.
    ///
    /// Per `spec.md` §3: "Two NOTIFYs match a SUBSCRIBE iff both name and id
    /// are equal (id absence on both sides is equal)." Names are compared
    /// case-insensitively since SIP tokens are case-insensitive; ids are
    /// compared byte-for-byte since RFC 6665 treats `id` as an opaque token.
    pub fn matches(&self, other: &EventHeader) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.id == other.id
    }
}

/// A host-supplied reader for the raw `Event:` header value. Returning
/// `None` signals a grammar failure distinctly from a header that merely
/// names an unknown package — callers that cannot parse should not get back
/// a well-typed-but-garbage [`EventHeader`] (e.g. an empty `name`).
pub type EventHeaderParser = Arc<dyn Fn(&str) -> Option<EventHeader> + Send + Sync>;

/// Built-in reader used when a host does not inject its own
/// [`EventHeaderParser`] (`spec.md` §1: full SIP grammar parsing is out of
/// scope, so this handles only the `token *(";" name "=" value)` shape the
/// Event header actually needs).
pub fn default_parser(value: &str) -> Option<EventHeader> {
    let mut parts = value.split(';').map(str::trim);
    let name = parts.next().unwrap_or("");
    if name.is_empty() {
        return None;
    }
    let id = parts.find_map(|p| {
        let mut kv = p.splitn(2, '=');
        if kv.next()? == "id" {
            kv.next().map(str::to_string)
        } else {
            None
        }
    });
    Some(EventHeader { name: name.to_string(), id })
}

impl fmt::Display for EventHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{};id={}", self.name, id),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_same_name_no_id() {
        let a = EventHeader::new("weather");
        let b = EventHeader::new("weather");
        assert!(a.matches(&b));
    }

    #[test]
    fn matches_is_case_insensitive_on_name() {
        let a = EventHeader::new("Presence");
        let b = EventHeader::new("presence");
        assert!(a.matches(&b));
    }

    #[test]
    fn rejects_mismatched_name() {
        let a = EventHeader::new("weather");
        let b = EventHeader::new("presence");
        assert!(!a.matches(&b));
    }

    #[test]
    fn rejects_mismatched_id() {
        let a = EventHeader::with_id("presence", "abc");
        let b = EventHeader::with_id("presence", "xyz");
        assert!(!a.matches(&b));
    }

    #[test]
    fn id_absence_on_both_sides_is_equal() {
        let a = EventHeader::new("dialog");
        let b = EventHeader::new("dialog");
        assert!(a.matches(&b));
    }

    #[test]
    fn one_sided_id_does_not_match() {
        let a = EventHeader::new("dialog");
        let b = EventHeader::with_id("dialog", "1");
        assert!(!a.matches(&b));
    }

    #[test]
    fn display_round_trips_shape() {
        assert_eq!(EventHeader::new("weather").to_string(), "weather");
        assert_eq!(EventHeader::with_id("weather", "1").to_string(), "weather;id=1");
    }

    #[test]
    fn default_parser_recovers_name_and_id() {
        let parsed = default_parser("presence;id=abc").unwrap();
        assert_eq!(parsed, EventHeader::with_id("presence", "abc"));
    }

    #[test]
    fn default_parser_without_id_param() {
        let parsed = default_parser("dialog").unwrap();
        assert_eq!(parsed, EventHeader::new("dialog"));
    }

    #[test]
    fn default_parser_rejects_empty_name() {
        assert_eq!(default_parser(";id=abc"), None);
        assert_eq!(default_parser(""), None);
    }
}
