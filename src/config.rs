//! Construction-time configuration for [`crate::subscriber::Subscriber`] and
//! [`crate::notifier::Notifier`].
//!
//! Builder-style, validated once before the state machine is constructed —
//! the same shape the surrounding stack uses for its own `ClientConfig`/
//! `ServerConfig` (`with_*` setters returning `Self`, a `validate` gate
//! called by the constructor).

use std::fmt;
use std::sync::Arc;

use crate::error::{EventCoreError, EventCoreResult};
use crate::event::{default_parser, EventHeader, EventHeaderParser};
use crate::event_package::EventPackage;
use crate::traits::{Credential, HeaderPair};

/// Default Expires used when the application does not specify one, or when
/// a 2xx to SUBSCRIBE omits the header (`spec.md` §4.1, RFC 6665 §3.1.1 workaround).
pub const DEFAULT_EXPIRES: u32 = 900;

/// Grace period before a subscriber's dialog is released after termination,
/// to absorb a final NOTIFY travelling in parallel with an unsubscribe.
pub const DIALOG_DESTROY_GRACE: std::time::Duration = std::time::Duration::from_secs(32);

/// Timeout for a final NOTIFY after `unsubscribe()` (`spec.md` §4.1).
pub const UNSUBSCRIBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Configuration for a [`crate::subscriber::Subscriber`].
#[derive(Clone)]
pub struct SubscriberConfig {
    pub target: String,
    pub event_package: String,
    pub event_id: Option<String>,
    pub accept: Vec<String>,
    pub expires: u32,
    pub content_type: Option<String>,
    pub contact: String,
    pub extra_headers: Vec<HeaderPair>,
    pub credential: Option<Credential>,
    /// Host-injected `Event:` header reader; falls back to [`default_parser`]
    /// when unset.
    pub event_header_parser: Option<EventHeaderParser>,
}

impl fmt::Debug for SubscriberConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberConfig")
            .field("target", &self.target)
            .field("event_package", &self.event_package)
            .field("event_id", &self.event_id)
            .field("accept", &self.accept)
            .field("expires", &self.expires)
            .field("content_type", &self.content_type)
            .field("contact", &self.contact)
            .field("extra_headers", &self.extra_headers)
            .field("credential", &self.credential)
            .field("event_header_parser", &self.event_header_parser.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl SubscriberConfig {
    pub fn new(target: impl Into<String>, event_package: impl Into<String>, contact: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            event_package: event_package.into(),
            event_id: None,
            accept: Vec::new(),
            expires: DEFAULT_EXPIRES,
            content_type: None,
            contact: contact.into(),
            extra_headers: Vec::new(),
            credential: None,
            event_header_parser: None,
        }
    }

    /// Inject a host-owned `Event:` header reader, replacing [`default_parser`].
    pub fn with_event_header_parser(mut self, parser: EventHeaderParser) -> Self {
        self.event_header_parser = Some(parser);
        self
    }

    /// Parse an `Event:` header value with the injected parser, or
    /// [`default_parser`] if none was supplied.
    pub fn parse_event(&self, value: &str) -> Option<EventHeader> {
        match &self.event_header_parser {
            Some(parser) => parser(value),
            None => default_parser(value),
        }
    }

    pub fn with_event_id(mut self, id: impl Into<String>) -> Self {
        self.event_id = Some(id.into());
        self
    }

    pub fn with_accept(mut self, accept: Vec<String>) -> Self {
        self.accept = accept;
        self
    }

    pub fn with_expires(mut self, expires: u32) -> Self {
        self.expires = expires;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_extra_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Build a config from an [`EventPackage`]'s policy defaults: `event_package`
    /// set to the package name, `accept` to its content types, and `expires`
    /// to its default (`spec.md` §3: "`EventPackage` ... supplies policy
    /// defaults [for] default Expires when the application does not specify one").
    pub fn from_package(package: &dyn EventPackage, target: impl Into<String>, contact: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            event_package: package.name().to_string(),
            event_id: None,
            accept: package.accept_types().into_iter().map(str::to_string).collect(),
            expires: package.default_expires(),
            content_type: None,
            contact: contact.into(),
            extra_headers: Vec::new(),
            credential: None,
            event_header_parser: None,
        }
    }

    /// Validate fields that can be checked before any SUBSCRIBE is sent.
    /// Whether a `Content-Type` is required is call-time data (it depends
    /// on whether `subscribe()`/`unsubscribe()` is given a body), so that
    /// check lives in [`crate::subscriber::Subscriber`], not here.
    pub fn validate(&self) -> EventCoreResult<()> {
        if self.event_package.trim().is_empty() {
            return Err(EventCoreError::InvalidEventPackage("event package name must not be empty".into()));
        }
        if self.target.trim().is_empty() {
            return Err(EventCoreError::InvalidConfig("target must not be empty".into()));
        }
        Ok(())
    }
}

/// Configuration for a [`crate::notifier::Notifier`].
#[derive(Clone)]
pub struct NotifierConfig {
    /// Required — `spec.md` §4.2: "Construction requires ... a Content-Type."
    pub content_type: String,
    pub contact: Option<String>,
    pub extra_headers: Vec<HeaderPair>,
    /// Optional policy source consulted by [`crate::notifier::Notifier`] to
    /// default a missing `Expires` and to clamp a requested one to the
    /// package's `[min_expires, max_expires]` (`spec.md` §3).
    pub event_package: Option<Arc<dyn EventPackage>>,
    /// Host-injected `Event:` header reader; falls back to [`default_parser`]
    /// when unset.
    pub event_header_parser: Option<EventHeaderParser>,
}

impl fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("content_type", &self.content_type)
            .field("contact", &self.contact)
            .field("extra_headers", &self.extra_headers)
            .field("event_package", &self.event_package.as_ref().map(|p| p.name()))
            .field("event_header_parser", &self.event_header_parser.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl NotifierConfig {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            contact: None,
            extra_headers: Vec::new(),
            event_package: None,
            event_header_parser: None,
        }
    }

    /// Inject a host-owned `Event:` header reader, replacing [`default_parser`].
    pub fn with_event_header_parser(mut self, parser: EventHeaderParser) -> Self {
        self.event_header_parser = Some(parser);
        self
    }

    /// Parse an `Event:` header value with the injected parser, or
    /// [`default_parser`] if none was supplied.
    pub fn parse_event(&self, value: &str) -> Option<EventHeader> {
        match &self.event_header_parser {
            Some(parser) => parser(value),
            None => default_parser(value),
        }
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn with_extra_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    pub fn with_event_package(mut self, package: Arc<dyn EventPackage>) -> Self {
        self.event_package = Some(package);
        self
    }

    /// Expires to use when an inbound SUBSCRIBE omits the header.
    pub fn default_expires(&self) -> u32 {
        self.event_package.as_ref().map(|p| p.default_expires()).unwrap_or(DEFAULT_EXPIRES)
    }

    /// Clamp a requested `Expires` to the configured package's bounds.
    /// `Expires: 0` (unsubscribe) is never clamped.
    pub fn clamp_expires(&self, expires: u32) -> u32 {
        match &self.event_package {
            Some(package) if expires > 0 => expires.clamp(package.min_expires(), package.max_expires()),
            _ => expires,
        }
    }

    pub fn validate(&self) -> EventCoreResult<()> {
        if self.content_type.trim().is_empty() {
            return Err(EventCoreError::InvalidConfig("content type is required to construct a notifier".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_config_rejects_empty_event_package() {
        let cfg = SubscriberConfig::new("sip:bob@example.com", "", "sip:alice@example.com");
        assert!(matches!(cfg.validate(), Err(EventCoreError::InvalidEventPackage(_))));
    }

    #[test]
    fn notifier_config_rejects_empty_content_type() {
        let cfg = NotifierConfig::new("");
        assert!(matches!(cfg.validate(), Err(EventCoreError::InvalidConfig(_))));
    }

    #[test]
    fn notifier_config_accepts_valid_content_type() {
        let cfg = NotifierConfig::new("text/plain");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn default_event_parser_rejects_malformed_header() {
        let cfg = SubscriberConfig::new("sip:bob@example.com", "weather", "sip:alice@example.com");
        assert_eq!(cfg.parse_event(";id=x"), None);
        assert_eq!(cfg.parse_event("weather"), Some(EventHeader::new("weather")));
    }

    #[test]
    fn injected_event_parser_overrides_default() {
        let cfg = NotifierConfig::new("text/plain")
            .with_event_header_parser(Arc::new(|_: &str| Some(EventHeader::new("forced"))));
        assert_eq!(cfg.parse_event("anything;id=ignored"), Some(EventHeader::new("forced")));
    }

    #[test]
    fn from_package_builds_matching_subscriber_config() {
        let cfg = SubscriberConfig::from_package(&crate::event_package::PresencePackage, "sip:bob@example.com", "sip:alice@example.com");
        assert_eq!(cfg.event_package, "presence");
        assert_eq!(cfg.expires, 3600);
        assert!(cfg.accept.contains(&"application/pidf+xml".to_string()));
    }

    #[test]
    fn notifier_config_clamps_to_event_package_bounds() {
        let cfg = NotifierConfig::new("message/sipfrag").with_event_package(Arc::new(crate::event_package::ReferPackage));
        assert_eq!(cfg.clamp_expires(99_999), 60);
        assert_eq!(cfg.clamp_expires(0), 0);
        assert_eq!(cfg.default_expires(), 60);
    }
}
