//! Event package registry (`spec.md` §3, "Event package").
//!
//! A package name alone (`presence`, `dialog`, ...) does not tell a
//! `Subscriber`/`Notifier` what content types to offer on `Accept`, what
//! `Expires` to default to, or whether a body even needs validating before
//! it reaches the application. [`EventPackage`] collects that per-package
//! knowledge so a caller can build a [`crate::config::SubscriberConfig`] or
//! [`crate::config::NotifierConfig`] from it instead of hand-copying magic
//! strings and durations at each call site.

/// Per-event-package defaults and validation.
///
/// Implementations describe policy only — they never touch a `Subscriber`
/// or `Notifier` directly; a host consults one when building config for a
/// given `Event:` package name.
pub trait EventPackage: Send + Sync {
    /// The `Event:` header token, e.g. `"presence"`.
    fn name(&self) -> &str;

    /// Content types to offer on `Accept` when subscribing to this package.
    fn accept_types(&self) -> Vec<&'static str>;

    /// Minimal body validation, before a NOTIFY body is handed to the
    /// application. Packages that need real grammar validation (PIDF,
    /// dialog-info XML, ...) are expected to do it above this crate; this
    /// hook exists for packages with a cheap structural check worth doing
    /// early (e.g. `refer`'s `message/sipfrag` framing).
    fn validate_body(&self, body: &[u8]) -> Result<(), String> {
        let _ = body;
        Ok(())
    }

    /// Expires to request when none is configured explicitly.
    fn default_expires(&self) -> u32;

    /// Floor a notifier should apply when granting a subscription.
    fn min_expires(&self) -> u32 {
        60
    }

    /// Ceiling a notifier should apply when granting a subscription.
    fn max_expires(&self) -> u32 {
        86_400
    }

    /// Whether this package supports RFC 4662 resource lists.
    fn supports_event_lists(&self) -> bool {
        false
    }
}

/// `presence` (RFC 3856).
pub struct PresencePackage;

impl EventPackage for PresencePackage {
    fn name(&self) -> &str {
        "presence"
    }

    fn accept_types(&self) -> Vec<&'static str> {
        vec!["application/pidf+xml", "application/xpidf+xml"]
    }

    fn default_expires(&self) -> u32 {
        3600
    }

    fn supports_event_lists(&self) -> bool {
        true
    }
}

/// `dialog` (RFC 4235).
pub struct DialogPackage;

impl EventPackage for DialogPackage {
    fn name(&self) -> &str {
        "dialog"
    }

    fn accept_types(&self) -> Vec<&'static str> {
        vec!["application/dialog-info+xml"]
    }

    fn default_expires(&self) -> u32 {
        3600
    }
}

/// `message-summary` (RFC 3842).
pub struct MessageSummaryPackage;

impl EventPackage for MessageSummaryPackage {
    fn name(&self) -> &str {
        "message-summary"
    }

    fn accept_types(&self) -> Vec<&'static str> {
        vec!["application/simple-message-summary"]
    }

    fn default_expires(&self) -> u32 {
        3600
    }
}

/// `refer` (RFC 3515) — short-lived, used to report progress of a single
/// REFER-triggered request.
pub struct ReferPackage;

impl EventPackage for ReferPackage {
    fn name(&self) -> &str {
        "refer"
    }

    fn accept_types(&self) -> Vec<&'static str> {
        vec!["message/sipfrag"]
    }

    fn validate_body(&self, body: &[u8]) -> Result<(), String> {
        if body.is_empty() {
            return Err("refer NOTIFY body must carry a sipfrag status line".to_string());
        }
        Ok(())
    }

    fn default_expires(&self) -> u32 {
        60
    }

    fn min_expires(&self) -> u32 {
        60
    }

    fn max_expires(&self) -> u32 {
        60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_offers_pidf_types() {
        let pkg = PresencePackage;
        assert_eq!(pkg.name(), "presence");
        assert!(pkg.accept_types().contains(&"application/pidf+xml"));
        assert!(pkg.supports_event_lists());
    }

    #[test]
    fn refer_rejects_empty_body() {
        let pkg = ReferPackage;
        assert!(pkg.validate_body(b"").is_err());
        assert!(pkg.validate_body(b"SIP/2.0 200 OK").is_ok());
    }

    #[test]
    fn dialog_and_message_summary_defaults() {
        assert_eq!(DialogPackage.default_expires(), 3600);
        assert_eq!(MessageSummaryPackage.default_expires(), 3600);
    }
}
