//! RFC 6665 SIP-Specific Event Notification core.
//!
//! Two paired state machines — [`subscriber::Subscriber`] and
//! [`notifier::Notifier`] — implement the SUBSCRIBE/NOTIFY dialog lifecycle
//! independently of any concrete SIP transport, transaction layer, or
//! dialog implementation. A host wires its own stack in through the traits
//! in [`traits`] and drives events into either state machine; this crate
//! owns only the parts of the protocol RFC 6665 actually standardizes:
//! Subscription-State bookkeeping, refresh/expiry timing, and the
//! termination taxonomy.
//!
//! SIP message parsing, dialog construction, and transport are out of
//! scope; see [`traits`] for the seam a host implements instead.

pub mod config;
pub mod error;
pub mod event;
pub mod event_package;
pub mod events;
pub mod notifier;
pub mod subscriber;
pub mod subscription_state;
pub mod termination;
mod timing;
pub mod traits;

#[cfg(any(test, feature = "testing"))]
pub mod test_support;

pub use config::{NotifierConfig, SubscriberConfig};
pub use error::{EventCoreError, EventCoreResult};
pub use event::{default_parser, EventHeader, EventHeaderParser};
pub use event_package::EventPackage;
pub use events::{NotifierListener, SubscribeAction, SubscriberListener};
pub use notifier::{Notifier, NotifierState};
pub use subscriber::{Subscriber, SubscriberState};
pub use subscription_state::{SubscriptionState, TerminationReason};
pub use termination::{NotifierTerminationCode, SubscriberTerminationCode};
