//! Error types for the event-notification core.
//!
//! Only configuration mistakes surface as [`EventCoreError`]. Protocol
//! violations, transport failures, and authentication exhaustion are not
//! modeled as `Result::Err` — they are expected runtime outcomes delivered
//! exactly once through the `terminated` listener callback, carrying one of
//! the termination codes in [`crate::termination`]. Mixing the two would let
//! a caller `match` on an error type for something that is a normal protocol
//! exit, which is the mistake this split exists to prevent.

use thiserror::Error;

/// Result alias for fallible, synchronous core operations.
pub type EventCoreResult<T> = Result<T, EventCoreError>;

/// Configuration and call-time misuse errors.
///
/// These always fail before any request is sent: either the constructor
/// rejects a `Subscriber`/`Notifier` outright, or a call like `subscribe`
/// rejects the request instead of sending anything.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventCoreError {
    /// A body was supplied without a configured Content-Type.
    #[error("content type required to send a body, none configured")]
    MissingContentType,

    /// The event package name was empty or otherwise invalid.
    #[error("invalid event package name: {0}")]
    InvalidEventPackage(String),

    /// A required field for notifier construction was missing.
    #[error("invalid notifier configuration: {0}")]
    InvalidConfig(String),

    /// The dialog layer could not be built from the inbound SUBSCRIBE
    /// (for example: the request carried no Contact header).
    #[error("dialog construction failed: {0}")]
    DialogConstructionFailed(String),
}
