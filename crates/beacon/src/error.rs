//! Error types for the tracking facade.

use thiserror::Error;

/// Errors surfaced by the client facade.
///
/// Fire-and-forget operations (`track`, `screen`, `flush`, ...) only ever
/// return [`Error::Validation`] directly; their transport and middleware
/// failures are delivered to the handlers registered on the
/// [`ErrorHub`](crate::ErrorHub). Value-returning operations
/// (`get_anonymous_id`) reject with the failure itself and bypass the hub.
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was missing or malformed. Raised before the call
    /// is queued.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The transport rejected a call.
    #[error("transport failure in `{operation}`: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A middleware step failed while transforming an event.
    #[error("middleware failure: {0}")]
    Middleware(#[source] anyhow::Error),

    /// Transport setup failed. The readiness gate stays closed and setup may
    /// be retried.
    #[error("setup failed: {0}")]
    SetupFailed(#[source] anyhow::Error),

    /// A queued call was discarded because setup failed before the gate
    /// opened.
    #[error("setup failed before the call could be delivered")]
    SetupAborted,

    /// `setup` or `use_native_configuration` was invoked after the client
    /// was already configured through either path.
    #[error("client is already configured")]
    AlreadyConfigured,

    /// The client was dropped while the call was still queued.
    #[error("client dropped before the call settled")]
    ClientDropped,
}

/// Result alias for facade operations.
pub type Result<T> = std::result::Result<T, Error>;
