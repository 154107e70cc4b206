//! Multi-observer registry for failures on fire-and-forget calls.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;
use uuid::Uuid;

use crate::error::Error;

type Handler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Token returned by [`ErrorHub::register`], used to remove the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerToken(Uuid);

/// Failure observers for calls whose result carries no value.
///
/// Every registered handler sees every qualifying failure, in registration
/// order - there are no single-consumer semantics. A handler that panics is
/// isolated: the panic is caught and logged, and the remaining handlers
/// still run.
#[derive(Default)]
pub struct ErrorHub {
    handlers: Mutex<Vec<(HandlerToken, Handler)>>,
}

impl ErrorHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer. Handlers are invoked in registration order.
    pub fn register<F>(&self, handler: F) -> HandlerToken
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        let token = HandlerToken(Uuid::new_v4());
        self.lock().push((token, Arc::new(handler)));
        token
    }

    /// Removes a handler. Returns `false` when the token is unknown.
    pub fn unregister(&self, token: HandlerToken) -> bool {
        let mut handlers = self.lock();
        let before = handlers.len();
        handlers.retain(|(registered, _)| *registered != token);
        handlers.len() != before
    }

    pub fn handler_count(&self) -> usize {
        self.lock().len()
    }

    /// Invokes every handler with `error`, synchronously and in
    /// registration order.
    pub fn notify(&self, error: &Error) {
        // Snapshot so a handler may register or unregister without
        // deadlocking the hub.
        let snapshot: Vec<Handler> = self
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(error))).is_err() {
                warn!("error handler panicked; remaining handlers still run");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(HandlerToken, Handler)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
