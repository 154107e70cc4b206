//! The middleware chain: ordered transform/veto steps applied to every
//! outgoing event.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use smallvec::SmallVec;
use tracing::debug;

use crate::event::Event;

/// A middleware's decision for one event.
#[derive(Debug)]
pub enum Forward {
    /// Continue the chain with this (possibly modified) event.
    Next(Event),
    /// Stop the chain. The event is dropped with no delivery and no error.
    Veto,
}

/// The chain's verdict for one event.
#[derive(Debug)]
pub enum ChainOutcome {
    /// Every step ran; deliver this event to the transport.
    Deliver(Event),
    /// A step vetoed the event.
    Vetoed,
}

/// A transform/veto step applied to every outgoing event.
///
/// Steps run in registration order; each receives the previous step's
/// output. Returning [`Forward::Next`] continues the chain, returning
/// [`Forward::Veto`] drops the event silently, and an `Err` becomes the
/// event's delivery failure.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn process(&self, event: Event) -> anyhow::Result<Forward>;
}

/// [`Middleware`] built from an async closure, see [`from_fn`].
pub struct FnMiddleware<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Forward>> + Send + 'static,
{
    async fn process(&self, event: Event) -> anyhow::Result<Forward> {
        (self.f)(event).await
    }
}

/// Adapts an async closure into a [`Middleware`].
///
/// ```ignore
/// client.middleware(from_fn(|event: Event| async move {
///     Ok(Forward::Next(event.with_property("region", "US")))
/// }));
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Forward>> + Send + 'static,
{
    FnMiddleware { f }
}

type Steps = SmallVec<[Arc<dyn Middleware>; 4]>;

/// Ordered sequence of middleware shared by every clone of the client.
///
/// Registration is allowed at any time. An event snapshots the sequence the
/// moment its chain starts, so a step registered mid-flight applies only to
/// events dispatched after it.
#[derive(Default)]
pub struct MiddlewareChain {
    steps: RwLock<Steps>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step. Execution order is registration order.
    pub fn push(&self, step: Arc<dyn Middleware>) {
        self.steps
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(step);
    }

    pub fn len(&self) -> usize {
        self.steps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `event` through a snapshot of the current steps, awaiting each
    /// one before invoking the next.
    pub async fn run(&self, event: Event) -> anyhow::Result<ChainOutcome> {
        let steps: Steps = self
            .steps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut current = event;
        for (index, step) in steps.iter().enumerate() {
            let kind = current.kind();
            match step.process(current).await? {
                Forward::Next(event) => current = event,
                Forward::Veto => {
                    debug!(?kind, step = index, "event vetoed by middleware");
                    return Ok(ChainOutcome::Vetoed);
                }
            }
        }
        Ok(ChainOutcome::Deliver(current))
    }
}
