//! The readiness gate: queues calls made before transport setup completes
//! and replays them, in order, once it does.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{Error, Result};

/// How a pending entry is settled when it leaves the queue.
enum Settlement {
    /// Setup completed; run the queued call.
    Run,
    /// Setup failed; discard the call without running it.
    Abort,
}

type PendingCall = Box<dyn FnOnce(Settlement) -> BoxFuture<'static, ()> + Send>;

enum Admission<F, T> {
    /// The gate was already open; the caller runs the call itself.
    Immediate(F),
    /// The call was queued; the receiver settles when the gate does.
    Queued(oneshot::Receiver<Result<T>>),
}

#[derive(Default)]
struct GateState {
    ready: bool,
    draining: bool,
    queue: VecDeque<PendingCall>,
}

/// Queue-and-release mechanism ensuring nothing reaches the transport
/// before setup completes.
///
/// Calls admitted while the gate is closed suspend until [`open`] replays
/// them. Replay is strictly FIFO: each queued call runs to completion
/// before the next starts, and a call admitted mid-drain joins the tail of
/// the same queue rather than racing ahead of it. Once open, the gate
/// never closes again for the lifetime of the instance - except through
/// [`abort`], which only applies while it is still closed.
///
/// The queue is the one piece of shared mutable state in the crate; its
/// lock is never held across an await.
///
/// [`open`]: ReadinessGate::open
/// [`abort`]: ReadinessGate::abort
#[derive(Default)]
pub struct ReadinessGate {
    state: Mutex<GateState>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once [`open`](ReadinessGate::open) has fully drained the queue.
    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    /// Number of calls currently waiting for the gate to open.
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Admits `call`: executes it immediately when the gate is open,
    /// otherwise queues it and suspends the caller until the gate settles
    /// it - successfully via [`open`](ReadinessGate::open), or with
    /// [`Error::SetupAborted`] via [`abort`](ReadinessGate::abort).
    pub async fn admit<T, F, Fut>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        match self.submit(call) {
            Admission::Immediate(call) => call().await,
            Admission::Queued(rx) => rx.await.unwrap_or(Err(Error::ClientDropped)),
        }
    }

    fn submit<T, F, Fut>(&self, call: F) -> Admission<F, T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut state = self.lock();
        if state.ready {
            return Admission::Immediate(call);
        }

        let (tx, rx) = oneshot::channel();
        state.queue.push_back(Box::new(move |settlement| {
            Box::pin(async move {
                let outcome = match settlement {
                    Settlement::Run => call().await,
                    Settlement::Abort => Err(Error::SetupAborted),
                };
                let _ = tx.send(outcome);
            })
        }));
        debug!(pending = state.queue.len(), "call queued before readiness");
        Admission::Queued(rx)
    }

    /// Transitions to ready and replays the queue in admission order,
    /// awaiting each call to completion before starting the next.
    ///
    /// Idempotent: a second call, or a call while a drain is already in
    /// flight, returns immediately without replaying anything.
    pub async fn open(&self) {
        {
            let mut state = self.lock();
            if state.ready || state.draining {
                return;
            }
            state.draining = true;
        }

        let mut replayed = 0usize;
        loop {
            let next = {
                let mut state = self.lock();
                match state.queue.pop_front() {
                    Some(entry) => Some(entry),
                    None => {
                        state.ready = true;
                        state.draining = false;
                        None
                    }
                }
            };
            let Some(entry) = next else { break };
            entry(Settlement::Run).await;
            replayed += 1;
        }
        debug!(replayed, "readiness gate open");
    }

    /// Settles every queued call with [`Error::SetupAborted`] without
    /// running it, leaving the gate closed so setup can be retried.
    ///
    /// No-op once the gate is open or a drain is in flight.
    pub async fn abort(&self) {
        let aborted: Vec<PendingCall> = {
            let mut state = self.lock();
            if state.ready || state.draining {
                return;
            }
            state.queue.drain(..).collect()
        };
        if aborted.is_empty() {
            return;
        }
        debug!(discarded = aborted.len(), "readiness gate aborted");
        for entry in aborted {
            entry(Settlement::Abort).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
