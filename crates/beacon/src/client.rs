//! The public client facade: validation, readiness gating, middleware
//! dispatch and error routing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, Options, Properties};
use crate::gate::ReadinessGate;
use crate::hub::{ErrorHub, HandlerToken};
use crate::middleware::{ChainOutcome, Middleware, MiddlewareChain};
use crate::transport::Transport;

/// How far configuration has progressed. Guards against configuring the
/// client twice through `setup` and `use_native_configuration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigState {
    Unconfigured,
    InProgress,
    Configured,
}

/// Control operations that reach the transport without an event payload.
#[derive(Clone, Copy)]
enum ControlOp {
    Flush,
    Enable,
    Disable,
}

impl ControlOp {
    fn name(self) -> &'static str {
        match self {
            ControlOp::Flush => "flush",
            ControlOp::Enable => "enable",
            ControlOp::Disable => "disable",
        }
    }
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    chain: Arc<MiddlewareChain>,
    gate: ReadinessGate,
    hub: ErrorHub,
    config_state: Mutex<ConfigState>,
}

/// The application-facing tracking client.
///
/// Cheap to clone; every clone shares one readiness gate, middleware chain
/// and error hub. The application owns the instance it constructs -
/// nothing here is ambient or process-global.
///
/// Calls made before [`setup`](Client::setup) completes suspend and replay
/// in order once it does; see [`ReadinessGate`]. Every event passes the
/// middleware chain exactly once before reaching the transport, and
/// transport failures on fire-and-forget calls surface through
/// [`on_error`](Client::on_error) handlers rather than as call failures.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                chain: Arc::new(MiddlewareChain::new()),
                gate: ReadinessGate::new(),
                hub: ErrorHub::new(),
                config_state: Mutex::new(ConfigState::Unconfigured),
            }),
        }
    }

    /// Registers a middleware step. Chainable.
    ///
    /// Safe to call at any time: steps registered while calls are still
    /// queued apply to them, because an event snapshots the chain only
    /// when its own dispatch starts.
    pub fn middleware<M: Middleware>(&self, middleware: M) -> &Self {
        self.inner.chain.push(Arc::new(middleware));
        self
    }

    /// Registers a failure observer for fire-and-forget calls. Chainable.
    pub fn on_error<F>(&self, handler: F) -> &Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.inner.hub.register(handler);
        self
    }

    /// Like [`on_error`](Client::on_error), but returns the token needed
    /// to remove the handler again.
    pub fn register_error_handler<F>(&self, handler: F) -> HandlerToken
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.inner.hub.register(handler)
    }

    pub fn unregister_error_handler(&self, token: HandlerToken) -> bool {
        self.inner.hub.unregister(token)
    }

    /// True once setup (or `use_native_configuration`) has completed and
    /// the queue has drained.
    pub fn is_ready(&self) -> bool {
        self.inner.gate.is_ready()
    }

    /// Initializes the transport, then opens the readiness gate and
    /// replays every queued call in admission order.
    ///
    /// On failure the gate stays closed and every queued call settles with
    /// [`Error::SetupAborted`]: fire-and-forget calls resolve and notify
    /// the error handlers, value-returning calls reject. The client may
    /// then retry `setup`.
    pub async fn setup(&self, write_key: &str, configuration: Configuration) -> Result<()> {
        if write_key.trim().is_empty() {
            return Err(Error::Validation("write key must not be empty".into()));
        }
        self.begin_configuration()?;

        match self.inner.transport.setup(write_key, &configuration).await {
            Ok(()) => {
                self.set_config_state(ConfigState::Configured);
                debug!("transport setup complete; opening readiness gate");
                self.inner.gate.open().await;
                Ok(())
            }
            Err(source) => {
                error!(error = %source, "transport setup failed");
                self.set_config_state(ConfigState::Unconfigured);
                self.inner.gate.abort().await;
                Err(Error::SetupFailed(source))
            }
        }
    }

    /// Reaches readiness without a write key, for applications that
    /// configure the native layer directly. Calling this after `setup`
    /// (or vice versa) is a configuration error.
    pub async fn use_native_configuration(&self) -> Result<()> {
        self.begin_configuration()?;
        self.set_config_state(ConfigState::Configured);
        debug!("native configuration assumed; opening readiness gate");
        self.inner.gate.open().await;
        Ok(())
    }

    /// Records an action the user performed.
    ///
    /// Fire-and-forget: only validation failures return an error.
    /// Transport and middleware failures are delivered to the handlers
    /// registered with [`on_error`](Client::on_error) while the call
    /// itself still resolves.
    pub async fn track(&self, event: &str, properties: Properties) -> Result<()> {
        self.track_with_options(event, properties, Options::default())
            .await
    }

    pub async fn track_with_options(
        &self,
        event: &str,
        properties: Properties,
        options: Options,
    ) -> Result<()> {
        let name = non_empty(event, "event name")?;
        self.deliver(Event::track(name, properties).with_options(options))
            .await
    }

    /// Records a screen the user viewed.
    pub async fn screen(&self, name: &str, properties: Properties) -> Result<()> {
        self.screen_with_options(name, properties, Options::default())
            .await
    }

    pub async fn screen_with_options(
        &self,
        name: &str,
        properties: Properties,
        options: Options,
    ) -> Result<()> {
        let name = non_empty(name, "screen name")?;
        self.deliver(Event::screen(name, properties).with_options(options))
            .await
    }

    /// Associates the user with an id and traits.
    pub async fn identify(&self, user_id: &str, traits: Properties) -> Result<()> {
        self.identify_with_options(user_id, traits, Options::default())
            .await
    }

    pub async fn identify_with_options(
        &self,
        user_id: &str,
        traits: Properties,
        options: Options,
    ) -> Result<()> {
        let user_id = non_empty(user_id, "user id")?;
        self.deliver(Event::identify(user_id, traits).with_options(options))
            .await
    }

    /// Associates the user with a group.
    pub async fn group(&self, group_id: &str, traits: Properties) -> Result<()> {
        self.group_with_options(group_id, traits, Options::default())
            .await
    }

    pub async fn group_with_options(
        &self,
        group_id: &str,
        traits: Properties,
        options: Options,
    ) -> Result<()> {
        let group_id = non_empty(group_id, "group id")?;
        self.deliver(Event::group(group_id, traits).with_options(options))
            .await
    }

    /// Merges the current identity into a new one.
    pub async fn alias(&self, new_id: &str) -> Result<()> {
        self.alias_with_options(new_id, Options::default()).await
    }

    pub async fn alias_with_options(&self, new_id: &str, options: Options) -> Result<()> {
        let new_id = non_empty(new_id, "alias id")?;
        self.deliver(Event::alias(new_id).with_options(options)).await
    }

    /// Clears the current identity. Runs through the middleware chain like
    /// any other event, so a step may observe or veto it.
    pub async fn reset(&self) -> Result<()> {
        self.deliver(Event::reset()).await
    }

    /// Asks the transport to upload everything it has buffered.
    pub async fn flush(&self) -> Result<()> {
        self.control(ControlOp::Flush).await
    }

    /// Resumes event collection after [`disable`](Client::disable).
    pub async fn enable(&self) -> Result<()> {
        self.control(ControlOp::Enable).await
    }

    /// Stops event collection until [`enable`](Client::enable) is called.
    pub async fn disable(&self) -> Result<()> {
        self.control(ControlOp::Disable).await
    }

    /// Forwards the advertising identifier to the transport.
    pub async fn set_idfa(&self, idfa: &str) -> Result<()> {
        let idfa = non_empty(idfa, "advertising identifier")?;
        let transport = Arc::clone(&self.inner.transport);
        let outcome = self
            .inner
            .gate
            .admit(move || async move {
                transport
                    .set_idfa(&idfa)
                    .await
                    .map_err(|source| Error::Transport {
                        operation: "setIdfa",
                        source,
                    })
            })
            .await;
        self.absorb(outcome)
    }

    /// The anonymous id generated by the transport.
    ///
    /// Value-returning: failures reject the call directly and bypass the
    /// error handlers. Suspends like every other call until the client is
    /// ready.
    pub async fn get_anonymous_id(&self) -> Result<String> {
        let transport = Arc::clone(&self.inner.transport);
        self.inner
            .gate
            .admit(move || async move {
                transport
                    .get_anonymous_id()
                    .await
                    .map_err(|source| Error::Transport {
                        operation: "getAnonymousId",
                        source,
                    })
            })
            .await
    }

    /// The single path every event takes: gate admission, middleware chain
    /// (snapshotted when the call actually runs), then the transport
    /// operation matching the event kind.
    async fn deliver(&self, event: Event) -> Result<()> {
        let transport = Arc::clone(&self.inner.transport);
        let chain = Arc::clone(&self.inner.chain);
        let outcome = self
            .inner
            .gate
            .admit(move || async move {
                let event = match chain.run(event).await.map_err(Error::Middleware)? {
                    ChainOutcome::Vetoed => return Ok(()),
                    ChainOutcome::Deliver(event) => event,
                };
                let operation = event.kind().operation_name();
                let result = match event.kind() {
                    EventKind::Track => transport.track(&event).await,
                    EventKind::Screen => transport.screen(&event).await,
                    EventKind::Identify => transport.identify(&event).await,
                    EventKind::Group => transport.group(&event).await,
                    EventKind::Alias => transport.alias(&event).await,
                    EventKind::Reset => transport.reset().await,
                };
                result.map_err(|source| Error::Transport { operation, source })
            })
            .await;
        self.absorb(outcome)
    }

    async fn control(&self, op: ControlOp) -> Result<()> {
        let transport = Arc::clone(&self.inner.transport);
        let outcome = self
            .inner
            .gate
            .admit(move || async move {
                let result = match op {
                    ControlOp::Flush => transport.flush().await,
                    ControlOp::Enable => transport.enable().await,
                    ControlOp::Disable => transport.disable().await,
                };
                result.map_err(|source| Error::Transport {
                    operation: op.name(),
                    source,
                })
            })
            .await;
        self.absorb(outcome)
    }

    /// Converts dispatch failures on fire-and-forget calls into hub
    /// notifications. Validation failures return before dispatch and never
    /// reach this point.
    fn absorb(&self, outcome: Result<()>) -> Result<()> {
        if let Err(err) = outcome {
            error!(error = %err, "fire-and-forget call failed");
            self.inner.hub.notify(&err);
        }
        Ok(())
    }

    fn begin_configuration(&self) -> Result<()> {
        let mut state = self.config_state();
        match *state {
            ConfigState::Unconfigured => {
                *state = ConfigState::InProgress;
                Ok(())
            }
            ConfigState::InProgress | ConfigState::Configured => Err(Error::AlreadyConfigured),
        }
    }

    fn set_config_state(&self, next: ConfigState) {
        *self.config_state() = next;
    }

    fn config_state(&self) -> MutexGuard<'_, ConfigState> {
        self.inner
            .config_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn non_empty(value: &str, what: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{what} must not be empty")));
    }
    Ok(value.to_string())
}
