//! Testing utilities for the Beacon tracking facade.
//!
//! Provides [`RecordingTransport`], a [`Transport`] double that records
//! every call in arrival order and can be told to fail individual
//! operations, so tests can assert on ordering, payloads and error
//! routing without a native layer.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use beacon_core::{Configuration, Event, Transport};

/// One call observed by [`RecordingTransport`], in arrival order.
#[derive(Debug, Clone)]
pub enum TransportCall {
    Setup {
        write_key: String,
        configuration: serde_json::Value,
    },
    Track(Event),
    Screen(Event),
    Identify(Event),
    Group(Event),
    Alias(Event),
    Reset,
    Flush,
    Enable,
    Disable,
    GetAnonymousId,
    SetIdfa(String),
}

impl TransportCall {
    /// The event carried by this call, when there is one.
    pub fn event(&self) -> Option<&Event> {
        match self {
            TransportCall::Track(event)
            | TransportCall::Screen(event)
            | TransportCall::Identify(event)
            | TransportCall::Group(event)
            | TransportCall::Alias(event) => Some(event),
            _ => None,
        }
    }

    /// The `event`/`name` context entry, when this call carries an event.
    pub fn event_name(&self) -> Option<&str> {
        self.event().and_then(Event::name)
    }
}

/// Transport double that records every call and fails on demand.
///
/// Failure injection is keyed by the transport operation name (`"track"`,
/// `"setup"`, `"getAnonymousId"`, ...); a failing operation records
/// nothing, matching a native layer that rejected the call outright.
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    failures: Mutex<HashMap<&'static str, String>>,
    anonymous_id: Mutex<String>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            anonymous_id: Mutex::new("anonymous-test-id".to_string()),
        }
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `operation` fail with `message` until cleared.
    pub fn fail_operation(&self, operation: &'static str, message: impl Into<String>) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation, message.into());
    }

    /// Lets a previously failing operation succeed again.
    pub fn clear_failure(&self, operation: &str) {
        self.failures.lock().unwrap().remove(operation);
    }

    pub fn set_anonymous_id(&self, id: impl Into<String>) {
        *self.anonymous_id.lock().unwrap() = id.into();
    }

    /// Every recorded call, in arrival order.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Names of event-carrying calls, in arrival order.
    pub fn event_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| call.event_name().map(str::to_string))
            .collect()
    }

    /// Serialized payloads of event-carrying calls, in arrival order.
    pub fn payloads(&self) -> Vec<serde_json::Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| call.event())
            .filter_map(|event| serde_json::to_value(event).ok())
            .collect()
    }

    fn check(&self, operation: &'static str) -> anyhow::Result<()> {
        if let Some(message) = self.failures.lock().unwrap().get(operation) {
            anyhow::bail!("{message}");
        }
        Ok(())
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn setup(&self, write_key: &str, configuration: &Configuration) -> anyhow::Result<()> {
        self.check("setup")?;
        self.record(TransportCall::Setup {
            write_key: write_key.to_string(),
            configuration: serde_json::to_value(configuration)?,
        });
        Ok(())
    }

    async fn track(&self, event: &Event) -> anyhow::Result<()> {
        self.check("track")?;
        self.record(TransportCall::Track(event.clone()));
        Ok(())
    }

    async fn screen(&self, event: &Event) -> anyhow::Result<()> {
        self.check("screen")?;
        self.record(TransportCall::Screen(event.clone()));
        Ok(())
    }

    async fn identify(&self, event: &Event) -> anyhow::Result<()> {
        self.check("identify")?;
        self.record(TransportCall::Identify(event.clone()));
        Ok(())
    }

    async fn group(&self, event: &Event) -> anyhow::Result<()> {
        self.check("group")?;
        self.record(TransportCall::Group(event.clone()));
        Ok(())
    }

    async fn alias(&self, event: &Event) -> anyhow::Result<()> {
        self.check("alias")?;
        self.record(TransportCall::Alias(event.clone()));
        Ok(())
    }

    async fn reset(&self) -> anyhow::Result<()> {
        self.check("reset")?;
        self.record(TransportCall::Reset);
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        self.check("flush")?;
        self.record(TransportCall::Flush);
        Ok(())
    }

    async fn enable(&self) -> anyhow::Result<()> {
        self.check("enable")?;
        self.record(TransportCall::Enable);
        Ok(())
    }

    async fn disable(&self) -> anyhow::Result<()> {
        self.check("disable")?;
        self.record(TransportCall::Disable);
        Ok(())
    }

    async fn get_anonymous_id(&self) -> anyhow::Result<String> {
        self.check("getAnonymousId")?;
        self.record(TransportCall::GetAnonymousId);
        Ok(self.anonymous_id.lock().unwrap().clone())
    }

    async fn set_idfa(&self, idfa: &str) -> anyhow::Result<()> {
        self.check("setIdfa")?;
        self.record(TransportCall::SetIdfa(idfa.to_string()));
        Ok(())
    }
}
