//! The bridge boundary: the narrow interface the core consumes.

use async_trait::async_trait;

use crate::config::Configuration;
use crate::event::Event;

/// Asynchronous transport the facade forwards calls to.
///
/// One operation per public client method. Implementations own batching,
/// persistence and upload; the core relies only on the call/resolve/reject
/// contract. Failures are reported through `anyhow` and wrapped by the
/// client into [`Error::Transport`](crate::Error::Transport).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Initializes the native layer with a write key and configuration.
    async fn setup(&self, write_key: &str, configuration: &Configuration) -> anyhow::Result<()>;

    async fn track(&self, event: &Event) -> anyhow::Result<()>;
    async fn screen(&self, event: &Event) -> anyhow::Result<()>;
    async fn identify(&self, event: &Event) -> anyhow::Result<()>;
    async fn group(&self, event: &Event) -> anyhow::Result<()>;
    async fn alias(&self, event: &Event) -> anyhow::Result<()>;

    /// Clears the current identity and traits.
    async fn reset(&self) -> anyhow::Result<()>;

    /// Uploads everything the transport has buffered.
    async fn flush(&self) -> anyhow::Result<()>;

    async fn enable(&self) -> anyhow::Result<()>;
    async fn disable(&self) -> anyhow::Result<()>;

    /// The anonymous id the transport generated for this installation.
    async fn get_anonymous_id(&self) -> anyhow::Result<String>;

    /// Forwards the advertising identifier to the native layer.
    async fn set_idfa(&self, idfa: &str) -> anyhow::Result<()>;
}
