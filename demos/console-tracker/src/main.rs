//! # Console Tracker Demo
//!
//! Wires the client facade to a transport that prints every delivery,
//! walking through queue-then-replay, middleware enrichment, veto, and
//! error observation.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use beacon_core::{from_fn, Client, Configuration, Event, Forward, Properties, Transport};

// ============================================================================
// Transport (prints instead of uploading)
// ============================================================================

struct ConsoleTransport;

impl ConsoleTransport {
    fn print(&self, operation: &str, event: &Event) -> Result<()> {
        println!("[transport] {operation}: {}", serde_json::to_string(event)?);
        Ok(())
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn setup(&self, write_key: &str, configuration: &Configuration) -> Result<()> {
        println!(
            "[transport] setup with key {write_key}: {}",
            serde_json::to_string(configuration)?
        );
        Ok(())
    }

    async fn track(&self, event: &Event) -> Result<()> {
        self.print("track", event)
    }

    async fn screen(&self, event: &Event) -> Result<()> {
        self.print("screen", event)
    }

    async fn identify(&self, event: &Event) -> Result<()> {
        self.print("identify", event)
    }

    async fn group(&self, event: &Event) -> Result<()> {
        self.print("group", event)
    }

    async fn alias(&self, event: &Event) -> Result<()> {
        self.print("alias", event)
    }

    async fn reset(&self) -> Result<()> {
        println!("[transport] reset");
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        println!("[transport] flush");
        Ok(())
    }

    async fn enable(&self) -> Result<()> {
        println!("[transport] enable");
        Ok(())
    }

    async fn disable(&self) -> Result<()> {
        println!("[transport] disable");
        Ok(())
    }

    async fn get_anonymous_id(&self) -> Result<String> {
        Ok("console-anonymous-id".to_string())
    }

    async fn set_idfa(&self, idfa: &str) -> Result<()> {
        println!("[transport] setIdfa: {idfa}");
        Ok(())
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let client = Client::new(Arc::new(ConsoleTransport));

    client
        .middleware(from_fn(|event: Event| async move {
            Ok(Forward::Next(event.with_property("appVersion", "1.4.2")))
        }))
        .middleware(from_fn(|event: Event| async move {
            if event.name() == Some("Debug Ping") {
                Ok(Forward::Veto)
            } else {
                Ok(Forward::Next(event))
            }
        }))
        .on_error(|error| eprintln!("[handler] delivery failure: {error}"));

    // Calls made before setup queue up and replay once it completes.
    let early = tokio::spawn({
        let client = client.clone();
        async move { client.track("App Opened", Properties::new()).await }
    });

    client.setup("demo-write-key", Configuration::default()).await?;
    early.await??;

    client
        .track("Checkout", Properties::new().insert("total", 42.5))
        .await?;
    client
        .identify("user-7", Properties::new().insert("plan", "pro"))
        .await?;

    // Vetoed by the second middleware: resolves, nothing printed.
    client.track("Debug Ping", Properties::new()).await?;

    client.flush().await?;
    println!("anonymous id: {}", client.get_anonymous_id().await?);

    Ok(())
}
