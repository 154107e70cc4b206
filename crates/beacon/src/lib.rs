//! # Beacon
//!
//! An ordered, middleware-extensible facade between application code and an
//! asynchronous analytics transport that may not be ready yet.
//!
//! ## Core Concepts
//!
//! Beacon separates **admission** from **delivery**:
//! - [`Client`] = the calls the application makes (track/screen/identify/...)
//! - [`Transport`] = the external layer that actually batches and uploads
//!
//! The key principle: **every call is delivered exactly once, in order**,
//! no matter when it was made relative to transport setup.
//!
//! ## Architecture
//!
//! ```text
//! Application
//!     │
//!     ▼ track() / screen() / identify() / ...
//! Client ── validate ──► ReadinessGate
//!                             │
//!                 not ready ──┤── ready
//!                      queue  │  pass through
//!                             ▼
//!                      MiddlewareChain
//!                             │
//!              Veto ◄─────────┤
//!          (silent drop)      ▼
//!                        Transport call
//!                             │
//!                     Err ────┤──── Ok
//!                      ▼      ▼
//!                  ErrorHub  resolve
//! ```
//!
//! ## Key Invariants
//!
//! 1. **No premature delivery** - nothing reaches the transport before
//!    setup completes
//! 2. **FIFO replay** - calls queued before readiness replay in admission
//!    order, and later calls never overtake them
//! 3. **One chain, every event** - each dispatched event passes the
//!    middleware chain exactly once, internally generated events included
//! 4. **Veto is not an error** - a vetoed event resolves its caller and
//!    touches neither transport nor error handlers
//! 5. **Fire-and-forget stays quiet** - delivery failures on void calls
//!    surface through registered error handlers, never as call failures
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use beacon_core::{from_fn, Client, Configuration, Event, Forward, Properties};
//!
//! let client = Client::new(Arc::new(my_transport));
//!
//! client
//!     .middleware(from_fn(|event: Event| async move {
//!         Ok(Forward::Next(event.with_property("region", "US")))
//!     }))
//!     .on_error(|err| eprintln!("delivery failure: {err}"));
//!
//! // Calls made before setup queue up...
//! let early = tokio::spawn({
//!     let client = client.clone();
//!     async move { client.track("App Opened", Properties::new()).await }
//! });
//!
//! // ...and replay, in order, once setup completes.
//! client.setup("write-key", Configuration::default()).await?;
//! early.await??;
//!
//! client.track("Checkout", Properties::new().insert("total", 42.5)).await?;
//! ```
//!
//! ## What This Is Not
//!
//! Beacon is **not**:
//! - A batching or upload engine (the transport owns that)
//! - A persistence layer for queued events
//! - A retry policy (a failed delivery is reported, not replayed)

// Core modules
mod client;
mod config;
mod error;
mod event;
mod gate;
mod hub;
mod middleware;
mod transport;

// Re-export the facade
pub use client::Client;

// Re-export event types
pub use event::{Event, EventKind, Options, Properties};

// Re-export middleware types
pub use middleware::{from_fn, ChainOutcome, FnMiddleware, Forward, Middleware, MiddlewareChain};

// Re-export readiness gate
pub use gate::ReadinessGate;

// Re-export error hub types
pub use hub::{ErrorHub, HandlerToken};

// Re-export error types
pub use error::{Error, Result};

// Re-export configuration types
pub use config::{AndroidConfiguration, Configuration, Integration, IosConfiguration};

// Re-export the transport boundary
pub use transport::Transport;

// Re-export commonly used external types
pub use async_trait::async_trait;
