//! Setup configuration forwarded to the transport.
//!
//! The core interprets none of these values; the whole structure is
//! serialized and handed to the transport during setup. Options this
//! client family does not recognize travel in [`Configuration::extra`]
//! and are forwarded opaquely.

use serde::Serialize;
use serde_json::{Map, Value};

/// Options recognized by the transport layer.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Automatically record screen transitions.
    pub record_screen_views: bool,
    /// Emit application lifecycle events (installed, opened, backgrounded).
    pub track_app_lifecycle_events: bool,
    /// Number of events the transport accumulates before uploading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flush_at: Option<u32>,
    /// Ask the transport for verbose diagnostics.
    pub debug: bool,
    pub ios: IosConfiguration,
    pub android: AndroidConfiguration,
    /// Integrations the transport should initialize or suppress.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub using: Vec<Integration>,
    /// Unrecognized options, forwarded opaquely.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }
}

/// iOS-specific transport options.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IosConfiguration {
    pub track_advertising: bool,
    pub track_deep_link_attribution: bool,
}

/// Android-specific transport options.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidConfiguration {
    pub collect_device_id: bool,
    /// Milliseconds between automatic uploads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flush_interval: Option<u64>,
}

/// How the transport should treat one named integration.
///
/// Opaque to the core: the variants exist so configuration stays typed,
/// but only the transport gives them meaning.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Integration {
    /// Initialize the integration with transport-interpreted options.
    Enabled {
        name: String,
        #[serde(skip_serializing_if = "Map::is_empty")]
        options: Map<String, Value>,
    },
    /// Marker keeping a bundled integration from initializing.
    Disabled { name: String },
}
