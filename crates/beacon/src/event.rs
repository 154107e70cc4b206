//! Event construction and the property/option bags it carries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// The action an [`Event`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Track,
    Screen,
    Identify,
    Group,
    Alias,
    Reset,
}

impl EventKind {
    /// Name of the transport operation this kind maps to.
    pub fn operation_name(self) -> &'static str {
        match self {
            EventKind::Track => "track",
            EventKind::Screen => "screen",
            EventKind::Identify => "identify",
            EventKind::Group => "group",
            EventKind::Alias => "alias",
            EventKind::Reset => "reset",
        }
    }
}

/// One analytics action, normalized before dispatch.
///
/// Immutable once constructed. Middleware derives a modified copy through
/// the consuming `with_*` methods rather than mutating in place, so an
/// event observed at any point in the chain is exactly what the previous
/// step produced.
///
/// The context map carries the kind-specific payload under wire-format
/// keys: `event`/`properties` for track, `name`/`properties` for screen,
/// `userId`/`traits` for identify, `groupId`/`traits` for group and
/// `newId` for alias.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    kind: EventKind,
    #[serde(flatten)]
    context: Map<String, Value>,
    #[serde(skip_serializing_if = "Options::is_empty")]
    options: Options,
    message_id: Uuid,
    timestamp: DateTime<Utc>,
}

impl Event {
    fn new(kind: EventKind, context: Map<String, Value>) -> Self {
        Self {
            kind,
            context,
            options: Options::default(),
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }

    /// A named action the user performed, with free-form properties.
    pub fn track(event: impl Into<String>, properties: Properties) -> Self {
        let mut context = Map::new();
        context.insert("event".into(), Value::String(event.into()));
        context.insert("properties".into(), properties.into_value());
        Self::new(EventKind::Track, context)
    }

    /// A screen the user viewed.
    pub fn screen(name: impl Into<String>, properties: Properties) -> Self {
        let mut context = Map::new();
        context.insert("name".into(), Value::String(name.into()));
        context.insert("properties".into(), properties.into_value());
        Self::new(EventKind::Screen, context)
    }

    /// Associates the user with an id and traits.
    pub fn identify(user_id: impl Into<String>, traits: Properties) -> Self {
        let mut context = Map::new();
        context.insert("userId".into(), Value::String(user_id.into()));
        context.insert("traits".into(), traits.into_value());
        Self::new(EventKind::Identify, context)
    }

    /// Associates the user with a group.
    pub fn group(group_id: impl Into<String>, traits: Properties) -> Self {
        let mut context = Map::new();
        context.insert("groupId".into(), Value::String(group_id.into()));
        context.insert("traits".into(), traits.into_value());
        Self::new(EventKind::Group, context)
    }

    /// Merges the current identity into a new one.
    pub fn alias(new_id: impl Into<String>) -> Self {
        let mut context = Map::new();
        context.insert("newId".into(), Value::String(new_id.into()));
        Self::new(EventKind::Alias, context)
    }

    /// Clears the current identity. Carries no payload but still runs the
    /// middleware chain like every other event.
    pub fn reset() -> Self {
        Self::new(EventKind::Reset, Map::new())
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The `event` (track) or `name` (screen) context entry.
    pub fn name(&self) -> Option<&str> {
        self.context
            .get("event")
            .or_else(|| self.context.get("name"))
            .and_then(Value::as_str)
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Looks up a key inside the `properties` context entry.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.context.get("properties")?.get(key)
    }

    /// Returns a copy with `key` set in the context map.
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Returns a copy with `key` set inside the `properties` object,
    /// creating the object if the event had none.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let properties = self
            .context
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = properties {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Returns a copy carrying these routing options.
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }
}

/// Builder for event properties and identity traits.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    inner: Map<String, Value>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, accepting anything JSON-representable.
    pub fn insert(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inner.insert(key.into(), value.into());
        self
    }

    /// Folds `other` into this set. On a shared key, `other` wins.
    pub fn merge(mut self, other: Properties) -> Self {
        self.inner.extend(other.inner);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.inner)
    }
}

impl From<Properties> for Value {
    fn from(properties: Properties) -> Value {
        properties.into_value()
    }
}

impl From<Map<String, Value>> for Properties {
    fn from(inner: Map<String, Value>) -> Self {
        Self { inner }
    }
}

/// Per-call routing hints, forwarded to the transport untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Options {
    /// Enables or disables named integrations for this one call.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub integrations: Map<String, Value>,
    /// Unrecognized hints, forwarded opaquely.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes this call to (`true`) or away from (`false`) one integration.
    pub fn integration(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.integrations.insert(name.into(), Value::Bool(enabled));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.integrations.is_empty() && self.extra.is_empty()
    }
}
