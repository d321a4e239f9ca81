//! Push message content.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Option keys understood by at least one channel.
pub mod keys {
    /// Collapse/grouping key (JSON channels).
    pub const COLLAPSE_KEY: &str = "collapse_key";
    /// Time to live in seconds (GCM).
    pub const TIME_TO_LIVE: &str = "time_to_live";
    /// Hold delivery while the device is idle (GCM).
    pub const DELAY_WHILE_IDLE: &str = "delay_while_idle";
    /// Frame priority (APNS).
    pub const PRIORITY: &str = "priority";
    /// Notification title (FCM).
    pub const TITLE: &str = "title";
    /// Notification icon (FCM).
    pub const ICON: &str = "icon";
    /// Sound name (APNS).
    pub const SOUND: &str = "sound";
    /// Badge count (APNS).
    pub const BADGE: &str = "badge";
    /// Notification category (APNS).
    pub const CATEGORY: &str = "category";
    /// Background content flag (APNS).
    pub const CONTENT_AVAILABLE: &str = "content_available";
    /// Frame identifier (APNS).
    pub const IDENTIFIER: &str = "identifier";
    /// Frame expiration as epoch seconds (APNS).
    pub const EXPIRATION: &str = "expiration";
    /// Localized alert key (APNS).
    pub const LOC_KEY: &str = "loc_key";
    /// Localized alert arguments (APNS).
    pub const LOC_ARGS: &str = "loc_args";
    /// Localized action button key (APNS).
    pub const ACTION_LOC_KEY: &str = "action_loc_key";
}

/// Push message content.
///
/// `options` is an open mapping: each channel picks the keys it understands
/// and silently ignores the rest. `extra` carries arbitrary data fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message body. May be omitted for data-only streaming payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Channel options.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
    /// Extra data fields.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Create a message with a body.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// Create a message without a body.
    pub fn data_only() -> Self {
        Self::default()
    }

    /// Add an extra data field.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Set an option. Keys a channel does not understand are ignored by it.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Set the collapse key.
    pub fn collapse_key(self, key: impl Into<String>) -> Self {
        self.option(keys::COLLAPSE_KEY, key.into())
    }

    /// Set the time to live in seconds.
    pub fn time_to_live(self, seconds: u32) -> Self {
        self.option(keys::TIME_TO_LIVE, seconds)
    }

    /// Set delay-while-idle.
    pub fn delay_while_idle(self, delay: bool) -> Self {
        self.option(keys::DELAY_WHILE_IDLE, delay)
    }

    /// Set the notification title.
    pub fn title(self, title: impl Into<String>) -> Self {
        self.option(keys::TITLE, title.into())
    }

    /// Set the notification icon.
    pub fn icon(self, icon: impl Into<String>) -> Self {
        self.option(keys::ICON, icon.into())
    }

    /// Set the sound.
    pub fn sound(self, sound: impl Into<String>) -> Self {
        self.option(keys::SOUND, sound.into())
    }

    /// Set the badge count.
    pub fn badge(self, count: u32) -> Self {
        self.option(keys::BADGE, count)
    }

    /// Set the category.
    pub fn category(self, category: impl Into<String>) -> Self {
        self.option(keys::CATEGORY, category.into())
    }

    /// Mark as background content.
    pub fn content_available(self) -> Self {
        self.option(keys::CONTENT_AVAILABLE, true)
    }

    /// Set the frame identifier.
    pub fn identifier(self, identifier: u32) -> Self {
        self.option(keys::IDENTIFIER, identifier)
    }

    /// Set the frame expiration (epoch seconds).
    pub fn expiration(self, expiration: u32) -> Self {
        self.option(keys::EXPIRATION, expiration)
    }

    /// Set the frame priority.
    pub fn priority(self, priority: u8) -> Self {
        self.option(keys::PRIORITY, priority)
    }

    /// Set the localized alert key.
    pub fn loc_key(self, key: impl Into<String>) -> Self {
        self.option(keys::LOC_KEY, key.into())
    }

    /// Set the localized alert arguments.
    pub fn loc_args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<Value> = args.into_iter().map(|a| Value::String(a.into())).collect();
        self.option(keys::LOC_ARGS, args)
    }

    /// Set the localized action key.
    pub fn action_loc_key(self, key: impl Into<String>) -> Self {
        self.option(keys::ACTION_LOC_KEY, key.into())
    }

    /// Look up an option.
    pub fn get_option(&self, key: &str) -> Option<&Value> {
        self.options.get(key).filter(|v| !v.is_null())
    }

    /// Look up an integer option.
    pub fn option_u64(&self, key: &str) -> Option<u64> {
        self.get_option(key).and_then(Value::as_u64)
    }

    /// Look up a boolean option. Integers are read as flags.
    pub fn option_flag(&self, key: &str) -> bool {
        match self.get_option(key) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(n)) => n.as_u64().is_some_and(|n| n != 0),
            _ => false,
        }
    }
}
