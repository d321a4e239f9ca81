//! Channel envelope construction.

use serde_json::{Map, Value};

use crate::message::keys;
use crate::{Channel, Message};

/// Options forwarded to the top level of a GCM envelope.
const GCM_OPTIONS: &[&str] = &[keys::DELAY_WHILE_IDLE, keys::TIME_TO_LIVE, keys::COLLAPSE_KEY];

/// Options forwarded to the top level of an FCM envelope.
const FCM_OPTIONS: &[&str] = &[keys::COLLAPSE_KEY];

/// Fields moved from options or extras into the FCM `notification` mapping.
const FCM_NOTIFICATION_FIELDS: &[&str] = &[keys::TITLE, keys::ICON];

/// Reserved APNS dictionary key.
pub const APS_KEY: &str = "aps";

/// Channel-specific payload built from a [`Message`].
///
/// JSON envelopes do not carry the recipient list; the wire encoder adds
/// `registration_ids` per request.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    channel: Channel,
    fields: Map<String, Value>,
}

impl Envelope {
    /// Channel the envelope was built for.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Top-level fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Convert into a JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Build the envelope for a channel.
pub fn build_envelope(channel: Channel, message: &Message) -> Envelope {
    let fields = match channel {
        Channel::Gcm => build_gcm(message),
        Channel::Fcm => build_fcm(message),
        Channel::Apns => build_apns(message),
    };

    Envelope { channel, fields }
}

fn build_gcm(message: &Message) -> Map<String, Value> {
    let mut data = message.extra.clone();
    if let Some(body) = &message.body {
        data.insert("message".to_string(), Value::String(body.clone()));
    }

    let mut fields = Map::new();
    if !data.is_empty() {
        fields.insert("data".to_string(), Value::Object(data));
    }
    copy_options(message, GCM_OPTIONS, &mut fields);
    fields
}

fn build_fcm(message: &Message) -> Map<String, Value> {
    let mut data = message.extra.clone();
    let mut notification = Map::new();

    if let Some(body) = &message.body {
        notification.insert("body".to_string(), Value::String(body.clone()));
    }
    for &key in FCM_NOTIFICATION_FIELDS {
        let from_extra = data.remove(key);
        if let Some(value) = message.get_option(key).cloned().or(from_extra) {
            notification.insert(key.to_string(), value);
        }
    }

    let mut fields = Map::new();
    if !notification.is_empty() {
        fields.insert("notification".to_string(), Value::Object(notification));
    }
    if !data.is_empty() {
        fields.insert("data".to_string(), Value::Object(data));
    }
    copy_options(message, FCM_OPTIONS, &mut fields);
    fields
}

fn build_apns(message: &Message) -> Map<String, Value> {
    let mut aps = Map::new();

    if let Some(alert) = apns_alert(message) {
        aps.insert("alert".to_string(), alert);
    }
    for key in [keys::BADGE, keys::SOUND, keys::CATEGORY] {
        if let Some(value) = message.get_option(key) {
            aps.insert(key.to_string(), value.clone());
        }
    }
    if message.option_flag(keys::CONTENT_AVAILABLE) {
        aps.insert("content-available".to_string(), Value::from(1));
    }

    let mut fields = message.extra.clone();
    fields.insert(APS_KEY.to_string(), Value::Object(aps));
    fields
}

/// Plain string alert, or a dictionary when localization keys are present.
fn apns_alert(message: &Message) -> Option<Value> {
    let localized = [
        (keys::LOC_KEY, "loc-key"),
        (keys::LOC_ARGS, "loc-args"),
        (keys::ACTION_LOC_KEY, "action-loc-key"),
    ];

    let mut alert = Map::new();
    for (option, wire_key) in localized {
        if let Some(value) = message.get_option(option) {
            alert.insert(wire_key.to_string(), value.clone());
        }
    }

    if alert.is_empty() {
        return message.body.clone().map(Value::String);
    }
    if let Some(body) = &message.body {
        alert.insert("body".to_string(), Value::String(body.clone()));
    }
    Some(Value::Object(alert))
}

fn copy_options(message: &Message, allowed: &[&str], fields: &mut Map<String, Value>) {
    for &key in allowed {
        if let Some(value) = message.get_option(key) {
            fields.insert(key.to_string(), value.clone());
        }
    }
}
