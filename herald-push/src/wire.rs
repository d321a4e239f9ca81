//! Wire encoding: canonical JSON documents and APNS binary frames.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};

use crate::message::keys;
use crate::payload::Envelope;
use crate::{EncodingError, Message};

/// Content type of JSON channel requests.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Default APNS payload ceiling in bytes.
pub const DEFAULT_MAX_FRAME_PAYLOAD: usize = 2048;

/// Default APNS frame priority (send immediately).
pub const DEFAULT_PRIORITY: u8 = 10;

/// Default APNS expiration offset when the message sets none.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const FRAME_COMMAND: u8 = 2;
const ITEM_TOKEN: u8 = 1;
const ITEM_PAYLOAD: u8 = 2;
const ITEM_IDENTIFIER: u8 = 3;
const ITEM_EXPIRATION: u8 = 4;
const ITEM_PRIORITY: u8 = 5;
const ITEM_HEADER_LEN: usize = 3;

/// Serialize a JSON value with keys sorted at every depth and no whitespace.
pub fn canonical_json(value: &Value) -> Vec<u8> {
    sorted(value).to_string().into_bytes()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::new();
            for (key, value) in entries {
                out.insert(key.clone(), sorted(value));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Encode a JSON channel request body: the envelope plus `registration_ids`.
pub fn encode_json(envelope: &Envelope, registration_ids: &[&str]) -> Vec<u8> {
    let mut fields = envelope.fields().clone();
    fields.insert(
        "registration_ids".to_string(),
        Value::Array(
            registration_ids
                .iter()
                .map(|id| Value::String((*id).to_string()))
                .collect(),
        ),
    );
    canonical_json(&Value::Object(fields))
}

/// Per-frame header values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOptions {
    /// Notification identifier echoed in error responses.
    pub identifier: u32,
    /// Expiration as epoch seconds.
    pub expiration: u32,
    /// Delivery priority (10 immediate, 5 power-considerate).
    pub priority: u8,
}

impl FrameOptions {
    /// Read frame options from a message, filling in defaults relative to `now`.
    pub fn from_message(message: &Message, now: SystemTime) -> Self {
        let identifier = message
            .option_u64(keys::IDENTIFIER)
            .map(saturating_u32)
            .unwrap_or(0);
        let expiration = message
            .option_u64(keys::EXPIRATION)
            .map(saturating_u32)
            .unwrap_or_else(|| {
                let at = now + DEFAULT_EXPIRATION;
                let secs = at
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                saturating_u32(secs)
            });
        let priority = message
            .option_u64(keys::PRIORITY)
            .map(|p| u8::try_from(p).unwrap_or(u8::MAX))
            .unwrap_or(DEFAULT_PRIORITY);

        Self {
            identifier,
            expiration,
            priority,
        }
    }
}

fn saturating_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Encode one APNS frame for a hex device token.
pub fn encode_frame(
    token_hex: &str,
    envelope: &Envelope,
    options: FrameOptions,
    max_payload: usize,
) -> Result<Vec<u8>, EncodingError> {
    let token = hex::decode(token_hex)
        .map_err(|e| EncodingError::InvalidToken(format!("{token_hex}: {e}")))?;
    if token.is_empty() || token.len() > usize::from(u16::MAX) {
        return Err(EncodingError::InvalidToken(format!(
            "{token_hex}: unsupported length {}",
            token.len()
        )));
    }

    let payload = canonical_json(&Value::Object(envelope.fields().clone()));
    let limit = max_payload.min(usize::from(u16::MAX));
    if payload.len() > limit {
        return Err(EncodingError::PayloadTooLarge {
            size: payload.len(),
            limit,
        });
    }

    Ok(pack_frame(&token, &payload, options))
}

/// Pack an APNS frame. Token and payload lengths must fit in a `u16`.
///
/// ```text
/// |2|frame len:4|1|len:2|token|2|len:2|payload|3|4|id:4|4|4|expiry:4|5|1|prio:1|
/// ```
pub fn pack_frame(token: &[u8], payload: &[u8], options: FrameOptions) -> Vec<u8> {
    let frame_len = 5 * ITEM_HEADER_LEN + token.len() + payload.len() + 4 + 4 + 1;
    let mut frame = Vec::with_capacity(1 + 4 + frame_len);

    frame.push(FRAME_COMMAND);
    frame.extend_from_slice(&(frame_len as u32).to_be_bytes());
    push_item(&mut frame, ITEM_TOKEN, token);
    push_item(&mut frame, ITEM_PAYLOAD, payload);
    push_item(&mut frame, ITEM_IDENTIFIER, &options.identifier.to_be_bytes());
    push_item(&mut frame, ITEM_EXPIRATION, &options.expiration.to_be_bytes());
    push_item(&mut frame, ITEM_PRIORITY, &[options.priority]);
    frame
}

fn push_item(frame: &mut Vec<u8>, id: u8, data: &[u8]) {
    frame.push(id);
    frame.extend_from_slice(&(data.len() as u16).to_be_bytes());
    frame.extend_from_slice(data);
}
