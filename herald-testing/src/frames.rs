// Decoder for recorded APNS frame streams

use herald_push::wire::FrameOptions;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while decoding a recorded frame stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unexpected command byte {0}")]
    Command(u8),

    #[error("stream truncated at offset {0}")]
    Truncated(usize),

    #[error("unknown item id {0}")]
    UnknownItem(u8),

    #[error("missing item {0}")]
    MissingItem(u8),

    #[error("item {id} has length {len}")]
    ItemLength { id: u8, len: usize },
}

/// A decoded APNS notification frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub token: Vec<u8>,
    pub payload: Vec<u8>,
    pub options: FrameOptions,
}

impl DecodedFrame {
    /// Device token as lowercase hex.
    pub fn token_hex(&self) -> String {
        hex::encode(&self.token)
    }

    /// Payload as a string.
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Payload parsed as JSON.
    pub fn payload_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.payload).ok()
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], FrameError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(FrameError::Truncated(self.offset))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, FrameError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, FrameError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, FrameError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Split a recorded byte stream into frames.
pub fn decode_frames(bytes: &[u8]) -> Result<Vec<DecodedFrame>, FrameError> {
    let mut cursor = Cursor { bytes, offset: 0 };
    let mut frames = Vec::new();

    while cursor.offset < bytes.len() {
        let command = cursor.u8()?;
        if command != 2 {
            return Err(FrameError::Command(command));
        }
        let frame_len = cursor.u32()? as usize;
        let body = cursor.take(frame_len)?;
        frames.push(decode_items(body)?);
    }

    Ok(frames)
}

fn decode_items(body: &[u8]) -> Result<DecodedFrame, FrameError> {
    let mut cursor = Cursor {
        bytes: body,
        offset: 0,
    };
    let mut token = None;
    let mut payload = None;
    let mut identifier = None;
    let mut expiration = None;
    let mut priority = None;

    while cursor.offset < body.len() {
        let id = cursor.u8()?;
        let len = usize::from(cursor.u16()?);
        let data = cursor.take(len)?;
        match (id, len) {
            (1, _) => token = Some(data.to_vec()),
            (2, _) => payload = Some(data.to_vec()),
            (3, 4) => identifier = Some(u32::from_be_bytes([data[0], data[1], data[2], data[3]])),
            (4, 4) => expiration = Some(u32::from_be_bytes([data[0], data[1], data[2], data[3]])),
            (5, 1) => priority = Some(data[0]),
            (3..=5, len) => return Err(FrameError::ItemLength { id, len }),
            (id, _) => return Err(FrameError::UnknownItem(id)),
        }
    }

    Ok(DecodedFrame {
        token: token.ok_or(FrameError::MissingItem(1))?,
        payload: payload.ok_or(FrameError::MissingItem(2))?,
        options: FrameOptions {
            identifier: identifier.ok_or(FrameError::MissingItem(3))?,
            expiration: expiration.ok_or(FrameError::MissingItem(4))?,
            priority: priority.ok_or(FrameError::MissingItem(5))?,
        },
    })
}
