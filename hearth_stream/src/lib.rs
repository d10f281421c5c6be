//! Shared HearthStream protocol helpers.
//!
//! The protocol sends a fixed-size header followed by a MessagePack payload.
//! The scene host publishes [`SceneSnapshot`]s for the UI layer to draw from,
//! and the UI layer answers with [`InputMessage`]s carrying logical commands.

use std::convert::TryFrom;

use bytes::Buf;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use thiserror::Error;

/// Bytes that prefix every HearthStream message ("HRTH").
pub const HEADER_MAGIC: [u8; 4] = *b"HRTH";

/// Protocol revision understood by this crate.
pub const PROTOCOL_VERSION: u16 = 0x0001;

/// Length of the binary header in bytes.
pub const HEADER_LEN: usize = 4 + 2 + 2 + 4;

/// Message kinds understood by HearthStream v1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr, Hash)]
#[repr(u16)]
pub enum MessageKind {
    Hello = 0x0001,
    Snapshot = 0x0002,
    Input = 0x0003,
    Heartbeat = 0x0004,
}

/// Envelope describing the upcoming payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: u16,
    pub kind: MessageKind,
    pub length: u32,
}

impl MessageHeader {
    /// Encode the header as big-endian bytes.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&HEADER_MAGIC);
        out[4..6].copy_from_slice(&self.version.to_be_bytes());
        out[6..8].copy_from_slice(&(self.kind as u16).to_be_bytes());
        out[8..12].copy_from_slice(&self.length.to_be_bytes());
        out
    }

    /// Decode a header from raw bytes.
    pub fn decode(input: &[u8]) -> Result<Self, ProtocolError> {
        if input.len() < HEADER_LEN {
            return Err(ProtocolError::TruncatedHeader);
        }
        if input[..4] != HEADER_MAGIC {
            return Err(ProtocolError::BadMagic);
        }
        let mut version_bytes = &input[4..6];
        let version = version_bytes.get_u16();
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }
        let mut kind_bytes = &input[6..8];
        let kind_raw = kind_bytes.get_u16();
        let kind = MessageKind::try_from(kind_raw)
            .map_err(|_| ProtocolError::UnknownMessageKind(kind_raw))?;
        let mut len_bytes = &input[8..12];
        let length = len_bytes.get_u32();
        Ok(Self {
            version,
            kind,
            length,
        })
    }
}

impl TryFrom<u16> for MessageKind {
    type Error = ();

    fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(Self::Hello),
            0x0002 => Ok(Self::Snapshot),
            0x0003 => Ok(Self::Input),
            0x0004 => Ok(Self::Heartbeat),
            _ => Err(()),
        }
    }
}

/// Minimal handshake message that opens a stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hello {
    pub protocol: String,
    pub producer: String,
    pub build: Option<String>,
}

impl Hello {
    pub fn new(producer: impl Into<String>, build: Option<String>) -> Self {
        Self {
            protocol: "HearthStream".to_string(),
            producer: producer.into(),
            build,
        }
    }
}

/// Keep-alive sent while nothing else is queued.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Heartbeat {
    pub seq: u64,
}

/// Overlay the UI layer should draw for the focused modal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModalView {
    pub kind: String,
    pub title: String,
    #[serde(skip_serializing_if = "vec_is_empty", default)]
    pub lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub selected: Option<usize>,
}

fn vec_is_empty<T>(vec: &Vec<T>) -> bool {
    vec.is_empty()
}

/// Everything the render layer reads after a scene tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneSnapshot {
    pub seq: u64,
    pub tick: u64,
    pub elapsed_ms: u64,
    pub avatar: [f32; 2],
    pub npc: [f32; 2],
    pub walking: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub modal: Option<ModalView>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revealed_text: Option<String>,
    #[serde(skip_serializing_if = "vec_is_empty", default)]
    pub events: Vec<String>,
}

/// Logical commands a UI layer may send back to the scene host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputCommand {
    Confirm,
    Dismiss,
    SelectUp,
    SelectDown,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputMessage {
    pub seq: u64,
    pub command: InputCommand,
}

/// Error conditions returned by the protocol helpers.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("header smaller than {HEADER_LEN} bytes")]
    TruncatedHeader,
    #[error("header magic mismatch")]
    BadMagic,
    #[error("protocol version {0:#06x} is not supported")]
    UnsupportedVersion(u16),
    #[error("message kind {0:#06x} is unknown")]
    UnknownMessageKind(u16),
    #[error("payload length mismatch: header declared {expected} bytes but read {actual}")]
    LengthMismatch { expected: u32, actual: usize },
    #[error("payload decode error: {0}")]
    PayloadDecode(#[from] rmp_serde::decode::Error),
    #[error("payload encode error: {0}")]
    PayloadEncode(#[from] rmp_serde::encode::Error),
}

/// Wraps a payload with framing suitable for the wire.
pub fn encode_message<T>(kind: MessageKind, payload: &T) -> Result<Vec<u8>, ProtocolError>
where
    T: Serialize,
{
    let payload_bytes = rmp_serde::to_vec_named(payload)?;
    let header = MessageHeader {
        version: PROTOCOL_VERSION,
        kind,
        length: u32::try_from(payload_bytes.len()).map_err(|_| ProtocolError::LengthMismatch {
            expected: u32::MAX,
            actual: payload_bytes.len(),
        })?,
    };
    let mut out = Vec::with_capacity(HEADER_LEN + payload_bytes.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&payload_bytes);
    Ok(out)
}

/// Decodes a framed message returning both header and payload bytes.
pub fn decode_envelope(bytes: &[u8]) -> std::result::Result<(MessageHeader, &[u8]), ProtocolError> {
    if bytes.len() < HEADER_LEN {
        return Err(ProtocolError::TruncatedHeader);
    }
    let header = MessageHeader::decode(&bytes[..HEADER_LEN])?;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != header.length as usize {
        return Err(ProtocolError::LengthMismatch {
            expected: header.length,
            actual: payload.len(),
        });
    }
    Ok((header, payload))
}

/// Decode a payload straight into the requested type.
pub fn decode_payload<T>(payload: &[u8]) -> std::result::Result<T, ProtocolError>
where
    T: for<'de> Deserialize<'de>,
{
    let value = rmp_serde::from_slice(payload)?;
    Ok(value)
}

/// Splits a buffer holding several back-to-back messages.
///
/// Returns the complete messages found and the number of bytes consumed; a
/// trailing partial message is left for the caller to complete.
pub fn split_messages(
    bytes: &[u8],
) -> std::result::Result<(Vec<(MessageHeader, &[u8])>, usize), ProtocolError> {
    let mut messages = Vec::new();
    let mut offset = 0;
    while bytes.len() - offset >= HEADER_LEN {
        let header = MessageHeader::decode(&bytes[offset..offset + HEADER_LEN])?;
        let end = offset + HEADER_LEN + header.length as usize;
        if end > bytes.len() {
            break;
        }
        let payload = &bytes[offset + HEADER_LEN..end];
        messages.push((header, payload));
        offset = end;
    }
    Ok((messages, offset))
}
