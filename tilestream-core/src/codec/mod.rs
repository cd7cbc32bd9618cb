//! Length-prefixed framing of outbound [`Message`]s for a byte stream.
//!
//! ```text
//! ┌────────┬──────────┬──────────┬─────────────┐
//! │ "TSW0" │ len: u32 │ sum: u32 │ payload ... │
//! └────────┴──────────┴──────────┴─────────────┘
//! ```
//!
//! Integers are little-endian; `sum` is the first four bytes of the
//! payload's blake3 hash.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::TileError;
use crate::message::Message;

pub const FRAME_MAGIC: [u8; 4] = *b"TSW0";
pub const FRAME_HEADER_LEN: usize = 12;
pub const MAX_FRAME_PAYLOAD: usize = 16 * 1024 * 1024;

fn checksum(payload: &[u8]) -> u32 {
    let hash = blake3::hash(payload);
    let bytes = hash.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MessageCodec;

impl MessageCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = TileError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, TileError> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        if src[0..4] != FRAME_MAGIC {
            return Err(TileError::InvalidMagic);
        }
        let len = u32::from_le_bytes([src[4], src[5], src[6], src[7]]) as usize;
        if len > MAX_FRAME_PAYLOAD {
            return Err(TileError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_PAYLOAD,
            });
        }
        if src.len() < FRAME_HEADER_LEN + len {
            src.reserve(FRAME_HEADER_LEN + len - src.len());
            return Ok(None);
        }

        let expected = u32::from_le_bytes([src[8], src[9], src[10], src[11]]);
        src.advance(FRAME_HEADER_LEN);
        let payload = src.split_to(len).freeze();
        if checksum(&payload) != expected {
            return Err(TileError::ChecksumMismatch);
        }
        Ok(Some(Message::from_bytes(payload)))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = TileError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), TileError> {
        let payload = item.as_bytes();
        if payload.len() > MAX_FRAME_PAYLOAD {
            return Err(TileError::FrameTooLarge {
                size: payload.len(),
                max: MAX_FRAME_PAYLOAD,
            });
        }
        dst.reserve(FRAME_HEADER_LEN + payload.len());
        dst.put_slice(&FRAME_MAGIC);
        dst.put_u32_le(payload.len() as u32);
        dst.put_u32_le(checksum(payload));
        dst.put_slice(payload);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
