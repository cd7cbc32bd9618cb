//! Outbound wire messages.
//!
//! A [`Message`] is an immutable frame: a text header line, optionally
//! followed by `\n` and a binary payload (PNG or delta bytes). Cloning is
//! cheap because the bytes are reference-counted.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    data: Bytes,
}

impl Message {
    /// A text-only message.
    pub fn text(line: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(line.into()),
        }
    }

    /// A header line followed by `\n` and `payload`.
    pub fn with_payload(header: &str, payload: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(header.len() + 1 + payload.len());
        buf.put_slice(header.as_bytes());
        buf.put_u8(b'\n');
        buf.put_slice(payload);
        Self { data: buf.freeze() }
    }

    pub fn from_bytes(data: Bytes) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Header line, up to the first `\n`. Invalid UTF-8 yields `""`.
    pub fn first_line(&self) -> &str {
        let end = self
            .data
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(self.data.len());
        std::str::from_utf8(&self.data[..end]).unwrap_or("")
    }

    /// First token of the header line, e.g. `tile:`.
    pub fn first_token(&self) -> &str {
        crate::protocol::first_token(self.first_line())
    }

    /// Bytes after the header line, or empty.
    pub fn payload(&self) -> Bytes {
        match self.data.iter().position(|&b| b == b'\n') {
            Some(pos) => self.data.slice(pos + 1..),
            None => Bytes::new(),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("header", &self.first_line())
            .field("len", &self.data.len())
            .finish()
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_payload_split() {
        let msg = Message::with_payload("tile: part=0", &[1, 2, 3]);
        assert_eq!(msg.first_line(), "tile: part=0");
        assert_eq!(msg.first_token(), "tile:");
        assert_eq!(&msg.payload()[..], &[1, 2, 3]);
        assert_eq!(msg.len(), "tile: part=0".len() + 4);
    }

    #[test]
    fn text_message_has_no_payload() {
        let msg = Message::text("invalidatecursor: 1");
        assert_eq!(msg.first_line(), "invalidatecursor: 1");
        assert!(msg.payload().is_empty());
    }
}
