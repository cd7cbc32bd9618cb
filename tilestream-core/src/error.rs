//! Domain-specific error types for the tile-streaming core.
//!
//! All fallible operations return `Result<T, TileError>`.
//! An empty queue is not an error: `get` blocks and `try_get` returns `None`.

use thiserror::Error;

/// The canonical error type for the tile-streaming core.
#[derive(Debug, Error)]
pub enum TileError {
    // ── Parse Errors ─────────────────────────────────────────────
    /// A wire message could not be tokenised or classified.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A required `key=value` token was absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field was present but its value was out of range.
    #[error("bad argument `{field}`: {value}")]
    BadArgument { field: &'static str, value: String },

    /// The queue was configured not to accept this kind of message.
    #[error("unsupported message kind: {0}")]
    UnsupportedMessage(String),

    // ── Delta Errors ─────────────────────────────────────────────
    /// Previous and current bitmaps differ in size.
    #[error("dimension mismatch: {prev_width}x{prev_height} vs {width}x{height}")]
    DimensionMismatch {
        prev_width: u32,
        prev_height: u32,
        width: u32,
        height: u32,
    },

    /// A tile exceeds the byte-addressable row/column range.
    #[error("tile too large for delta: {width}x{height}")]
    TileTooLarge { width: u32, height: u32 },

    /// A patch referenced rows or columns outside the bitmap.
    #[error("corrupt patch: {0}")]
    CorruptPatch(&'static str),

    // ── Encoding Errors ──────────────────────────────────────────
    /// PNG encoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// zstd compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// The rendering engine failed to paint an area.
    #[error("render error: {0}")]
    Render(String),

    // ── Framing Errors ───────────────────────────────────────────
    /// Received bytes that do not start with the frame magic.
    #[error("invalid magic bytes: expected TSW0")]
    InvalidMagic,

    /// The frame payload failed checksum verification.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Frame size exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── I/O & Runtime Errors ─────────────────────────────────────
    /// The I/O layer reported an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TileError>;

// ── Convenient From implementations ──────────────────────────────

impl From<String> for TileError {
    fn from(s: String) -> Self {
        TileError::Other(s)
    }
}

impl From<&str> for TileError {
    fn from(s: &str) -> Self {
        TileError::Other(s.to_string())
    }
}

impl From<image::ImageError> for TileError {
    fn from(e: image::ImageError) -> Self {
        TileError::Encoding(e.to_string())
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for TileError {
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        TileError::ChannelClosed
    }
}

impl From<tokio::task::JoinError> for TileError {
    fn from(e: tokio::task::JoinError) -> Self {
        TileError::Other(format!("task failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = TileError::MissingField("tileposx");
        assert!(e.to_string().contains("tileposx"));

        let e = TileError::DimensionMismatch {
            prev_width: 256,
            prev_height: 256,
            width: 128,
            height: 256,
        };
        assert!(e.to_string().contains("256x256"));
        assert!(e.to_string().contains("128x256"));
    }

    #[test]
    fn from_string() {
        let e: TileError = "something broke".into();
        assert!(matches!(e, TileError::Other(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: TileError = io_err.into();
        assert!(matches!(e, TileError::Io(_)));
    }
}
