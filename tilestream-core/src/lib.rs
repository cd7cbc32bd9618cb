//! # tilestream-core
//!
//! Tile-streaming core for collaborative document rendering.
//!
//! This crate contains:
//! - **Protocol types**: `TileDesc`, `TileCombined`, `CallbackEvent`, `InvalidationEvent`, `QueueMessage`
//! - **Queues**: `RequestQueue` (inbound, cursor-aware) and `SenderQueue` (outbound, per view)
//! - **Render**: `RenderPipeline`, `DeltaCodec` row-diff patches, PNG keyframes, `WorkerPool`
//! - **Service**: `TileService` tying queue, pipeline and views together
//! - **Codec**: `MessageCodec` for framed byte-stream output via `tokio_util`
//! - **Error**: `TileError`, a typed `thiserror` error hierarchy

pub mod codec;
pub mod config;
pub mod error;
pub mod flags;
pub mod message;
pub mod protocol;
pub mod queue;
pub mod render;
pub mod service;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::MessageCodec;
pub use config::{PipelineConfig, QueueConfig};
pub use error::{Result, TileError};
pub use flags::MessageKinds;
pub use message::Message;
pub use protocol::{
    CallbackEvent, CallbackTarget, InvalidationEvent, QueueMessage, Rect, TileCombined, TileDesc,
    TileKey,
};
pub use queue::{Coalesce, CursorState, RequestQueue, SenderQueue};
pub use render::{
    DeltaCodec, PaintRequest, PixelBuffer, RenderEngine, RenderPipeline, TileMode, Watermark,
};
pub use service::TileService;
