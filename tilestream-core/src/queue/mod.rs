//! # Queues
//!
//! ```text
//!  client / engine ──put──► RequestQueue ──get──► RenderPipeline
//!                              ▲                        │
//!        update_cursor_position┘                        ▼
//!                                      SenderQueue (one per view) ──► transport
//! ```
//!
//! | Module    | Purpose                                             |
//! |-----------|-----------------------------------------------------|
//! | `cursor`  | Per-view cursor rectangles ranked by recency        |
//! | `request` | Inbound coalescing queue with tile prioritisation   |
//! | `sender`  | Outbound per-consumer coalescing queue              |

pub mod cursor;
pub mod request;
pub mod sender;

pub use cursor::{CursorPosition, CursorState};
pub use request::RequestQueue;
pub use sender::{Coalesce, MessageIdentity, SenderQueue};
