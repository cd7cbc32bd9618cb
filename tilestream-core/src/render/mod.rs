//! # Rendering and tile encoding
//!
//! ```text
//!  TileCombined ──► RenderPipeline ──paint once──► RenderEngine
//!                        │
//!                        ├─ Overlay::blend (per tile offset)
//!                        │
//!                        ├─ WorkerPool ─┬─ DeltaCodec::compress_or_delta
//!                        │              └─ encode_png (previews)
//!                        ▼
//!              tile: / tilecombine: Message
//! ```
//!
//! ## Sub-modules
//!
//! | Module      | Purpose                                           |
//! |-------------|---------------------------------------------------|
//! | `types`     | RGBA pixel buffers and alpha conversion           |
//! | `delta`     | Row-diff patches and the per-document bitmap cache |
//! | `png`       | Full-tile PNG encoding                            |
//! | `watermark` | Overlay trait and alpha-blended watermark         |
//! | `pool`      | Fixed-size encode worker pool                     |
//! | `engine`    | Rendering-engine boundary                         |
//! | `pipeline`  | Batch render → encode → serialise                 |

pub mod delta;
pub mod engine;
pub mod pipeline;
pub mod png;
pub mod pool;
pub mod types;
pub mod watermark;

// ── Re-exports ───────────────────────────────────────────────────

pub use delta::{DeltaBitmap, DeltaCodec, DeltaOp, EncodedTile, Patch, TileLocation, diff, try_delta};
pub use engine::{PaintRequest, RenderEngine};
pub use pipeline::{RenderPipeline, next_wire_id};
pub use png::encode_png;
pub use pool::WorkerPool;
pub use types::{PixelBuffer, TileMode};
pub use watermark::{Overlay, Watermark};
