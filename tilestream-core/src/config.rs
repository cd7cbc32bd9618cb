//! Tunables for the render pipeline and request queues.
//!
//! Both structs deserialize with `#[serde(default)]`, so a config file
//! only needs the fields it wants to change.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::flags::MessageKinds;

/// Cached bitmaps kept per attached session.
pub const DELTA_ENTRIES_PER_SESSION: usize = 96;

// ── PipelineConfig ───────────────────────────────────────────────

/// Configuration for [`RenderPipeline`](crate::render::RenderPipeline)
/// and the [`TileService`](crate::service::TileService) loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Encoder threads; 0 picks `max(2, available_parallelism)`.
    pub worker_threads: usize,
    /// Upper bound on cached bitmaps before a rebalance trims them.
    pub delta_cache_entries: usize,
    /// Pixmaps wider or taller than this are logged at WARN.
    pub large_pixmap_warning: u32,
    /// How long a service worker waits on an empty queue before
    /// re-checking its stop flag.
    pub poll_interval_ms: u64,
    /// Encode tiles as deltas against the cached bitmap when possible.
    pub enable_deltas: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            delta_cache_entries: DELTA_ENTRIES_PER_SESSION,
            large_pixmap_warning: 4096,
            poll_interval_ms: 50,
            enable_deltas: true,
        }
    }
}

impl PipelineConfig {
    /// Resolved encoder thread count.
    pub fn effective_workers(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .max(2)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

// ── QueueConfig ──────────────────────────────────────────────────

/// Which message kinds a [`RequestQueue`](crate::queue::RequestQueue)
/// accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub tiles: bool,
    pub callbacks: bool,
    pub invalidations: bool,
    pub other: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tiles: true,
            callbacks: true,
            invalidations: true,
            other: true,
        }
    }
}

impl QueueConfig {
    pub fn kinds(&self) -> MessageKinds {
        let mut kinds = MessageKinds::empty();
        kinds.set(MessageKinds::TILES, self.tiles);
        kinds.set(MessageKinds::CALLBACKS, self.callbacks);
        kinds.set(MessageKinds::INVALIDATIONS, self.invalidations);
        kinds.set(MessageKinds::OTHER, self.other);
        kinds
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_workers_at_least_two() {
        let cfg = PipelineConfig::default();
        assert!(cfg.effective_workers() >= 2);
        let cfg = PipelineConfig {
            worker_threads: 1,
            ..Default::default()
        };
        assert_eq!(cfg.effective_workers(), 1);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{"worker_threads": 3}"#).unwrap();
        assert_eq!(cfg.worker_threads, 3);
        assert_eq!(cfg.delta_cache_entries, DELTA_ENTRIES_PER_SESSION);
        assert!(cfg.enable_deltas);
    }

    #[test]
    fn queue_kinds_follow_flags() {
        let cfg = QueueConfig {
            other: false,
            ..Default::default()
        };
        let kinds = cfg.kinds();
        assert!(kinds.contains(MessageKinds::TILES));
        assert!(!kinds.contains(MessageKinds::OTHER));
        assert_eq!(QueueConfig::default().kinds(), MessageKinds::ALL);
    }
}
