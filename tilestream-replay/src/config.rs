//! Configuration for the replay tool.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tilestream_core::{PipelineConfig, QueueConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Render pipeline tuning.
    pub pipeline: PipelineConfig,
    /// Message kinds the request queue accepts.
    pub queue: QueueConfig,
    /// Synthetic engine settings.
    pub render: RenderConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Synthetic rendering engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Views attached before the trace starts.
    pub views: Vec<i32>,
    /// Fill pattern: "checker" or "gradient".
    pub pattern: String,
    /// Checker square size in document units.
    pub checker_size: i32,
    /// Paint premultiplied pixels, as most engines do.
    pub premultiplied: bool,
    /// Blend a watermark stamp onto every tile.
    pub watermark: bool,
    /// Watermark opacity, 0.0..=1.0.
    pub watermark_opacity: f32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            views: vec![0],
            pattern: "checker".into(),
            checker_size: 1920,
            premultiplied: true,
            watermark: false,
            watermark_opacity: 0.2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ReplayConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&ReplayConfig::default()).unwrap();
        assert!(text.contains("delta_cache_entries"));
        assert!(text.contains("pattern"));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&ReplayConfig::default()).unwrap();
        let parsed: ReplayConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.render.views, vec![0]);
        assert_eq!(parsed.pipeline.delta_cache_entries, 96);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: ReplayConfig = toml::from_str(
            "[render]\nviews = [1, 2]\n\n[pipeline]\nworker_threads = 3\n",
        )
        .unwrap();
        assert_eq!(parsed.render.views, vec![1, 2]);
        assert_eq!(parsed.render.pattern, "checker");
        assert_eq!(parsed.pipeline.worker_threads, 3);
        assert!(parsed.queue.tiles);
    }

    #[test]
    fn write_default_creates_loadable_file() {
        let path = std::env::temp_dir().join(format!(
            "tilestream-replay-{}.toml",
            std::process::id()
        ));
        ReplayConfig::write_default(&path).unwrap();
        let loaded = ReplayConfig::load(&path);
        assert_eq!(loaded.render.checker_size, 1920);
        let _ = std::fs::remove_file(&path);
    }
}
