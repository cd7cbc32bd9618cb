//! Replay core logic.
//!
//! Feeds a trace through a [`TileService`] and writes every view's
//! outbound messages as framed records.
//!
//! ## Trace format
//!
//! One entry per line; blank lines and `#` comments are skipped.
//!
//! | Line                                  | Effect                              |
//! |---------------------------------------|-------------------------------------|
//! | `attach <view>` / `detach <view>`     | Add or remove a view                |
//! | `cursor <view> <part> <x> <y> <w> <h>`| Move a view's cursor                |
//! | `edit`                                | Change the document (next tiles differ) |
//! | `drain`                               | Process everything queued so far    |
//! | anything else                         | Put on the request queue as-is      |

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, warn};

use tilestream_core::render::Overlay;
use tilestream_core::{Message, MessageCodec, PixelBuffer, Result, TileError, TileService, Watermark};

use crate::config::ReplayConfig;
use crate::engine::SyntheticEngine;

// ── Directive ────────────────────────────────────────────────────

/// One parsed trace line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Attach(i32),
    Detach(i32),
    Cursor {
        view: i32,
        part: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    Edit,
    Drain,
    Put(String),
}

impl Directive {
    /// `None` for blank and comment lines.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let mut tokens = line.split_whitespace();
        let directive = match tokens.next().unwrap_or_default() {
            "attach" => Directive::Attach(int(tokens.next(), "view")?),
            "detach" => Directive::Detach(int(tokens.next(), "view")?),
            "cursor" => Directive::Cursor {
                view: int(tokens.next(), "view")?,
                part: int(tokens.next(), "part")?,
                x: int(tokens.next(), "x")?,
                y: int(tokens.next(), "y")?,
                width: int(tokens.next(), "width")?,
                height: int(tokens.next(), "height")?,
            },
            "edit" => Directive::Edit,
            "drain" => Directive::Drain,
            _ => Directive::Put(line.to_string()),
        };
        Ok(Some(directive))
    }
}

fn int(token: Option<&str>, field: &'static str) -> Result<i32> {
    let token = token.ok_or(TileError::MissingField(field))?;
    token.parse().map_err(|_| TileError::BadArgument {
        field,
        value: token.to_string(),
    })
}

// ── Summary ──────────────────────────────────────────────────────

/// Counters reported at the end of a replay.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub lines: usize,
    pub rejected: usize,
    pub delivered: usize,
    pub frames: usize,
}

// ── ReplayService ────────────────────────────────────────────────

/// Replays traces through one document's tile service.
pub struct ReplayService {
    service: TileService,
    engine: Arc<SyntheticEngine>,
    running: Arc<AtomicBool>,
}

impl ReplayService {
    /// Build the engine and service described by `config`, with the
    /// configured views attached.
    pub fn new(config: &ReplayConfig) -> Result<Self> {
        let engine = Arc::new(SyntheticEngine::from_config(&config.render)?);
        let service = if config.render.watermark {
            let stamp = PixelBuffer::filled(8, 8, [255, 255, 255, 255]);
            let overlay: Arc<dyn Overlay> =
                Arc::new(Watermark::new(stamp, config.render.watermark_opacity));
            TileService::with_overlay(
                engine.clone(),
                config.pipeline.clone(),
                config.queue.clone(),
                overlay,
            )?
        } else {
            TileService::with_config(engine.clone(), config.pipeline.clone(), config.queue.clone())?
        };
        for &view in &config.render.views {
            service.attach_view(view);
        }
        Ok(Self {
            service,
            engine,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn service(&self) -> &TileService {
        &self.service
    }

    /// A cloneable handle that stops the replay between trace lines.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Apply one directive; returns messages delivered by a drain.
    pub fn apply(&self, directive: Directive) -> Result<usize> {
        match directive {
            Directive::Attach(view) => {
                self.service.attach_view(view);
            }
            Directive::Detach(view) => {
                if !self.service.detach_view(view) {
                    warn!("detach of unknown view {view}");
                }
            }
            Directive::Cursor {
                view,
                part,
                x,
                y,
                width,
                height,
            } => self
                .service
                .update_cursor_position(view, part, x, y, width, height),
            Directive::Edit => {
                let generation = self.engine.touch();
                debug!("document generation {generation}");
            }
            Directive::Drain => return Ok(self.service.drain()),
            Directive::Put(line) => self.service.put(&line)?,
        }
        Ok(0)
    }

    /// Replay `trace` and write each view's output to `sink`, in view
    /// order. Each view's messages are preceded by a `view: <id>` record.
    pub async fn replay<W>(&self, trace: &str, views: &[i32], sink: W) -> Result<ReplaySummary>
    where
        W: AsyncWrite + Unpin,
    {
        self.running.store(true, Ordering::SeqCst);
        let outbound: Vec<_> = views
            .iter()
            .map(|&v| (v, self.service.attach_view(v)))
            .collect();
        let mut summary = ReplaySummary::default();

        for (number, line) in trace.lines().enumerate() {
            if !self.running.load(Ordering::SeqCst) {
                info!("replay stopped at line {}", number + 1);
                break;
            }
            let directive = match Directive::parse(line) {
                Ok(Some(d)) => d,
                Ok(None) => continue,
                Err(e) => {
                    warn!("line {}: {e}", number + 1);
                    summary.rejected += 1;
                    continue;
                }
            };
            summary.lines += 1;
            match self.apply(directive) {
                Ok(delivered) => summary.delivered += delivered,
                Err(e) => {
                    warn!("line {}: {e}", number + 1);
                    summary.rejected += 1;
                }
            }
        }
        summary.delivered += self.service.drain();

        let mut framed = FramedWrite::new(sink, MessageCodec::new());
        for (view, queue) in outbound {
            framed.send(Message::text(format!("view: {view}"))).await?;
            summary.frames += 1;
            while let Some(message) = queue.dequeue() {
                framed.send(message).await?;
                summary.frames += 1;
            }
        }
        framed.flush().await?;

        self.running.store(false, Ordering::SeqCst);
        Ok(summary)
    }

    /// Replay a trace file into an output file.
    pub async fn replay_file(
        &self,
        trace: &Path,
        views: &[i32],
        output: &Path,
    ) -> Result<ReplaySummary> {
        let text = tokio::fs::read_to_string(trace).await?;
        let file = tokio::fs::File::create(output).await?;
        let summary = self.replay(&text, views, file).await?;
        info!(
            "replayed {} lines ({} rejected): {} messages delivered, {} frames written to {}",
            summary.lines,
            summary.rejected,
            summary.delivered,
            summary.frames,
            output.display()
        );
        Ok(summary)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    fn config() -> ReplayConfig {
        let mut config = ReplayConfig::default();
        config.pipeline.worker_threads = 2;
        config
    }

    #[test]
    fn directives_parse() {
        assert_eq!(Directive::parse("  # note").unwrap(), None);
        assert_eq!(Directive::parse("attach 3").unwrap(), Some(Directive::Attach(3)));
        assert_eq!(
            Directive::parse("cursor 1 0 10 20 30 40").unwrap(),
            Some(Directive::Cursor {
                view: 1,
                part: 0,
                x: 10,
                y: 20,
                width: 30,
                height: 40
            })
        );
        assert!(Directive::parse("cursor 1 0 10").is_err());
        assert_eq!(
            Directive::parse("callback all 10 25").unwrap(),
            Some(Directive::Put("callback all 10 25".into()))
        );
    }

    #[tokio::test]
    async fn replay_writes_framed_output() {
        let replay = ReplayService::new(&config()).unwrap();
        let trace = "\
# two adjacent tiles, one status update
tile nviewid=0 part=0 width=256 height=256 tileposx=0 tileposy=0 tilewidth=3840 tileheight=3840
tile nviewid=0 part=0 width=256 height=256 tileposx=3840 tileposy=0 tilewidth=3840 tileheight=3840
callback all 10 25
callback all 10 50
bogus line with = signs
";
        let mut out = Vec::new();
        let summary = replay.replay(trace, &[0], &mut out).await.unwrap();
        assert_eq!(summary.rejected, 0);
        assert_eq!(summary.delivered, 3);
        assert_eq!(summary.frames, 4);

        let mut frames = FramedRead::new(&out[..], MessageCodec::new());
        let mut headers = Vec::new();
        while let Some(frame) = frames.next().await {
            headers.push(frame.unwrap().first_token().to_string());
        }
        assert_eq!(headers, vec!["view:", "tilecombine:", "callback", "bogus"]);
    }

    #[tokio::test]
    async fn edit_turns_rerender_into_delta() {
        let replay = ReplayService::new(&config()).unwrap();
        let first = "tile nviewid=0 part=0 width=256 height=256 tileposx=0 tileposy=0 tilewidth=3840 tileheight=3840 oldwid=0\ndrain\n";
        let mut out = Vec::new();
        replay.replay(first, &[0], &mut out).await.unwrap();

        let second = "edit\ntile nviewid=0 part=0 width=256 height=256 tileposx=0 tileposy=0 tilewidth=3840 tileheight=3840 oldwid=1\n";
        let mut out = Vec::new();
        replay.replay(second, &[0], &mut out).await.unwrap();

        let mut frames = FramedRead::new(&out[..], MessageCodec::new());
        let _view = frames.next().await.unwrap().unwrap();
        let tile = frames.next().await.unwrap().unwrap();
        assert_eq!(tile.first_token(), "tile:");
        assert_eq!(tile.payload()[0], b'D');
    }
}
