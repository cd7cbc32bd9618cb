//! Document-level tile service.
//!
//! Ties the pieces together for one document:
//!
//! 1. Inbound lines go onto the [`RequestQueue`].
//! 2. A worker takes the next entry; tile batches are rendered by the
//!    [`RenderPipeline`].
//! 3. Responses are routed to the [`SenderQueue`] of every view they
//!    concern, where the transport picks them up.
//!
//! [`run`](TileService::run) drives the loop on the Tokio blocking pool;
//! [`drain`](TileService::drain) processes synchronously until the
//! queue is empty.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::config::{PipelineConfig, QueueConfig};
use crate::error::Result;
use crate::message::Message;
use crate::protocol::{CallbackTarget, QueueMessage};
use crate::queue::{RequestQueue, SenderQueue};
use crate::render::{Overlay, RenderEngine, RenderPipeline};

type ViewMap = HashMap<i32, Arc<SenderQueue<Message>>>;

/// State shared between the service handle and its worker.
struct Shared {
    queue: RequestQueue,
    pipeline: RenderPipeline,
    views: RwLock<ViewMap>,
}

impl Shared {
    /// Handle one queue entry; returns how many messages were delivered.
    fn process(&self, message: QueueMessage) -> usize {
        match message {
            QueueMessage::Tile(tile) => {
                let view = tile.view_id;
                match self.pipeline.render_tile(&tile) {
                    Ok(out) => self.deliver(CallbackTarget::View(view), out),
                    Err(e) => {
                        warn!(view, "dropping tile at {},{}: {e}", tile.tile_x, tile.tile_y);
                        0
                    }
                }
            }
            QueueMessage::TileCombine(batch) => {
                let view = batch.tiles().first().map_or(0, |t| t.view_id);
                match self.pipeline.render_combined(&batch) {
                    Ok(out) => self.deliver(CallbackTarget::View(view), out),
                    Err(e) => {
                        warn!(view, "dropping batch of {} tiles: {e}", batch.len());
                        0
                    }
                }
            }
            QueueMessage::Callback(event) => {
                let target = event.target;
                self.deliver(target, vec![Message::text(event.to_string())])
            }
            QueueMessage::Invalidation(event) => {
                let target = event.target;
                self.deliver(target, vec![Message::text(event.to_string())])
            }
            QueueMessage::Other(line) => self.deliver(CallbackTarget::All, vec![Message::text(line)]),
        }
    }

    fn deliver(&self, target: CallbackTarget, messages: Vec<Message>) -> usize {
        let views = self.views.read();
        let receivers: Vec<&Arc<SenderQueue<Message>>> = match target {
            CallbackTarget::All => views.values().collect(),
            CallbackTarget::View(id) => views.get(&id).into_iter().collect(),
        };
        if receivers.is_empty() {
            debug!(?target, "no attached view for {} messages", messages.len());
            return 0;
        }
        let mut delivered = 0;
        for queue in receivers {
            for msg in &messages {
                queue.enqueue(msg.clone());
                delivered += 1;
            }
        }
        trace!(?target, delivered, "routed messages");
        delivered
    }
}

// ── TileService ──────────────────────────────────────────────────

/// Tile service for one document.
///
/// # Lifetime
///
/// A service is live from construction until [`stop`](Self::stop) is
/// called. [`run`](Self::run) drives the worker loop while it is live
/// and returns at once on a stopped service.
pub struct TileService {
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl TileService {
    /// Create a service with default configuration.
    pub fn new(engine: Arc<dyn RenderEngine>) -> Result<Self> {
        Self::with_config(engine, PipelineConfig::default(), QueueConfig::default())
    }

    /// Create a service with explicit configuration.
    pub fn with_config(
        engine: Arc<dyn RenderEngine>,
        pipeline: PipelineConfig,
        queue: QueueConfig,
    ) -> Result<Self> {
        let poll_interval = pipeline.poll_interval();
        let pipeline = RenderPipeline::new(engine, pipeline)?;
        Ok(Self::from_parts(pipeline, RequestQueue::with_kinds(queue.kinds()), poll_interval))
    }

    /// Same as [`with_config`](Self::with_config), with `overlay`
    /// blended onto every tile.
    pub fn with_overlay(
        engine: Arc<dyn RenderEngine>,
        pipeline: PipelineConfig,
        queue: QueueConfig,
        overlay: Arc<dyn Overlay>,
    ) -> Result<Self> {
        let poll_interval = pipeline.poll_interval();
        let pipeline = RenderPipeline::new(engine, pipeline)?.with_overlay(overlay);
        Ok(Self::from_parts(pipeline, RequestQueue::with_kinds(queue.kinds()), poll_interval))
    }

    fn from_parts(pipeline: RenderPipeline, queue: RequestQueue, poll_interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue,
                pipeline,
                views: RwLock::new(HashMap::new()),
            }),
            running: Arc::new(AtomicBool::new(true)),
            poll_interval,
        }
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.shared.queue
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.shared.pipeline
    }

    // ── Views ────────────────────────────────────────────────────

    /// Register a view and return its outbound queue. Attaching an
    /// already attached view returns the existing queue.
    pub fn attach_view(&self, view_id: i32) -> Arc<SenderQueue<Message>> {
        let (queue, count) = {
            let mut views = self.shared.views.write();
            let queue = Arc::clone(views.entry(view_id).or_default());
            (queue, views.len())
        };
        self.shared.pipeline.codec().set_session_count(count);
        info!(view_id, views = count, "view attached");
        queue
    }

    /// Unregister a view: its queued tiles, cursor and outbound queue go.
    pub fn detach_view(&self, view_id: i32) -> bool {
        let (removed, count) = {
            let mut views = self.shared.views.write();
            let removed = views.remove(&view_id).is_some();
            (removed, views.len())
        };
        let cancelled = self.shared.queue.cancel_tiles(view_id);
        self.shared.queue.remove_cursor_position(view_id);
        self.shared.pipeline.codec().set_session_count(count);
        info!(view_id, cancelled, "view detached");
        removed
    }

    pub fn view_count(&self) -> usize {
        self.shared.views.read().len()
    }

    // ── Input ────────────────────────────────────────────────────

    /// Queue one inbound wire line.
    pub fn put(&self, line: &str) -> Result<()> {
        self.shared.queue.put(line)
    }

    pub fn update_cursor_position(
        &self,
        view_id: i32,
        part: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) {
        self.shared
            .queue
            .update_cursor_position(view_id, part, x, y, width, height);
    }

    // ── Processing ───────────────────────────────────────────────

    /// Process queue entries until the queue is empty. Returns the
    /// number of messages delivered.
    pub fn drain(&self) -> usize {
        let mut delivered = 0;
        while let Some(message) = self.shared.queue.try_get() {
            delivered += self.shared.process(message);
        }
        delivered
    }

    /// Run the worker loop until stopped.
    pub async fn run(&self) -> Result<()> {
        if !self.is_running() {
            debug!("tile service stopped before run");
            return Ok(());
        }
        info!("tile service started");

        while self.running.load(Ordering::SeqCst) {
            let shared = Arc::clone(&self.shared);
            let interval = self.poll_interval;
            let processed = tokio::task::spawn_blocking(move || {
                shared
                    .queue
                    .get_timeout(interval)
                    .map(|message| shared.process(message))
            })
            .await?;
            if processed.is_none() {
                tokio::task::yield_now().await;
            }
        }

        info!("tile service stopped");
        Ok(())
    }

    /// Signal the service to stop. Sticky: a later `run` returns at once.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the service has not been stopped yet.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// A cloneable handle that can be used to stop the service from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}
