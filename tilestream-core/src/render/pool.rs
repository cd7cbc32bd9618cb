//! Fixed-size worker pool for CPU-bound tile encoding.
//!
//! Jobs are fed through a `crossbeam-channel`; [`run_batch`] submits a
//! whole batch and blocks until every job has reported back. A job that
//! panics fails only itself.
//!
//! [`run_batch`]: WorkerPool::run_batch

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::JoinHandle;

use crossbeam_channel::{Sender, bounded, unbounded};
use tracing::{debug, error};

use crate::error::{Result, TileError};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers (at least one).
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let rx = receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("tile-encode-{i}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                })?;
            workers.push(handle);
        }
        debug!("started {threads} encode workers");
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    fn submit(&self, job: Job) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or(TileError::ChannelClosed)?
            .send(job)?;
        Ok(())
    }

    /// Run every job on the pool and wait for all of them. Results come
    /// back in submission order; a panicking job yields a `Render` error.
    pub fn run_batch<T, F>(&self, jobs: Vec<F>) -> Result<Vec<Result<T>>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let n = jobs.len();
        let (done_tx, done_rx) = bounded::<(usize, Result<T>)>(n.max(1));
        for (idx, job) in jobs.into_iter().enumerate() {
            let done = done_tx.clone();
            self.submit(Box::new(move || {
                let out = catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|_| {
                    error!("encode job {idx} panicked");
                    Err(TileError::Render(format!("job {idx} panicked")))
                });
                let _ = done.send((idx, out));
            }))?;
        }
        drop(done_tx);

        let mut slots: Vec<Option<Result<T>>> = (0..n).map(|_| None).collect();
        for _ in 0..n {
            let (idx, out) = done_rx.recv().map_err(|_| TileError::ChannelClosed)?;
            slots[idx] = Some(out);
        }
        Ok(slots
            .into_iter()
            .map(|s| s.unwrap_or(Err(TileError::ChannelClosed)))
            .collect())
    }

    /// Queue a job without waiting for it.
    pub fn spawn_detached<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Box::new(move || {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!("background job panicked");
            }
        }))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
