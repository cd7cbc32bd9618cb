//! # tilestream-replay: trace replay tool
//!
//! Replays a recorded trace of inbound wire messages, cursor moves and
//! view changes through a [`tilestream_core::TileService`] backed by a
//! synthetic rendering engine, then writes each view's outbound
//! messages to a framed output file.
//!
//! ## Uses
//!
//! - **Regression**: diff the output of two builds for the same trace.
//! - **Tuning**: compare delta-cache and worker settings on real traffic.

pub mod config;
pub mod engine;
pub mod service;
