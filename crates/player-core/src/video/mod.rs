//! Continuous video decode pipeline: packet read, hardware-or-software
//! decode, RGB conversion, and hand-off through a bounded frame queue.
//!
//! Hardware acceleration is an optimization, never a requirement: every
//! failure while acquiring a device falls back to software decoding. End of
//! stream rewinds the source and playback continues.
//!
//! # Thread Safety
//! The engine lives on the decode thread alone and is built there by
//! [`PlayerSession`]. The [`FrameQueue`] is the only state shared with the
//! consumer; frame buffers change owner exactly once per hand-off.

mod decoder;
mod driver;
mod hardware;
mod queue;
#[cfg(test)]
mod tests;
mod timing;
mod types;

pub use decoder::DecoderEngine;
pub use driver::{DecodeStep, PlayerSession, SessionShared};
pub use queue::FrameQueue;
pub use timing::StreamTiming;
pub use types::{DecodeStatus, FrameBuffer, VideoInfo};
