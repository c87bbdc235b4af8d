use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use super::queue::FrameQueue;
use super::types::{DecodeStatus, VideoInfo};
use crate::error::PlayerError;

/// One decode step: read, decode, convert, hand off. The seam between the
/// loop driver and the engine, so the loop can be exercised with scripted
/// engines in tests.
pub trait DecodeStep {
    fn decode(&mut self, queue: &FrameQueue) -> DecodeStatus;
}

/// State shared between the decode thread and the consumer.
///
/// The playing flag has a single writer (session shutdown); the queue's own
/// lock is the only other synchronization between the two threads.
#[derive(Debug)]
pub struct SessionShared {
    playing: AtomicBool,
    queue: FrameQueue,
}

impl SessionShared {
    fn new(capacity: usize) -> Self {
        SessionShared {
            playing: AtomicBool::new(true),
            queue: FrameQueue::new(capacity),
        }
    }

    pub fn queue(&self) -> &FrameQueue {
        &self.queue
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }
}

/// Owns the decode thread and the shared state for one playback session.
///
/// The engine is constructed on the decode thread (FFmpeg's demux context is
/// not `Send`); initialization failures are still surfaced synchronously
/// from `start`. Dropping the session stops and joins the thread, so engine
/// resources are never torn down while the loop might still touch them.
#[derive(Debug)]
pub struct PlayerSession {
    shared: Arc<SessionShared>,
    info: VideoInfo,
    driver: Option<JoinHandle<()>>,
}

impl PlayerSession {
    /// Starts a session with the default queue capacity.
    pub fn start<E, F>(make_engine: F) -> Result<Self, PlayerError>
    where
        E: DecodeStep,
        F: FnOnce() -> Result<(E, VideoInfo), PlayerError> + Send + 'static,
    {
        Self::with_capacity(FrameQueue::DEFAULT_CAPACITY, make_engine)
    }

    pub fn with_capacity<E, F>(capacity: usize, make_engine: F) -> Result<Self, PlayerError>
    where
        E: DecodeStep,
        F: FnOnce() -> Result<(E, VideoInfo), PlayerError> + Send + 'static,
    {
        let shared = Arc::new(SessionShared::new(capacity));
        let thread_shared = Arc::clone(&shared);
        let (init_tx, init_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("decode".into())
            .spawn(move || {
                let engine = match make_engine() {
                    Ok((engine, info)) => {
                        let _ = init_tx.send(Ok(info));
                        engine
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };
                run_decode_loop(engine, &thread_shared);
            })?;

        match init_rx.recv() {
            Ok(Ok(info)) => Ok(PlayerSession {
                shared,
                info,
                driver: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(PlayerError::DecoderInit(
                    "decode thread exited during initialization".into(),
                ))
            }
        }
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    pub fn queue(&self) -> &FrameQueue {
        self.shared.queue()
    }

    /// Handle for a consumer running on its own thread.
    pub fn shared(&self) -> Arc<SessionShared> {
        Arc::clone(&self.shared)
    }

    /// Requests shutdown and joins the decode thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Two-phase: flip the flag, then close the queue so a producer
        // parked in push (or a consumer parked in pop) wakes up and sees it.
        self.shared.playing.store(false, Ordering::Release);
        self.shared.queue().close();
        if let Some(handle) = self.driver.take() {
            if handle.join().is_err() {
                log::error!("decode thread panicked");
            }
        }
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_decode_loop<E: DecodeStep>(mut engine: E, shared: &SessionShared) {
    while shared.is_playing() {
        match engine.decode(shared.queue()) {
            DecodeStatus::Continue => {}
            DecodeStatus::Retry => {
                log::trace!("decode step asked for a retry");
            }
            DecodeStatus::Fatal(e) => {
                log::error!("decode loop stopping: {e}");
                break;
            }
        }
    }
    // Lets a consumer drain what is buffered and then observe end of
    // session instead of blocking forever.
    shared.queue().close();
    // The engine drops here, on the thread that owned it, releasing the
    // codec context, hardware device, scratch frames and converter.
}
