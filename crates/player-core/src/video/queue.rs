use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use super::types::FrameBuffer;

/// Thread-safe, fixed-capacity FIFO of decoded frames.
///
/// Mediates between the decode thread (producer) and the render loop
/// (consumer) running at unsynchronized rates. A full queue blocks the
/// producer instead of dropping frames, which bounds memory while keeping
/// every decoded frame; `close` releases anyone parked in `push` or `pop`
/// so shutdown cannot deadlock.
#[derive(Debug)]
pub struct FrameQueue {
    inner: Mutex<Inner>,
    cond: Condvar,
    capacity: usize,
}

#[derive(Debug)]
struct Inner {
    frames: VecDeque<FrameBuffer>,
    closed: bool,
}

impl FrameQueue {
    pub const DEFAULT_CAPACITY: usize = 30;

    /// Panics if `capacity` is zero; a zero-capacity queue could never accept
    /// a frame.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "frame queue capacity must be non-zero");
        FrameQueue {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            cond: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic on the other thread while holding the lock leaves the
        // deque itself intact, so keep going rather than poisoning shutdown.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Blocks until there is room, then appends `frame` at the tail.
    ///
    /// Returns the frame back to the caller if the queue was closed while
    /// waiting, so a producer parked on a full queue is released at shutdown
    /// without losing ownership semantics.
    pub fn push(&self, frame: FrameBuffer) -> Result<(), FrameBuffer> {
        let mut inner = self.lock();
        while inner.frames.len() >= self.capacity && !inner.closed {
            inner = self.cond.wait(inner).unwrap_or_else(|e| e.into_inner());
        }
        if inner.closed {
            return Err(frame);
        }
        inner.frames.push_back(frame);
        self.cond.notify_one();
        Ok(())
    }

    /// Blocks until a frame is available and removes the oldest one.
    ///
    /// Returns `None` only once the queue is closed and fully drained.
    pub fn pop(&self) -> Option<FrameBuffer> {
        let mut inner = self.lock();
        loop {
            if let Some(frame) = inner.frames.pop_front() {
                self.cond.notify_one();
                return Some(frame);
            }
            if inner.closed {
                return None;
            }
            inner = self.cond.wait(inner).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Non-blocking pop for a consumer that must not stall its render tick.
    pub fn try_pop(&self) -> Option<FrameBuffer> {
        let mut inner = self.lock();
        let frame = inner.frames.pop_front();
        if frame.is_some() {
            self.cond.notify_one();
        }
        frame
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Marks the queue closed and wakes every waiter. Buffered frames remain
    /// poppable; further pushes are refused. Called once, from the session
    /// shutdown path or when the decode loop exits.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        self.cond.notify_all();
    }
}
