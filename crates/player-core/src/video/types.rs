use crate::error::PlayerError;

/// One decoded, format-converted video frame.
///
/// The pixel buffer is tightly packed RGB24 (width * height * 3 bytes) and has
/// a single owner at all times: the engine until `push`, the queue until
/// `pop`, then the consumer, which frees it by dropping.
#[derive(Debug)]
pub struct FrameBuffer {
    pub pixels: Vec<u8>,
    /// Presentation time in microseconds since stream start.
    pub pts: i64,
}

impl FrameBuffer {
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

/// Stream facts a consumer needs before the first frame arrives, reported
/// once by the engine at session start.
#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Bytes per converted frame (width * height * 3 for RGB24).
    pub frame_size: usize,
}

/// Outcome of one decode step, inspected by the loop driver.
#[derive(Debug)]
pub enum DecodeStatus {
    /// Keep iterating; a frame may or may not have been enqueued.
    Continue,
    /// The source hit EOF or a read error and was rewound; iterate again.
    Retry,
    /// Unrecoverable; the driver must stop the loop.
    Fatal(PlayerError),
}
