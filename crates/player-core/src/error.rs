use thiserror::Error;

/// Errors surfaced to callers of the library.
///
/// Per-frame decode errors never appear here; those are absorbed into
/// [`crate::video::DecodeStatus`] on the decode thread. Only open-time and
/// resource-exhaustion failures are reported as values.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("ffmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error("no video stream found in source")]
    NoVideoStream,

    #[error("malformed stream metadata: {0}")]
    BadStreamMetadata(String),

    #[error("decoder initialization failed: {0}")]
    DecoderInit(String),

    #[error("out of memory allocating a {0} byte frame buffer")]
    FrameAllocation(usize),

    #[error("failed to spawn decode thread: {0}")]
    DecodeThread(#[from] std::io::Error),
}
