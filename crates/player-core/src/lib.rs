pub mod error;
pub mod source;
pub mod video;

use ffmpeg_next as ffmpeg;

pub use error::PlayerError;
pub use source::open_stream;
pub use video::{
    DecodeStatus, DecodeStep, DecoderEngine, FrameBuffer, FrameQueue, PlayerSession,
    SessionShared, StreamTiming, VideoInfo,
};

/// Registers FFmpeg once per process and quiets its logger; decode noise is
/// reported through `log` instead.
pub fn init() -> Result<(), PlayerError> {
    ffmpeg::init()?;
    ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
    Ok(())
}
