use ffmpeg_next::format::{self, context::Input};
use ffmpeg_next::media::Type;
use ffmpeg_next::Dictionary;

use crate::error::PlayerError;

/// Microseconds before a stalled RTSP read gives up; the connection-level
/// bound the decode loop itself relies on.
const RTSP_SOCKET_TIMEOUT_US: &str = "5000000";

/// Opens a network or file source and picks its best video stream.
///
/// RTSP sources are forced onto TCP with a socket timeout so a dead camera
/// surfaces as a read error (which the engine treats as retry) instead of a
/// hang without bound.
pub fn open_stream(url: &str) -> Result<(Input, usize), PlayerError> {
    let input = if url.starts_with("rtsp://") {
        let mut options = Dictionary::new();
        options.set("rtsp_transport", "tcp");
        options.set("stimeout", RTSP_SOCKET_TIMEOUT_US);
        format::input_with_dictionary(&url, options)?
    } else {
        format::input(&url)?
    };

    let index = {
        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or(PlayerError::NoVideoStream)?;
        log::info!(
            "opened {} ({}): video stream {} of {}, codec {:?}, {} fps",
            url,
            input.format().name(),
            stream.index(),
            input.streams().count(),
            stream.parameters().id(),
            f64::from(stream.rate()),
        );
        stream.index()
    };

    Ok((input, index))
}
