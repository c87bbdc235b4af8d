use ffmpeg_next::format::stream::Stream;
use ffmpeg_next::Rational;

use crate::error::PlayerError;

/// Timing facts derived once when a stream session opens; read-only after.
///
/// A source reporting a non-positive frame rate or time base is malformed
/// and rejected here, before any decode work starts.
#[derive(Debug, Clone)]
pub struct StreamTiming {
    fps: f64,
    frame_delay: f64,
    time_base: Rational,
    time_base_double: f64,
}

impl StreamTiming {
    pub fn from_stream(stream: &Stream) -> Result<Self, PlayerError> {
        Self::new(stream.rate(), stream.time_base())
    }

    pub fn new(rate: Rational, time_base: Rational) -> Result<Self, PlayerError> {
        let fps = f64::from(rate);
        if fps <= 0.0 {
            return Err(PlayerError::BadStreamMetadata(format!(
                "invalid frame rate {rate:?}"
            )));
        }
        let time_base_double = f64::from(time_base);
        if time_base_double <= 0.0 {
            return Err(PlayerError::BadStreamMetadata(format!(
                "invalid time base {time_base:?}"
            )));
        }
        Ok(StreamTiming {
            fps,
            frame_delay: 1.0 / fps,
            time_base,
            time_base_double,
        })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Nominal seconds between frames (1/fps).
    pub fn frame_delay(&self) -> f64 {
        self.frame_delay
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn time_base_double(&self) -> f64 {
        self.time_base_double
    }

    /// Converts a codec timestamp into a presentation time in microseconds,
    /// truncating toward negative infinity.
    pub fn presentation_micros(&self, timestamp: i64) -> i64 {
        (timestamp as f64 * self.time_base_double * 1_000_000.0).floor() as i64
    }
}
