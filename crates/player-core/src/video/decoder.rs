use ffmpeg_next::codec::{self, context::Context};
use ffmpeg_next::ffi::{
    av_seek_frame, avcodec_get_hw_config, AVSEEK_FLAG_BACKWARD,
    AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX,
};
use ffmpeg_next::format::{context::Input, Pixel};
use ffmpeg_next::software::scaling::{context::Context as Scaler, flag::Flags};
use ffmpeg_next::{frame, Codec, Packet};

use super::driver::DecodeStep;
use super::hardware::{self, HwDevice};
use super::queue::FrameQueue;
use super::timing::StreamTiming;
use super::types::{DecodeStatus, FrameBuffer, VideoInfo};
use crate::error::PlayerError;

/// Turns compressed packets from one demuxed stream into display-ready
/// RGB24 frame buffers, preferring hardware decoding and falling back to
/// software transparently.
///
/// End-of-stream and transient read errors rewind the source instead of
/// terminating; the engine is built for continuously playing sources.
/// Owned exclusively by the decode thread; only the queue is shared.
pub struct DecoderEngine {
    input: Input,
    stream_index: usize,
    timing: StreamTiming,
    // `decoder` must stay declared before `hw`: the codec context borrows
    // the device's negotiation state until it is freed.
    decoder: codec::decoder::Video,
    hw: Option<HwDevice>,
    scaler: Option<Scaler>,
    display_frame: frame::Video,
    width: u32,
    height: u32,
    frame_size: usize,
}

impl DecoderEngine {
    /// Opens a decoder for `stream_index` of an already-opened source.
    ///
    /// Hardware acquisition is attempted first; any failure in that chain
    /// (no hw config, device creation, codec open) demotes to the software
    /// path. Software open failure is fatal.
    pub fn new(input: Input, stream_index: usize) -> Result<Self, PlayerError> {
        let (timing, parameters) = {
            let stream = input
                .stream(stream_index)
                .ok_or(PlayerError::NoVideoStream)?;
            (StreamTiming::from_stream(&stream)?, stream.parameters())
        };

        let (decoder, hw) = match Self::open_hardware(&parameters) {
            Ok((decoder, device)) => {
                log::info!("hardware decoder active via {:?}", device.device_type());
                (decoder, Some(device))
            }
            Err(e) => {
                log::warn!("hardware decoding unavailable ({e}), using software decoder");
                (Self::open_software(&parameters)?, None)
            }
        };

        let width = decoder.width();
        let height = decoder.height();
        if width == 0 || height == 0 {
            return Err(PlayerError::BadStreamMetadata(format!(
                "stream reports {width}x{height} frames"
            )));
        }

        // The display frame and its byte size are fixed for the whole
        // session; the scaler writes into the same buffer every frame.
        let display_frame = frame::Video::new(Pixel::RGB24, width, height);
        let frame_size = width as usize * height as usize * 3;

        Ok(DecoderEngine {
            input,
            stream_index,
            timing,
            decoder,
            hw,
            scaler: None,
            display_frame,
            width,
            height,
            frame_size,
        })
    }

    fn open_hardware(
        parameters: &codec::Parameters,
    ) -> Result<(codec::decoder::Video, HwDevice), PlayerError> {
        let codec = ffmpeg_next::decoder::find(parameters.id()).ok_or_else(|| {
            PlayerError::DecoderInit(format!("no decoder for codec {:?}", parameters.id()))
        })?;
        let device = Self::probe_hw_configs(&codec)?;

        let mut context = Context::from_parameters(parameters.clone())?;
        unsafe {
            device.install(context.as_mut_ptr())?;
        }
        let decoder = context.decoder().video().map_err(|e| {
            PlayerError::DecoderInit(format!("hardware codec open failed: {e}"))
        })?;
        Ok((decoder, device))
    }

    /// Walks the codec's advertised hardware configurations and returns a
    /// device for the first one that can actually be created on this host.
    fn probe_hw_configs(codec: &Codec) -> Result<HwDevice, PlayerError> {
        let mut i = 0;
        unsafe {
            loop {
                let config = avcodec_get_hw_config(codec.as_ptr(), i);
                if config.is_null() {
                    break;
                }
                let config = &*config;
                if config.methods & AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX as i32 != 0 {
                    match HwDevice::new(config.device_type, config.pix_fmt) {
                        Ok(device) => return Ok(device),
                        Err(e) => log::debug!("skipping hardware config: {e}"),
                    }
                }
                i += 1;
            }
        }
        Err(PlayerError::DecoderInit(
            "codec has no usable hardware configuration".into(),
        ))
    }

    fn open_software(
        parameters: &codec::Parameters,
    ) -> Result<codec::decoder::Video, PlayerError> {
        let context = Context::from_parameters(parameters.clone())?;
        context
            .decoder()
            .video()
            .map_err(|e| PlayerError::DecoderInit(format!("software codec open failed: {e}")))
    }

    pub fn is_hardware(&self) -> bool {
        self.hw.is_some()
    }

    pub fn timing(&self) -> &StreamTiming {
        &self.timing
    }

    pub fn info(&self) -> VideoInfo {
        VideoInfo {
            width: self.width,
            height: self.height,
            fps: self.timing.fps(),
            frame_size: self.frame_size,
        }
    }

    fn seek_to_start(&mut self) {
        let ret = unsafe {
            av_seek_frame(
                self.input.as_mut_ptr(),
                self.stream_index as i32,
                0,
                AVSEEK_FLAG_BACKWARD as i32,
            )
        };
        if ret < 0 {
            log::warn!(
                "seek to stream start failed: {}",
                ffmpeg_next::Error::from(ret)
            );
        }
    }

    /// Scales `src` into the pre-allocated display frame, creating the
    /// converter on first use (the decoded pixel format is only known once
    /// a frame has come out, especially on the hardware path).
    fn convert_frame(&mut self, src: &frame::Video) -> Result<(), PlayerError> {
        if self.scaler.is_none() {
            let scaler = Scaler::get(
                src.format(),
                src.width(),
                src.height(),
                Pixel::RGB24,
                self.width,
                self.height,
                Flags::BILINEAR,
            )
            .map_err(|e| PlayerError::DecoderInit(format!("pixel format converter: {e}")))?;
            self.scaler = Some(scaler);
        }
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.run(src, &mut self.display_frame)?;
        }
        Ok(())
    }
}

impl DecodeStep for DecoderEngine {
    fn decode(&mut self, queue: &FrameQueue) -> DecodeStatus {
        let mut packet = Packet::empty();
        if let Err(e) = packet.read(&mut self.input) {
            // EOF and transient read errors alike: rewind and keep playing.
            log::debug!("packet read failed ({e}), rewinding stream");
            self.seek_to_start();
            return DecodeStatus::Retry;
        }

        if packet.stream() != self.stream_index {
            return DecodeStatus::Continue;
        }

        if let Err(e) = self.decoder.send_packet(&packet) {
            log::debug!("dropping undecodable packet: {e}");
            return DecodeStatus::Continue;
        }

        let mut decoded = frame::Video::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let codec_pts = decoded.pts().unwrap_or(0);

            let mut host_frame = frame::Video::empty();
            let on_device = self
                .hw
                .as_ref()
                .is_some_and(|hw| decoded.format() == hw.transfer_format());
            let src = if on_device {
                if let Err(e) = hardware::transfer_to_host(&decoded, &mut host_frame) {
                    // One bad surface is not worth killing playback over.
                    log::warn!("hardware frame transfer failed, skipping frame: {e}");
                    continue;
                }
                host_frame.set_pts(decoded.pts());
                &host_frame
            } else {
                &decoded
            };

            if let Err(e) = self.convert_frame(src) {
                log::warn!("frame conversion failed, skipping frame: {e}");
                continue;
            }

            let pixels = match pack_display_pixels(
                &self.display_frame,
                self.width as usize,
                self.height as usize,
                self.frame_size,
            ) {
                Ok(pixels) => pixels,
                Err(e) => return DecodeStatus::Fatal(e),
            };

            let buffer = FrameBuffer {
                pixels,
                pts: self.timing.presentation_micros(codec_pts),
            };
            // May block while the queue is full; the consumer's pops provide
            // the pacing. A closed queue means shutdown is in progress.
            if queue.push(buffer).is_err() {
                return DecodeStatus::Continue;
            }

            // One frame per call keeps the loop responsive to the stop
            // signal; the codec's remaining output drains on later calls.
            return DecodeStatus::Continue;
        }

        DecodeStatus::Continue
    }
}

/// Copies the padded scaler output into a tightly packed, per-frame owned
/// buffer. Allocation failure is the one unrecoverable decode-time error.
fn pack_display_pixels(
    frame: &frame::Video,
    width: usize,
    height: usize,
    frame_size: usize,
) -> Result<Vec<u8>, PlayerError> {
    let mut pixels = Vec::new();
    if pixels.try_reserve_exact(frame_size).is_err() {
        return Err(PlayerError::FrameAllocation(frame_size));
    }
    let data = frame.data(0);
    let stride = frame.stride(0);
    let row = width * 3;
    for y in 0..height {
        let start = y * stride;
        pixels.extend_from_slice(&data[start..start + row]);
    }
    Ok(pixels)
}
