use std::ptr::{null, null_mut};

use ffmpeg_next::ffi::{
    av_buffer_ref, av_buffer_unref, av_hwdevice_ctx_create, av_hwframe_transfer_data, AVBufferRef,
    AVCodecContext, AVHWDeviceType, AVPixelFormat,
};
use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame;

use crate::error::PlayerError;

/// State handed to the `get_format` callback through the codec context's
/// opaque pointer, so format negotiation needs no globals.
#[repr(C)]
struct FormatState {
    pix_fmt: AVPixelFormat,
}

extern "C" fn get_hw_format(
    ctx: *mut AVCodecContext,
    pix_fmts: *const AVPixelFormat,
) -> AVPixelFormat {
    let state = unsafe { (*ctx).opaque } as *const FormatState;
    let wanted = unsafe { (*state).pix_fmt };

    let mut i = 0;
    unsafe {
        loop {
            let format = *pix_fmts.offset(i);
            if format == AVPixelFormat::AV_PIX_FMT_NONE {
                break;
            }
            if format == wanted {
                return format;
            }
            i += 1;
        }
    }
    AVPixelFormat::AV_PIX_FMT_NONE
}

/// RAII wrapper around an FFmpeg hardware device context plus the format
/// negotiation state it lends to the codec context.
///
/// Must outlive the codec context it was installed on; the engine keeps the
/// decoder field declared before this one so drop order holds that up.
pub(crate) struct HwDevice {
    ctx: *mut AVBufferRef,
    device_type: AVHWDeviceType,
    transfer_format: Pixel,
    state: Box<FormatState>,
}

impl HwDevice {
    /// Tries to create a device of `device_type`. Failure means this
    /// acceleration backend is absent on the host, not a fatal condition.
    pub(crate) fn new(
        device_type: AVHWDeviceType,
        pix_fmt: AVPixelFormat,
    ) -> Result<Self, PlayerError> {
        let mut ctx = null_mut();
        unsafe {
            if av_hwdevice_ctx_create(&mut ctx, device_type, null(), null_mut(), 0) < 0 {
                return Err(PlayerError::DecoderInit(format!(
                    "failed to create hardware device context for {device_type:?}"
                )));
            }
        }
        Ok(HwDevice {
            ctx,
            device_type,
            transfer_format: Pixel::from(pix_fmt),
            state: Box::new(FormatState { pix_fmt }),
        })
    }

    /// Binds the device to an unopened codec context: installs the format
    /// callback and a reference to the device. The codec context must not
    /// outlive `self`.
    pub(crate) unsafe fn install(&self, codec_ctx: *mut AVCodecContext) -> Result<(), PlayerError> {
        let device_ref = av_buffer_ref(self.ctx);
        if device_ref.is_null() {
            return Err(PlayerError::DecoderInit(
                "failed to reference hardware device context".into(),
            ));
        }
        (*codec_ctx).opaque = &*self.state as *const FormatState as *mut std::ffi::c_void;
        (*codec_ctx).get_format = Some(get_hw_format);
        (*codec_ctx).hw_device_ctx = device_ref;
        Ok(())
    }

    pub(crate) fn device_type(&self) -> AVHWDeviceType {
        self.device_type
    }

    /// Pixel format the decoder emits on this device; frames in this format
    /// live in device memory and need a host transfer before conversion.
    pub(crate) fn transfer_format(&self) -> Pixel {
        self.transfer_format
    }
}

impl Drop for HwDevice {
    fn drop(&mut self) {
        unsafe {
            if !self.ctx.is_null() {
                av_buffer_unref(&mut self.ctx);
            }
        }
    }
}

unsafe impl Send for HwDevice {}

/// Copies a device-resident frame into host memory, letting FFmpeg pick the
/// host pixel format and allocate `dst`.
pub(crate) fn transfer_to_host(
    src: &frame::Video,
    dst: &mut frame::Video,
) -> Result<(), ffmpeg_next::Error> {
    let ret = unsafe { av_hwframe_transfer_data(dst.as_mut_ptr(), src.as_ptr(), 0) };
    if ret < 0 {
        Err(ffmpeg_next::Error::from(ret))
    } else {
        Ok(())
    }
}
