//! Mapping between frame pixel formats and driver fourccs.

use hwa_common::PixelFormat;

use crate::fourcc::{self, FourCc};

/// Corresponding (fourcc, pixel format) pairs.
///
/// Order matters: lookups take the first match in each direction, so
/// [`PixelFormat::Yuv420`] prefers the YV12 fourcc while I420 and IYUV still
/// decode to it.
const FORMAT_TABLE: &[(FourCc, PixelFormat)] = &[
    (fourcc::YV12, PixelFormat::Yuv420),
    (fourcc::I420, PixelFormat::Yuv420),
    (fourcc::IYUV, PixelFormat::Yuv420),
    (fourcc::NV12, PixelFormat::Nv12),
    (fourcc::UYVY, PixelFormat::Uyvy),
    (fourcc::YUY2, PixelFormat::Yuyv),
    (fourcc::RGBA, PixelFormat::Rgba8),
    (fourcc::RGBX, PixelFormat::Rgba8),
    (fourcc::BGRA, PixelFormat::Bgra8),
    (fourcc::BGRX, PixelFormat::Bgra8),
];

/// The frame format a driver fourcc corresponds to, if any.
pub fn pixel_format(code: FourCc) -> Option<PixelFormat> {
    FORMAT_TABLE
        .iter()
        .find(|(entry, _)| *entry == code)
        .map(|(_, format)| *format)
}

/// The preferred driver fourcc for a frame format, if any.
pub fn fourcc(format: PixelFormat) -> Option<FourCc> {
    FORMAT_TABLE
        .iter()
        .find(|(_, entry)| *entry == format)
        .map(|(code, _)| *code)
}
