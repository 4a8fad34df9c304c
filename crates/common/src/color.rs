//! Color space and pixel format types.

use serde::{Deserialize, Serialize};

use crate::types::Resolution;

/// Pixel format of a frame, in memory or on an accelerator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Planar YUV 4:2:0: Y plane plus separate U and V planes at half resolution.
    Yuv420,
    /// NV12: Y plane + interleaved UV at half resolution (HW decoder output).
    Nv12,
    /// Packed YUV 4:2:2, Y0 U Y1 V byte order.
    Yuyv,
    /// Packed YUV 4:2:2, U Y0 V Y1 byte order.
    Uyvy,
    /// 4 channels, 8 bits each, R first in memory.
    Rgba8,
    /// BGRA8 (some GPU APIs prefer this ordering).
    Bgra8,
    /// Opaque accelerator surface; pixel data lives behind a driver handle.
    Device,
}

impl PixelFormat {
    /// Number of separately stored planes. Zero for [`PixelFormat::Device`],
    /// whose data is not addressable.
    pub fn plane_count(self) -> usize {
        match self {
            Self::Yuv420 => 3,
            Self::Nv12 => 2,
            Self::Yuyv | Self::Uyvy | Self::Rgba8 | Self::Bgra8 => 1,
            Self::Device => 0,
        }
    }

    /// Used row bytes and row count of one plane at the given resolution.
    /// Chroma planes round up for odd dimensions.
    ///
    /// # Panics
    ///
    /// Panics if `plane` is out of range for the format.
    pub fn plane_dims(self, plane: usize, resolution: Resolution) -> (usize, usize) {
        let w = resolution.width as usize;
        let h = resolution.height as usize;
        let cw = resolution.chroma_width() as usize;
        let ch = resolution.chroma_height() as usize;
        match (self, plane) {
            (Self::Yuv420, 0) => (w, h),
            (Self::Yuv420, 1 | 2) => (cw, ch),
            (Self::Nv12, 0) => (w, h),
            (Self::Nv12, 1) => (cw * 2, ch),
            (Self::Yuyv | Self::Uyvy, 0) => (cw * 4, h),
            (Self::Rgba8 | Self::Bgra8, 0) => (w * 4, h),
            _ => panic!("format {self:?} has no plane {plane}"),
        }
    }

    /// Total byte size of a tightly packed frame. Zero for device frames.
    pub fn byte_size(self, resolution: Resolution) -> usize {
        (0..self.plane_count())
            .map(|plane| {
                let (row_bytes, rows) = self.plane_dims(plane, resolution);
                row_bytes * rows
            })
            .sum()
    }

    pub fn is_device(self) -> bool {
        matches!(self, Self::Device)
    }
}

/// Color space / color primaries of YUV content.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorSpace {
    /// Unknown or not applicable (RGB content).
    #[default]
    Unspecified,
    /// BT.601 (SD video standard).
    Bt601,
    /// BT.709 (HD video standard).
    Bt709,
    /// SMPTE 240M (early HD broadcast).
    Smpte240m,
    /// BT.2020 (HDR / UHD content).
    Bt2020,
}
