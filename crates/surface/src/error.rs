//! Error types for the surface layer.

use thiserror::Error;

use hwa_common::{PixelFormat, Resolution};

use crate::driver::DriverStatus;

/// Errors from surface creation, image management and pixel transfer.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// A driver entry point returned a failure status.
    #[error("driver call {call} failed: {status}")]
    Driver {
        call: &'static str,
        status: DriverStatus,
    },

    /// The driver initialized but advertises no image formats at all.
    #[error("driver reported no usable image formats")]
    NoImageFormats,

    /// No driver image format corresponds to this frame format.
    #[error("no driver image format for {format:?}")]
    UnsupportedFormat { format: PixelFormat },

    /// Frame and surface dimensions differ.
    #[error("frame is {got}, surface is {want}")]
    SizeMismatch { want: Resolution, got: Resolution },

    /// The frame does not wrap an accelerator surface.
    #[error("frame does not wrap an accelerator surface")]
    NotDeviceFrame,

    /// Every advertised image format was tried and none transferred.
    #[error("failed to get surface data")]
    DownloadFailed,
}

impl SurfaceError {
    pub(crate) fn driver(call: &'static str, status: DriverStatus) -> Self {
        Self::Driver { call, status }
    }
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;
