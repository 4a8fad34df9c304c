//! `hwa-surface` — Video surface interop for hardware acceleration APIs.
//!
//! The crate talks to an acceleration driver through the [`AccelDriver`]
//! trait and builds safe, refcounted surfaces on top of it:
//!
//! - **Context**: [`AccelContext`] owns the driver connection and the image
//!   format catalog queried at startup.
//! - **Surfaces**: [`Surface`] wraps a driver surface handle; device frames
//!   wrap surfaces so pipelines can pass them around like any other frame.
//! - **Transfer**: [`Surface::upload`] and [`Surface::download`] copy pixels
//!   between host frames and surfaces, using zero-copy derived images when
//!   the driver allows and staged blits when it does not.
//! - **Pooling**: [`SurfaceAllocator`] plugs surface allocation into a frame
//!   pool so recycled device frames keep their surfaces.
//! - **Fallback**: [`SoftwareDriver`] implements the driver trait in process
//!   memory for tests and driverless operation.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use hwa_common::{Frame, PixelFormat, Resolution};
//! use hwa_surface::{AccelContext, SoftwareDriver, StorageFormat, Surface};
//!
//! # fn main() -> Result<(), hwa_surface::SurfaceError> {
//! let ctx = AccelContext::initialize(Arc::new(SoftwareDriver::new()))?;
//! let surface = Surface::create(&ctx, StorageFormat::Yuv420, Resolution::new(8, 4))?;
//!
//! let mut src = Frame::alloc(PixelFormat::Nv12, Resolution::new(8, 4));
//! src.plane_mut(0).fill(0x40);
//! src.plane_mut(1).fill(0x80);
//!
//! surface.upload(&src)?;
//! let copy = surface.download(None)?;
//! assert_eq!(copy.plane(0), src.plane(0));
//! assert_eq!(copy.plane(1), src.plane(1));
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod context;
pub mod driver;
pub mod error;
pub mod format;
pub mod fourcc;
pub mod software;
pub mod surface;
pub mod transfer;

pub use allocator::{bind_surface_allocator, SurfaceAllocator};
pub use context::AccelContext;
pub use driver::{
    colorspace_hint, AccelDriver, ApiVersion, BufferId, DriverResult, DriverStatus, ImageFormat,
    ImageId, ImageInfo, MappedBuffer, StorageFormat, SurfaceId, HINT_BT601, HINT_BT709,
    HINT_SMPTE240,
};
pub use error::{SurfaceError, SurfaceResult};
pub use fourcc::FourCc;
pub use software::{SoftwareDriver, SoftwareDriverConfig};
pub use surface::Surface;
pub use transfer::{download_from_frame, upload_to_frame};
