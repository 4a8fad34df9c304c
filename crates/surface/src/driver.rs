//! Accelerator driver abstraction.
//!
//! [`AccelDriver`] is the seam between the surface layer and a concrete
//! acceleration API. Everything above it works in terms of opaque handles,
//! image descriptors and raw status codes; everything below it talks to real
//! hardware (or to the in-process [`crate::software::SoftwareDriver`]).

use std::fmt;
use std::ptr::NonNull;

use thiserror::Error;

use hwa_common::ColorSpace;

use crate::fourcc::FourCc;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Driver handle to a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u32);

impl SurfaceId {
    /// Sentinel meaning "no surface". Drivers never allocate this value.
    pub const INVALID: Self = Self(u32::MAX);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("invalid")
        }
    }
}

/// Driver handle to an image (a CPU-addressable pixel layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(u32);

impl ImageId {
    /// Sentinel meaning "no image". Drivers never allocate this value.
    pub const INVALID: Self = Self(u32::MAX);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("invalid")
        }
    }
}

/// Driver handle to a mappable data buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(u32);

impl BufferId {
    /// Sentinel meaning "no buffer". Drivers never allocate this value.
    pub const INVALID: Self = Self(u32::MAX);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("invalid")
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Driver API version reported by [`AccelDriver::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Chroma layout a surface is allocated with. This constrains which image
/// formats the driver can blit to and from the surface, not the exact byte
/// layout of its internal storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageFormat {
    Yuv420,
    Yuv422,
    Yuv444,
    Rgb32,
}

/// One image layout the driver can produce or consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFormat {
    pub fourcc: FourCc,
    pub bits_per_pixel: u32,
}

/// Full description of a driver image: its handle, layout and backing buffer.
///
/// `pitches` and `offsets` are indexed by driver plane order, which for some
/// layouts differs from the logical plane order (YV12 stores V before U).
/// Unused trailing entries are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub id: ImageId,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub num_planes: u32,
    pub pitches: [u32; 3],
    pub offsets: [u32; 3],
    /// Total size of the backing buffer in bytes.
    pub data_size: usize,
    pub buffer: BufferId,
}

/// A CPU mapping of a driver buffer.
///
/// The pointer stays valid until [`AccelDriver::unmap_buffer`] is called for
/// the owning buffer. The caller is responsible for staying inside `len`.
#[derive(Debug)]
pub struct MappedBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

impl MappedBuffer {
    pub fn new(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// SAFETY: MappedBuffer describes a driver-owned mapping that stays valid until
// the matching unmap call; access is externally synchronized by the caller.
unsafe impl Send for MappedBuffer {}

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Raw failure code returned by driver entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DriverStatus {
    #[error("operation failed")]
    OperationFailed,
    #[error("allocation failed")]
    AllocationFailed,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("invalid surface handle")]
    InvalidSurface,
    #[error("invalid image handle")]
    InvalidImage,
    #[error("invalid buffer handle")]
    InvalidBuffer,
    #[error("unsupported image format")]
    UnsupportedFormat,
    #[error("not implemented by this driver")]
    Unimplemented,
}

pub type DriverResult<T> = Result<T, DriverStatus>;

// ---------------------------------------------------------------------------
// Driver trait
// ---------------------------------------------------------------------------

/// Backend interface to an acceleration API.
///
/// Implementations must be safe to call from multiple threads; the surface
/// layer serializes per-surface state itself but issues unrelated calls
/// concurrently.
pub trait AccelDriver: Send + Sync {
    /// Bring up the driver connection and report its API version.
    fn initialize(&self) -> DriverResult<ApiVersion>;

    /// Tear down the driver connection. Outstanding handles become invalid.
    fn terminate(&self);

    /// All image layouts this driver can blit surfaces to and from.
    fn query_image_formats(&self) -> DriverResult<Vec<ImageFormat>>;

    fn create_surface(
        &self,
        storage: StorageFormat,
        width: u32,
        height: u32,
    ) -> DriverResult<SurfaceId>;

    fn destroy_surface(&self, surface: SurfaceId) -> DriverResult<()>;

    /// Expose a surface's own storage as an image without copying.
    ///
    /// The driver chooses the layout. Callers must check the returned format
    /// and dimensions; a driver may derive something other than what they
    /// want, and many drivers fail here outright.
    fn derive_image(&self, surface: SurfaceId) -> DriverResult<ImageInfo>;

    /// Allocate a standalone image with the given layout and size.
    fn create_image(&self, format: ImageFormat, width: u32, height: u32)
        -> DriverResult<ImageInfo>;

    /// Free an image and its backing buffer. Derived images detach from
    /// their surface without touching the surface contents.
    fn destroy_image(&self, image: ImageId) -> DriverResult<()>;

    /// Map an image's backing buffer into CPU address space.
    fn map_buffer(&self, buffer: BufferId) -> DriverResult<MappedBuffer>;

    /// Release a CPU mapping. Pointers from the mapping become dangling.
    fn unmap_buffer(&self, buffer: BufferId) -> DriverResult<()>;

    /// Blit the full surface contents into an image, converting layout as
    /// needed. `width` and `height` must match the surface dimensions.
    fn get_image(&self, surface: SurfaceId, width: u32, height: u32, image: ImageId)
        -> DriverResult<()>;

    /// Blit full image contents onto a surface, converting layout as needed.
    fn put_image(&self, surface: SurfaceId, image: ImageId, width: u32, height: u32)
        -> DriverResult<()>;

    /// Block until all pending operations targeting the surface finish.
    fn sync_surface(&self, surface: SurfaceId) -> DriverResult<()>;
}

// ---------------------------------------------------------------------------
// Presentation hints
// ---------------------------------------------------------------------------

/// Presentation-hint flag requesting BT.601 interpretation.
pub const HINT_BT601: u32 = 0x0000_0010;
/// Presentation-hint flag requesting BT.709 interpretation.
pub const HINT_BT709: u32 = 0x0000_0020;
/// Presentation-hint flag requesting SMPTE 240M interpretation.
pub const HINT_SMPTE240: u32 = 0x0000_0040;

/// Map a frame's color space to the driver presentation-hint flag.
///
/// Spaces the hint flags cannot express (including BT.2020) map to zero,
/// leaving the choice to the driver.
pub fn colorspace_hint(space: ColorSpace) -> u32 {
    match space {
        ColorSpace::Bt601 => HINT_BT601,
        ColorSpace::Bt709 => HINT_BT709,
        ColorSpace::Smpte240m => HINT_SMPTE240,
        ColorSpace::Unspecified | ColorSpace::Bt2020 => 0,
    }
}
