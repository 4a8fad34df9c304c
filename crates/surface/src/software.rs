//! Pure software fallback driver.
//!
//! [`SoftwareDriver`] implements [`AccelDriver`] entirely in process memory,
//! so the rest of the stack can run and be tested without hardware. Surfaces
//! are NV12 buffers with aligned pitches. Staging images own plain byte
//! buffers; derived images are views of a surface. Blits convert between the
//! NV12 storage and the planar 4:2:0 layouts; packed and RGB layouts can be
//! allocated but not blitted, which mirrors drivers that advertise more
//! formats than their copy engines accept.

use std::collections::HashMap;
use std::fmt;
use std::ptr::NonNull;

use parking_lot::Mutex;
use tracing::debug;

use hwa_common::Resolution;

use crate::driver::{
    AccelDriver, ApiVersion, BufferId, DriverResult, DriverStatus, ImageFormat, ImageId,
    ImageInfo, MappedBuffer, StorageFormat, SurfaceId,
};
use crate::fourcc::{self, FourCc};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for [`SoftwareDriver`].
#[derive(Debug, Clone)]
pub struct SoftwareDriverConfig {
    /// Catalog reported by the format query, in order.
    pub formats: Vec<FourCc>,
    /// Whether surfaces expose their storage through derive.
    pub supports_derive: bool,
    /// Row alignment of surface and image pitches, in bytes.
    pub pitch_align: u32,
}

impl Default for SoftwareDriverConfig {
    fn default() -> Self {
        Self {
            formats: vec![fourcc::NV12, fourcc::YV12, fourcc::I420],
            supports_derive: true,
            pitch_align: 64,
        }
    }
}

fn bits_per_pixel(code: FourCc) -> u32 {
    match code {
        fourcc::NV12 | fourcc::I420 | fourcc::IYUV | fourcc::YV12 => 12,
        fourcc::YUY2 | fourcc::UYVY => 16,
        fourcc::RGBA | fourcc::RGBX | fourcc::BGRA | fourcc::BGRX => 32,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// Driver state
// ---------------------------------------------------------------------------

struct SoftSurface {
    resolution: Resolution,
    pitch: u32,
    /// NV12 storage: Y rows, then interleaved UV rows, both at `pitch`.
    data: Box<[u8]>,
}

enum Backing {
    /// Standalone buffer owned by the image.
    Owned(Box<[u8]>),
    /// View of a surface's storage.
    Surface(u32),
}

struct SoftImage {
    info: ImageInfo,
    backing: Backing,
}

#[derive(Default)]
struct DriverState {
    initialized: bool,
    next_id: u32,
    surfaces: HashMap<u32, SoftSurface>,
    images: HashMap<u32, SoftImage>,
}

impl DriverState {
    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

struct Layout {
    num_planes: u32,
    pitches: [u32; 3],
    offsets: [u32; 3],
    data_size: usize,
}

/// In-process [`AccelDriver`] with no hardware behind it.
pub struct SoftwareDriver {
    config: SoftwareDriverConfig,
    state: Mutex<DriverState>,
}

impl SoftwareDriver {
    pub fn new() -> Self {
        Self::with_config(SoftwareDriverConfig::default())
    }

    pub fn with_config(config: SoftwareDriverConfig) -> Self {
        Self {
            config,
            state: Mutex::new(DriverState::default()),
        }
    }

    /// Driver advertising only the given catalog, other settings default.
    pub fn with_formats(formats: &[FourCc]) -> Self {
        Self::with_config(SoftwareDriverConfig {
            formats: formats.to_vec(),
            ..SoftwareDriverConfig::default()
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    fn pitch(&self, row_bytes: u32) -> u32 {
        let align = self.config.pitch_align.max(1);
        row_bytes.div_ceil(align) * align
    }

    fn layout_for(&self, code: FourCc, width: u32, height: u32) -> Option<Layout> {
        let cw = width.div_ceil(2);
        let ch = height.div_ceil(2);
        match code {
            fourcc::NV12 => {
                let p = self.pitch(width);
                let y = p as usize * height as usize;
                let uv = p as usize * ch as usize;
                Some(Layout {
                    num_planes: 2,
                    pitches: [p, p, 0],
                    offsets: [0, y as u32, 0],
                    data_size: y + uv,
                })
            }
            fourcc::I420 | fourcc::IYUV | fourcc::YV12 => {
                let yp = self.pitch(width);
                let cp = self.pitch(cw);
                let y = yp as usize * height as usize;
                let c = cp as usize * ch as usize;
                Some(Layout {
                    num_planes: 3,
                    pitches: [yp, cp, cp],
                    offsets: [0, y as u32, (y + c) as u32],
                    data_size: y + 2 * c,
                })
            }
            fourcc::YUY2 | fourcc::UYVY => {
                let p = self.pitch(cw * 4);
                Some(Layout {
                    num_planes: 1,
                    pitches: [p, 0, 0],
                    offsets: [0, 0, 0],
                    data_size: p as usize * height as usize,
                })
            }
            fourcc::RGBA | fourcc::RGBX | fourcc::BGRA | fourcc::BGRX => {
                let p = self.pitch(width * 4);
                Some(Layout {
                    num_planes: 1,
                    pitches: [p, 0, 0],
                    offsets: [0, 0, 0],
                    data_size: p as usize * height as usize,
                })
            }
            _ => None,
        }
    }
}

impl Default for SoftwareDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SoftwareDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SoftwareDriver")
            .field("initialized", &state.initialized)
            .field("surfaces", &state.surfaces.len())
            .field("images", &state.images.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Blits between NV12 surface storage and image layouts
// ---------------------------------------------------------------------------

fn blit_from_surface(surf: &SoftSurface, info: &ImageInfo, dst: &mut [u8]) -> DriverResult<()> {
    let w = surf.resolution.width as usize;
    let h = surf.resolution.height as usize;
    let cw = surf.resolution.chroma_width() as usize;
    let ch = surf.resolution.chroma_height() as usize;
    let sp = surf.pitch as usize;
    let uv_base = sp * h;

    let yp = info.pitches[0] as usize;
    let yo = info.offsets[0] as usize;
    for row in 0..h {
        let src = &surf.data[row * sp..row * sp + w];
        dst[yo + row * yp..yo + row * yp + w].copy_from_slice(src);
    }

    match info.format.fourcc {
        fourcc::NV12 => {
            let p = info.pitches[1] as usize;
            let o = info.offsets[1] as usize;
            for row in 0..ch {
                let src = &surf.data[uv_base + row * sp..uv_base + row * sp + cw * 2];
                dst[o + row * p..o + row * p + cw * 2].copy_from_slice(src);
            }
        }
        fourcc::I420 | fourcc::IYUV | fourcc::YV12 => {
            // YV12 stores V in plane 1 and U in plane 2.
            let (u_plane, v_plane) = if info.format.fourcc == fourcc::YV12 {
                (2, 1)
            } else {
                (1, 2)
            };
            let up = info.pitches[u_plane] as usize;
            let uo = info.offsets[u_plane] as usize;
            let vp = info.pitches[v_plane] as usize;
            let vo = info.offsets[v_plane] as usize;
            for row in 0..ch {
                let src = &surf.data[uv_base + row * sp..];
                for col in 0..cw {
                    dst[uo + row * up + col] = src[col * 2];
                    dst[vo + row * vp + col] = src[col * 2 + 1];
                }
            }
        }
        _ => return Err(DriverStatus::OperationFailed),
    }
    Ok(())
}

fn blit_to_surface(surf: &mut SoftSurface, info: &ImageInfo, src: &[u8]) -> DriverResult<()> {
    let w = surf.resolution.width as usize;
    let h = surf.resolution.height as usize;
    let cw = surf.resolution.chroma_width() as usize;
    let ch = surf.resolution.chroma_height() as usize;
    let sp = surf.pitch as usize;
    let uv_base = sp * h;

    let yp = info.pitches[0] as usize;
    let yo = info.offsets[0] as usize;
    for row in 0..h {
        let dst = &mut surf.data[row * sp..row * sp + w];
        dst.copy_from_slice(&src[yo + row * yp..yo + row * yp + w]);
    }

    match info.format.fourcc {
        fourcc::NV12 => {
            let p = info.pitches[1] as usize;
            let o = info.offsets[1] as usize;
            for row in 0..ch {
                let dst = &mut surf.data[uv_base + row * sp..uv_base + row * sp + cw * 2];
                dst.copy_from_slice(&src[o + row * p..o + row * p + cw * 2]);
            }
        }
        fourcc::I420 | fourcc::IYUV | fourcc::YV12 => {
            let (u_plane, v_plane) = if info.format.fourcc == fourcc::YV12 {
                (2, 1)
            } else {
                (1, 2)
            };
            let up = info.pitches[u_plane] as usize;
            let uo = info.offsets[u_plane] as usize;
            let vp = info.pitches[v_plane] as usize;
            let vo = info.offsets[v_plane] as usize;
            for row in 0..ch {
                let dst = &mut surf.data[uv_base + row * sp..uv_base + row * sp + cw * 2];
                for col in 0..cw {
                    dst[col * 2] = src[uo + row * up + col];
                    dst[col * 2 + 1] = src[vo + row * vp + col];
                }
            }
        }
        _ => return Err(DriverStatus::OperationFailed),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// AccelDriver impl
// ---------------------------------------------------------------------------

impl AccelDriver for SoftwareDriver {
    fn initialize(&self) -> DriverResult<ApiVersion> {
        let mut state = self.state.lock();
        state.initialized = true;
        debug!("software driver initialized");
        Ok(ApiVersion { major: 1, minor: 0 })
    }

    fn terminate(&self) {
        let mut state = self.state.lock();
        state.surfaces.clear();
        state.images.clear();
        state.initialized = false;
        debug!("software driver terminated");
    }

    fn query_image_formats(&self) -> DriverResult<Vec<ImageFormat>> {
        let state = self.state.lock();
        if !state.initialized {
            return Err(DriverStatus::OperationFailed);
        }
        Ok(self
            .config
            .formats
            .iter()
            .map(|&code| ImageFormat {
                fourcc: code,
                bits_per_pixel: bits_per_pixel(code),
            })
            .collect())
    }

    fn create_surface(
        &self,
        storage: StorageFormat,
        width: u32,
        height: u32,
    ) -> DriverResult<SurfaceId> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(DriverStatus::OperationFailed);
        }
        if storage != StorageFormat::Yuv420 {
            return Err(DriverStatus::UnsupportedFormat);
        }
        if width == 0 || height == 0 {
            return Err(DriverStatus::InvalidParameter);
        }
        let pitch = self.pitch(width);
        let rows = height as usize + height.div_ceil(2) as usize;
        let id = state.alloc_id();
        state.surfaces.insert(
            id,
            SoftSurface {
                resolution: Resolution::new(width, height),
                pitch,
                data: vec![0u8; pitch as usize * rows].into_boxed_slice(),
            },
        );
        Ok(SurfaceId::from_raw(id))
    }

    fn destroy_surface(&self, surface: SurfaceId) -> DriverResult<()> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(DriverStatus::OperationFailed);
        }
        state
            .surfaces
            .remove(&surface.raw())
            .map(|_| ())
            .ok_or(DriverStatus::InvalidSurface)
    }

    fn derive_image(&self, surface: SurfaceId) -> DriverResult<ImageInfo> {
        if !self.config.supports_derive {
            return Err(DriverStatus::Unimplemented);
        }
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(DriverStatus::OperationFailed);
        }
        let Some(surf) = state.surfaces.get(&surface.raw()) else {
            return Err(DriverStatus::InvalidSurface);
        };
        let (resolution, pitch, len) = (surf.resolution, surf.pitch, surf.data.len());
        let y = pitch as usize * resolution.height as usize;
        let id = state.alloc_id();
        let info = ImageInfo {
            id: ImageId::from_raw(id),
            format: ImageFormat {
                fourcc: fourcc::NV12,
                bits_per_pixel: 12,
            },
            width: resolution.width,
            height: resolution.height,
            num_planes: 2,
            pitches: [pitch, pitch, 0],
            offsets: [0, y as u32, 0],
            data_size: len,
            buffer: BufferId::from_raw(id),
        };
        state.images.insert(
            id,
            SoftImage {
                info: info.clone(),
                backing: Backing::Surface(surface.raw()),
            },
        );
        Ok(info)
    }

    fn create_image(
        &self,
        format: ImageFormat,
        width: u32,
        height: u32,
    ) -> DriverResult<ImageInfo> {
        if width == 0 || height == 0 {
            return Err(DriverStatus::InvalidParameter);
        }
        let layout = self
            .layout_for(format.fourcc, width, height)
            .ok_or(DriverStatus::UnsupportedFormat)?;
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(DriverStatus::OperationFailed);
        }
        let id = state.alloc_id();
        let info = ImageInfo {
            id: ImageId::from_raw(id),
            format,
            width,
            height,
            num_planes: layout.num_planes,
            pitches: layout.pitches,
            offsets: layout.offsets,
            data_size: layout.data_size,
            buffer: BufferId::from_raw(id),
        };
        state.images.insert(
            id,
            SoftImage {
                info: info.clone(),
                backing: Backing::Owned(vec![0u8; layout.data_size].into_boxed_slice()),
            },
        );
        Ok(info)
    }

    fn destroy_image(&self, image: ImageId) -> DriverResult<()> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(DriverStatus::OperationFailed);
        }
        state
            .images
            .remove(&image.raw())
            .map(|_| ())
            .ok_or(DriverStatus::InvalidImage)
    }

    fn map_buffer(&self, buffer: BufferId) -> DriverResult<MappedBuffer> {
        let mut guard = self.state.lock();
        if !guard.initialized {
            return Err(DriverStatus::OperationFailed);
        }
        let DriverState {
            surfaces, images, ..
        } = &mut *guard;
        let image = images
            .get_mut(&buffer.raw())
            .ok_or(DriverStatus::InvalidBuffer)?;
        // The boxed storage never reallocates, so the pointer stays valid
        // until the image (or its surface) is destroyed.
        let (ptr, len) = match &mut image.backing {
            Backing::Owned(data) => (data.as_mut_ptr(), data.len()),
            Backing::Surface(sid) => {
                let surf = surfaces.get_mut(sid).ok_or(DriverStatus::InvalidBuffer)?;
                (surf.data.as_mut_ptr(), surf.data.len())
            }
        };
        let ptr = NonNull::new(ptr).ok_or(DriverStatus::OperationFailed)?;
        Ok(MappedBuffer::new(ptr, len))
    }

    fn unmap_buffer(&self, buffer: BufferId) -> DriverResult<()> {
        let state = self.state.lock();
        if !state.initialized {
            return Err(DriverStatus::OperationFailed);
        }
        if state.images.contains_key(&buffer.raw()) {
            Ok(())
        } else {
            Err(DriverStatus::InvalidBuffer)
        }
    }

    fn get_image(
        &self,
        surface: SurfaceId,
        width: u32,
        height: u32,
        image: ImageId,
    ) -> DriverResult<()> {
        let mut guard = self.state.lock();
        if !guard.initialized {
            return Err(DriverStatus::OperationFailed);
        }
        let DriverState {
            surfaces, images, ..
        } = &mut *guard;
        let image = images
            .get_mut(&image.raw())
            .ok_or(DriverStatus::InvalidImage)?;
        let surf = surfaces
            .get(&surface.raw())
            .ok_or(DriverStatus::InvalidSurface)?;
        if width != surf.resolution.width
            || height != surf.resolution.height
            || image.info.width != width
            || image.info.height != height
        {
            return Err(DriverStatus::InvalidParameter);
        }
        let SoftImage { info, backing } = image;
        let data = match backing {
            Backing::Owned(data) => data,
            Backing::Surface(_) => return Err(DriverStatus::InvalidImage),
        };
        blit_from_surface(surf, info, data)
    }

    fn put_image(
        &self,
        surface: SurfaceId,
        image: ImageId,
        width: u32,
        height: u32,
    ) -> DriverResult<()> {
        let mut guard = self.state.lock();
        if !guard.initialized {
            return Err(DriverStatus::OperationFailed);
        }
        let DriverState {
            surfaces, images, ..
        } = &mut *guard;
        let image = images.get(&image.raw()).ok_or(DriverStatus::InvalidImage)?;
        let surf = surfaces
            .get_mut(&surface.raw())
            .ok_or(DriverStatus::InvalidSurface)?;
        if width != surf.resolution.width
            || height != surf.resolution.height
            || image.info.width != width
            || image.info.height != height
        {
            return Err(DriverStatus::InvalidParameter);
        }
        let data = match &image.backing {
            Backing::Owned(data) => data,
            Backing::Surface(_) => return Err(DriverStatus::InvalidImage),
        };
        blit_to_surface(surf, &image.info, data)
    }

    fn sync_surface(&self, surface: SurfaceId) -> DriverResult<()> {
        let state = self.state.lock();
        if !state.initialized {
            return Err(DriverStatus::OperationFailed);
        }
        if state.surfaces.contains_key(&surface.raw()) {
            Ok(())
        } else {
            Err(DriverStatus::InvalidSurface)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
