//! Pixel transfer between host frames and surfaces.

use tracing::{debug, error, warn};

use hwa_common::{copy_plane, Frame, FramePool, PixelFormat, Resolution};

use crate::driver::{ImageFormat, ImageInfo, MappedBuffer};
use crate::error::{SurfaceError, SurfaceResult};
use crate::format;
use crate::fourcc;
use crate::surface::{ImageState, Surface};

#[derive(Clone, Copy)]
struct PlaneSpec {
    offset: usize,
    stride: usize,
}

/// CPU mapping of a surface's image, unmapped on drop.
///
/// Plane indices are logical: YV12 images present U at index 1 and V at
/// index 2 even though the driver stores them the other way around.
pub(crate) struct MappedImage<'a> {
    surface: &'a Surface,
    info: ImageInfo,
    mapping: MappedBuffer,
    planes: [PlaneSpec; 3],
    format: PixelFormat,
    unmapped: bool,
}

/// Map the backing buffer of `info` and lay the planes out as `format`.
pub(crate) fn map_image<'a>(
    surface: &'a Surface,
    info: &ImageInfo,
    format: PixelFormat,
) -> SurfaceResult<MappedImage<'a>> {
    let mapping = surface
        .driver()
        .map_buffer(info.buffer)
        .map_err(|status| SurfaceError::driver("map_buffer", status))?;
    let mut planes = [PlaneSpec { offset: 0, stride: 0 }; 3];
    for plane in 0..(info.num_planes as usize).min(3) {
        planes[plane] = PlaneSpec {
            offset: info.offsets[plane] as usize,
            stride: info.pitches[plane] as usize,
        };
    }
    if info.format.fourcc == fourcc::YV12 {
        planes.swap(1, 2);
    }
    Ok(MappedImage {
        surface,
        info: info.clone(),
        mapping,
        planes,
        format,
        unmapped: false,
    })
}

impl MappedImage<'_> {
    fn resolution(&self) -> Resolution {
        Resolution::new(self.info.width, self.info.height)
    }

    fn plane_span(&self, plane: usize) -> (usize, usize) {
        let spec = self.planes[plane];
        let (row_bytes, rows) = self.format.plane_dims(plane, self.resolution());
        debug_assert!(spec.stride >= row_bytes, "driver pitch narrower than a row");
        let len = if rows == 0 {
            0
        } else {
            spec.stride * (rows - 1) + row_bytes
        };
        debug_assert!(
            spec.offset + len <= self.mapping.len(),
            "plane exceeds the mapped buffer"
        );
        (spec.offset, len)
    }

    pub(crate) fn stride(&self, plane: usize) -> usize {
        self.planes[plane].stride
    }

    pub(crate) fn plane(&self, plane: usize) -> &[u8] {
        let (offset, len) = self.plane_span(plane);
        // SAFETY: the mapping covers data_size bytes and stays valid until the
        // buffer is unmapped; plane_span keeps offset and len inside it.
        unsafe { std::slice::from_raw_parts(self.mapping.as_ptr().add(offset), len) }
    }

    pub(crate) fn plane_mut(&mut self, plane: usize) -> &mut [u8] {
        let (offset, len) = self.plane_span(plane);
        // SAFETY: as in plane(); the exclusive borrow prevents overlap.
        unsafe { std::slice::from_raw_parts_mut(self.mapping.as_mut_ptr().add(offset), len) }
    }

    /// Unmap explicitly, surfacing the driver status. The drop path only
    /// logs, so transfer code calls this once the copy is done.
    pub(crate) fn unmap(mut self) -> SurfaceResult<()> {
        self.unmapped = true;
        self.surface
            .driver()
            .unmap_buffer(self.info.buffer)
            .map_err(|status| SurfaceError::driver("unmap_buffer", status))
    }
}

impl Drop for MappedImage<'_> {
    fn drop(&mut self) {
        if self.unmapped {
            return;
        }
        if let Err(status) = self.surface.driver().unmap_buffer(self.info.buffer) {
            warn!(image = %self.info.id, %status, "failed to unmap image buffer");
        }
    }
}

impl Surface {
    /// Copy a host frame's pixels onto the surface.
    ///
    /// The frame's format must have a layout in the driver catalog and its
    /// dimensions must match the surface exactly. With a derived image the
    /// copy lands in the surface storage directly; with a staging image it is
    /// blitted across afterwards.
    pub fn upload(&self, frame: &Frame) -> SurfaceResult<()> {
        let format = frame.format();
        let entry = self
            .context()
            .image_format(format)
            .ok_or(SurfaceError::UnsupportedFormat { format })?;
        if frame.resolution() != self.resolution() {
            return Err(SurfaceError::SizeMismatch {
                want: self.resolution(),
                got: frame.resolution(),
            });
        }

        let mut state = self.image_state();
        let (info, derived) = self.ensure_image_locked(&mut state, entry)?;

        let mut mapped = map_image(self, &info, format)?;
        for plane in 0..format.plane_count() {
            let (row_bytes, rows) = format.plane_dims(plane, self.resolution());
            let dst_stride = mapped.stride(plane);
            copy_plane(
                mapped.plane_mut(plane),
                dst_stride,
                frame.plane(plane),
                frame.stride(plane),
                row_bytes,
                rows,
            );
        }
        mapped.unmap()?;

        if !derived {
            self.driver()
                .put_image(
                    self.id(),
                    info.id,
                    self.resolution().width,
                    self.resolution().height,
                )
                .map_err(|status| SurfaceError::driver("put_image", status))?;
        }
        debug!(surface = %self.id(), ?format, derived, "uploaded frame");
        Ok(())
    }

    /// Read the surface contents back into a host frame.
    ///
    /// Waits for pending work on the surface, then tries the already attached
    /// image first and every catalog layout in driver order after that. The
    /// first layout that transfers wins; its image stays attached for the
    /// next download. Destination frames come from `pool` when one is given.
    pub fn download(&self, pool: Option<&FramePool>) -> SurfaceResult<Frame> {
        self.driver().sync_surface(self.id()).map_err(|status| {
            error!(surface = %self.id(), %status, "failed to sync surface");
            SurfaceError::driver("sync_surface", status)
        })?;

        let mut state = self.image_state();

        let current = state.info().map(|info| info.format);
        if let Some(entry) = current {
            if let Some(frame) = self.try_download(&mut state, entry, pool)? {
                return Ok(frame);
            }
        }
        for entry in self.context().formats() {
            if let Some(frame) = self.try_download(&mut state, *entry, pool)? {
                return Ok(frame);
            }
        }
        error!(surface = %self.id(), "failed to get surface data");
        Err(SurfaceError::DownloadFailed)
    }

    /// One download attempt with a specific catalog layout. `Ok(None)` means
    /// the layout cannot produce a frame and the caller should try the next
    /// one.
    fn try_download(
        &self,
        state: &mut ImageState,
        entry: ImageFormat,
        pool: Option<&FramePool>,
    ) -> SurfaceResult<Option<Frame>> {
        let Some(format) = format::pixel_format(entry.fourcc) else {
            return Ok(None);
        };

        let (info, derived) = match self.ensure_image_locked(state, entry) {
            Ok(pair) => pair,
            Err(error) => {
                debug!(fourcc = %entry.fourcc, %error, "image setup failed, trying next layout");
                return Ok(None);
            }
        };

        if !derived {
            if let Err(status) = self.driver().get_image(
                self.id(),
                self.resolution().width,
                self.resolution().height,
                info.id,
            ) {
                debug!(fourcc = %entry.fourcc, %status, "get_image failed, trying next layout");
                return Ok(None);
            }
        }

        let mapped = match map_image(self, &info, format) {
            Ok(mapped) => mapped,
            Err(error) => {
                debug!(fourcc = %entry.fourcc, %error, "map failed, trying next layout");
                return Ok(None);
            }
        };

        let dst = match pool {
            Some(pool) => pool.get(format, self.resolution()),
            None => Some(Frame::alloc(format, self.resolution())),
        };
        let Some(mut dst) = dst else {
            debug!(fourcc = %entry.fourcc, ?format, "no destination frame, trying next layout");
            return Ok(None);
        };
        for plane in 0..format.plane_count() {
            let (row_bytes, rows) = format.plane_dims(plane, self.resolution());
            let dst_stride = dst.stride(plane);
            copy_plane(
                dst.plane_mut(plane),
                dst_stride,
                mapped.plane(plane),
                mapped.stride(plane),
                row_bytes,
                rows,
            );
        }
        if let Err(error) = mapped.unmap() {
            debug!(fourcc = %entry.fourcc, %error, "unmap failed, trying next layout");
            return Ok(None);
        }
        debug!(surface = %self.id(), ?format, derived, "downloaded frame");
        Ok(Some(dst))
    }
}

/// Upload a host frame into the surface wrapped by a device frame.
pub fn upload_to_frame(dst: &Frame, src: &Frame) -> SurfaceResult<()> {
    let surface = Surface::from_frame(dst).ok_or(SurfaceError::NotDeviceFrame)?;
    surface.upload(src)
}

/// Download from the surface wrapped by a device frame.
pub fn download_from_frame(src: &Frame, pool: Option<&FramePool>) -> SurfaceResult<Frame> {
    let surface = Surface::from_frame(src).ok_or(SurfaceError::NotDeviceFrame)?;
    surface.download(pool)
}
