//! Accelerator surfaces and their cached driver images.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use hwa_common::{Frame, PixelFormat, Resolution};

use crate::context::AccelContext;
use crate::driver::{AccelDriver, ImageFormat, ImageInfo, StorageFormat, SurfaceId};
use crate::error::{SurfaceError, SurfaceResult};

/// Driver image currently attached to a surface.
///
/// At most one image exists per surface. A derived image aliases the surface
/// storage, so mapping it reads and writes the surface directly; a staging
/// image is separate memory that needs explicit get/put blits.
pub(crate) enum ImageState {
    None,
    Derived(ImageInfo),
    Staging(ImageInfo),
}

impl ImageState {
    pub(crate) fn info(&self) -> Option<&ImageInfo> {
        match self {
            ImageState::None => None,
            ImageState::Derived(info) | ImageState::Staging(info) => Some(info),
        }
    }

    pub(crate) fn is_derived(&self) -> bool {
        matches!(self, ImageState::Derived(_))
    }
}

/// One accelerator surface.
///
/// Surfaces are shared through `Arc`; the driver resource is destroyed when
/// the last reference drops. Wrapping a surface in a [`Frame`] via
/// [`Surface::into_frame`] counts as a reference like any other.
pub struct Surface {
    id: SurfaceId,
    resolution: Resolution,
    storage: StorageFormat,
    ctx: Arc<AccelContext>,
    image: Mutex<ImageState>,
}

impl Surface {
    /// Allocate a surface on the context's driver.
    pub fn create(
        ctx: &Arc<AccelContext>,
        storage: StorageFormat,
        resolution: Resolution,
    ) -> SurfaceResult<Arc<Self>> {
        let id = ctx
            .driver()
            .create_surface(storage, resolution.width, resolution.height)
            .map_err(|status| {
                warn!(?storage, %resolution, %status, "surface allocation failed");
                SurfaceError::driver("create_surface", status)
            })?;
        debug!(surface = %id, ?storage, %resolution, "created surface");
        Ok(Arc::new(Self {
            id,
            resolution,
            storage,
            ctx: ctx.clone(),
            image: Mutex::new(ImageState::None),
        }))
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn storage(&self) -> StorageFormat {
        self.storage
    }

    /// Make sure the surface has an image with the given layout, creating or
    /// replacing the cached one as needed.
    pub fn ensure_image(&self, format: ImageFormat) -> SurfaceResult<()> {
        let mut state = self.image.lock();
        self.ensure_image_locked(&mut state, format).map(|_| ())
    }

    /// [`Surface::ensure_image`] by frame format, using the context catalog.
    pub fn ensure_image_for(&self, format: PixelFormat) -> SurfaceResult<()> {
        let entry = self
            .ctx
            .image_format(format)
            .ok_or(SurfaceError::UnsupportedFormat { format })?;
        self.ensure_image(entry)
    }

    /// Drop the cached image, if any.
    pub fn release_image(&self) {
        let mut state = self.image.lock();
        self.destroy_image_locked(&mut state);
    }

    /// Wrap this surface in a device frame. The frame and its clones keep the
    /// surface alive; the raw id is stored as the frame's owner tag.
    pub fn into_frame(self: Arc<Self>) -> Frame {
        let resolution = self.resolution;
        let tag = self.id.raw() as u64;
        Frame::with_owner(PixelFormat::Device, resolution, self, tag)
    }

    /// The surface wrapped by a device frame, if any.
    pub fn from_frame(frame: &Frame) -> Option<Arc<Surface>> {
        if !frame.format().is_device() {
            return None;
        }
        frame.custom_owner::<Surface>()
    }

    /// The id of the surface wrapped by a frame, or the invalid sentinel for
    /// frames that do not wrap one.
    pub fn id_in_frame(frame: &Frame) -> SurfaceId {
        Self::from_frame(frame).map_or(SurfaceId::INVALID, |surface| surface.id)
    }

    /// Image setup shared by ensure and the transfer paths. Returns the image
    /// description and whether it is derived from the surface storage.
    ///
    /// A cached image with the right fourcc is reused as-is. Otherwise the
    /// old image is destroyed, derivation is attempted first, and a staging
    /// image is allocated when the driver cannot derive (or derives a layout
    /// other than the requested one).
    pub(crate) fn ensure_image_locked(
        &self,
        state: &mut ImageState,
        format: ImageFormat,
    ) -> SurfaceResult<(ImageInfo, bool)> {
        if let Some(info) = state.info() {
            if info.format.fourcc == format.fourcc {
                return Ok((info.clone(), state.is_derived()));
            }
        }
        self.destroy_image_locked(state);

        let driver = self.ctx.driver();
        match driver.derive_image(self.id) {
            Ok(derived) => {
                if derived.format.fourcc == format.fourcc
                    && derived.width == self.resolution.width
                    && derived.height == self.resolution.height
                {
                    debug!(surface = %self.id, fourcc = %format.fourcc, "using derived image");
                    *state = ImageState::Derived(derived.clone());
                    return Ok((derived, true));
                }
                // The driver picked a different layout; give it back.
                if let Err(status) = driver.destroy_image(derived.id) {
                    warn!(image = %derived.id, %status, "failed to destroy derived image");
                }
            }
            Err(status) => {
                debug!(surface = %self.id, %status, "derive unavailable, using staging image");
            }
        }

        let info = driver
            .create_image(format, self.resolution.width, self.resolution.height)
            .map_err(|status| {
                warn!(surface = %self.id, fourcc = %format.fourcc, %status, "image allocation failed");
                SurfaceError::driver("create_image", status)
            })?;
        debug!(surface = %self.id, fourcc = %format.fourcc, image = %info.id, "created staging image");
        *state = ImageState::Staging(info.clone());
        Ok((info, false))
    }

    pub(crate) fn destroy_image_locked(&self, state: &mut ImageState) {
        if let Some(info) = state.info() {
            if let Err(status) = self.ctx.driver().destroy_image(info.id) {
                warn!(image = %info.id, %status, "failed to destroy image");
            }
        }
        *state = ImageState::None;
    }

    pub(crate) fn image_state(&self) -> MutexGuard<'_, ImageState> {
        self.image.lock()
    }

    pub(crate) fn context(&self) -> &AccelContext {
        &self.ctx
    }

    pub(crate) fn driver(&self) -> &Arc<dyn AccelDriver> {
        self.ctx.driver()
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // The invalid sentinel never reached the driver, so nothing to undo.
        if !self.id.is_valid() {
            return;
        }
        let state = self.image.get_mut();
        if let Some(info) = state.info() {
            if let Err(status) = self.ctx.driver().destroy_image(info.id) {
                warn!(image = %info.id, %status, "failed to destroy surface image");
            }
        }
        if let Err(status) = self.ctx.driver().destroy_surface(self.id) {
            warn!(surface = %self.id, %status, "failed to destroy surface");
        } else {
            debug!(surface = %self.id, "destroyed surface");
        }
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Surface");
        s.field("id", &self.id)
            .field("resolution", &self.resolution)
            .field("storage", &self.storage);
        match self.image.try_lock() {
            Some(state) => s.field("image", &state.info().map(|info| info.format.fourcc)),
            None => s.field("image", &"<locked>"),
        };
        s.finish()
    }
}
