//! Surface-backed frame allocation for pools.

use std::sync::Arc;

use tracing::debug;

use hwa_common::{Frame, FrameAllocator, FramePool, PixelFormat, Resolution};

use crate::context::AccelContext;
use crate::driver::StorageFormat;
use crate::surface::Surface;

/// [`FrameAllocator`] producing device frames backed by fresh surfaces.
///
/// Only [`PixelFormat::Device`] requests are served; any other format returns
/// `None` without touching the driver.
pub struct SurfaceAllocator {
    ctx: Arc<AccelContext>,
    storage: StorageFormat,
}

impl SurfaceAllocator {
    pub fn new(ctx: Arc<AccelContext>, storage: StorageFormat) -> Self {
        Self { ctx, storage }
    }
}

impl FrameAllocator for SurfaceAllocator {
    fn allocate(&self, format: PixelFormat, resolution: Resolution) -> Option<Frame> {
        if format != PixelFormat::Device {
            return None;
        }
        match Surface::create(&self.ctx, self.storage, resolution) {
            Ok(surface) => Some(surface.into_frame()),
            Err(error) => {
                debug!(%error, %resolution, "surface allocation for pool failed");
                None
            }
        }
    }
}

/// Bind `pool` to surface-backed allocation on `ctx`.
///
/// Recycled device frames keep their surfaces alive inside the pool, and the
/// pool switches to most-recently-used reuse.
pub fn bind_surface_allocator(pool: &FramePool, ctx: Arc<AccelContext>, storage: StorageFormat) {
    pool.set_allocator(Arc::new(SurfaceAllocator::new(ctx, storage)));
    pool.set_lru(true);
}
