//! Reference-counted video frames.
//!
//! A [`Frame`] either owns pixel planes in system memory or wraps an opaque
//! accelerator resource via an owner handle. Clones share storage; mutation
//! goes through copy-on-write, so handing a clone to another thread never
//! races with plane writes.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::color::PixelFormat;
use crate::pool::PoolShared;
use crate::types::Resolution;

/// Copy `rows` rows of `row_bytes` bytes between two pitched buffers.
///
/// Both buffers must hold at least `stride * (rows - 1) + row_bytes` bytes.
pub fn copy_plane(
    dst: &mut [u8],
    dst_stride: usize,
    src: &[u8],
    src_stride: usize,
    row_bytes: usize,
    rows: usize,
) {
    for row in 0..rows {
        let d = row * dst_stride;
        let s = row * src_stride;
        dst[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
    }
}

#[derive(Clone)]
pub(crate) struct PlaneBuf {
    pub(crate) data: Vec<u8>,
    pub(crate) stride: usize,
}

/// Shared frame storage. Cloned wholesale by copy-on-write mutation.
#[derive(Clone)]
pub(crate) struct FrameInner {
    pub(crate) format: PixelFormat,
    pub(crate) resolution: Resolution,
    pub(crate) planes: Vec<PlaneBuf>,
    pub(crate) owner: Option<Arc<dyn Any + Send + Sync>>,
    pub(crate) tag: Option<u64>,
}

/// A single video frame.
///
/// Host frames ([`Frame::alloc`]) carry their pixel planes inline. Device
/// frames ([`Frame::with_owner`]) have no addressable planes; the owner handle
/// keeps the underlying resource alive until the last clone is dropped.
#[derive(Clone)]
pub struct Frame {
    inner: Option<Arc<FrameInner>>,
    home: Option<Weak<PoolShared>>,
}

impl Frame {
    /// Allocate a zero-filled host frame with tightly packed planes.
    ///
    /// # Panics
    ///
    /// Panics on [`PixelFormat::Device`] or zero dimensions.
    pub fn alloc(format: PixelFormat, resolution: Resolution) -> Self {
        assert!(
            !format.is_device(),
            "device frames wrap a driver resource; use Frame::with_owner"
        );
        assert!(
            resolution.width > 0 && resolution.height > 0,
            "frame dimensions must be non-zero"
        );
        let planes = (0..format.plane_count())
            .map(|plane| {
                let (row_bytes, rows) = format.plane_dims(plane, resolution);
                PlaneBuf {
                    data: vec![0u8; row_bytes * rows],
                    stride: row_bytes,
                }
            })
            .collect();
        Self {
            inner: Some(Arc::new(FrameInner {
                format,
                resolution,
                planes,
                owner: None,
                tag: None,
            })),
            home: None,
        }
    }

    /// Wrap an external resource in a frame with no addressable planes.
    ///
    /// `owner` is dropped when the last clone of the frame goes away; `tag`
    /// is an owner-defined handle value retrievable via [`Frame::owner_tag`].
    pub fn with_owner(
        format: PixelFormat,
        resolution: Resolution,
        owner: Arc<dyn Any + Send + Sync>,
        tag: u64,
    ) -> Self {
        Self {
            inner: Some(Arc::new(FrameInner {
                format,
                resolution,
                planes: Vec::new(),
                owner: Some(owner),
                tag: Some(tag),
            })),
            home: None,
        }
    }

    pub fn format(&self) -> PixelFormat {
        self.inner().format
    }

    pub fn resolution(&self) -> Resolution {
        self.inner().resolution
    }

    pub fn plane_count(&self) -> usize {
        self.inner().planes.len()
    }

    /// Read access to one plane's bytes.
    pub fn plane(&self, plane: usize) -> &[u8] {
        &self.inner().planes[plane].data
    }

    /// Bytes between the starts of consecutive rows of one plane.
    pub fn stride(&self, plane: usize) -> usize {
        self.inner().planes[plane].stride
    }

    /// Mutable access to one plane's bytes. Copies the storage first if any
    /// clone of this frame is still alive.
    pub fn plane_mut(&mut self, plane: usize) -> &mut [u8] {
        let inner = self.inner.as_mut().expect("frame storage present");
        &mut Arc::make_mut(inner).planes[plane].data
    }

    /// The owner handle, downcast to its concrete type.
    pub fn custom_owner<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.inner().owner.clone()?.downcast::<T>().ok()
    }

    /// The raw handle value stored alongside the owner, if any.
    pub fn owner_tag(&self) -> Option<u64> {
        self.inner().tag
    }

    /// Copy all plane contents from `src`, honoring both frames' strides.
    ///
    /// # Panics
    ///
    /// Panics if formats or dimensions differ.
    pub fn copy_from(&mut self, src: &Frame) {
        assert_eq!(
            self.format(),
            src.format(),
            "copy_from requires matching formats"
        );
        assert_eq!(
            self.resolution(),
            src.resolution(),
            "copy_from requires matching dimensions"
        );
        for plane in 0..src.plane_count() {
            let (row_bytes, rows) = src.format().plane_dims(plane, src.resolution());
            let dst_stride = self.stride(plane);
            copy_plane(
                self.plane_mut(plane),
                dst_stride,
                src.plane(plane),
                src.stride(plane),
                row_bytes,
                rows,
            );
        }
    }

    fn inner(&self) -> &FrameInner {
        self.inner.as_ref().expect("frame storage present")
    }

    pub(crate) fn from_parts(inner: FrameInner, home: Option<Weak<PoolShared>>) -> Self {
        Self {
            inner: Some(Arc::new(inner)),
            home,
        }
    }

    pub(crate) fn attach_home(&mut self, home: Weak<PoolShared>) {
        self.home = Some(home);
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        // Only the last clone gets the storage back; earlier drops leave it
        // with the survivors. Recycling into a dead pool just frees it.
        if let Some(inner) = Arc::into_inner(inner) {
            if let Some(home) = self.home.as_ref().and_then(Weak::upgrade) {
                home.recycle(inner);
            }
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner();
        f.debug_struct("Frame")
            .field("format", &inner.format)
            .field("resolution", &inner.resolution)
            .field("planes", &inner.planes.len())
            .field("tag", &inner.tag)
            .finish()
    }
}
