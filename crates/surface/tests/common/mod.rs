//! Shared test support: an instrumented driver with failure injection, plus
//! frame helpers.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use hwa_common::{Frame, PixelFormat, Resolution};
use hwa_surface::{
    AccelContext, AccelDriver, ApiVersion, BufferId, DriverResult, DriverStatus, FourCc,
    ImageFormat, ImageId, ImageInfo, MappedBuffer, SoftwareDriver, SoftwareDriverConfig,
    StorageFormat, SurfaceId,
};

pub fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[derive(Default)]
struct Counters {
    init: AtomicUsize,
    terminate: AtomicUsize,
    query: AtomicUsize,
    create_surface: AtomicUsize,
    destroy_surface: AtomicUsize,
    derive: AtomicUsize,
    create_image: AtomicUsize,
    destroy_image: AtomicUsize,
    map: AtomicUsize,
    unmap: AtomicUsize,
    get: AtomicUsize,
    put: AtomicUsize,
    sync: AtomicUsize,
}

/// [`SoftwareDriver`] wrapper that counts every call and can inject failures
/// per entry point or per image fourcc.
pub struct FaultDriver {
    inner: SoftwareDriver,
    fail_init: bool,
    fail_query: bool,
    fail_sync: AtomicBool,
    fail_map: AtomicBool,
    fail_unmap: AtomicBool,
    denied_gets: Mutex<HashSet<FourCc>>,
    denied_creates: Mutex<HashSet<FourCc>>,
    image_fourccs: Mutex<HashMap<u32, FourCc>>,
    creates: Mutex<Vec<FourCc>>,
    counters: Counters,
}

impl FaultDriver {
    pub fn new() -> Arc<Self> {
        Self::build(SoftwareDriver::new(), false, false)
    }

    pub fn with_formats(formats: &[FourCc]) -> Arc<Self> {
        Self::build(SoftwareDriver::with_formats(formats), false, false)
    }

    pub fn with_config(config: SoftwareDriverConfig) -> Arc<Self> {
        Self::build(SoftwareDriver::with_config(config), false, false)
    }

    pub fn failing_init() -> Arc<Self> {
        Self::build(SoftwareDriver::new(), true, false)
    }

    pub fn failing_query() -> Arc<Self> {
        Self::build(SoftwareDriver::new(), false, true)
    }

    fn build(inner: SoftwareDriver, fail_init: bool, fail_query: bool) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_init,
            fail_query,
            fail_sync: AtomicBool::new(false),
            fail_map: AtomicBool::new(false),
            fail_unmap: AtomicBool::new(false),
            denied_gets: Mutex::new(HashSet::new()),
            denied_creates: Mutex::new(HashSet::new()),
            image_fourccs: Mutex::new(HashMap::new()),
            creates: Mutex::new(Vec::new()),
            counters: Counters::default(),
        })
    }

    // ── Failure knobs ──

    pub fn set_fail_sync(&self, on: bool) {
        self.fail_sync.store(on, Ordering::SeqCst);
    }

    pub fn set_fail_map(&self, on: bool) {
        self.fail_map.store(on, Ordering::SeqCst);
    }

    pub fn set_fail_unmap(&self, on: bool) {
        self.fail_unmap.store(on, Ordering::SeqCst);
    }

    /// Make get_image fail for images of the given fourcc.
    pub fn deny_get(&self, code: FourCc) {
        self.denied_gets.lock().insert(code);
    }

    /// Make create_image fail for the given fourcc.
    pub fn deny_create(&self, code: FourCc) {
        self.denied_creates.lock().insert(code);
    }

    /// Fourccs passed to create_image, in call order.
    pub fn create_order(&self) -> Vec<FourCc> {
        self.creates.lock().clone()
    }

    // ── Call counts ──

    pub fn init_count(&self) -> usize {
        self.counters.init.load(Ordering::SeqCst)
    }

    pub fn terminate_count(&self) -> usize {
        self.counters.terminate.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> usize {
        self.counters.query.load(Ordering::SeqCst)
    }

    pub fn create_surface_count(&self) -> usize {
        self.counters.create_surface.load(Ordering::SeqCst)
    }

    pub fn destroy_surface_count(&self) -> usize {
        self.counters.destroy_surface.load(Ordering::SeqCst)
    }

    pub fn derive_count(&self) -> usize {
        self.counters.derive.load(Ordering::SeqCst)
    }

    pub fn create_image_count(&self) -> usize {
        self.counters.create_image.load(Ordering::SeqCst)
    }

    pub fn destroy_image_count(&self) -> usize {
        self.counters.destroy_image.load(Ordering::SeqCst)
    }

    pub fn map_count(&self) -> usize {
        self.counters.map.load(Ordering::SeqCst)
    }

    pub fn unmap_count(&self) -> usize {
        self.counters.unmap.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.counters.get.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.counters.put.load(Ordering::SeqCst)
    }

    pub fn sync_count(&self) -> usize {
        self.counters.sync.load(Ordering::SeqCst)
    }
}

impl AccelDriver for FaultDriver {
    fn initialize(&self) -> DriverResult<ApiVersion> {
        self.counters.init.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(DriverStatus::OperationFailed);
        }
        self.inner.initialize()
    }

    fn terminate(&self) {
        self.counters.terminate.fetch_add(1, Ordering::SeqCst);
        self.inner.terminate();
    }

    fn query_image_formats(&self) -> DriverResult<Vec<ImageFormat>> {
        self.counters.query.fetch_add(1, Ordering::SeqCst);
        if self.fail_query {
            return Err(DriverStatus::OperationFailed);
        }
        self.inner.query_image_formats()
    }

    fn create_surface(
        &self,
        storage: StorageFormat,
        width: u32,
        height: u32,
    ) -> DriverResult<SurfaceId> {
        self.counters.create_surface.fetch_add(1, Ordering::SeqCst);
        self.inner.create_surface(storage, width, height)
    }

    fn destroy_surface(&self, surface: SurfaceId) -> DriverResult<()> {
        self.counters.destroy_surface.fetch_add(1, Ordering::SeqCst);
        self.inner.destroy_surface(surface)
    }

    fn derive_image(&self, surface: SurfaceId) -> DriverResult<ImageInfo> {
        self.counters.derive.fetch_add(1, Ordering::SeqCst);
        let info = self.inner.derive_image(surface)?;
        self.image_fourccs
            .lock()
            .insert(info.id.raw(), info.format.fourcc);
        Ok(info)
    }

    fn create_image(
        &self,
        format: ImageFormat,
        width: u32,
        height: u32,
    ) -> DriverResult<ImageInfo> {
        self.counters.create_image.fetch_add(1, Ordering::SeqCst);
        self.creates.lock().push(format.fourcc);
        if self.denied_creates.lock().contains(&format.fourcc) {
            return Err(DriverStatus::AllocationFailed);
        }
        let info = self.inner.create_image(format, width, height)?;
        self.image_fourccs
            .lock()
            .insert(info.id.raw(), info.format.fourcc);
        Ok(info)
    }

    fn destroy_image(&self, image: ImageId) -> DriverResult<()> {
        self.counters.destroy_image.fetch_add(1, Ordering::SeqCst);
        self.image_fourccs.lock().remove(&image.raw());
        self.inner.destroy_image(image)
    }

    fn map_buffer(&self, buffer: BufferId) -> DriverResult<MappedBuffer> {
        self.counters.map.fetch_add(1, Ordering::SeqCst);
        if self.fail_map.load(Ordering::SeqCst) {
            return Err(DriverStatus::OperationFailed);
        }
        self.inner.map_buffer(buffer)
    }

    fn unmap_buffer(&self, buffer: BufferId) -> DriverResult<()> {
        self.counters.unmap.fetch_add(1, Ordering::SeqCst);
        if self.fail_unmap.load(Ordering::SeqCst) {
            return Err(DriverStatus::OperationFailed);
        }
        self.inner.unmap_buffer(buffer)
    }

    fn get_image(
        &self,
        surface: SurfaceId,
        width: u32,
        height: u32,
        image: ImageId,
    ) -> DriverResult<()> {
        self.counters.get.fetch_add(1, Ordering::SeqCst);
        let fourcc = self.image_fourccs.lock().get(&image.raw()).copied();
        if let Some(code) = fourcc {
            if self.denied_gets.lock().contains(&code) {
                return Err(DriverStatus::OperationFailed);
            }
        }
        self.inner.get_image(surface, width, height, image)
    }

    fn put_image(
        &self,
        surface: SurfaceId,
        image: ImageId,
        width: u32,
        height: u32,
    ) -> DriverResult<()> {
        self.counters.put.fetch_add(1, Ordering::SeqCst);
        self.inner.put_image(surface, image, width, height)
    }

    fn sync_surface(&self, surface: SurfaceId) -> DriverResult<()> {
        self.counters.sync.fetch_add(1, Ordering::SeqCst);
        if self.fail_sync.load(Ordering::SeqCst) {
            return Err(DriverStatus::OperationFailed);
        }
        self.inner.sync_surface(surface)
    }
}

/// Initialize a context over the given fault driver.
pub fn context(driver: &Arc<FaultDriver>) -> Arc<AccelContext> {
    AccelContext::initialize(driver.clone()).expect("driver init")
}

/// Host frame with a distinct byte pattern per plane.
pub fn pattern_frame(format: PixelFormat, resolution: Resolution) -> Frame {
    let mut frame = Frame::alloc(format, resolution);
    for plane in 0..frame.plane_count() {
        let seed = (plane as u8).wrapping_mul(31).wrapping_add(17);
        for (i, byte) in frame.plane_mut(plane).iter_mut().enumerate() {
            *byte = seed.wrapping_add((i as u8).wrapping_mul(7));
        }
    }
    frame
}

pub fn assert_frames_equal(a: &Frame, b: &Frame) {
    assert_eq!(a.format(), b.format(), "formats differ");
    assert_eq!(a.resolution(), b.resolution(), "dimensions differ");
    for plane in 0..a.plane_count() {
        assert_eq!(a.plane(plane), b.plane(plane), "plane {plane} differs");
    }
}
