//! Frame reuse pool.
//!
//! Frames handed out by [`FramePool::get`] remember their pool; when the last
//! clone of such a frame is dropped, its storage returns to the free list
//! instead of being freed. Device-format frames can only be produced by a
//! bound [`FrameAllocator`], since their storage lives behind a driver handle.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::color::PixelFormat;
use crate::frame::{Frame, FrameInner};
use crate::types::Resolution;

/// External source of frames, typically backed by an accelerator.
pub trait FrameAllocator: Send + Sync {
    /// Produce a fresh frame, or `None` if the request cannot be satisfied.
    fn allocate(&self, format: PixelFormat, resolution: Resolution) -> Option<Frame>;
}

struct FreeEntry {
    inner: FrameInner,
    last_used: u64,
}

struct PoolState {
    free: Vec<FreeEntry>,
    allocator: Option<Arc<dyn FrameAllocator>>,
    lru: bool,
    max_free: usize,
    tick: u64,
}

impl PoolState {
    fn trim(&mut self) {
        while self.free.len() > self.max_free {
            let idx = if self.lru {
                self.free
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(idx, _)| idx)
                    .unwrap_or(0)
            } else {
                0
            };
            let evicted = self.free.swap_remove(idx);
            debug!(
                format = ?evicted.inner.format,
                resolution = %evicted.inner.resolution,
                "evicted pooled frame"
            );
        }
    }
}

pub(crate) struct PoolShared {
    state: Mutex<PoolState>,
}

impl PoolShared {
    pub(crate) fn recycle(&self, inner: FrameInner) {
        let mut state = self.state.lock();
        state.tick += 1;
        let stamp = state.tick;
        state.free.push(FreeEntry {
            inner,
            last_used: stamp,
        });
        state.trim();
    }
}

/// Snapshot of pool occupancy, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub free: usize,
    pub max_free: usize,
    pub lru: bool,
}

/// A pool of reusable frames. Cloning shares the pool.
#[derive(Clone)]
pub struct FramePool {
    shared: Arc<PoolShared>,
}

impl FramePool {
    /// Create a pool retaining at most `max_free` idle frames.
    pub fn new(max_free: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    free: Vec::new(),
                    allocator: None,
                    lru: false,
                    max_free,
                    tick: 0,
                }),
            }),
        }
    }

    /// Route all fresh allocations through `allocator`. Once bound, the pool
    /// never falls back to plain host allocation.
    pub fn set_allocator(&self, allocator: Arc<dyn FrameAllocator>) {
        self.shared.state.lock().allocator = Some(allocator);
        debug!("bound frame allocator to pool");
    }

    /// Prefer the most recently returned frame on reuse and evict the stalest
    /// one when trimming.
    pub fn set_lru(&self, lru: bool) {
        self.shared.state.lock().lru = lru;
    }

    /// Fetch a frame of the given format and size, reusing an idle one when
    /// possible. Reused frames keep their previous contents.
    ///
    /// Returns `None` when a bound allocator declines the request, or when a
    /// device frame is requested with no allocator bound.
    pub fn get(&self, format: PixelFormat, resolution: Resolution) -> Option<Frame> {
        let reused = {
            let mut state = self.shared.state.lock();
            state.tick += 1;
            let found = if state.lru {
                state
                    .free
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| {
                        entry.inner.format == format && entry.inner.resolution == resolution
                    })
                    .max_by_key(|(_, entry)| entry.last_used)
                    .map(|(idx, _)| idx)
            } else {
                state.free.iter().position(|entry| {
                    entry.inner.format == format && entry.inner.resolution == resolution
                })
            };
            found.map(|idx| state.free.swap_remove(idx).inner)
        };
        if let Some(inner) = reused {
            debug!(?format, %resolution, "reusing pooled frame");
            return Some(Frame::from_parts(inner, Some(Arc::downgrade(&self.shared))));
        }

        // The allocator must run without the pool lock held.
        let allocator = self.shared.state.lock().allocator.clone();
        let mut frame = match allocator {
            Some(allocator) => allocator.allocate(format, resolution)?,
            None if format.is_device() => {
                warn!(%resolution, "frame pool has no allocator for device frames");
                return None;
            }
            None => Frame::alloc(format, resolution),
        };
        frame.attach_home(Arc::downgrade(&self.shared));
        Some(frame)
    }

    /// Drop every idle frame.
    pub fn clear(&self) {
        let drained = {
            let mut state = self.shared.state.lock();
            std::mem::take(&mut state.free)
        };
        if !drained.is_empty() {
            debug!(count = drained.len(), "cleared frame pool");
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            free: state.free.len(),
            max_free: state.max_free,
            lru: state.lru,
        }
    }
}

impl fmt::Debug for FramePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("FramePool")
            .field("free", &stats.free)
            .field("max_free", &stats.max_free)
            .field("lru", &stats.lru)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAllocator {
        calls: AtomicUsize,
    }

    impl CountingAllocator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl FrameAllocator for CountingAllocator {
        fn allocate(&self, format: PixelFormat, resolution: Resolution) -> Option<Frame> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if format.is_device() {
                return None;
            }
            Some(Frame::alloc(format, resolution))
        }
    }

    fn marked_frame(pool: &FramePool, marker: u8) -> Frame {
        let mut frame = pool
            .get(PixelFormat::Nv12, Resolution::new(4, 2))
            .expect("host allocation");
        frame.plane_mut(0)[0] = marker;
        frame
    }

    // ── Recycling ──

    #[test]
    fn dropped_frame_returns_to_pool() {
        let pool = FramePool::new(4);
        let frame = marked_frame(&pool, 0x5a);
        assert_eq!(pool.stats().free, 0);
        drop(frame);
        assert_eq!(pool.stats().free, 1);

        let again = pool
            .get(PixelFormat::Nv12, Resolution::new(4, 2))
            .expect("reuse");
        assert_eq!(again.plane(0)[0], 0x5a, "reused storage keeps contents");
        assert_eq!(pool.stats().free, 0);
    }

    #[test]
    fn clone_defers_recycle_to_last_drop() {
        let pool = FramePool::new(4);
        let frame = marked_frame(&pool, 1);
        let copy = frame.clone();
        drop(frame);
        assert_eq!(pool.stats().free, 0, "a live clone holds the storage");
        drop(copy);
        assert_eq!(pool.stats().free, 1);
    }

    #[test]
    fn mismatched_request_allocates_fresh() {
        let pool = FramePool::new(4);
        drop(marked_frame(&pool, 2));
        let other = pool
            .get(PixelFormat::Nv12, Resolution::new(8, 4))
            .expect("host allocation");
        assert_eq!(pool.stats().free, 1, "cached frame stays for its own size");
        assert_eq!(other.resolution(), Resolution::new(8, 4));
    }

    #[test]
    fn frame_outliving_pool_is_freed_quietly() {
        let pool = FramePool::new(4);
        let frame = marked_frame(&pool, 3);
        drop(pool);
        drop(frame);
    }

    // ── Allocator binding ──

    #[test]
    fn bound_allocator_is_the_sole_source() {
        let pool = FramePool::new(4);
        let allocator = CountingAllocator::new();
        pool.set_allocator(allocator.clone());

        let frame = pool
            .get(PixelFormat::Nv12, Resolution::new(4, 2))
            .expect("allocator path");
        assert_eq!(allocator.calls.load(Ordering::SeqCst), 1);
        drop(frame);

        let _again = pool
            .get(PixelFormat::Nv12, Resolution::new(4, 2))
            .expect("reuse");
        assert_eq!(
            allocator.calls.load(Ordering::SeqCst),
            1,
            "reuse must not hit the allocator"
        );
    }

    #[test]
    fn allocator_refusal_propagates() {
        let pool = FramePool::new(4);
        let allocator = CountingAllocator::new();
        pool.set_allocator(allocator.clone());
        assert!(pool.get(PixelFormat::Device, Resolution::new(4, 2)).is_none());
        assert_eq!(allocator.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn device_request_without_allocator_fails() {
        let pool = FramePool::new(4);
        assert!(pool.get(PixelFormat::Device, Resolution::new(4, 2)).is_none());
        assert_eq!(pool.stats().free, 0);
    }

    // ── Capacity and LRU ──

    #[test]
    fn trim_caps_idle_frames() {
        let pool = FramePool::new(2);
        let frames: Vec<_> = (0..3).map(|i| marked_frame(&pool, i)).collect();
        drop(frames);
        assert_eq!(pool.stats().free, 2);
    }

    #[test]
    fn fifo_reuses_oldest_first() {
        let pool = FramePool::new(4);
        let older = marked_frame(&pool, 10);
        let newer = marked_frame(&pool, 20);
        drop(older);
        drop(newer);
        assert_eq!(pool.stats().free, 2);
        let frame = pool
            .get(PixelFormat::Nv12, Resolution::new(4, 2))
            .expect("reuse");
        assert_eq!(frame.plane(0)[0], 10);
    }

    #[test]
    fn lru_reuses_most_recent_first() {
        let pool = FramePool::new(4);
        pool.set_lru(true);
        let older = marked_frame(&pool, 10);
        let newer = marked_frame(&pool, 20);
        drop(older);
        drop(newer);
        assert_eq!(pool.stats().free, 2);
        let frame = pool
            .get(PixelFormat::Nv12, Resolution::new(4, 2))
            .expect("reuse");
        assert_eq!(frame.plane(0)[0], 20);
    }

    #[test]
    fn lru_trim_evicts_stalest() {
        let pool = FramePool::new(1);
        pool.set_lru(true);
        let older = marked_frame(&pool, 10);
        let newer = marked_frame(&pool, 20);
        drop(older);
        drop(newer);
        assert_eq!(pool.stats().free, 1);
        let frame = pool
            .get(PixelFormat::Nv12, Resolution::new(4, 2))
            .expect("reuse");
        assert_eq!(frame.plane(0)[0], 20, "trim keeps the fresher frame");
    }

    #[test]
    fn clear_empties_free_list() {
        let pool = FramePool::new(4);
        let a = marked_frame(&pool, 1);
        let b = marked_frame(&pool, 2);
        drop(a);
        drop(b);
        assert_eq!(pool.stats().free, 2);
        pool.clear();
        assert_eq!(pool.stats().free, 0);
    }
}
