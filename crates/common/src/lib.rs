//! `hwa-common` — Shared frame and format types for the hwa workspace.
//!
//! This crate is the foundation the acceleration crates depend on.
//! It defines the core abstractions:
//!
//! - **Types**: `Resolution` (geometry)
//! - **Color**: `PixelFormat`, `ColorSpace` (frame descriptions)
//! - **Frame**: `Frame` (refcounted pixel storage, host or device-backed)
//! - **Pool**: `FramePool`, `FrameAllocator` (frame reuse and custom allocation)

pub mod color;
pub mod frame;
pub mod pool;
pub mod types;

// Re-export commonly used items at crate root
pub use color::{ColorSpace, PixelFormat};
pub use frame::{copy_plane, Frame};
pub use pool::{FrameAllocator, FramePool, PoolStats};
pub use types::Resolution;
