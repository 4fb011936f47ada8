//! wgpu implementation of the rendering context.
//!
//! - `context` owns the instance/device/queue and either a window surface or
//!   an offscreen texture, and implements [`crate::GraphicsContext`].
//! - `pipeline` runs GLSL through naga for diagnostics, then builds modules
//!   and render pipelines under validation error scopes.
//! - `readback` renders a frame into a scratch texture and copies it back for
//!   PNG snapshots and pixel tests.

mod context;
mod pipeline;
mod readback;

pub use context::{AdapterSummary, GpuContext, GpuProgram, GpuStage};
pub use readback::{save_png, CaptureError};
